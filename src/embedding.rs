//! Embedding strategies and the pretrained word-vector source.
//!
//! The three model variants resolve into different `(input, weights)`
//! pairings:
//!
//! - `Rand`: token ids pass through unchanged and the classifier owns a
//!   randomly-initialized trainable embedding table.
//! - `Static`: pretrained vectors are baked into the input ahead of the
//!   model; the lookup table is consumed and discarded.
//! - `NonStatic`: token ids pass through unchanged and the lookup table
//!   becomes the initial state of a trainable embedding table.
//!
//! The word-vector provider itself is an opaque collaborator behind
//! [`WordVectorSource`]; the shipped implementation reads the classic
//! binary word2vec format.

use std::collections::HashMap;
use std::path::Path;

use candle_core::{Device, Tensor};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::ModelVariant;
use crate::corpus::{TokenizedCorpus, Vocabulary};
use crate::error::{Result, SentenceCnnError};

/// Out-of-vocabulary fallback vectors are drawn per-dimension from
/// [-FALLBACK_RANGE, FALLBACK_RANGE).
const FALLBACK_RANGE: f32 = 0.25;

/// Opaque token→vector lookup backed by a pretrained word-vector model.
pub trait WordVectorSource {
    /// Dimensionality of every vector in the source.
    fn dimension(&self) -> usize;

    /// Vector for a token, or `None` if the token is not covered.
    fn vector(&self, token: &str) -> Option<&[f32]>;
}

/// Word-vector source backed by a binary word2vec file.
///
/// The file starts with an ASCII header line `<vocab_size> <dimension>`,
/// followed by one entry per word: the word bytes, a single space, then
/// `dimension` little-endian f32 values.
#[derive(Debug)]
pub struct Word2VecFile {
    vectors: HashMap<String, Vec<f32>>,
    dimension: usize,
}

impl Word2VecFile {
    /// Read a binary word2vec file. A missing or malformed file is fatal.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            SentenceCnnError::EmbeddingSourceUnavailable(format!(
                "cannot read {}: {e}",
                path.display()
            ))
        })?;
        Self::from_bytes(&bytes).map_err(|e| {
            SentenceCnnError::EmbeddingSourceUnavailable(format!("{}: {e}", path.display()))
        })
    }

    fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, String> {
        let header_end = bytes
            .iter()
            .position(|&b| b == b'\n')
            .ok_or("no header line")?;
        let header =
            std::str::from_utf8(&bytes[..header_end]).map_err(|e| format!("header: {e}"))?;
        let mut parts = header.split_whitespace();
        let vocab_size: usize = parts
            .next()
            .ok_or("header missing vocab size")?
            .parse()
            .map_err(|e| format!("vocab size: {e}"))?;
        let dimension: usize = parts
            .next()
            .ok_or("header missing dimension")?
            .parse()
            .map_err(|e| format!("dimension: {e}"))?;

        let mut vectors = HashMap::with_capacity(vocab_size);
        let mut pos = header_end + 1;
        for entry in 0..vocab_size {
            // Entries may be separated by a newline after the vector bytes.
            while pos < bytes.len() && (bytes[pos] == b'\n' || bytes[pos] == b' ') {
                pos += 1;
            }
            let word_end = bytes[pos..]
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| format!("entry {entry}: unterminated word"))?
                + pos;
            let word = std::str::from_utf8(&bytes[pos..word_end])
                .map_err(|e| format!("entry {entry}: {e}"))?
                .to_string();
            pos = word_end + 1;

            let vec_end = pos + dimension * 4;
            if vec_end > bytes.len() {
                return Err(format!("entry {entry}: truncated vector"));
            }
            let vector: Vec<f32> = bytes[pos..vec_end]
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            pos = vec_end;
            vectors.insert(word, vector);
        }

        Ok(Self { vectors, dimension })
    }

    /// Number of words covered by the source.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Whether the source covers no words.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

impl WordVectorSource for Word2VecFile {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn vector(&self, token: &str) -> Option<&[f32]> {
        self.vectors.get(token).map(Vec::as_slice)
    }
}

/// Build the `[vocab_size, embedding_dim]` lookup table for a vocabulary.
///
/// Tokens absent from the source receive a uniform-random vector in
/// [-0.25, 0.25), drawn per dimension from a seeded generator so runs are
/// reproducible. A source whose dimension disagrees with `embedding_dim`
/// fails fast rather than being silently reshaped.
pub fn build_lookup_table(
    source: &dyn WordVectorSource,
    vocabulary: &Vocabulary,
    embedding_dim: usize,
    seed: u64,
    device: &Device,
) -> Result<Tensor> {
    if source.dimension() != embedding_dim {
        return Err(SentenceCnnError::CorpusShapeMismatch(format!(
            "word-vector source has dimension {} but embedding_dim is {}",
            source.dimension(),
            embedding_dim
        )));
    }

    let vocab_size = vocabulary.len();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut table = Vec::with_capacity(vocab_size * embedding_dim);
    for index in 0..vocab_size as u32 {
        let token = vocabulary.token(index).unwrap_or("");
        match source.vector(token) {
            Some(v) => table.extend_from_slice(v),
            None => {
                table.extend((0..embedding_dim).map(|_| {
                    rng.gen_range(-FALLBACK_RANGE..FALLBACK_RANGE)
                }));
            }
        }
    }

    Tensor::from_vec(table, (vocab_size, embedding_dim), device)
        .map_err(|e| SentenceCnnError::Model(format!("lookup table tensor: {e}")))
}

/// Model input resolved from a variant: either token ids (the classifier
/// embeds them, optionally seeded from pretrained weights) or a
/// pre-embedded tensor (the classifier omits its embedding layer).
#[derive(Debug)]
pub enum ResolvedInput {
    /// Token ids `[N, L]` (u32) plus optional initial embedding weights.
    Tokens {
        tokens: Tensor,
        initial_weights: Option<Tensor>,
    },
    /// Pre-embedded sentences `[N, L, D]` (f32).
    Embedded { embedded: Tensor },
}

impl ResolvedInput {
    /// The tensor fed to the classifier.
    pub fn tensor(&self) -> &Tensor {
        match self {
            Self::Tokens { tokens, .. } => tokens,
            Self::Embedded { embedded } => embedded,
        }
    }

    /// Initial embedding weights, present only for the non-static variant.
    pub fn initial_weights(&self) -> Option<&Tensor> {
        match self {
            Self::Tokens {
                initial_weights, ..
            } => initial_weights.as_ref(),
            Self::Embedded { .. } => None,
        }
    }

    /// Whether the embedding has already been applied to the input.
    pub fn is_pre_embedded(&self) -> bool {
        matches!(self, Self::Embedded { .. })
    }

    /// Number of sentences (leading dimension).
    pub fn num_sentences(&self) -> usize {
        self.tensor().dims()[0]
    }
}

/// Resolve an embedding strategy for a corpus.
///
/// The leading dimension of the returned input always equals the corpus
/// sentence count; only the static strategy changes the data's rank. The
/// static and non-static strategies require a word-vector source and fail
/// with `EmbeddingSourceUnavailable` without one; the random strategy never
/// touches the source.
pub fn resolve(
    variant: ModelVariant,
    corpus: &TokenizedCorpus,
    source: Option<&dyn WordVectorSource>,
    embedding_dim: usize,
    seed: u64,
    device: &Device,
) -> Result<ResolvedInput> {
    let tokens = token_matrix(corpus, device)?;
    match variant {
        ModelVariant::Rand => Ok(ResolvedInput::Tokens {
            tokens,
            initial_weights: None,
        }),
        ModelVariant::Static | ModelVariant::NonStatic => {
            let source = source.ok_or_else(|| {
                SentenceCnnError::EmbeddingSourceUnavailable(format!(
                    "variant '{variant}' requires a pretrained word-vector source"
                ))
            })?;
            let table =
                build_lookup_table(source, corpus.vocabulary(), embedding_dim, seed, device)?;
            if variant == ModelVariant::Static {
                let embedded = embed_tokens(&tokens, &table)?;
                Ok(ResolvedInput::Embedded { embedded })
            } else {
                Ok(ResolvedInput::Tokens {
                    tokens,
                    initial_weights: Some(table),
                })
            }
        }
    }
}

/// Materialize the corpus token matrix as a `[N, L]` u32 tensor.
fn token_matrix(corpus: &TokenizedCorpus, device: &Device) -> Result<Tensor> {
    let n = corpus.len();
    let l = corpus.tokens().first().map(Vec::len).unwrap_or(0);
    let flat: Vec<u32> = corpus.tokens().iter().flatten().copied().collect();
    Tensor::from_vec(flat, (n, l), device)
        .map_err(|e| SentenceCnnError::Model(format!("token matrix tensor: {e}")))
}

/// Apply a lookup table to every token, producing a `[N, L, D]` tensor.
fn embed_tokens(tokens: &Tensor, table: &Tensor) -> Result<Tensor> {
    let (n, l) = tokens
        .dims2()
        .map_err(|e| SentenceCnnError::Model(format!("token matrix dims: {e}")))?;
    let d = table.dims()[1];
    let flat = tokens
        .flatten_all()
        .map_err(|e| SentenceCnnError::Model(format!("token flatten: {e}")))?;
    table
        .index_select(&flat, 0)
        .and_then(|t| t.reshape((n, l, d)))
        .map_err(|e| SentenceCnnError::Model(format!("embedding lookup: {e}")))
}
