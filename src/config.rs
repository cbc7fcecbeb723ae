//! Dataset identities, model variants and training hyperparameters.
//!
//! A dataset identity fixes the sequence length, the label cardinality and
//! the train/validation split policy together; none of these are
//! independently configurable.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SentenceCnnError;

/// Supported corpora. Each identity implies a fixed sequence length, label
/// cardinality and split policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetId {
    /// Movie-review corpus: one sentence per review, binary sentiment.
    MovieReview,
    /// Stanford Sentiment Treebank: 5-class sentiment, pre-split corpus.
    Sst,
}

/// How the train/validation partition is produced for a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitPolicyKind {
    /// Seeded permutation with a trailing validation fraction.
    Shuffled,
    /// External per-sentence split assignment shipped with the corpus.
    Assigned,
}

impl DatasetId {
    /// Fixed padded sentence length for this corpus.
    pub fn sequence_length(&self) -> usize {
        match self {
            Self::MovieReview => 56,
            Self::Sst => 53,
        }
    }

    /// Number of distinct label classes.
    pub fn num_classes(&self) -> usize {
        match self {
            Self::MovieReview => 2,
            Self::Sst => 5,
        }
    }

    /// Whether the label cardinality is binary.
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::MovieReview)
    }

    /// Split policy implied by this identity.
    pub fn split_policy(&self) -> SplitPolicyKind {
        match self {
            Self::MovieReview => SplitPolicyKind::Shuffled,
            Self::Sst => SplitPolicyKind::Assigned,
        }
    }
}

impl FromStr for DatasetId {
    type Err = SentenceCnnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mr" => Ok(Self::MovieReview),
            "sst" => Ok(Self::Sst),
            other => Err(SentenceCnnError::UnsupportedVariant(format!(
                "unknown dataset '{other}' (expected 'mr' or 'sst')"
            ))),
        }
    }
}

impl std::fmt::Display for DatasetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MovieReview => write!(f, "mr"),
            Self::Sst => write!(f, "sst"),
        }
    }
}

/// Embedding strategy for the classifier.
///
/// - `Rand`: trainable embedding table with random initial weights.
/// - `Static`: pretrained vectors baked into the input; no embedding layer.
/// - `NonStatic`: trainable embedding table initialized from pretrained
///   vectors and updated during training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelVariant {
    Rand,
    Static,
    NonStatic,
}

impl ModelVariant {
    /// Whether this variant consumes a pretrained word-vector source.
    pub fn needs_pretrained_vectors(&self) -> bool {
        matches!(self, Self::Static | Self::NonStatic)
    }
}

impl FromStr for ModelVariant {
    type Err = SentenceCnnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CNN-rand" | "rand" => Ok(Self::Rand),
            "CNN-static" | "static" => Ok(Self::Static),
            "CNN-non-static" | "non-static" => Ok(Self::NonStatic),
            other => Err(SentenceCnnError::UnsupportedVariant(format!(
                "unknown model variation '{other}' \
                 (expected 'CNN-rand', 'CNN-static' or 'CNN-non-static')"
            ))),
        }
    }
}

impl std::fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rand => write!(f, "CNN-rand"),
            Self::Static => write!(f, "CNN-static"),
            Self::NonStatic => write!(f, "CNN-non-static"),
        }
    }
}

/// Numeric configuration for model assembly and training.
///
/// Defaults reproduce the reference setup. Small corpora train well with a
/// much smaller network: `embedding_dim` 20, `num_filters` 3 and
/// `dropout_prob` (0.7, 0.8) reach the reported non-static accuracy on the
/// movie-review corpus.
#[derive(Debug, Clone)]
pub struct Hyperparameters {
    /// Word vector dimensionality (default: 300).
    pub embedding_dim: usize,
    /// Convolution filter widths, one parallel branch each (default: [3, 4]).
    pub filter_sizes: Vec<usize>,
    /// Output channels per convolution branch (default: 150).
    pub num_filters: usize,
    /// Width of the dense hidden layer (default: 150).
    pub hidden_dims: usize,
    /// Dropout rates: (input, hidden) (default: (0.25, 0.5)).
    pub dropout_prob: (f32, f32),
    /// Mini-batch size (default: 50).
    pub batch_size: usize,
    /// Number of training epochs (default: 100).
    pub num_epochs: usize,
    /// Trailing validation fraction under the shuffled split (default: 0.1).
    pub val_split: f64,
    /// Word-vector minimum token count (default: 1).
    pub min_word_count: usize,
    /// Word-vector context window size (default: 10).
    pub context_window: usize,
    /// Seed for all randomized operations: shuffles, parameter init and
    /// out-of-vocabulary fallback vectors (default: 2).
    pub seed: u64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            embedding_dim: 300,
            filter_sizes: vec![3, 4],
            num_filters: 150,
            hidden_dims: 150,
            dropout_prob: (0.25, 0.5),
            batch_size: 50,
            num_epochs: 100,
            val_split: 0.1,
            min_word_count: 1,
            context_window: 10,
            seed: 2,
        }
    }
}
