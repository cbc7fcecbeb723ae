//! Convolutional sentence classifier.
//!
//! # Architecture
//!
//! ```text
//! tokens [N, L] ──(optional Embedding)──► [N, L, D]
//!   → Dropout(p0)
//!   → parallel per-width branches: Conv1d → ReLU → MaxPool(2) → Flatten
//!   → concat → Linear(hidden) → Dropout(p1) → ReLU → Linear(label_width)
//!   → sigmoid (binary) | softmax (multi-class)
//! ```
//!
//! The embedding layer is omitted entirely when the input is already
//! embedded (static variant); the choice is made once at assembly time.
//! The pooling window is a sliding length-2 max-pool, not a pool over the
//! whole feature map, so each branch keeps a longer pooled feature map.

use candle_core::{DType, Device, Tensor, D};
use candle_nn::{Conv1d, Conv1dConfig, Dropout, Embedding, Linear, Module, VarBuilder, VarMap};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::DatasetId;
use crate::error::{Result, SentenceCnnError};

/// Uniform init range for trainable embedding tables (random variant).
const EMBEDDING_INIT_RANGE: f64 = 0.05;

/// Output head pairing label width, activation and loss.
///
/// The pairing is derived from the dataset identity alone and is carried as
/// one unit: binary ⇒ sigmoid + binary cross-entropy, multi-class ⇒
/// softmax + categorical cross-entropy. No other combination can be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputHead {
    /// Single sigmoid unit trained with binary cross-entropy.
    Binary,
    /// Softmax over `classes` units trained with categorical cross-entropy
    /// against one-hot targets.
    Categorical { classes: usize },
}

impl OutputHead {
    /// The head implied by a dataset's label cardinality.
    pub fn for_dataset(dataset: DatasetId) -> Self {
        if dataset.is_binary() {
            Self::Binary
        } else {
            Self::Categorical {
                classes: dataset.num_classes(),
            }
        }
    }

    /// Width of the output projection.
    pub fn label_width(&self) -> usize {
        match self {
            Self::Binary => 1,
            Self::Categorical { classes } => *classes,
        }
    }

    /// Materialize class labels as the target tensor for this head:
    /// `[N, 1]` floats for binary, one-hot `[N, classes]` otherwise.
    pub fn labels_to_tensor(&self, labels: &[u32], device: &Device) -> Result<Tensor> {
        let n = labels.len();
        match self {
            Self::Binary => {
                let values: Vec<f32> = labels.iter().map(|&l| l as f32).collect();
                Tensor::from_vec(values, (n, 1), device)
                    .map_err(|e| SentenceCnnError::Model(format!("binary targets: {e}")))
            }
            Self::Categorical { classes } => {
                let mut values = vec![0f32; n * classes];
                for (i, &label) in labels.iter().enumerate() {
                    values[i * classes + label as usize] = 1.0;
                }
                Tensor::from_vec(values, (n, *classes), device)
                    .map_err(|e| SentenceCnnError::Model(format!("one-hot targets: {e}")))
            }
        }
    }

    /// Loss paired with this head's activation, computed from raw logits.
    pub fn loss(&self, logits: &Tensor, targets: &Tensor) -> Result<Tensor> {
        match self {
            Self::Binary => candle_nn::loss::binary_cross_entropy_with_logit(logits, targets)
                .map_err(|e| SentenceCnnError::Model(format!("binary cross-entropy: {e}"))),
            Self::Categorical { .. } => {
                let log_probs = candle_nn::ops::log_softmax(logits, D::Minus1)
                    .map_err(|e| SentenceCnnError::Model(format!("log-softmax: {e}")))?;
                (targets * &log_probs)
                    .and_then(|t| t.sum(D::Minus1))
                    .and_then(|t| t.mean_all())
                    .and_then(|t| t.neg())
                    .map_err(|e| {
                        SentenceCnnError::Model(format!("categorical cross-entropy: {e}"))
                    })
            }
        }
    }

    /// Output activation paired with this head.
    pub fn activate(&self, logits: &Tensor) -> Result<Tensor> {
        match self {
            Self::Binary => candle_nn::ops::sigmoid(logits)
                .map_err(|e| SentenceCnnError::Model(format!("sigmoid: {e}"))),
            Self::Categorical { .. } => candle_nn::ops::softmax(logits, D::Minus1)
                .map_err(|e| SentenceCnnError::Model(format!("softmax: {e}"))),
        }
    }

    /// Fraction of rows whose prediction matches the target.
    pub fn accuracy(&self, logits: &Tensor, targets: &Tensor) -> Result<f64> {
        let map = |e: candle_core::Error| SentenceCnnError::Model(format!("accuracy: {e}"));
        let correct = match self {
            Self::Binary => {
                let probs: Vec<Vec<f32>> = self.activate(logits)?.to_vec2().map_err(map)?;
                let truth: Vec<Vec<f32>> = targets.to_vec2().map_err(map)?;
                probs
                    .iter()
                    .zip(truth.iter())
                    .filter(|(p, t)| (p[0] >= 0.5) == (t[0] >= 0.5))
                    .count()
            }
            Self::Categorical { .. } => {
                let preds: Vec<u32> = logits.argmax(D::Minus1).map_err(map)?.to_vec1().map_err(map)?;
                let truth: Vec<u32> =
                    targets.argmax(D::Minus1).map_err(map)?.to_vec1().map_err(map)?;
                preds.iter().zip(truth.iter()).filter(|(p, t)| p == t).count()
            }
        };
        let n = logits.dims()[0];
        if n == 0 {
            return Ok(0.0);
        }
        Ok(correct as f64 / n as f64)
    }
}

/// Parallel multi-filter-width convolutional encoder.
///
/// One Conv1d per filter width (valid padding, stride 1), ReLU, a
/// non-overlapping length-2 max-pool and a flatten per branch; branch
/// outputs are concatenated in filter-width order. A single configured
/// width uses that branch's output directly.
#[derive(Debug)]
pub struct ConvBranchEncoder {
    convs: Vec<Conv1d>,
    filter_sizes: Vec<usize>,
    num_filters: usize,
}

impl ConvBranchEncoder {
    /// Create the per-width convolution branches under `vb`.
    pub fn new(
        filter_sizes: &[usize],
        num_filters: usize,
        embedding_dim: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        let mut convs = Vec::with_capacity(filter_sizes.len());
        for (i, &width) in filter_sizes.iter().enumerate() {
            let conv = candle_nn::conv1d(
                embedding_dim,
                num_filters,
                width,
                Conv1dConfig::default(),
                vb.pp(format!("branch{i}")),
            )
            .map_err(|e| {
                SentenceCnnError::Model(format!("conv branch for width {width}: {e}"))
            })?;
            convs.push(conv);
        }
        Ok(Self {
            convs,
            filter_sizes: filter_sizes.to_vec(),
            num_filters,
        })
    }

    /// Width of the concatenated feature vector for a given sequence length:
    /// sum over widths of `num_filters * floor((L - w + 1) / 2)`.
    pub fn feature_dim(&self, sequence_length: usize) -> usize {
        self.filter_sizes
            .iter()
            .map(|&w| self.num_filters * ((sequence_length - w + 1) / 2))
            .sum()
    }

    /// Encode an embedded batch `[B, L, D]` into features `[B, F]`.
    pub fn forward(&self, embedded: &Tensor) -> Result<Tensor> {
        let map = |what: &'static str| {
            move |e: candle_core::Error| SentenceCnnError::Model(format!("{what}: {e}"))
        };
        // Conv1d expects channels-first input.
        let x = embedded
            .transpose(1, 2)
            .and_then(|t| t.contiguous())
            .map_err(map("encoder transpose"))?;

        let mut branches = Vec::with_capacity(self.convs.len());
        for (conv, &width) in self.convs.iter().zip(self.filter_sizes.iter()) {
            let h = conv
                .forward(&x)
                .and_then(|t| t.relu())
                .map_err(|e| SentenceCnnError::Model(format!("conv width {width}: {e}")))?;
            let pooled = h
                .unsqueeze(2)
                .and_then(|t| t.max_pool2d((1, 2)))
                .and_then(|t| t.flatten_from(1))
                .map_err(|e| SentenceCnnError::Model(format!("pool width {width}: {e}")))?;
            branches.push(pooled);
        }

        if branches.len() == 1 {
            return Ok(branches.remove(0));
        }
        let refs: Vec<&Tensor> = branches.iter().collect();
        Tensor::cat(&refs, 1).map_err(map("branch concat"))
    }
}

/// Assembly-time configuration for the classifier.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Fixed padded sentence length.
    pub sequence_length: usize,
    /// Vocabulary size (embedding rows); unused when `pre_embedded`.
    pub vocab_size: usize,
    /// Embedding dimensionality.
    pub embedding_dim: usize,
    /// Convolution filter widths, one branch each.
    pub filter_sizes: Vec<usize>,
    /// Output channels per branch.
    pub num_filters: usize,
    /// Dense hidden layer width.
    pub hidden_dims: usize,
    /// Dropout rates (input, hidden).
    pub dropout_prob: (f32, f32),
    /// Output head (label width + activation + loss).
    pub head: OutputHead,
    /// Input is pre-embedded; omit the embedding layer entirely.
    pub pre_embedded: bool,
    /// Seed for reproducible parameter initialization.
    pub seed: u64,
}

/// The convolutional sentence classifier.
#[derive(Debug)]
pub struct SentenceCnn {
    embedding: Option<Embedding>,
    dropout_input: Dropout,
    encoder: ConvBranchEncoder,
    fc1: Linear,
    dropout_hidden: Dropout,
    fc2: Linear,
    head: OutputHead,
}

impl SentenceCnn {
    /// Assemble the classifier with all trainable parameters in `varmap`.
    ///
    /// `initial_embedding` seeds the trainable embedding table (non-static
    /// variant); its shape must match `(vocab_size, embedding_dim)` exactly,
    /// any disagreement is fatal at construction time.
    pub fn new(
        varmap: &VarMap,
        device: &Device,
        config: &ClassifierConfig,
        initial_embedding: Option<&Tensor>,
    ) -> Result<Self> {
        if config.pre_embedded && initial_embedding.is_some() {
            return Err(SentenceCnnError::Model(
                "initial embedding weights provided but the input is pre-embedded".to_string(),
            ));
        }

        let vb = VarBuilder::from_varmap(varmap, DType::F32, device);

        let embedding = if config.pre_embedded {
            None
        } else {
            let layer = candle_nn::embedding(
                config.vocab_size,
                config.embedding_dim,
                vb.pp("embedding"),
            )
            .map_err(|e| SentenceCnnError::Model(format!("embedding layer: {e}")))?;
            Some(layer)
        };

        let encoder = ConvBranchEncoder::new(
            &config.filter_sizes,
            config.num_filters,
            config.embedding_dim,
            vb.pp("encoder"),
        )?;

        let feature_dim = encoder.feature_dim(config.sequence_length);
        let fc1 = candle_nn::linear(feature_dim, config.hidden_dims, vb.pp("fc1"))
            .map_err(|e| SentenceCnnError::Model(format!("fc1: {e}")))?;
        let fc2 = candle_nn::linear(config.hidden_dims, config.head.label_width(), vb.pp("fc2"))
            .map_err(|e| SentenceCnnError::Model(format!("fc2: {e}")))?;

        seed_parameters(varmap, config.seed)?;

        if let Some(weights) = initial_embedding {
            set_embedding_weights(varmap, weights, config.vocab_size, config.embedding_dim)?;
        }

        Ok(Self {
            embedding,
            dropout_input: Dropout::new(config.dropout_prob.0),
            encoder,
            fc1,
            dropout_hidden: Dropout::new(config.dropout_prob.1),
            fc2,
            head: config.head,
        })
    }

    /// The output head this classifier was assembled with.
    pub fn head(&self) -> OutputHead {
        self.head
    }

    /// Forward pass up to the raw output projection.
    ///
    /// `input` is `[B, L]` token ids when the model owns an embedding layer,
    /// or `[B, L, D]` pre-embedded floats otherwise. Dropout applies only in
    /// train mode.
    pub fn forward_logits(&self, input: &Tensor, train: bool) -> Result<Tensor> {
        let map = |what: &'static str| {
            move |e: candle_core::Error| SentenceCnnError::Model(format!("{what}: {e}"))
        };
        let embedded = match &self.embedding {
            Some(layer) => layer.forward(input).map_err(map("embedding forward"))?,
            None => input.clone(),
        };
        let x = self
            .dropout_input
            .forward(&embedded, train)
            .map_err(map("input dropout"))?;
        let features = self.encoder.forward(&x)?;
        let h = self.fc1.forward(&features).map_err(map("fc1 forward"))?;
        let h = self
            .dropout_hidden
            .forward(&h, train)
            .map_err(map("hidden dropout"))?;
        let h = h.relu().map_err(map("hidden relu"))?;
        self.fc2.forward(&h).map_err(map("fc2 forward"))
    }

    /// Output probabilities in eval mode (head activation applied).
    pub fn predict(&self, input: &Tensor) -> Result<Tensor> {
        let logits = self.forward_logits(input, false)?;
        self.head.activate(&logits)
    }
}

/// Deterministically initialize all parameters in `varmap` from `seed`.
///
/// Weights get Glorot-uniform values (embedding tables a fixed small
/// uniform range), biases zero. Variables are visited in sorted name order
/// so two runs with the same seed produce identical initial parameters on
/// any device.
fn seed_parameters(varmap: &VarMap, seed: u64) -> Result<()> {
    let data = varmap
        .data()
        .lock()
        .map_err(|_| SentenceCnnError::Model("parameter map lock poisoned".to_string()))?;
    let mut names: Vec<String> = data.keys().cloned().collect();
    names.sort();

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for name in names {
        let var = &data[&name];
        let tensor = var.as_tensor();
        let dims = tensor.dims().to_vec();
        let count = tensor.elem_count();

        let values: Vec<f32> = if name.ends_with(".bias") {
            vec![0.0; count]
        } else {
            let bound = if name == "embedding.weight" {
                EMBEDDING_INIT_RANGE
            } else {
                let (fan_in, fan_out) = fans(&dims);
                (6.0 / (fan_in + fan_out) as f64).sqrt()
            };
            (0..count)
                .map(|_| rng.gen_range(-bound..bound) as f32)
                .collect()
        };

        let init = Tensor::from_vec(values, dims.as_slice(), tensor.device())
            .map_err(|e| SentenceCnnError::Model(format!("init '{name}': {e}")))?;
        var.set(&init)
            .map_err(|e| SentenceCnnError::Model(format!("set '{name}': {e}")))?;
    }
    Ok(())
}

/// Fan-in/fan-out for a weight shape: `[out, in]` for linear layers,
/// `[out, in, k]` for convolutions.
fn fans(dims: &[usize]) -> (usize, usize) {
    match dims {
        [out, inp] => (*inp, *out),
        [out, inp, k] => (inp * k, out * k),
        _ => {
            let n: usize = dims.iter().product();
            (n, n)
        }
    }
}

/// Overwrite the embedding table with pretrained weights, shape-checked.
fn set_embedding_weights(
    varmap: &VarMap,
    weights: &Tensor,
    vocab_size: usize,
    embedding_dim: usize,
) -> Result<()> {
    if weights.dims() != [vocab_size, embedding_dim] {
        return Err(SentenceCnnError::CorpusShapeMismatch(format!(
            "initial embedding weights have shape {:?} but the layer expects [{}, {}]",
            weights.dims(),
            vocab_size,
            embedding_dim
        )));
    }
    let data = varmap
        .data()
        .lock()
        .map_err(|_| SentenceCnnError::Model("parameter map lock poisoned".to_string()))?;
    let var = data.get("embedding.weight").ok_or_else(|| {
        SentenceCnnError::Model("embedding.weight not found in parameter map".to_string())
    })?;
    var.set(weights)
        .map_err(|e| SentenceCnnError::Model(format!("seed embedding weights: {e}")))
}
