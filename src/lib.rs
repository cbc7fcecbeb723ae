//! Convolutional sentence classification.
//!
//! A small sentiment classifier for short sentences: an optional trainable
//! embedding layer, parallel multi-width convolution branches with ReLU and
//! max-pooling, and a dense head whose activation and loss are fixed by the
//! dataset's label cardinality.
//!
//! Three embedding variants are supported: `CNN-rand` (random trainable
//! table), `CNN-static` (pretrained vectors baked into the input) and
//! `CNN-non-static` (pretrained vectors fine-tuned during training). Two
//! corpora ship with fixed identities: the movie-review corpus (binary,
//! shuffled split) and the Stanford Sentiment Treebank (5-class, external
//! split assignment).
//!
//! ```no_run
//! use sentence_cnn::{
//!     train, DatasetId, Hyperparameters, ModelVariant, TokenizedCorpus, TrainConfig,
//! };
//!
//! # fn main() -> sentence_cnn::Result<()> {
//! let corpus = TokenizedCorpus::from_file(std::path::Path::new("data/mr.json"))?;
//! let config = TrainConfig {
//!     dataset: DatasetId::MovieReview,
//!     variant: ModelVariant::Rand,
//!     hyper: Hyperparameters::default(),
//!     output_path: None,
//! };
//! let history = train(&config, &corpus, None, None)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod model;
pub mod training;

pub use config::{DatasetId, Hyperparameters, ModelVariant, SplitPolicyKind};
pub use corpus::{SplitAssignment, TokenizedCorpus, Vocabulary};
pub use embedding::{ResolvedInput, Word2VecFile, WordVectorSource};
pub use error::{Result, SentenceCnnError};
pub use model::{ClassifierConfig, ConvBranchEncoder, OutputHead, SentenceCnn};
pub use training::{train, EpochMetrics, TrainConfig};
