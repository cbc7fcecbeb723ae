//! Tokenized corpus, vocabulary and external split assignment.
//!
//! Tokenization and vocabulary construction happen upstream; this module
//! consumes their output: a fixed-width integer token matrix, a label
//! vector and the token↔index mapping, interchanged as a single JSON file.
//! Shape checks run immediately after load so a mislabeled corpus can never
//! reach the fit loop.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::DatasetId;
use crate::error::{Result, SentenceCnnError};

/// Bidirectional mapping between token strings and integer indices.
///
/// Index 0 is conventionally the padding token; the mapping covers every
/// integer that may appear in a token matrix.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    tokens: Vec<String>,
    index: HashMap<String, u32>,
}

impl Vocabulary {
    /// Build a vocabulary from the index-ordered token list.
    pub fn new(tokens: Vec<String>) -> Self {
        let index = tokens
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i as u32))
            .collect();
        Self { tokens, index }
    }

    /// Number of distinct tokens, including reserved entries.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the vocabulary is empty.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Inverse mapping: token string for an index.
    pub fn token(&self, index: u32) -> Option<&str> {
        self.tokens.get(index as usize).map(String::as_str)
    }

    /// Forward mapping: index for a token string.
    pub fn index_of(&self, token: &str) -> Option<u32> {
        self.index.get(token).copied()
    }
}

/// JSON interchange format produced by the upstream tokenizer.
#[derive(Debug, Serialize, Deserialize)]
struct CorpusFile {
    tokens: Vec<Vec<u32>>,
    labels: Vec<u32>,
    vocabulary: Vec<String>,
}

/// A tokenized corpus: fixed-width token matrix, per-sentence labels and
/// the vocabulary both were built against.
#[derive(Debug, Clone)]
pub struct TokenizedCorpus {
    tokens: Vec<Vec<u32>>,
    labels: Vec<u32>,
    vocabulary: Vocabulary,
}

impl TokenizedCorpus {
    /// Assemble a corpus from pre-tokenized parts.
    pub fn new(tokens: Vec<Vec<u32>>, labels: Vec<u32>, vocabulary: Vocabulary) -> Self {
        Self {
            tokens,
            labels,
            vocabulary,
        }
    }

    /// Load a corpus from its JSON interchange file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: CorpusFile = serde_json::from_str(&content)?;
        Ok(Self::new(
            file.tokens,
            file.labels,
            Vocabulary::new(file.vocabulary),
        ))
    }

    /// Number of sentences.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the corpus has no sentences.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The token matrix, one fixed-width row per sentence.
    pub fn tokens(&self) -> &[Vec<u32>] {
        &self.tokens
    }

    /// Per-sentence class labels.
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// The vocabulary the token matrix was built against.
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Check the corpus against a dataset identity's expected shape.
    ///
    /// Verifies row width, label count, label range and that every token id
    /// is a valid vocabulary index. Any disagreement is fatal; a run must
    /// abort before weights are trained.
    pub fn validate(&self, dataset: DatasetId) -> Result<()> {
        let expected_len = dataset.sequence_length();
        if self.tokens.len() != self.labels.len() {
            return Err(SentenceCnnError::CorpusShapeMismatch(format!(
                "{} sentences but {} labels",
                self.tokens.len(),
                self.labels.len()
            )));
        }
        for (i, row) in self.tokens.iter().enumerate() {
            if row.len() != expected_len {
                return Err(SentenceCnnError::CorpusShapeMismatch(format!(
                    "sentence {} has length {} but dataset '{}' expects {}",
                    i,
                    row.len(),
                    dataset,
                    expected_len
                )));
            }
            if let Some(&tok) = row.iter().find(|&&t| t as usize >= self.vocabulary.len()) {
                return Err(SentenceCnnError::CorpusShapeMismatch(format!(
                    "sentence {} contains token id {} outside vocabulary of size {}",
                    i,
                    tok,
                    self.vocabulary.len()
                )));
            }
        }
        let num_classes = dataset.num_classes() as u32;
        if let Some(&label) = self.labels.iter().find(|&&l| l >= num_classes) {
            return Err(SentenceCnnError::CorpusShapeMismatch(format!(
                "label {} out of range for dataset '{}' with {} classes",
                label, dataset, num_classes
            )));
        }
        Ok(())
    }
}

/// Per-sentence train/validation assignment shipped with a pre-split corpus.
///
/// Parsed from a tabular file with a header row and a `splitset_label`
/// column: 1 marks training rows, 2 validation rows; any other value is
/// ignored (test rows, by upstream convention).
#[derive(Debug, Clone)]
pub struct SplitAssignment {
    labels: Vec<u32>,
}

/// Split label marking a training row.
const SPLIT_TRAIN: u32 = 1;
/// Split label marking a validation row.
const SPLIT_VALIDATION: u32 = 2;

impl SplitAssignment {
    /// Build an assignment from raw per-sentence split labels.
    pub fn new(labels: Vec<u32>) -> Self {
        Self { labels }
    }

    /// Parse the tabular split file (comma-separated, header row).
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut lines = content.lines();
        let header = lines.next().ok_or_else(|| {
            SentenceCnnError::MissingSplitAssignment(format!("{} is empty", path.display()))
        })?;
        let column = header
            .split(',')
            .position(|c| c.trim() == "splitset_label")
            .ok_or_else(|| {
                SentenceCnnError::MissingSplitAssignment(format!(
                    "no 'splitset_label' column in {}",
                    path.display()
                ))
            })?;

        let mut labels = Vec::new();
        for (line_num, line) in lines.enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let field = line.split(',').nth(column).ok_or_else(|| {
                SentenceCnnError::MissingSplitAssignment(format!(
                    "row {} of {} has no split column",
                    line_num + 2,
                    path.display()
                ))
            })?;
            let value = field.trim().parse::<u32>().map_err(|e| {
                SentenceCnnError::MissingSplitAssignment(format!(
                    "row {} of {}: {e}",
                    line_num + 2,
                    path.display()
                ))
            })?;
            labels.push(value);
        }
        Ok(Self::new(labels))
    }

    /// Number of assigned rows.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the assignment covers no rows.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Indices of rows labeled for training.
    pub fn train_indices(&self) -> Vec<usize> {
        self.indices_with(SPLIT_TRAIN)
    }

    /// Indices of rows labeled for validation.
    pub fn validation_indices(&self) -> Vec<usize> {
        self.indices_with(SPLIT_VALIDATION)
    }

    fn indices_with(&self, label: u32) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, &l)| l == label)
            .map(|(i, _)| i)
            .collect()
    }
}
