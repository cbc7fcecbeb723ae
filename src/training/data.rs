//! Train/validation splitting and mini-batch iteration.
//!
//! Each dataset identity implies exactly one split policy; the trainer picks
//! the implementation from [`DatasetId::split_policy`] and never mixes them.

use candle_core::Tensor;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::corpus::SplitAssignment;
use crate::error::{Result, SentenceCnnError};
use crate::model::OutputHead;

/// Train/validation partition with labels already in head target format.
#[derive(Debug)]
pub struct DataSplit {
    pub train_inputs: Tensor,
    pub train_labels: Tensor,
    pub val_inputs: Tensor,
    pub val_labels: Tensor,
    pub train_indices: Vec<usize>,
    pub val_indices: Vec<usize>,
}

/// A strategy for partitioning a corpus into train and validation rows.
pub trait SplitPolicy {
    /// Partition `inputs` (rows) and `labels` into a [`DataSplit`]; label
    /// subsets are materialized as target tensors for `head`.
    fn split(&self, inputs: &Tensor, labels: &[u32], head: OutputHead) -> Result<DataSplit>;
}

/// Seeded-permutation split: shuffle all rows, then hold out the trailing
/// fraction for validation. The same seed always yields the same partition.
pub struct ShuffledSplit {
    pub val_split: f64,
    pub seed: u64,
}

impl SplitPolicy for ShuffledSplit {
    fn split(&self, inputs: &Tensor, labels: &[u32], head: OutputHead) -> Result<DataSplit> {
        let n = check_row_count(inputs, labels)?;
        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        order.shuffle(&mut rng);

        let train_count = (n as f64 * (1.0 - self.val_split)) as usize;
        let train_indices = order[..train_count].to_vec();
        let val_indices = order[train_count..].to_vec();
        build_split(inputs, labels, head, train_indices, val_indices)
    }
}

/// Split driven by the per-sentence assignment shipped with the corpus.
pub struct AssignedSplit {
    assignment: SplitAssignment,
}

impl AssignedSplit {
    pub fn new(assignment: SplitAssignment) -> Self {
        Self { assignment }
    }
}

impl SplitPolicy for AssignedSplit {
    fn split(&self, inputs: &Tensor, labels: &[u32], head: OutputHead) -> Result<DataSplit> {
        let n = check_row_count(inputs, labels)?;
        if self.assignment.len() != n {
            return Err(SentenceCnnError::CorpusShapeMismatch(format!(
                "split assignment covers {} rows but the corpus has {}",
                self.assignment.len(),
                n
            )));
        }
        let train_indices = self.assignment.train_indices();
        if train_indices.is_empty() {
            return Err(SentenceCnnError::MissingSplitAssignment(
                "no rows carry a training split label".to_string(),
            ));
        }
        let val_indices = self.assignment.validation_indices();
        build_split(inputs, labels, head, train_indices, val_indices)
    }
}

fn check_row_count(inputs: &Tensor, labels: &[u32]) -> Result<usize> {
    let n = inputs
        .dim(0)
        .map_err(|e| SentenceCnnError::Training(format!("input rows: {e}")))?;
    if n != labels.len() {
        return Err(SentenceCnnError::CorpusShapeMismatch(format!(
            "{} input rows but {} labels",
            n,
            labels.len()
        )));
    }
    Ok(n)
}

fn build_split(
    inputs: &Tensor,
    labels: &[u32],
    head: OutputHead,
    train_indices: Vec<usize>,
    val_indices: Vec<usize>,
) -> Result<DataSplit> {
    let device = inputs.device().clone();

    let train_inputs = gather_rows(inputs, &train_indices)?;
    let val_inputs = gather_rows(inputs, &val_indices)?;

    let train_label_vec: Vec<u32> = train_indices.iter().map(|&i| labels[i]).collect();
    let val_label_vec: Vec<u32> = val_indices.iter().map(|&i| labels[i]).collect();
    let train_labels = head.labels_to_tensor(&train_label_vec, &device)?;
    let val_labels = head.labels_to_tensor(&val_label_vec, &device)?;

    Ok(DataSplit {
        train_inputs,
        train_labels,
        val_inputs,
        val_labels,
        train_indices,
        val_indices,
    })
}

fn gather_rows(tensor: &Tensor, indices: &[usize]) -> Result<Tensor> {
    let device = tensor.device().clone();
    if indices.is_empty() {
        let mut dims = tensor.dims().to_vec();
        dims[0] = 0;
        return Tensor::zeros(dims.as_slice(), tensor.dtype(), &device)
            .map_err(|e| SentenceCnnError::Training(format!("empty split tensor: {e}")));
    }
    let idx: Vec<u32> = indices.iter().map(|&i| i as u32).collect();
    let idx_tensor = Tensor::new(idx.as_slice(), &device)
        .map_err(|e| SentenceCnnError::Training(format!("index tensor: {e}")))?;
    tensor
        .index_select(&idx_tensor, 0)
        .map_err(|e| SentenceCnnError::Training(format!("gather rows: {e}")))
}

/// Mini-batch iterator over pre-split tensors. Reshuffles indices each epoch;
/// the final batch of an epoch may be short.
pub struct BatchIterator {
    inputs: Tensor,
    labels: Tensor,
    indices: Vec<usize>,
    batch_size: usize,
    pos: usize,
}

impl BatchIterator {
    pub fn new(inputs: Tensor, labels: Tensor, batch_size: usize) -> Self {
        let n = inputs.dim(0).unwrap_or(0);
        Self {
            inputs,
            labels,
            indices: (0..n).collect(),
            batch_size,
            pos: 0,
        }
    }

    /// Reshuffle for a new epoch with an RNG derived from base seed + epoch.
    pub fn reshuffle(&mut self, seed: u64, epoch: usize) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(epoch as u64));
        self.indices.shuffle(&mut rng);
        self.pos = 0;
    }

    /// The next mini-batch, or `None` once the epoch is exhausted.
    pub fn next_batch(&mut self) -> Option<(Tensor, Tensor)> {
        let n = self.indices.len();
        if self.pos >= n {
            return None;
        }

        let end = (self.pos + self.batch_size).min(n);
        let batch_idx: Vec<u32> = self.indices[self.pos..end]
            .iter()
            .map(|&i| i as u32)
            .collect();
        self.pos = end;

        let device = self.inputs.device().clone();
        let idx_tensor = Tensor::new(batch_idx.as_slice(), &device).ok()?;
        let batch_inputs = self.inputs.index_select(&idx_tensor, 0).ok()?;
        let batch_labels = self.labels.index_select(&idx_tensor, 0).ok()?;

        Some((batch_inputs, batch_labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    fn inputs(n: usize) -> Tensor {
        let flat: Vec<u32> = (0..n * 4).map(|i| i as u32).collect();
        Tensor::from_vec(flat, (n, 4), &Device::Cpu).unwrap()
    }

    #[test]
    fn test_shuffled_split_is_disjoint_and_covers_all_rows() {
        let labels: Vec<u32> = (0..10).map(|i| i % 2).collect();
        let policy = ShuffledSplit {
            val_split: 0.2,
            seed: 2,
        };
        let split = policy.split(&inputs(10), &labels, OutputHead::Binary).unwrap();

        assert_eq!(split.train_indices.len(), 8);
        assert_eq!(split.val_indices.len(), 2);
        let mut all: Vec<usize> = split
            .train_indices
            .iter()
            .chain(split.val_indices.iter())
            .copied()
            .collect();
        all.sort();
        assert_eq!(all, (0..10).collect::<Vec<_>>());

        assert_eq!(split.train_inputs.dims(), &[8, 4]);
        assert_eq!(split.val_inputs.dims(), &[2, 4]);
        assert_eq!(split.train_labels.dims(), &[8, 1]);
    }

    #[test]
    fn test_shuffled_split_is_reproducible() {
        let labels: Vec<u32> = (0..10).map(|i| i % 2).collect();
        let policy = ShuffledSplit {
            val_split: 0.3,
            seed: 7,
        };
        let a = policy.split(&inputs(10), &labels, OutputHead::Binary).unwrap();
        let b = policy.split(&inputs(10), &labels, OutputHead::Binary).unwrap();
        assert_eq!(a.train_indices, b.train_indices);
        assert_eq!(a.val_indices, b.val_indices);
    }

    #[test]
    fn test_shuffled_split_with_zero_fraction_has_empty_validation() {
        let labels: Vec<u32> = (0..6).map(|i| i % 2).collect();
        let policy = ShuffledSplit {
            val_split: 0.0,
            seed: 2,
        };
        let split = policy.split(&inputs(6), &labels, OutputHead::Binary).unwrap();
        assert!(split.val_indices.is_empty());
        assert_eq!(split.val_inputs.dims(), &[0, 4]);
    }

    #[test]
    fn test_assigned_split_follows_the_assignment() {
        let labels: Vec<u32> = vec![0, 1, 2, 3, 4, 0];
        let assignment = SplitAssignment::new(vec![1, 2, 1, 3, 1, 2]);
        let policy = AssignedSplit::new(assignment);
        let head = OutputHead::Categorical { classes: 5 };
        let split = policy.split(&inputs(6), &labels, head).unwrap();

        assert_eq!(split.train_indices, vec![0, 2, 4]);
        assert_eq!(split.val_indices, vec![1, 5]);
        assert_eq!(split.train_labels.dims(), &[3, 5]);
        assert_eq!(split.val_labels.dims(), &[2, 5]);
    }

    #[test]
    fn test_assigned_split_rejects_length_mismatch() {
        let labels: Vec<u32> = vec![0, 1, 0];
        let policy = AssignedSplit::new(SplitAssignment::new(vec![1, 2]));
        let err = policy
            .split(&inputs(3), &labels, OutputHead::Binary)
            .unwrap_err();
        assert!(matches!(err, SentenceCnnError::CorpusShapeMismatch(_)));
    }

    #[test]
    fn test_assigned_split_without_training_rows_fails() {
        let labels: Vec<u32> = vec![0, 1, 0];
        let policy = AssignedSplit::new(SplitAssignment::new(vec![3, 3, 2]));
        let err = policy
            .split(&inputs(3), &labels, OutputHead::Binary)
            .unwrap_err();
        assert!(matches!(err, SentenceCnnError::MissingSplitAssignment(_)));
    }

    #[test]
    fn test_batch_iterator_exhausts() {
        let device = Device::Cpu;
        let x = Tensor::zeros((10, 4), DType::F32, &device).unwrap();
        let y = Tensor::zeros((10, 1), DType::F32, &device).unwrap();

        let mut iter = BatchIterator::new(x, y, 3);
        iter.reshuffle(42, 0);

        let mut count = 0;
        let mut rows = 0;
        while let Some((bx, _)) = iter.next_batch() {
            rows += bx.dims()[0];
            count += 1;
        }
        assert_eq!(count, 4); // ceil(10/3)
        assert_eq!(rows, 10);
    }

    #[test]
    fn test_batch_iterator_reshuffle_is_seeded() {
        let device = Device::Cpu;
        let x = inputs(8);
        let y = Tensor::zeros((8, 1), DType::F32, &device).unwrap();

        let mut a = BatchIterator::new(x.clone(), y.clone(), 8);
        let mut b = BatchIterator::new(x, y, 8);
        a.reshuffle(5, 3);
        b.reshuffle(5, 3);

        let (ba, _) = a.next_batch().unwrap();
        let (bb, _) = b.next_batch().unwrap();
        assert_eq!(
            ba.flatten_all().unwrap().to_vec1::<u32>().unwrap(),
            bb.flatten_all().unwrap().to_vec1::<u32>().unwrap()
        );
    }
}
