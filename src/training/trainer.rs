//! The fit loop: resolve inputs, split, assemble the model and train.

use std::path::{Path, PathBuf};

use candle_core::{Device, Tensor};
use candle_nn::{Optimizer, VarMap};
use tracing::info;

use crate::config::{DatasetId, Hyperparameters, ModelVariant, SplitPolicyKind};
use crate::corpus::{SplitAssignment, TokenizedCorpus};
use crate::embedding::{self, WordVectorSource};
use crate::error::{Result, SentenceCnnError};
use crate::model::{ClassifierConfig, OutputHead, SentenceCnn};
use crate::training::data::{AssignedSplit, BatchIterator, DataSplit, ShuffledSplit, SplitPolicy};
use crate::training::metrics::EpochMetrics;

/// A full training run: dataset identity, embedding variant, numeric
/// hyperparameters and an optional weight output path.
pub struct TrainConfig {
    pub dataset: DatasetId,
    pub variant: ModelVariant,
    pub hyper: Hyperparameters,
    /// Trained weights are written here (safetensors) when set.
    pub output_path: Option<PathBuf>,
}

/// Run the training pipeline end to end.
///
/// Validates the corpus, resolves the embedding strategy, partitions the
/// data under the dataset's split policy, assembles the classifier and fits
/// it for the configured number of epochs. Returns the per-epoch metric
/// history; weights are saved once after the final epoch.
///
/// The pre-split corpus requires `assignment`; the shuffled-split corpus
/// ignores it. `source` is required exactly when the variant consumes
/// pretrained vectors.
pub fn train(
    config: &TrainConfig,
    corpus: &TokenizedCorpus,
    source: Option<&dyn WordVectorSource>,
    assignment: Option<&SplitAssignment>,
) -> Result<Vec<EpochMetrics>> {
    let device = Device::Cpu;
    let hyper = &config.hyper;

    corpus.validate(config.dataset)?;
    info!(
        dataset = %config.dataset,
        variant = %config.variant,
        sentences = corpus.len(),
        vocabulary = corpus.vocabulary().len(),
        "corpus validated"
    );

    let resolved = embedding::resolve(
        config.variant,
        corpus,
        source,
        hyper.embedding_dim,
        hyper.seed,
        &device,
    )?;

    let head = OutputHead::for_dataset(config.dataset);
    let split = split_corpus(config, corpus, assignment, &resolved, head)?;
    info!(
        train = split.train_indices.len(),
        validation = split.val_indices.len(),
        "corpus partitioned"
    );

    let varmap = VarMap::new();
    let model = SentenceCnn::new(
        &varmap,
        &device,
        &ClassifierConfig {
            sequence_length: config.dataset.sequence_length(),
            vocab_size: corpus.vocabulary().len(),
            embedding_dim: hyper.embedding_dim,
            filter_sizes: hyper.filter_sizes.clone(),
            num_filters: hyper.num_filters,
            hidden_dims: hyper.hidden_dims,
            dropout_prob: hyper.dropout_prob,
            head,
            pre_embedded: resolved.is_pre_embedded(),
            seed: hyper.seed,
        },
        resolved.initial_weights(),
    )?;

    let mut optimizer = candle_nn::AdamW::new(
        varmap.all_vars(),
        candle_nn::ParamsAdamW::default(),
    )
    .map_err(|e| SentenceCnnError::Training(format!("optimizer: {e}")))?;

    let mut batch_iter = BatchIterator::new(
        split.train_inputs.clone(),
        split.train_labels.clone(),
        hyper.batch_size,
    );

    let mut history = Vec::with_capacity(hyper.num_epochs);
    for epoch in 0..hyper.num_epochs {
        batch_iter.reshuffle(hyper.seed, epoch);

        let mut loss_sum = 0.0;
        let mut correct_sum = 0.0;
        let mut batch_count = 0usize;
        let mut row_count = 0usize;

        while let Some((batch_inputs, batch_labels)) = batch_iter.next_batch() {
            let logits = model.forward_logits(&batch_inputs, true)?;
            let loss = head.loss(&logits, &batch_labels)?;
            optimizer
                .backward_step(&loss)
                .map_err(|e| SentenceCnnError::Training(format!("backward step: {e}")))?;

            let rows = batch_inputs.dims()[0];
            let loss_value: f32 = loss
                .to_scalar()
                .map_err(|e| SentenceCnnError::Training(format!("loss scalar: {e}")))?;
            loss_sum += loss_value as f64;
            correct_sum += head.accuracy(&logits, &batch_labels)? * rows as f64;
            batch_count += 1;
            row_count += rows;
        }

        let (val_loss, val_accuracy) =
            validate(&model, head, &split.val_inputs, &split.val_labels)?;

        let metrics = EpochMetrics {
            epoch: epoch + 1,
            train_loss: if batch_count > 0 {
                loss_sum / batch_count as f64
            } else {
                0.0
            },
            train_accuracy: if row_count > 0 {
                correct_sum / row_count as f64
            } else {
                0.0
            },
            val_loss,
            val_accuracy,
        };
        info!(epoch = metrics.epoch, "{metrics}");
        history.push(metrics);
    }

    if let Some(path) = &config.output_path {
        save_weights(&varmap, path)?;
        info!(path = %path.display(), "weights saved");
    }

    Ok(history)
}

fn split_corpus(
    config: &TrainConfig,
    corpus: &TokenizedCorpus,
    assignment: Option<&SplitAssignment>,
    resolved: &embedding::ResolvedInput,
    head: OutputHead,
) -> Result<DataSplit> {
    let policy: Box<dyn SplitPolicy> = match config.dataset.split_policy() {
        SplitPolicyKind::Shuffled => Box::new(ShuffledSplit {
            val_split: config.hyper.val_split,
            seed: config.hyper.seed,
        }),
        SplitPolicyKind::Assigned => {
            let assignment = assignment.ok_or_else(|| {
                SentenceCnnError::MissingSplitAssignment(format!(
                    "dataset '{}' ships a split assignment and requires it",
                    config.dataset
                ))
            })?;
            Box::new(AssignedSplit::new(assignment.clone()))
        }
    };
    policy.split(resolved.tensor(), corpus.labels(), head)
}

/// Evaluate the model on the whole validation set in eval mode.
fn validate(
    model: &SentenceCnn,
    head: OutputHead,
    val_inputs: &Tensor,
    val_labels: &Tensor,
) -> Result<(f64, f64)> {
    let n = val_inputs
        .dim(0)
        .map_err(|e| SentenceCnnError::Training(format!("validation rows: {e}")))?;
    if n == 0 {
        return Ok((0.0, 0.0));
    }
    let logits = model.forward_logits(val_inputs, false)?;
    let loss: f32 = head
        .loss(&logits, val_labels)?
        .to_scalar()
        .map_err(|e| SentenceCnnError::Training(format!("validation loss scalar: {e}")))?;
    let accuracy = head.accuracy(&logits, val_labels)?;
    Ok((loss as f64, accuracy))
}

fn save_weights(varmap: &VarMap, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    varmap
        .save(path)
        .map_err(|e| SentenceCnnError::Training(format!("save weights: {e}")))
}
