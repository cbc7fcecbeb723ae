//! Per-epoch training metrics.

/// Metrics reported after every epoch, in a fixed order: training loss,
/// training accuracy, validation loss, validation accuracy. Validation
/// fields are zero when the validation set is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
}

impl std::fmt::Display for EpochMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "loss={:.4} acc={:.4} val_loss={:.4} val_acc={:.4}",
            self.train_loss, self.train_accuracy, self.val_loss, self.val_accuracy
        )
    }
}
