//! CLI entry point for the sentence classifier training pipeline.

use std::path::PathBuf;

use clap::Parser;

use sentence_cnn::{
    train, DatasetId, Hyperparameters, ModelVariant, Result, SplitAssignment, TokenizedCorpus,
    TrainConfig, Word2VecFile, WordVectorSource,
};

#[derive(Parser)]
#[command(name = "sentence-cnn", about = "Convolutional sentence classifier training")]
struct Cli {
    /// Embedding variant: CNN-rand, CNN-static or CNN-non-static.
    variant: String,

    /// Dataset identity: mr or sst.
    dataset: String,

    /// Tokenized corpus JSON file.
    #[arg(long, default_value = "data/corpus.json")]
    corpus: PathBuf,

    /// Binary word2vec file (required by the static and non-static variants).
    #[arg(long)]
    vectors: Option<PathBuf>,

    /// Per-sentence split assignment file (required by sst).
    #[arg(long)]
    split: Option<PathBuf>,

    /// Output path for trained weights (safetensors).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Training epochs.
    #[arg(long, default_value = "100")]
    epochs: usize,

    /// Mini-batch size.
    #[arg(long, default_value = "50")]
    batch_size: usize,

    /// Word-vector dimensionality.
    #[arg(short = 'e', long, default_value = "300")]
    embedding_dim: usize,

    /// Output channels per convolution branch.
    #[arg(short = 'f', long, default_value = "150")]
    num_filters: usize,

    /// Dense hidden layer width.
    #[arg(short = 'd', long, default_value = "150")]
    hidden_dims: usize,

    /// Seed for shuffles, parameter init and fallback vectors.
    #[arg(long, default_value = "2")]
    seed: u64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // Reject unknown identities before any data is read.
    let variant: ModelVariant = cli.variant.parse()?;
    let dataset: DatasetId = cli.dataset.parse()?;

    let hyper = Hyperparameters {
        num_epochs: cli.epochs,
        batch_size: cli.batch_size,
        embedding_dim: cli.embedding_dim,
        num_filters: cli.num_filters,
        hidden_dims: cli.hidden_dims,
        seed: cli.seed,
        ..Hyperparameters::default()
    };

    let corpus = TokenizedCorpus::from_file(&cli.corpus)?;
    let source = cli
        .vectors
        .as_deref()
        .map(Word2VecFile::from_file)
        .transpose()?;
    let assignment = cli
        .split
        .as_deref()
        .map(SplitAssignment::from_file)
        .transpose()?;

    let config = TrainConfig {
        dataset,
        variant,
        hyper,
        output_path: cli.output,
    };
    let history = train(
        &config,
        &corpus,
        source.as_ref().map(|s| s as &dyn WordVectorSource),
        assignment.as_ref(),
    )?;

    if let Some(last) = history.last() {
        println!("Final epoch {}: {}", last.epoch, last);
    }
    Ok(())
}
