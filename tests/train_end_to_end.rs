//! End-to-end training runs over synthetic corpora for both dataset
//! identities and all three embedding variants.

use std::collections::HashMap;
use std::io::Write;

use sentence_cnn::{
    train, DatasetId, Hyperparameters, ModelVariant, SentenceCnnError, SplitAssignment,
    TokenizedCorpus, TrainConfig, Vocabulary, Word2VecFile, WordVectorSource,
};

const VOCAB: [&str; 6] = ["<pad>", "good", "bad", "great", "awful", "fine"];

fn vocabulary() -> Vocabulary {
    Vocabulary::new(VOCAB.iter().map(|s| s.to_string()).collect())
}

/// Synthetic corpus shaped for a dataset identity: fixed-width rows, labels
/// cycling through the full class range.
fn synthetic_corpus(dataset: DatasetId, rows: usize) -> TokenizedCorpus {
    let seq = dataset.sequence_length();
    let classes = dataset.num_classes() as u32;
    let tokens: Vec<Vec<u32>> = (0..rows)
        .map(|i| {
            let mut row = vec![0u32; seq];
            row[0] = (i % 5 + 1) as u32;
            row[1] = ((i + 2) % 5 + 1) as u32;
            row[2] = ((i + 4) % 5 + 1) as u32;
            row
        })
        .collect();
    let labels = (0..rows).map(|i| i as u32 % classes).collect();
    TokenizedCorpus::new(tokens, labels, vocabulary())
}

fn tiny_hyper() -> Hyperparameters {
    Hyperparameters {
        embedding_dim: 6,
        filter_sizes: vec![3, 4],
        num_filters: 2,
        hidden_dims: 4,
        batch_size: 5,
        num_epochs: 1,
        ..Hyperparameters::default()
    }
}

/// Write a binary word2vec file covering part of the test vocabulary.
fn write_word2vec(dir: &std::path::Path, dimension: usize) -> std::path::PathBuf {
    let path = dir.join("vectors.bin");
    let words = ["good", "bad", "great"];
    let mut file = std::fs::File::create(&path).unwrap();
    write!(file, "{} {}\n", words.len(), dimension).unwrap();
    for (i, word) in words.iter().enumerate() {
        write!(file, "{word} ").unwrap();
        for d in 0..dimension {
            let v = (i as f32 + 1.0) * 0.1 + d as f32 * 0.01;
            file.write_all(&v.to_le_bytes()).unwrap();
        }
    }
    path
}

#[test]
fn movie_review_rand_variant_trains_and_reports_metrics() {
    let config = TrainConfig {
        dataset: DatasetId::MovieReview,
        variant: ModelVariant::Rand,
        hyper: Hyperparameters {
            num_epochs: 2,
            ..tiny_hyper()
        },
        output_path: None,
    };
    let corpus = synthetic_corpus(DatasetId::MovieReview, 30);

    let history = train(&config, &corpus, None, None).unwrap();
    assert_eq!(history.len(), 2);
    for m in &history {
        assert!(m.train_loss.is_finite() && m.train_loss >= 0.0);
        assert!((0.0..=1.0).contains(&m.train_accuracy));
        assert!(m.val_loss.is_finite() && m.val_loss >= 0.0);
        assert!((0.0..=1.0).contains(&m.val_accuracy));
    }
}

#[test]
fn sst_static_variant_trains_under_the_assigned_split() {
    let dir = tempfile::tempdir().unwrap();
    let vectors = write_word2vec(dir.path(), 6);
    let source = Word2VecFile::from_file(&vectors).unwrap();

    let corpus = synthetic_corpus(DatasetId::Sst, 20);
    // 15 train rows, 4 validation rows, 1 ignored.
    let mut split_labels = vec![1u32; 15];
    split_labels.extend([2, 2, 2, 2, 3]);
    let assignment = SplitAssignment::new(split_labels);

    let config = TrainConfig {
        dataset: DatasetId::Sst,
        variant: ModelVariant::Static,
        hyper: tiny_hyper(),
        output_path: None,
    };
    let history = train(
        &config,
        &corpus,
        Some(&source as &dyn WordVectorSource),
        Some(&assignment),
    )
    .unwrap();

    assert_eq!(history.len(), 1);
    let m = &history[0];
    assert!(m.train_loss.is_finite());
    assert!(m.val_loss.is_finite());
    assert!((0.0..=1.0).contains(&m.val_accuracy));
}

#[test]
fn non_static_variant_trains_from_a_word2vec_file() {
    let dir = tempfile::tempdir().unwrap();
    let vectors = write_word2vec(dir.path(), 6);
    let source = Word2VecFile::from_file(&vectors).unwrap();

    let config = TrainConfig {
        dataset: DatasetId::MovieReview,
        variant: ModelVariant::NonStatic,
        hyper: tiny_hyper(),
        output_path: None,
    };
    let corpus = synthetic_corpus(DatasetId::MovieReview, 20);

    let history = train(
        &config,
        &corpus,
        Some(&source as &dyn WordVectorSource),
        None,
    )
    .unwrap();
    assert_eq!(history.len(), 1);
}

#[test]
fn pretrained_variant_without_vectors_fails_before_training() {
    let config = TrainConfig {
        dataset: DatasetId::MovieReview,
        variant: ModelVariant::Static,
        hyper: tiny_hyper(),
        output_path: None,
    };
    let corpus = synthetic_corpus(DatasetId::MovieReview, 10);

    let err = train(&config, &corpus, None, None).unwrap_err();
    assert!(matches!(
        err,
        SentenceCnnError::EmbeddingSourceUnavailable(_)
    ));
}

#[test]
fn trained_weights_round_trip_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("weights.safetensors");
    let config = TrainConfig {
        dataset: DatasetId::MovieReview,
        variant: ModelVariant::Rand,
        hyper: tiny_hyper(),
        output_path: Some(path.clone()),
    };
    let corpus = synthetic_corpus(DatasetId::MovieReview, 10);

    train(&config, &corpus, None, None).unwrap();
    assert!(path.exists());
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}

#[test]
fn same_seed_reproduces_the_metric_history() {
    // Dropout draws from the device RNG, so it is disabled here; everything
    // else (init, shuffles, fallback vectors) is seeded.
    let make_history = || {
        let config = TrainConfig {
            dataset: DatasetId::MovieReview,
            variant: ModelVariant::Rand,
            hyper: Hyperparameters {
                dropout_prob: (0.0, 0.0),
                ..tiny_hyper()
            },
            output_path: None,
        };
        let corpus = synthetic_corpus(DatasetId::MovieReview, 20);
        train(&config, &corpus, None, None).unwrap()
    };
    assert_eq!(make_history(), make_history());
}

#[test]
fn word2vec_source_covers_exactly_the_written_words() {
    let dir = tempfile::tempdir().unwrap();
    let vectors = write_word2vec(dir.path(), 6);
    let source = Word2VecFile::from_file(&vectors).unwrap();

    assert_eq!(source.dimension(), 6);
    let covered: HashMap<&str, bool> = VOCAB
        .iter()
        .map(|&w| (w, source.vector(w).is_some()))
        .collect();
    assert!(covered["good"] && covered["bad"] && covered["great"]);
    assert!(!covered["<pad>"] && !covered["awful"] && !covered["fine"]);
}
