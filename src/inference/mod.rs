pub mod device;
pub mod loader;
pub mod scoring;
pub mod sequence_classifier;

use anyhow::{anyhow, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use sequence_classifier::SequenceClassifier;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub score: f32,
}

/// Maps raw text to a top-1 label. Implementations are shared across
/// requests without locking, so `classify` must not mutate state.
pub trait TextClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<Prediction>;

    fn labels(&self) -> &[String];

    fn device(&self) -> String;

    /// One prediction per input, in input order. Fails as a whole.
    fn classify_all(&self, texts: &[String]) -> Result<Vec<Prediction>> {
        texts.iter().map(|text| self.classify(text)).collect()
    }
}

/// Holds the process classifier. Empty until startup installs it, then
/// fixed for the life of the process.
#[derive(Clone, Default)]
pub struct ClassifierSlot {
    inner: Arc<OnceCell<Arc<dyn TextClassifier>>>,
}

impl ClassifierSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, classifier: Arc<dyn TextClassifier>) -> Result<()> {
        self.inner
            .set(classifier)
            .map_err(|_| anyhow!("classifier already installed"))
    }

    pub fn get(&self) -> Option<Arc<dyn TextClassifier>> {
        self.inner.get().cloned()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Deterministic stand-in: "bad"/"terrible" text is negative, the rest positive.
    pub struct KeywordClassifier {
        labels: Vec<String>,
    }

    impl KeywordClassifier {
        pub fn new() -> Self {
            Self {
                labels: vec!["NEGATIVE".into(), "POSITIVE".into()],
            }
        }
    }

    impl TextClassifier for KeywordClassifier {
        fn classify(&self, text: &str) -> Result<Prediction> {
            let lower = text.to_lowercase();
            if lower.contains("explode") {
                return Err(anyhow!("forward pass failed"));
            }
            let negative = lower.contains("bad") || lower.contains("terrible");
            let score = 0.5 + (text.len() % 40) as f32 / 100.0;
            Ok(Prediction {
                label: self.labels[usize::from(!negative)].clone(),
                score,
            })
        }

        fn labels(&self) -> &[String] {
            &self.labels
        }

        fn device(&self) -> String {
            "cpu".into()
        }
    }
}
