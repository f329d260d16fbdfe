use anyhow::{anyhow, Result};
use candle::{DType, Tensor, D};
use serde::Deserialize;
use std::collections::HashMap;

use super::Prediction;

/// Classification-related fields of a `config.json`; the encoder fields are
/// read separately by the architecture loaders.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeadConfig {
    #[serde(default)]
    pub model_type: Option<String>,
    #[serde(default)]
    pub id2label: Option<HashMap<String, String>>,
    #[serde(default)]
    pub num_labels: Option<usize>,
    #[serde(default)]
    pub problem_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreFunction {
    Softmax,
    Sigmoid,
}

impl ScoreFunction {
    pub fn for_head(config: &HeadConfig, num_labels: usize) -> Self {
        let multi_label = config.problem_type.as_deref() == Some("multi_label_classification");
        if multi_label || num_labels == 1 {
            Self::Sigmoid
        } else {
            Self::Softmax
        }
    }

    /// Turns a `(num_labels,)` logits tensor into per-label scores in [0, 1].
    pub fn apply(self, logits: &Tensor) -> Result<Vec<f32>> {
        let logits = logits.to_dtype(DType::F32)?;
        let probs = match self {
            Self::Softmax => candle_nn::ops::softmax(&logits, D::Minus1)?,
            Self::Sigmoid => candle_nn::ops::sigmoid(&logits)?,
        };
        Ok(probs.to_vec1::<f32>()?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    pub fn from_config(config: &HeadConfig) -> Result<Self> {
        let num_labels = match &config.id2label {
            Some(map) if !map.is_empty() => map.len(),
            _ => config.num_labels.unwrap_or(2),
        };
        if num_labels == 0 {
            return Err(anyhow!("model config declares zero labels"));
        }

        let mut labels: Vec<String> = (0..num_labels).map(|i| format!("LABEL_{i}")).collect();
        if let Some(map) = &config.id2label {
            for (id, name) in map {
                let idx: usize = id
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("id2label key '{id}' is not an integer"))?;
                let slot = labels.get_mut(idx).ok_or_else(|| {
                    anyhow!("id2label index {idx} out of range for {num_labels} labels")
                })?;
                *slot = name.clone();
            }
        }

        Ok(Self { labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn names(&self) -> &[String] {
        &self.labels
    }

    pub fn top_prediction(&self, scores: &[f32]) -> Result<Prediction> {
        if scores.len() != self.labels.len() {
            return Err(anyhow!(
                "model produced {} scores for {} labels",
                scores.len(),
                self.labels.len()
            ));
        }
        let (idx, score) = scores_argmax(scores)?;
        Ok(Prediction {
            label: self.labels[idx].clone(),
            score,
        })
    }
}

pub fn scores_argmax(scores: &[f32]) -> Result<(usize, f32)> {
    let (idx, value) = scores
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .ok_or_else(|| anyhow!("empty logits tensor"))?;
    Ok((idx, *value))
}
