use anyhow::{anyhow, Context, Result};
use candle::{DType, Device, IndexOp, Module, Tensor};
use candle_nn::{Linear, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use candle_transformers::models::distilbert::{Config as DistilBertConfig, DistilBertModel};
use candle_transformers::models::xlm_roberta::{
    Config as XLMRobertaConfig, XLMRobertaForSequenceClassification,
};
use serde::Deserialize;
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::info;

use super::device::describe;
use super::loader::ModelArtifacts;
use super::scoring::{HeadConfig, LabelTable, ScoreFunction};
use super::{Prediction, TextClassifier};

enum ClassifierModel {
    Bert {
        encoder: BertModel,
        pooler: Linear,
        classifier: Linear,
    },
    DistilBert {
        encoder: DistilBertModel,
        pre_classifier: Linear,
        classifier: Linear,
    },
    Roberta(XLMRobertaForSequenceClassification),
}

/// Head sizes of a DistilBERT config.
#[derive(Debug, Deserialize)]
struct DistilBertDims {
    dim: usize,
    max_position_embeddings: usize,
}

impl ClassifierModel {
    fn load(
        model_type: &str,
        raw_config: &[u8],
        vb: VarBuilder,
        num_labels: usize,
    ) -> Result<(Self, usize)> {
        match model_type {
            "bert" => {
                let config: BertConfig = serde_json::from_slice(raw_config)
                    .context("failed to parse BERT config.json")?;
                let hidden = config.hidden_size;
                let encoder = BertModel::load(vb.pp("bert"), &config)?;
                let pooler = candle_nn::linear(hidden, hidden, vb.pp("bert.pooler.dense"))?;
                let classifier = candle_nn::linear(hidden, num_labels, vb.pp("classifier"))?;
                Ok((
                    Self::Bert {
                        encoder,
                        pooler,
                        classifier,
                    },
                    config.max_position_embeddings,
                ))
            }
            "distilbert" => {
                let config: DistilBertConfig = serde_json::from_slice(raw_config)
                    .context("failed to parse DistilBERT config.json")?;
                let dims: DistilBertDims = serde_json::from_slice(raw_config)
                    .context("failed to parse DistilBERT config.json")?;
                let encoder = DistilBertModel::load(vb.pp("distilbert"), &config)?;
                let pre_classifier =
                    candle_nn::linear(dims.dim, dims.dim, vb.pp("pre_classifier"))?;
                let classifier = candle_nn::linear(dims.dim, num_labels, vb.pp("classifier"))?;
                Ok((
                    Self::DistilBert {
                        encoder,
                        pre_classifier,
                        classifier,
                    },
                    dims.max_position_embeddings,
                ))
            }
            "roberta" | "xlm-roberta" => {
                let config: XLMRobertaConfig = serde_json::from_slice(raw_config)
                    .context("failed to parse RoBERTa config.json")?;
                let model = XLMRobertaForSequenceClassification::new(num_labels, &config, vb)?;
                // Positions are offset by padding_idx + 1.
                let max_len = config.max_position_embeddings.saturating_sub(2);
                Ok((Self::Roberta(model), max_len))
            }
            other => Err(anyhow!(
                "unsupported model_type '{other}', expected bert, distilbert, roberta or xlm-roberta"
            )),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Bert { .. } => "bert",
            Self::DistilBert { .. } => "distilbert",
            Self::Roberta(_) => "roberta",
        }
    }

    /// Returns `(num_labels,)` logits for a single encoded sequence.
    fn forward(
        &self,
        input_ids: &Tensor,
        attention_mask: &Tensor,
        token_type_ids: &Tensor,
    ) -> candle::Result<Tensor> {
        let logits = match self {
            Self::Bert {
                encoder,
                pooler,
                classifier,
            } => {
                let hidden = encoder.forward(input_ids, token_type_ids, Some(attention_mask))?;
                let cls = hidden.i((.., 0))?;
                let pooled = pooler.forward(&cls)?.tanh()?;
                classifier.forward(&pooled)?
            }
            Self::DistilBert {
                encoder,
                pre_classifier,
                classifier,
            } => {
                // DistilBERT masks positions where the mask is non-zero.
                let seq_len = input_ids.dim(1)?;
                let no_mask = Tensor::zeros((1, 1, 1, seq_len), DType::U8, input_ids.device())?;
                let hidden = encoder.forward(input_ids, &no_mask)?;
                let cls = hidden.i((.., 0))?;
                let pooled = pre_classifier.forward(&cls)?.relu()?;
                classifier.forward(&pooled)?
            }
            Self::Roberta(model) => model.forward(input_ids, attention_mask, token_type_ids)?,
        };
        logits.squeeze(0)
    }
}

/// A pretrained sequence-classification model bound to its tokenizer and device.
pub struct SequenceClassifier {
    model: ClassifierModel,
    tokenizer: Tokenizer,
    device: Device,
    labels: LabelTable,
    score_fn: ScoreFunction,
    max_len: usize,
}

impl SequenceClassifier {
    pub fn load(model_dir: &Path, device: Device) -> Result<Self> {
        let artifacts = ModelArtifacts::locate(model_dir)?;
        let raw_config = artifacts.read_config()?;
        let tokenizer = artifacts.load_tokenizer()?;
        let vb = artifacts.var_builder(&device)?;

        let classifier = Self::build(&raw_config, tokenizer, vb, device)
            .with_context(|| format!("invalid model artifacts in {}", artifacts.dir.display()))?;

        info!(
            model_dir = %artifacts.dir.display(),
            architecture = classifier.model.name(),
            device = %describe(&classifier.device),
            labels = ?classifier.labels.names(),
            max_len = classifier.max_len,
            "sequence classifier loaded"
        );
        Ok(classifier)
    }

    fn build(
        raw_config: &[u8],
        tokenizer: Tokenizer,
        vb: VarBuilder,
        device: Device,
    ) -> Result<Self> {
        let head: HeadConfig =
            serde_json::from_slice(raw_config).context("failed to parse config.json")?;

        let labels = LabelTable::from_config(&head)?;
        let score_fn = ScoreFunction::for_head(&head, labels.len());
        let model_type = head
            .model_type
            .as_deref()
            .ok_or_else(|| anyhow!("config.json has no model_type"))?;

        let (model, max_len) = ClassifierModel::load(model_type, raw_config, vb, labels.len())?;

        Ok(Self {
            model,
            tokenizer,
            device,
            labels,
            score_fn,
            max_len: max_len.max(2),
        })
    }

    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let enc = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("Tokenizer encode error: {e}"))?;
        let mut ids = enc.get_ids().to_vec();
        if ids.is_empty() {
            ids.push(0);
        }
        if ids.len() > self.max_len {
            // Keep the trailing separator token.
            let last = ids[ids.len() - 1];
            ids.truncate(self.max_len - 1);
            ids.push(last);
        }
        Ok(ids)
    }

    fn logits(&self, text: &str) -> Result<Tensor> {
        let ids = self.encode(text)?;
        let seq_len = ids.len();

        let input = tensor_from_slice(&ids, seq_len, &self.device)?;
        let mask = Tensor::ones((1, seq_len), DType::U32, &self.device)?;
        let token_type_ids = Tensor::zeros((1, seq_len), DType::U32, &self.device)?;

        self.model
            .forward(&input, &mask, &token_type_ids)
            .context("classifier forward pass failed")
    }
}

impl TextClassifier for SequenceClassifier {
    fn classify(&self, text: &str) -> Result<Prediction> {
        let logits = self.logits(text)?;
        let scores = self.score_fn.apply(&logits)?;
        self.labels.top_prediction(&scores)
    }

    fn labels(&self) -> &[String] {
        self.labels.names()
    }

    fn device(&self) -> String {
        describe(&self.device)
    }
}

fn tensor_from_slice(data: &[u32], seq_len: usize, device: &Device) -> candle::Result<Tensor> {
    Tensor::new(data, device)?.reshape((1, seq_len))
}
