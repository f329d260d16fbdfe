use serde::{Deserialize, Serialize};

use crate::inference::Prediction;

/// `POST /predict` body: a bare JSON string or a JSON array of strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PredictRequest {
    Single(String),
    Batch(Vec<String>),
}

impl PredictRequest {
    pub fn into_texts(self) -> Vec<String> {
        match self {
            Self::Single(text) => vec![text],
            Self::Batch(texts) => texts,
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self, Self::Single(_))
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PredictionPayload {
    Single(Prediction),
    Batch(Vec<Prediction>),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: PredictionPayload,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_dir: String,
    pub device: Option<String>,
    pub labels: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_accepts_string_or_list() {
        let single: PredictRequest = serde_json::from_str(r#""I love this product""#).unwrap();
        assert!(single.is_single());
        assert_eq!(single.into_texts(), vec!["I love this product"]);

        let batch: PredictRequest = serde_json::from_str(r#"["good", "bad"]"#).unwrap();
        assert!(!batch.is_single());
        assert_eq!(batch.into_texts(), vec!["good", "bad"]);
    }

    #[test]
    fn request_rejects_other_shapes() {
        assert!(serde_json::from_str::<PredictRequest>("42").is_err());
        assert!(serde_json::from_str::<PredictRequest>(r#"{"text": "hi"}"#).is_err());
        assert!(serde_json::from_str::<PredictRequest>(r#"["ok", 3]"#).is_err());
    }

    #[test]
    fn single_prediction_serializes_as_object() {
        let response = PredictResponse {
            prediction: PredictionPayload::Single(Prediction {
                label: "POSITIVE".into(),
                score: 0.75,
            }),
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({ "prediction": { "label": "POSITIVE", "score": 0.75 } })
        );
    }
}
