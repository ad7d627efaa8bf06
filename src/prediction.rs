use serde::{Deserialize, Serialize};

/// Scores strictly above this are classified as tuberculosis.
pub const DECISION_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "TB")]
    Tb,
    #[serde(rename = "Normal")]
    Normal,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Tb => "TB",
            Label::Normal => "Normal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub label: Label,
    pub confidence: f64,
    pub raw_prediction: f64,
    pub threshold_used: f64,
}

impl PredictionResult {
    pub fn from_score(raw_prediction: f64) -> Self {
        let label = if raw_prediction > DECISION_THRESHOLD {
            Label::Tb
        } else {
            Label::Normal
        };
        let confidence = match label {
            Label::Tb => raw_prediction,
            Label::Normal => 1.0 - raw_prediction,
        };

        Self {
            label,
            confidence,
            raw_prediction,
            threshold_used: DECISION_THRESHOLD,
        }
    }
}
