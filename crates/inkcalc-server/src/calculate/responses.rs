use inkcalc_contracts::SolutionRecord;
use serde::Serialize;

pub const SUCCESS_MESSAGE: &str = "Image processed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Error,
}

#[derive(Debug, Serialize)]
pub struct CalculateResponse {
    pub message: String,
    pub status: EnvelopeStatus,
    pub data: Vec<SolutionRecord>,
}

impl CalculateResponse {
    pub fn success(data: Vec<SolutionRecord>) -> Self {
        Self {
            message: SUCCESS_MESSAGE.to_string(),
            status: EnvelopeStatus::Success,
            data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub message: String,
    pub status: EnvelopeStatus,
    pub error: String,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: EnvelopeStatus::Error,
            error: error.into(),
        }
    }
}
