// src/models/response.rs

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Represents the 'responses' table.
/// At most one row exists per (username, quiz_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResponse {
    pub username: String,
    pub quiz_id: String,

    /// Copied from the quiz at submission time, used to gate statistics.
    pub author: String,

    /// Computed once at submission. NaN for ungraded quizzes.
    pub score: f64,

    /// Outer index is the question number, inner list the selected options.
    pub responses: Vec<Vec<usize>>,
}

/// DTO for submitting an answer sheet.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitResponseRequest {
    #[validate(length(max = 10), custom(function = validate_selections))]
    pub responses: Vec<Vec<usize>>,
}

fn validate_selections(responses: &[Vec<usize>]) -> Result<(), ValidationError> {
    if responses.iter().any(|selected| selected.len() > 5) {
        return Err(ValidationError::new("too_many_selections"));
    }
    Ok(())
}

/// A bounded statistics scan, as understood by the record store.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsRequest {
    pub quiz_id: String,
    /// Decrypted continuation position; `None` requests the first page.
    pub cursor: Option<Vec<u8>>,
    pub page_size: u32,
}

/// One page of responses as returned by the record store.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsPage {
    pub records: Vec<QuizResponse>,
    /// Position after the last record; `None` on the terminal page.
    pub cursor: Option<Vec<u8>>,
    pub page_size: u32,
}

/// A page of responses as returned to API clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub quiz_id: String,
    pub total: usize,
    pub records: Vec<QuizResponse>,
    /// Encrypted continuation token; empty when there are no more pages.
    pub page_cursor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}
