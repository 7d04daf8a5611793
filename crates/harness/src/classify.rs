//! Response classification
//!
//! Decides whether a received response counts as a success. Checks run in a
//! fixed order and the first failing check determines the reason:
//! status policy, then JSON decoding, then the response contract.

use serde_json::Value;

use crate::metrics::FailureReason;

/// Which status codes pass the status check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPolicy {
    /// When set only 2xx passes, otherwise anything below 500 passes
    pub treat_non_2xx_as_failure: bool,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            treat_non_2xx_as_failure: true,
        }
    }
}

impl StatusPolicy {
    pub fn accepts(&self, status: u16) -> bool {
        if self.treat_non_2xx_as_failure {
            (200..300).contains(&status)
        } else {
            status < 500
        }
    }
}

/// Required shape of a successful response body
///
/// `{ "success": true, "status": 200, "data": { "matched_docs": [..] } }`
/// with at least `min_matched_docs` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseContract {
    pub min_matched_docs: usize,
}

impl Default for ResponseContract {
    fn default() -> Self {
        Self {
            min_matched_docs: 10,
        }
    }
}

impl ResponseContract {
    pub fn is_satisfied_by(&self, body: &Value) -> bool {
        let Some(object) = body.as_object() else {
            return false;
        };

        let success = object.get("success").and_then(Value::as_bool) == Some(true);
        let status = object.get("status").and_then(Value::as_f64) == Some(200.0);
        let matched_docs = object
            .get("data")
            .and_then(|data| data.get("matched_docs"))
            .and_then(Value::as_array);

        success && status && matched_docs.is_some_and(|docs| docs.len() >= self.min_matched_docs)
    }
}

/// Classify a received response
pub fn classify_response(
    status: u16,
    body: &[u8],
    policy: StatusPolicy,
    contract: &ResponseContract,
) -> Result<(), FailureReason> {
    if !policy.accepts(status) {
        return Err(FailureReason::HttpStatus);
    }

    let payload: Value = serde_json::from_slice(body).map_err(|_| FailureReason::InvalidJson)?;

    if !contract.is_satisfied_by(&payload) {
        return Err(FailureReason::ResponseShape);
    }

    Ok(())
}
