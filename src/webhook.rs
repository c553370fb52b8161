use crate::errors::AdmissionError;
use apis::{AdmissionReviewResponse, Status};

pub mod apis;
pub mod codec;
pub mod server;

enum Choice {
    Allow { patch: Option<Vec<u8>> },
    Fail(Status),
}

/// High-level builder for webhook decisions
pub struct Decision(Choice);

impl Decision {
    pub fn allow() -> Self {
        Decision(Choice::Allow { patch: None })
    }

    /// Allows the object, applying a serialized JSON patch
    pub fn allow_with_patch(patch: Vec<u8>) -> Self {
        Decision(Choice::Allow { patch: Some(patch) })
    }

    /// Reports a failure. `allowed` stays false, so the API server rejects
    /// the object unless the webhook is configured to ignore failures.
    pub fn fail(error: &AdmissionError) -> Self {
        Decision(Choice::Fail(Status { message: error.to_string() }))
    }

    /// Wraps the decision into a review. `uid` is `None` only when the
    /// incoming envelope could not be decoded.
    pub fn finish(self, uid: Option<&str>) -> AdmissionReviewResponse {
        let uid = uid.unwrap_or_default().to_string();
        let response = match self.0 {
            Choice::Allow { patch } => apis::Response {
                uid,
                allowed: true,
                status: None,
                patch: patch.map(|patch| apis::Patch {
                    patch_type: apis::PatchType::JsonPatch,
                    patch: base64::encode(&patch),
                }),
            },
            Choice::Fail(status) => apis::Response {
                uid,
                allowed: false,
                status: Some(status),
                patch: None,
            },
        };
        AdmissionReviewResponse {
            kind: apis::Kind,
            api_version: apis::ApiVersion,
            response,
        }
    }
}
