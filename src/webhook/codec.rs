//! Admission review (de)serialization

use crate::{
    errors::AdmissionError,
    view::DeploymentView,
    webhook::apis::{AdmissionReviewRequest, AdmissionReviewResponse, Request},
};
use anyhow::Context as _;

/// The only media type admission requests may use
pub const JSON_MEDIA_TYPE: &str = "application/json";

/// Decodes incoming reviews and encodes outgoing ones.
///
/// Stateless; built once at startup and handed to the engine.
#[derive(Debug, Clone, Default)]
pub struct AdmissionCodec {
    _priv: (),
}

impl AdmissionCodec {
    pub fn new() -> Self {
        AdmissionCodec { _priv: () }
    }

    /// Checks the declared content type. Media type parameters such as
    /// `charset` are ignored.
    pub fn accepts(&self, content_type: Option<&str>) -> bool {
        content_type
            .and_then(|ct| ct.split(';').next())
            .map_or(false, |media| media.trim().eq_ignore_ascii_case(JSON_MEDIA_TYPE))
    }

    pub fn decode_review(&self, body: &[u8]) -> Result<Request, AdmissionError> {
        let review: AdmissionReviewRequest = serde_json::from_slice(body)
            .map_err(|err| AdmissionError::EnvelopeDecode(err.to_string()))?;
        review.request.ok_or_else(|| {
            AdmissionError::EnvelopeDecode("admission review carries no request".to_string())
        })
    }

    pub fn decode_object(&self, request: &Request) -> Result<DeploymentView, AdmissionError> {
        let object = request
            .object
            .as_ref()
            .filter(|object| !object.is_null())
            .context("admission request carries no object")
            .map_err(AdmissionError::ObjectDecode)?;
        DeploymentView::from_object(object).map_err(AdmissionError::ObjectDecode)
    }

    pub fn encode_review(&self, review: &AdmissionReviewResponse) -> anyhow::Result<Vec<u8>> {
        serde_json::to_vec(review).context("failed to serialize admission review")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_type_check() {
        let codec = AdmissionCodec::new();
        assert!(codec.accepts(Some("application/json")));
        assert!(codec.accepts(Some("application/json; charset=utf-8")));
        assert!(!codec.accepts(Some("application/yaml")));
        assert!(!codec.accepts(Some("text/plain")));
        assert!(!codec.accepts(Some("")));
        assert!(!codec.accepts(None));
    }

    #[test]
    fn decodes_request() {
        let body = json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
                "kind": {"group": "apps", "version": "v1", "kind": "Deployment"},
                "namespace": "default",
                "operation": "CREATE",
                "object": {"metadata": {"name": "web"}}
            }
        });
        let codec = AdmissionCodec::new();
        let request = codec.decode_review(&serde_json::to_vec(&body).unwrap()).unwrap();
        assert_eq!(request.uid, "705ab4f5-6393-11e8-b7cc-42010a800002");
        assert_eq!(request.kind.as_ref().map(|k| k.kind.as_str()), Some("Deployment"));
        let view = codec.decode_object(&request).unwrap();
        assert_eq!(view.name.as_deref(), Some("web"));
    }

    #[test]
    fn envelope_errors() {
        let codec = AdmissionCodec::new();
        let bodies: [&[u8]; 4] = [
            b"not json",
            br#"{"apiVersion": "admission.k8s.io/v1beta1", "kind": "AdmissionReview"}"#,
            br#"{"apiVersion": "admission.k8s.io/v1", "kind": "AdmissionReview"}"#,
            br#"{"apiVersion": "admission.k8s.io/v1", "kind": "AdmissionReview", "request": {}}"#,
        ];
        for body in bodies.iter() {
            match codec.decode_review(body) {
                Err(AdmissionError::EnvelopeDecode(_)) => {}
                other => panic!("unexpected result {:?}", other.map(|r| r.uid)),
            }
        }
    }

    #[test]
    fn missing_object() {
        let codec = AdmissionCodec::new();
        let body = json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {"uid": "1", "object": null}
        });
        let request = codec.decode_review(&serde_json::to_vec(&body).unwrap()).unwrap();
        match codec.decode_object(&request) {
            Err(AdmissionError::ObjectDecode(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }
}
