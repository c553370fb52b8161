use crate::{
    config::{InjectorConfig, ServiceRef, SidecarSpec},
    eligibility::should_inject,
    errors::AdmissionError,
    patch::build_patch,
    resolver::ServiceResolver,
    webhook::{
        apis::{AdmissionReviewResponse, Request},
        codec::{AdmissionCodec, JSON_MEDIA_TYPE},
        Decision,
    },
};
use http::StatusCode;

/// HTTP-level answer to an admission call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Reply {
    fn text(status: StatusCode, message: String) -> Self {
        Reply {
            status,
            content_type: "text/plain; charset=utf-8",
            body: message.into_bytes(),
        }
    }

    fn json(body: Vec<u8>) -> Self {
        Reply {
            status: StatusCode::OK,
            content_type: JSON_MEDIA_TYPE,
            body,
        }
    }
}

/// Decides on Deployment admission requests and injects the DNS sidecar.
///
/// Holds only immutable configuration and the resolver, so one instance
/// serves all requests concurrently.
pub struct MutationEngine<R> {
    codec: AdmissionCodec,
    sidecar: SidecarSpec,
    dns_service: ServiceRef,
    resolver: R,
}

impl<R: ServiceResolver> MutationEngine<R> {
    pub fn new(
        codec: AdmissionCodec,
        sidecar: SidecarSpec,
        dns_service: ServiceRef,
        resolver: R,
    ) -> Self {
        MutationEngine {
            codec,
            sidecar,
            dns_service,
            resolver,
        }
    }

    /// Validates `config` and builds an engine from it
    pub fn from_config(config: &InjectorConfig, resolver: R) -> anyhow::Result<Self> {
        let (sidecar, dns_service) = config.validate()?;
        Ok(Self::new(AdmissionCodec::new(), sidecar, dns_service, resolver))
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Entrypoint for raw HTTP calls.
    ///
    /// Empty bodies and non-JSON content types are rejected with 400 before
    /// the envelope is looked at. Every decodable call gets a 200 carrying a
    /// review, even when the review reports a failure.
    pub async fn handle(&self, content_type: Option<&str>, body: &[u8]) -> Reply {
        if body.is_empty() {
            tracing::warn!("Empty body");
            return Reply::text(StatusCode::BAD_REQUEST, "Empty body".to_string());
        }
        if !self.codec.accepts(content_type) {
            tracing::warn!(content_type = ?content_type, "Invalid content type");
            return Reply::text(StatusCode::BAD_REQUEST, "Invalid content type".to_string());
        }

        let review = self.review(body).await;
        match self.codec.encode_review(&review) {
            Ok(bytes) => Reply::json(bytes),
            Err(err) => {
                tracing::error!("Can't encode response: {:#}", err);
                Reply::text(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Could not encode response: {:#}", err),
                )
            }
        }
    }

    /// Entrypoint for mutation requests
    pub async fn review(&self, body: &[u8]) -> AdmissionReviewResponse {
        let request = match self.codec.decode_review(body) {
            Ok(request) => request,
            Err(err) => {
                tracing::error!("Can't decode body: {}", err);
                return Decision::fail(&err).finish(None);
            }
        };

        let decision = self.mutate(&request).await.unwrap_or_else(|err| {
            tracing::error!(uid = %request.uid, "{}", err);
            Decision::fail(&err)
        });
        decision.finish(Some(&request.uid))
    }

    #[tracing::instrument(skip(self, request), fields(uid = %request.uid))]
    async fn mutate(&self, request: &Request) -> Result<Decision, AdmissionError> {
        tracing::info!(
            kind = ?request.kind.as_ref().map(|k| k.kind.as_str()),
            namespace = ?request.namespace,
            name = ?request.name,
            operation = ?request.operation,
            "AdmissionReview received"
        );

        let deployment = self.codec.decode_object(request)?;
        if !should_inject(deployment.annotations.as_ref()) {
            tracing::info!("Skipping injection for deployment {}", deployment.display_name());
            return Ok(Decision::allow());
        }

        let dns_address = self
            .resolver
            .resolve(&self.dns_service.namespace, &self.dns_service.name)
            .await
            .map_err(AdmissionError::Resolution)?;
        tracing::info!(
            "Using DNS service IP {} for deployment {}",
            dns_address,
            deployment.display_name()
        );

        let injection = build_patch(&deployment, &self.sidecar, &dns_address)
            .map_err(AdmissionError::PatchSerialization)?;
        match injection.to_bytes().map_err(AdmissionError::PatchSerialization)? {
            Some(patch) => {
                tracing::info!("Created patch for deployment {}", deployment.display_name());
                Ok(Decision::allow_with_patch(patch))
            }
            None => {
                tracing::info!(
                    "Deployment {} already has the sidecar",
                    deployment.display_name()
                );
                Ok(Decision::allow())
            }
        }
    }
}
