//! Resolving the address of the cluster DNS service

use crate::errors::{classify_kube, ErrorClass};
use anyhow::Context as _;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use kube::Api;

/// Looks up the address the sidecar forwards DNS queries to.
///
/// Implementations must be safe to share between concurrent requests.
#[async_trait]
pub trait ServiceResolver: Send + Sync {
    async fn resolve(&self, namespace: &str, name: &str) -> anyhow::Result<String>;
}

/// Reads the cluster IP of a Service from the API server.
#[derive(Clone)]
pub struct KubeServiceResolver {
    client: kube::Client,
}

impl KubeServiceResolver {
    pub fn new(client: kube::Client) -> Self {
        KubeServiceResolver { client }
    }
}

/// Extracts a usable cluster IP, rejecting headless services.
pub fn cluster_ip(service: &Service) -> Option<&str> {
    service
        .spec
        .as_ref()
        .and_then(|spec| spec.cluster_ip.as_deref())
        .filter(|ip| !ip.is_empty() && *ip != "None")
}

#[async_trait]
impl ServiceResolver for KubeServiceResolver {
    #[tracing::instrument(skip(self))]
    async fn resolve(&self, namespace: &str, name: &str) -> anyhow::Result<String> {
        let services = Api::<Service>::namespaced(self.client.clone(), namespace);
        let service = match services.get(name).await {
            Ok(service) => service,
            Err(err) => {
                let class = classify_kube(&err);
                if class == ErrorClass::NotFound {
                    tracing::warn!("DNS service {}/{} does not exist", namespace, name);
                } else {
                    tracing::error!(class = class.as_ref(), "failed to get DNS service: {}", err);
                }
                return Err(err)
                    .with_context(|| format!("failed to get DNS service {}/{}", namespace, name));
            }
        };
        let ip = cluster_ip(&service).with_context(|| {
            format!(
                "DNS service {}/{} does not have a valid ClusterIP",
                namespace, name
            )
        })?;
        Ok(ip.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ServiceSpec;

    fn service(ip: Option<&str>) -> Service {
        Service {
            spec: Some(ServiceSpec {
                cluster_ip: ip.map(ToString::to_string),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn usable_cluster_ip() {
        assert_eq!(cluster_ip(&service(Some("10.96.0.10"))), Some("10.96.0.10"));
    }

    #[test]
    fn headless_or_missing_ip() {
        assert_eq!(cluster_ip(&service(Some("None"))), None);
        assert_eq!(cluster_ip(&service(Some(""))), None);
        assert_eq!(cluster_ip(&service(None)), None);
        assert_eq!(cluster_ip(&Service::default()), None);
    }
}
