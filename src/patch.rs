//! JSON patch construction for sidecar injection

use crate::{config::SidecarSpec, fingerprint::config_hash, view::DeploymentView};
use anyhow::Context as _;
use json_patch::{AddOperation, Patch, PatchOperation};
use k8s_openapi::api::core::v1::{Container, EnvVar, PodDNSConfig, ResourceRequirements};
use std::collections::BTreeMap;

/// Annotation written on the pod template once the sidecar is added
pub const STATUS_ANNOTATION: &str = "sidecar-injector.io/status";
pub const STATUS_INJECTED: &str = "injected";

/// Key that replaces the labels in the fingerprint when a service account is set
pub const SERVICE_ACCOUNT_HASH_KEY: &str = "serviceAccount";

/// The sidecar resolves through its own listener on loopback
pub const SIDECAR_NAMESERVER: &str = "127.0.0.1";

pub const DNS_POLICY_NONE: &str = "None";

const CONTAINERS_PATH: &str = "/spec/template/spec/containers";
const DNS_CONFIG_PATH: &str = "/spec/template/spec/dnsConfig";
const DNS_POLICY_PATH: &str = "/spec/template/spec/dnsPolicy";
const TEMPLATE_METADATA_PATH: &str = "/spec/template/metadata";
const TEMPLATE_ANNOTATIONS_PATH: &str = "/spec/template/metadata/annotations";

/// Outcome of patch construction
#[derive(Debug, Clone)]
pub enum Injection {
    /// The Deployment already carries the sidecar; nothing must be changed.
    AlreadyInjected,
    Patch(Patch),
}

impl Injection {
    /// Compact JSON encoding of the patch, `None` for `AlreadyInjected`.
    pub fn to_bytes(&self) -> anyhow::Result<Option<Vec<u8>>> {
        match self {
            Injection::AlreadyInjected => Ok(None),
            Injection::Patch(patch) => serde_json::to_vec(patch)
                .map(Some)
                .context("failed to serialize patch"),
        }
    }
}

/// Escapes one reference token of a JSON pointer (`~` first, then `/`).
pub fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Fingerprint of the DNS-relevant configuration of a Deployment.
///
/// A pod template service account takes precedence over the labels.
pub fn deployment_fingerprint(view: &DeploymentView) -> anyhow::Result<String> {
    match &view.service_account_name {
        Some(account) => config_hash(vec![(SERVICE_ACCOUNT_HASH_KEY, account.as_str())]),
        None => config_hash(&view.labels),
    }
}

/// Formats `address:port`, bracketing IPv6 literals.
fn host_port(address: &str, port: u16) -> String {
    if address.contains(':') {
        format!("[{}]:{}", address, port)
    } else {
        format!("{}:{}", address, port)
    }
}

fn sidecar_container(sidecar: &SidecarSpec, dns_address: &str, fingerprint: String) -> Container {
    Container {
        name: sidecar.name.clone(),
        image: Some(sidecar.image.clone()),
        args: Some(vec![
            "-upstream".to_string(),
            host_port(dns_address, sidecar.upstream_port),
            "-controller".to_string(),
            sidecar.controller_address.clone(),
        ]),
        env: Some(vec![EnvVar {
            name: sidecar.hash_env.clone(),
            value: Some(fingerprint),
            ..Default::default()
        }]),
        resources: Some(ResourceRequirements::default()),
        ..Default::default()
    }
}

fn dns_config(cluster_domain: &str) -> PodDNSConfig {
    PodDNSConfig {
        nameservers: Some(vec![SIDECAR_NAMESERVER.to_string()]),
        searches: Some(vec![
            format!("default.svc.{}", cluster_domain),
            format!("svc.{}", cluster_domain),
            cluster_domain.to_string(),
        ]),
        options: None,
    }
}

fn add(path: String, value: serde_json::Value) -> PatchOperation {
    PatchOperation::Add(AddOperation { path, value })
}

/// Builds the patch injecting `sidecar` into the Deployment described by `view`.
///
/// `dns_address` is the cluster IP of the DNS service the sidecar forwards to.
pub fn build_patch(
    view: &DeploymentView,
    sidecar: &SidecarSpec,
    dns_address: &str,
) -> anyhow::Result<Injection> {
    if view.has_container(&sidecar.name) {
        return Ok(Injection::AlreadyInjected);
    }

    let fingerprint = deployment_fingerprint(view).context("failed to calculate hash")?;
    let container = sidecar_container(sidecar, dns_address, fingerprint);
    let mut ops = Vec::with_capacity(4);

    let container = serde_json::to_value(&container).context("failed to serialize container")?;
    if view.container_names.is_empty() {
        ops.push(add(
            CONTAINERS_PATH.to_string(),
            serde_json::Value::Array(vec![container]),
        ));
    } else {
        ops.push(add(format!("{}/-", CONTAINERS_PATH), container));
    }

    let dns_config = serde_json::to_value(&dns_config(&sidecar.cluster_domain))
        .context("failed to serialize dnsConfig")?;
    ops.push(add(DNS_CONFIG_PATH.to_string(), dns_config));
    ops.push(add(
        DNS_POLICY_PATH.to_string(),
        serde_json::Value::String(DNS_POLICY_NONE.to_string()),
    ));

    let mut status = BTreeMap::new();
    status.insert(STATUS_ANNOTATION, STATUS_INJECTED);
    let annotations = serde_json::to_value(&status).context("failed to serialize annotations")?;
    if !view.template_metadata {
        let metadata = serde_json::json!({ "annotations": annotations });
        ops.push(add(TEMPLATE_METADATA_PATH.to_string(), metadata));
    } else if view.template_annotations.is_none() {
        ops.push(add(TEMPLATE_ANNOTATIONS_PATH.to_string(), annotations));
    } else {
        let path = format!(
            "{}/{}",
            TEMPLATE_ANNOTATIONS_PATH,
            escape_pointer_token(STATUS_ANNOTATION)
        );
        ops.push(add(path, serde_json::Value::String(STATUS_INJECTED.to_string())));
    }

    Ok(Injection::Patch(Patch(ops)))
}
