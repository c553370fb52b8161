//! Read-only projection of the Deployment under review

use anyhow::Context as _;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// The parts of a Deployment the injector looks at.
///
/// Decoded leniently: fields the injector does not read are ignored and a pod
/// spec without `containers` projects to an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentView {
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub annotations: Option<BTreeMap<String, String>>,
    /// Whether the pod template carries a `metadata` object at all
    pub template_metadata: bool,
    /// `None` when the pod template has no annotations field at all
    pub template_annotations: Option<BTreeMap<String, String>>,
    pub labels: BTreeMap<String, String>,
    pub service_account_name: Option<String>,
    pub container_names: Vec<String>,
}

#[derive(serde::Deserialize)]
struct RawDeployment {
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(default)]
    spec: Option<RawDeploymentSpec>,
}

#[derive(serde::Deserialize)]
struct RawDeploymentSpec {
    #[serde(default)]
    template: Option<RawPodTemplate>,
}

#[derive(serde::Deserialize)]
struct RawPodTemplate {
    #[serde(default)]
    metadata: Option<ObjectMeta>,
    #[serde(default)]
    spec: Option<RawPodSpec>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPodSpec {
    #[serde(default)]
    service_account_name: Option<String>,
    #[serde(default)]
    containers: Option<Vec<RawContainer>>,
}

#[derive(serde::Deserialize)]
struct RawContainer {
    #[serde(default)]
    name: String,
}

impl DeploymentView {
    /// Builds the view from the raw object embedded in an admission request.
    pub fn from_object(object: &serde_json::Value) -> anyhow::Result<Self> {
        let raw: RawDeployment = serde_json::from_value(object.clone())
            .context("object is not a valid Deployment")?;

        let template = raw.spec.and_then(|spec| spec.template);
        let (template_meta, pod_spec) = match template {
            Some(t) => (t.metadata, t.spec),
            None => (None, None),
        };
        let (service_account_name, containers) = match pod_spec {
            Some(spec) => (spec.service_account_name, spec.containers.unwrap_or_default()),
            None => (None, Vec::new()),
        };

        Ok(DeploymentView {
            namespace: raw.metadata.namespace,
            name: raw.metadata.name,
            annotations: raw.metadata.annotations,
            template_metadata: template_meta.is_some(),
            template_annotations: template_meta.and_then(|meta| meta.annotations),
            labels: raw.metadata.labels.unwrap_or_default(),
            service_account_name: service_account_name.filter(|sa| !sa.is_empty()),
            container_names: containers.into_iter().map(|c| c.name).collect(),
        })
    }

    /// `namespace/name` for log lines
    pub fn display_name(&self) -> String {
        format!(
            "{}/{}",
            self.namespace.as_deref().unwrap_or(""),
            self.name.as_deref().unwrap_or("")
        )
    }

    pub fn has_container(&self, name: &str) -> bool {
        self.container_names.iter().any(|c| c == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn projects_deployment_fields() {
        let object = json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {
                "name": "web",
                "namespace": "shop",
                "labels": {"app": "web"},
                "annotations": {"sidecar-injector.io/inject": "true"}
            },
            "spec": {
                "replicas": 2,
                "template": {
                    "metadata": {"annotations": {"team": "a"}},
                    "spec": {
                        "serviceAccountName": "web-sa",
                        "containers": [{"name": "app", "image": "nginx"}]
                    }
                }
            }
        });
        let view = DeploymentView::from_object(&object).unwrap();
        assert_eq!(view.display_name(), "shop/web");
        assert_eq!(view.labels.get("app").map(String::as_str), Some("web"));
        assert_eq!(view.service_account_name.as_deref(), Some("web-sa"));
        assert_eq!(view.container_names, vec!["app".to_string()]);
        assert!(view.template_metadata);
        assert!(view.template_annotations.is_some());
        assert!(view.has_container("app"));
        assert!(!view.has_container("sidecar-dns"));
    }

    #[test]
    fn missing_sections_are_empty() {
        let view = DeploymentView::from_object(&json!({"metadata": {"name": "bare"}})).unwrap();
        assert!(view.annotations.is_none());
        assert!(!view.template_metadata);
        assert!(view.template_annotations.is_none());
        assert!(view.labels.is_empty());
        assert!(view.container_names.is_empty());
        assert!(view.service_account_name.is_none());
    }

    #[test]
    fn template_metadata_without_annotations() {
        let object = json!({
            "spec": {"template": {"metadata": {"labels": {"app": "x"}}, "spec": {"containers": []}}}
        });
        let view = DeploymentView::from_object(&object).unwrap();
        assert!(view.template_metadata);
        assert!(view.template_annotations.is_none());
    }

    #[test]
    fn empty_service_account_counts_as_unset() {
        let object = json!({
            "spec": {"template": {"spec": {"serviceAccountName": "", "containers": []}}}
        });
        let view = DeploymentView::from_object(&object).unwrap();
        assert!(view.service_account_name.is_none());
    }

    #[test]
    fn malformed_object_is_an_error() {
        let object = json!({"metadata": {"annotations": ["not", "a", "map"]}});
        assert!(DeploymentView::from_object(&object).is_err());
        assert!(DeploymentView::from_object(&json!("string")).is_err());
    }
}
