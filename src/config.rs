//! Startup configuration.
//!
//! Everything the injector needs is collected here once, validated, and then
//! handed out as immutable values. Each field can be set by flag or by
//! environment variable.

/// Name given to the injected container. Existing containers with this name
/// mark a Deployment as already injected.
pub const SIDECAR_CONTAINER_NAME: &str = "sidecar-dns";

/// Environment variable carrying the configuration fingerprint
pub const CONFIG_HASH_ENV: &str = "DNS_MESH_CONFIG_HASH";

pub const DEFAULT_SIDECAR_IMAGE: &str = "docker.io/emirozbir/sidecar-injector";
pub const DEFAULT_SIDECAR_IMAGE_TAG: &str = "latest";
pub const DEFAULT_UPSTREAM_PORT: u16 = 53;
pub const DEFAULT_CONTROLLER_ADDRESS: &str =
    "http://dns-mesh-controller-controller-manager-metrics-service.dns-mesh-controller-system:5959";
pub const DEFAULT_DNS_SERVICE_NAME: &str = "kube-dns";
pub const DEFAULT_DNS_SERVICE_NAMESPACE: &str = "kube-system";
pub const DEFAULT_CLUSTER_DOMAIN: &str = "cluster.local";

#[derive(clap::Args, Debug, Clone)]
pub struct InjectorConfig {
    /// Sidecar image repository
    #[clap(long, env = "SIDECAR_IMAGE", default_value = DEFAULT_SIDECAR_IMAGE)]
    pub sidecar_image: String,
    /// Sidecar image tag
    #[clap(long, env = "SIDECAR_IMAGE_TAG", default_value = DEFAULT_SIDECAR_IMAGE_TAG)]
    pub sidecar_image_tag: String,
    /// Port the upstream cluster DNS listens on
    #[clap(long, env = "UPSTREAM_DNS_PORT", default_value_t = DEFAULT_UPSTREAM_PORT)]
    pub upstream_port: u16,
    /// Address the sidecar reports its fingerprint to
    #[clap(long, env = "CONTROLLER_ADDRESS", default_value = DEFAULT_CONTROLLER_ADDRESS)]
    pub controller_address: String,
    /// Name of the cluster DNS service
    #[clap(long, env = "DNS_SERVICE_NAME", default_value = DEFAULT_DNS_SERVICE_NAME)]
    pub dns_service_name: String,
    /// Namespace of the cluster DNS service
    #[clap(long, env = "DNS_SERVICE_NAMESPACE", default_value = DEFAULT_DNS_SERVICE_NAMESPACE)]
    pub dns_service_namespace: String,
    /// Cluster domain used to build DNS search paths
    #[clap(long, env = "CLUSTER_DOMAIN", default_value = DEFAULT_CLUSTER_DOMAIN)]
    pub cluster_domain: String,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        InjectorConfig {
            sidecar_image: DEFAULT_SIDECAR_IMAGE.to_string(),
            sidecar_image_tag: DEFAULT_SIDECAR_IMAGE_TAG.to_string(),
            upstream_port: DEFAULT_UPSTREAM_PORT,
            controller_address: DEFAULT_CONTROLLER_ADDRESS.to_string(),
            dns_service_name: DEFAULT_DNS_SERVICE_NAME.to_string(),
            dns_service_namespace: DEFAULT_DNS_SERVICE_NAMESPACE.to_string(),
            cluster_domain: DEFAULT_CLUSTER_DOMAIN.to_string(),
        }
    }
}

/// Immutable description of the container to inject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarSpec {
    pub name: String,
    pub image: String,
    pub upstream_port: u16,
    pub controller_address: String,
    pub hash_env: String,
    pub cluster_domain: String,
}

/// Namespaced reference to the cluster DNS service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRef {
    pub namespace: String,
    pub name: String,
}

impl InjectorConfig {
    /// Checks the configuration and splits it into the values the engine uses.
    pub fn validate(&self) -> anyhow::Result<(SidecarSpec, ServiceRef)> {
        let required = [
            ("sidecar image", &self.sidecar_image),
            ("sidecar image tag", &self.sidecar_image_tag),
            ("controller address", &self.controller_address),
            ("DNS service name", &self.dns_service_name),
            ("DNS service namespace", &self.dns_service_namespace),
            ("cluster domain", &self.cluster_domain),
        ];
        for (what, value) in required.iter() {
            if value.trim().is_empty() {
                anyhow::bail!("{} must not be empty", what);
            }
        }
        if self.upstream_port == 0 {
            anyhow::bail!("upstream DNS port must not be 0");
        }

        let sidecar = SidecarSpec {
            name: SIDECAR_CONTAINER_NAME.to_string(),
            image: format!("{}:{}", self.sidecar_image, self.sidecar_image_tag),
            upstream_port: self.upstream_port,
            controller_address: self.controller_address.clone(),
            hash_env: CONFIG_HASH_ENV.to_string(),
            cluster_domain: self.cluster_domain.trim_matches('.').to_string(),
        };
        let dns_service = ServiceRef {
            namespace: self.dns_service_namespace.clone(),
            name: self.dns_service_name.clone(),
        };
        Ok((sidecar, dns_service))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(clap::Parser)]
    struct Cli {
        #[clap(flatten)]
        config: InjectorConfig,
    }

    #[test]
    fn defaults_validate() {
        let (sidecar, dns) = InjectorConfig::default().validate().unwrap();
        assert_eq!(sidecar.name, "sidecar-dns");
        assert_eq!(sidecar.image, "docker.io/emirozbir/sidecar-injector:latest");
        assert_eq!(sidecar.upstream_port, 53);
        assert_eq!(sidecar.hash_env, "DNS_MESH_CONFIG_HASH");
        assert_eq!(sidecar.cluster_domain, "cluster.local");
        assert_eq!(
            dns,
            ServiceRef {
                namespace: "kube-system".to_string(),
                name: "kube-dns".to_string(),
            }
        );
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "injector",
            "--sidecar-image",
            "registry.local/relay",
            "--sidecar-image-tag",
            "v2",
            "--upstream-port",
            "5353",
            "--dns-service-name",
            "coredns",
        ])
        .unwrap();
        let (sidecar, dns) = cli.config.validate().unwrap();
        assert_eq!(sidecar.image, "registry.local/relay:v2");
        assert_eq!(sidecar.upstream_port, 5353);
        assert_eq!(dns.name, "coredns");
        assert_eq!(dns.namespace, "kube-system");
    }

    #[test]
    fn rejects_empty_values() {
        let mut config = InjectorConfig::default();
        config.sidecar_image_tag = String::new();
        assert!(config.validate().is_err());

        let mut config = InjectorConfig::default();
        config.dns_service_namespace = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = InjectorConfig::default();
        config.upstream_port = 0;
        assert!(config.validate().is_err());
    }
}
