//! Mutating admission webhook core that injects a DNS relay sidecar into
//! Deployments annotated with `sidecar-injector.io/inject: "true"`.

pub mod config;
pub mod eligibility;
pub mod errors;
pub mod fingerprint;
pub mod patch;
pub mod resolver;
pub mod view;
pub mod webhook;

pub use config::{InjectorConfig, ServiceRef, SidecarSpec};
pub use resolver::{KubeServiceResolver, ServiceResolver};
pub use webhook::{codec::AdmissionCodec, server::MutationEngine};
