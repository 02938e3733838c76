//! Network composer
//!
//! The Service exposes the notebook port inside the cluster; the Ingress
//! routes `<domain>/<notebook>` to it. TLS is always declared. The
//! certificate either comes from an operator-wide secret or is requested from
//! cert-manager under a per-notebook secret name.

use super::deployment::{pod_selector, port_name};
use super::NotebookNames;
use crate::config::{OperatorConfig, NOTEBOOK_PORT};
use crate::resolve::ResolvedConfig;
use crate::token::AccessToken;
use crate::workload::{
    HttpIngressPath, HttpIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTls, ObjectMeta, Service, ServiceBackendPort,
    ServicePort, ServiceSpec,
};

/// Ingress class annotation
pub const ANNOTATION_INGRESS_CLASS: &str = "kubernetes.io/ingress.class";

/// nginx request body limit annotation
pub const ANNOTATION_PROXY_BODY_SIZE: &str = "nginx.ingress.kubernetes.io/proxy-body-size";

/// cert-manager issuer annotation
pub const ANNOTATION_CLUSTER_ISSUER: &str = "cert-manager.io/cluster-issuer";

/// Path the notebook is routed under
pub fn notebook_path(names: &NotebookNames) -> String {
    format!("/{}", names.notebook)
}

/// Access URL reported in the notebook status
pub fn notebook_url(domain: &str, names: &NotebookNames, token: &AccessToken) -> String {
    format!(
        "http://{}{}?token={}",
        domain,
        notebook_path(names),
        token.as_str()
    )
}

/// Compose the cluster-internal Service
pub fn compose_service(names: &NotebookNames, namespace: &str) -> Service {
    Service {
        api_version: "v1".to_string(),
        kind: "Service".to_string(),
        metadata: ObjectMeta::new(names.service(), namespace, names.notebook.as_str()),
        spec: ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: pod_selector(names),
            ports: vec![ServicePort {
                name: Some(port_name()),
                port: NOTEBOOK_PORT,
                target_port: Some(NOTEBOOK_PORT),
                protocol: Some("TCP".to_string()),
            }],
        },
    }
}

/// Compose the external Ingress
pub fn compose_routing(
    names: &NotebookNames,
    namespace: &str,
    resolved: &ResolvedConfig,
    config: &OperatorConfig,
) -> Ingress {
    let mut metadata = ObjectMeta::new(names.ingress(), namespace, names.notebook.as_str())
        .with_annotation(ANNOTATION_INGRESS_CLASS, config.ingress_class.as_str())
        .with_annotation(
            ANNOTATION_PROXY_BODY_SIZE,
            resolved.ingress_proxy_body_size.as_str(),
        );

    let secret_name = match &config.ingress_tls_secret {
        Some(secret) => secret.clone(),
        None => {
            if let Some(issuer) = &config.ingress_cert_issuer {
                metadata = metadata.with_annotation(ANNOTATION_CLUSTER_ISSUER, issuer.as_str());
            }
            names.synthesized_tls_secret()
        }
    };

    Ingress {
        api_version: "networking.k8s.io/v1".to_string(),
        kind: "Ingress".to_string(),
        metadata,
        spec: IngressSpec {
            tls: vec![IngressTls {
                hosts: vec![config.ingress_domain.clone()],
                secret_name,
            }],
            rules: vec![IngressRule {
                host: config.ingress_domain.clone(),
                http: HttpIngressRuleValue {
                    paths: vec![HttpIngressPath {
                        path: notebook_path(names),
                        path_type: "Prefix".to_string(),
                        backend: IngressBackend {
                            service: IngressServiceBackend {
                                name: names.service().to_string(),
                                port: ServiceBackendPort {
                                    number: NOTEBOOK_PORT,
                                },
                            },
                        },
                    }],
                },
            }],
        },
    }
}
