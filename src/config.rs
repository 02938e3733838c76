//! Operator configuration and the defaults registry
//!
//! Defaults apply per notebook when its material leaves a field out.
//! [`OperatorConfig`] holds the process-wide settings read from the
//! environment once at startup; it is passed explicitly to the resolver and
//! composers and never looked up again.

use crate::Error;

// =============================================================================
// Defaults Registry
// =============================================================================

/// Notebook image used when the material does not name one
pub const DEFAULT_IMAGE: &str = "jupyter/minimal-notebook:notebook-6.3.0";

/// Service account used when the material does not name one
pub const DEFAULT_SERVICE_ACCOUNT: &str = "default";

/// Default CPU limit
pub const DEFAULT_CPU_LIMIT: &str = "1";

/// Default CPU request
pub const DEFAULT_CPU_REQUEST: &str = "10m";

/// Default memory limit
pub const DEFAULT_MEM_LIMIT: &str = "1Gi";

/// Default memory request
pub const DEFAULT_MEM_REQUEST: &str = "256Mi";

/// Default `runAsUser`
pub const DEFAULT_USER_ID: i64 = 1000;

/// Default `runAsGroup`
pub const DEFAULT_GROUP_ID: i64 = 100;

/// Filesystem group applied to every notebook pod, whatever group it runs as
pub const FS_GROUP: i64 = 100;

/// Default nginx `proxy-body-size` for the notebook Ingress
pub const DEFAULT_INGRESS_PROXY_BODY_SIZE: &str = "500m";

/// Default notebook interface
pub const DEFAULT_INTERFACE: &str = "lab";

/// Port the notebook server listens on
pub const NOTEBOOK_PORT: u16 = 8888;

/// Default node selector key for notebook pods
pub const DEFAULT_NODE_SELECTOR_KEY: &str = "informaticsmatters.com/purpose-worker";

/// Default node selector value for notebook pods
pub const DEFAULT_NODE_SELECTOR_VALUE: &str = "yes";

/// Default ingress class
pub const DEFAULT_INGRESS_CLASS: &str = "nginx";

// =============================================================================
// Environment variables
// =============================================================================

/// Routing domain (required)
pub const ENV_INGRESS_DOMAIN: &str = "INGRESS_DOMAIN";
/// Pre-provisioned TLS secret for every notebook Ingress
pub const ENV_INGRESS_TLS_SECRET: &str = "INGRESS_TLS_SECRET";
/// cert-manager ClusterIssuer used when no TLS secret is configured
pub const ENV_INGRESS_CERT_ISSUER: &str = "INGRESS_CERT_ISSUER";
/// Node selector key override
pub const ENV_NODE_SELECTOR_KEY: &str = "JO_POD_NODE_SELECTOR_KEY";
/// Node selector value override
pub const ENV_NODE_SELECTOR_VALUE: &str = "JO_POD_NODE_SELECTOR_VALUE";
/// Ingress class override
pub const ENV_INGRESS_CLASS: &str = "JO_INGRESS_CLASS";
/// Whether notebooks must name a project claim
pub const ENV_REQUIRE_PROJECT_CLAIM: &str = "JO_REQUIRE_PROJECT_CLAIM";

/// Process-wide operator settings
#[derive(Clone, Debug, PartialEq)]
pub struct OperatorConfig {
    /// Host every notebook is routed under
    pub ingress_domain: String,
    /// Explicit TLS secret; when set, cert-manager is not involved
    pub ingress_tls_secret: Option<String>,
    /// cert-manager ClusterIssuer for synthesized TLS secrets
    pub ingress_cert_issuer: Option<String>,
    /// Ingress class annotation value
    pub ingress_class: String,
    /// Node selector key for notebook pods
    pub node_selector_key: String,
    /// Node selector value for notebook pods
    pub node_selector_value: String,
    /// Reject notebooks without `project.claimName`
    pub require_project_claim: bool,
}

impl OperatorConfig {
    /// Create a config for the given domain with every optional setting defaulted
    pub fn new(ingress_domain: impl Into<String>) -> Self {
        Self {
            ingress_domain: ingress_domain.into(),
            ingress_tls_secret: None,
            ingress_cert_issuer: None,
            ingress_class: DEFAULT_INGRESS_CLASS.to_string(),
            node_selector_key: DEFAULT_NODE_SELECTOR_KEY.to_string(),
            node_selector_value: DEFAULT_NODE_SELECTOR_VALUE.to_string(),
            require_project_claim: false,
        }
    }

    /// Load the config from the process environment
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the config through an arbitrary variable lookup
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let ingress_domain = get(ENV_INGRESS_DOMAIN)
            .ok_or_else(|| Error::config(format!("{} must be set", ENV_INGRESS_DOMAIN)))?;

        let require_project_claim = match get(ENV_REQUIRE_PROJECT_CLAIM) {
            None => false,
            Some(v) => v.parse::<bool>().map_err(|_| {
                Error::config(format!(
                    "{} must be 'true' or 'false', got '{}'",
                    ENV_REQUIRE_PROJECT_CLAIM, v
                ))
            })?,
        };

        Ok(Self {
            ingress_domain,
            ingress_tls_secret: get(ENV_INGRESS_TLS_SECRET),
            ingress_cert_issuer: get(ENV_INGRESS_CERT_ISSUER),
            ingress_class: get(ENV_INGRESS_CLASS)
                .unwrap_or_else(|| DEFAULT_INGRESS_CLASS.to_string()),
            node_selector_key: get(ENV_NODE_SELECTOR_KEY)
                .unwrap_or_else(|| DEFAULT_NODE_SELECTOR_KEY.to_string()),
            node_selector_value: get(ENV_NODE_SELECTOR_VALUE)
                .unwrap_or_else(|| DEFAULT_NODE_SELECTOR_VALUE.to_string()),
            require_project_claim,
        })
    }

    /// Set an explicit TLS secret
    pub fn with_tls_secret(mut self, secret: impl Into<String>) -> Self {
        self.ingress_tls_secret = Some(secret.into());
        self
    }

    /// Set a cert-manager issuer
    pub fn with_cert_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.ingress_cert_issuer = Some(issuer.into());
        self
    }

    /// Require every notebook to name a project claim
    pub fn with_required_project_claim(mut self) -> Self {
        self.require_project_claim = true;
        self
    }
}
