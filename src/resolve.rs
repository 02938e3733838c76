//! Spec resolution
//!
//! Merges a notebook's material over the defaults registry. Resolution is
//! total: every field of [`ResolvedConfig`] is populated before any object is
//! composed, and a missing field is never an error. Only structurally invalid
//! input (a malformed label, a required claim left out) fails, and it fails
//! permanently.

use std::collections::BTreeMap;

use crate::config::{
    OperatorConfig, DEFAULT_CPU_LIMIT, DEFAULT_CPU_REQUEST, DEFAULT_GROUP_ID, DEFAULT_IMAGE,
    DEFAULT_INGRESS_PROXY_BODY_SIZE, DEFAULT_INTERFACE, DEFAULT_MEM_LIMIT, DEFAULT_MEM_REQUEST,
    DEFAULT_SERVICE_ACCOUNT, DEFAULT_USER_ID,
};
use crate::crd::{JupyterNotebookSpec, MaterialSpec, ResourceFigures};
use crate::Error;

/// Interface value that keeps the classic notebook UI
pub const CLASSIC_INTERFACE: &str = "classic";

/// A notebook's material with every default substituted
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedConfig {
    /// Container image
    pub image: String,
    /// Pod service account
    pub service_account_name: String,
    /// CPU limit
    pub cpu_limit: String,
    /// CPU request
    pub cpu_request: String,
    /// Memory limit
    pub memory_limit: String,
    /// Memory request
    pub memory_request: String,
    /// `runAsUser`
    pub run_as_user: i64,
    /// `runAsGroup`
    pub run_as_group: i64,
    /// Project PVC; `None` means the project volume is scratch space
    pub project_claim_name: Option<String>,
    /// Sub-path within the claim; `None` mounts the claim root
    pub project_id: Option<String>,
    /// Notebook interface ("lab", "classic", ...)
    pub interface: String,
    /// Extra pod template labels parsed from `key=value` strings
    pub extra_labels: BTreeMap<String, String>,
    /// Ingress `proxy-body-size`
    pub ingress_proxy_body_size: String,
}

impl ResolvedConfig {
    /// Whether the notebook serves the classic UI rather than JupyterLab
    pub fn is_classic(&self) -> bool {
        self.interface == CLASSIC_INTERFACE
    }
}

/// Resolve a notebook spec against the defaults registry
pub fn resolve(
    name: &str,
    spec: &JupyterNotebookSpec,
    config: &OperatorConfig,
) -> Result<ResolvedConfig, Error> {
    let empty = MaterialSpec::default();
    let material = spec.im_data_manager.as_ref().unwrap_or(&empty);

    let resources = material.resources.clone().unwrap_or_default();
    let limits = resources.limits.unwrap_or_default();
    let requests = resources.requests.unwrap_or_default();
    let security = material.security_context.clone().unwrap_or_default();
    let project = material.project.clone().unwrap_or_default();

    if config.require_project_claim && project.claim_name.is_none() {
        return Err(Error::validation(
            name,
            "project.claimName is required but was not provided",
        ));
    }

    let extra_labels = material
        .labels
        .iter()
        .map(|label| parse_label(name, label))
        .collect::<Result<BTreeMap<_, _>, _>>()?;

    Ok(ResolvedConfig {
        image: or_default(&material.image, DEFAULT_IMAGE),
        service_account_name: or_default(&material.service_account_name, DEFAULT_SERVICE_ACCOUNT),
        cpu_limit: figure(&limits, |f| &f.cpu, DEFAULT_CPU_LIMIT),
        cpu_request: figure(&requests, |f| &f.cpu, DEFAULT_CPU_REQUEST),
        memory_limit: figure(&limits, |f| &f.memory, DEFAULT_MEM_LIMIT),
        memory_request: figure(&requests, |f| &f.memory, DEFAULT_MEM_REQUEST),
        run_as_user: security.run_as_user.unwrap_or(DEFAULT_USER_ID),
        run_as_group: security.run_as_group.unwrap_or(DEFAULT_GROUP_ID),
        project_claim_name: project.claim_name,
        project_id: project.id,
        interface: material
            .notebook
            .as_ref()
            .and_then(|n| n.interface.clone())
            .unwrap_or_else(|| DEFAULT_INTERFACE.to_string()),
        extra_labels,
        ingress_proxy_body_size: or_default(
            &material.ingress_proxy_body_size,
            DEFAULT_INGRESS_PROXY_BODY_SIZE,
        ),
    })
}

fn or_default(value: &Option<String>, default: &str) -> String {
    value.clone().unwrap_or_else(|| default.to_string())
}

fn figure(
    figures: &ResourceFigures,
    field: impl Fn(&ResourceFigures) -> &Option<String>,
    default: &str,
) -> String {
    or_default(field(figures), default)
}

/// Parse a `key=value` label string
///
/// Exactly one `=` is allowed and the key must be non-empty.
fn parse_label(notebook: &str, label: &str) -> Result<(String, String), Error> {
    let malformed = || {
        Error::validation(
            notebook,
            format!("label '{}' must have the form key=value", label),
        )
    };

    let (key, value) = label.split_once('=').ok_or_else(malformed)?;
    if key.is_empty() || value.contains('=') {
        return Err(malformed());
    }
    Ok((key.to_string(), value.to_string()))
}
