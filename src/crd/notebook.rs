//! JupyterNotebook Custom Resource Definition
//!
//! A JupyterNotebook is a request for one notebook session. Its objects are
//! created once; the operator does not reconcile later spec changes.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{MaterialSpec, NotebookPhase, SessionStatus};

/// Specification for a JupyterNotebook
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "squonk.it",
    version = "v1",
    kind = "JupyterNotebook",
    plural = "jupyternotebooks",
    shortname = "jn",
    namespaced,
    status = "JupyterNotebookStatus",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"URL","type":"string","jsonPath":".status.jupyter.notebook.url"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct JupyterNotebookSpec {
    /// Everything the Data Manager provides lives under `imDataManager`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub im_data_manager: Option<MaterialSpec>,
}

/// Status for a JupyterNotebook
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JupyterNotebookStatus {
    /// Current phase
    #[serde(default)]
    pub phase: NotebookPhase,

    /// Human-readable reason for a failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Connection details once the notebook's objects exist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jupyter: Option<SessionStatus>,
}

impl JupyterNotebookStatus {
    /// Status for a notebook whose objects all exist
    pub fn created(session: SessionStatus) -> Self {
        Self {
            phase: NotebookPhase::Created,
            message: None,
            jupyter: Some(session),
        }
    }

    /// Status for a notebook that can never be created as specified
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            phase: NotebookPhase::Failed,
            message: Some(message.into()),
            jupyter: None,
        }
    }

    /// Whether reconciliation has reached a terminal phase
    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, NotebookPhase::Created | NotebookPhase::Failed)
    }
}
