//! Supporting types for the JupyterNotebook CRD
//!
//! The material types mirror what the Data Manager sends under
//! `spec.imDataManager`. Every field is optional; the resolver supplies
//! defaults. The status types are what the operator reports back once the
//! notebook's objects exist.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// =============================================================================
// Material (spec.imDataManager)
// =============================================================================

/// Data Manager provided notebook material
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MaterialSpec {
    /// Notebook container image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Service account the notebook pod runs as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    /// CPU and memory requests/limits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesSpec>,

    /// User and group the notebook runs as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<SecurityContextSpec>,

    /// Project storage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectSpec>,

    /// Notebook server options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notebook: Option<NotebookOptions>,

    /// Extra pod labels, each of the form `key=value`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,

    /// nginx `proxy-body-size` for the notebook Ingress (e.g. "500m")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_proxy_body_size: Option<String>,
}

/// Resource requests and limits
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ResourcesSpec {
    /// Upper bounds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ResourceFigures>,

    /// Scheduling requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<ResourceFigures>,
}

/// CPU and memory quantities
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ResourceFigures {
    /// CPU quantity (e.g. "500m")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,

    /// Memory quantity (e.g. "1Gi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

/// Identity the notebook process runs with
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityContextSpec {
    /// UID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_user: Option<i64>,

    /// GID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_group: Option<i64>,
}

/// Project volume claim
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSpec {
    /// PersistentVolumeClaim holding project data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_name: Option<String>,

    /// Project identifier, used as the sub-path within the claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Notebook server options
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct NotebookOptions {
    /// "classic" for the classic notebook UI, anything else for JupyterLab
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
}

// =============================================================================
// Status
// =============================================================================

/// Lifecycle phase of a JupyterNotebook
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum NotebookPhase {
    /// Objects not yet (fully) created
    #[default]
    Pending,
    /// Every owned object exists
    Created,
    /// Creation failed permanently
    Failed,
}

impl std::fmt::Display for NotebookPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Created => write!(f, "Created"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// What a successful creation reports back to the notebook's owner
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    /// How to reach the notebook
    pub notebook: NotebookAccess,
    /// Image the notebook runs
    pub image: String,
    /// Service account the notebook runs as
    pub service_account_name: String,
    /// Memory figures the notebook was given
    pub resources: ResourcesStatus,
    /// Project storage identity
    pub project: ProjectStatus,
}

/// Connection details for a notebook
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct NotebookAccess {
    /// Full URL including the token query parameter
    pub url: String,
    /// Access token
    pub token: String,
    /// Interface the notebook serves ("lab", "classic", ...)
    pub interface: String,
}

/// Memory requests and limits as reported in status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ResourcesStatus {
    /// Requests
    pub requests: MemoryFigure,
    /// Limits
    pub limits: MemoryFigure,
}

/// A single memory quantity
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct MemoryFigure {
    /// Memory quantity
    pub memory: String,
}

/// Project storage identity as reported in status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatus {
    /// Claim name, if one was given
    pub claim_name: Option<String>,
    /// Project id, if one was given
    pub id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn material_decodes_data_manager_document() {
        let material: MaterialSpec = serde_json::from_value(serde_json::json!({
            "image": "jupyter/scipy-notebook:latest",
            "serviceAccountName": "dm-notebook",
            "resources": {
                "limits": {"cpu": "2", "memory": "4Gi"},
                "requests": {"memory": "1Gi"}
            },
            "securityContext": {"runAsUser": 2000, "runAsGroup": 200},
            "project": {"claimName": "project-claim", "id": "project-00000001"},
            "notebook": {"interface": "classic"},
            "labels": ["team=data"],
            "ingressProxyBodySize": "1g"
        }))
        .unwrap();

        assert_eq!(
            material.image.as_deref(),
            Some("jupyter/scipy-notebook:latest")
        );
        let resources = material.resources.unwrap();
        assert_eq!(resources.limits.unwrap().memory.as_deref(), Some("4Gi"));
        assert!(resources.requests.unwrap().cpu.is_none());
        assert_eq!(material.security_context.unwrap().run_as_group, Some(200));
        assert_eq!(material.project.unwrap().id.as_deref(), Some("project-00000001"));
        assert_eq!(material.labels, vec!["team=data".to_string()]);
        assert_eq!(material.ingress_proxy_body_size.as_deref(), Some("1g"));
    }

    #[test]
    fn empty_material_decodes() {
        let material: MaterialSpec = serde_json::from_str("{}").unwrap();
        assert_eq!(material, MaterialSpec::default());
    }

    #[test]
    fn unknown_material_fields_are_ignored() {
        let material: MaterialSpec =
            serde_json::from_value(serde_json::json!({"somethingNew": 1, "image": "x"})).unwrap();
        assert_eq!(material.image.as_deref(), Some("x"));
    }

    #[test]
    fn session_status_serializes_in_reported_shape() {
        let status = SessionStatus {
            notebook: NotebookAccess {
                url: "http://nb.example.com/abc?token=t".to_string(),
                token: "t".to_string(),
                interface: "lab".to_string(),
            },
            image: "img".to_string(),
            service_account_name: "default".to_string(),
            resources: ResourcesStatus {
                requests: MemoryFigure {
                    memory: "256Mi".to_string(),
                },
                limits: MemoryFigure {
                    memory: "1Gi".to_string(),
                },
            },
            project: ProjectStatus {
                claim_name: Some("claim".to_string()),
                id: None,
            },
        };

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["notebook"]["url"], "http://nb.example.com/abc?token=t");
        assert_eq!(json["serviceAccountName"], "default");
        assert_eq!(json["resources"]["requests"]["memory"], "256Mi");
        assert_eq!(json["resources"]["limits"]["memory"], "1Gi");
        assert_eq!(json["project"]["claimName"], "claim");
        assert!(json["project"]["id"].is_null());
    }

    #[test]
    fn phase_display() {
        assert_eq!(NotebookPhase::Pending.to_string(), "Pending");
        assert_eq!(NotebookPhase::Created.to_string(), "Created");
        assert_eq!(NotebookPhase::Failed.to_string(), "Failed");
    }
}
