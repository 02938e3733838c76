//! Kubernetes Events for notebook lifecycle changes
//!
//! The reconciler describes what happened as a [`NotebookEvent`]; the
//! publisher turns it into a `kube::runtime::events::Event` on the notebook,
//! visible via `kubectl describe jn <name>`. Publishing is fire-and-forget:
//! failures are logged and never fail reconciliation.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::{debug, warn};

/// Event reasons, shown under REASON in `kubectl get events`.
pub mod reasons {
    /// Every object of the notebook exists
    pub const NOTEBOOK_CREATED: &str = "NotebookCreated";
    /// An object was left over from an earlier attempt and reused
    pub const OBJECT_ALREADY_EXISTS: &str = "ObjectAlreadyExists";
    /// Creation failed and will not be retried
    pub const CREATE_FAILED: &str = "CreateFailed";
    /// Creation failed transiently and will be retried
    pub const CREATE_RETRYING: &str = "CreateRetrying";
}

/// Event actions, shown under ACTION in `kubectl get events`.
pub mod actions {
    /// Creating the notebook's objects
    pub const CREATE: &str = "Create";
}

/// Something worth telling the notebook's owner about
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotebookEvent {
    /// All objects exist
    Created {
        /// Access URL, token included
        url: String,
    },
    /// An object from an earlier attempt was reused
    ObjectReused {
        /// Object kind
        kind: String,
        /// Object name
        name: String,
    },
    /// Creation failed transiently
    Retrying {
        /// Error message
        reason: String,
    },
    /// Creation failed permanently
    Failed {
        /// Error message
        reason: String,
    },
}

impl NotebookEvent {
    /// Normal for progress, Warning for failures
    pub fn type_(&self) -> EventType {
        match self {
            Self::Created { .. } | Self::ObjectReused { .. } => EventType::Normal,
            Self::Retrying { .. } | Self::Failed { .. } => EventType::Warning,
        }
    }

    /// Machine-readable reason (see [`reasons`])
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Created { .. } => reasons::NOTEBOOK_CREATED,
            Self::ObjectReused { .. } => reasons::OBJECT_ALREADY_EXISTS,
            Self::Retrying { .. } => reasons::CREATE_RETRYING,
            Self::Failed { .. } => reasons::CREATE_FAILED,
        }
    }

    /// Human-readable note. Events are readable by anyone who can list them
    /// in the namespace, so the access token never appears here.
    pub fn note(&self) -> String {
        match self {
            Self::Created { url } => format!("Notebook available at {}", without_query(url)),
            Self::ObjectReused { kind, name } => format!("{} {} already exists", kind, name),
            Self::Retrying { reason } | Self::Failed { reason } => reason.clone(),
        }
    }

    fn to_event(&self) -> Event {
        Event {
            type_: self.type_(),
            reason: self.reason().to_string(),
            note: Some(self.note()),
            action: actions::CREATE.to_string(),
            secondary: None,
        }
    }
}

fn without_query(url: &str) -> &str {
    url.split_once('?').map(|(base, _)| base).unwrap_or(url)
}

/// Publishes notebook events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Record `event` against the notebook referenced by `notebook`
    async fn publish(&self, notebook: &ObjectReference, event: NotebookEvent);
}

/// Publisher backed by the Kubernetes Events API
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Report as `controller_name`, with the pod name (if known) as instance
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(&self, notebook: &ObjectReference, event: NotebookEvent) {
        let reason = event.reason();
        if let Err(e) = self.recorder.publish(&event.to_event(), notebook).await {
            warn!(reason, error = %e, "Failed to publish notebook event");
        }
    }
}

/// Publisher that only logs, for tests and dry runs
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(&self, _notebook: &ObjectReference, event: NotebookEvent) {
        debug!(reason = event.reason(), note = %event.note(), "dropping notebook event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_are_warnings() {
        let failed = NotebookEvent::Failed {
            reason: "bad label".to_string(),
        };
        let retrying = NotebookEvent::Retrying {
            reason: "503".to_string(),
        };
        assert_eq!(failed.type_(), EventType::Warning);
        assert_eq!(retrying.type_(), EventType::Warning);
        assert_eq!(failed.reason(), reasons::CREATE_FAILED);
        assert_eq!(retrying.reason(), reasons::CREATE_RETRYING);
        assert_eq!(failed.note(), "bad label");
    }

    #[test]
    fn created_note_does_not_leak_token() {
        let event = NotebookEvent::Created {
            url: "http://nb.example.com/nb?token=secret".to_string(),
        };
        assert_eq!(event.type_(), EventType::Normal);
        assert_eq!(event.note(), "Notebook available at http://nb.example.com/nb");
        assert!(!event.to_event().note.unwrap_or_default().contains("secret"));
    }

    #[test]
    fn reused_object_names_kind_and_name() {
        let event = NotebookEvent::ObjectReused {
            kind: "ConfigMap".to_string(),
            name: "config-nb".to_string(),
        };
        assert_eq!(event.reason(), reasons::OBJECT_ALREADY_EXISTS);
        assert_eq!(event.note(), "ConfigMap config-nb already exists");
        assert_eq!(event.to_event().action, actions::CREATE);
    }

    #[test]
    fn url_without_query_is_unchanged() {
        assert_eq!(without_query("http://x/y"), "http://x/y");
    }

    #[tokio::test]
    async fn noop_publisher_accepts_events() {
        NoopEventPublisher
            .publish(
                &ObjectReference::default(),
                NotebookEvent::Failed {
                    reason: "quota exceeded".to_string(),
                },
            )
            .await;
    }
}
