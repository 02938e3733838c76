//! JupyterNotebook controller implementation
//!
//! Creation is the only lifecycle event handled. A notebook without a
//! terminal phase has its objects created in a fixed order; objects left over
//! from an earlier, interrupted attempt are reused, so the runtime can safely
//! re-invoke reconciliation after a transient failure. Once the phase is
//! `Created` or `Failed` the notebook is left alone. Deletion cascades through
//! owner references.

use std::sync::Arc;
use std::time::Duration;

use kube::runtime::controller::Action;
use kube::{Client, Resource, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

use super::gateway::{ClusterGateway, KubeGateway};
use crate::compiler::{notebook_url, token_from_config, NotebookCompiler, NotebookNames};
use crate::config::OperatorConfig;
use crate::crd::{
    JupyterNotebook, JupyterNotebookStatus, MemoryFigure, NotebookAccess, ProjectStatus,
    ResourcesStatus, SessionStatus,
};
use crate::events::{EventPublisher, KubeEventPublisher, NotebookEvent};
use crate::resolve::{resolve, ResolvedConfig};
use crate::token::AccessToken;
use crate::{Error, CONTROLLER_NAME};

/// Delay before the runtime re-invokes a reconciliation that failed transiently
pub const RETRY_DELAY: Duration = Duration::from_secs(30);

/// Controller context shared by every reconciliation
pub struct Context {
    /// Cluster API gateway (trait object for testability)
    pub gateway: Arc<dyn ClusterGateway>,
    /// Event publisher for emitting Kubernetes Events
    pub events: Arc<dyn EventPublisher>,
    /// Process-wide operator settings
    pub config: Arc<OperatorConfig>,
}

impl Context {
    /// Create a context backed by the given Kubernetes client
    pub fn new(client: Client, config: OperatorConfig) -> Self {
        Self {
            gateway: Arc::new(KubeGateway::new(client.clone())),
            events: Arc::new(KubeEventPublisher::new(client, CONTROLLER_NAME)),
            config: Arc::new(config),
        }
    }

    /// Create a context from explicit parts
    pub fn from_parts(
        gateway: Arc<dyn ClusterGateway>,
        events: Arc<dyn EventPublisher>,
        config: OperatorConfig,
    ) -> Self {
        Self {
            gateway,
            events,
            config: Arc::new(config),
        }
    }

    /// Create a context for testing that discards Events
    #[cfg(test)]
    pub fn for_testing(gateway: Arc<dyn ClusterGateway>, config: OperatorConfig) -> Self {
        Self::from_parts(gateway, Arc::new(crate::events::NoopEventPublisher), config)
    }
}

/// Reconcile a JupyterNotebook
///
/// Permanent creation failures are recorded on the status and end
/// reconciliation. Other errors go to [`error_policy`], which retries only
/// the retryable ones.
#[instrument(
    skip(notebook, ctx),
    fields(notebook = %notebook.name_any(), namespace = ?notebook.namespace())
)]
pub async fn reconcile(notebook: Arc<JupyterNotebook>, ctx: Arc<Context>) -> Result<Action, Error> {
    if notebook.status.as_ref().is_some_and(|s| s.is_terminal()) {
        debug!("notebook already reconciled");
        return Ok(Action::await_change());
    }

    let name = notebook.name_any();
    let namespace = notebook
        .namespace()
        .ok_or_else(|| Error::MissingNamespace(name.clone()))?;
    let obj_ref = notebook.object_ref(&());

    info!("creating notebook");
    match reconcile_create(&notebook, &ctx).await {
        Ok(session) => {
            let url = session.notebook.url.clone();
            ctx.gateway
                .patch_status(&namespace, &name, &JupyterNotebookStatus::created(session))
                .await?;
            ctx.events
                .publish(&obj_ref, NotebookEvent::Created { url })
                .await;
            info!("notebook created");
            Ok(Action::await_change())
        }
        Err(e) if e.is_retryable() => {
            warn!(error = %e, "notebook creation failed, will retry");
            ctx.events
                .publish(
                    &obj_ref,
                    NotebookEvent::Retrying {
                        reason: e.to_string(),
                    },
                )
                .await;
            Err(e)
        }
        Err(e) => {
            error!(error = %e, "notebook creation failed permanently");
            ctx.gateway
                .patch_status(
                    &namespace,
                    &name,
                    &JupyterNotebookStatus::failed(e.to_string()),
                )
                .await?;
            ctx.events
                .publish(
                    &obj_ref,
                    NotebookEvent::Failed {
                        reason: e.to_string(),
                    },
                )
                .await;
            Ok(Action::await_change())
        }
    }
}

/// Create every object of a notebook and report how to reach it
///
/// Safe to re-invoke: objects that already exist are taken as created by an
/// earlier attempt, and the token is read back from an existing notebook
/// config so the reported URL matches the running server.
pub async fn reconcile_create(
    notebook: &JupyterNotebook,
    ctx: &Context,
) -> Result<SessionStatus, Error> {
    let name = notebook.name_any();
    let namespace = notebook
        .namespace()
        .ok_or_else(|| Error::MissingNamespace(name.clone()))?;
    let mut owner = notebook
        .controller_owner_ref(&())
        .ok_or_else(|| Error::MissingOwnerUid(name.clone()))?;
    owner.block_owner_deletion = Some(true);

    let resolved = resolve(&name, &notebook.spec, &ctx.config)?;
    let names = NotebookNames::new(name.as_str());
    let mut token = AccessToken::generate();

    let compiled =
        NotebookCompiler::new(&ctx.config).compile(&names, &namespace, &resolved, &token)?;

    let obj_ref = notebook.object_ref(&());
    for mut object in compiled.into_submission_order() {
        object.adopt(owner.clone());

        match ctx.gateway.create(&namespace, &object).await {
            Ok(()) => {
                info!(kind = object.kind(), object = %object.name(), "created object");
            }
            Err(e) if e.is_already_exists() => {
                info!(
                    kind = object.kind(),
                    object = %object.name(),
                    "object already exists, reusing it"
                );
                ctx.events
                    .publish(
                        &obj_ref,
                        NotebookEvent::ObjectReused {
                            kind: object.kind().to_string(),
                            name: object.name().to_string(),
                        },
                    )
                    .await;

                if object.kind() == "ConfigMap" && object.name() == names.config {
                    token = recover_token(ctx, &namespace, &names).await?;
                }
            }
            Err(e) => {
                warn!(
                    kind = object.kind(),
                    object = %object.name(),
                    error = %e,
                    "failed to create object"
                );
                return Err(e);
            }
        }
    }

    Ok(session_status(&ctx.config, &names, &resolved, &token))
}

async fn recover_token(
    ctx: &Context,
    namespace: &str,
    names: &NotebookNames,
) -> Result<AccessToken, Error> {
    let data = ctx
        .gateway
        .get_config_map_data(namespace, &names.config)
        .await?
        .ok_or_else(|| {
            Error::corrupt_artifact("ConfigMap", &names.config, "conflict reported but not found")
        })?;

    let token = token_from_config(&data).ok_or_else(|| {
        Error::corrupt_artifact("ConfigMap", &names.config, "no access token in notebook config")
    })?;
    debug!(config = %names.config, "recovered access token from existing config");
    Ok(token)
}

fn session_status(
    config: &OperatorConfig,
    names: &NotebookNames,
    resolved: &ResolvedConfig,
    token: &AccessToken,
) -> SessionStatus {
    SessionStatus {
        notebook: NotebookAccess {
            url: notebook_url(&config.ingress_domain, names, token),
            token: token.as_str().to_string(),
            interface: resolved.interface.clone(),
        },
        image: resolved.image.clone(),
        service_account_name: resolved.service_account_name.clone(),
        resources: ResourcesStatus {
            requests: MemoryFigure {
                memory: resolved.memory_request.clone(),
            },
            limits: MemoryFigure {
                memory: resolved.memory_limit.clone(),
            },
        },
        project: ProjectStatus {
            claim_name: resolved.project_claim_name.clone(),
            id: resolved.project_id.clone(),
        },
    }
}

/// Error policy for the controller
///
/// Retryable failures are re-run after [`RETRY_DELAY`]. Anything else, such
/// as a notebook without a namespace or a rejected status patch, waits for
/// the notebook to change.
pub fn error_policy(notebook: Arc<JupyterNotebook>, error: &Error, _ctx: Arc<Context>) -> Action {
    if error.is_retryable() {
        warn!(
            ?error,
            notebook = %notebook.name_any(),
            "reconciliation failed, retrying"
        );
        Action::requeue(RETRY_DELAY)
    } else {
        error!(
            ?error,
            notebook = %notebook.name_any(),
            "reconciliation failed permanently"
        );
        Action::await_change()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::gateway::MockClusterGateway;
    use crate::crd::{JupyterNotebookSpec, MaterialSpec, NotebookPhase};
    use crate::error::api_error;
    use crate::FailureClass;
    use crate::workload::OwnedObject;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    const DOMAIN: &str = "nb.example.com";

    fn notebook(name: &str, spec: JupyterNotebookSpec) -> JupyterNotebook {
        let mut nb = JupyterNotebook::new(name, spec);
        nb.metadata.namespace = Some("data-manager".to_string());
        nb.metadata.uid = Some(format!("uid-{}", name));
        nb
    }

    fn config() -> OperatorConfig {
        OperatorConfig::new(DOMAIN)
    }

    /// Records every object passed to `create` and every status patch
    #[derive(Clone, Default)]
    struct Capture {
        created: Arc<Mutex<Vec<OwnedObject>>>,
        statuses: Arc<Mutex<Vec<JupyterNotebookStatus>>>,
    }

    impl Capture {
        fn created(&self) -> Vec<OwnedObject> {
            self.created.lock().unwrap().clone()
        }

        fn last_status(&self) -> Option<JupyterNotebookStatus> {
            self.statuses.lock().unwrap().last().cloned()
        }
    }

    fn capturing_gateway(capture: &Capture) -> MockClusterGateway {
        let mut mock = MockClusterGateway::new();
        let created = capture.created.clone();
        mock.expect_create().returning(move |_, obj| {
            created.lock().unwrap().push(obj.clone());
            Ok(())
        });
        let statuses = capture.statuses.clone();
        mock.expect_patch_status().returning(move |_, _, status| {
            statuses.lock().unwrap().push(status.clone());
            Ok(())
        });
        mock
    }

    // ==========================================================================
    // Story Tests: Creating a notebook
    // ==========================================================================

    /// Story: A notebook with no material gets every default and a working URL
    #[tokio::test]
    async fn story_empty_material_creates_default_notebook() {
        let capture = Capture::default();
        let ctx = Context::for_testing(Arc::new(capturing_gateway(&capture)), config());

        let session = reconcile_create(&notebook("abc123", Default::default()), &ctx)
            .await
            .unwrap();

        assert_eq!(session.notebook.token.len(), 16);
        assert_eq!(
            session.notebook.url,
            format!("http://{}/abc123?token={}", DOMAIN, session.notebook.token)
        );
        assert_eq!(session.notebook.interface, "lab");
        assert_eq!(session.image, crate::config::DEFAULT_IMAGE);
        assert_eq!(session.service_account_name, "default");
        assert_eq!(session.resources.requests.memory, "256Mi");
        assert_eq!(session.resources.limits.memory, "1Gi");
        assert_eq!(session.project.claim_name, None);

        let created: Vec<(String, String)> = capture
            .created()
            .iter()
            .map(|o| (o.kind().to_string(), o.name().to_string()))
            .collect();
        assert_eq!(
            created,
            vec![
                ("ConfigMap".to_string(), "bp-abc123".to_string()),
                ("ConfigMap".to_string(), "startup-abc123".to_string()),
                ("ConfigMap".to_string(), "config-abc123".to_string()),
                ("Deployment".to_string(), "abc123".to_string()),
                ("Service".to_string(), "abc123".to_string()),
                ("Ingress".to_string(), "abc123".to_string()),
            ]
        );
    }

    /// Story: Deleting the notebook must take every object with it
    #[tokio::test]
    async fn story_every_object_is_owned_by_the_notebook() {
        let capture = Capture::default();
        let ctx = Context::for_testing(Arc::new(capturing_gateway(&capture)), config());

        reconcile_create(&notebook("nb", Default::default()), &ctx)
            .await
            .unwrap();

        for obj in capture.created() {
            let refs = &obj.metadata().owner_references;
            assert_eq!(refs.len(), 1, "{} {}", obj.kind(), obj.name());
            assert_eq!(refs[0].uid, "uid-nb");
            assert_eq!(refs[0].kind, "JupyterNotebook");
            assert_eq!(refs[0].controller, Some(true));
            assert_eq!(refs[0].block_owner_deletion, Some(true));
        }
    }

    /// Story: The token in the status is the one the server was configured with
    #[tokio::test]
    async fn story_reported_token_matches_config_artifact() {
        let capture = Capture::default();
        let ctx = Context::for_testing(Arc::new(capturing_gateway(&capture)), config());

        let session = reconcile_create(&notebook("nb", Default::default()), &ctx)
            .await
            .unwrap();

        let config_map = capture
            .created()
            .into_iter()
            .find_map(|o| match o {
                OwnedObject::ConfigMap(cm) if cm.metadata.name == "config-nb" => Some(cm),
                _ => None,
            })
            .unwrap();
        let stored = token_from_config(&config_map.data).unwrap();
        assert_eq!(stored.as_str(), session.notebook.token);
    }

    // ==========================================================================
    // Story Tests: Resuming after a partial attempt
    // ==========================================================================

    /// Story: An earlier attempt created the ConfigMaps, then the server went away
    #[tokio::test]
    async fn story_resume_reuses_existing_objects_and_token() {
        let existing_token = "ExistingTok3n456";
        let mut mock = MockClusterGateway::new();
        mock.expect_create().returning(|_, obj| match obj {
            OwnedObject::ConfigMap(_) => Err(api_error(409, "AlreadyExists")),
            _ => Ok(()),
        });
        mock.expect_get_config_map_data()
            .times(1)
            .returning(move |ns, name| {
                assert_eq!((ns, name), ("data-manager", "config-nb"));
                let mut data = BTreeMap::new();
                data.insert(
                    crate::compiler::artifacts::CONFIG_KEY.to_string(),
                    format!(r#"{{"NotebookApp": {{"token": "{}"}}}}"#, existing_token),
                );
                Ok(Some(data))
            });
        let ctx = Context::for_testing(Arc::new(mock), config());

        let session = reconcile_create(&notebook("nb", Default::default()), &ctx)
            .await
            .unwrap();

        assert_eq!(session.notebook.token, existing_token);
        assert!(session.notebook.url.ends_with(existing_token));
    }

    /// Story: The config ConfigMap exists but someone replaced its content
    #[tokio::test]
    async fn story_unreadable_existing_config_is_permanent() {
        let mut mock = MockClusterGateway::new();
        mock.expect_create()
            .returning(|_, _| Err(api_error(409, "AlreadyExists")));
        mock.expect_get_config_map_data()
            .returning(|_, _| Ok(Some(BTreeMap::new())));
        let ctx = Context::for_testing(Arc::new(mock), config());

        let err = reconcile_create(&notebook("nb", Default::default()), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CorruptArtifact { .. }));
        assert_eq!(err.classify(), FailureClass::Permanent);
    }

    /// Story: The API server is unavailable mid-way; nothing after it is attempted
    #[tokio::test]
    async fn story_transient_failure_stops_submission() {
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let seen = attempts.clone();
        let mut mock = MockClusterGateway::new();
        mock.expect_create().returning(move |_, obj| {
            seen.lock().unwrap().push(obj.kind().to_string());
            if obj.kind() == "Deployment" {
                Err(api_error(503, "ServiceUnavailable"))
            } else {
                Ok(())
            }
        });
        let ctx = Context::for_testing(Arc::new(mock), config());

        let err = reconcile_create(&notebook("nb", Default::default()), &ctx)
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(
            *attempts.lock().unwrap(),
            vec!["ConfigMap", "ConfigMap", "ConfigMap", "Deployment"]
        );
    }

    // ==========================================================================
    // Story Tests: How reconcile reports outcomes
    // ==========================================================================

    /// Story: A successful creation is recorded and never repeated
    #[tokio::test]
    async fn story_success_marks_notebook_created() {
        let capture = Capture::default();
        let ctx = Arc::new(Context::for_testing(
            Arc::new(capturing_gateway(&capture)),
            config(),
        ));

        let action = reconcile(Arc::new(notebook("nb", Default::default())), ctx)
            .await
            .unwrap();

        assert_eq!(action, Action::await_change());
        let status = capture.last_status().unwrap();
        assert_eq!(status.phase, NotebookPhase::Created);
        assert!(status.jupyter.unwrap().notebook.url.contains("/nb?token="));
    }

    /// Story: A malformed label can never succeed, so it is recorded as Failed
    #[tokio::test]
    async fn story_permanent_failure_marks_notebook_failed() {
        let capture = Capture::default();
        let ctx = Arc::new(Context::for_testing(
            Arc::new(capturing_gateway(&capture)),
            config(),
        ));
        let spec = JupyterNotebookSpec {
            im_data_manager: Some(MaterialSpec {
                labels: vec!["no-equals-sign".to_string()],
                ..Default::default()
            }),
        };

        let action = reconcile(Arc::new(notebook("nb", spec)), ctx)
            .await
            .unwrap();

        assert_eq!(action, Action::await_change());
        assert!(capture.created().is_empty());
        let status = capture.last_status().unwrap();
        assert_eq!(status.phase, NotebookPhase::Failed);
        assert!(status.message.unwrap().contains("no-equals-sign"));
    }

    /// Story: Quota rejection is permanent; the status explains it
    #[tokio::test]
    async fn story_rejected_object_marks_notebook_failed() {
        let statuses = Arc::new(Mutex::new(Vec::new()));
        let seen = statuses.clone();
        let mut mock = MockClusterGateway::new();
        mock.expect_create()
            .returning(|_, _| Err(api_error(403, "Forbidden")));
        mock.expect_patch_status().returning(move |_, _, status| {
            seen.lock().unwrap().push(status.clone());
            Ok(())
        });
        let ctx = Arc::new(Context::for_testing(Arc::new(mock), config()));

        let action = reconcile(Arc::new(notebook("nb", Default::default())), ctx)
            .await
            .unwrap();

        assert_eq!(action, Action::await_change());
        let statuses = statuses.lock().unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].phase, NotebookPhase::Failed);
    }

    /// Story: A transient failure goes back to the runtime without touching status
    #[tokio::test]
    async fn story_retryable_failure_is_returned_to_runtime() {
        let mut mock = MockClusterGateway::new();
        mock.expect_create()
            .returning(|_, _| Err(api_error(500, "InternalError")));
        mock.expect_patch_status().never();
        let ctx = Arc::new(Context::for_testing(Arc::new(mock), config()));
        let nb = Arc::new(notebook("nb", Default::default()));

        let err = reconcile(nb.clone(), ctx.clone()).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(error_policy(nb, &err, ctx), Action::requeue(RETRY_DELAY));
    }

    /// Story: A status patch the API server refuses is not retried forever
    #[tokio::test]
    async fn story_rejected_status_patch_waits_for_change() {
        let mut mock = MockClusterGateway::new();
        mock.expect_create().returning(|_, _| Ok(()));
        mock.expect_patch_status()
            .times(1)
            .returning(|_, _, _| Err(api_error(403, "Forbidden")));
        let ctx = Arc::new(Context::for_testing(Arc::new(mock), config()));
        let nb = Arc::new(notebook("nb", Default::default()));

        let err = reconcile(nb.clone(), ctx.clone()).await.unwrap_err();
        assert_eq!(err.classify(), FailureClass::Permanent);
        assert_eq!(error_policy(nb, &err, ctx), Action::await_change());
    }

    /// Story: A notebook without a namespace is never requeued
    #[tokio::test]
    async fn story_notebook_without_namespace_waits_for_change() {
        let mut mock = MockClusterGateway::new();
        mock.expect_create().never();
        mock.expect_patch_status().never();
        let ctx = Arc::new(Context::for_testing(Arc::new(mock), config()));

        let mut nb = notebook("nb", Default::default());
        nb.metadata.namespace = None;
        let nb = Arc::new(nb);

        let err = reconcile(nb.clone(), ctx.clone()).await.unwrap_err();
        assert!(matches!(err, Error::MissingNamespace(_)));
        assert_eq!(error_policy(nb, &err, ctx), Action::await_change());
    }

    /// Story: Terminal notebooks are left alone
    #[tokio::test]
    async fn story_terminal_notebooks_are_not_recreated() {
        for status in [
            JupyterNotebookStatus::created(Default::default()),
            JupyterNotebookStatus::failed("bad label"),
        ] {
            let mut mock = MockClusterGateway::new();
            mock.expect_create().never();
            mock.expect_patch_status().never();
            let ctx = Arc::new(Context::for_testing(Arc::new(mock), config()));

            let mut nb = notebook("nb", Default::default());
            nb.status = Some(status);

            let action = reconcile(Arc::new(nb), ctx).await.unwrap();
            assert_eq!(action, Action::await_change());
        }
    }

    #[tokio::test]
    async fn notebook_without_uid_cannot_own_objects() {
        let mut mock = MockClusterGateway::new();
        mock.expect_create().never();
        let ctx = Context::for_testing(Arc::new(mock), config());

        let mut nb = notebook("nb", Default::default());
        nb.metadata.uid = None;

        let err = reconcile_create(&nb, &ctx).await.unwrap_err();
        assert!(matches!(err, Error::MissingOwnerUid(_)));
    }
}
