//! Notebook Compiler
//!
//! Compiles a resolved notebook into the objects that make it a working
//! session. Composition is pure: the same inputs always yield the same
//! objects, which is what lets a resumed reconciliation recognise what an
//! earlier attempt already created.
//!
//! # Architecture
//!
//! The [`NotebookCompiler`] delegates to specialized composers:
//! - [`artifacts`]: the three ConfigMaps (bash profile, startup script, notebook config)
//! - [`deployment`]: the notebook Deployment wiring those ConfigMaps and the project volume
//! - [`network`]: the Service selecting the Deployment's pods and the Ingress routing to it
//!
//! # Naming
//!
//! Every object name is a function of the notebook name and the object's role
//! (see [`NotebookNames`]), so two notebooks never collide and repeated
//! compilation for one notebook yields the same names.

pub mod artifacts;
pub mod deployment;
pub mod network;

use crate::config::OperatorConfig;
use crate::resolve::ResolvedConfig;
use crate::token::AccessToken;
use crate::workload::{Deployment, Ingress, OwnedObject, Service};
use crate::Error;

pub use artifacts::{compose_artifacts, token_from_config, NotebookArtifacts};
pub use deployment::compose_workload;
pub use network::{compose_routing, compose_service, notebook_path, notebook_url};

/// Names of every object owned by one notebook
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotebookNames {
    /// The notebook itself
    pub notebook: String,
    /// Bash profile ConfigMap
    pub profile: String,
    /// Startup script ConfigMap
    pub startup: String,
    /// Notebook config ConfigMap
    pub config: String,
}

impl NotebookNames {
    /// Derive the object names for a notebook
    pub fn new(notebook: impl Into<String>) -> Self {
        let notebook = notebook.into();
        Self {
            profile: format!("bp-{}", notebook),
            startup: format!("startup-{}", notebook),
            config: format!("config-{}", notebook),
            notebook,
        }
    }

    /// Deployment name
    pub fn deployment(&self) -> &str {
        &self.notebook
    }

    /// Service name
    pub fn service(&self) -> &str {
        &self.notebook
    }

    /// Ingress name
    pub fn ingress(&self) -> &str {
        &self.notebook
    }

    /// TLS secret used when the operator has no explicit one
    pub fn synthesized_tls_secret(&self) -> String {
        format!("{}-tls", self.notebook)
    }
}

/// Every object compiled for a notebook
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledNotebook {
    /// ConfigMaps
    pub artifacts: NotebookArtifacts,
    /// Notebook server
    pub deployment: Deployment,
    /// Cluster-internal endpoint
    pub service: Service,
    /// External route
    pub ingress: Ingress,
}

impl CompiledNotebook {
    /// Objects in the order they must be submitted
    ///
    /// ConfigMaps come first because the Deployment mounts them; the Ingress
    /// comes last because it routes to the Service.
    pub fn into_submission_order(self) -> Vec<OwnedObject> {
        vec![
            self.artifacts.profile.into(),
            self.artifacts.startup.into(),
            self.artifacts.config.into(),
            self.deployment.into(),
            self.service.into(),
            self.ingress.into(),
        ]
    }
}

/// Compiles a resolved notebook into its owned objects
pub struct NotebookCompiler<'a> {
    config: &'a OperatorConfig,
}

impl<'a> NotebookCompiler<'a> {
    /// Create a compiler for the operator's settings
    pub fn new(config: &'a OperatorConfig) -> Self {
        Self { config }
    }

    /// Compile every object for a notebook
    pub fn compile(
        &self,
        names: &NotebookNames,
        namespace: &str,
        resolved: &ResolvedConfig,
        token: &AccessToken,
    ) -> Result<CompiledNotebook, Error> {
        Ok(CompiledNotebook {
            artifacts: compose_artifacts(names, namespace, token)?,
            deployment: compose_workload(names, namespace, resolved, self.config),
            service: compose_service(names, namespace),
            ingress: compose_routing(names, namespace, resolved, self.config),
        })
    }
}
