//! Jupyter Operator - provisions notebook sessions from JupyterNotebook resources
//!
//! Each `JupyterNotebook` custom resource is reconciled into a complete,
//! network-reachable notebook workload:
//! - three ConfigMaps (bash profile, startup script, notebook config with the access token)
//! - a single-replica Deployment mounting those ConfigMaps and the project volume
//! - a ClusterIP Service selecting the Deployment's pods
//! - an Ingress routing `/<name>` on the operator's domain to that Service
//!
//! Every object carries an owner reference to its `JupyterNotebook`, so deleting
//! the notebook cascades to everything it created.
//!
//! # Modules
//!
//! - [`crd`] - The `JupyterNotebook` Custom Resource Definition
//! - [`config`] - Process-wide operator settings and the defaults registry
//! - [`resolve`] - Merges a notebook's material over the defaults
//! - [`token`] - Notebook access token generation
//! - [`workload`] - Kubernetes object types compiled by the operator
//! - [`compiler`] - Composes ConfigMaps, Deployment, Service and Ingress
//! - [`controller`] - Reconciliation driver and cluster API gateway
//! - [`events`] - Kubernetes Event publishing
//! - [`telemetry`] - Logging initialization
//! - [`error`] - Error types and failure classification

#![deny(missing_docs)]

pub mod compiler;
pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod events;
pub mod resolve;
pub mod telemetry;
pub mod token;
pub mod workload;

pub use error::{Error, FailureClass};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Well-known names
// =============================================================================

/// Field manager / controller name used for status patches and Events
pub const CONTROLLER_NAME: &str = "jupyter-operator";

/// Label tying every owned object to its notebook (`app=<name>`)
pub const LABEL_APP: &str = "app";

/// Label shared by the Deployment's pod template and the Service selector
pub const LABEL_DEPLOYMENT: &str = "deployment";
