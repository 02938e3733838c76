//! Controller for JupyterNotebook resources
//!
//! The reconciler lives in `notebook`; everything it asks of the API server
//! goes through the [`ClusterGateway`] trait so it can be driven by mocks.

mod gateway;
mod notebook;

pub use gateway::{ClusterGateway, KubeGateway};
pub use notebook::{error_policy, reconcile, reconcile_create, Context, RETRY_DELAY};
