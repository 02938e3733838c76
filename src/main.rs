//! Jupyter Operator - provisions notebook sessions from JupyterNotebook resources

use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};

use jupyter_operator::config::OperatorConfig;
use jupyter_operator::controller::{error_policy, reconcile, Context};
use jupyter_operator::crd::JupyterNotebook;
use jupyter_operator::telemetry::{init_telemetry, TelemetryConfig};
use jupyter_operator::CONTROLLER_NAME;

/// Jupyter Operator - creates notebook servers for JupyterNotebook resources
#[derive(Parser, Debug)]
#[command(name = "jupyter-operator", version, about, long_about = None)]
struct Cli {
    /// Print the JupyterNotebook CRD manifest and exit
    #[arg(long)]
    crd: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    ///
    /// Installs the JupyterNotebook CRD, then watches JupyterNotebooks in
    /// every namespace and creates their objects.
    Controller,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&JupyterNotebook::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    let telemetry = TelemetryConfig::from_env()?;
    init_telemetry(telemetry)?;

    match cli.command {
        Some(Commands::Controller) | None => run_controller().await,
    }
}

/// Install or update the JupyterNotebook CRD with server-side apply
///
/// This keeps the installed schema in step with the running operator.
async fn ensure_crd_installed(client: &Client) -> anyhow::Result<()> {
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kube::api::{Patch, PatchParams};

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(CONTROLLER_NAME).force();

    tracing::info!("Installing JupyterNotebook CRD...");
    crds.patch(
        "jupyternotebooks.squonk.it",
        &params,
        &Patch::Apply(&JupyterNotebook::crd()),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to install JupyterNotebook CRD: {}", e))?;

    Ok(())
}

/// Run in controller mode
async fn run_controller() -> anyhow::Result<()> {
    tracing::info!("Jupyter operator starting...");

    // Read once; a missing INGRESS_DOMAIN stops startup here
    let config = OperatorConfig::from_env()?;
    tracing::info!(
        domain = %config.ingress_domain,
        tls_secret = ?config.ingress_tls_secret,
        cert_issuer = ?config.ingress_cert_issuer,
        ingress_class = %config.ingress_class,
        "Loaded operator configuration"
    );

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    ensure_crd_installed(&client).await?;

    let notebooks: Api<JupyterNotebook> = Api::all(client.clone());
    let ctx = Arc::new(Context::new(client, config));

    tracing::info!("Starting JupyterNotebook controller");
    Controller::new(notebooks, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "Notebook reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Notebook reconciliation error");
                }
            }
        })
        .await;

    tracing::info!("Jupyter operator shutting down");
    Ok(())
}
