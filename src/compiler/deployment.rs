//! Workload composer
//!
//! Builds the single-replica notebook Deployment. The container never runs
//! the image's own entrypoint: it starts the mounted startup script, which in
//! turn reads the mounted profile and notebook config.

use std::collections::BTreeMap;

use super::artifacts::{CONFIG_KEY, PROFILE_KEY};
use super::NotebookNames;
use crate::config::{OperatorConfig, FS_GROUP, NOTEBOOK_PORT};
use crate::resolve::ResolvedConfig;
use crate::workload::{
    Container, ContainerPort, Deployment, DeploymentSpec, DeploymentStrategy, EnvVar,
    LabelSelector, ObjectMeta, PodMeta, PodSecurityContext, PodSpec, PodTemplateSpec,
    ResourceQuantity, ResourceRequirements, Volume, VolumeMount,
};

/// Name of the notebook container
pub const CONTAINER_NAME: &str = "notebook";

/// Directory the startup ConfigMap is mounted over
pub const STARTUP_MOUNT_PATH: &str = "/usr/local/bin";

/// Mount path of the notebook config
pub const CONFIG_MOUNT_PATH: &str = "/etc/jupyter_notebook_config.json";

/// Mount path of the bash profile
pub const PROFILE_MOUNT_PATH: &str = "/etc/.bash_profile";

/// Mount path of the project volume
pub const PROJECT_MOUNT_PATH: &str = "/home/jovyan";

/// Env var switching the image to JupyterLab
pub const ENV_ENABLE_LAB: &str = "JUPYTER_ENABLE_LAB";

const VOLUME_STARTUP: &str = "startup";
const VOLUME_CONFIG: &str = "config";
const VOLUME_PROFILE: &str = "bp";
const VOLUME_PROJECT: &str = "project";

/// Name of the container port
pub fn port_name() -> String {
    format!("{}-tcp", NOTEBOOK_PORT)
}

/// Labels selecting the notebook's pods
pub fn pod_selector(names: &NotebookNames) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(
        crate::LABEL_DEPLOYMENT.to_string(),
        names.deployment().to_string(),
    );
    labels
}

/// Compose the notebook Deployment
pub fn compose_workload(
    names: &NotebookNames,
    namespace: &str,
    resolved: &ResolvedConfig,
    config: &OperatorConfig,
) -> Deployment {
    let selector = pod_selector(names);

    // Extra labels go on the pod template only; the selector keys win.
    let mut pod_labels = resolved.extra_labels.clone();
    pod_labels.extend(selector.clone());

    let mut node_selector = BTreeMap::new();
    node_selector.insert(
        config.node_selector_key.clone(),
        config.node_selector_value.clone(),
    );

    let container = Container {
        name: CONTAINER_NAME.to_string(),
        image: resolved.image.clone(),
        image_pull_policy: Some("IfNotPresent".to_string()),
        command: Some(vec![
            "bash".to_string(),
            format!("{}/{}", STARTUP_MOUNT_PATH, super::artifacts::STARTUP_KEY),
        ]),
        env: environment(names, resolved),
        ports: vec![ContainerPort {
            name: Some(port_name()),
            container_port: NOTEBOOK_PORT,
            protocol: Some("TCP".to_string()),
        }],
        resources: Some(ResourceRequirements {
            requests: Some(ResourceQuantity {
                cpu: Some(resolved.cpu_request.clone()),
                memory: Some(resolved.memory_request.clone()),
            }),
            limits: Some(ResourceQuantity {
                cpu: Some(resolved.cpu_limit.clone()),
                memory: Some(resolved.memory_limit.clone()),
            }),
        }),
        volume_mounts: volume_mounts(resolved),
    };

    Deployment {
        api_version: "apps/v1".to_string(),
        kind: "Deployment".to_string(),
        metadata: ObjectMeta::new(names.deployment(), namespace, names.notebook.as_str()),
        spec: DeploymentSpec {
            replicas: 1,
            selector: LabelSelector {
                match_labels: selector,
            },
            strategy: DeploymentStrategy::recreate(),
            template: PodTemplateSpec {
                metadata: PodMeta { labels: pod_labels },
                spec: PodSpec {
                    service_account_name: resolved.service_account_name.clone(),
                    node_selector,
                    containers: vec![container],
                    security_context: Some(PodSecurityContext {
                        run_as_user: resolved.run_as_user,
                        run_as_group: resolved.run_as_group,
                        fs_group: FS_GROUP,
                    }),
                    volumes: volumes(names, resolved),
                },
            },
        },
    }
}

fn environment(names: &NotebookNames, resolved: &ResolvedConfig) -> Vec<EnvVar> {
    let mut env = vec![EnvVar::new(
        "HOME",
        format!("{}/.{}", PROJECT_MOUNT_PATH, names.notebook),
    )];
    if !resolved.is_classic() {
        env.push(EnvVar::new(ENV_ENABLE_LAB, "true"));
    }
    env
}

fn volume_mounts(resolved: &ResolvedConfig) -> Vec<VolumeMount> {
    vec![
        VolumeMount {
            name: VOLUME_STARTUP.to_string(),
            mount_path: STARTUP_MOUNT_PATH.to_string(),
            sub_path: None,
        },
        VolumeMount {
            name: VOLUME_CONFIG.to_string(),
            mount_path: CONFIG_MOUNT_PATH.to_string(),
            sub_path: Some(CONFIG_KEY.to_string()),
        },
        VolumeMount {
            name: VOLUME_PROFILE.to_string(),
            mount_path: PROFILE_MOUNT_PATH.to_string(),
            sub_path: Some(PROFILE_KEY.to_string()),
        },
        VolumeMount {
            name: VOLUME_PROJECT.to_string(),
            mount_path: PROJECT_MOUNT_PATH.to_string(),
            sub_path: resolved.project_id.clone(),
        },
    ]
}

fn volumes(names: &NotebookNames, resolved: &ResolvedConfig) -> Vec<Volume> {
    let project = match &resolved.project_claim_name {
        Some(claim) => Volume::claim(VOLUME_PROJECT, claim.as_str()),
        None => Volume::empty_dir(VOLUME_PROJECT),
    };

    vec![
        Volume::config_map(VOLUME_STARTUP, names.startup.as_str()),
        Volume::config_map(VOLUME_PROFILE, names.profile.as_str()),
        Volume::config_map(VOLUME_CONFIG, names.config.as_str()),
        project,
    ]
}
