//! Cluster API gateway
//!
//! Everything the reconciler asks of the API server goes through
//! [`ClusterGateway`], so reconciliation can be exercised without a cluster.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{Api, ApiResource, DynamicObject, Patch, PatchParams, PostParams};
use kube::Client;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::crd::{JupyterNotebook, JupyterNotebookStatus};
use crate::workload::OwnedObject;
use crate::{Error, CONTROLLER_NAME};

/// Trait abstracting the Kubernetes API operations the reconciler needs
///
/// Errors are returned unclassified; the caller decides what a conflict or
/// an unavailable server means.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterGateway: Send + Sync {
    /// Create an object; fails with a 409 if it already exists
    async fn create(&self, namespace: &str, object: &OwnedObject) -> Result<(), Error>;

    /// Read the data of a ConfigMap, or `None` if it does not exist
    async fn get_config_map_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, String>>, Error>;

    /// Replace the status of a JupyterNotebook
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &JupyterNotebookStatus,
    ) -> Result<(), Error>;
}

/// Real Kubernetes gateway
pub struct KubeGateway {
    client: Client,
}

impl KubeGateway {
    /// Create a gateway wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api_resource(object: &OwnedObject) -> ApiResource {
        match object {
            OwnedObject::ConfigMap(_) => ApiResource::erase::<ConfigMap>(&()),
            OwnedObject::Deployment(_) => ApiResource::erase::<Deployment>(&()),
            OwnedObject::Service(_) => ApiResource::erase::<Service>(&()),
            OwnedObject::Ingress(_) => ApiResource::erase::<Ingress>(&()),
        }
    }
}

#[async_trait]
impl ClusterGateway for KubeGateway {
    async fn create(&self, namespace: &str, object: &OwnedObject) -> Result<(), Error> {
        let ar = Self::api_resource(object);
        let obj: DynamicObject = serde_json::from_value(object.to_json()?)?;

        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, &ar);
        let params = PostParams {
            field_manager: Some(CONTROLLER_NAME.to_string()),
            ..Default::default()
        };
        api.create(&params, &obj).await?;

        debug!(
            kind = object.kind(),
            object = %object.name(),
            namespace = %namespace,
            "created object"
        );
        Ok(())
    }

    async fn get_config_map_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, String>>, Error> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let config_map = api.get_opt(name).await?;
        Ok(config_map.map(|cm| cm.data.unwrap_or_default()))
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &JupyterNotebookStatus,
    ) -> Result<(), Error> {
        let api: Api<JupyterNotebook> = Api::namespaced(self.client.clone(), namespace);

        let status_patch = serde_json::json!({
            "status": status
        });

        api.patch_status(
            name,
            &PatchParams::apply(CONTROLLER_NAME),
            &Patch::Merge(&status_patch),
        )
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::{ConfigMap as NotebookConfigMap, ObjectMeta};

    #[test]
    fn api_resources_match_native_kinds() {
        let cm: OwnedObject = NotebookConfigMap::new(ObjectMeta::new("bp-nb", "ns", "nb")).into();
        let ar = KubeGateway::api_resource(&cm);
        assert_eq!(ar.kind, "ConfigMap");
        assert_eq!(ar.plural, "configmaps");
        assert_eq!(ar.api_version, "v1");
    }

    #[test]
    fn compiled_objects_decode_as_dynamic_objects() {
        let cm: OwnedObject = NotebookConfigMap::new(ObjectMeta::new("bp-nb", "ns", "nb"))
            .with_data(".bash_profile", "source ~/.bashrc")
            .into();
        let obj: DynamicObject = serde_json::from_value(cm.to_json().unwrap()).unwrap();
        assert_eq!(obj.metadata.name.as_deref(), Some("bp-nb"));
        assert_eq!(obj.metadata.namespace.as_deref(), Some("ns"));
        assert_eq!(obj.data["data"][".bash_profile"], "source ~/.bashrc");
    }
}
