use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{
    Api, Client,
    api::{Patch, PatchParams, PostParams},
};

use crate::util::{Error, MANAGER_NAME};

/// Abstracts over where the `Config` JSON blob is stored, mirroring the original
/// filesystem-or-ConfigMap duality.
#[async_trait]
pub trait PersistentFile: Send + Sync {
    fn info(&self) -> String;
    async fn read(&self) -> Result<Vec<u8>, Error>;
    async fn write(&self, data: &[u8]) -> Result<(), Error>;
}

pub struct FsFile {
    path: std::path::PathBuf,
}

impl FsFile {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PersistentFile for FsFile {
    fn info(&self) -> String {
        format!("{:?} file", self.path)
    }

    async fn read(&self) -> Result<Vec<u8>, Error> {
        Ok(tokio::fs::read(&self.path).await?)
    }

    async fn write(&self, data: &[u8]) -> Result<(), Error> {
        Ok(tokio::fs::write(&self.path, data).await?)
    }
}

/// Stores the config under a single key in a Kubernetes ConfigMap, creating it on
/// first write if absent.
pub struct ConfigMapFile {
    client: Client,
    namespace: String,
    name: String,
    key: String,
}

impl ConfigMapFile {
    pub fn new(client: Client, namespace: impl Into<String>, name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            name: name.into(),
            key: key.into(),
        }
    }

    fn api(&self) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

#[async_trait]
impl PersistentFile for ConfigMapFile {
    fn info(&self) -> String {
        format!("{} key, {}/{} ConfigMap", self.key, self.namespace, self.name)
    }

    async fn read(&self) -> Result<Vec<u8>, Error> {
        let cm = self.api().get(&self.name).await?;
        cm.data
            .and_then(|mut data| data.remove(&self.key))
            .map(String::into_bytes)
            .ok_or_else(|| Error::ConfigKeyNotFound(self.key.clone()))
    }

    async fn write(&self, data: &[u8]) -> Result<(), Error> {
        let value = String::from_utf8_lossy(data).to_string();
        match self.api().get(&self.name).await {
            Ok(_) => {
                let patch = serde_json::json!({ "data": { self.key.clone(): value } });
                self.api()
                    .patch(
                        &self.name,
                        &PatchParams::apply(MANAGER_NAME),
                        &Patch::Merge(&patch),
                    )
                    .await?;
                Ok(())
            }
            Err(kube::Error::Api(e)) if e.code == 404 => {
                let mut cm = ConfigMap {
                    metadata: kube::api::ObjectMeta {
                        name: Some(self.name.clone()),
                        namespace: Some(self.namespace.clone()),
                        ..Default::default()
                    },
                    ..Default::default()
                };
                cm.data = Some([(self.key.clone(), value)].into_iter().collect());
                self.api().create(&PostParams::default(), &cm).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
