use capacity_provider::aws;
use capacity_types::{Config, ConfigPatch};
use tokio::sync::RwLock;

use crate::persistent_file::PersistentFile;
use crate::util::Error;

const ENV_PREFIX: &str = "CAPACITY";

/// Holds the current `Config` in memory, backed by a `PersistentFile`. Every mutation
/// writes through to the backing store before the in-memory copy is swapped, so a
/// crash between the two leaves the file as the source of truth.
pub struct ConfigManager {
    file: Box<dyn PersistentFile>,
    current: RwLock<Config>,
}

impl ConfigManager {
    /// Loads the config from `file`. A missing backing file is not fatal: it means the
    /// autoscaler has never been configured yet, so a blank `Config` is used until the
    /// first `POST /api/v1/config` call establishes one (see `Config::cluster_name`).
    pub async fn new(file: Box<dyn PersistentFile>) -> Result<Self, Error> {
        let mut conf = match file.read().await {
            Ok(raw) => serde_json::from_slice(&raw)?,
            Err(_) => Config::default(),
        };
        apply_env(&mut conf);
        Ok(Self {
            file,
            current: RwLock::new(conf),
        })
    }

    pub async fn get_config(&self) -> Config {
        self.current.read().await.clone()
    }

    pub async fn set_config(&self, conf: Config) -> Result<(), Error> {
        self.write(&conf).await?;
        *self.current.write().await = conf;
        Ok(())
    }

    pub async fn patch_config(&self, patch: ConfigPatch) -> Result<Config, Error> {
        let merged = self.get_config().await.merge(&patch);
        merged.validate()?;
        self.set_config(merged.clone()).await?;
        Ok(merged)
    }

    async fn write(&self, conf: &Config) -> Result<(), Error> {
        let raw = serde_json::to_vec(conf)?;
        self.file.write(&raw).await
    }

    pub fn info(&self) -> String {
        self.file.info()
    }
}

/// Lets deployment credentials be injected via environment rather than baked into the
/// config file, mirroring the original's `CAPACITY_PROVIDER_AWS_*` convention.
fn apply_env(conf: &mut Config) {
    let pairs = [
        (aws::KEY_ID, format!("{ENV_PREFIX}_PROVIDER_AWS_KEYID")),
        (aws::SECRET_KEY, format!("{ENV_PREFIX}_PROVIDER_AWS_SECRETKEY")),
    ];
    for (key, env_name) in pairs {
        if let Ok(val) = std::env::var(&env_name) {
            conf.provider.insert(key.to_string(), val);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    struct MemFile(Mutex<Vec<u8>>);

    #[async_trait]
    impl PersistentFile for MemFile {
        fn info(&self) -> String {
            "in-memory file".to_string()
        }
        async fn read(&self) -> Result<Vec<u8>, Error> {
            Ok(self.0.lock().await.clone())
        }
        async fn write(&self, data: &[u8]) -> Result<(), Error> {
            *self.0.lock().await = data.to_vec();
            Ok(())
        }
    }

    async fn manager_with(conf: &Config) -> ConfigManager {
        let raw = serde_json::to_vec(conf).unwrap();
        let file = Box::new(MemFile(Mutex::new(raw)));
        ConfigManager::new(file).await.unwrap()
    }

    #[tokio::test]
    async fn patch_merges_and_persists() {
        let manager = manager_with(&Config {
            workers_count_min: 1,
            workers_count_max: 3,
            ..Config::default()
        })
        .await;

        let patch = ConfigPatch {
            workers_count_max: Some(5),
            ..ConfigPatch::default()
        };
        let merged = manager.patch_config(patch).await.unwrap();
        assert_eq!(merged.workers_count_max, 5);
        assert_eq!(merged.workers_count_min, 1);

        let reloaded = manager.get_config().await;
        assert_eq!(reloaded.workers_count_max, 5);
    }

    #[tokio::test]
    async fn patch_rejects_invalid_merge() {
        let manager = manager_with(&Config::default()).await;
        let patch = ConfigPatch {
            workers_count_min: Some(-1),
            ..ConfigPatch::default()
        };
        assert!(manager.patch_config(patch).await.is_err());
    }
}
