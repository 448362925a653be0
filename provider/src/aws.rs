use std::collections::BTreeMap;

use async_trait::async_trait;
use capacity_types::{Machine, MachineType};

use crate::{Error, Provider, parse_provider_id};

pub const NAME: &str = "aws";

// Provider config keys, as stored in `Config::provider`.
pub const KEY_ID: &str = "awsKeyID";
pub const SECRET_KEY: &str = "awsSecretKey";
pub const REGION: &str = "awsRegion";
pub const KEY_NAME: &str = "awsKeyName";
pub const IMAGE_ID: &str = "awsImageID";
pub const IAM_ROLE: &str = "awsIAMRole";
pub const SECURITY_GROUPS: &str = "awsSecurityGroups";
pub const SUBNET_ID: &str = "awsSubnetID";
pub const VOL_TYPE: &str = "awsVolType";
pub const VOL_SIZE: &str = "awsVolSize";
pub const VOL_DEVICE_NAME: &str = "awsVolDeviceName";
pub const TAG_CLUSTER: &str = "KubernetesCluster";

#[derive(Debug, Clone)]
struct InstanceConfig {
    key_name: String,
    image_id: String,
    iam_role: String,
    security_groups: Vec<String>,
    subnet_id: String,
    vol_type: String,
    vol_size: i64,
    vol_device_name: String,
}

/// Structurally complete, but no live SDK wiring: every operation that would actually
/// talk to EC2 returns `Error::NotImplemented`.
pub struct AwsProvider {
    cluster_name: String,
    region: String,
    key_id: String,
    secret_key: String,
    inst_conf: InstanceConfig,
    tags: BTreeMap<String, String>,
}

impl AwsProvider {
    pub fn new(cluster_name: &str, config: &BTreeMap<String, String>) -> Result<Self, Error> {
        let get = |k: &str| config.get(k).cloned().unwrap_or_default();

        let vol_size = if let Some(v) = config.get(VOL_SIZE) {
            v.parse::<i64>()
                .map_err(|e| Error::Config(format!("invalid {VOL_SIZE} {v:?}: {e}")))?
        } else {
            0
        };

        let mut tags = config
            .get("awsTags")
            .map(|s| parse_tag_map(s))
            .unwrap_or_default();
        tags.insert(TAG_CLUSTER.to_string(), cluster_name.to_string());

        let vol_device_name = {
            let v = get(VOL_DEVICE_NAME);
            if v.is_empty() {
                "/dev/sda1".to_string()
            } else {
                v
            }
        };

        Ok(Self {
            cluster_name: cluster_name.to_string(),
            region: get(REGION),
            key_id: get(KEY_ID),
            secret_key: get(SECRET_KEY),
            inst_conf: InstanceConfig {
                key_name: get(KEY_NAME),
                image_id: get(IMAGE_ID),
                iam_role: get(IAM_ROLE),
                security_groups: parse_csv(&get(SECURITY_GROUPS)),
                subnet_id: get(SUBNET_ID),
                vol_type: get(VOL_TYPE),
                vol_size,
                vol_device_name,
            },
            tags,
        })
    }
}

fn parse_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_tag_map(s: &str) -> BTreeMap<String, String> {
    s.split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

#[async_trait]
impl Provider for AwsProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn machine_types(&self) -> Result<Vec<MachineType>, Error> {
        let _ = (&self.region, &self.key_id, &self.secret_key);
        Err(Error::NotImplemented("aws machine_types"))
    }

    async fn machines(&self) -> Result<Vec<Machine>, Error> {
        let _ = &self.cluster_name;
        Err(Error::NotImplemented("aws machines"))
    }

    async fn get_machine(&self, _id: &str) -> Result<Machine, Error> {
        Err(Error::NotImplemented("aws get_machine"))
    }

    async fn create_machine(
        &self,
        _name: &str,
        _machine_type: &str,
        _role: &str,
        _userdata: &str,
        _extra_tags: &BTreeMap<String, String>,
    ) -> Result<Machine, Error> {
        let _ = &self.inst_conf;
        let _ = &self.tags;
        Err(Error::NotImplemented("aws create_machine"))
    }

    async fn delete_machine(&self, _id: &str) -> Result<(), Error> {
        Err(Error::NotImplemented("aws delete_machine"))
    }

    fn parse_machine_id(&self, provider_id: &str) -> Result<String, Error> {
        parse_provider_id("aws", provider_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_tags_with_cluster_name() {
        let mut config = BTreeMap::new();
        config.insert(REGION.to_string(), "us-east-1".to_string());
        let p = AwsProvider::new("demo", &config).unwrap();
        assert_eq!(p.tags.get(TAG_CLUSTER), Some(&"demo".to_string()));
    }

    #[test]
    fn new_rejects_invalid_vol_size() {
        let mut config = BTreeMap::new();
        config.insert(VOL_SIZE.to_string(), "not-a-number".to_string());
        assert!(AwsProvider::new("demo", &config).is_err());
    }
}
