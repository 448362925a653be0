use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label toggled on a node to mark its worker as reserved (exempt from scale-down).
pub const LABEL_RESERVED: &str = "capacity.supergiant.io/reserved";

/// A cloud instance joined with the cluster node it backs, if any. Recomputed on every
/// read from the provider's machine list and the node lister; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Worker {
    pub cluster_name: String,
    pub machine_id: String,
    pub machine_name: String,
    pub machine_type: String,
    pub machine_state: String,
    pub creation_timestamp: Option<DateTime<Utc>>,
    pub reserved: bool,
    pub node_name: String,
    pub node_state: String,
    #[serde(default)]
    pub node_labels: BTreeMap<String, String>,
}

impl Worker {
    pub fn has_node(&self) -> bool {
        !self.node_name.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkerList {
    pub items: Vec<Worker>,
}

/// The provider's native record for an instance. Owned by the provider, not the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Machine {
    pub id: String,
    pub name: String,
    pub machine_type: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
}

/// A named, immutable resource SKU. CPU and memory are quantized for arithmetic
/// (millicores and bytes); the `_human` fields carry the provider's display strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MachineType {
    pub name: String,
    pub cpu_human: String,
    pub memory_human: String,
    pub cpu_millis: i64,
    pub memory_bytes: i64,
    pub price_hour: f64,
}

impl MachineType {
    pub fn has_resources_for(&self, cpu_millis: i64, memory_bytes: i64) -> bool {
        self.cpu_millis >= cpu_millis && self.memory_bytes >= memory_bytes
    }
}

/// Sorts machine types by hourly price ascending; ties break by (cpu desc, memory desc).
/// Stable, so equal-priced, equal-sized entries keep catalogue order.
pub fn sorted_machine_types(mut types: Vec<MachineType>) -> Vec<MachineType> {
    types.sort_by(|a, b| {
        a.price_hour
            .partial_cmp(&b.price_hour)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.cpu_millis.cmp(&a.cpu_millis))
            .then_with(|| b.memory_bytes.cmp(&a.memory_bytes))
    });
    types
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("workers_count_min must be >= 0")]
    NegativeMin,
    #[error("workers_count_max must be >= 0")]
    NegativeMax,
}

/// Autoscaler policy. Read from the backing `PersistentFile`, merged with environment
/// overrides, and mutated only through `Config::merge`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub cluster_name: String,
    pub provider_name: String,
    #[serde(default)]
    pub provider: BTreeMap<String, String>,
    /// `None` means "use the default (unpaused)"; `Some(true)` means paused.
    #[serde(default)]
    pub paused: Option<bool>,
    /// Hard lock: no automatic action of any kind, independent of `paused`.
    #[serde(default)]
    pub pause_lock: bool,
    #[serde(default)]
    pub scan_interval_seconds: u64,
    #[serde(default)]
    pub workers_count_min: i64,
    #[serde(default)]
    pub workers_count_max: i64,
    /// Allow-list of machine type names. Empty means all catalogue types are allowed.
    #[serde(default)]
    pub machine_types: Vec<String>,
    #[serde(default)]
    pub max_machine_provision_time_seconds: u64,
    /// A node matching any `key=value` entry here is excluded from scale-down.
    #[serde(default)]
    pub ignored_node_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub new_node_time_buffer_seconds: u64,
    /// Boot script handed to newly created instances, base64-encoded at rest.
    #[serde(default)]
    pub userdata: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cluster_name: String::new(),
            provider_name: String::new(),
            provider: BTreeMap::new(),
            paused: None,
            pause_lock: false,
            scan_interval_seconds: 20,
            workers_count_min: 0,
            workers_count_max: 0,
            machine_types: Vec::new(),
            max_machine_provision_time_seconds: 600,
            ignored_node_labels: BTreeMap::new(),
            new_node_time_buffer_seconds: 120,
            userdata: String::new(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers_count_min < 0 {
            return Err(ConfigError::NegativeMin);
        }
        if self.workers_count_max < 0 {
            return Err(ConfigError::NegativeMax);
        }
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.pause_lock || self.paused.unwrap_or(false)
    }

    /// Applies a patch on top of `self`: a numeric field carrying its zero value in
    /// `patch` is treated as "unchanged" (matching the original's `if patch.X != 0`
    /// convention), except `paused`, which is explicit-or-absent (an `Option<bool>`
    /// round-trips through JSON `null` as "leave untouched").
    pub fn merge(&self, patch: &ConfigPatch) -> Config {
        let mut merged = self.clone();
        if let Some(v) = &patch.cluster_name {
            merged.cluster_name = v.clone();
        }
        if let Some(v) = &patch.provider_name {
            merged.provider_name = v.clone();
        }
        if let Some(v) = &patch.provider {
            merged.provider = v.clone();
        }
        if let Some(v) = patch.paused {
            merged.paused = Some(v);
        }
        if let Some(v) = patch.pause_lock {
            merged.pause_lock = v;
        }
        if patch.scan_interval_seconds.is_some_and(|v| v != 0) {
            merged.scan_interval_seconds = patch.scan_interval_seconds.unwrap();
        }
        if patch.workers_count_min.is_some_and(|v| v != 0) {
            merged.workers_count_min = patch.workers_count_min.unwrap();
        }
        if patch.workers_count_max.is_some_and(|v| v != 0) {
            merged.workers_count_max = patch.workers_count_max.unwrap();
        }
        if let Some(v) = &patch.machine_types {
            merged.machine_types = v.clone();
        }
        if patch.max_machine_provision_time_seconds.is_some_and(|v| v != 0) {
            merged.max_machine_provision_time_seconds = patch.max_machine_provision_time_seconds.unwrap();
        }
        if let Some(v) = &patch.ignored_node_labels {
            merged.ignored_node_labels = v.clone();
        }
        if patch.new_node_time_buffer_seconds.is_some_and(|v| v != 0) {
            merged.new_node_time_buffer_seconds = patch.new_node_time_buffer_seconds.unwrap();
        }
        if let Some(v) = &patch.userdata {
            merged.userdata = v.clone();
        }
        merged
    }
}

/// A partial `Config`, as accepted by the config PATCH endpoint. Every field is
/// optional; absence means "leave as-is".
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigPatch {
    pub cluster_name: Option<String>,
    pub provider_name: Option<String>,
    pub provider: Option<BTreeMap<String, String>>,
    pub paused: Option<bool>,
    pub pause_lock: Option<bool>,
    pub scan_interval_seconds: Option<u64>,
    pub workers_count_min: Option<i64>,
    pub workers_count_max: Option<i64>,
    pub machine_types: Option<Vec<String>>,
    pub max_machine_provision_time_seconds: Option<u64>,
    pub ignored_node_labels: Option<BTreeMap<String, String>>,
    pub new_node_time_buffer_seconds: Option<u64>,
    pub userdata: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mtype(name: &str, cpu: i64, mem: i64, price: f64) -> MachineType {
        MachineType {
            name: name.into(),
            cpu_human: format!("{cpu}m"),
            memory_human: format!("{mem}b"),
            cpu_millis: cpu,
            memory_bytes: mem,
            price_hour: price,
        }
    }

    #[test]
    fn sorts_by_price_then_biggest_first_on_ties() {
        let types = vec![
            mtype("a", 1000, 1_000_000, 0.10),
            mtype("b", 2000, 2_000_000, 0.05),
            mtype("c", 4000, 4_000_000, 0.05),
        ];
        let sorted = sorted_machine_types(types);
        assert_eq!(sorted[0].name, "c");
        assert_eq!(sorted[1].name, "b");
        assert_eq!(sorted[2].name, "a");
    }

    #[test]
    fn config_merge_leaves_unset_fields_alone() {
        let base = Config {
            cluster_name: "prod".into(),
            workers_count_min: 2,
            workers_count_max: 10,
            ..Config::default()
        };
        let patch = ConfigPatch {
            workers_count_max: Some(20),
            ..ConfigPatch::default()
        };
        let merged = base.merge(&patch);
        assert_eq!(merged.cluster_name, "prod");
        assert_eq!(merged.workers_count_min, 2);
        assert_eq!(merged.workers_count_max, 20);
    }

    #[test]
    fn config_merge_zero_value_numeric_patch_is_a_no_op() {
        let base = Config {
            workers_count_min: 2,
            workers_count_max: 10,
            scan_interval_seconds: 30,
            max_machine_provision_time_seconds: 600,
            new_node_time_buffer_seconds: 120,
            ..Config::default()
        };
        let patch = ConfigPatch {
            workers_count_max: Some(0),
            scan_interval_seconds: Some(0),
            max_machine_provision_time_seconds: Some(0),
            new_node_time_buffer_seconds: Some(0),
            ..ConfigPatch::default()
        };
        let merged = base.merge(&patch);
        assert_eq!(merged.workers_count_min, 2);
        assert_eq!(merged.workers_count_max, 10);
        assert_eq!(merged.scan_interval_seconds, 30);
        assert_eq!(merged.max_machine_provision_time_seconds, 600);
        assert_eq!(merged.new_node_time_buffer_seconds, 120);
    }

    #[test]
    fn pause_lock_overrides_paused() {
        let cfg = Config {
            paused: Some(false),
            pause_lock: true,
            ..Config::default()
        };
        assert!(cfg.is_paused());
    }

    #[test]
    fn validate_rejects_negative_counts() {
        let cfg = Config {
            workers_count_min: -1,
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::NegativeMin)));
    }
}
