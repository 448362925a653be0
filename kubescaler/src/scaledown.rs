use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use k8s_openapi::api::core::v1::Pod;

use capacity_types::Worker;

use crate::scaleup::filter_daemonset_and_standalone_out;

pub const MIN_WORKER_LIFESPAN: ChronoDuration = ChronoDuration::minutes(20);

/// Workers with a registered node that currently has no scheduled pods on it.
pub fn empty_workers<'a>(workers: &'a [Worker], scheduled_pods: &[Pod]) -> Vec<&'a Worker> {
    let filtered = filter_daemonset_and_standalone_out(scheduled_pods);
    let node_pods = node_pods_map(&filtered);
    workers
        .iter()
        .filter(|w| !w.node_name.is_empty() && node_pods.get(&w.node_name).is_none_or(Vec::is_empty))
        .collect()
}

fn node_pods_map(pods: &[&Pod]) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for pod in pods {
        let Some(node_name) = pod.spec.as_ref().and_then(|s| s.node_name.clone()) else {
            continue;
        };
        map.entry(node_name)
            .or_default()
            .push(pod.metadata.name.clone().unwrap_or_default());
    }
    map
}

/// Returns `None` if eligible for removal, or `Some(reason)` to log why it was skipped.
pub fn ignore_reason(worker: &Worker, ignored_labels: &BTreeMap<String, String>, now: DateTime<Utc>) -> Option<String> {
    if worker.reserved {
        return Some("reserved=true".to_string());
    }
    if has_ignored_label(worker, ignored_labels) {
        return Some("ignoredLabel=true".to_string());
    }
    if let Some(created) = worker.creation_timestamp
        && created + MIN_WORKER_LIFESPAN > now
    {
        return Some(format!("lifespan={}", now - created));
    }
    None
}

fn has_ignored_label(worker: &Worker, ignored: &BTreeMap<String, String>) -> bool {
    ignored
        .iter()
        .any(|(k, v)| worker.node_labels.get(k) == Some(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PodSpec;

    fn worker(node_name: &str, reserved: bool, created_mins_ago: i64) -> Worker {
        Worker {
            node_name: node_name.to_string(),
            reserved,
            creation_timestamp: Some(Utc::now() - ChronoDuration::minutes(created_mins_ago)),
            ..Worker::default()
        }
    }

    fn scheduled_pod(node_name: &str) -> Pod {
        Pod {
            spec: Some(PodSpec {
                node_name: Some(node_name.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn node_with_no_pods_is_empty() {
        let w = worker("node-1", false, 100);
        assert_eq!(empty_workers(&[w.clone()], &[]).len(), 1);
    }

    #[test]
    fn node_with_pods_is_not_empty() {
        let w = worker("node-1", false, 100);
        let pod = scheduled_pod("node-1");
        assert!(empty_workers(&[w], &[pod]).is_empty());
    }

    #[test]
    fn pending_worker_without_node_is_never_empty() {
        let w = worker("", false, 100);
        assert!(empty_workers(&[w], &[]).is_empty());
    }

    #[test]
    fn reserved_worker_is_ignored() {
        let w = worker("node-1", true, 100);
        assert_eq!(
            ignore_reason(&w, &BTreeMap::new(), Utc::now()),
            Some("reserved=true".to_string())
        );
    }

    #[test]
    fn young_worker_is_ignored() {
        let w = worker("node-1", false, 5);
        assert!(ignore_reason(&w, &BTreeMap::new(), Utc::now()).is_some());
    }

    #[test]
    fn eligible_worker_has_no_reason() {
        let w = worker("node-1", false, 100);
        assert!(ignore_reason(&w, &BTreeMap::new(), Utc::now()).is_none());
    }
}
