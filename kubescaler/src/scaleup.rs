use chrono::{DateTime, Duration as ChronoDuration, Utc};
use k8s_openapi::api::core::v1::Pod;

use capacity_types::{MachineType, sorted_machine_types};

use crate::resources::{parse_cpu_millis, parse_memory_bytes};
use crate::util::Error;

/// A pod is "new" for this long after creation: give the scheduler a chance to place
/// it on existing capacity before we count it as needing a fresh node.
const UNSCHEDULABLE_POD_TIME_BUFFER: ChronoDuration = ChronoDuration::seconds(2);

/// Picks the cheapest machine type with room for the unscheduled pods and creates one
/// worker of that type. Returns `Ok(None)` if there was nothing to do (no pods worth
/// scaling for), `Ok(Some(machine_type))` on a successful create.
pub async fn plan_scale_up(
    unscheduled_pods: &[Pod],
    machine_types: &[MachineType],
    now: DateTime<Utc>,
) -> Result<Option<MachineType>, Error> {
    let (to_scale, _ignored) = filter_pods(unscheduled_pods, machine_types, now);
    if to_scale.is_empty() {
        return Ok(None);
    }

    let (cpu, mem) = total_cpu_mem(&to_scale);
    let chosen = best_machine_for(cpu, mem, machine_types)?;
    Ok(Some(chosen))
}

fn filter_pods<'a>(
    pods: &'a [Pod],
    allowed_machines: &[MachineType],
    now: DateTime<Utc>,
) -> (Vec<&'a Pod>, Vec<(&'a str, &'static str)>) {
    let mut to_scale = Vec::new();
    let mut ignored = Vec::new();
    for pod in pods {
        match ignore_reason(pod, allowed_machines, now) {
            Some(reason) => ignored.push((pod.metadata.name.as_deref().unwrap_or(""), reason)),
            None => to_scale.push(pod),
        }
    }
    (to_scale, ignored)
}

fn ignore_reason(pod: &Pod, allowed_machines: &[MachineType], now: DateTime<Utc>) -> Option<&'static str> {
    if is_new_pod(pod, now) {
        return Some("new-pod");
    }
    if !has_controller(pod) {
        return Some("standalone-pod");
    }
    if has_daemonset_controller(pod) {
        return Some("daemonset-pod");
    }
    if !has_cpu_memory_constraints(pod) {
        return Some("not-requests-is-set");
    }
    if !has_machine_for(allowed_machines, pod) {
        return Some("pod-exceeds-available-machine-resources");
    }
    None
}

fn has_machine_for(machine_types: &[MachineType], pod: &Pod) -> bool {
    let (cpu, mem) = get_cpu_mem_for_scheduling(pod);
    machine_types.iter().any(|m| m.has_resources_for(cpu, mem))
}

/// The cheapest machine type that fits, or the biggest catalogue entry if none fit
/// (matching the original's fallback: offer the best we have rather than nothing).
fn best_machine_for(cpu: i64, mem: i64, machine_types: &[MachineType]) -> Result<MachineType, Error> {
    if cpu == 0 && mem == 0 {
        return Err(Error::NoResourcesRequested);
    }
    if machine_types.is_empty() {
        return Err(Error::NoAllowedMachines);
    }

    let sorted = sorted_machine_types(machine_types.to_vec());
    let mut biggest = sorted[0].clone();
    for m in &sorted {
        if m.has_resources_for(cpu, mem) {
            return Ok(m.clone());
        }
        biggest = m.clone();
    }
    Ok(biggest)
}

fn has_cpu_memory_constraints(pod: &Pod) -> bool {
    let (cpu, mem) = get_cpu_mem_for_scheduling(pod);
    cpu != 0 || mem != 0
}

fn has_controller(pod: &Pod) -> bool {
    controller_of(pod).is_some()
}

pub(crate) fn has_daemonset_controller(pod: &Pod) -> bool {
    controller_of(pod).is_some_and(|r| r.kind == "DaemonSet")
}

/// Restricts scheduled pods to those owned by a non-DaemonSet controller: standalone
/// pods and DaemonSet pods don't represent elastic demand, so they're ignored by
/// scale-down's empty-node check.
pub(crate) fn filter_daemonset_and_standalone_out(pods: &[Pod]) -> Vec<&Pod> {
    pods.iter()
        .filter(|p| has_controller(p) && !has_daemonset_controller(p))
        .collect()
}

fn controller_of(pod: &Pod) -> Option<&k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference> {
    pod.metadata
        .owner_references
        .as_ref()?
        .iter()
        .find(|r| r.controller == Some(true))
}

fn is_new_pod(pod: &Pod, now: DateTime<Utc>) -> bool {
    let Some(created) = creation_time_utc(pod) else {
        return false;
    };
    created + UNSCHEDULABLE_POD_TIME_BUFFER > now
}

/// `k8s_openapi::Time` wraps a `jiff::Timestamp`; bridge to `chrono` through RFC 3339
/// rather than depending on jiff's arithmetic API directly.
fn creation_time_utc(pod: &Pod) -> Option<DateTime<Utc>> {
    let created = pod.metadata.creation_timestamp.as_ref()?;
    DateTime::parse_from_rfc3339(&created.0.to_string())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn get_cpu_mem_for_scheduling(pod: &Pod) -> (i64, i64) {
    let mut cpu = 0;
    let mut mem = 0;
    let Some(spec) = pod.spec.as_ref() else {
        return (0, 0);
    };
    for container in &spec.containers {
        let Some(requests) = container.resources.as_ref().and_then(|r| r.requests.as_ref()) else {
            continue;
        };
        if let Some(q) = requests.get("cpu") {
            cpu += parse_cpu_millis(&q.0);
        }
        if let Some(q) = requests.get("memory") {
            mem += parse_memory_bytes(&q.0);
        }
    }
    (cpu, mem)
}

fn total_cpu_mem(pods: &[&Pod]) -> (i64, i64) {
    pods.iter().fold((0, 0), |(cpu, mem), pod| {
        let (c, m) = get_cpu_mem_for_scheduling(pod);
        (cpu + c, mem + m)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Container, PodSpec, ResourceRequirements};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{OwnerReference, Time};
    use std::collections::BTreeMap;
    use std::str::FromStr;

    fn time_ago(secs: i64) -> Time {
        let rfc3339 = (Utc::now() - ChronoDuration::seconds(secs)).to_rfc3339();
        Time(k8s_openapi::jiff::Timestamp::from_str(&rfc3339).expect("valid timestamp"))
    }

    fn mtype(name: &str, cpu: i64, mem: i64, price: f64) -> MachineType {
        MachineType {
            name: name.into(),
            cpu_human: String::new(),
            memory_human: String::new(),
            cpu_millis: cpu,
            memory_bytes: mem,
            price_hour: price,
        }
    }

    fn pod_requesting(cpu: &str, mem: &str, owned: bool, daemonset: bool, age_secs: i64) -> Pod {
        let mut requests = BTreeMap::new();
        requests.insert("cpu".to_string(), Quantity(cpu.to_string()));
        requests.insert("memory".to_string(), Quantity(mem.to_string()));
        let owner_references = if owned {
            Some(vec![OwnerReference {
                controller: Some(true),
                kind: if daemonset { "DaemonSet".into() } else { "ReplicaSet".into() },
                ..default_owner_ref()
            }])
        } else {
            None
        };
        Pod {
            metadata: kube::api::ObjectMeta {
                name: Some("p".into()),
                owner_references,
                creation_timestamp: Some(time_ago(age_secs)),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![Container {
                    resources: Some(ResourceRequirements {
                        requests: Some(requests),
                        ..Default::default()
                    }),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn default_owner_ref() -> OwnerReference {
        OwnerReference {
            api_version: String::new(),
            block_owner_deletion: None,
            controller: None,
            kind: String::new(),
            name: String::new(),
            uid: String::new(),
        }
    }

    #[tokio::test]
    async fn picks_cheapest_fitting_machine() {
        let pod = pod_requesting("500m", "512Mi", true, false, 100);
        let types = vec![
            mtype("small", 1000, 1024 * 1024 * 1024, 0.05),
            mtype("tiny", 100, 128 * 1024 * 1024, 0.01),
        ];
        let chosen = plan_scale_up(&[pod], &types, Utc::now()).await.unwrap();
        assert_eq!(chosen.unwrap().name, "small");
    }

    #[tokio::test]
    async fn ignores_new_pods() {
        let pod = pod_requesting("500m", "512Mi", true, false, 0);
        let types = vec![mtype("small", 1000, 1024 * 1024 * 1024, 0.05)];
        assert!(plan_scale_up(&[pod], &types, Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ignores_standalone_and_daemonset_pods() {
        let standalone = pod_requesting("500m", "512Mi", false, false, 100);
        let daemonset = pod_requesting("500m", "512Mi", true, true, 100);
        let types = vec![mtype("small", 1000, 1024 * 1024 * 1024, 0.05)];
        assert!(
            plan_scale_up(&[standalone, daemonset], &types, Utc::now())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn falls_back_to_biggest_when_nothing_fits() {
        let pod = pod_requesting("8", "64Gi", true, false, 100);
        let types = vec![
            mtype("small", 1000, 1024 * 1024 * 1024, 0.05),
            mtype("medium", 2000, 4 * 1024 * 1024 * 1024, 0.10),
        ];
        let chosen = plan_scale_up(&[pod], &types, Utc::now()).await.unwrap();
        assert_eq!(chosen.unwrap().name, "medium");
    }
}
