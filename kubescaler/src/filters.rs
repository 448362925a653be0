use k8s_openapi::api::core::v1::{Node, Pod};

const SUCCEEDED: &str = "Succeeded";
const FAILED: &str = "Failed";

/// True iff the pod has been assigned a node and is not in a terminal phase.
pub fn is_pod_scheduled(pod: &Pod) -> bool {
    let node_name = pod.spec.as_ref().and_then(|s| s.node_name.as_deref());
    let phase = pod.status.as_ref().and_then(|s| s.phase.as_deref());
    matches!(node_name, Some(n) if !n.is_empty()) && !matches!(phase, Some(SUCCEEDED) | Some(FAILED))
}

/// True iff the pod has no assigned node, is not terminal, and the scheduler has
/// explicitly reported it as unschedulable.
pub fn is_pod_unschedulable(pod: &Pod) -> bool {
    let node_name = pod.spec.as_ref().and_then(|s| s.node_name.as_deref());
    let phase = pod.status.as_ref().and_then(|s| s.phase.as_deref());
    let has_node = matches!(node_name, Some(n) if !n.is_empty());
    if has_node || matches!(phase, Some(SUCCEEDED) | Some(FAILED)) {
        return false;
    }
    let condition = pod
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .and_then(|conds| conds.iter().find(|c| c.type_ == "PodScheduled"));
    matches!(condition, Some(c) if c.status == "False" && c.reason.as_deref() == Some("Unschedulable"))
}

/// True iff the node reports `Ready` and neither `OutOfDisk` nor `NetworkUnavailable`,
/// and `spec.unschedulable` is not set. A node with no `Ready` condition at all is
/// treated as not-ready rather than as an error: it is a property of that node, not a
/// reason to fail the whole tick.
pub fn is_node_ready_and_schedulable(node: &Node) -> bool {
    if readiness_state(node) != Some(true) {
        return false;
    }
    let unschedulable = node
        .spec
        .as_ref()
        .and_then(|s| s.unschedulable)
        .unwrap_or(false);
    !unschedulable
}

/// Returns `Some(true)`/`Some(false)` once a `Ready` condition has been observed, or
/// `None` if the node has reported no conditions at all yet.
fn readiness_state(node: &Node) -> Option<bool> {
    let conditions = node.status.as_ref()?.conditions.as_ref()?;
    let mut ready_found = false;
    let mut can_be_ready = true;
    for cond in conditions {
        match cond.type_.as_str() {
            "Ready" => {
                ready_found = true;
                if cond.status == "False" || cond.status == "Unknown" {
                    can_be_ready = false;
                }
            }
            "OutOfDisk" | "NetworkUnavailable" => {
                if cond.status == "True" {
                    can_be_ready = false;
                }
            }
            _ => {}
        }
    }
    ready_found.then_some(can_be_ready)
}

pub fn get_ready_nodes(nodes: &[Node]) -> Vec<Node> {
    nodes
        .iter()
        .filter(|n| is_node_ready_and_schedulable(n))
        .cloned()
        .collect()
}

pub fn get_scheduled_pods(pods: &[Pod]) -> Vec<Pod> {
    pods.iter().filter(|p| is_pod_scheduled(p)).cloned().collect()
}

pub fn get_unschedulable_pods(pods: &[Pod]) -> Vec<Pod> {
    pods.iter()
        .filter(|p| is_pod_unschedulable(p))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{NodeCondition, NodeSpec, NodeStatus, PodCondition, PodSpec, PodStatus};

    fn node(ready: &str, unschedulable: bool) -> Node {
        Node {
            spec: Some(NodeSpec {
                unschedulable: Some(unschedulable),
                ..Default::default()
            }),
            status: Some(NodeStatus {
                conditions: Some(vec![NodeCondition {
                    type_: "Ready".into(),
                    status: ready.into(),
                    ..unit_condition()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn unit_condition() -> NodeCondition {
        NodeCondition {
            type_: String::new(),
            status: String::new(),
            last_heartbeat_time: None,
            last_transition_time: None,
            message: None,
            reason: None,
        }
    }

    fn pod(node_name: Option<&str>, phase: Option<&str>, scheduled_false: bool) -> Pod {
        Pod {
            spec: Some(PodSpec {
                node_name: node_name.map(str::to_string),
                ..Default::default()
            }),
            status: Some(PodStatus {
                phase: phase.map(str::to_string),
                conditions: if scheduled_false {
                    Some(vec![PodCondition {
                        type_: "PodScheduled".into(),
                        status: "False".into(),
                        reason: Some("Unschedulable".into()),
                        ..pod_unit_condition()
                    }])
                } else {
                    None
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn pod_unit_condition() -> PodCondition {
        PodCondition {
            type_: String::new(),
            status: String::new(),
            last_probe_time: None,
            last_transition_time: None,
            message: None,
            reason: None,
        }
    }

    #[test]
    fn ready_node_with_no_unschedulable_flag_passes() {
        assert!(is_node_ready_and_schedulable(&node("True", false)));
    }

    #[test]
    fn cordoned_node_is_excluded() {
        assert!(!is_node_ready_and_schedulable(&node("True", true)));
    }

    #[test]
    fn not_ready_node_is_excluded() {
        assert!(!is_node_ready_and_schedulable(&node("False", false)));
    }

    #[test]
    fn node_with_no_conditions_is_not_ready() {
        let n = Node {
            status: Some(NodeStatus::default()),
            ..Default::default()
        };
        assert!(!is_node_ready_and_schedulable(&n));
    }

    #[test]
    fn scheduled_pod_has_node_and_is_not_terminal() {
        assert!(is_pod_scheduled(&pod(Some("node-1"), Some("Running"), false)));
        assert!(!is_pod_scheduled(&pod(Some("node-1"), Some("Succeeded"), false)));
        assert!(!is_pod_scheduled(&pod(None, Some("Running"), false)));
    }

    #[test]
    fn unschedulable_pod_has_false_scheduled_condition() {
        assert!(is_pod_unschedulable(&pod(None, Some("Pending"), true)));
        assert!(!is_pod_unschedulable(&pod(None, Some("Pending"), false)));
        assert!(!is_pod_unschedulable(&pod(Some("node-1"), Some("Pending"), true)));
    }
}
