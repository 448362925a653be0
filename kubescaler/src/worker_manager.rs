use std::collections::HashMap;
use std::sync::Arc;

use capacity_provider::Provider;
use capacity_types::{LABEL_RESERVED, Machine, MachineType, Worker, WorkerList};
use k8s_openapi::api::core::v1::Node;
use kube::{Api, Client, api::ListParams};

use crate::util::{Error, patch::patch_node_label};

const CLUSTER_ROLE: &str = "worker";

pub fn is_reserved(node: &Node) -> bool {
    node.metadata
        .labels
        .as_ref()
        .and_then(|l| l.get(LABEL_RESERVED))
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Maintains the Worker view: joins the provider's machine list with the cluster's
/// node list. Holds no Worker state of its own — every call recomputes the join.
pub struct WorkerManager {
    cluster_name: String,
    userdata: String,
    client: Client,
    provider: Arc<dyn Provider>,
    machine_types: Vec<MachineType>,
}

impl WorkerManager {
    pub async fn new(
        cluster_name: impl Into<String>,
        client: Client,
        provider: Arc<dyn Provider>,
        userdata: impl Into<String>,
    ) -> Result<Self, Error> {
        let machine_types = provider.machine_types().await?;
        Ok(Self {
            cluster_name: cluster_name.into(),
            userdata: userdata.into(),
            client,
            provider,
            machine_types,
        })
    }

    pub fn machine_types(&self) -> &[MachineType] {
        &self.machine_types
    }

    fn worker_name(&self) -> String {
        format!("{}-worker-{}", self.cluster_name, uuid::Uuid::new_v4())
    }

    pub async fn create_worker(&self, machine_type: &str) -> Result<Worker, Error> {
        let machine = self
            .provider
            .create_machine(
                &self.worker_name(),
                machine_type,
                CLUSTER_ROLE,
                &self.userdata,
                &Default::default(),
            )
            .await?;
        Ok(self.worker_from(&machine, None))
    }

    pub async fn get_worker(&self, id: &str) -> Result<Worker, Error> {
        let machine = self.provider.get_machine(id).await?;
        let node = self.node_for_machine(id).await?;
        Ok(self.worker_from(&machine, node.as_ref()))
    }

    pub async fn list_workers(&self) -> Result<WorkerList, Error> {
        let machines = self.provider.machines().await?;
        let nodes = self.nodes_by_machine_id().await?;
        let items = machines
            .iter()
            .map(|m| self.worker_from(m, nodes.get(&m.id)))
            .collect();
        Ok(WorkerList { items })
    }

    pub async fn delete_worker(&self, node_name: &str, id: &str) -> Result<Worker, Error> {
        if !node_name.is_empty() {
            crate::util::patch::delete_node(self.client.clone(), node_name).await?;
        }
        self.provider.delete_machine(id).await?;
        let machine = Machine {
            id: id.to_string(),
            name: String::new(),
            machine_type: String::new(),
            state: "terminating".to_string(),
            created_at: chrono::Utc::now(),
        };
        Ok(self.worker_from(&machine, None))
    }

    /// No-op if the worker's reserved flag already matches `want.reserved`.
    pub async fn reserve_worker(&self, want: &Worker) -> Result<Worker, Error> {
        let current = self.get_worker(&want.machine_id).await?;
        if current.reserved == want.reserved {
            return Ok(current);
        }
        self.set_reserved(current, want.reserved).await
    }

    async fn set_reserved(&self, mut worker: Worker, reserved: bool) -> Result<Worker, Error> {
        if worker.node_name.is_empty() {
            return Err(Error::NodeNotFound(worker.machine_id));
        }
        let node = patch_node_label(
            self.client.clone(),
            &worker.node_name,
            LABEL_RESERVED,
            &reserved.to_string(),
        )
        .await?;
        worker.node_labels = node
            .metadata
            .labels
            .unwrap_or_default()
            .into_iter()
            .collect();
        worker.reserved = reserved;
        Ok(worker)
    }

    async fn node_for_machine(&self, machine_id: &str) -> Result<Option<Node>, Error> {
        Ok(self.nodes_by_machine_id().await?.remove(machine_id))
    }

    async fn nodes_by_machine_id(&self) -> Result<HashMap<String, Node>, Error> {
        let api: Api<Node> = Api::all(self.client.clone());
        let nodes = api.list(&ListParams::default()).await?;
        let mut map = HashMap::new();
        for node in nodes.items {
            let Some(provider_id) = node.spec.as_ref().and_then(|s| s.provider_id.clone()) else {
                continue;
            };
            let machine_id = self.provider.parse_machine_id(&provider_id)?;
            map.insert(machine_id, node);
        }
        Ok(map)
    }

    fn worker_from(&self, machine: &Machine, node: Option<&Node>) -> Worker {
        let node_name = node.and_then(|n| n.metadata.name.clone()).unwrap_or_default();
        let reserved = node.map(is_reserved).unwrap_or(false);
        let node_labels = node
            .and_then(|n| n.metadata.labels.clone())
            .unwrap_or_default()
            .into_iter()
            .collect();
        Worker {
            cluster_name: self.cluster_name.clone(),
            machine_id: machine.id.clone(),
            machine_name: machine.name.clone(),
            machine_type: machine.machine_type.clone(),
            machine_state: machine.state.clone(),
            creation_timestamp: Some(machine.created_at),
            reserved,
            node_name,
            node_state: String::new(),
            node_labels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn reserved_label_is_case_insensitive() {
        let mut labels = BTreeMap::new();
        labels.insert(LABEL_RESERVED.to_string(), "TRUE".to_string());
        let node = Node {
            metadata: kube::api::ObjectMeta {
                labels: Some(labels),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(is_reserved(&node));
    }

    #[test]
    fn missing_label_is_not_reserved() {
        assert!(!is_reserved(&Node::default()));
    }
}
