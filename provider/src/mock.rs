use std::collections::BTreeMap;

use async_trait::async_trait;
use capacity_types::{Machine, MachineType};
use tokio::sync::Mutex;

use crate::{Error, Provider, parse_provider_id};

pub const NAME: &str = "mock";

/// In-memory provider used by tests and by the HTTP surface in development mode.
/// Grounded on the original fake worker manager: two canned machine types, and
/// `create_machine`/`delete_machine` that actually mutate an in-process list so
/// round-tripping through `machines()` behaves like a real provider would.
pub struct MockProvider {
    cluster_name: String,
    machines: Mutex<Vec<Machine>>,
}

impl MockProvider {
    pub fn new(cluster_name: &str) -> Self {
        Self {
            cluster_name: cluster_name.to_string(),
            machines: Mutex::new(Vec::new()),
        }
    }

    pub fn seeded(cluster_name: &str) -> Self {
        let now = chrono::Utc::now();
        let machines = vec![
            Machine {
                id: "i-01e9c47fededccb9a".to_string(),
                name: format!("{cluster_name}-worker-e289335e-9579-11e8-b97f-9cb6d0dededd"),
                machine_type: "m4.large".to_string(),
                state: "pending".to_string(),
                created_at: now,
            },
            Machine {
                id: "i-01e9c47fede75cb9a".to_string(),
                name: format!("{cluster_name}-worker-e289335e-9579-11e8-b97f-9cb6d0f71293"),
                machine_type: "m4.large".to_string(),
                state: "running".to_string(),
                created_at: now,
            },
        ];
        Self {
            cluster_name: cluster_name.to_string(),
            machines: Mutex::new(machines),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn machine_types(&self) -> Result<Vec<MachineType>, Error> {
        Ok(vec![
            MachineType {
                name: "m4.large".to_string(),
                cpu_human: "2".to_string(),
                memory_human: "8Gi".to_string(),
                cpu_millis: 2000,
                memory_bytes: 8 * 1024 * 1024 * 1024,
                price_hour: 0.10,
            },
            MachineType {
                name: "m4.xlarge".to_string(),
                cpu_human: "4".to_string(),
                memory_human: "16Gi".to_string(),
                cpu_millis: 4000,
                memory_bytes: 16 * 1024 * 1024 * 1024,
                price_hour: 0.20,
            },
        ])
    }

    async fn machines(&self) -> Result<Vec<Machine>, Error> {
        Ok(self.machines.lock().await.clone())
    }

    async fn get_machine(&self, id: &str) -> Result<Machine, Error> {
        self.machines
            .lock()
            .await
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn create_machine(
        &self,
        name: &str,
        machine_type: &str,
        _role: &str,
        _userdata: &str,
        _extra_tags: &BTreeMap<String, String>,
    ) -> Result<Machine, Error> {
        let machine = Machine {
            id: format!("i-{}", uuid::Uuid::new_v4().simple()),
            name: name.to_string(),
            machine_type: machine_type.to_string(),
            state: "pending".to_string(),
            created_at: chrono::Utc::now(),
        };
        self.machines.lock().await.push(machine.clone());
        Ok(machine)
    }

    async fn delete_machine(&self, id: &str) -> Result<(), Error> {
        let mut machines = self.machines.lock().await;
        machines.retain(|m| m.id != id);
        Ok(())
    }

    fn parse_machine_id(&self, provider_id: &str) -> Result<String, Error> {
        parse_provider_id(NAME, provider_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_list_then_delete_round_trips() {
        let provider = MockProvider::new("demo");
        let created = provider
            .create_machine("demo-worker-1", "m4.large", "worker", "", &BTreeMap::new())
            .await
            .unwrap();
        let machines = provider.machines().await.unwrap();
        assert_eq!(machines.len(), 1);
        assert_eq!(machines[0].id, created.id);

        provider.delete_machine(&created.id).await.unwrap();
        assert!(provider.machines().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_machine_not_found() {
        let provider = MockProvider::new("demo");
        assert!(matches!(
            provider.get_machine("nope").await,
            Err(Error::NotFound(_))
        ));
    }
}
