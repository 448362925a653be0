use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::{Api, Client, api::ListParams};
use owo_colors::OwoColorize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use capacity_types::{Config, ConfigPatch, MachineType, Worker, WorkerList};

use crate::config_manager::ConfigManager;
use crate::filters::{get_ready_nodes, get_scheduled_pods, get_unschedulable_pods};
use crate::scaledown::{self, empty_workers};
use crate::scaleup::plan_scale_up;
use crate::util::{Error, colors::FG1};
use crate::worker_manager::WorkerManager;

const DEFAULT_MAX_MACHINE_PROVISION_TIME: ChronoDuration = ChronoDuration::minutes(10);

struct Resources {
    all_nodes: Vec<Node>,
    ready_nodes: Vec<Node>,
    all_pods: Vec<Pod>,
    scheduled_pods: Vec<Pod>,
    unscheduled_pods: Vec<Pod>,
    worker_list: WorkerList,
}

/// The reconciliation engine: on every tick, gathers a resource snapshot, classifies
/// workers, and takes at most one mutating action (cleanup-failed XOR scale-up XOR
/// scale-down, in that precedence order).
pub struct Engine {
    client: Client,
    config_manager: Arc<ConfigManager>,
    worker_manager: RwLock<Option<WorkerManager>>,
    is_ready: RwLock<bool>,
}

impl Engine {
    pub async fn new(client: Client, config_manager: Arc<ConfigManager>) -> Result<Self, Error> {
        let engine = Self {
            client,
            config_manager,
            worker_manager: RwLock::new(None),
            is_ready: RwLock::new(false),
        };
        // Building the worker manager can fail if the config isn't fully set up yet;
        // that's fine at startup, it just means `is_ready()` stays false until a
        // `set_config`/`patch_config` call succeeds.
        if engine.rebuild_worker_manager().await.is_ok() {
            *engine.is_ready.write().await = true;
        }
        Ok(engine)
    }

    /// Rebuilds the provider and worker manager from the current config. Called after
    /// every config mutation, mirroring the original's `buildWorkerManager`.
    async fn rebuild_worker_manager(&self) -> Result<(), Error> {
        let cfg = self.config_manager.get_config().await;
        let provider = capacity_provider::factory::new(&cfg.cluster_name, &cfg.provider_name, &cfg.provider)?;
        let manager = WorkerManager::new(cfg.cluster_name.clone(), self.client.clone(), provider, cfg.userdata.clone()).await?;
        *self.worker_manager.write().await = Some(manager);
        Ok(())
    }

    pub async fn is_ready(&self) -> bool {
        *self.is_ready.read().await
    }

    pub async fn get_config(&self) -> Config {
        self.config_manager.get_config().await
    }

    pub async fn set_config(&self, conf: Config) -> Result<(), Error> {
        conf.validate()?;
        self.config_manager.set_config(conf).await?;
        self.rebuild_worker_manager().await?;
        *self.is_ready.write().await = true;
        Ok(())
    }

    pub async fn patch_config(&self, patch: ConfigPatch) -> Result<Config, Error> {
        let merged = self.config_manager.patch_config(patch).await?;
        self.rebuild_worker_manager().await?;
        *self.is_ready.write().await = true;
        Ok(merged)
    }

    pub async fn machine_types(&self) -> Result<Vec<MachineType>, Error> {
        let guard = self.worker_manager.read().await;
        let wm = guard.as_ref().ok_or(Error::NotReady)?;
        Ok(wm.machine_types().to_vec())
    }

    pub async fn create_worker(&self, machine_type: &str) -> Result<Worker, Error> {
        let guard = self.worker_manager.read().await;
        let wm = guard.as_ref().ok_or(Error::NotReady)?;
        wm.create_worker(machine_type).await
    }

    pub async fn get_worker(&self, id: &str) -> Result<Worker, Error> {
        let guard = self.worker_manager.read().await;
        let wm = guard.as_ref().ok_or(Error::NotReady)?;
        wm.get_worker(id).await
    }

    pub async fn list_workers(&self) -> Result<WorkerList, Error> {
        let guard = self.worker_manager.read().await;
        let wm = guard.as_ref().ok_or(Error::NotReady)?;
        wm.list_workers().await
    }

    pub async fn delete_worker(&self, node_name: &str, id: &str) -> Result<Worker, Error> {
        let guard = self.worker_manager.read().await;
        let wm = guard.as_ref().ok_or(Error::NotReady)?;
        wm.delete_worker(node_name, id).await
    }

    pub async fn reserve_worker(&self, want: &Worker) -> Result<Worker, Error> {
        let guard = self.worker_manager.read().await;
        let wm = guard.as_ref().ok_or(Error::NotReady)?;
        wm.reserve_worker(want).await
    }

    /// Runs a single reconciliation pass. Returns `Ok(())` for both "nothing to do"
    /// and "did something"; only genuine tick failures surface as `Err`.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<(), Error> {
        let cfg = self.config_manager.get_config().await;

        if cfg.is_paused() {
            return Ok(());
        }

        let allowed = self.allowed_machine_types(&cfg).await?;
        if allowed.is_empty() {
            println!(
                "⚠️ {}{}",
                cfg.cluster_name.color(crate::util::colors::FG2),
                " no allowed machine types configured, skipping tick".color(crate::util::colors::FG1),
            );
            return Ok(());
        }

        let rss = self.get_resources().await?;

        let (failed, provisioning) = check_workers(&rss.worker_list.items, now);
        if !failed.is_empty() {
            return self.remove_failed_machines(&failed).await;
        }
        if !provisioning.is_empty() {
            return Ok(());
        }

        if !rss.unscheduled_pods.is_empty() {
            let new_nodes = get_new_nodes(&rss.all_nodes, now, cfg.new_node_time_buffer_seconds);
            if !new_nodes.is_empty() {
                return Ok(());
            }

            let empty_nodes = get_empty_nodes(&rss.ready_nodes, &rss.all_pods);
            if !empty_nodes.is_empty() {
                return Ok(());
            }

            if cfg.workers_count_max > 0 && cfg.workers_count_max > rss.ready_nodes.len() as i64
                && let Some(mtype) = plan_scale_up(&rss.unscheduled_pods, &allowed, now).await?
            {
                self.create_worker(&mtype.name).await?;
                return Ok(());
            }
        }

        if cfg.workers_count_min > 0 && cfg.workers_count_min < rss.ready_nodes.len() as i64 {
            self.scale_down(&rss, &cfg, now).await?;
        }

        Ok(())
    }

    async fn scale_down(&self, rss: &Resources, cfg: &Config, now: DateTime<Utc>) -> Result<(), Error> {
        let candidates = empty_workers(&rss.worker_list.items, &rss.scheduled_pods);
        for worker in candidates {
            if scaledown::ignore_reason(worker, &cfg.ignored_node_labels, now).is_some() {
                continue;
            }
            self.delete_worker(&worker.node_name, &worker.machine_id).await?;
        }
        Ok(())
    }

    async fn remove_failed_machines(&self, ids: &[String]) -> Result<(), Error> {
        for id in ids {
            self.delete_worker("", id).await?;
        }
        Ok(())
    }

    async fn allowed_machine_types(&self, cfg: &Config) -> Result<Vec<MachineType>, Error> {
        let catalogue = self.machine_types().await?;
        if cfg.machine_types.is_empty() {
            return Ok(catalogue);
        }
        Ok(catalogue
            .into_iter()
            .filter(|mt| cfg.machine_types.contains(&mt.name))
            .collect())
    }

    /// Drives the tick loop until `shutdown` is cancelled. Leader election and HTTP
    /// serving are a layer above this — the caller only runs this on the leader
    /// replica.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        println!("{}", "🌱 starting reconciliation loop".color(FG1));
        loop {
            let period = {
                let cfg = self.config_manager.get_config().await;
                if cfg.scan_interval_seconds == 0 {
                    crate::util::DEFAULT_SCAN_INTERVAL
                } else {
                    Duration::from_secs(cfg.scan_interval_seconds)
                }
            };
            tokio::select! {
                _ = shutdown.cancelled() => {
                    println!("{}", "🛑 reconciliation loop stopped".color(FG1));
                    return;
                }
                _ = tokio::time::sleep(period) => {}
            }
            if let Err(e) = self.run_once(Utc::now()).await {
                eprintln!("⚠️ reconciliation tick failed: {e}");
            }
        }
    }

    async fn get_resources(&self) -> Result<Resources, Error> {
        let node_api: Api<Node> = Api::all(self.client.clone());
        let pod_api: Api<Pod> = Api::all(self.client.clone());
        let all_nodes = node_api.list(&ListParams::default()).await?.items;
        let all_pods = pod_api.list(&ListParams::default()).await?.items;
        let worker_list = self.list_workers().await?;

        Ok(Resources {
            ready_nodes: get_ready_nodes(&all_nodes),
            scheduled_pods: get_scheduled_pods(&all_pods),
            unscheduled_pods: get_unschedulable_pods(&all_pods),
            all_nodes,
            all_pods,
            worker_list,
        })
    }
}

/// Splits workers needing attention into `failed` (past the provisioning deadline) and
/// `provisioning` (still within it). Masters and workers that already have a
/// registered node are skipped entirely.
fn check_workers(workers: &[Worker], now: DateTime<Utc>) -> (Vec<String>, Vec<String>) {
    let mut failed = Vec::new();
    let mut provisioning = Vec::new();

    for worker in workers {
        let active_state = worker.machine_state == "pending" || worker.machine_state == "running";
        if !active_state || worker.has_node() || is_master(worker) {
            continue;
        }

        let Some(created) = worker.creation_timestamp else {
            continue;
        };
        if created + DEFAULT_MAX_MACHINE_PROVISION_TIME <= now {
            failed.push(worker.machine_id.clone());
        } else {
            provisioning.push(worker.machine_id.clone());
        }
    }

    (failed, provisioning)
}

/// Heuristic carried over from the original implementation: machine naming
/// conventions don't carry a structured role tag, so masters are recognized by a
/// substring match on the machine name.
fn is_master(worker: &Worker) -> bool {
    worker.machine_name.to_lowercase().contains("master")
}

fn get_new_nodes(nodes: &[Node], now: DateTime<Utc>, new_node_time_buffer_seconds: u64) -> Vec<Node> {
    nodes
        .iter()
        .filter(|n| is_new_node(n, now, new_node_time_buffer_seconds))
        .cloned()
        .collect()
}

fn is_new_node(node: &Node, now: DateTime<Utc>, buffer_seconds: u64) -> bool {
    let Some(created) = node.metadata.creation_timestamp.as_ref() else {
        return false;
    };
    let Ok(created) = DateTime::parse_from_rfc3339(&created.0.to_string()) else {
        return false;
    };
    created.with_timezone(&Utc) + ChronoDuration::seconds(buffer_seconds as i64) > now
}

fn get_empty_nodes(nodes: &[Node], pods: &[Pod]) -> Vec<Node> {
    nodes
        .iter()
        .filter(|n| {
            let name = n.metadata.name.as_deref().unwrap_or("");
            !pods
                .iter()
                .any(|p| p.spec.as_ref().and_then(|s| s.node_name.as_deref()) == Some(name))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker(name: &str, state: &str, node_name: &str, created_mins_ago: i64) -> Worker {
        Worker {
            machine_name: name.to_string(),
            machine_state: state.to_string(),
            node_name: node_name.to_string(),
            creation_timestamp: Some(Utc::now() - ChronoDuration::minutes(created_mins_ago)),
            ..Worker::default()
        }
    }

    #[test]
    fn stale_pending_worker_is_failed() {
        let w = worker("demo-worker-1", "pending", "", 20);
        let (failed, provisioning) = check_workers(&[w], Utc::now());
        assert_eq!(failed.len(), 1);
        assert!(provisioning.is_empty());
    }

    #[test]
    fn recent_pending_worker_is_provisioning() {
        let w = worker("demo-worker-1", "pending", "", 1);
        let (failed, provisioning) = check_workers(&[w], Utc::now());
        assert!(failed.is_empty());
        assert_eq!(provisioning.len(), 1);
    }

    #[test]
    fn worker_with_node_is_skipped() {
        let w = worker("demo-worker-1", "pending", "node-1", 20);
        let (failed, provisioning) = check_workers(&[w], Utc::now());
        assert!(failed.is_empty());
        assert!(provisioning.is_empty());
    }

    #[test]
    fn master_is_skipped_regardless_of_age() {
        let w = worker("demo-master-1", "pending", "", 20);
        let (failed, provisioning) = check_workers(&[w], Utc::now());
        assert!(failed.is_empty());
        assert!(provisioning.is_empty());
    }
}
