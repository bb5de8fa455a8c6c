//! Container for one datacenter cell and its broker-agnostic per-timestep
//! physics. Grounded on `original_source/cell.py` for ownership shape and
//! `sosm_broker.py::timestep` / `traditional_broker.py::timestep` (which
//! are near-identical) for the exact physics order — narrowed from
//! `dslab-iaas/src/simulation.rs`'s `CloudSimulation` (hosts + schedulers +
//! monitoring owned by one container) to a single cell.
//!
//! Physics lives here rather than on each `Broker` impl because it only
//! touches `Resource`/`Network`/`Task`/`PowerModel` state, none of which
//! differs between Traditional, SOSM and Improved SOSM (see
//! `core::broker` module doc).

use std::collections::HashMap;

use indexmap::IndexMap;
use rand::rngs::StdRng;

use super::broker::{Broker, ResourceTable, StatsTable};
use super::network::Network;
use super::power::PowerModel;
use super::task::Task;

pub struct Cell {
    pub id: u32,
    pub resources: ResourceTable,
    pub network: Network,
    pub stats: StatsTable,
    pub power_models: IndexMap<u32, PowerModel>,
    pub broker: Box<dyn Broker>,
    /// Admitted, not-yet-completed tasks (spec.md §3 ADMITTED/RUNNING).
    pub tasks: Vec<Task>,
    rng: StdRng,
}

impl Cell {
    pub fn new(
        id: u32,
        resources: ResourceTable,
        network: Network,
        power_models: IndexMap<u32, PowerModel>,
        broker: Box<dyn Broker>,
        rng: StdRng,
    ) -> Self {
        let mut stats = StatsTable::new();
        for ty in resources.keys() {
            stats.entry(*ty).or_default();
        }
        Cell { id, resources, network, stats, power_models, broker, tasks: Vec::new(), rng }
    }

    /// Attempts to admit `task` (spec.md §2 data flow step 1). On success
    /// the task is marked `Admitted` and tracked in `self.tasks`; on
    /// failure it is marked `Rejected` and dropped.
    pub fn admit(&mut self, mut task: Task) -> bool {
        let ok = self.broker.deploy(&mut task, &mut self.resources, &mut self.network, &mut self.stats, &mut self.rng);
        if ok {
            task.mark_admitted();
            task.mark_running();
            self.tasks.push(task);
        } else {
            task.mark_rejected();
        }
        ok
    }

    /// Per-timestep physics (spec.md §4.10), run once per simulation second
    /// after admission and before polling broker assessment state.
    pub fn timestep(&mut self, t: u64) {
        for pool in self.resources.values_mut() {
            for r in pool.iter_mut() {
                if r.running_vms() > 0 {
                    r.initialize_running_quantities();
                }
            }
        }
        self.network.initialize_running_quantities();

        let mut used_accelerators: HashMap<(u32, u32), u64> = HashMap::new();
        let mut net_total = 0.0;
        for task in &self.tasks {
            let ty = task.selected_type.expect("in-flight task always has a selected_type");
            let (dp, dm, dn, ds, drho) = task.compute_current_utilization();
            net_total += dn;
            let has_acc = task.accelerators_per_vm() > 0;
            if let Some(pool) = self.resources.get_mut(&ty) {
                for &rid in &task.resource_ids {
                    pool[rid as usize].increment_running_quantities(dp, dm, ds);
                    if has_acc {
                        pool[rid as usize].increment_rho_accelerators(drho);
                        *used_accelerators.entry((ty, rid)).or_insert(0) += 1;
                    }
                }
            }
        }
        self.network.increment_running_quantities(net_total);

        for (ty, pool) in self.resources.iter_mut() {
            for (idx, r) in pool.iter_mut().enumerate() {
                if r.running_vms() > 0 {
                    let used = used_accelerators.get(&(*ty, idx as u32)).copied().unwrap_or(0);
                    r.recompute_current_compute_capability(used);
                }
            }
        }

        for (ty, pool) in self.resources.iter() {
            let model = match self.power_models.get(ty) {
                Some(m) => m,
                None => continue,
            };
            let mut total = 0.0;
            for r in pool {
                let proc_util = if r.total_processors() > 0 {
                    r.actual_utilized_processors() / r.total_processors() as f64
                } else {
                    0.0
                };
                total += model.consumption(proc_util, r.actual_rho_accelerators(), r.active(), r.total_accelerators());
            }
            self.stats.entry(*ty).or_default().add_energy(total);
        }

        for task in self.tasks.iter_mut() {
            let ty = task.selected_type.expect("in-flight task always has a selected_type");
            let pool = match self.resources.get(&ty) {
                Some(p) => p,
                None => continue,
            };
            let first = task.resource_ids[0] as usize;
            let mut ip = pool[first].current_compute_per_processor();
            let mut ia = pool[first].current_compute_per_accelerator();
            let overcommit = pool[first].overcommitment_processors;
            for &rid in &task.resource_ids[1..] {
                ip = ip.min(pool[rid as usize].current_compute_per_processor());
                ia = ia.min(pool[rid as usize].current_compute_per_accelerator());
            }
            let n = task.num_vms as f64;
            let p = task.demand.processors_per_vm as f64;
            let u_p = task.utilization.processor_utilization;
            let rho_acc = task.utilization.accelerator_utilization;
            let completed = n * ip * (u_p * overcommit).min(1.0) * p + n * ia * rho_acc;
            task.reduce_instructions(completed);
        }

        for task in self.tasks.iter_mut() {
            if task.is_completed() && task.completion_time.is_none() {
                let ty = task.selected_type.expect("in-flight task always has a selected_type");
                let d = task.demand;
                let acc = task.accelerators_per_vm();
                if let Some(pool) = self.resources.get_mut(&ty) {
                    for &rid in &task.resource_ids {
                        pool[rid as usize].unload(task.id, d.processors_per_vm, d.memory_per_vm, d.storage_per_vm, acc);
                    }
                }
                self.network.unload(task.id, d.network_bandwidth);
                task.mark_completed(t);
            }
        }
        self.tasks.retain(|task| task.completion_time.is_none());
    }

    /// Polls broker assessment state at every hierarchy level whose own
    /// poll interval fires this step (spec.md §5).
    pub fn update_state_info(&mut self, t: u64) {
        self.broker.update_state_info(t, &self.resources);
    }

    /// Appends one snapshot row per hardware type (spec.md §3 Statistics,
    /// §6 Results JSON). Network fields are cell-wide and duplicated into
    /// every type's row, matching the Results JSON shape.
    pub fn update_stats(&mut self, t: u64) {
        let available_network = self.network.available_bandwidth();
        let total_network = self.network.total_bandwidth();
        let running_network_util = self.network.running_network_util();

        let types: Vec<u32> = self.resources.keys().copied().collect();
        for ty in types {
            let pool = &self.resources[&ty];
            let active_servers = pool.iter().filter(|r| r.active()).count() as u64;
            let running_vms = pool.iter().map(|r| r.running_vms()).sum();
            let available_processors = pool.iter().map(|r| r.avail_processors()).sum();
            let total_processors = pool.iter().map(|r| r.total_processors()).sum();
            let actual_utilized_processors = pool.iter().map(|r| r.actual_utilized_processors()).sum();
            let available_memory = pool.iter().map(|r| r.avail_memory()).sum();
            let total_memory = pool.iter().map(|r| r.total_memory()).sum();
            let actual_utilized_memory = pool.iter().map(|r| r.actual_utilized_memory()).sum();
            let available_storage = pool.iter().map(|r| r.avail_storage()).sum();
            let total_storage = pool.iter().map(|r| r.total_storage()).sum();
            let actual_utilized_storage = pool.iter().map(|r| r.actual_utilized_storage()).sum();
            let available_accelerators = pool.iter().map(|r| r.avail_accelerators()).sum();
            let total_accelerators = pool.iter().map(|r| r.total_accelerators()).sum();
            let actual_rho_accelerators = pool.iter().map(|r| r.actual_rho_accelerators()).sum();

            self.stats.entry(ty).or_default().append_snapshot(
                t,
                active_servers,
                running_vms,
                available_processors,
                total_processors,
                actual_utilized_processors,
                available_memory,
                total_memory,
                actual_utilized_memory,
                available_storage,
                total_storage,
                actual_utilized_storage,
                available_accelerators,
                total_accelerators,
                actual_rho_accelerators,
                available_network,
                total_network,
                running_network_util,
            );
        }
    }
}
