//! Flat first-fit broker, no hierarchy. Grounded on
//! `original_source/traditional_broker.py`; placement scan reuses
//! `select_packed_first_fit` from `core::broker`.

use log::debug;
use rand::rngs::StdRng;

use super::{select_packed_first_fit, Broker, ResourceTable, StatsTable};
use crate::core::network::Network;
use crate::core::task::Task;

#[derive(Debug)]
pub struct TraditionalBroker {
    /// Hardware type ids this broker manages, in the order it will try
    /// them against a task's `available_implementations` (spec.md §4.9
    /// step 1).
    pub managed_types: Vec<u32>,
}

impl TraditionalBroker {
    pub fn new(managed_types: Vec<u32>) -> Self {
        TraditionalBroker { managed_types }
    }
}

impl Broker for TraditionalBroker {
    fn deploy(
        &mut self,
        task: &mut Task,
        resources: &mut ResourceTable,
        network: &mut Network,
        stats: &mut StatsTable,
        _rng: &mut StdRng,
    ) -> bool {
        let chosen = task
            .available_implementations()
            .iter()
            .enumerate()
            .find(|(_, ty)| self.managed_types.contains(ty));
        let (impl_idx, &type_id) = match chosen {
            Some(v) => v,
            None => return false,
        };
        task.reduce_impl(impl_idx);

        let bw = task.demand.network_bandwidth;
        if !network.probe(bw) {
            stats.entry(type_id).or_default().record_reject();
            debug!("task {} rejected: network probe failed", task.id);
            return false;
        }

        let pool = resources.entry(type_id).or_default();
        let indices: Vec<u32> = (0..pool.len() as u32).collect();
        let d = task.demand;
        let acc = task.accelerators_per_vm();
        let ids = select_packed_first_fit(
            &indices,
            pool,
            task.num_vms,
            d.processors_per_vm,
            d.memory_per_vm,
            d.storage_per_vm,
            acc,
        );

        let ids = match ids {
            Some(ids) => ids,
            None => {
                stats.entry(type_id).or_default().record_reject();
                debug!("task {} rejected: no server fits on type {}", task.id, type_id);
                return false;
            }
        };

        for &rid in &ids {
            pool[rid as usize].deploy(task.id, d.processors_per_vm, d.memory_per_vm, d.storage_per_vm, acc);
        }
        network.deploy(task.id, bw);
        task.attach_resources(ids.clone());
        stats.entry(type_id).or_default().record_accept();
        debug!("task {} accepted on type {} servers {:?}", task.id, type_id, ids);
        true
    }

    fn update_state_info(&mut self, _t: u64, _resources: &ResourceTable) {}
}
