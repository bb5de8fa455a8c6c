//! Admission broker hierarchy. Three interchangeable implementations share
//! one contract (`deploy`, `update_state_info`) per spec.md §9's "Broker
//! polymorphism" design note — modeled as a trait with concrete
//! implementations, mirroring `Box<dyn VMPlacementAlgorithm>` in
//! `dslab-iaas/src/core/vm_placement_algorithm.rs`.
//!
//! Per-timestep physics (spec.md §4.10) is broker-agnostic — it only reads
//! `Task::resource_ids`/`selected_type` and mutates `Resource`/`Network`/
//! `PowerModel`, none of which differ by broker — so it lives on `Cell`
//! rather than being duplicated across broker implementations; see
//! `core::cell::Cell::timestep`.

pub mod improved_sosm;
pub mod sosm;
pub mod traditional;

use indexmap::IndexMap;
use rand::rngs::StdRng;

use crate::core::network::Network;
use crate::core::resource::Resource;
use crate::core::stats::Statistics;
use crate::core::task::Task;

pub type ResourceTable = IndexMap<u32, Vec<Resource>>;
pub type StatsTable = IndexMap<u32, Statistics>;

/// Shared contract for Traditional / SOSM / Improved SOSM.
pub trait Broker: std::fmt::Debug {
    /// Attempts to admit `task`. On success, sets `task.selected_type` and
    /// `task.resource_ids` and returns `true`; the caller is responsible for
    /// `task.mark_admitted()`. On failure returns `false` and has already
    /// incremented the matching `stats.rejected_tasks` counter.
    fn deploy(
        &mut self,
        task: &mut Task,
        resources: &mut ResourceTable,
        network: &mut Network,
        stats: &mut StatsTable,
        rng: &mut StdRng,
    ) -> bool;

    /// Re-polls assessment state at every hierarchy level gated by its own
    /// `t mod poll_interval == 0` (spec.md §5). No-op for Traditional.
    fn update_state_info(&mut self, t: u64, resources: &ResourceTable);
}

/// `dep_strategy` type 1 (spec.md §4.5): the first resource able to hold
/// every VM of the task at once; all VMs land on that single server.
pub fn select_all_same(
    indices: &[u32],
    resources: &[Resource],
    num_vms: u32,
    p: u64,
    m: u64,
    s: u64,
    a: u64,
) -> Option<Vec<u32>> {
    let n = num_vms as u64;
    for &idx in indices {
        let r = &resources[idx as usize];
        if r.avail_processors() >= p * n
            && r.avail_memory() >= m * n
            && r.avail_storage() >= s * n
            && r.avail_accelerators() >= a * n
        {
            return Some(vec![idx; num_vms as usize]);
        }
    }
    None
}

/// `dep_strategy` type 2 (spec.md §4.5): scan servers in index order,
/// packing as many VMs onto the current server as fit before moving to the
/// next; atomic (returns `None`, reserving nothing) if not all VMs fit
/// anywhere. Also the strategy used by the Traditional broker (spec.md
/// §4.9), scanning the flat per-type server list.
pub fn select_packed_first_fit(
    indices: &[u32],
    resources: &[Resource],
    num_vms: u32,
    p: u64,
    m: u64,
    s: u64,
    a: u64,
) -> Option<Vec<u32>> {
    let mut avail: Vec<(u64, u64, u64, u64)> = indices
        .iter()
        .map(|&idx| {
            let r = &resources[idx as usize];
            (r.avail_processors(), r.avail_memory(), r.avail_storage(), r.avail_accelerators())
        })
        .collect();

    let mut placements = Vec::with_capacity(num_vms as usize);
    for _ in 0..num_vms {
        let mut placed_at = None;
        for (pos, (ap, am, as_, aa)) in avail.iter_mut().enumerate() {
            if *ap >= p && *am >= m && *as_ >= s && *aa >= a {
                *ap -= p;
                *am -= m;
                *as_ -= s;
                *aa -= a;
                placed_at = Some(pos);
                break;
            }
        }
        match placed_at {
            Some(pos) => placements.push(indices[pos]),
            None => return None,
        }
    }
    Some(placements)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn res(idx: u32, p: u64) -> Resource {
        Resource::new(1, idx, p, 16, 1024, 0, 1.0, 1.0, 1.0, true)
    }

    #[test]
    fn packed_first_fit_fills_first_server_before_second() {
        let resources = vec![res(0, 4), res(1, 4)];
        let indices = [0, 1];
        let ids = select_packed_first_fit(&indices, &resources, 3, 2, 1, 1, 0).unwrap();
        assert_eq!(ids, vec![0, 0, 1]);
    }

    #[test]
    fn packed_first_fit_fails_atomically_when_undersized() {
        let resources = vec![res(0, 4), res(1, 4)];
        let indices = [0, 1];
        assert!(select_packed_first_fit(&indices, &resources, 3, 4, 1, 1, 0).is_none());
    }

    #[test]
    fn all_same_requires_one_server_to_hold_every_vm() {
        let resources = vec![res(0, 4), res(1, 16)];
        let indices = [0, 1];
        let ids = select_all_same(&indices, &resources, 3, 4, 1, 1, 0).unwrap();
        assert_eq!(ids, vec![1, 1, 1]);
    }
}
