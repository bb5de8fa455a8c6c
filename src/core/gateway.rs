//! Cross-cell routing. Grounded on
//! `original_source/gateway_service.py::find_cell` — a weighted first-fit
//! over a *cached* per-cell, per-hardware-type availability table that the
//! gateway itself mutates on successful placement, rather than re-probing
//! every cell's live resource pools on each call.

use indexmap::IndexMap;

use super::cell::Cell;
use super::task::Task;

/// Cached availability for one (cell, hardware type) pair. `avail_network`
/// is cell-wide, not per type, and duplicated across every type row —
/// matching the Results JSON shape (spec.md §6) and `gateway_service.py`'s
/// per-type `Statistics` rows, which likewise carry the whole cell's
/// network counter in every row.
#[derive(Debug, Clone, Copy, Default)]
struct Availability {
    avail_processors: f64,
    avail_memory: f64,
    avail_storage: f64,
    avail_accelerators: f64,
    avail_network: f64,
}

#[derive(Debug, Default)]
pub struct Gateway {
    cache: IndexMap<(usize, u32), Availability>,
}

impl Gateway {
    pub fn new() -> Self {
        Gateway { cache: IndexMap::new() }
    }

    /// Rebuilds the cache from the cells' live resource/network state.
    /// Call once before routing any arrivals for a given timestep — the
    /// cache only tracks gateway-side reservations between syncs, it does
    /// not observe completions on its own.
    pub fn sync(&mut self, cells: &[Cell]) {
        self.cache.clear();
        for (cell_idx, cell) in cells.iter().enumerate() {
            let avail_network = cell.network.available_bandwidth();
            for (&ty, pool) in cell.resources.iter() {
                let a = Availability {
                    avail_processors: pool.iter().map(|r| r.avail_processors()).sum(),
                    avail_memory: pool.iter().map(|r| r.avail_memory()).sum(),
                    avail_storage: pool.iter().map(|r| r.avail_storage()).sum(),
                    avail_accelerators: pool.iter().map(|r| r.avail_accelerators()).sum(),
                    avail_network,
                };
                self.cache.insert((cell_idx, ty), a);
            }
        }
    }

    /// Picks a (cell, hardware type, implementation index) triple for
    /// `task`, weighted by normalized post-placement headroom across all
    /// five dimensions (`find_cell`'s `lweight` sum). Network demand is the
    /// whole-task value, never multiplied by `num_vms` (spec.md Open
    /// Question 2). Returns `None` if no candidate has positive weight —
    /// a direct translation of `find_cell`'s `weight` accumulator starting
    /// at `0.0` and only being replaced by a strictly greater candidate.
    pub fn select_cell(&self, cells: &[Cell], task: &Task) -> Option<(usize, u32, usize)> {
        let r_vm = task.num_vms as f64;
        let rv_proc = task.demand.processors_per_vm as f64;
        let r_mem = task.demand.memory_per_vm as f64;
        let r_net = task.demand.network_bandwidth as f64;
        let r_sto = task.demand.storage_per_vm as f64;

        let mut weight = 0.0_f64;
        let mut best: Option<(usize, u32, usize)> = None;

        for cell_idx in 0..cells.len() {
            for (k, &impl_ty) in task.available_implementations().iter().enumerate() {
                let a = match self.cache.get(&(cell_idx, impl_ty)) {
                    Some(a) => a,
                    None => continue,
                };
                let r_acc = task.accelerators_per_vm_at(k) as f64;

                let fits = a.avail_processors >= r_vm * rv_proc
                    && a.avail_memory >= r_vm * r_mem
                    && a.avail_network >= r_net
                    && a.avail_storage >= r_vm * r_sto
                    && a.avail_accelerators >= r_vm * r_acc;
                if !fits {
                    continue;
                }

                let lweight = (a.avail_processors - r_vm * rv_proc) / (a.avail_processors + 1.0)
                    + (a.avail_memory - r_vm * r_mem) / (a.avail_memory + 1.0)
                    + (a.avail_network - r_net) / (a.avail_network + 1.0)
                    + (a.avail_storage - r_vm * r_sto) / (a.avail_storage + 1.0)
                    + (a.avail_accelerators - r_vm * r_acc) / (a.avail_accelerators + 1.0);

                if lweight > weight {
                    weight = lweight;
                    best = Some((cell_idx, impl_ty, k));
                }
            }
        }
        best
    }

    /// Mutates the cache to reflect a successful placement, without
    /// touching the cells themselves (`find_cell`'s post-choice decrement).
    /// Takes plain scalars rather than `&Task` so callers can record after
    /// the task itself has been moved into `Cell::admit`.
    pub fn record_admit(&mut self, cell_idx: usize, type_id: u32, num_vms: u32, demand: super::task::TaskDemand, accelerators_per_vm: u64) {
        if let Some(a) = self.cache.get_mut(&(cell_idx, type_id)) {
            let r_vm = num_vms as f64;
            a.avail_processors -= r_vm * demand.processors_per_vm as f64;
            a.avail_memory -= r_vm * demand.memory_per_vm as f64;
            a.avail_network -= demand.network_bandwidth as f64;
            a.avail_storage -= r_vm * demand.storage_per_vm as f64;
            a.avail_accelerators -= r_vm * accelerators_per_vm as f64;
        }
    }

    /// Cost estimate for the REST dry-run endpoint (spec.md §6, `estimated_energy_cost_kWh`):
    /// runs `select_cell` against the live cache to pick a candidate
    /// placement, then evaluates that hardware type's own `PowerModel` for
    /// one second at the task's requested utilization — the "single-task
    /// simulation dry-run" the spec calls for, without mutating the cache
    /// or any cell. Returns `None` if `select_cell` finds no placement.
    pub fn estimate_energy_cost_kwh(&self, cells: &[Cell], task: &Task) -> Option<f64> {
        const KWH_PER_WATT_SECOND: f64 = 1e-3 / 3600.0;

        let (cell_idx, type_id, k) = self.select_cell(cells, task)?;
        let model = cells[cell_idx].power_models.get(&type_id)?;
        let num_accelerators = task.accelerators_per_vm_at(k);

        let p_cpu = model.cpu.power(task.utilization.processor_utilization);
        let p_acc = model
            .accelerator
            .map(|acc| acc.power(task.utilization.accelerator_utilization, num_accelerators))
            .unwrap_or(0.0);
        let one_vm_one_second_kwh = (p_cpu + p_acc) * KWH_PER_WATT_SECOND;
        Some(one_vm_one_second_kwh * task.num_vms as f64)
    }
}
