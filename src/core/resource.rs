//! A single physical server: capacity, running VMs, instantaneous compute
//! capability. Grounded on `dslab-iaas`'s `HostManager` (capacity/available
//! bookkeeping shape) and `original_source/resource.py` (exact probe/deploy/
//! unload semantics and the in-place ρ-averaging quirk).

use crate::error::AllocationVerdict;

/// Immutable capacity plus live allocation counters for one server of a
/// given hardware type.
#[derive(Debug, Clone)]
pub struct Resource {
    pub type_id: u32,
    pub index: u32,

    total_processors: u64,
    total_memory: u64,
    total_storage: u64,
    total_accelerators: u64,

    pub compute_capability_per_processor: f64,
    pub compute_capability_per_accelerator: f64,
    pub overcommitment_processors: f64,

    avail_processors: u64,
    avail_memory: u64,
    avail_storage: u64,
    avail_accelerators: u64,

    running_vms: u64,
    active: bool,
    deployed_tasks: Vec<u64>,

    /// Whether Improved SOSM may migrate this server between vRMs.
    pub movable: bool,

    // per-timestep aggregates, reset by `initialize_running_quantities`
    actual_utilized_processors: f64,
    actual_utilized_memory: f64,
    actual_utilized_storage: f64,
    actual_rho_accelerators: f64,

    current_compute_per_processor: f64,
    current_compute_per_accelerator: f64,
}

impl Resource {
    pub fn new(
        type_id: u32,
        index: u32,
        total_processors: u64,
        total_memory: u64,
        total_storage: u64,
        total_accelerators: u64,
        compute_capability_per_processor: f64,
        compute_capability_per_accelerator: f64,
        overcommitment_processors: f64,
        movable: bool,
    ) -> Self {
        Resource {
            type_id,
            index,
            total_processors,
            total_memory,
            total_storage,
            total_accelerators,
            compute_capability_per_processor,
            compute_capability_per_accelerator,
            overcommitment_processors,
            avail_processors: total_processors,
            avail_memory: total_memory,
            avail_storage: total_storage,
            avail_accelerators: total_accelerators,
            running_vms: 0,
            active: false,
            deployed_tasks: Vec::new(),
            movable,
            actual_utilized_processors: 0.0,
            actual_utilized_memory: 0.0,
            actual_utilized_storage: 0.0,
            actual_rho_accelerators: 0.0,
            current_compute_per_processor: compute_capability_per_processor,
            current_compute_per_accelerator: compute_capability_per_accelerator,
        }
    }

    pub fn total_processors(&self) -> u64 {
        self.total_processors
    }
    pub fn total_memory(&self) -> u64 {
        self.total_memory
    }
    pub fn total_storage(&self) -> u64 {
        self.total_storage
    }
    pub fn total_accelerators(&self) -> u64 {
        self.total_accelerators
    }
    pub fn avail_processors(&self) -> u64 {
        self.avail_processors
    }
    pub fn avail_memory(&self) -> u64 {
        self.avail_memory
    }
    pub fn avail_storage(&self) -> u64 {
        self.avail_storage
    }
    pub fn avail_accelerators(&self) -> u64 {
        self.avail_accelerators
    }
    pub fn running_vms(&self) -> u64 {
        self.running_vms
    }
    pub fn active(&self) -> bool {
        self.active
    }
    pub fn current_compute_per_processor(&self) -> f64 {
        self.current_compute_per_processor
    }
    pub fn current_compute_per_accelerator(&self) -> f64 {
        self.current_compute_per_accelerator
    }

    /// Returns `index` if available counters meet the demand, else `None`.
    pub fn probe(&self, p: u64, m: u64, s: u64, a: u64) -> Option<u32> {
        if self.avail_processors >= p
            && self.avail_memory >= m
            && self.avail_storage >= s
            && self.avail_accelerators >= a
        {
            Some(self.index)
        } else {
            None
        }
    }

    /// Decrements available counters for one VM, marks the task deployed.
    pub fn deploy(&mut self, task_id: u64, p: u64, m: u64, s: u64, a: u64) -> AllocationVerdict {
        if self.probe(p, m, s, a).is_none() {
            return AllocationVerdict::ProbeFail;
        }
        self.avail_processors -= p;
        self.avail_memory -= m;
        self.avail_storage -= s;
        self.avail_accelerators -= a;
        self.running_vms += 1;
        self.active = true;
        self.deployed_tasks.push(task_id);
        AllocationVerdict::Success
    }

    /// Reverses one VM's `deploy`. `task_id` need only appear once per
    /// server even when multiple of a task's VMs share it — callers call
    /// `unload` once per co-located VM.
    pub fn unload(&mut self, task_id: u64, p: u64, m: u64, s: u64, a: u64) -> AllocationVerdict {
        if let Some(pos) = self.deployed_tasks.iter().position(|&t| t == task_id) {
            self.deployed_tasks.remove(pos);
        } else {
            return AllocationVerdict::NotDeployed;
        }
        self.avail_processors += p;
        self.avail_memory += m;
        self.avail_storage += s;
        self.avail_accelerators += a;
        self.running_vms -= 1;
        self.active = self.running_vms > 0;
        AllocationVerdict::Success
    }

    pub fn initialize_running_quantities(&mut self) {
        self.actual_utilized_processors = 0.0;
        self.actual_utilized_memory = 0.0;
        self.actual_utilized_storage = 0.0;
        self.actual_rho_accelerators = 0.0;
    }

    pub fn increment_running_quantities(&mut self, dp: f64, dm: f64, ds: f64) {
        self.actual_utilized_processors += dp;
        self.actual_utilized_memory += dm;
        self.actual_utilized_storage += ds;
    }

    pub fn increment_rho_accelerators(&mut self, drho: f64) {
        self.actual_rho_accelerators += drho;
    }

    /// Recomputes `current_compute_per_{processor,accelerator}` for this
    /// timestep. Must be called exactly once per active resource per step,
    /// after all in-flight tasks on it have contributed their utilization —
    /// `actual_rho_accelerators` is divided in place by the used-accelerator
    /// count to turn an accumulated sum into an average, so calling this
    /// twice in the same step would double-divide it.
    pub fn recompute_current_compute_capability(&mut self, used_accelerators: u64) {
        if self.running_vms > 0 && self.actual_utilized_processors > 0.0 {
            let ratio = self.actual_utilized_processors
                / (self.total_processors as f64 * self.overcommitment_processors);
            self.current_compute_per_processor =
                self.compute_capability_per_processor * (1.0 / ratio.max(1.0));
        } else {
            self.current_compute_per_processor = self.compute_capability_per_processor;
        }

        if self.total_accelerators > 0 && self.running_vms > 0 && used_accelerators > 0 {
            self.actual_rho_accelerators /= used_accelerators as f64;
            self.current_compute_per_accelerator =
                self.compute_capability_per_accelerator * (1.0 / self.actual_rho_accelerators.max(1.0));
        } else {
            self.current_compute_per_accelerator = self.compute_capability_per_accelerator;
        }
    }

    pub fn actual_utilized_processors(&self) -> f64 {
        self.actual_utilized_processors
    }
    pub fn actual_utilized_memory(&self) -> f64 {
        self.actual_utilized_memory
    }
    pub fn actual_utilized_storage(&self) -> f64 {
        self.actual_utilized_storage
    }
    pub fn actual_rho_accelerators(&self) -> f64 {
        self.actual_rho_accelerators
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> Resource {
        Resource::new(1, 0, 4, 16, 1024, 0, 1.0, 1.0, 1.0, true)
    }

    #[test]
    fn deploy_decrements_and_unload_restores() {
        let mut r = server();
        assert_eq!(r.probe(2, 8, 10, 0), Some(0));
        assert_eq!(r.deploy(42, 2, 8, 10, 0), AllocationVerdict::Success);
        assert_eq!(r.avail_processors(), 2);
        assert!(r.active());
        assert_eq!(r.unload(42, 2, 8, 10, 0), AllocationVerdict::Success);
        assert_eq!(r.avail_processors(), 4);
        assert!(!r.active());
    }

    #[test]
    fn deploy_fails_when_undersized() {
        let mut r = server();
        assert_eq!(r.deploy(1, 8, 1, 1, 0), AllocationVerdict::ProbeFail);
        assert_eq!(r.avail_processors(), 4);
    }

    #[test]
    fn unload_unknown_task_fails() {
        let mut r = server();
        assert_eq!(r.unload(99, 1, 1, 1, 0), AllocationVerdict::NotDeployed);
    }

    #[test]
    fn overcommit_scales_degradation_not_admission() {
        let mut r = Resource::new(1, 0, 4, 16, 1024, 0, 10.0, 1.0, 2.0, true);
        r.deploy(1, 4, 16, 1024, 0);
        r.initialize_running_quantities();
        r.increment_running_quantities(4.0, 16.0, 1024.0);
        r.recompute_current_compute_capability(0);
        // ratio = 4 / (4*2) = 0.5 < 1 -> no degradation
        assert_eq!(r.current_compute_per_processor(), 10.0);
    }
}
