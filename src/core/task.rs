//! Workload descriptor. Grounded on `original_source/task.py` for the field
//! set and utilization formulas; state-machine naming follows the
//! `VmStatus` pattern in `dslab-iaas/src/core/vm.rs`.

use std::fmt;

/// Per-VM demand plus whole-task network bandwidth. `network_bandwidth` is
/// a single whole-task value, never multiplied by `num_vms` (spec.md §3,
/// Open Question 2).
#[derive(Debug, Clone, Copy)]
pub struct TaskDemand {
    pub processors_per_vm: u64,
    pub memory_per_vm: u64,
    pub network_bandwidth: u64,
    pub storage_per_vm: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct UtilizationProfile {
    pub processor_utilization: f64,
    pub memory_utilization: f64,
    pub storage_utilization: f64,
    pub accelerator_utilization: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Admitted,
    Running,
    Completed,
    Rejected,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            TaskState::Pending => "PENDING",
            TaskState::Admitted => "ADMITTED",
            TaskState::Running => "RUNNING",
            TaskState::Completed => "COMPLETED",
            TaskState::Rejected => "REJECTED",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: u64,
    pub arrival_time: u64,
    pub demand: TaskDemand,
    pub num_vms: u32,
    total_instructions: f64,
    remaining_instructions: f64,
    pub utilization: UtilizationProfile,
    /// Per-VM accelerator count, one entry per candidate implementation,
    /// collapsed to a single entry by `reduce_impl`.
    accelerators_per_vm: Vec<u64>,
    /// Candidate hardware type ids, collapsed to a single entry by
    /// `reduce_impl`.
    available_implementations: Vec<u32>,

    state: TaskState,
    pub selected_type: Option<u32>,
    pub resource_ids: Vec<u32>,

    pub completion_time: Option<u64>,
    pub response_time: Option<u64>,
}

impl Task {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        arrival_time: u64,
        demand: TaskDemand,
        num_vms: u32,
        total_instructions: f64,
        utilization: UtilizationProfile,
        accelerators_per_vm: Vec<u64>,
        available_implementations: Vec<u32>,
    ) -> Self {
        Task {
            id,
            arrival_time,
            demand,
            num_vms,
            total_instructions,
            remaining_instructions: total_instructions,
            utilization,
            accelerators_per_vm,
            available_implementations,
            state: TaskState::Pending,
            selected_type: None,
            resource_ids: Vec::new(),
            completion_time: None,
            response_time: None,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn available_implementations(&self) -> &[u32] {
        &self.available_implementations
    }

    pub fn accelerators_per_vm(&self) -> u64 {
        self.accelerators_per_vm[0]
    }

    /// Per-VM accelerator count for candidate implementation `k`, valid
    /// before `reduce_impl` collapses the candidate list (used by the
    /// gateway's cross-cell weighting, which must compare every candidate
    /// implementation before one is chosen).
    pub fn accelerators_per_vm_at(&self, k: usize) -> u64 {
        self.accelerators_per_vm.get(k).copied().unwrap_or(self.accelerators_per_vm[0])
    }

    pub fn remaining_instructions(&self) -> f64 {
        self.remaining_instructions
    }

    pub fn total_instructions(&self) -> f64 {
        self.total_instructions
    }

    /// Collapses the candidate-implementation list to its `k`-th entry and
    /// records `selected_type`. Must be called before the task is enqueued
    /// into a broker's in-flight queue on acceptance (spec.md §4.3).
    pub fn reduce_impl(&mut self, k: usize) {
        let ty = self.available_implementations[k];
        let acc = self.accelerators_per_vm.get(k).copied().unwrap_or(self.accelerators_per_vm[0]);
        self.available_implementations = vec![ty];
        self.accelerators_per_vm = vec![acc];
        self.selected_type = Some(ty);
    }

    pub fn remap_type(&mut self, resource_type: u32) {
        self.selected_type = Some(resource_type);
    }

    /// `|resources| must equal num_vms` (spec.md §4.3).
    pub fn attach_resources(&mut self, resources: Vec<u32>) {
        debug_assert_eq!(resources.len(), self.num_vms as usize);
        self.resource_ids = resources;
    }

    pub fn mark_admitted(&mut self) {
        self.state = TaskState::Admitted;
    }

    pub fn mark_running(&mut self) {
        self.state = TaskState::Running;
    }

    pub fn mark_rejected(&mut self) {
        self.state = TaskState::Rejected;
    }

    pub fn mark_completed(&mut self, time: u64) {
        self.state = TaskState::Completed;
        self.completion_time = Some(time);
        self.response_time = Some(time.saturating_sub(self.arrival_time));
    }

    /// `(u_p·p, u_m·m, u_p·n, u_s·s, ρ_acc·acc_per_vm)` — network tracks
    /// processor activity, not its own utilization field (spec.md §4.3).
    pub fn compute_current_utilization(&self) -> (f64, f64, f64, f64, f64) {
        let d = self.demand;
        let u = self.utilization;
        (
            u.processor_utilization * d.processors_per_vm as f64,
            u.memory_utilization * d.memory_per_vm as f64,
            u.processor_utilization * d.network_bandwidth as f64,
            u.storage_utilization * d.storage_per_vm as f64,
            u.accelerator_utilization * self.accelerators_per_vm() as f64,
        )
    }

    pub fn reduce_instructions(&mut self, delta: f64) {
        self.remaining_instructions = (self.remaining_instructions - delta).max(0.0);
    }

    pub fn is_completed(&self) -> bool {
        self.remaining_instructions <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_task() -> Task {
        Task::new(
            1,
            0,
            TaskDemand { processors_per_vm: 2, memory_per_vm: 8, network_bandwidth: 1, storage_per_vm: 0 },
            2,
            100.0,
            UtilizationProfile {
                processor_utilization: 1.0,
                memory_utilization: 1.0,
                storage_utilization: 0.0,
                accelerator_utilization: 0.0,
            },
            vec![0],
            vec![1],
        )
    }

    #[test]
    fn reduce_instructions_clamps_at_zero() {
        let mut t = demo_task();
        t.reduce_instructions(150.0);
        assert_eq!(t.remaining_instructions(), 0.0);
        assert!(t.is_completed());
    }

    #[test]
    fn reduce_impl_collapses_candidate_list() {
        let mut t = Task::new(
            2,
            0,
            TaskDemand { processors_per_vm: 1, memory_per_vm: 1, network_bandwidth: 1, storage_per_vm: 1 },
            1,
            10.0,
            UtilizationProfile {
                processor_utilization: 0.5,
                memory_utilization: 0.5,
                storage_utilization: 0.5,
                accelerator_utilization: 0.0,
            },
            vec![0, 4],
            vec![1, 2],
        );
        t.reduce_impl(1);
        assert_eq!(t.available_implementations(), &[2]);
        assert_eq!(t.selected_type, Some(2));
        assert_eq!(t.accelerators_per_vm(), 4);
    }
}
