//! Task stream JSON. Field names are the flattened per-task attributes
//! spec.md §6 ("Task input") lists directly, not a `*Raw`/renamed wrapper —
//! the original source's `task.py` reads the same flat attribute names off
//! its input rows.

use serde::Deserialize;

use crate::core::task::{Task, TaskDemand, UtilizationProfile};
use crate::error::SimError;

#[derive(Debug, Deserialize)]
struct TaskDocRaw {
    tasks: Vec<TaskRaw>,
}

#[derive(Debug, Deserialize)]
struct TaskRaw {
    id: Option<u64>,
    processors_per_vm: u64,
    memory_per_vm: u64,
    network_bandwidth: u64,
    storage_per_vm: u64,
    #[serde(default)]
    accelerators_per_vm: Vec<u64>,
    num_vms: u32,
    total_instructions: f64,
    processor_utilization: f64,
    memory_utilization: f64,
    storage_utilization: f64,
    accelerator_utilization: f64,
    available_implementations: Vec<u32>,
    arrival_time: u64,
}

/// Parses the task stream and stably sorts it by `arrival_time` (spec.md
/// §5: "Tasks with equal arrival_time are admitted in input order"), so
/// the result is ready to hand straight to `Simulator::new`.
pub fn parse_task_config(json: &str) -> Result<Vec<Task>, SimError> {
    let raw: TaskDocRaw = serde_json::from_str(json).map_err(|e| SimError::InputError(e.to_string()))?;

    let mut tasks = Vec::with_capacity(raw.tasks.len());
    for (i, t) in raw.tasks.into_iter().enumerate() {
        if t.available_implementations.is_empty() {
            return Err(SimError::InputError(format!("task at index {i} has an empty available_implementations list")));
        }
        if t.num_vms == 0 {
            return Err(SimError::InputError(format!("task at index {i} has num_vms = 0")));
        }
        let accelerators_per_vm = if t.accelerators_per_vm.is_empty() {
            vec![0; t.available_implementations.len()]
        } else if t.accelerators_per_vm.len() == 1 {
            vec![t.accelerators_per_vm[0]; t.available_implementations.len()]
        } else if t.accelerators_per_vm.len() == t.available_implementations.len() {
            t.accelerators_per_vm
        } else {
            return Err(SimError::InputError(format!(
                "task at index {i} has {} accelerators_per_vm entries but {} implementations",
                t.accelerators_per_vm.len(),
                t.available_implementations.len()
            )));
        };

        tasks.push(Task::new(
            t.id.unwrap_or(i as u64),
            t.arrival_time,
            TaskDemand {
                processors_per_vm: t.processors_per_vm,
                memory_per_vm: t.memory_per_vm,
                network_bandwidth: t.network_bandwidth,
                storage_per_vm: t.storage_per_vm,
            },
            t.num_vms,
            t.total_instructions,
            UtilizationProfile {
                processor_utilization: t.processor_utilization,
                memory_utilization: t.memory_utilization,
                storage_utilization: t.storage_utilization,
                accelerator_utilization: t.accelerator_utilization,
            },
            accelerators_per_vm,
            t.available_implementations,
        ));
    }

    tasks.sort_by_key(|t| t.arrival_time);
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "tasks": [
                { "processors_per_vm": 2, "memory_per_vm": 4, "network_bandwidth": 1,
                  "storage_per_vm": 0, "accelerators_per_vm": [0], "num_vms": 1,
                  "total_instructions": 100.0, "processor_utilization": 1.0,
                  "memory_utilization": 1.0, "storage_utilization": 0.0,
                  "accelerator_utilization": 0.0, "available_implementations": [1],
                  "arrival_time": 5 },
                { "processors_per_vm": 1, "memory_per_vm": 1, "network_bandwidth": 1,
                  "storage_per_vm": 0, "num_vms": 1,
                  "total_instructions": 50.0, "processor_utilization": 0.5,
                  "memory_utilization": 0.5, "storage_utilization": 0.0,
                  "accelerator_utilization": 0.0, "available_implementations": [1, 2],
                  "arrival_time": 0 }
            ]
        }"#
    }

    #[test]
    fn parses_and_sorts_by_arrival_time() {
        let tasks = parse_task_config(sample_json()).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].arrival_time, 0);
        assert_eq!(tasks[1].arrival_time, 5);
    }

    #[test]
    fn missing_accelerators_per_vm_defaults_to_zero_for_every_implementation() {
        let tasks = parse_task_config(sample_json()).unwrap();
        assert_eq!(tasks[0].available_implementations().len(), 2);
        assert_eq!(tasks[0].accelerators_per_vm_at(0), 0);
        assert_eq!(tasks[0].accelerators_per_vm_at(1), 0);
    }

    #[test]
    fn rejects_empty_implementation_list() {
        let bad = sample_json().replace("\"available_implementations\": [1],", "\"available_implementations\": [],");
        assert!(parse_task_config(&bad).is_err());
    }
}
