//! End-to-end scenario S6 (spec.md §8): 2 cells × 2 hardware types × 10
//! servers, broker = SOSM, 100 tasks with varied implementations,
//! max_time=1000, update_interval=10. Exercises the full
//! io::cell_config -> io::broker_config -> io::task_config ->
//! core::simulator -> io::results pipeline end to end.

use dslab_cell_sim::core::cell::Cell;
use dslab_cell_sim::core::simulator::Simulator;
use dslab_cell_sim::io::{broker_config, cell_config, results, task_config};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn hw_type_json(type_id: u32) -> String {
    format!(
        r#"{{
            "HW type ID": {type_id},
            "Number of servers": 10,
            "Number of CPUs per server": 8,
            "Memory per server": 32,
            "Storage per server": 1024,
            "Processors overcommitment ratio": 1.0,
            "Compute capability": 1.0,
            "Accelerators": false,
            "Number of accelerators per server": 0,
            "Accelerator compute capability": 0.0,
            "Type of CPU model": -1,
            "CPU idle power consumption": 100.0,
            "CPU max power consumption": 300.0,
            "CPU sleep power consumption": 10.0,
            "Accelerator idle power consumption": 0.0,
            "Accelerator max power consumption": 0.0,
            "Accelerator sleep power consumption": 0.0
        }}"#
    )
}

fn cell_json(cell_id: u32) -> String {
    format!(
        r#"{{
            "Cell ID": {cell_id},
            "Cell interconnection bandwidth": 1000,
            "Number of hardware(HW) types": 2,
            "HW types": [{}, {}]
        }}"#,
        hw_type_json(1),
        hw_type_json(2)
    )
}

fn cell_data_json() -> String {
    format!(
        r#"{{
            "Maximum simulation time": 1000,
            "Update interval": 10,
            "Number of Cells": 2,
            "Cells": [{}, {}]
        }}"#,
        cell_json(1),
        cell_json(2)
    )
}

fn broker_params_json() -> &'static str {
    r#"{
        "Number of functions": 5,
        "Weights of functions": [1.0, 1.0, 1.0, 1.0, 1.0],
        "Number of Resources per vRM": 2,
        "Number of vRMs per pSwitch": 5,
        "Number of pSwitch per pRouter": 1,
        "Poll Interval Cell Manager": 1,
        "Poll Interval pRouter": 1,
        "Poll Interval pSwitch": 1,
        "Poll Interval vRM": 1,
        "vRM deployment strategy": 2
    }"#
}

fn broker_data_json() -> String {
    format!(
        r#"{{ "Resource allocation mechanism": "SOSM", "Brokers": [{}, {}] }}"#,
        broker_params_json(),
        broker_params_json()
    )
}

fn task_data_json() -> String {
    let mut tasks = Vec::with_capacity(100);
    for i in 0..100u64 {
        let arrival = i * 10;
        let impls = if i % 2 == 0 { "[1]" } else { "[1, 2]" };
        tasks.push(format!(
            r#"{{
                "processors_per_vm": 1, "memory_per_vm": 2, "network_bandwidth": 1,
                "storage_per_vm": 0, "num_vms": 1, "total_instructions": 10.0,
                "processor_utilization": 1.0, "memory_utilization": 1.0,
                "storage_utilization": 0.0, "accelerator_utilization": 0.0,
                "available_implementations": {impls}, "arrival_time": {arrival}
            }}"#
        ));
    }
    format!(r#"{{ "tasks": [{}] }}"#, tasks.join(","))
}

#[test]
fn s6_two_cell_sosm_run_is_internally_consistent() {
    let cell_json = cell_data_json();
    let broker_json = broker_data_json();
    let task_json = task_data_json();

    let parsed = cell_config::parse_cell_config(&cell_json).expect("cell config parses");
    assert_eq!(parsed.max_simulation_time, 1000);
    assert_eq!(parsed.update_interval, 10);
    assert_eq!(parsed.cells.len(), 2);

    let mut cells = Vec::with_capacity(2);
    for (cell_index, pc) in parsed.cells.into_iter().enumerate() {
        let broker = broker_config::build_broker(&broker_json, cell_index, &pc, 0).expect("broker builds");
        cells.push(Cell::new(
            pc.cell_id,
            pc.resources,
            pc.network,
            pc.power_models,
            broker,
            StdRng::seed_from_u64(cell_index as u64),
        ));
    }

    let tasks = task_config::parse_task_config(&task_json).expect("tasks parse");
    assert_eq!(tasks.len(), 100);
    let total_submitted = tasks.len() as u64;

    let mut sim = Simulator::new(cells, 1000, 10, tasks);
    sim.run();

    let mut accepted = 0u64;
    let mut rejected = 0u64;
    for cell in &sim.cells {
        for stats in cell.stats.values() {
            accepted += stats.accepted_tasks;
            rejected += stats.rejected_tasks;
            // 101 snapshots: t = 0, 10, ..., 1000.
            assert_eq!(stats.snapshots.len(), 101);
            // Energy is monotonically non-decreasing across the run.
            let mut last = 0.0_f64;
            for snap in &stats.snapshots {
                assert!(snap.total_energy_gwh + 1e-9 >= last);
                last = snap.total_energy_gwh;
            }
            // Every task submitted during the run has long since completed
            // by max_time (total_instructions=10 completes in a handful of
            // seconds at these compute capabilities).
            let final_snapshot = stats.snapshots.last().unwrap();
            assert_eq!(final_snapshot.running_vms, 0);
        }
    }
    assert_eq!(accepted + rejected, total_submitted);

    let doc = results::build_results(&sim, "SOSM", total_submitted);
    assert_eq!(doc.mechanism, "SOSM");
    assert_eq!(doc.total_submitted_tasks, 100);
    // 2 cells x 2 HW types = 4 (Cell, HW Type) rows.
    assert_eq!(doc.outputs.len(), 4);
    for row in &doc.outputs {
        assert_eq!(row.outputs.len(), 101);
    }

    let json = results::to_json_string(&doc).expect("serializes");
    assert!(json.contains("\"CLSim outputs\""));
}
