//! Cell topology + power model JSON. Field names mirror
//! `original_source/inputs.py`'s `SimulationInputs.parse`/`CellInputs`
//! exactly (spec.md §6 "Config JSON (cell input)"), not invented names —
//! structure follows `dslab-iaas/src/core/config.rs`'s `*Raw` pattern,
//! translated from `Option<T>`-with-`unwrap_or` defaults to a validating
//! `Result` since spec.md §7 requires missing-required-field to abort
//! startup rather than silently substitute a default.

use indexmap::IndexMap;
use serde::Deserialize;

use crate::core::broker::ResourceTable;
use crate::core::network::Network;
use crate::core::power::{AcceleratorPower, CpuCurve, CubicSpline, PowerModel};
use crate::core::resource::Resource;
use crate::error::SimError;

#[derive(Debug, Deserialize)]
struct CellDocRaw {
    #[serde(rename = "Maximum simulation time")]
    max_time: u64,
    #[serde(rename = "Update interval")]
    update_interval: u64,
    #[serde(rename = "Cells")]
    cells: Vec<CellRaw>,
}

#[derive(Debug, Deserialize)]
struct CellRaw {
    #[serde(rename = "Cell ID")]
    cell_id: u32,
    #[serde(rename = "Cell interconnection bandwidth")]
    bandwidth: u64,
    #[serde(rename = "HW types")]
    hw_types: Vec<HwTypeRaw>,
}

#[derive(Debug, Deserialize)]
struct HwTypeRaw {
    #[serde(rename = "HW type ID")]
    type_id: u32,
    #[serde(rename = "Number of servers")]
    num_servers: u64,
    #[serde(rename = "Number of CPUs per server")]
    cpus: u64,
    #[serde(rename = "Memory per server")]
    memory: u64,
    #[serde(rename = "Storage per server")]
    storage: u64,
    #[serde(rename = "Processors overcommitment ratio")]
    overcommit_processors: f64,
    /// Parsed for schema parity with `original_source/inputs.py` but has
    /// no behavioral effect: `Resource` (spec.md §3) models only
    /// processor overcommitment.
    #[serde(rename = "Memory overcommitment ratio", default)]
    #[allow(dead_code)]
    overcommit_memory: f64,
    #[serde(rename = "Compute capability")]
    compute_capability: f64,
    #[serde(rename = "Accelerators")]
    accelerators_enabled: bool,
    #[serde(rename = "Number of accelerators per server", default)]
    accelerators_per_server: u64,
    #[serde(rename = "Accelerator compute capability", default)]
    accelerator_compute_capability: f64,
    #[serde(rename = "Type of CPU model")]
    cpu_model_type: i32,
    #[serde(rename = "CPU idle power consumption")]
    cpu_idle: f64,
    #[serde(rename = "CPU max power consumption")]
    cpu_max: f64,
    #[serde(rename = "CPU sleep power consumption")]
    cpu_sleep: f64,
    #[serde(rename = "CPU utilization bins", default)]
    cpu_bins: Vec<f64>,
    #[serde(rename = "CPU power consumption", default)]
    cpu_power_points: Vec<f64>,
    #[serde(rename = "Accelerator idle power consumption", default)]
    acc_idle: f64,
    #[serde(rename = "Accelerator max power consumption", default)]
    acc_max: f64,
    #[serde(rename = "Accelerator sleep power consumption", default)]
    acc_sleep: f64,
}

pub struct ParsedCell {
    pub cell_id: u32,
    pub resources: ResourceTable,
    pub network: Network,
    pub power_models: IndexMap<u32, PowerModel>,
    /// Per-type server count, needed by `broker_config` to partition
    /// vRM/pSwitch arenas — not recoverable from `resources` alone once
    /// `IndexMap` iteration order is the only thing preserving type order.
    pub servers_per_type: IndexMap<u32, u64>,
}

pub struct ParsedCellConfig {
    pub max_simulation_time: u64,
    pub update_interval: u64,
    pub cells: Vec<ParsedCell>,
}

pub fn parse_cell_config(json: &str) -> Result<ParsedCellConfig, SimError> {
    let raw: CellDocRaw = serde_json::from_str(json).map_err(|e| SimError::InputError(e.to_string()))?;
    if raw.update_interval == 0 {
        return Err(SimError::InputError("Update interval must be >= 1".into()));
    }

    let mut cells = Vec::with_capacity(raw.cells.len());
    for cell in raw.cells {
        if cell.hw_types.is_empty() {
            return Err(SimError::InputError(format!("cell {} has no HW types", cell.cell_id)));
        }
        let mut resources = ResourceTable::new();
        let mut power_models = IndexMap::new();
        let mut servers_per_type = IndexMap::new();

        for hw in &cell.hw_types {
            if hw.num_servers == 0 {
                return Err(SimError::InputError(format!("HW type {} has zero servers", hw.type_id)));
            }
            let accelerators_per_server = if hw.accelerators_enabled { hw.accelerators_per_server } else { 0 };
            let mut pool = Vec::with_capacity(hw.num_servers as usize);
            for i in 0..hw.num_servers {
                pool.push(Resource::new(
                    hw.type_id,
                    i as u32,
                    hw.cpus,
                    hw.memory,
                    hw.storage,
                    accelerators_per_server,
                    hw.compute_capability,
                    hw.accelerator_compute_capability,
                    hw.overcommit_processors.max(1.0),
                    true,
                ));
            }
            resources.insert(hw.type_id, pool);
            servers_per_type.insert(hw.type_id, hw.num_servers);

            let cpu = cpu_curve_from_model_type(hw.cpu_model_type, hw.cpu_idle, hw.cpu_max, &hw.cpu_bins, &hw.cpu_power_points)?;
            let accelerator = if hw.accelerators_enabled {
                Some(AcceleratorPower { pmin: hw.acc_idle, pmax: hw.acc_max, sleep: hw.acc_sleep })
            } else {
                None
            };
            power_models.insert(hw.type_id, PowerModel { cpu, cpu_sleep: hw.cpu_sleep, accelerator });
        }

        cells.push(ParsedCell {
            cell_id: cell.cell_id,
            resources,
            network: Network::new(cell.bandwidth),
            power_models,
            servers_per_type,
        });
    }

    Ok(ParsedCellConfig { max_simulation_time: raw.max_time, update_interval: raw.update_interval, cells })
}

/// Maps `model_type` (spec.md §4.4) to a `CpuCurve`. Negative tags are
/// closed-form polynomials; tag 0 has no case in
/// `original_source/power.py` and is treated as constant-at-pmin per
/// DESIGN.md's Open Question decision.
fn cpu_curve_from_model_type(
    model_type: i32,
    pmin: f64,
    pmax: f64,
    bins: &[f64],
    values: &[f64],
) -> Result<CpuCurve, SimError> {
    match model_type {
        0 => Ok(CpuCurve::Constant { pmin }),
        -1 => Ok(CpuCurve::Linear { pmin, pmax }),
        -2 => Ok(CpuCurve::Quadratic { pmin, pmax }),
        -3 => Ok(CpuCurve::Cubic { pmin, pmax }),
        -4 => Ok(CpuCurve::CubicMidpoint { pmin, pmax }),
        -5 => Ok(CpuCurve::CubicSkewed { pmin, pmax }),
        1 => {
            if bins.is_empty() || bins.len() != values.len() {
                return Err(SimError::InputError("piecewise-linear CPU model requires matching bins/values".into()));
            }
            Ok(CpuCurve::PiecewiseLinear { bins: bins.to_vec(), values: values.to_vec() })
        }
        2 => {
            if bins.len() < 2 || bins.len() != values.len() {
                return Err(SimError::InputError("cubic-spline CPU model requires >= 2 matching bins/values".into()));
            }
            Ok(CpuCurve::CubicSpline(CubicSpline::new(bins.to_vec(), values.to_vec())))
        }
        3 => {
            if values.is_empty() {
                return Err(SimError::InputError("bin-lookup CPU model requires power consumption points".into()));
            }
            Ok(CpuCurve::BinLookup { values: values.to_vec() })
        }
        other => Err(SimError::InputError(format!("unknown CPU model type {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "Maximum simulation time": 100,
            "Update interval": 10,
            "Number of Cells": 1,
            "Cells": [{
                "Cell ID": 1,
                "Cell interconnection bandwidth": 10,
                "Number of hardware(HW) types": 1,
                "HW types": [{
                    "HW type ID": 1,
                    "Number of servers": 2,
                    "Number of CPUs per server": 4,
                    "Memory per server": 16,
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
                }]
            }]
        }"#
    }

    #[test]
    fn parses_minimal_cell_document() {
        let parsed = parse_cell_config(sample_json()).unwrap();
        assert_eq!(parsed.max_simulation_time, 100);
        assert_eq!(parsed.update_interval, 10);
        assert_eq!(parsed.cells.len(), 1);
        assert_eq!(parsed.cells[0].resources[&1].len(), 2);
        assert_eq!(parsed.cells[0].network.total_bandwidth(), 10);
    }

    #[test]
    fn rejects_zero_servers() {
        let bad = sample_json().replace("\"Number of servers\": 2", "\"Number of servers\": 0");
        assert!(parse_cell_config(&bad).is_err());
    }

    #[test]
    fn rejects_unknown_cpu_model_type() {
        let bad = sample_json().replace("\"Type of CPU model\": -1", "\"Type of CPU model\": 99");
        assert!(parse_cell_config(&bad).is_err());
    }
}
