//! Broker mechanism + hierarchy-shape JSON. Field names mirror
//! `original_source/inputs.py::BrokerInputs.parse` exactly (spec.md §6
//! "Config JSON (broker input)"). Builds the concrete `Box<dyn Broker>`
//! for a cell from its `ParsedCell` (resources already constructed by
//! `cell_config`).

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;

use crate::core::assessment::AssessmentParams;
use crate::core::broker::improved_sosm::{ImprovedPRouter, ImprovedPSwitch, ImprovedSosmBroker, ImprovedTypeHierarchy};
use crate::core::broker::sosm::{DeployStrategy, PRouter, PSwitch, SosmBroker, TypeHierarchy, Vrm};
use crate::core::broker::traditional::TraditionalBroker;
use crate::core::broker::Broker;
use crate::core::power::PowerModel;
use crate::core::resource::Resource;
use crate::error::SimError;
use crate::io::cell_config::ParsedCell;

#[derive(Debug, Deserialize)]
struct BrokerDocRaw {
    #[serde(rename = "Resource allocation mechanism")]
    mechanism: String,
    #[serde(rename = "Brokers", default)]
    brokers: Vec<BrokerParamsRaw>,
}

#[derive(Debug, Deserialize, Clone)]
struct BrokerParamsRaw {
    #[serde(rename = "Number of functions")]
    #[allow(dead_code)]
    number_of_functions: usize,
    #[serde(rename = "Weights of functions")]
    weights: Vec<f64>,
    #[serde(rename = "Number of Resources per vRM")]
    res_per_vrm: usize,
    #[serde(rename = "Number of vRMs per pSwitch")]
    vrm_per_pswitch: usize,
    #[serde(rename = "Number of pSwitch per pRouter")]
    pswitch_per_prouter: usize,
    /// Gates `SosmBroker`/`ImprovedSosmBroker`'s broker-level cross-type
    /// `si[t]` refresh (spec.md §3 "Broker assessment state"), independent
    /// of any pRouter's own poll interval. Unused by Traditional.
    #[serde(rename = "Poll Interval Cell Manager")]
    poll_cell_m: u64,
    #[serde(rename = "Poll Interval pRouter")]
    poll_prouter: u64,
    #[serde(rename = "Poll Interval pSwitch")]
    poll_pswitch: u64,
    #[serde(rename = "Poll Interval vRM")]
    poll_vrm: u64,
    #[serde(rename = "vRM deployment strategy")]
    deploy_strategy: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mechanism {
    Traditional,
    Sosm,
    ImprovedSosm,
}

pub fn parse_mechanism(json: &str) -> Result<Mechanism, SimError> {
    let raw: BrokerDocRaw = serde_json::from_str(json).map_err(|e| SimError::InputError(e.to_string()))?;
    match raw.mechanism.as_str() {
        "Traditional" => Ok(Mechanism::Traditional),
        "SOSM" => Ok(Mechanism::Sosm),
        "Improved SOSM" => Ok(Mechanism::ImprovedSosm),
        other => Err(SimError::InputError(format!("unknown resource allocation mechanism {other:?}"))),
    }
}

/// Builds one cell's broker from the parsed broker document. `cell_index`
/// selects this cell's entry in `Brokers[]` for the SOSM variants;
/// Traditional ignores it (it has no hierarchy parameters).
pub fn build_broker(json: &str, cell_index: usize, cell: &ParsedCell, seed: u64) -> Result<Box<dyn Broker>, SimError> {
    let raw: BrokerDocRaw = serde_json::from_str(json).map_err(|e| SimError::InputError(e.to_string()))?;
    let mechanism = parse_mechanism(json)?;

    let managed_types: Vec<u32> = cell.resources.keys().copied().collect();

    match mechanism {
        Mechanism::Traditional => Ok(Box::new(TraditionalBroker::new(managed_types))),
        Mechanism::Sosm | Mechanism::ImprovedSosm => {
            let params = raw.brokers.get(cell_index).ok_or_else(|| {
                SimError::ConfigMismatch(format!("no Brokers[{cell_index}] entry for SOSM cell {}", cell.cell_id))
            })?;
            if params.weights.is_empty() {
                return Err(SimError::ConfigMismatch("SOSM broker requires non-empty Weights of functions".into()));
            }

            match mechanism {
                Mechanism::Sosm => {
                    let mut types = IndexMap::new();
                    for (&type_id, pool) in cell.resources.iter() {
                        types.insert(type_id, build_type_hierarchy(type_id, pool, &cell.power_models, params)?);
                    }
                    Ok(Box::new(SosmBroker::new(types, params.poll_cell_m, StdRng::seed_from_u64(seed))))
                }
                Mechanism::ImprovedSosm => {
                    let mut types = IndexMap::new();
                    for (&type_id, pool) in cell.resources.iter() {
                        types.insert(type_id, build_improved_type_hierarchy(type_id, pool, &cell.power_models, params)?);
                    }
                    Ok(Box::new(ImprovedSosmBroker::new(types, params.poll_cell_m, StdRng::seed_from_u64(seed))))
                }
                Mechanism::Traditional => unreachable!(),
            }
        }
    }
}

/// `(c, p, pi)` normalization constants for one type (spec.md §3): minimum
/// compute cost, max power, min power, read off the already-built
/// `Resource`/`PowerModel` rather than re-parsed from the cell JSON.
fn type_assessment_params(pool: &[Resource], model: &PowerModel, opt_num_of_resources: f64) -> AssessmentParams {
    let c = pool.first().map(|r| r.compute_capability_per_processor).unwrap_or(0.0);
    let p = model.cpu.power(1.0);
    let pi = model.cpu.power(0.0);
    AssessmentParams { c, p, pi, opt_num_of_resources }
}

fn partition(total: usize, chunk_size: usize) -> Vec<(usize, usize)> {
    let chunk_size = chunk_size.max(1);
    let mut out = Vec::new();
    let mut start = 0;
    while start < total {
        let end = (start + chunk_size).min(total);
        out.push((start, end));
        start = end;
    }
    out
}

fn deploy_strategy_from(code: u8) -> DeployStrategy {
    match code {
        1 => DeployStrategy::AllSameOrFail,
        _ => DeployStrategy::PackedFirstFit,
    }
}

fn build_type_hierarchy(
    type_id: u32,
    pool: &[Resource],
    power_models: &IndexMap<u32, PowerModel>,
    params: &BrokerParamsRaw,
) -> Result<TypeHierarchy, SimError> {
    let model = power_models
        .get(&type_id)
        .ok_or_else(|| SimError::ConfigMismatch(format!("no power model for HW type {type_id}")))?;

    let vrm_params = type_assessment_params(pool, model, params.res_per_vrm as f64);
    let vrms: Vec<Vrm> = partition(pool.len(), params.res_per_vrm)
        .into_iter()
        .map(|(start, end)| {
            let indices: Vec<u32> = (start as u32..end as u32).collect();
            Vrm::new(
                indices,
                params.weights.clone(),
                vrm_params,
                params.poll_vrm,
                deploy_strategy_from(params.deploy_strategy),
                params.res_per_vrm as f64,
            )
        })
        .collect();

    let pswitch_params = type_assessment_params(pool, model, params.vrm_per_pswitch as f64);
    let pswitches: Vec<PSwitch> = partition(vrms.len(), params.vrm_per_pswitch)
        .into_iter()
        .map(|(start, end)| PSwitch::new((start..end).collect(), params.weights.clone(), pswitch_params, params.poll_pswitch))
        .collect();

    let prouter_params = type_assessment_params(pool, model, params.pswitch_per_prouter as f64);
    let prouter = PRouter::new(params.weights.clone(), prouter_params, params.poll_prouter);

    Ok(TypeHierarchy { type_id, vrms, pswitches, prouter })
}

fn build_improved_type_hierarchy(
    type_id: u32,
    pool: &[Resource],
    power_models: &IndexMap<u32, PowerModel>,
    params: &BrokerParamsRaw,
) -> Result<ImprovedTypeHierarchy, SimError> {
    let model = power_models
        .get(&type_id)
        .ok_or_else(|| SimError::ConfigMismatch(format!("no power model for HW type {type_id}")))?;

    let vrm_params = type_assessment_params(pool, model, params.res_per_vrm as f64);
    let vrms: Vec<Vrm> = partition(pool.len(), params.res_per_vrm)
        .into_iter()
        .map(|(start, end)| {
            let indices: Vec<u32> = (start as u32..end as u32).collect();
            Vrm::new(
                indices,
                params.weights.clone(),
                vrm_params,
                params.poll_vrm,
                deploy_strategy_from(params.deploy_strategy),
                params.res_per_vrm as f64,
            )
        })
        .collect();

    let pswitch_params = type_assessment_params(pool, model, params.vrm_per_pswitch as f64);
    let pswitches: Vec<ImprovedPSwitch> = partition(vrms.len(), params.vrm_per_pswitch)
        .into_iter()
        .map(|(start, end)| {
            ImprovedPSwitch::new((start..end).collect(), params.weights.clone(), pswitch_params, params.poll_pswitch)
        })
        .collect();

    let prouter_params = type_assessment_params(pool, model, params.pswitch_per_prouter as f64);
    let prouter = ImprovedPRouter::new(params.weights.clone(), prouter_params, params.poll_prouter);

    Ok(ImprovedTypeHierarchy { type_id, vrms, pswitches, prouter })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::power::CpuCurve;
    use indexmap::IndexMap as Map;

    fn sample_cell() -> ParsedCell {
        let pool = vec![
            Resource::new(1, 0, 4, 16, 1024, 0, 1.0, 1.0, 1.0, true),
            Resource::new(1, 1, 4, 16, 1024, 0, 1.0, 1.0, 1.0, true),
        ];
        let mut resources = Map::new();
        resources.insert(1, pool);
        let mut power_models = Map::new();
        power_models.insert(1, PowerModel { cpu: CpuCurve::Linear { pmin: 100.0, pmax: 300.0 }, cpu_sleep: 10.0, accelerator: None });
        let mut servers_per_type = Map::new();
        servers_per_type.insert(1, 2);
        ParsedCell {
            cell_id: 1,
            resources,
            network: crate::core::network::Network::new(10),
            power_models,
            servers_per_type,
        }
    }

    fn sample_broker_json(mechanism: &str) -> String {
        format!(
            r#"{{
                "Resource allocation mechanism": "{mechanism}",
                "Brokers": [{{
                    "Number of functions": 5,
                    "Weights of functions": [1.0, 1.0, 1.0, 1.0, 1.0],
                    "Number of Resources per vRM": 1,
                    "Number of vRMs per pSwitch": 2,
                    "Number of pSwitch per pRouter": 1,
                    "Poll Interval Cell Manager": 1,
                    "Poll Interval pRouter": 1,
                    "Poll Interval pSwitch": 1,
                    "Poll Interval vRM": 1,
                    "vRM deployment strategy": 2
                }}]
            }}"#
        )
    }

    #[test]
    fn builds_traditional_broker() {
        let json = sample_broker_json("Traditional");
        let broker = build_broker(&json, 0, &sample_cell(), 0).unwrap();
        assert_eq!(format!("{broker:?}").contains("TraditionalBroker"), true);
    }

    #[test]
    fn builds_sosm_broker_with_two_vrms() {
        let json = sample_broker_json("SOSM");
        let broker = build_broker(&json, 0, &sample_cell(), 0);
        assert!(broker.is_ok());
    }

    #[test]
    fn sosm_without_brokers_entry_is_config_mismatch() {
        let json = r#"{"Resource allocation mechanism": "SOSM", "Brokers": []}"#;
        let err = build_broker(json, 0, &sample_cell(), 0).unwrap_err();
        assert!(matches!(err, SimError::ConfigMismatch(_)));
    }
}
