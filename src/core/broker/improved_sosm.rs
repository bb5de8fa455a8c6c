//! Improved SOSM: adds runtime server migration between sibling vRMs and
//! deassessment at every tree level. Grounded on the migration methods of
//! `original_source/vrm.py` (`obtain_resources`/`attach_resources`) and
//! spec.md §4.8/§9's pRouter deassessment asymmetry.

use indexmap::IndexMap;
use log::{debug, info};
use rand::rngs::StdRng;

use super::sosm::{select_best_type, AssessedNode, Deficit, PSwitch, TypeAssessment, Vrm};
use super::{Broker, ResourceTable, StatsTable};
use crate::core::assessment::AssessmentParams;
use crate::core::network::Network;
use crate::core::resource::Resource;
use crate::core::stats::Statistics;
use crate::core::task::Task;

/// A pSwitch that falls back to migrating movable servers between sibling
/// vRMs when no single child can accommodate a task outright (spec.md
/// §4.8).
#[derive(Debug)]
pub struct ImprovedPSwitch {
    inner: PSwitch,
}

impl ImprovedPSwitch {
    pub fn new(vrm_indices: Vec<usize>, weights: Vec<f64>, params: AssessmentParams, poll_interval: u64) -> Self {
        ImprovedPSwitch { inner: PSwitch::new(vrm_indices, weights, params, poll_interval) }
    }

    pub fn node(&self) -> &AssessedNode {
        &self.inner.node
    }

    pub fn update_state_info(&mut self, t: u64, vrms: &[Vrm], rng: &mut StdRng) {
        self.inner.update_state_info(t, vrms, rng);
    }

    fn apply_own_deassessment(&mut self, need_p: f64, need_m: f64, need_s: f64, need_a: f64) {
        self.inner.node.spmsa.avail_p -= need_p;
        self.inner.node.spmsa.avail_m -= need_m;
        self.inner.node.spmsa.avail_s -= need_s;
        self.inner.node.spmsa.avail_a -= need_a;
        let du = if self.inner.node.spmsa.total_a > 0.0 { -need_a } else { -need_p };
        self.inner.node.apply_deassessment_range(du, -need_m, 4);
    }

    pub fn deploy(
        &mut self,
        task: &mut Task,
        vrms: &mut [Vrm],
        pool: &mut Vec<Resource>,
        network: &mut Network,
        stats: &mut Statistics,
        rng: &mut StdRng,
    ) -> bool {
        let d = task.demand;
        let acc = task.accelerators_per_vm();
        let n = task.num_vms as f64;
        let (need_p, need_m, need_s, need_a) = (
            n * d.processors_per_vm as f64,
            n * d.memory_per_vm as f64,
            n * d.storage_per_vm as f64,
            n * acc as f64,
        );

        // Step A: normal path — a single child already has room.
        let mut best: Option<usize> = None;
        for &vi in &self.inner.vrm_indices {
            if vrms[vi].probe(need_p, need_m, need_s, need_a) {
                match best {
                    None => best = Some(vi),
                    Some(cur) if vrms[vi].node.si > vrms[cur].node.si => best = Some(vi),
                    _ => {}
                }
            }
        }
        if let Some(vi) = best {
            let ok = vrms[vi].deploy(task, pool, network, stats, rng);
            if ok {
                self.apply_own_deassessment(need_p, need_m, need_s, need_a);
            }
            return ok;
        }

        // Step B: migration. Select the highest-si child regardless of fit
        // (spec.md §4.8 step 1), smallest index wins ties.
        let mut chosen: Option<usize> = None;
        for &vi in &self.inner.vrm_indices {
            match chosen {
                None => chosen = Some(vi),
                Some(cur) if vrms[vi].node.si > vrms[cur].node.si => chosen = Some(vi),
                _ => {}
            }
        }
        let j = match chosen {
            Some(j) => j,
            None => {
                stats.record_reject();
                return false;
            }
        };

        let (cap_p, cap_m, cap_s, cap_a) = vrms[j].capacity();
        let mut deficit = Deficit {
            p: need_p - cap_p,
            m: need_m - cap_m,
            s: need_s - cap_s,
            a: need_a - cap_a,
        };

        let mut siblings: Vec<usize> = self.inner.vrm_indices.iter().copied().filter(|&vi| vi != j).collect();
        siblings.sort_by_key(|&k| if k < j { (0, k) } else { (1, k) });

        let mut moved: Vec<(usize, Vec<u32>)> = Vec::new();
        for &k in &siblings {
            if deficit.closed() {
                break;
            }
            let taken = vrms[k].obtain_resources(pool, &mut deficit, rng);
            if !taken.is_empty() {
                moved.push((k, taken));
            }
        }

        if !deficit.closed() {
            for (k, indices) in moved {
                vrms[k].return_resources(pool, &indices, rng);
            }
            stats.record_reject();
            debug!("task {} rejected: migration could not close capacity deficit", task.id);
            return false;
        }

        let moved_count: usize = moved.iter().map(|(_, v)| v.len()).sum();
        for (_, indices) in &moved {
            vrms[j].attach_resources(pool, indices, rng);
        }
        info!("task {} triggers migration of {} server(s) into vrm {}", task.id, moved_count, j);

        let ok = vrms[j].deploy(task, pool, network, stats, rng);
        if ok {
            self.apply_own_deassessment(need_p, need_m, need_s, need_a);
        } else {
            // The migrated capacity stays with the recipient even if the
            // deploy itself still fails for an unrelated reason (e.g. the
            // network probe) — spec.md §4.8 only specifies rollback for an
            // unclosed deficit, not for a post-migration deploy failure.
            stats.record_reject();
        }
        ok
    }
}

/// Mirrors `PRouter`, but sums only choice 0's deassessment delta into its
/// own `si` (spec.md §9, third Open Question decision — see DESIGN.md).
#[derive(Debug)]
pub struct ImprovedPRouter {
    pub node: AssessedNode,
}

impl ImprovedPRouter {
    pub fn new(weights: Vec<f64>, params: AssessmentParams, poll_interval: u64) -> Self {
        ImprovedPRouter { node: AssessedNode::new(weights, params, poll_interval) }
    }

    pub fn update_state_info(&mut self, t: u64, pswitches: &[ImprovedPSwitch], rng: &mut StdRng) {
        if self.node.poll_interval != 0 && t % self.node.poll_interval != 0 {
            return;
        }
        let mut agg = crate::core::assessment::Spmsa::zero();
        for ps in pswitches {
            agg.add(&ps.node().spmsa);
        }
        self.node.spmsa = agg;
        self.node.si = crate::core::assessment::compute_si(
            &self.node.weights,
            &self.node.spmsa,
            &self.node.params,
            pswitches.len() as f64,
            rng,
        );
    }

    pub fn deploy(
        &mut self,
        task: &mut Task,
        pswitches: &mut [ImprovedPSwitch],
        vrms: &mut [Vrm],
        pool: &mut Vec<Resource>,
        network: &mut Network,
        stats: &mut Statistics,
        rng: &mut StdRng,
    ) -> bool {
        let d = task.demand;
        let acc = task.accelerators_per_vm();
        let n = task.num_vms as f64;
        let (need_p, need_m, need_s, need_a) = (
            n * d.processors_per_vm as f64,
            n * d.memory_per_vm as f64,
            n * d.storage_per_vm as f64,
            n * acc as f64,
        );

        let mut best: Option<usize> = None;
        for (i, ps) in pswitches.iter().enumerate() {
            if ps.node().spmsa.has_headroom(need_p, need_m, need_s, need_a) {
                match best {
                    None => best = Some(i),
                    Some(cur) if ps.node().si > pswitches[cur].node().si => best = Some(i),
                    _ => {}
                }
            }
        }
        // With no pSwitch already fitting, still try the highest-si one —
        // it may close the gap through migration.
        let pi = best.unwrap_or_else(|| {
            let mut chosen = 0;
            for (i, ps) in pswitches.iter().enumerate() {
                if ps.node().si > pswitches[chosen].node().si {
                    chosen = i;
                }
            }
            chosen
        });
        if pswitches.is_empty() {
            stats.record_reject();
            return false;
        }

        let ok = pswitches[pi].deploy(task, vrms, pool, network, stats, rng);
        if ok {
            self.node.spmsa.avail_p -= need_p;
            self.node.spmsa.avail_m -= need_m;
            self.node.spmsa.avail_s -= need_s;
            self.node.spmsa.avail_a -= need_a;
            let du = if self.node.spmsa.total_a > 0.0 { -need_a } else { -need_p };
            self.node.apply_deassessment_range(du, -need_m, 1);
        }
        ok
    }
}

#[derive(Debug)]
pub struct ImprovedTypeHierarchy {
    pub type_id: u32,
    pub vrms: Vec<Vrm>,
    pub pswitches: Vec<ImprovedPSwitch>,
    pub prouter: ImprovedPRouter,
}

impl ImprovedTypeHierarchy {
    pub fn update_state_info(&mut self, t: u64, resources: &[Resource], rng: &mut StdRng) {
        for vrm in &mut self.vrms {
            vrm.update_state_info(t, resources, rng);
        }
        for ps in &mut self.pswitches {
            ps.update_state_info(t, &self.vrms, rng);
        }
        self.prouter.update_state_info(t, &self.pswitches, rng);
    }

    pub fn deploy(
        &mut self,
        task: &mut Task,
        pool: &mut Vec<Resource>,
        network: &mut Network,
        stats: &mut Statistics,
        rng: &mut StdRng,
    ) -> bool {
        self.prouter
            .deploy(task, &mut self.pswitches, &mut self.vrms, pool, network, stats, rng)
    }
}

#[derive(Debug)]
pub struct ImprovedSosmBroker {
    pub types: IndexMap<u32, ImprovedTypeHierarchy>,
    type_assessment: IndexMap<u32, TypeAssessment>,
    poll_interval_cell_m: u64,
    rng: StdRng,
}

impl ImprovedSosmBroker {
    pub fn new(types: IndexMap<u32, ImprovedTypeHierarchy>, poll_interval_cell_m: u64, rng: StdRng) -> Self {
        let type_assessment = types.keys().map(|&ty| (ty, TypeAssessment::default())).collect();
        ImprovedSosmBroker { types, type_assessment, poll_interval_cell_m, rng }
    }

    /// Copies each type's pRouter aggregate into the cross-type cache, same
    /// schedule/grounding as `SosmBroker::refresh_type_assessment`.
    fn refresh_type_assessment(&mut self, t: u64) {
        if self.poll_interval_cell_m != 0 && t % self.poll_interval_cell_m != 0 {
            return;
        }
        for (ty, hierarchy) in self.types.iter() {
            self.type_assessment
                .insert(*ty, TypeAssessment { spmsa: hierarchy.prouter.node.spmsa, si: hierarchy.prouter.node.si });
        }
    }
}

impl Broker for ImprovedSosmBroker {
    fn deploy(
        &mut self,
        task: &mut Task,
        resources: &mut ResourceTable,
        network: &mut Network,
        stats: &mut StatsTable,
        _rng: &mut StdRng,
    ) -> bool {
        let (impl_idx, type_id) = match select_best_type(task, &self.type_assessment) {
            Some(v) => v,
            None => return false,
        };
        task.reduce_impl(impl_idx);

        let hierarchy = self.types.get_mut(&type_id).expect("type checked above");
        let pool = resources.entry(type_id).or_default();
        let type_stats = stats.entry(type_id).or_default();
        hierarchy.deploy(task, pool, network, type_stats, &mut self.rng)
    }

    fn update_state_info(&mut self, t: u64, resources: &ResourceTable) {
        for (type_id, hierarchy) in self.types.iter_mut() {
            if let Some(pool) = resources.get(type_id) {
                hierarchy.update_state_info(t, pool, &mut self.rng);
            }
        }
        self.refresh_type_assessment(t);
    }
}
