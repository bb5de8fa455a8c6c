//! Three-level hierarchical broker (vRM → pSwitch → pRouter), one
//! independent tree per hardware type. Arena+index design per spec.md §9:
//! a pSwitch holds *positions* into its type's `vrms` arena rather than
//! shared references, so migration (Improved SOSM) is a plain index move.
//! Grounded on `original_source/vrm.py`, `prouter.py`, `sosm_broker.py`,
//! translated from their `Rc`-shaped slicing into flat arenas.

use indexmap::IndexMap;
use log::debug;
use rand::rngs::StdRng;

use super::{select_all_same, select_packed_first_fit, Broker, ResourceTable, StatsTable};
use crate::core::assessment::{assess, compute_si, deassess, AssessmentParams, Spmsa};
use crate::core::network::Network;
use crate::core::resource::Resource;
use crate::core::stats::Statistics;
use crate::core::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStrategy {
    /// type 1: all VMs must land on a single server.
    AllSameOrFail,
    /// type 2: pack servers in index order.
    PackedFirstFit,
}

/// Assessment state shared by every tree node (vRM, pSwitch, pRouter):
/// an aggregate `s_pmsa`, a suitability index, and the weights/constants
/// used to (re)compute both (spec.md §3, "Broker assessment state").
#[derive(Debug, Clone)]
pub struct AssessedNode {
    pub spmsa: Spmsa,
    pub si: f64,
    pub weights: Vec<f64>,
    pub params: AssessmentParams,
    pub poll_interval: u64,
}

impl AssessedNode {
    pub fn new(weights: Vec<f64>, params: AssessmentParams, poll_interval: u64) -> Self {
        AssessedNode { spmsa: Spmsa::zero(), si: 0.0, weights, params, poll_interval }
    }

    fn due(&self, t: u64) -> bool {
        self.poll_interval == 0 || t % self.poll_interval == 0
    }

    /// Recomputes `si` from the current `spmsa` (used both when polling
    /// fresh state and after an aggregate-only update, e.g. pSwitch summing
    /// children).
    fn recompute_si(&mut self, num_resources: f64, rng: &mut StdRng) {
        self.si = compute_si(&self.weights, &self.spmsa, &self.params, num_resources, rng);
    }

    /// Applies the closed-form deassessment delta for choices 0..=3 to
    /// `si`, using the post-decrement `spmsa` (matches
    /// `original_source/vrm.py::deploy`'s evaluation order). `du` is the
    /// delta in whichever quantity `Spmsa::u_t` tracks (accelerators if the
    /// node has any, else processors); `dm` is the memory delta.
    fn apply_deassessment(&mut self, du: f64, dm: f64) {
        self.apply_deassessment_range(du, dm, 4);
    }

    /// Same as `apply_deassessment` but only sums choices `0..max_choice`.
    /// Used by `ImprovedPRouter`, which per spec.md §9 only ever applies
    /// choice 0's delta at its own level.
    pub(crate) fn apply_deassessment_range(&mut self, du: f64, dm: f64, max_choice: usize) {
        let mut delta = 0.0;
        for (k, &w) in self.weights.iter().enumerate().take(max_choice) {
            delta += w * deassess(k, &self.spmsa, &self.params, du, dm);
        }
        self.si += delta;
    }
}

/// Leaf scheduler over a contiguous slice of one type's servers.
#[derive(Debug)]
pub struct Vrm {
    pub resource_indices: Vec<u32>,
    pub node: AssessedNode,
    pub deploy_strategy: DeployStrategy,
    pub opt_num_of_resources: f64,
    pub queue: Vec<u64>,
}

impl Vrm {
    pub fn new(
        resource_indices: Vec<u32>,
        weights: Vec<f64>,
        params: AssessmentParams,
        poll_interval: u64,
        deploy_strategy: DeployStrategy,
        opt_num_of_resources: f64,
    ) -> Self {
        Vrm {
            resource_indices,
            node: AssessedNode::new(weights, params, poll_interval),
            deploy_strategy,
            opt_num_of_resources,
            queue: Vec::new(),
        }
    }

    pub fn num_resources(&self) -> usize {
        self.resource_indices.len()
    }

    /// Re-reads live capacities from `resources` and recomputes `si`.
    /// Gated by `t mod poll_interval_vrm == 0` (spec.md §4.5).
    pub fn update_state_info(&mut self, t: u64, resources: &[Resource], rng: &mut StdRng) {
        if !self.node.due(t) {
            return;
        }
        let mut agg = Spmsa::zero();
        for &idx in &self.resource_indices {
            let r = &resources[idx as usize];
            agg.avail_p += r.avail_processors() as f64;
            agg.total_p += r.total_processors() as f64;
            agg.avail_m += r.avail_memory() as f64;
            agg.total_m += r.total_memory() as f64;
            agg.avail_s += r.avail_storage() as f64;
            agg.total_s += r.total_storage() as f64;
            agg.avail_a += r.avail_accelerators() as f64;
            agg.total_a += r.total_accelerators() as f64;
        }
        self.node.spmsa = agg;
        self.node.recompute_si(self.num_resources() as f64, rng);
    }

    pub fn probe(&self, p: f64, m: f64, s: f64, a: f64) -> bool {
        self.node.spmsa.has_headroom(p, m, s, a)
    }

    /// spec.md §4.5: gate `Network.probe`, reserve, run the placement
    /// strategy, commit on success and release the reservation on failure.
    pub fn deploy(
        &mut self,
        task: &mut Task,
        pool: &mut Vec<Resource>,
        network: &mut Network,
        stats: &mut Statistics,
        rng: &mut StdRng,
    ) -> bool {
        let bw = task.demand.network_bandwidth;
        if !network.probe(bw) {
            stats.record_reject();
            debug!("task {} rejected: network probe failed", task.id);
            return false;
        }
        network.deploy(task.id, bw);

        let d = task.demand;
        let acc = task.accelerators_per_vm();
        let ids = match self.deploy_strategy {
            DeployStrategy::AllSameOrFail => select_all_same(
                &self.resource_indices,
                pool,
                task.num_vms,
                d.processors_per_vm,
                d.memory_per_vm,
                d.storage_per_vm,
                acc,
            ),
            DeployStrategy::PackedFirstFit => select_packed_first_fit(
                &self.resource_indices,
                pool,
                task.num_vms,
                d.processors_per_vm,
                d.memory_per_vm,
                d.storage_per_vm,
                acc,
            ),
        };
        let ids = match ids {
            Some(ids) => ids,
            None => {
                network.unload(task.id, bw);
                stats.record_reject();
                debug!("task {} rejected: vRM strategy found no placement", task.id);
                return false;
            }
        };

        for &rid in &ids {
            pool[rid as usize].deploy(task.id, d.processors_per_vm, d.memory_per_vm, d.storage_per_vm, acc);
        }
        task.attach_resources(ids.clone());
        self.queue.push(task.id);
        stats.record_accept();
        debug!("task {} accepted on vRM servers {:?}", task.id, ids);

        let n = task.num_vms as f64;
        let (du_p, du_a) = (-(n * d.processors_per_vm as f64), -(n * acc as f64));
        let du_m = -(n * d.memory_per_vm as f64);
        let du_s = -(n * d.storage_per_vm as f64);
        self.node.spmsa.avail_p += du_p;
        self.node.spmsa.avail_m += du_m;
        self.node.spmsa.avail_s += du_s;
        self.node.spmsa.avail_a += du_a;
        let du = if self.node.spmsa.total_a > 0.0 { du_a } else { du_p };
        self.node.apply_deassessment(du, du_m);
        true
    }

    /// Donor side of Improved SOSM migration (spec.md §4.8). Moves whole
    /// movable resources out of this vRM, in index order, until `deficit`
    /// is closed or movable resources run out. Bookkeeping only: the
    /// `Resource` objects are untouched, only which vRM owns them changes.
    /// A resource's full *total* capacity (not its current availability)
    /// is what moves between `s_pmsa` aggregates, matching
    /// `original_source/vrm.py::obtain_resources`/`attach_resources`, which
    /// treat a migrated server as entirely fresh capacity at the recipient.
    pub fn obtain_resources(&mut self, pool: &[Resource], deficit: &mut Deficit, rng: &mut StdRng) -> Vec<u32> {
        let mut taken = Vec::new();
        let mut i = 0;
        while i < self.resource_indices.len() && !deficit.closed() {
            let idx = self.resource_indices[i];
            let r = &pool[idx as usize];
            if r.movable {
                let (tp, tm, ts, ta) = (
                    r.total_processors() as f64,
                    r.total_memory() as f64,
                    r.total_storage() as f64,
                    r.total_accelerators() as f64,
                );
                deficit.p -= tp;
                deficit.m -= tm;
                deficit.s -= ts;
                deficit.a -= ta;
                self.node.spmsa.avail_p -= tp;
                self.node.spmsa.total_p -= tp;
                self.node.spmsa.avail_m -= tm;
                self.node.spmsa.total_m -= tm;
                self.node.spmsa.avail_s -= ts;
                self.node.spmsa.total_s -= ts;
                self.node.spmsa.avail_a -= ta;
                self.node.spmsa.total_a -= ta;
                taken.push(idx);
                self.resource_indices.remove(i);
            } else {
                i += 1;
            }
        }
        if !taken.is_empty() {
            self.node.recompute_si(self.num_resources() as f64, rng);
        }
        taken
    }

    /// Reverses `obtain_resources` for a donor that must be restored after
    /// a failed migration attempt (spec.md §4.8 step 5: "revert all
    /// movement").
    pub fn return_resources(&mut self, pool: &[Resource], indices: &[u32], rng: &mut StdRng) {
        for &idx in indices {
            let r = &pool[idx as usize];
            let (tp, tm, ts, ta) = (
                r.total_processors() as f64,
                r.total_memory() as f64,
                r.total_storage() as f64,
                r.total_accelerators() as f64,
            );
            self.node.spmsa.avail_p += tp;
            self.node.spmsa.total_p += tp;
            self.node.spmsa.avail_m += tm;
            self.node.spmsa.total_m += tm;
            self.node.spmsa.avail_s += ts;
            self.node.spmsa.total_s += ts;
            self.node.spmsa.avail_a += ta;
            self.node.spmsa.total_a += ta;
            self.resource_indices.push(idx);
        }
        if !indices.is_empty() {
            self.node.recompute_si(self.num_resources() as f64, rng);
        }
    }

    /// Recipient side of migration: attaches already-obtained resources,
    /// treating each as fully available capacity (symmetric with
    /// `obtain_resources`'s donor-side accounting).
    pub fn attach_resources(&mut self, pool: &[Resource], indices: &[u32], rng: &mut StdRng) {
        self.return_resources(pool, indices, rng);
    }

    /// Current per-dimension headroom, used to compute a migration deficit
    /// against a task's whole-task demand (spec.md §4.8 step 2).
    pub fn capacity(&self) -> (f64, f64, f64, f64) {
        (
            self.node.spmsa.avail_p,
            self.node.spmsa.avail_m,
            self.node.spmsa.avail_s,
            self.node.spmsa.avail_a,
        )
    }
}

/// `(Δp, Δm, Δs, Δa)` deficits Improved SOSM closes via migration
/// (spec.md §4.8 step 2): demand minus the selected child's own capacity.
#[derive(Debug, Clone, Copy)]
pub struct Deficit {
    pub p: f64,
    pub m: f64,
    pub s: f64,
    pub a: f64,
}

impl Deficit {
    pub fn closed(&self) -> bool {
        self.p <= 0.0 && self.m <= 0.0 && self.s <= 0.0 && self.a <= 0.0
    }
}

/// Mid scheduler over a slice of a type's vRMs.
#[derive(Debug)]
pub struct PSwitch {
    pub vrm_indices: Vec<usize>,
    pub node: AssessedNode,
}

impl PSwitch {
    pub fn new(vrm_indices: Vec<usize>, weights: Vec<f64>, params: AssessmentParams, poll_interval: u64) -> Self {
        PSwitch { vrm_indices, node: AssessedNode::new(weights, params, poll_interval) }
    }

    /// Copies `s_pmsa`/`si` aggregated from children, gated by its own poll
    /// interval (spec.md §4.6). Must run after `Vrm::update_state_info`.
    pub fn update_state_info(&mut self, t: u64, vrms: &[Vrm], rng: &mut StdRng) {
        if !self.node.due(t) {
            return;
        }
        let mut agg = Spmsa::zero();
        for &vi in &self.vrm_indices {
            agg.add(&vrms[vi].node.spmsa);
        }
        self.node.spmsa = agg;
        self.node.recompute_si(self.vrm_indices.len() as f64, rng);
    }

    /// Picks the child vRM with the largest `si` whose own availability
    /// meets the whole-task demand (smallest index wins ties), delegates,
    /// then applies this node's own deassessment delta on success.
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

        let mut best: Option<usize> = None;
        for &vi in &self.vrm_indices {
            if vrms[vi].probe(need_p, need_m, need_s, need_a) {
                match best {
                    None => best = Some(vi),
                    Some(cur) if vrms[vi].node.si > vrms[cur].node.si => best = Some(vi),
                    _ => {}
                }
            }
        }
        let vi = match best {
            Some(vi) => vi,
            None => {
                stats.record_reject();
                return false;
            }
        };

        let ok = vrms[vi].deploy(task, pool, network, stats, rng);
        if ok {
            self.node.spmsa.avail_p -= need_p;
            self.node.spmsa.avail_m -= need_m;
            self.node.spmsa.avail_s -= need_s;
            self.node.spmsa.avail_a -= need_a;
            let du = if self.node.spmsa.total_a > 0.0 { -need_a } else { -need_p };
            self.node.apply_deassessment(du, -need_m);
        }
        ok
    }
}

/// Top-of-type scheduler over all pSwitches of one hardware type. Mirrors
/// `PSwitch` exactly (spec.md §4.7).
#[derive(Debug)]
pub struct PRouter {
    pub node: AssessedNode,
}

impl PRouter {
    pub fn new(weights: Vec<f64>, params: AssessmentParams, poll_interval: u64) -> Self {
        PRouter { node: AssessedNode::new(weights, params, poll_interval) }
    }

    pub fn update_state_info(&mut self, t: u64, pswitches: &[PSwitch], rng: &mut StdRng) {
        if !self.node.due(t) {
            return;
        }
        let mut agg = Spmsa::zero();
        for ps in pswitches {
            agg.add(&ps.node.spmsa);
        }
        self.node.spmsa = agg;
        self.node.recompute_si(pswitches.len() as f64, rng);
    }

    pub fn deploy(
        &mut self,
        task: &mut Task,
        pswitches: &mut [PSwitch],
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
            if ps.node.spmsa.has_headroom(need_p, need_m, need_s, need_a) {
                match best {
                    None => best = Some(i),
                    Some(cur) if ps.node.si > pswitches[cur].node.si => best = Some(i),
                    _ => {}
                }
            }
        }
        let pi = match best {
            Some(i) => i,
            None => {
                stats.record_reject();
                return false;
            }
        };

        let ok = pswitches[pi].deploy(task, vrms, pool, network, stats, rng);
        if ok {
            self.node.spmsa.avail_p -= need_p;
            self.node.spmsa.avail_m -= need_m;
            self.node.spmsa.avail_s -= need_s;
            self.node.spmsa.avail_a -= need_a;
            let du = if self.node.spmsa.total_a > 0.0 { -need_a } else { -need_p };
            self.node.apply_deassessment(du, -need_m);
        }
        ok
    }
}

/// The full tree for one hardware type: a flat vRM arena, the pSwitches
/// that partition it, and the single pRouter over all of them.
#[derive(Debug)]
pub struct TypeHierarchy {
    pub type_id: u32,
    pub vrms: Vec<Vrm>,
    pub pswitches: Vec<PSwitch>,
    pub prouter: PRouter,
}

impl TypeHierarchy {
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

/// Cross-type selection snapshot (spec.md §3 "Broker assessment state"): a
/// `s_pmsa[t]`/`si[t]` pair per hardware type, distinct from any single
/// node's own `AssessedNode` and refreshed on the Cell Manager's own
/// schedule rather than each pRouter's. `deploy` reads this to pick which
/// type a task targets, mirroring
/// `original_source/sosm_broker.py::deploy()`'s `self.sis[type]` scan.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TypeAssessment {
    pub spmsa: Spmsa,
    pub si: f64,
}

/// Picks the `(implementation index, type id)` with the highest cached
/// `si` among `task`'s candidate types that have headroom for its whole
/// demand, or `None` if no managed candidate fits. Shared by `SosmBroker`
/// and `ImprovedSosmBroker` — both dispatch types this way, only their
/// per-type hierarchies differ.
pub(crate) fn select_best_type(task: &Task, type_assessment: &IndexMap<u32, TypeAssessment>) -> Option<(usize, u32)> {
    let d = task.demand;
    let n = task.num_vms as f64;
    let (need_p, need_m, need_s) =
        (n * d.processors_per_vm as f64, n * d.memory_per_vm as f64, n * d.storage_per_vm as f64);

    let mut best: Option<(usize, u32, f64)> = None;
    for (k, &ty) in task.available_implementations().iter().enumerate() {
        let assessment = match type_assessment.get(&ty) {
            Some(a) => a,
            None => continue,
        };
        let need_a = n * task.accelerators_per_vm_at(k) as f64;
        if !assessment.spmsa.has_headroom(need_p, need_m, need_s, need_a) {
            continue;
        }
        match &best {
            None => best = Some((k, ty, assessment.si)),
            Some((_, _, cur_si)) if assessment.si > *cur_si => best = Some((k, ty, assessment.si)),
            _ => {}
        }
    }
    best.map(|(k, ty, _)| (k, ty))
}

#[derive(Debug)]
pub struct SosmBroker {
    pub types: IndexMap<u32, TypeHierarchy>,
    type_assessment: IndexMap<u32, TypeAssessment>,
    poll_interval_cell_m: u64,
    rng: StdRng,
}

impl SosmBroker {
    pub fn new(types: IndexMap<u32, TypeHierarchy>, poll_interval_cell_m: u64, rng: StdRng) -> Self {
        let type_assessment = types.keys().map(|&ty| (ty, TypeAssessment::default())).collect();
        SosmBroker { types, type_assessment, poll_interval_cell_m, rng }
    }

    /// Copies each type's pRouter aggregate into the cross-type cache,
    /// gated by `poll_interval_cell_m` independently of any pRouter's own
    /// poll interval (spec.md §5/§6 "Poll Interval Cell Manager").
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

impl Broker for SosmBroker {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::{TaskDemand, UtilizationProfile};
    use rand::SeedableRng;

    fn params() -> AssessmentParams {
        AssessmentParams { c: 1.0, p: 2.0, pi: 1.0, opt_num_of_resources: 1.0 }
    }

    fn demo_task(p: u64) -> Task {
        Task::new(
            1,
            0,
            TaskDemand { processors_per_vm: p, memory_per_vm: 1, network_bandwidth: 1, storage_per_vm: 0 },
            1,
            10.0,
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
    fn s3_tie_break_prefers_smaller_index_and_si_decreases() {
        let weights = vec![1.0, 1.0, 1.0, 1.0, 1.0];
        let mut pool = vec![
            Resource::new(1, 0, 8, 16, 1024, 0, 1.0, 1.0, 1.0, true),
            Resource::new(1, 1, 8, 16, 1024, 0, 1.0, 1.0, 1.0, true),
        ];
        let mut vrm0 = Vrm::new(vec![0], weights.clone(), params(), 1, DeployStrategy::PackedFirstFit, 1.0);
        let mut vrm1 = Vrm::new(vec![1], weights, params(), 1, DeployStrategy::PackedFirstFit, 1.0);
        let mut rng = StdRng::seed_from_u64(0);
        vrm0.update_state_info(0, &pool, &mut rng);
        vrm1.update_state_info(0, &pool, &mut rng);
        // force identical si for the tie-break check
        vrm1.node.si = vrm0.node.si;

        let mut pswitch = PSwitch::new(vec![0, 1], vec![1.0, 1.0, 1.0, 1.0, 1.0], params(), 1);
        let mut vrms = vec![vrm0, vrm1];
        pswitch.update_state_info(0, &vrms, &mut rng);
        // keep the forced tie after the aggregate refresh
        vrms[1].node.si = vrms[0].node.si;

        let si_before = vrms[0].node.si;
        let mut network = Network::new(10);
        let mut stats = Statistics::default();
        let mut t = demo_task(1);
        assert!(pswitch.deploy(&mut t, &mut vrms, &mut pool, &mut network, &mut stats, &mut rng));
        assert_eq!(t.resource_ids, vec![0]);
        assert!(vrms[0].node.si < si_before);
    }

    #[test]
    fn broker_deploy_selects_highest_si_candidate_not_first_listed() {
        let weights = vec![1.0, 1.0, 1.0, 1.0, 1.0];
        let mut resources = ResourceTable::new();
        resources.insert(1, vec![Resource::new(1, 0, 8, 16, 1024, 0, 1.0, 1.0, 1.0, true)]);
        resources.insert(2, vec![Resource::new(2, 0, 8, 16, 1024, 0, 1.0, 1.0, 1.0, true)]);

        let mut rng = StdRng::seed_from_u64(0);
        let mut types = IndexMap::new();
        for &type_id in &[1u32, 2u32] {
            let pool = resources[&type_id].clone();
            let mut vrm = Vrm::new(vec![0], weights.clone(), params(), 1, DeployStrategy::PackedFirstFit, 1.0);
            vrm.update_state_info(0, &pool, &mut rng);
            let vrms = vec![vrm];
            let mut pswitch = PSwitch::new(vec![0], weights.clone(), params(), 1);
            pswitch.update_state_info(0, &vrms, &mut rng);
            let pswitches = vec![pswitch];
            let mut prouter = PRouter::new(weights.clone(), params(), 1);
            prouter.update_state_info(0, &pswitches, &mut rng);
            types.insert(type_id, TypeHierarchy { type_id, vrms, pswitches, prouter });
        }

        let mut broker = SosmBroker::new(types, 1, StdRng::seed_from_u64(7));
        broker.update_state_info(0, &resources);
        // Force type 1's cached si far below type 2's, despite type 1
        // being listed first in the task's candidate list — under the old
        // first-match dispatch this would still pick type 1.
        broker.type_assessment.get_mut(&1).unwrap().si = -100.0;
        broker.type_assessment.get_mut(&2).unwrap().si = 100.0;

        let mut network = Network::new(10);
        let mut stats = StatsTable::new();
        let mut task = Task::new(
            1,
            0,
            TaskDemand { processors_per_vm: 1, memory_per_vm: 1, network_bandwidth: 1, storage_per_vm: 0 },
            1,
            10.0,
            UtilizationProfile {
                processor_utilization: 1.0,
                memory_utilization: 1.0,
                storage_utilization: 0.0,
                accelerator_utilization: 0.0,
            },
            vec![0, 0],
            vec![1, 2],
        );

        assert!(broker.deploy(&mut task, &mut resources, &mut network, &mut stats, &mut rng));
        assert_eq!(task.selected_type, Some(2));
    }
}
