//! Assessment/suitability index machinery shared by vRM, pSwitch and
//! pRouter. Exact formulas grounded on `original_source/vrm.py`'s
//! `assess_funcs`/`deassessment_functions`/`compute_si`.

use rand::Rng;

/// `s_pmsa[0..7]` = (avail_P, total_P, avail_M, total_M, avail_S, total_S,
/// avail_A, total_A), aggregated over a node's children (spec.md §3).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Spmsa {
    pub avail_p: f64,
    pub total_p: f64,
    pub avail_m: f64,
    pub total_m: f64,
    pub avail_s: f64,
    pub total_s: f64,
    pub avail_a: f64,
    pub total_a: f64,
}

impl Spmsa {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn add(&mut self, other: &Spmsa) {
        self.avail_p += other.avail_p;
        self.total_p += other.total_p;
        self.avail_m += other.avail_m;
        self.total_m += other.total_m;
        self.avail_s += other.avail_s;
        self.total_s += other.total_s;
        self.avail_a += other.avail_a;
        self.total_a += other.total_a;
    }

    pub fn sub(&mut self, other: &Spmsa) {
        self.avail_p -= other.avail_p;
        self.total_p -= other.total_p;
        self.avail_m -= other.avail_m;
        self.total_m -= other.total_m;
        self.avail_s -= other.avail_s;
        self.total_s -= other.total_s;
        self.avail_a -= other.avail_a;
        self.total_a -= other.total_a;
    }

    /// (U, T) pair used by f0/f2/f3: accelerators if the node has any,
    /// otherwise processors (spec.md §4.5).
    fn u_t(&self) -> (f64, f64) {
        if self.total_a > 0.0 {
            (self.avail_a, self.total_a)
        } else {
            (self.avail_p, self.total_p)
        }
    }

    pub fn has_headroom(&self, p: f64, m: f64, s: f64, a: f64) -> bool {
        self.avail_p >= p && self.avail_m >= m && self.avail_s >= s && self.avail_a >= a
    }
}

/// Per-type normalization constants, fixed at init (spec.md §3).
#[derive(Debug, Clone, Copy)]
pub struct AssessmentParams {
    /// Minimum compute cost, used by f0.
    pub c: f64,
    /// Max power, used by f2.
    pub p: f64,
    /// Min power, used by f2.
    pub pi: f64,
    pub opt_num_of_resources: f64,
}

/// `f_k(s_pmsa)` for `choice` in 0..=4 (spec.md §4.5). `num_resources` feeds
/// f4's sigmoid only.
pub fn assess(choice: usize, agg: &Spmsa, params: &AssessmentParams, num_resources: f64) -> f64 {
    let (u, t) = agg.u_t();
    match choice {
        0 => {
            if t > 0.0 {
                params.c * u / t
            } else {
                0.0
            }
        }
        1 => {
            if agg.total_m > 0.0 {
                agg.avail_m / agg.total_m
            } else {
                0.0
            }
        }
        2 => {
            let denom = params.pi * u + params.p * (t - u);
            if denom != 0.0 {
                (params.pi * u) / denom
            } else {
                0.0
            }
        }
        3 => {
            if t > 0.0 {
                1.0 - 0.2 * (t - u) / t
            } else {
                0.0
            }
        }
        4 => 2.0 / (1.0 + (6.0 * (num_resources / params.opt_num_of_resources - 1.0)).exp()),
        _ => 0.0,
    }
}

/// Analytic deassessment delta for choices 0..=3, evaluated against `agg`
/// *after* the placement's demand has already been subtracted from it — the
/// source reads the post-decrement aggregate, not a pre-decrement one
/// (`original_source/vrm.py::deploy`). Choice 4 has no closed-form delta and
/// is never summed into deassessment (spec.md §4.5).
pub fn deassess(choice: usize, agg: &Spmsa, params: &AssessmentParams, du: f64, dm: f64) -> f64 {
    let (u, t) = agg.u_t();
    match choice {
        0 => {
            if t > 0.0 {
                du * params.c / t
            } else {
                0.0
            }
        }
        1 => {
            if agg.total_m > 0.0 {
                dm / agg.total_m
            } else {
                0.0
            }
        }
        2 => {
            let denom = params.p * (t - u) + params.pi * u;
            if denom != 0.0 {
                (du * params.pi * params.p * t) / (denom * denom)
            } else {
                0.0
            }
        }
        3 => {
            if t > 0.0 {
                0.2 * du / t
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// `si = Σ w_k·f_k + ε`, ε ∈ [0, 1e-4) from a seeded RNG (spec.md §4.5,
/// §9 "Random tie-break").
pub fn compute_si(
    weights: &[f64],
    agg: &Spmsa,
    params: &AssessmentParams,
    num_resources: f64,
    rng: &mut impl Rng,
) -> f64 {
    let mut si = rng.gen_range(0.0..1e-4);
    for (k, &w) in weights.iter().enumerate() {
        si += w * assess(k, agg, params, num_resources);
    }
    si
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn params() -> AssessmentParams {
        AssessmentParams { c: 1.0, p: 2.0, pi: 1.0, opt_num_of_resources: 4.0 }
    }

    #[test]
    fn f2_decreases_as_utilization_drops() {
        let full = Spmsa { avail_p: 8.0, total_p: 8.0, avail_m: 8.0, total_m: 8.0, ..Spmsa::zero() };
        let half = Spmsa { avail_p: 4.0, total_p: 8.0, avail_m: 8.0, total_m: 8.0, ..Spmsa::zero() };
        let f2_full = assess(2, &full, &params(), 1.0);
        let f2_half = assess(2, &half, &params(), 1.0);
        assert!(f2_half < f2_full);
    }

    #[test]
    fn deassessment_then_negated_reassessment_round_trips() {
        let mut agg = Spmsa { avail_p: 8.0, total_p: 8.0, avail_m: 8.0, total_m: 8.0, ..Spmsa::zero() };
        let p = params();
        let weights = [1.0, 1.0, 1.0, 1.0, 1.0];

        agg.avail_p -= 2.0;
        let mut delta = 0.0;
        for k in 0..4 {
            delta += weights[k] * deassess(k, &agg, &p, -2.0, 0.0);
        }
        agg.avail_p += 2.0;
        let mut undo = 0.0;
        for k in 0..4 {
            undo += weights[k] * deassess(k, &agg, &p, 2.0, 0.0);
        }
        assert!((delta + undo).abs() < 1e-9);
    }

    #[test]
    fn compute_si_epsilon_is_bounded() {
        let agg = Spmsa { avail_p: 8.0, total_p: 8.0, avail_m: 8.0, total_m: 8.0, ..Spmsa::zero() };
        let p = params();
        let mut rng = StdRng::seed_from_u64(0);
        let weights = [0.0, 0.0, 0.0, 0.0, 0.0];
        let si = compute_si(&weights, &agg, &p, 1.0, &mut rng);
        assert!((0.0..1e-4).contains(&si));
    }
}
