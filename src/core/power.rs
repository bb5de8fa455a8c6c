//! Device power models. `PowerModel` is a closed tagged enum rather than a
//! trait object per spec.md §9's design note — translating
//! `dslab-iaas/src/core/power_model.rs`'s `Box<dyn PowerModel>` pattern into
//! a sum type. Exact curve formulas come from
//! `original_source/power.py::model_cpu`/`model_acc`/`consumption`.

/// GWh-per-simulation-second scale factor the source applies uniformly:
/// watts * seconds -> GWh via `1e-9 / 3600`.
const GWH_PER_WATT_SECOND: f64 = 1e-9 / 3600.0;

#[derive(Debug, Clone)]
pub enum CpuCurve {
    /// model_type 0: no load-dependent curve, constant at pmin.
    Constant { pmin: f64 },
    /// model_type -1
    Linear { pmin: f64, pmax: f64 },
    /// model_type -2
    Quadratic { pmin: f64, pmax: f64 },
    /// model_type -3
    Cubic { pmin: f64, pmax: f64 },
    /// model_type -4: vertex at the midpoint of [pmin, pmax].
    CubicMidpoint { pmin: f64, pmax: f64 },
    /// model_type -5: vertex at 5/9 * pmax.
    CubicSkewed { pmin: f64, pmax: f64 },
    /// model_type 1: piecewise-linear between (bins[i], values[i]), linear
    /// extrapolation outside the range.
    PiecewiseLinear { bins: Vec<f64>, values: Vec<f64> },
    /// model_type 2: natural cubic spline, coefficients precomputed here.
    CubicSpline(CubicSpline),
    /// model_type 3: bin lookup with fixed 0.1 spacing, linear interpolation
    /// between `floor(u*10)` and the next point.
    BinLookup { values: Vec<f64> },
}

#[derive(Debug, Clone)]
pub struct CubicSpline {
    bins: Vec<f64>,
    a: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
    d: Vec<f64>,
}

impl CubicSpline {
    /// Natural cubic spline tridiagonal solve, following
    /// `power.py::_compute_cubic_spline` exactly.
    pub fn new(bins: Vec<f64>, values: Vec<f64>) -> Self {
        let n = bins.len();
        let a = values.clone();
        let mut h = vec![0.0; n.saturating_sub(1)];
        for i in 0..n.saturating_sub(1) {
            h[i] = bins[i + 1] - bins[i];
        }

        let mut s = vec![0.0; n];
        if n >= 3 {
            let mut tb = vec![0.0; n];
            let mut tc = vec![0.0; n];
            let mut rhs = vec![0.0; n];
            for i in 1..n - 1 {
                tb[i] = 2.0 * (h[i - 1] + h[i]);
                tc[i] = h[i];
                rhs[i] = 6.0 * ((a[i + 1] - a[i]) / h[i] - (a[i] - a[i - 1]) / h[i - 1]);
            }
            // Thomas algorithm over the interior rows 1..n-2, s[0]=s[n-1]=0.
            let mut cp = vec![0.0; n];
            let mut dp = vec![0.0; n];
            cp[1] = tc[1] / tb[1];
            dp[1] = rhs[1] / tb[1];
            for i in 2..n - 1 {
                let ta = h[i - 1];
                let denom = tb[i] - ta * cp[i - 1];
                cp[i] = tc[i] / denom;
                dp[i] = (rhs[i] - ta * dp[i - 1]) / denom;
            }
            s[n - 2] = dp[n - 2];
            for i in (1..n - 2).rev() {
                s[i] = dp[i] - cp[i] * s[i + 1];
            }
        }

        let mut b = vec![0.0; n.saturating_sub(1)];
        let mut c = vec![0.0; n.saturating_sub(1)];
        let mut d = vec![0.0; n.saturating_sub(1)];
        for i in 0..n.saturating_sub(1) {
            c[i] = s[i] / 2.0;
            d[i] = (s[i + 1] - s[i]) / (6.0 * h[i]);
            b[i] = (a[i + 1] - a[i]) / h[i] - h[i] * (2.0 * s[i] + s[i + 1]) / 6.0;
        }

        CubicSpline { bins, a, b, c, d }
    }

    fn eval(&self, u: f64) -> f64 {
        let n = self.bins.len();
        if n < 2 {
            return self.a.first().copied().unwrap_or(0.0);
        }
        let mut i = match self.bins.iter().position(|&b| b > u) {
            Some(0) => 0,
            Some(pos) => pos - 1,
            None => n - 2,
        };
        if i > n - 2 {
            i = n - 2;
        }
        let dx = u - self.bins[i];
        self.a[i] + dx * (self.b[i] + dx * (self.c[i] + dx * self.d[i]))
    }
}

impl CpuCurve {
    pub fn power(&self, u: f64) -> f64 {
        match self {
            CpuCurve::Constant { pmin } => *pmin,
            CpuCurve::Linear { pmin, pmax } => pmin + (pmax - pmin) * u,
            CpuCurve::Quadratic { pmin, pmax } => pmin + (pmax - pmin) * u * u,
            CpuCurve::Cubic { pmin, pmax } => pmin + (pmax - pmin) * u * u * u,
            CpuCurve::CubicMidpoint { pmin, pmax } => {
                let pmid = pmin + (pmax - pmin) / 2.0;
                cubic_vertex_poly(u, *pmin, *pmax, pmid)
            }
            CpuCurve::CubicSkewed { pmin, pmax } => {
                let pmid = 5.0 * pmax / 9.0;
                cubic_vertex_poly(u, *pmin, *pmax, pmid)
            }
            CpuCurve::PiecewiseLinear { bins, values } => piecewise_linear(bins, values, u),
            CpuCurve::CubicSpline(spline) => spline.eval(u),
            CpuCurve::BinLookup { values } => bin_lookup(values, u),
        }
    }
}

/// The shared polynomial shape behind model types -4 and -5: a cubic in `u`
/// pinned at `pmin` (u=0), `pmax` (u=1) and `pmid` (u=0.5).
fn cubic_vertex_poly(u: f64, pmin: f64, pmax: f64, pmid: f64) -> f64 {
    let t0 = 4.0 / 3.0 * pmid - pmin / 6.0 - pmax / 3.0;
    let t1 = (4.0 / 3.0 * pmid - 2.0 * pmin / 3.0 - pmax / 3.0) * u;
    let t2 = (2.0 * pmax + 2.0 * pmin - 4.0 * pmid) * u * u;
    let t3 = (4.0 / 3.0 * pmid - 7.0 / 6.0 * pmin - pmax / 3.0) * (2.0 * u - 1.0).powi(3);
    t0 + t1 + t2 + t3
}

fn piecewise_linear(bins: &[f64], values: &[f64], u: f64) -> f64 {
    let n = bins.len();
    if n == 1 {
        return values[0];
    }
    if u <= bins[0] {
        let slope = (values[1] - values[0]) / (bins[1] - bins[0]);
        return values[0] + slope * (u - bins[0]);
    }
    if u >= bins[n - 1] {
        let slope = (values[n - 1] - values[n - 2]) / (bins[n - 1] - bins[n - 2]);
        return values[n - 1] + slope * (u - bins[n - 1]);
    }
    for i in 0..n - 1 {
        if u >= bins[i] && u <= bins[i + 1] {
            let t = (u - bins[i]) / (bins[i + 1] - bins[i]);
            return values[i] + t * (values[i + 1] - values[i]);
        }
    }
    values[n - 1]
}

/// model_type 3: `ii = floor(u*10)` clamped, linear interpolation with a
/// fixed 0.1 bin width (`power.py::model_cpu`, branch 3).
fn bin_lookup(values: &[f64], u: f64) -> f64 {
    let n = values.len();
    let ii = ((u * 10.0).floor() as i64).clamp(0, (n as i64 - 2).max(0)) as usize;
    if n < 2 {
        return values.first().copied().unwrap_or(0.0);
    }
    let lo = 0.1 * ii as f64;
    let hi = 0.1 * (ii + 1) as f64;
    values[ii] + (values[ii + 1] - values[ii]) * (u - lo) / (hi - lo)
}

/// `A*pmin_acc + ρ*(pmax_acc - pmin_acc)*A` (spec.md §4.4, only accelerator
/// model type implemented by the source).
#[derive(Debug, Clone, Copy)]
pub struct AcceleratorPower {
    pub pmin: f64,
    pub pmax: f64,
    pub sleep: f64,
}

impl AcceleratorPower {
    pub fn power(&self, rho: f64, num_accelerators: u64) -> f64 {
        let a = num_accelerators as f64;
        a * self.pmin + rho * (self.pmax - self.pmin) * a
    }
}

#[derive(Debug, Clone)]
pub struct PowerModel {
    pub cpu: CpuCurve,
    pub cpu_sleep: f64,
    pub accelerator: Option<AcceleratorPower>,
}

impl PowerModel {
    /// `(P_cpu(u) + P_acc(ρ,A)) * 1e-9/3600` when active, else
    /// `(cpu_sleep + A*acc_sleep) * 1e-9/3600` (spec.md §4.4).
    pub fn consumption(&self, u: f64, rho: f64, active: bool, num_accelerators: u64) -> f64 {
        if active {
            let p_cpu = self.cpu.power(u);
            let p_acc = self
                .accelerator
                .map(|acc| acc.power(rho, num_accelerators))
                .unwrap_or(0.0);
            (p_cpu + p_acc) * GWH_PER_WATT_SECOND
        } else {
            let acc_sleep = self.accelerator.map(|acc| acc.sleep).unwrap_or(0.0);
            (self.cpu_sleep + num_accelerators as f64 * acc_sleep) * GWH_PER_WATT_SECOND
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_model_matches_s5() {
        let model = PowerModel {
            cpu: CpuCurve::Linear { pmin: 100.0, pmax: 300.0 },
            cpu_sleep: 10.0,
            accelerator: None,
        };
        let got = model.consumption(0.5, 0.0, true, 0);
        let want = (100.0 + 0.5 * 200.0) * GWH_PER_WATT_SECOND;
        assert!((got - want).abs() < 1e-15);
    }

    #[test]
    fn piecewise_linear_interpolates_between_bins() {
        let model = PowerModel {
            cpu: CpuCurve::PiecewiseLinear {
                bins: vec![0.0, 0.5, 1.0],
                values: vec![100.0, 150.0, 300.0],
            },
            cpu_sleep: 0.0,
            accelerator: None,
        };
        let got = model.consumption(0.25, 0.0, true, 0) / GWH_PER_WATT_SECOND;
        assert!((got - 125.0).abs() < 1e-9);
    }

    #[test]
    fn idle_and_max_endpoints() {
        let model = PowerModel {
            cpu: CpuCurve::Linear { pmin: 50.0, pmax: 250.0 },
            cpu_sleep: 5.0,
            accelerator: Some(AcceleratorPower { pmin: 10.0, pmax: 90.0, sleep: 1.0 }),
        };
        let idle = model.consumption(0.0, 0.0, true, 2) / GWH_PER_WATT_SECOND;
        assert!((idle - (50.0 + 2.0 * 10.0)).abs() < 1e-9);
        let maxed = model.consumption(1.0, 1.0, true, 2) / GWH_PER_WATT_SECOND;
        assert!((maxed - (250.0 + 2.0 * 90.0)).abs() < 1e-9);
    }

    #[test]
    fn inactive_uses_sleep_power() {
        let model = PowerModel {
            cpu: CpuCurve::Linear { pmin: 50.0, pmax: 250.0 },
            cpu_sleep: 5.0,
            accelerator: Some(AcceleratorPower { pmin: 10.0, pmax: 90.0, sleep: 1.0 }),
        };
        let got = model.consumption(0.8, 0.8, false, 2) / GWH_PER_WATT_SECOND;
        assert!((got - (5.0 + 2.0)).abs() < 1e-9);
    }

    #[test]
    fn cubic_spline_matches_bin_points() {
        let spline = CubicSpline::new(vec![0.0, 0.5, 1.0], vec![100.0, 150.0, 300.0]);
        assert!((spline.eval(0.0) - 100.0).abs() < 1e-9);
        assert!((spline.eval(0.5) - 150.0).abs() < 1e-9);
        assert!((spline.eval(1.0) - 300.0).abs() < 1e-6);
    }
}
