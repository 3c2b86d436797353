//! Explicit ODE steppers for systems represented as flat `Vec<f64>`.
//!
//! The right-hand side is an opaque callback `(t, y, dy)` that may fail; a
//! failure aborts the step and is handed back to the caller unchanged.

/// Fixed-step explicit Euler: `y += dt * f(t, y)`.
pub fn euler_step<F, E>(y: &mut [f64], t: f64, dt: f64, dy: &mut [f64], mut f: F) -> Result<(), E>
where
    F: FnMut(f64, &[f64], &mut [f64]) -> Result<(), E>,
{
    f(t, y, dy)?;
    for i in 0..y.len() {
        y[i] += dt * dy[i];
    }
    Ok(())
}

/// Workspace for allocation-free Bogacki-Shampine (RK23) steps.
///
/// `k1` holds the derivative at the start of the next step; after an accepted
/// step it is refreshed from `k4` (first-same-as-last).
pub struct Rk23Workspace {
    pub k1: Vec<f64>,
    pub k2: Vec<f64>,
    pub k3: Vec<f64>,
    pub k4: Vec<f64>,
    pub ytmp: Vec<f64>,
    pub ynew: Vec<f64>,
    k1_valid: bool,
}

impl Rk23Workspace {
    pub fn new(n: usize) -> Self {
        Self {
            k1: vec![0.0; n],
            k2: vec![0.0; n],
            k3: vec![0.0; n],
            k4: vec![0.0; n],
            ytmp: vec![0.0; n],
            ynew: vec![0.0; n],
            k1_valid: false,
        }
    }

    pub fn resize(&mut self, n: usize) {
        if self.k1.len() != n {
            self.k1.resize(n, 0.0);
            self.k2.resize(n, 0.0);
            self.k3.resize(n, 0.0);
            self.k4.resize(n, 0.0);
            self.ytmp.resize(n, 0.0);
            self.ynew.resize(n, 0.0);
            self.k1_valid = false;
        }
    }
}

/// Tolerances for the adaptive stepper.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    pub rtol: f64,
    pub atol: f64,
}

/// Outcome of one attempted adaptive step.
#[derive(Debug, Clone, Copy)]
pub struct StepReport {
    pub accepted: bool,
    /// Step size to try next.
    pub next_dt: f64,
    /// Scaled RMS error of the attempted step (<= 1 means accepted).
    pub error_norm: f64,
}

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;

/// Attempt one RK23 step of size `dt` from `(t, y)`.
///
/// On acceptance `y` is advanced in place; on rejection `y` is untouched and
/// the caller should retry with `next_dt`.
pub fn rk23_step_ws<F, E>(
    y: &mut [f64],
    t: f64,
    dt: f64,
    tol: Tolerance,
    ws: &mut Rk23Workspace,
    mut f: F,
) -> Result<StepReport, E>
where
    F: FnMut(f64, &[f64], &mut [f64]) -> Result<(), E>,
{
    let n = y.len();
    ws.resize(n);

    if !ws.k1_valid {
        f(t, y, &mut ws.k1)?;
        ws.k1_valid = true;
    }

    let (k1, k2, k3, k4, ytmp, ynew) = (
        &mut ws.k1,
        &mut ws.k2,
        &mut ws.k3,
        &mut ws.k4,
        &mut ws.ytmp,
        &mut ws.ynew,
    );

    for i in 0..n {
        ytmp[i] = y[i] + 0.5 * dt * k1[i];
    }
    f(t + 0.5 * dt, ytmp, k2)?;

    for i in 0..n {
        ytmp[i] = y[i] + 0.75 * dt * k2[i];
    }
    f(t + 0.75 * dt, ytmp, k3)?;

    for i in 0..n {
        ynew[i] = y[i] + dt * (2.0 / 9.0 * k1[i] + 1.0 / 3.0 * k2[i] + 4.0 / 9.0 * k3[i]);
    }
    f(t + dt, ynew, k4)?;

    // Difference between the third-order solution and the embedded second-order one.
    let mut sum_sq = 0.0;
    for i in 0..n {
        let err = dt * (-5.0 / 72.0 * k1[i] + 1.0 / 12.0 * k2[i] + 1.0 / 9.0 * k3[i] - 1.0 / 8.0 * k4[i]);
        let scale = tol.atol + tol.rtol * y[i].abs().max(ynew[i].abs());
        let e = err / scale;
        sum_sq += e * e;
    }
    let error_norm = if n == 0 { 0.0 } else { (sum_sq / n as f64).sqrt() };

    if !error_norm.is_finite() {
        return Ok(StepReport {
            accepted: false,
            next_dt: dt * MIN_FACTOR,
            error_norm,
        });
    }

    let factor = if error_norm == 0.0 {
        MAX_FACTOR
    } else {
        (SAFETY * error_norm.powf(-1.0 / 3.0)).clamp(MIN_FACTOR, MAX_FACTOR)
    };

    if error_norm <= 1.0 {
        y.copy_from_slice(ynew);
        std::mem::swap(k1, k4);
        Ok(StepReport {
            accepted: true,
            next_dt: dt * factor,
            error_norm,
        })
    } else {
        Ok(StepReport {
            accepted: false,
            next_dt: dt * factor.min(1.0),
            error_norm,
        })
    }
}
