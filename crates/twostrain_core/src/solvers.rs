use crate::traits::{Scalar, Stepper, VectorField};

/// Classic Runge-Kutta 4th order stepper with preallocated stage buffers.
///
/// `trajectory::solve` drives `Dopri5`; this fixed-step path is kept as the
/// reference integrator for cross-checking the adaptive results and for
/// callers that need reproducible step placement.
pub struct RK4<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> RK4<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::zero();
        Self {
            k1: vec![z; dim],
            k2: vec![z; dim],
            k3: vec![z; dim],
            k4: vec![z; dim],
            tmp: vec![z; dim],
        }
    }
}

impl<T: Scalar> Stepper<T> for RK4<T> {
    fn step(&mut self, field: &impl VectorField<T>, t: &mut T, state: &mut [T], h: T) {
        let half = T::from_f64(0.5).unwrap();
        let sixth = T::from_f64(1.0 / 6.0).unwrap();
        let two = T::from_f64(2.0).unwrap();
        let t0 = *t;

        field.eval(t0, state, &mut self.k1);

        for i in 0..state.len() {
            self.tmp[i] = state[i] + h * half * self.k1[i];
        }
        field.eval(t0 + h * half, &self.tmp, &mut self.k2);

        for i in 0..state.len() {
            self.tmp[i] = state[i] + h * half * self.k2[i];
        }
        field.eval(t0 + h * half, &self.tmp, &mut self.k3);

        for i in 0..state.len() {
            self.tmp[i] = state[i] + h * self.k3[i];
        }
        field.eval(t0 + h, &self.tmp, &mut self.k4);

        for i in 0..state.len() {
            state[i] = state[i]
                + h * sixth * (self.k1[i] + two * self.k2[i] + two * self.k3[i] + self.k4[i]);
        }

        *t = t0 + h;
    }
}

/// Outcome of one attempted adaptive step.
#[derive(Debug, Clone, Copy)]
pub struct StepOutcome {
    /// Whether the step was accepted (state and time advanced).
    pub accepted: bool,
    /// Weighted RMS error estimate of the attempted step.
    pub error: f64,
    /// Suggested size for the next attempt.
    pub h_next: f64,
}

/// Dormand-Prince 5(4) embedded pair with step-size control.
///
/// The fifth-order solution advances the state; the embedded fourth-order
/// solution provides the local error estimate. Step sizes follow the usual
/// `0.9 * err^(-1/5)` rule, clamped to a factor in `[0.2, 5]`.
pub struct Dopri5 {
    k: [Vec<f64>; 7],
    tmp: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
}

// Butcher tableau of the Dormand-Prince 5(4) pair.
const C: [f64; 7] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];
const A2: [f64; 1] = [1.0 / 5.0];
const A3: [f64; 2] = [3.0 / 40.0, 9.0 / 40.0];
const A4: [f64; 3] = [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0];
const A5: [f64; 4] = [
    19372.0 / 6561.0,
    -25360.0 / 2187.0,
    64448.0 / 6561.0,
    -212.0 / 729.0,
];
const A6: [f64; 5] = [
    9017.0 / 3168.0,
    -355.0 / 33.0,
    46732.0 / 5247.0,
    49.0 / 176.0,
    -5103.0 / 18656.0,
];
// The last stage row doubles as the fifth-order weights (FSAL pair).
const B5: [f64; 7] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
    0.0,
];
const B4: [f64; 7] = [
    5179.0 / 57600.0,
    0.0,
    7571.0 / 16695.0,
    393.0 / 640.0,
    -92097.0 / 339200.0,
    187.0 / 2100.0,
    1.0 / 40.0,
];

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;

impl Dopri5 {
    pub fn new(dim: usize) -> Self {
        Self {
            k: std::array::from_fn(|_| vec![0.0; dim]),
            tmp: vec![0.0; dim],
            high: vec![0.0; dim],
            low: vec![0.0; dim],
        }
    }

    fn stage(&mut self, field: &impl VectorField<f64>, t: f64, state: &[f64], h: f64, s: usize) {
        let coeffs: &[f64] = match s {
            1 => &A2,
            2 => &A3,
            3 => &A4,
            4 => &A5,
            5 => &A6,
            6 => &B5[..6],
            _ => unreachable!(),
        };
        for i in 0..state.len() {
            let mut acc = 0.0;
            for (j, &a) in coeffs.iter().enumerate() {
                acc += a * self.k[j][i];
            }
            self.tmp[i] = state[i] + h * acc;
        }
        field.eval(t + C[s] * h, &self.tmp, &mut self.k[s]);
    }

    /// Attempts one step of size `h`. On acceptance, `t` and `state` are
    /// advanced to the fifth-order solution; on rejection they are left
    /// untouched and the caller retries with `h_next`.
    pub fn try_step(
        &mut self,
        field: &impl VectorField<f64>,
        t: &mut f64,
        state: &mut [f64],
        h: f64,
        rtol: f64,
        atol: f64,
    ) -> StepOutcome {
        let n = state.len();

        field.eval(*t, state, &mut self.k[0]);
        for s in 1..7 {
            self.stage(field, *t, state, h, s);
        }

        for i in 0..n {
            let mut hi = 0.0;
            let mut lo = 0.0;
            for j in 0..7 {
                hi += B5[j] * self.k[j][i];
                lo += B4[j] * self.k[j][i];
            }
            self.high[i] = state[i] + h * hi;
            self.low[i] = state[i] + h * lo;
        }

        let mut err_sq = 0.0;
        for i in 0..n {
            let scale = atol + rtol * state[i].abs().max(self.high[i].abs());
            let e = (self.high[i] - self.low[i]) / scale;
            err_sq += e * e;
        }
        let error = (err_sq / n as f64).sqrt();

        let factor = if error > 0.0 {
            (SAFETY * error.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
        } else {
            MAX_FACTOR
        };
        let accepted = error <= 1.0;

        if accepted {
            state.copy_from_slice(&self.high);
            *t += h;
        }

        StepOutcome {
            accepted,
            error,
            h_next: h * factor,
        }
    }
}
