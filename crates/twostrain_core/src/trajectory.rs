use crate::solvers::Dopri5;
use crate::traits::VectorField;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Tolerances and budget for one integration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SolveSettings {
    pub rtol: f64,
    pub atol: f64,
    /// Initial trial step size.
    pub h_init: f64,
    /// Hard cap on attempted steps (accepted or rejected) per integration.
    pub max_steps: usize,
}

impl Default for SolveSettings {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-9,
            h_init: 1e-2,
            max_steps: 1_000_000,
        }
    }
}

impl SolveSettings {
    pub fn validate(&self) -> Result<()> {
        if self.rtol <= 0.0 {
            bail!("rtol must be positive.");
        }
        if self.atol <= 0.0 {
            bail!("atol must be positive.");
        }
        if self.h_init <= 0.0 {
            bail!("h_init must be positive.");
        }
        if self.max_steps == 0 {
            bail!("max_steps must be greater than zero.");
        }
        Ok(())
    }
}

/// `n` evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![start];
    }
    let step = (end - start) / (n - 1) as f64;
    (0..n).map(|k| start + step * k as f64).collect()
}

/// An ordered sequence of (time, state) samples. Immutable once computed.
#[derive(Debug, Clone, Serialize)]
pub struct Trajectory {
    times: Vec<f64>,
    states: Vec<Vec<f64>>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn state(&self, k: usize) -> &[f64] {
        &self.states[k]
    }

    pub fn last_state(&self) -> &[f64] {
        self.states.last().map(Vec::as_slice).unwrap_or(&[])
    }

    /// One coordinate of the state across all samples.
    pub fn component(&self, i: usize) -> Vec<f64> {
        self.states.iter().map(|x| x[i]).collect()
    }
}

/// Integrates `field` from `x0` and samples the solution at each requested
/// time. `times` must be strictly increasing; the first entry is the initial
/// time. Steps adapt to the tolerances in `settings` and are clamped so the
/// integration lands exactly on every output time.
pub fn solve(
    field: &impl VectorField<f64>,
    x0: &[f64],
    times: &[f64],
    settings: SolveSettings,
) -> Result<Trajectory> {
    settings.validate()?;
    if x0.len() != field.dim() {
        bail!(
            "Initial state dimension mismatch. Expected {}, got {}.",
            field.dim(),
            x0.len()
        );
    }
    if times.is_empty() {
        bail!("At least one output time is required.");
    }
    if times.windows(2).any(|w| w[1] <= w[0]) {
        bail!("Output times must be strictly increasing.");
    }

    let mut stepper = Dopri5::new(field.dim());
    let mut t = times[0];
    let mut state = x0.to_vec();
    let mut h = settings.h_init;
    let mut attempts = 0usize;

    let mut samples = Vec::with_capacity(times.len());
    samples.push(state.clone());

    for &target in &times[1..] {
        while t < target {
            let h_try = h.min(target - t);
            let outcome =
                stepper.try_step(field, &mut t, &mut state, h_try, settings.rtol, settings.atol);

            attempts += 1;
            if attempts > settings.max_steps {
                bail!(
                    "Integration exceeded the step budget of {} (t = {}).",
                    settings.max_steps,
                    t
                );
            }

            // Keep the running proposal when the attempt was merely clamped
            // to the output boundary; otherwise adopt the controller's value.
            if outcome.accepted && h_try < h {
                continue;
            }
            h = outcome.h_next;
        }
        samples.push(state.clone());
    }

    Ok(Trajectory {
        times: times.to_vec(),
        states: samples,
    })
}
