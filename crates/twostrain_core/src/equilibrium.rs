use crate::model::{StrainParams, TwoStrain, DIM};
use crate::traits::VectorField;
use anyhow::{anyhow, bail, Result};
use nalgebra::{DMatrix, Matrix2, Vector2, Vector5};
use num_complex::Complex;
use serde::{Deserialize, Serialize};

/// Closed-form coexistence prevalences `(Ia, Ib)`:
/// `(gamma/delta)(1 - delta/alpha) * M^{-1} [1, 1]` with
/// `M = [[1, kab], [kba, 1]]`.
///
/// This is an algebraic approximation of the true coexistence equilibrium
/// (exact in the slow-waning limit); `refine` computes the full root.
/// Errors when `M` is singular, i.e. `kab * kba = 1`.
pub fn endemic_pair(params: &StrainParams) -> Result<Vector2<f64>> {
    let m = Matrix2::new(1.0, params.kab, params.kba, 1.0);
    let inv = m.try_inverse().ok_or_else(|| {
        anyhow!(
            "Cross-immunity matrix is singular (kab * kba = {}).",
            params.kab * params.kba
        )
    })?;
    let scale = single_strain_prevalence(params);
    Ok(inv * Vector2::new(scale, scale))
}

/// Endemic prevalence when only one strain circulates:
/// `(gamma/delta)(1 - delta/alpha)`. Cross-immunity plays no role without a
/// second strain.
pub fn single_strain_prevalence(params: &StrainParams) -> f64 {
    params.gamma / params.delta * (1.0 - params.delta / params.alpha)
}

/// Theoretical asymptotic frequency of strain B among infections:
/// `(1 - kba) / (2 - kab - kba)`. NaN/Inf propagate when the denominator
/// vanishes (kab = kba = 1); callers plot or filter, they do not branch.
pub fn invasion_frequency(kab: f64, kba: f64) -> f64 {
    (1.0 - kba) / (2.0 - kab - kba)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NewtonSettings {
    pub max_steps: usize,
    pub damping: f64,
    pub tolerance: f64,
}

impl Default for NewtonSettings {
    fn default() -> Self {
        Self {
            max_steps: 25,
            damping: 1.0,
            tolerance: 1e-9,
        }
    }
}

/// A refined equilibrium with its local stability data.
#[derive(Debug, Clone, Serialize)]
pub struct EquilibriumReport {
    pub state: Vec<f64>,
    pub residual_norm: f64,
    pub iterations: usize,
    pub eigenvalues: Vec<Complex<f64>>,
    /// True when every eigenvalue of the Jacobian has negative real part.
    pub stable: bool,
}

/// Damped Newton refinement of an equilibrium of the two-strain field,
/// using the analytic Jacobian. The returned report carries the Jacobian
/// spectrum at the root.
pub fn refine(
    model: &TwoStrain,
    guess: &[f64],
    settings: NewtonSettings,
) -> Result<EquilibriumReport> {
    if guess.len() != DIM {
        bail!(
            "Initial guess dimension mismatch. Expected {}, got {}.",
            DIM,
            guess.len()
        );
    }
    if settings.max_steps == 0 {
        bail!("max_steps must be greater than zero.");
    }
    if settings.damping <= 0.0 {
        bail!("damping must be positive.");
    }
    if settings.tolerance <= 0.0 {
        bail!("tolerance must be positive.");
    }

    let mut state = guess.to_vec();
    let mut residual = [0.0; DIM];
    model.eval(0.0, &state, &mut residual);
    let mut residual_norm = l2_norm(&residual);
    let mut iterations = 0usize;

    loop {
        if residual_norm <= settings.tolerance {
            break;
        }
        if iterations >= settings.max_steps {
            bail!(
                "Newton refinement failed to converge in {} steps (residual = {}).",
                settings.max_steps,
                residual_norm
            );
        }

        let jacobian = model.jacobian(&state);
        let delta = jacobian
            .lu()
            .solve(&Vector5::from_row_slice(&residual))
            .ok_or_else(|| anyhow!("Jacobian is singular."))?;

        for i in 0..DIM {
            state[i] -= settings.damping * delta[i];
        }

        iterations += 1;
        model.eval(0.0, &state, &mut residual);
        residual_norm = l2_norm(&residual);
    }

    let jacobian = model.jacobian(&state);
    let spectrum = DMatrix::from_fn(DIM, DIM, |i, j| jacobian[(i, j)]).complex_eigenvalues();
    let eigenvalues: Vec<Complex<f64>> = spectrum.iter().copied().collect();
    let stable = eigenvalues.iter().all(|lambda| lambda.re < 0.0);

    Ok(EquilibriumReport {
        state,
        residual_norm,
        iterations,
        eigenvalues,
        stable,
    })
}

fn l2_norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{I_A, I_B};
    use crate::trajectory::{linspace, solve, SolveSettings};

    fn reference_params() -> StrainParams {
        StrainParams {
            alpha: 3.0,
            gamma: 0.05,
            delta: 1.0,
            kab: 0.8,
            kba: 0.65,
        }
    }

    /// Endemic single-strain state followed by a strain-B seed of 1e-6,
    /// integrated for `horizon` time units.
    fn invaded_state(params: StrainParams, horizon: f64) -> Vec<f64> {
        let model = TwoStrain::new(params).unwrap();
        let settings = SolveSettings::default();

        let burn_in = solve(
            &model,
            &[1e-2, 0.0, 0.05, 0.0, 0.5],
            &linspace(0.0, 100.0, 300),
            settings,
        )
        .unwrap();

        let mut seeded = burn_in.last_state().to_vec();
        seeded[I_B] = 1e-6;

        solve(&model, &seeded, &linspace(0.0, horizon, 300), settings)
            .unwrap()
            .last_state()
            .to_vec()
    }

    #[test]
    fn endemic_pair_matches_hand_computed_inverse() {
        let pair = endemic_pair(&reference_params()).unwrap();
        // det M = 1 - 0.8 * 0.65 = 0.48, scale = 0.05 * (2/3)
        let scale = 0.05 * (2.0 / 3.0);
        assert!((pair[0] - scale * (1.0 - 0.8) / 0.48).abs() < 1e-12);
        assert!((pair[1] - scale * (1.0 - 0.65) / 0.48).abs() < 1e-12);
    }

    #[test]
    fn endemic_pair_rejects_singular_cross_immunity() {
        let mut p = reference_params();
        p.kab = 1.0;
        p.kba = 1.0;
        let err = endemic_pair(&p).expect_err("expected singular matrix error");
        assert!(format!("{err}").contains("singular"));
    }

    #[test]
    fn invasion_frequency_boundary_values() {
        assert_eq!(invasion_frequency(0.0, 0.0), 0.5);
        assert_eq!(invasion_frequency(1.0, 0.0), 1.0);
        assert_eq!(invasion_frequency(0.0, 1.0), 0.0);
        assert!(invasion_frequency(1.0, 1.0).is_nan());
    }

    #[test]
    fn single_strain_settles_at_closed_form_prevalence() {
        // Without a strain-B seed the B compartments stay zero and strain A
        // relaxes to (gamma/delta)(1 - delta/alpha).
        let params = reference_params();
        let model = TwoStrain::new(params).unwrap();
        let traj = solve(
            &model,
            &[1e-2, 0.0, 0.05, 0.0, 0.5],
            &linspace(0.0, 2000.0, 300),
            SolveSettings::default(),
        )
        .unwrap();

        let x = traj.last_state();
        assert_eq!(x[I_B], 0.0);
        assert!((x[I_A] - single_strain_prevalence(&params)).abs() < 1e-3);
    }

    #[test]
    fn coexistence_tracks_the_closed_form_within_tolerance() {
        let params = reference_params();
        let x = invaded_state(params, 1000.0);
        let pair = endemic_pair(&params).unwrap();

        // Reference long-run values: Ia = 0.01662, Ib = 0.02388. The closed
        // form (0.01389, 0.02431) is an approximation; 1e-2 is the contract.
        assert!((x[I_A] - pair[0]).abs() < 1e-2);
        assert!((x[I_B] - pair[1]).abs() < 1e-2);
    }

    #[test]
    fn simulated_invasion_frequency_approaches_theory() {
        let params = reference_params();
        let x = invaded_state(params, 1000.0);
        let simulated = x[I_B] / (x[I_A] + x[I_B]);
        let predicted = invasion_frequency(params.kab, params.kba);
        // Reference: simulated 0.5896 vs predicted 0.6364.
        assert!((simulated - predicted).abs() < 0.05);
    }

    #[test]
    fn symmetric_strains_without_cross_immunity_split_evenly() {
        let mut params = reference_params();
        params.kab = 0.0;
        params.kba = 0.0;
        let model = TwoStrain::new(params).unwrap();
        let traj = solve(
            &model,
            &[1e-2, 1e-2, 0.05, 0.05, 0.5],
            &linspace(0.0, 2000.0, 300),
            SolveSettings::default(),
        )
        .unwrap();

        let x = traj.last_state();
        assert!((x[I_A] - x[I_B]).abs() < 1e-9);
        assert!((x[I_A] - single_strain_prevalence(&params)).abs() < 1e-3);
    }

    #[test]
    fn refine_converges_to_a_stable_coexistence_equilibrium() {
        let params = reference_params();
        let model = TwoStrain::new(params).unwrap();
        let guess = invaded_state(params, 100.0);

        let report = refine(&model, &guess, NewtonSettings::default()).unwrap();
        assert!(report.residual_norm <= 1e-9);
        assert!(report.iterations <= 10);
        assert!(report.stable);
        assert_eq!(report.eigenvalues.len(), DIM);

        // Reference root: Ia = 0.016624, Ib = 0.023884.
        assert!((report.state[I_A] - 0.016624).abs() < 1e-4);
        assert!((report.state[I_B] - 0.023884).abs() < 1e-4);
    }

    #[test]
    fn refine_rejects_invalid_settings() {
        let model = TwoStrain::new(reference_params()).unwrap();
        let guess = [0.01; DIM];

        let mut s = NewtonSettings::default();
        s.max_steps = 0;
        assert!(refine(&model, &guess, s).is_err());

        let mut s = NewtonSettings::default();
        s.tolerance = 0.0;
        assert!(refine(&model, &guess, s).is_err());

        assert!(refine(&model, &guess[..3], NewtonSettings::default()).is_err());
    }
}
