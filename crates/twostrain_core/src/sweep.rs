use crate::equilibrium::invasion_frequency;
use crate::model::{StrainParams, TwoStrain, DIM, I_A, I_B};
use crate::trajectory::{linspace, solve, SolveSettings};
use anyhow::{bail, Result};
use serde::Serialize;

/// Grid and horizon for a cross-immunity sweep.
#[derive(Debug, Clone, Copy)]
pub struct SweepConfig {
    /// Number of grid points per axis, evenly spaced over [0, 1].
    pub resolution: usize,
    /// Integration horizon for each cell; the frequency is read at the end.
    pub t_end: f64,
    /// Output samples per trajectory.
    pub samples: usize,
    pub settings: SolveSettings,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            resolution: 31,
            t_end: 1000.0,
            samples: 300,
            settings: SolveSettings::default(),
        }
    }
}

/// Long-run strain-B frequencies over the `(kab, kba)` grid, row-major in
/// `kab`, alongside the closed-form prediction for each cell.
#[derive(Debug, Clone, Serialize)]
pub struct FrequencyGrid {
    pub leakage: Vec<f64>,
    pub simulated: Vec<f64>,
    pub predicted: Vec<f64>,
}

impl FrequencyGrid {
    pub fn resolution(&self) -> usize {
        self.leakage.len()
    }

    pub fn simulated_at(&self, i: usize, j: usize) -> f64 {
        self.simulated[i * self.leakage.len() + j]
    }

    pub fn predicted_at(&self, i: usize, j: usize) -> f64 {
        self.predicted[i * self.leakage.len() + j]
    }
}

/// Re-integrates from a copy of `start` for every `(kab, kba)` cell and
/// records the final `Ib / (Ia + Ib)` next to `invasion_frequency`. Cells
/// are independent; `start` is never mutated.
pub fn run(params: StrainParams, start: &[f64], config: SweepConfig) -> Result<FrequencyGrid> {
    if config.resolution < 2 {
        bail!("Sweep resolution must be at least 2.");
    }
    if config.t_end <= 0.0 {
        bail!("Sweep horizon must be positive.");
    }
    if config.samples < 2 {
        bail!("At least two samples per trajectory are required.");
    }
    if start.len() != DIM {
        bail!(
            "Start state dimension mismatch. Expected {}, got {}.",
            DIM,
            start.len()
        );
    }

    let leakage = linspace(0.0, 1.0, config.resolution);
    let times = linspace(0.0, config.t_end, config.samples);
    let cells = config.resolution * config.resolution;
    let mut simulated = Vec::with_capacity(cells);
    let mut predicted = Vec::with_capacity(cells);

    for &kab in &leakage {
        for &kba in &leakage {
            let cell_params = StrainParams {
                kab,
                kba,
                ..params
            };
            let model = TwoStrain::new(cell_params)?;
            let trajectory = solve(&model, start, &times, config.settings)?;
            let x = trajectory.last_state();

            simulated.push(x[I_B] / (x[I_A] + x[I_B]));
            predicted.push(invasion_frequency(kab, kba));
        }
    }

    Ok(FrequencyGrid {
        leakage,
        simulated,
        predicted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_params() -> StrainParams {
        StrainParams {
            alpha: 3.0,
            gamma: 0.05,
            delta: 1.0,
            kab: 0.8,
            kba: 0.65,
        }
    }

    /// Endemic strain-A state with a strain-B seed, precomputed once with
    /// the reference integrator (matches the scenario start used by the CLI).
    fn seeded_start() -> Vec<f64> {
        let model = TwoStrain::new(reference_params()).unwrap();
        let burn_in = solve(
            &model,
            &[1e-2, 0.0, 0.05, 0.0, 0.5],
            &linspace(0.0, 100.0, 300),
            SolveSettings::default(),
        )
        .unwrap();
        let mut start = burn_in.last_state().to_vec();
        start[I_B] = 1e-6;
        start
    }

    #[test]
    fn run_rejects_bad_configuration() {
        let start = [0.01, 1e-6, 0.05, 0.0, 0.5];

        let mut config = SweepConfig::default();
        config.resolution = 1;
        assert!(run(reference_params(), &start, config).is_err());

        let mut config = SweepConfig::default();
        config.t_end = 0.0;
        assert!(run(reference_params(), &start, config).is_err());

        assert!(run(reference_params(), &start[..2], SweepConfig::default()).is_err());
    }

    #[test]
    fn grid_shape_and_prediction_layout_are_row_major() {
        let config = SweepConfig {
            resolution: 3,
            t_end: 50.0,
            samples: 30,
            settings: SolveSettings::default(),
        };
        let grid = run(reference_params(), &seeded_start(), config).unwrap();

        assert_eq!(grid.resolution(), 3);
        assert_eq!(grid.leakage, vec![0.0, 0.5, 1.0]);
        assert_eq!(grid.simulated.len(), 9);
        assert_eq!(grid.predicted.len(), 9);

        // Row i is kab, column j is kba.
        for (i, &kab) in grid.leakage.iter().enumerate() {
            for (j, &kba) in grid.leakage.iter().enumerate() {
                let expected = invasion_frequency(kab, kba);
                let got = grid.predicted_at(i, j);
                assert!(got == expected || (got.is_nan() && expected.is_nan()));
            }
        }
    }

    #[test]
    fn symmetric_cells_predict_an_even_split() {
        let config = SweepConfig {
            resolution: 3,
            t_end: 1000.0,
            samples: 100,
            settings: SolveSettings::default(),
        };
        let grid = run(reference_params(), &seeded_start(), config).unwrap();

        // On the kab = kba diagonal (away from the singular corner) the
        // predicted frequency is exactly 1/2 and the simulated long-run
        // frequency lands close to it.
        assert_eq!(grid.predicted_at(0, 0), 0.5);
        assert_eq!(grid.predicted_at(1, 1), 0.5);
        assert!((grid.simulated_at(1, 1) - 0.5).abs() < 0.05);
    }

    #[test]
    fn asymmetric_leakage_favors_the_better_protected_strain() {
        let config = SweepConfig {
            resolution: 3,
            t_end: 1000.0,
            samples: 100,
            settings: SolveSettings::default(),
        };
        let grid = run(reference_params(), &seeded_start(), config).unwrap();

        // kab = 1, kba = 0: immunity to A fully leaks onto B and not the
        // other way round, so strain B takes over.
        assert!(grid.predicted_at(2, 0) == 1.0);
        assert!(grid.simulated_at(2, 0) > 0.5);
        // Transposed cell: strain A keeps the advantage.
        assert!(grid.simulated_at(0, 2) < 0.5);
    }
}
