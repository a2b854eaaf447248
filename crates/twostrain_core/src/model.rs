use crate::traits::{Scalar, VectorField};
use anyhow::{bail, Result};
use nalgebra::Matrix5;
use serde::{Deserialize, Serialize};

/// State vector layout. Each entry is a population fraction:
/// infected with strain A, infected with strain B, immune to A only,
/// immune to B only, immune to both. The fully-susceptible pool
/// `1 - Ra - Rb - Rab` is derived, never stored.
pub const I_A: usize = 0;
pub const I_B: usize = 1;
pub const R_A: usize = 2;
pub const R_B: usize = 3;
pub const R_AB: usize = 4;

/// Dimension of the state space.
pub const DIM: usize = 5;

/// Rate parameters of the two-strain model.
///
/// `kab` and `kba` are the cross-immunity leakage coefficients: `kab`
/// governs how much of the protection gained from a strain-B exposure also
/// covers strain A, and vice versa. Both live in `[0, 1]` and need not be
/// equal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StrainParams {
    /// Transmission rate.
    pub alpha: f64,
    /// Immunity waning rate.
    pub gamma: f64,
    /// Recovery rate.
    pub delta: f64,
    pub kab: f64,
    pub kba: f64,
}

impl StrainParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0) {
            bail!("alpha must be positive (got {}).", self.alpha);
        }
        if !(self.gamma > 0.0) {
            bail!("gamma must be positive (got {}).", self.gamma);
        }
        if !(self.delta > 0.0) {
            bail!("delta must be positive (got {}).", self.delta);
        }
        if !(0.0..=1.0).contains(&self.kab) {
            bail!("kab must lie in [0, 1] (got {}).", self.kab);
        }
        if !(0.0..=1.0).contains(&self.kba) {
            bail!("kba must lie in [0, 1] (got {}).", self.kba);
        }
        Ok(())
    }

    /// Relabels the strains: swaps the roles of A and B.
    pub fn mirror(&self) -> Self {
        Self {
            kab: self.kba,
            kba: self.kab,
            ..*self
        }
    }
}

/// The two-strain cross-immunity vector field.
///
/// With `R0 = 1 - Ra - Rb - Rab` (the pool susceptible to both strains):
///
/// ```text
/// dIa  = alpha*(R0 + Rb)*Ia - delta*Ia
/// dIb  = alpha*(R0 + Ra)*Ib - delta*Ib
/// dRa  = alpha*(R0*(1 - kba)*Ia - Ra*Ib) - gamma*Ra
/// dRb  = alpha*(R0*(1 - kab)*Ib - Rb*Ia) - gamma*Rb
/// dRab = alpha*(R0*kab*Ib + R0*kba*Ia + Ra*Ib + Rb*Ia) - gamma*Rab
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TwoStrain {
    pub params: StrainParams,
}

impl TwoStrain {
    pub fn new(params: StrainParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Fraction of the population susceptible to both strains.
    pub fn susceptible_both(x: &[f64]) -> f64 {
        1.0 - x[R_A] - x[R_B] - x[R_AB]
    }

    /// Analytic Jacobian of the vector field at `x` (time-independent).
    pub fn jacobian(&self, x: &[f64]) -> Matrix5<f64> {
        let StrainParams {
            alpha: a,
            gamma: g,
            delta: d,
            kab,
            kba,
        } = self.params;
        let (ia, ib, ra, rb) = (x[I_A], x[I_B], x[R_A], x[R_B]);
        let r0 = Self::susceptible_both(x);

        // Rows follow the state layout; the R0 terms contribute -1 to every
        // derivative with respect to Ra, Rb, Rab.
        #[rustfmt::skip]
        let j = Matrix5::new(
            a * (r0 + rb) - d, 0.0,               -a * ia,                        0.0,                            -a * ia,
            0.0,               a * (r0 + ra) - d, 0.0,                            -a * ib,                        -a * ib,
            a * r0 * (1.0 - kba), -a * ra,        a * (-(1.0 - kba) * ia - ib) - g, -a * (1.0 - kba) * ia,        -a * (1.0 - kba) * ia,
            -a * rb,           a * r0 * (1.0 - kab), -a * (1.0 - kab) * ib,       a * (-(1.0 - kab) * ib - ia) - g, -a * (1.0 - kab) * ib,
            a * (r0 * kba + rb), a * (r0 * kab + ra), a * (ib - kab * ib - kba * ia), a * (ia - kab * ib - kba * ia), a * (-kab * ib - kba * ia) - g,
        );
        j
    }
}

impl<T: Scalar> VectorField<T> for TwoStrain {
    fn dim(&self) -> usize {
        DIM
    }

    fn eval(&self, _t: T, x: &[T], out: &mut [T]) {
        let a = T::from_f64(self.params.alpha).unwrap();
        let g = T::from_f64(self.params.gamma).unwrap();
        let d = T::from_f64(self.params.delta).unwrap();
        let kab = T::from_f64(self.params.kab).unwrap();
        let kba = T::from_f64(self.params.kba).unwrap();
        let one = T::one();

        let (ia, ib, ra, rb, rab) = (x[I_A], x[I_B], x[R_A], x[R_B], x[R_AB]);
        let r0 = one - ra - rb - rab;

        out[I_A] = a * (r0 + rb) * ia - d * ia;
        out[I_B] = a * (r0 + ra) * ib - d * ib;
        out[R_A] = a * (r0 * (one - kba) * ia - ra * ib) - g * ra;
        out[R_B] = a * (r0 * (one - kab) * ib - rb * ia) - g * rb;
        out[R_AB] = a * (r0 * kab * ib + r0 * kba * ia + ra * ib + rb * ia) - g * rab;
    }
}
