//! Numerical core for a two-strain epidemic model with asymmetric
//! cross-immunity.
//!
//! The model tracks five population fractions (infected with strain A or B,
//! immune to A only, B only, or both) on the probability simplex. This crate
//! provides:
//! - **Traits**: `Scalar` (numeric type abstraction), `VectorField` (ODE
//!   right-hand sides), `Stepper` (fixed-step integrators).
//! - **Model**: the two-strain vector field and its analytic Jacobian.
//! - **Solvers**: RK4 and an adaptive Dormand-Prince 5(4) pair.
//! - **Trajectory**: integration sampled on a caller-supplied time grid.
//! - **Equilibrium**: closed-form endemic/invasion formulas plus Newton
//!   refinement with eigenvalue-based stability classification.
//! - **Sweep**: long-run strain frequency across a cross-immunity grid.

pub mod equilibrium;
pub mod model;
pub mod solvers;
pub mod sweep;
pub mod traits;
pub mod trajectory;

pub use model::{StrainParams, TwoStrain};
pub use trajectory::{solve, Trajectory};
