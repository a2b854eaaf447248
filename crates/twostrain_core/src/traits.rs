use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// Scalar type usable as a model coordinate. Covers `f32`/`f64`; everything
/// downstream converts constants through `from_f64`.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// A continuous-time vector field `dx/dt = f(t, x)`.
///
/// Implementations are pure: `eval` writes the derivative into `out` and has
/// no other effect. Defined for any real input, meaningful on the simplex.
pub trait VectorField<T: Scalar> {
    /// Dimension of the state space.
    fn dim(&self) -> usize;

    /// Evaluates the right-hand side at time `t` and state `x` into `out`.
    fn eval(&self, t: T, x: &[T], out: &mut [T]);
}

/// A fixed-step time stepper: advances `t` and `state` by one step of size
/// `h`. Adaptive control lives above this trait.
pub trait Stepper<T: Scalar> {
    fn step(&mut self, field: &impl VectorField<T>, t: &mut T, state: &mut [T], h: T);
}
