//! Six-component state of the integrated body.
use nalgebra::{Vector3, Vector6};
use std::ops::{Add, Mul, Sub};

/// Position (au) and velocity (au/day) packed in a single 6-vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegrationState(pub Vector6<f64>);

impl IntegrationState {
    pub fn new(position: Vector3<f64>, velocity: Vector3<f64>) -> Self {
        IntegrationState(Vector6::new(
            position.x, position.y, position.z, velocity.x, velocity.y, velocity.z,
        ))
    }

    pub fn zeros() -> Self {
        IntegrationState(Vector6::zeros())
    }

    #[inline]
    pub fn position(&self) -> Vector3<f64> {
        self.0.fixed_rows::<3>(0).into_owned()
    }

    #[inline]
    pub fn velocity(&self) -> Vector3<f64> {
        self.0.fixed_rows::<3>(3).into_owned()
    }

    /// Same position with the velocity multiplied by `direction` (±1).
    ///
    /// The integrator always advances a non-negative time variable; running backward in
    /// physical time is the same as running forward with the velocity reversed.
    pub fn oriented(&self, direction: f64) -> Self {
        IntegrationState::new(self.position(), self.velocity() * direction)
    }

    /// Largest absolute position component.
    pub fn max_abs_position(&self) -> f64 {
        self.position().amax()
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|x| x.is_finite())
    }
}

impl From<Vector6<f64>> for IntegrationState {
    fn from(v: Vector6<f64>) -> Self {
        IntegrationState(v)
    }
}

impl Add for IntegrationState {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        IntegrationState(self.0 + rhs.0)
    }
}

impl Sub for IntegrationState {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        IntegrationState(self.0 - rhs.0)
    }
}

impl Mul<f64> for IntegrationState {
    type Output = Self;
    fn mul(self, k: f64) -> Self {
        IntegrationState(self.0 * k)
    }
}

#[cfg(test)]
mod state_test {
    use super::*;

    #[test]
    fn test_parts_and_orientation() {
        let s = IntegrationState::new(Vector3::new(1.0, -2.0, 3.0), Vector3::new(0.1, 0.2, -0.3));
        assert_eq!(s.position(), Vector3::new(1.0, -2.0, 3.0));
        assert_eq!(s.max_abs_position(), 3.0);

        let b = s.oriented(-1.0);
        assert_eq!(b.position(), s.position());
        assert_eq!(b.velocity(), -s.velocity());
        assert_eq!(b.oriented(-1.0), s);
    }
}
