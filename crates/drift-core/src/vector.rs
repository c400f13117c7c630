use std::ops::{Add, Index, Mul, Sub};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::DIMENSIONS;

/// Fixed-length latent attribute vector of an entity.
///
/// Freshly generated and renormalized vectors have unit Euclidean norm with
/// every component in `[0, 1]`. Drift steps clip components back into
/// `[0, 1]` but do not renormalize, so an evolved vector is only
/// approximately unit length.
///
/// Equality is exact (bitwise on the components' values). Use
/// [`StateVector::approx_eq`] for tolerance comparisons.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateVector([f64; DIMENSIONS]);

impl StateVector {
    /// Wrap raw components without normalizing.
    pub fn new(components: [f64; DIMENSIONS]) -> Self {
        Self(components)
    }

    /// Wrap raw components and normalize to unit length.
    pub fn normalized(components: [f64; DIMENSIONS]) -> Self {
        Self(components).normalize()
    }

    pub fn zeros() -> Self {
        Self([0.0; DIMENSIONS])
    }

    /// Every component equal to 1/√12.
    pub fn uniform() -> Self {
        Self([1.0; DIMENSIONS]).normalize()
    }

    /// Independent uniform components in `[0, 1)`, normalized.
    pub fn random_unit(rng: &mut impl Rng) -> Self {
        let mut c = [0.0; DIMENSIONS];
        for x in &mut c {
            *x = rng.random::<f64>();
        }
        Self(c).normalize()
    }

    pub fn components(&self) -> &[f64; DIMENSIONS] {
        &self.0
    }

    pub fn to_array(self) -> [f64; DIMENSIONS] {
        self.0
    }

    pub fn dot(&self, other: &Self) -> f64 {
        self.0.iter().zip(other.0.iter()).map(|(a, b)| a * b).sum()
    }

    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Scale to unit length. A zero vector is returned unchanged.
    pub fn normalize(self) -> Self {
        let norm = self.norm();
        if norm == 0.0 {
            return self;
        }
        let mut c = self.0;
        for x in &mut c {
            *x /= norm;
        }
        Self(c)
    }

    /// Clamp every component into `[0, 1]`.
    pub fn clip01(self) -> Self {
        let mut c = self.0;
        for x in &mut c {
            *x = x.clamp(0.0, 1.0);
        }
        Self(c)
    }

    /// |⟨a,b⟩|². Symmetric; in `[0, 1]` for unit vectors.
    pub fn compatibility(&self, other: &Self) -> f64 {
        let inner = self.dot(other).abs();
        inner * inner
    }

    /// Euclidean distance.
    pub fn distance(&self, other: &Self) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }

    /// Move `t` of the way toward `other`: `self + t·(other − self)`.
    pub fn lerp(self, other: Self, t: f64) -> Self {
        self + (other - self) * t
    }

    pub fn is_unit(&self, tol: f64) -> bool {
        (self.norm() - 1.0).abs() <= tol
    }

    /// Componentwise comparison within `tol`.
    pub fn approx_eq(&self, other: &Self, tol: f64) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| (a - b).abs() <= tol)
    }

    /// Bit patterns of the components, usable as an exact-value hash key.
    pub fn to_bits(&self) -> [u64; DIMENSIONS] {
        let mut bits = [0u64; DIMENSIONS];
        for (b, x) in bits.iter_mut().zip(self.0.iter()) {
            *b = x.to_bits();
        }
        bits
    }

    /// Little-endian bytes of the components, in order.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.0.iter().flat_map(|x| x.to_le_bytes()).collect()
    }
}

impl Index<usize> for StateVector {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        &self.0[i]
    }
}

impl Add for StateVector {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        let mut c = self.0;
        for (x, y) in c.iter_mut().zip(rhs.0.iter()) {
            *x += y;
        }
        Self(c)
    }
}

impl Sub for StateVector {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        let mut c = self.0;
        for (x, y) in c.iter_mut().zip(rhs.0.iter()) {
            *x -= y;
        }
        Self(c)
    }
}

impl Mul<f64> for StateVector {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        let mut c = self.0;
        for x in &mut c {
            *x *= rhs;
        }
        Self(c)
    }
}

/// `v / ‖v‖`, or `v` unchanged when `‖v‖ = 0`.
pub fn normalize(v: StateVector) -> StateVector {
    v.normalize()
}

pub fn clip01(v: StateVector) -> StateVector {
    v.clip01()
}

pub fn compatibility(a: &StateVector, b: &StateVector) -> f64 {
    a.compatibility(b)
}
