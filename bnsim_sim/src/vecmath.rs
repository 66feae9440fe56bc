// Minimal 3D vector and rotation-matrix algebra.
//
// Positions, displacements and headings are all `Vec3` in world units
// (micrometres in the bundled scenarios). `Mat3` exists for axis–angle
// rotation of headings, which motility behaviors use to perturb an agent's
// direction of travel.
//
// Normalization returns `Option` instead of silently dividing by zero: a
// zero-length vector has no direction, and the caller decides what to do
// (the shove code substitutes a deterministic tie-break direction).

use bnsim_prng::SimRng;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length_squared(self) -> f64 {
        self.dot(self)
    }

    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    pub fn distance(self, other: Self) -> f64 {
        (self - other).length()
    }

    /// Unit vector in the same direction, or `None` for a zero or
    /// non-finite vector.
    pub fn normalized(self) -> Option<Self> {
        let len = self.length();
        if len > 0.0 && len.is_finite() {
            Some(self * (1.0 / len))
        } else {
            None
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Component by axis index (0 = x, 1 = y, 2 = z).
    pub fn axis(self, axis: usize) -> f64 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    pub fn set_axis(&mut self, axis: usize, value: f64) {
        match axis {
            0 => self.x = value,
            1 => self.y = value,
            _ => self.z = value,
        }
    }

    /// A uniformly distributed random direction.
    ///
    /// Rejection-samples the unit ball so the result has no axis bias.
    pub fn random_unit(rng: &mut SimRng) -> Self {
        loop {
            let v = Self::new(
                rng.uniform(-1.0, 1.0),
                rng.uniform(-1.0, 1.0),
                rng.uniform(-1.0, 1.0),
            );
            let len_sq = v.length_squared();
            if len_sq > 1e-12 && len_sq <= 1.0 {
                return v * (1.0 / len_sq.sqrt());
            }
        }
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Vec3) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl SubAssign for Vec3 {
    fn sub_assign(&mut self, rhs: Vec3) {
        *self = *self - rhs;
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;
    fn mul(self, s: f64) -> Vec3 {
        Vec3::new(self.x * s, self.y * s, self.z * s)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

/// Row-major 3×3 matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mat3 {
    m: [[f64; 3]; 3],
}

impl Mat3 {
    /// Right-handed rotation by `angle` radians about `axis` (Rodrigues).
    ///
    /// Returns `None` when the axis has no direction.
    pub fn from_axis_angle(axis: Vec3, angle: f64) -> Option<Self> {
        let Vec3 { x, y, z } = axis.normalized()?;
        let (s, c) = angle.sin_cos();
        let omc = 1.0 - c;
        Some(Self {
            m: [
                [c + x * x * omc, x * y * omc - z * s, x * z * omc + y * s],
                [x * y * omc + z * s, c + y * y * omc, y * z * omc - x * s],
                [x * z * omc - y * s, y * z * omc + x * s, c + z * z * omc],
            ],
        })
    }

    pub fn transform(&self, v: Vec3) -> Vec3 {
        let m = &self.m;
        Vec3::new(
            m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
            m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
            m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
        )
    }
}

/// Rotate `v` by `theta` radians about a random axis perpendicular to it.
///
/// Falls back to returning `v` unchanged if no perpendicular axis can be
/// found (zero `v`).
pub fn rotate_perpendicular(v: Vec3, theta: f64, rng: &mut SimRng) -> Vec3 {
    for _ in 0..8 {
        let axis = v.cross(Vec3::random_unit(rng));
        if let Some(rot) = Mat3::from_axis_angle(axis, theta) {
            return rot.transform(v);
        }
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-9
    }

    #[test]
    fn arithmetic_operators() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(-1.0, 0.5, 2.0);
        assert_eq!(a + b, Vec3::new(0.0, 2.5, 5.0));
        assert_eq!(a - b, Vec3::new(2.0, 1.5, 1.0));
        assert_eq!(a * 2.0, Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(-a, Vec3::new(-1.0, -2.0, -3.0));
        let mut c = a;
        c += b;
        c -= b;
        assert_eq!(c, a);
    }

    #[test]
    fn cross_follows_right_hand_rule() {
        let x = Vec3::new(1.0, 0.0, 0.0);
        let y = Vec3::new(0.0, 1.0, 0.0);
        assert_eq!(x.cross(y), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(y.cross(x), Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn normalize_zero_is_none() {
        assert!(Vec3::ZERO.normalized().is_none());
        let n = Vec3::new(3.0, 0.0, 4.0).normalized().unwrap();
        assert!((n.length() - 1.0).abs() < 1e-12);
        assert!(approx(n, Vec3::new(0.6, 0.0, 0.8)));
    }

    #[test]
    fn quarter_turn_about_z() {
        let rot = Mat3::from_axis_angle(Vec3::new(0.0, 0.0, 2.0), std::f64::consts::FRAC_PI_2)
            .unwrap();
        let v = rot.transform(Vec3::new(1.0, 0.0, 0.0));
        assert!(approx(v, Vec3::new(0.0, 1.0, 0.0)));
    }

    #[test]
    fn zero_axis_has_no_rotation() {
        assert!(Mat3::from_axis_angle(Vec3::ZERO, 1.0).is_none());
    }

    #[test]
    fn perpendicular_rotation_preserves_length_and_angle() {
        let mut rng = SimRng::new(5);
        let v = Vec3::new(0.0, 0.0, 1.0);
        for _ in 0..100 {
            let r = rotate_perpendicular(v, 0.3, &mut rng);
            assert!((r.length() - 1.0).abs() < 1e-9);
            assert!((r.dot(v) - 0.3f64.cos()).abs() < 1e-9);
        }
    }

    #[test]
    fn random_unit_has_unit_length() {
        let mut rng = SimRng::new(77);
        for _ in 0..1000 {
            assert!((Vec3::random_unit(&mut rng).length() - 1.0).abs() < 1e-12);
        }
    }
}
