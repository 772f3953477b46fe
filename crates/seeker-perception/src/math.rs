//! Fixed-size vector and matrix helpers.
//!
//! Only what the compass needs: 3-vectors with dot/cross products, 3×3
//! matrices, and the rotation that carries one direction onto another.
//! Everything is `f64`; the persisted calibration record is `f32`.

use std::ops::{Add, Mul, Neg, Sub};

use seeker_types::CompassCalibration;

// ────────────────────────────────────────────────────────────────────────────
// Vec3
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const Z: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 1.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_f32(v: [f32; 3]) -> Self {
        Self::new(f64::from(v[0]), f64::from(v[1]), f64::from(v[2]))
    }

    pub fn to_f32(self) -> [f32; 3] {
        [self.x as f32, self.y as f32, self.z as f32]
    }

    pub fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    pub fn cross(self, rhs: Self) -> Self {
        Self::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }

    pub fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction, or `None` for a (near) zero vector.
    pub fn normalized(self) -> Option<Self> {
        let n = self.norm();
        (n > f64::EPSILON && n.is_finite()).then(|| self * (1.0 / n))
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;
    fn mul(self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k, self.z * k)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Mat3
// ────────────────────────────────────────────────────────────────────────────

/// A row-major 3×3 matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat3 {
    pub rows: [[f64; 3]; 3],
}

impl Mat3 {
    pub fn identity() -> Self {
        Self {
            rows: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    pub fn from_f32(rows: [[f32; 3]; 3]) -> Self {
        let mut out = Self::identity();
        for (dst, src) in out.rows.iter_mut().zip(rows.iter()) {
            for (d, s) in dst.iter_mut().zip(src.iter()) {
                *d = f64::from(*s);
            }
        }
        out
    }

    pub fn to_f32(self) -> [[f32; 3]; 3] {
        self.rows.map(|row| row.map(|v| v as f32))
    }

    /// Skew-symmetric matrix `[v]×` such that `[v]× · u = v × u`.
    pub fn skew(v: Vec3) -> Self {
        Self {
            rows: [[0.0, -v.z, v.y], [v.z, 0.0, -v.x], [-v.y, v.x, 0.0]],
        }
    }

    pub fn transpose(self) -> Self {
        let r = self.rows;
        Self {
            rows: [
                [r[0][0], r[1][0], r[2][0]],
                [r[0][1], r[1][1], r[2][1]],
                [r[0][2], r[1][2], r[2][2]],
            ],
        }
    }

    pub fn mul_vec(self, v: Vec3) -> Vec3 {
        let r = self.rows;
        Vec3::new(
            r[0][0] * v.x + r[0][1] * v.y + r[0][2] * v.z,
            r[1][0] * v.x + r[1][1] * v.y + r[1][2] * v.z,
            r[2][0] * v.x + r[2][1] * v.y + r[2][2] * v.z,
        )
    }

    pub fn mul_mat(self, rhs: Self) -> Self {
        let mut out = [[0.0; 3]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..3).map(|k| self.rows[i][k] * rhs.rows[k][j]).sum();
            }
        }
        Self { rows: out }
    }

    pub fn scale(self, k: f64) -> Self {
        Self {
            rows: self.rows.map(|row| row.map(|v| v * k)),
        }
    }

    pub fn add_mat(self, rhs: Self) -> Self {
        let mut out = self.rows;
        for (dst, src) in out.iter_mut().zip(rhs.rows.iter()) {
            for (d, s) in dst.iter_mut().zip(src.iter()) {
                *d += s;
            }
        }
        Self { rows: out }
    }

    /// The rotation carrying unit direction `from` onto unit direction `to`
    /// (Rodrigues' formula).
    ///
    /// Returns `None` when either input is degenerate or the two are
    /// anti-parallel, where the rotation axis is undefined.
    pub fn rotation_between(from: Vec3, to: Vec3) -> Option<Self> {
        let a = from.normalized()?;
        let b = to.normalized()?;
        let v = a.cross(b);
        let c = a.dot(b);
        if c <= -1.0 + 1e-9 {
            return None;
        }
        let k = Self::skew(v);
        Some(
            Self::identity()
                .add_mat(k)
                .add_mat(k.mul_mat(k).scale(1.0 / (1.0 + c))),
        )
    }
}

/// `rotation * (raw - center)` for a stored calibration record.
pub fn apply_calibration(calibration: &CompassCalibration, raw: Vec3) -> Vec3 {
    Mat3::from_f32(calibration.rotation).mul_vec(raw - Vec3::from_f32(calibration.center))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).norm() < 1e-9
    }

    #[test]
    fn cross_follows_right_hand_rule() {
        let x = Vec3::new(1.0, 0.0, 0.0);
        let y = Vec3::new(0.0, 1.0, 0.0);
        assert!(close(x.cross(y), Vec3::Z));
        assert!(close(y.cross(x), -Vec3::Z));
    }

    #[test]
    fn zero_vector_has_no_direction() {
        assert!(Vec3::zero().normalized().is_none());
    }

    #[test]
    fn rotation_between_maps_source_onto_target() {
        let from = Vec3::new(0.2, -0.1, 0.9);
        let r = Mat3::rotation_between(from, Vec3::Z).unwrap();
        let mapped = r.mul_vec(from.normalized().unwrap());
        assert!(close(mapped, Vec3::Z));

        // Orthonormal: R·Rᵀ = I.
        let product = r.mul_mat(r.transpose());
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((product.rows[i][j] - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn rotation_between_parallel_is_identity() {
        let r = Mat3::rotation_between(Vec3::Z, Vec3::Z * 3.0).unwrap();
        assert_eq!(r, Mat3::identity());
    }

    #[test]
    fn rotation_between_antiparallel_is_undefined() {
        assert!(Mat3::rotation_between(-Vec3::Z, Vec3::Z).is_none());
    }

    #[test]
    fn apply_calibration_subtracts_then_rotates() {
        let cal = CompassCalibration {
            center: [10.0, 0.0, 0.0],
            rotation: [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
        };
        let out = apply_calibration(&cal, Vec3::new(11.0, 0.0, 5.0));
        assert!(close(out, Vec3::new(0.0, 1.0, 5.0)));
    }
}
