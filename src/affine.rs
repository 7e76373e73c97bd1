//! Affine transforms applied to annotation anchor geometry.

use serde::{Deserialize, Serialize};

/// Row-major 3x4 affine transform acting on 3D anchor coordinates.
///
/// The three rows hold the linear part in columns 0..3 and the translation
/// in column 3, so `apply` computes `m * [x, y, z, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform3D {
    rows: [[f64; 4]; 3],
}

impl AffineTransform3D {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            rows: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
            ],
        }
    }

    /// Builds a transform from its row-major 3x4 matrix.
    pub fn from_rows(rows: [[f64; 4]; 3]) -> Self {
        Self { rows }
    }

    /// Pure translation by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            rows: [
                [1.0, 0.0, 0.0, dx],
                [0.0, 1.0, 0.0, dy],
                [0.0, 0.0, 1.0, dz],
            ],
        }
    }

    /// Axis-aligned scaling by `(sx, sy, sz)`.
    pub fn scaling(sx: f64, sy: f64, sz: f64) -> Self {
        Self {
            rows: [
                [sx, 0.0, 0.0, 0.0],
                [0.0, sy, 0.0, 0.0],
                [0.0, 0.0, sz, 0.0],
            ],
        }
    }

    /// Applies the transform to a point.
    pub fn apply(&self, p: [f64; 3]) -> [f64; 3] {
        let mut out = [0.0; 3];
        for (i, row) in self.rows.iter().enumerate() {
            out[i] = row[0] * p[0] + row[1] * p[1] + row[2] * p[2] + row[3];
        }
        out
    }

    /// Returns the composition `other ∘ self`, i.e. the transform that first
    /// applies `self` and then `other`.
    pub fn then(&self, other: &AffineTransform3D) -> Self {
        let a = &other.rows;
        let b = &self.rows;
        let mut rows = [[0.0; 4]; 3];
        for i in 0..3 {
            for j in 0..4 {
                rows[i][j] = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
                if j == 3 {
                    rows[i][j] += a[i][3];
                }
            }
        }
        Self { rows }
    }
}

impl Default for AffineTransform3D {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_noop() {
        let p = [1.5, -2.0, 3.25];
        assert_eq!(AffineTransform3D::identity().apply(p), p);
    }

    #[test]
    fn test_translation() {
        let t = AffineTransform3D::translation(10.0, 20.0, 30.0);
        assert_eq!(t.apply([1.0, 2.0, 3.0]), [11.0, 22.0, 33.0]);
    }

    #[test]
    fn test_scaling() {
        let s = AffineTransform3D::scaling(2.0, 3.0, 4.0);
        assert_eq!(s.apply([1.0, 1.0, 1.0]), [2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_composition_order() {
        let scale = AffineTransform3D::scaling(2.0, 2.0, 2.0);
        let shift = AffineTransform3D::translation(1.0, 0.0, 0.0);

        // Scale first, then shift: 3*2 + 1 = 7
        let scale_then_shift = scale.then(&shift);
        assert_eq!(scale_then_shift.apply([3.0, 0.0, 0.0]), [7.0, 0.0, 0.0]);

        // Shift first, then scale: (3+1)*2 = 8
        let shift_then_scale = shift.then(&scale);
        assert_eq!(shift_then_scale.apply([3.0, 0.0, 0.0]), [8.0, 0.0, 0.0]);
    }
}
