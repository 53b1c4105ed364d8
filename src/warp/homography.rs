//! Plane-to-plane homographies from four point correspondences.
//!
//! The 8x9 linear system is the standard direct linear transform: each
//! correspondence contributes two rows, the homography is the eigenvector
//! of `AᵀA` for the smallest eigenvalue, normalized so the bottom right
//! entry is one.

use nalgebra::{Matrix3, SMatrix};

use crate::warp::Point2D;

/// Compute the 3x3 homography mapping each `source[i]` onto
/// `destination[i]`.
pub(crate) fn homography(source: &[Point2D; 4], destination: &[Point2D; 4]) -> Matrix3<f64> {
    let mut a = SMatrix::<f64, 8, 9>::zeros();

    for i in 0..4 {
        let x = source[i].x;
        let y = source[i].y;
        let xw = destination[i].x;
        let yw = destination[i].y;

        a[(2 * i, 0)] = x;
        a[(2 * i, 1)] = y;
        a[(2 * i, 2)] = 1.0;
        a[(2 * i, 6)] = -xw * x;
        a[(2 * i, 7)] = -xw * y;
        a[(2 * i, 8)] = -xw;

        a[(2 * i + 1, 3)] = x;
        a[(2 * i + 1, 4)] = y;
        a[(2 * i + 1, 5)] = 1.0;
        a[(2 * i + 1, 6)] = -yw * x;
        a[(2 * i + 1, 7)] = -yw * y;
        a[(2 * i + 1, 8)] = -yw;
    }

    let ata = a.transpose() * a;
    let eigen = ata.symmetric_eigen();

    let mut min_index = 0;
    for i in 1..9 {
        if eigen.eigenvalues[i] < eigen.eigenvalues[min_index] {
            min_index = i;
        }
    }
    let h = eigen.eigenvectors.column(min_index);

    let mut matrix = Matrix3::new(
        h[0], h[1], h[2], //
        h[3], h[4], h[5], //
        h[6], h[7], h[8],
    );
    matrix /= matrix[(2, 2)];
    matrix
}

/// Apply a homography to a point.
pub(crate) fn transform(matrix: &Matrix3<f64>, point: Point2D) -> Point2D {
    let w = matrix[(2, 0)] * point.x + matrix[(2, 1)] * point.y + matrix[(2, 2)];
    Point2D {
        x: (matrix[(0, 0)] * point.x + matrix[(0, 1)] * point.y + matrix[(0, 2)]) / w,
        y: (matrix[(1, 0)] * point.x + matrix[(1, 1)] * point.y + matrix[(1, 2)]) / w,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Point2D, b: Point2D, tolerance: f64) {
        assert!(
            (a.x - b.x).abs() < tolerance && (a.y - b.y).abs() < tolerance,
            "{:?} != {:?}",
            a,
            b
        );
    }

    #[test]
    fn identity_correspondences_give_the_identity() {
        let quad = [
            Point2D::new(0.0, 0.0),
            Point2D::new(1.0, 0.0),
            Point2D::new(0.0, 1.0),
            Point2D::new(1.0, 1.0),
        ];
        let h = homography(&quad, &quad);
        for point in quad {
            assert_close(transform(&h, point), point, 1e-9);
        }
    }

    #[test]
    fn corners_map_onto_their_destinations() {
        let source = [
            Point2D::new(0.0, 0.0),
            Point2D::new(1.0, 0.0),
            Point2D::new(0.0, 1.0),
            Point2D::new(1.0, 1.0),
        ];
        let destination = [
            Point2D::new(0.1, 0.05),
            Point2D::new(0.9, -0.02),
            Point2D::new(0.03, 1.1),
            Point2D::new(1.05, 0.95),
        ];
        let h = homography(&source, &destination);
        for (from, to) in source.iter().zip(&destination) {
            assert_close(transform(&h, *from), *to, 1e-6);
        }
    }

    #[test]
    fn interior_points_follow_an_affine_map() {
        // Pure scale and translate: the homography must act affinely on
        // interior points too
        let source = [
            Point2D::new(0.0, 0.0),
            Point2D::new(2.0, 0.0),
            Point2D::new(0.0, 2.0),
            Point2D::new(2.0, 2.0),
        ];
        let destination = [
            Point2D::new(10.0, 20.0),
            Point2D::new(14.0, 20.0),
            Point2D::new(10.0, 24.0),
            Point2D::new(14.0, 24.0),
        ];
        let h = homography(&source, &destination);
        assert_close(
            transform(&h, Point2D::new(1.0, 1.0)),
            Point2D::new(12.0, 22.0),
            1e-6,
        );
    }
}
