//! Cubic Bézier surface evaluation over a control net of adjoining
//! patches.
//!
//! A control net of `4 + 3k` columns holds `k + 1` patches per axis;
//! neighboring patches share their boundary column. Evaluation maps a
//! surface coordinate in `[0, 1]` to a patch plus a local parameter and
//! runs the cubic basis along both axes.

use crate::warp::Point2D;

/// A Bézier surface over an `u_dims x v_dims` control net.
#[derive(Debug, Clone)]
pub struct BezierSurface {
    points: Vec<Point2D>,
    u_dims: usize,
    v_dims: usize,
}

impl BezierSurface {
    /// Wrap a control net. The dimensions must satisfy `4 + 3k`.
    pub(crate) fn new(points: Vec<Point2D>, u_dims: usize, v_dims: usize) -> BezierSurface {
        debug_assert_eq!(points.len(), u_dims * v_dims);
        BezierSurface {
            points,
            u_dims,
            v_dims,
        }
    }

    fn point(&self, u: usize, v: usize) -> Point2D {
        self.points[v * self.u_dims + u]
    }

    /// Evaluate the surface at `(u, v)` in `[0, 1]^2`.
    pub fn evaluate(&self, u: f64, v: f64) -> Point2D {
        let (u_patch, u_t) = patch_parameter(u, (self.u_dims - 1) / 3);
        let (v_patch, v_t) = patch_parameter(v, (self.v_dims - 1) / 3);

        // Collapse the 4x4 control subgrid along u, then along v
        let mut column = [Point2D::default(); 4];
        for (row, point) in column.iter_mut().enumerate() {
            let v_index = v_patch * 3 + row;
            let controls = [
                self.point(u_patch * 3, v_index),
                self.point(u_patch * 3 + 1, v_index),
                self.point(u_patch * 3 + 2, v_index),
                self.point(u_patch * 3 + 3, v_index),
            ];
            *point = cubic(&controls, u_t);
        }
        cubic(&column, v_t)
    }

    /// Evaluate the surface on a dense grid of `u_res x v_res` vertices.
    pub fn mesh(&self, u_res: usize, v_res: usize) -> QuadMesh {
        let mut points = Vec::with_capacity(u_res * v_res);
        for v in 0..v_res {
            let v_t = v as f64 / (v_res - 1).max(1) as f64;
            for u in 0..u_res {
                let u_t = u as f64 / (u_res - 1).max(1) as f64;
                points.push(self.evaluate(u_t, v_t));
            }
        }
        QuadMesh {
            points,
            u_res,
            v_res,
        }
    }
}

/// Map a surface coordinate to a patch index and its local parameter.
fn patch_parameter(t: f64, patches: usize) -> (usize, f64) {
    let clamped = t.clamp(0.0, 1.0);
    let scaled = clamped * patches as f64;
    let patch = (scaled.floor() as usize).min(patches.saturating_sub(1));
    (patch, scaled - patch as f64)
}

/// A cubic Bézier curve at parameter `t`.
fn cubic(controls: &[Point2D; 4], t: f64) -> Point2D {
    let s = 1.0 - t;
    let b0 = s * s * s;
    let b1 = 3.0 * s * s * t;
    let b2 = 3.0 * s * t * t;
    let b3 = t * t * t;
    Point2D {
        x: b0 * controls[0].x + b1 * controls[1].x + b2 * controls[2].x + b3 * controls[3].x,
        y: b0 * controls[0].y + b1 * controls[1].y + b2 * controls[2].y + b3 * controls[3].y,
    }
}

/// A rectangular grid of surface samples.
#[derive(Debug, Clone)]
pub struct QuadMesh {
    points: Vec<Point2D>,
    u_res: usize,
    v_res: usize,
}

impl QuadMesh {
    /// The sample at grid position `(u, v)`.
    pub fn point(&self, u: usize, v: usize) -> Point2D {
        self.points[v * self.u_res + u]
    }

    /// All samples, row-major.
    pub fn points(&self) -> &[Point2D] {
        &self.points
    }

    /// The number of samples along u.
    pub fn u_res(&self) -> usize {
        self.u_res
    }

    /// The number of samples along v.
    pub fn v_res(&self) -> usize {
        self.v_res
    }

    /// The axis-aligned box enclosing every sample, as
    /// `(min_x, min_y, max_x, max_y)`.
    pub fn bbox(&self) -> (f64, f64, f64, f64) {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for point in &self.points {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }
        (min_x, min_y, max_x, max_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_grid(width: f64, height: f64, u_dims: usize, v_dims: usize) -> Vec<Point2D> {
        let mut points = Vec::new();
        for v in 0..v_dims {
            for u in 0..u_dims {
                points.push(Point2D::new(
                    width * u as f64 / (u_dims - 1) as f64,
                    height * v as f64 / (v_dims - 1) as f64,
                ));
            }
        }
        points
    }

    #[test]
    fn a_flat_patch_interpolates_linearly() {
        let surface = BezierSurface::new(flat_grid(90.0, 30.0, 4, 4), 4, 4);
        let center = surface.evaluate(0.5, 0.5);
        assert!((center.x - 45.0).abs() < 1e-9);
        assert!((center.y - 15.0).abs() < 1e-9);

        let corner = surface.evaluate(1.0, 1.0);
        assert!((corner.x - 90.0).abs() < 1e-9);
        assert!((corner.y - 30.0).abs() < 1e-9);
    }

    #[test]
    fn multi_patch_surfaces_stay_continuous_at_the_seam() {
        let surface = BezierSurface::new(flat_grid(100.0, 100.0, 7, 4), 7, 4);
        // u = 0.5 sits exactly on the seam between the two patches
        let left = surface.evaluate(0.5 - 1e-9, 0.0);
        let right = surface.evaluate(0.5 + 1e-9, 0.0);
        assert!((left.x - right.x).abs() < 1e-6);
    }

    #[test]
    fn mesh_covers_the_corners() {
        let surface = BezierSurface::new(flat_grid(10.0, 20.0, 4, 4), 4, 4);
        let mesh = surface.mesh(5, 5);
        assert_eq!(mesh.points().len(), 25);
        let (min_x, min_y, max_x, max_y) = mesh.bbox();
        assert!((min_x, min_y) == (0.0, 0.0));
        assert!((max_x - 10.0).abs() < 1e-9);
        assert!((max_y - 20.0).abs() < 1e-9);
    }

    #[test]
    fn a_lifted_control_point_bends_the_surface() {
        let mut points = flat_grid(30.0, 30.0, 4, 4);
        points[5].y -= 10.0;
        let surface = BezierSurface::new(points, 4, 4);
        let bent = surface.evaluate(0.33, 0.33);
        assert!(bent.y < 10.0);
    }
}
