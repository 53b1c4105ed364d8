//! The smart object warp model: a cubic Bézier control net, the affine and
//! non-affine placement quads, and the descriptor round-trip for both.
//!
//! A warp is either *normal* (one 4x4 patch) or a *quilt* (a `4 + 3k` grid
//! of adjoining patches with explicit slice positions marking the patch
//! boundaries). The placement pipeline composes two homographies (source
//! box onto the affine quad, then affine onto the non-affine quad), applies
//! them to the control net and evaluates the resulting Bézier surface on a
//! dense mesh for resampling.

use image::RgbaImage;

use crate::descriptor::{
    DescriptorField, DescriptorStructure, EnumeratedDescriptor, ListStructure,
    ObjectArrayStructure, UnitFloatsStructure,
};
use crate::error::{PsdError, Result};

mod bezier;
mod homography;

pub use bezier::{BezierSurface, QuadMesh};

/// A point in document space.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Point2D {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl Point2D {
    /// A point from its coordinates.
    pub fn new(x: f64, y: f64) -> Point2D {
        Point2D { x, y }
    }
}

/// `warpStyle` values observed in files.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum WarpStyle {
    /// `warpNone`
    None,
    /// `warpCustom`
    Custom,
}

impl WarpStyle {
    fn from_key(key: &str) -> Result<WarpStyle> {
        match key {
            "warpNone" => Ok(WarpStyle::None),
            "warpCustom" => Ok(WarpStyle::Custom),
            other => Err(PsdError::CorruptDescriptor(format!(
                "unknown warp style '{}'",
                other
            ))),
        }
    }

    fn key(self) -> &'static str {
        match self {
            WarpStyle::None => "warpNone",
            WarpStyle::Custom => "warpCustom",
        }
    }
}

/// `warpRotate` values observed in files.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum WarpRotate {
    /// `Hrzn`
    Horizontal,
    /// `Vrtc`
    Vertical,
}

impl WarpRotate {
    fn from_key(key: &str) -> Result<WarpRotate> {
        match key {
            "Hrzn" => Ok(WarpRotate::Horizontal),
            "Vrtc" => Ok(WarpRotate::Vertical),
            other => Err(PsdError::CorruptDescriptor(format!(
                "unknown warp rotation '{}'",
                other
            ))),
        }
    }

    fn key(self) -> &'static str {
        match self {
            WarpRotate::Horizontal => "Hrzn",
            WarpRotate::Vertical => "Vrtc",
        }
    }
}

/// A smart object warp.
#[derive(Debug, Clone, PartialEq)]
pub struct Warp {
    /// Control points, row-major, `u_dims * v_dims` of them
    points: Vec<Point2D>,
    u_dims: usize,
    v_dims: usize,
    style: WarpStyle,
    value: f64,
    perspective: f64,
    perspective_other: f64,
    rotate: WarpRotate,
    /// Top, left, bottom, right
    bounds: [f64; 4],
    u_order: i32,
    v_order: i32,
    /// Patch boundary positions along x
    quilt_slices_x: Vec<f64>,
    /// Patch boundary positions along y
    quilt_slices_y: Vec<f64>,
    /// In memory order: top-left, top-right, bottom-left, bottom-right
    affine: [Point2D; 4],
    non_affine: [Point2D; 4],
}

impl Warp {
    /// A warp whose control points sit on an evenly spaced grid over
    /// `[0, width] x [0, height]` and whose placement quads are the
    /// axis-aligned rectangle. Grids beyond 4x4 become quilt warps with
    /// default slice positions.
    pub fn generate_default(
        width: f64,
        height: f64,
        u_dims: usize,
        v_dims: usize,
    ) -> Result<Warp> {
        validate_dims("u", u_dims)?;
        validate_dims("v", v_dims)?;

        let mut points = Vec::with_capacity(u_dims * v_dims);
        for v in 0..v_dims {
            let y = height / (v_dims - 1) as f64 * v as f64;
            for u in 0..u_dims {
                let x = width / (u_dims - 1) as f64 * u as f64;
                points.push(Point2D::new(x, y));
            }
        }

        let rectangle = [
            Point2D::new(0.0, 0.0),
            Point2D::new(width, 0.0),
            Point2D::new(0.0, height),
            Point2D::new(width, height),
        ];

        Ok(Warp {
            points,
            u_dims,
            v_dims,
            style: WarpStyle::None,
            value: 0.0,
            perspective: 0.0,
            perspective_other: 0.0,
            rotate: WarpRotate::Horizontal,
            bounds: [0.0, 0.0, height, width],
            u_order: 4,
            v_order: 4,
            quilt_slices_x: default_slices(width, u_dims),
            quilt_slices_y: default_slices(height, v_dims),
            affine: rectangle,
            non_affine: rectangle,
        })
    }

    /// Whether this warp spans more than one patch per axis.
    pub fn is_quilt(&self) -> bool {
        self.u_dims > 4 || self.v_dims > 4
    }

    /// The control grid's columns.
    pub fn u_dims(&self) -> usize {
        self.u_dims
    }

    /// The control grid's rows.
    pub fn v_dims(&self) -> usize {
        self.v_dims
    }

    /// The control point at grid position `(u, v)`.
    pub fn point(&self, u: usize, v: usize) -> Result<Point2D> {
        self.index(u, v).map(|i| self.points[i])
    }

    /// Move the control point at grid position `(u, v)`.
    pub fn set_point(&mut self, u: usize, v: usize, point: Point2D) -> Result<()> {
        let index = self.index(u, v)?;
        self.points[index] = point;
        self.style = WarpStyle::Custom;
        Ok(())
    }

    fn index(&self, u: usize, v: usize) -> Result<usize> {
        if u >= self.u_dims || v >= self.v_dims {
            return Err(PsdError::BoundsViolation {
                what: "warp grid index",
                value: (v * self.u_dims + u) as i64,
                min: 0,
                max: (self.points.len() - 1) as i64,
            });
        }
        Ok(v * self.u_dims + u)
    }

    /// The patch boundary positions along x.
    pub fn quilt_slices_x(&self) -> &[f64] {
        &self.quilt_slices_x
    }

    /// The patch boundary positions along y.
    pub fn quilt_slices_y(&self) -> &[f64] {
        &self.quilt_slices_y
    }

    /// Whether `uOrder` / `vOrder` deviate from the 4 every observed file
    /// carries. Such warps are still round-tripped.
    pub fn has_non_standard_order(&self) -> bool {
        self.u_order != 4 || self.v_order != 4
    }

    /// The placement quad, memory order top-left, top-right, bottom-left,
    /// bottom-right.
    pub fn affine_transform(&self) -> [Point2D; 4] {
        self.affine
    }

    /// Replace the placement quad. The quad must stay a parallelogram:
    /// opposing edges are checked for matching slopes.
    pub fn set_affine_transform(&mut self, quad: [Point2D; 4]) -> Result<()> {
        validate_affine_quad(&quad)?;
        self.affine = quad;
        Ok(())
    }

    /// The perspective quad, same ordering as the affine transform.
    pub fn non_affine_transform(&self) -> [Point2D; 4] {
        self.non_affine
    }

    /// Replace the perspective quad.
    pub fn set_non_affine_transform(&mut self, quad: [Point2D; 4]) {
        self.non_affine = quad;
    }

    /// Whether the two placement quads coincide, making the perspective
    /// step a no-op.
    pub fn is_identity_transform(&self) -> bool {
        self.affine == self.non_affine
    }

    /// The control net with both placement homographies applied.
    pub fn transformed_points(&self) -> Vec<Point2D> {
        let source_quad = self.source_quad();
        let mut points = self.points.clone();

        if source_quad != self.affine {
            let to_affine = homography::homography(&source_quad, &self.affine);
            for point in &mut points {
                *point = homography::transform(&to_affine, *point);
            }
        }
        if !self.is_identity_transform() {
            let to_non_affine = homography::homography(&self.affine, &self.non_affine);
            for point in &mut points {
                *point = homography::transform(&to_non_affine, *point);
            }
        }
        points
    }

    /// The corners of the warp's bounds as a quad in memory order.
    fn source_quad(&self) -> [Point2D; 4] {
        let [top, left, bottom, right] = self.bounds;
        [
            Point2D::new(left, top),
            Point2D::new(right, top),
            Point2D::new(left, bottom),
            Point2D::new(right, bottom),
        ]
    }

    /// The transformed Bézier surface.
    pub fn surface(&self) -> BezierSurface {
        BezierSurface::new(self.transformed_points(), self.u_dims, self.v_dims)
    }

    /// Evaluate the transformed surface on a dense mesh.
    pub fn mesh(&self, u_res: usize, v_res: usize) -> QuadMesh {
        self.surface().mesh(u_res, v_res)
    }

    /// The axis-aligned box enclosing the warped surface, as
    /// `(min_x, min_y, max_x, max_y)`.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.mesh(25, 25).bbox()
    }

    /// Resample `source` through the warp into a `width x height` raster.
    ///
    /// Each mesh quad is rasterized as two triangles; pixels inside get
    /// their source position by barycentric interpolation of the quad's
    /// surface coordinates and sample the source bilinearly.
    pub fn render(&self, source: &RgbaImage, width: u32, height: u32) -> RgbaImage {
        let mesh = self.mesh(25, 25);
        let (min_x, min_y, max_x, max_y) = mesh.bbox();
        let span_x = (max_x - min_x).max(f64::EPSILON);
        let span_y = (max_y - min_y).max(f64::EPSILON);

        let to_pixel = |point: Point2D| {
            (
                (point.x - min_x) / span_x * width as f64,
                (point.y - min_y) / span_y * height as f64,
            )
        };

        let mut target = RgbaImage::new(width, height);
        for v in 0..mesh.v_res() - 1 {
            for u in 0..mesh.u_res() - 1 {
                let quad = [
                    mesh.point(u, v),
                    mesh.point(u + 1, v),
                    mesh.point(u + 1, v + 1),
                    mesh.point(u, v + 1),
                ];
                let uv = [
                    surface_uv(u, v, &mesh),
                    surface_uv(u + 1, v, &mesh),
                    surface_uv(u + 1, v + 1, &mesh),
                    surface_uv(u, v + 1, &mesh),
                ];
                let corners: Vec<(f64, f64)> = quad.iter().map(|p| to_pixel(*p)).collect();

                // Two triangles: 0-1-2 and 0-2-3
                for triangle in [[0, 1, 2], [0, 2, 3]] {
                    rasterize_triangle(
                        &mut target,
                        source,
                        [
                            corners[triangle[0]],
                            corners[triangle[1]],
                            corners[triangle[2]],
                        ],
                        [uv[triangle[0]], uv[triangle[1]], uv[triangle[2]]],
                    );
                }
            }
        }
        target
    }
}

/// The surface coordinate of a mesh vertex.
fn surface_uv(u: usize, v: usize, mesh: &QuadMesh) -> (f64, f64) {
    (
        u as f64 / (mesh.u_res() - 1) as f64,
        v as f64 / (mesh.v_res() - 1) as f64,
    )
}

/// Fill one screen-space triangle by barycentric lookup into the source.
fn rasterize_triangle(
    target: &mut RgbaImage,
    source: &RgbaImage,
    corners: [(f64, f64); 3],
    uv: [(f64, f64); 3],
) {
    let min_x = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min).floor() as i64;
    let max_x = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max).ceil() as i64;
    let min_y = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min).floor() as i64;
    let max_y = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max).ceil() as i64;

    let [a, b, c] = corners;
    let area = (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0);
    if area.abs() < f64::EPSILON {
        return;
    }

    for y in min_y.max(0)..max_y.min(i64::from(target.height())) {
        for x in min_x.max(0)..max_x.min(i64::from(target.width())) {
            let px = x as f64 + 0.5;
            let py = y as f64 + 0.5;

            let w0 = ((b.0 - px) * (c.1 - py) - (b.1 - py) * (c.0 - px)) / area;
            let w1 = ((c.0 - px) * (a.1 - py) - (c.1 - py) * (a.0 - px)) / area;
            let w2 = 1.0 - w0 - w1;
            if w0 < -1e-9 || w1 < -1e-9 || w2 < -1e-9 {
                continue;
            }

            let u = w0 * uv[0].0 + w1 * uv[1].0 + w2 * uv[2].0;
            let v = w0 * uv[0].1 + w1 * uv[1].1 + w2 * uv[2].1;
            let pixel = bilinear_sample(source, u, v);
            target.put_pixel(x as u32, y as u32, pixel);
        }
    }
}

/// Bilinearly sample a source image at normalized coordinates.
fn bilinear_sample(source: &RgbaImage, u: f64, v: f64) -> image::Rgba<u8> {
    let x = (u.clamp(0.0, 1.0) * (source.width() - 1) as f64).max(0.0);
    let y = (v.clamp(0.0, 1.0) * (source.height() - 1) as f64).max(0.0);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(source.width() - 1);
    let y1 = (y0 + 1).min(source.height() - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let mut channels = [0u8; 4];
    for (i, channel) in channels.iter_mut().enumerate() {
        let p00 = source.get_pixel(x0, y0)[i] as f64;
        let p10 = source.get_pixel(x1, y0)[i] as f64;
        let p01 = source.get_pixel(x0, y1)[i] as f64;
        let p11 = source.get_pixel(x1, y1)[i] as f64;
        let top = p00 + (p10 - p00) * fx;
        let bottom = p01 + (p11 - p01) * fx;
        *channel = (top + (bottom - top) * fy).round().clamp(0.0, 255.0) as u8;
    }
    image::Rgba(channels)
}

/// The default patch boundary positions: `-0.6`, even `dim / (n - 1)`
/// increments, `dim + 0.6`.
fn default_slices(dim: f64, dims: usize) -> Vec<f64> {
    let count = (dims - 4) / 3 + 2;
    let mut slices = Vec::with_capacity(count);
    for i in 0..count {
        if i == 0 {
            slices.push(-0.6);
        } else if i == count - 1 {
            slices.push(dim + 0.6);
        } else {
            slices.push(dim / (count - 1) as f64 * i as f64);
        }
    }
    slices
}

fn validate_dims(axis: &'static str, dims: usize) -> Result<()> {
    if dims < 4 || (dims - 4) % 3 != 0 {
        return Err(PsdError::BoundsViolation {
            what: if axis == "u" {
                "warp u dimensions (must be 4 + 3k)"
            } else {
                "warp v dimensions (must be 4 + 3k)"
            },
            value: dims as i64,
            min: 4,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Opposing edges of the affine quad must have matching slopes.
fn validate_affine_quad(quad: &[Point2D; 4]) -> Result<()> {
    // Memory order: top-left, top-right, bottom-left, bottom-right
    let top = direction(quad[0], quad[1]);
    let bottom = direction(quad[2], quad[3]);
    let left = direction(quad[0], quad[2]);
    let right = direction(quad[1], quad[3]);

    for (a, b) in [(top, bottom), (left, right)] {
        let cross = (a.0 * b.1 - a.1 * b.0).abs();
        if cross > 1e-3 {
            return Err(PsdError::CorruptDescriptor(
                "affine transform edges are not parallel".to_string(),
            ));
        }
    }
    Ok(())
}

fn direction(from: Point2D, to: Point2D) -> (f64, f64) {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let length = (dx * dx + dy * dy).sqrt().max(f64::EPSILON);
    (dx / length, dy / length)
}

// Descriptor serialization

impl Warp {
    /// Serialize into a `warp` / `quiltWarp` descriptor.
    pub(crate) fn to_descriptor(&self) -> DescriptorStructure {
        let mut descriptor = DescriptorStructure::new(if self.is_quilt() {
            "quiltWarp"
        } else {
            "warp"
        });
        self.write_common(&mut descriptor);

        if self.is_quilt() {
            descriptor.insert(
                "deformNumRows",
                DescriptorField::Integer(self.v_dims as i32),
            );
            descriptor.insert(
                "deformNumCols",
                DescriptorField::Integer(self.u_dims as i32),
            );
        }

        let mut envelope = DescriptorStructure::new("customEnvelopeWarp");
        if self.is_quilt() {
            envelope.insert(
                "quiltSliceX",
                DescriptorField::ObjectArray(slice_array("quiltSliceX", &self.quilt_slices_x)),
            );
            envelope.insert(
                "quiltSliceY",
                DescriptorField::ObjectArray(slice_array("quiltSliceY", &self.quilt_slices_y)),
            );
        }

        let mut mesh_points = ObjectArrayStructure::new(self.points.len() as u32, "rationalPoint");
        mesh_points.insert(
            "Hrzn",
            DescriptorField::UnitFloats(UnitFloatsStructure::pixels(
                self.points.iter().map(|p| p.x).collect(),
            )),
        );
        mesh_points.insert(
            "Vrtc",
            DescriptorField::UnitFloats(UnitFloatsStructure::pixels(
                self.points.iter().map(|p| p.y).collect(),
            )),
        );
        envelope.insert("meshPoints", DescriptorField::ObjectArray(mesh_points));

        descriptor.insert("customEnvelopeWarp", DescriptorField::Descriptor(envelope));
        descriptor
    }

    fn write_common(&self, descriptor: &mut DescriptorStructure) {
        descriptor.insert(
            "warpStyle",
            DescriptorField::Enumerated(EnumeratedDescriptor::new("warpStyle", self.style.key())),
        );
        descriptor.insert("warpValue", DescriptorField::Double(self.value));
        descriptor.insert(
            "warpPerspective",
            DescriptorField::Double(self.perspective),
        );
        descriptor.insert(
            "warpPerspectiveOther",
            DescriptorField::Double(self.perspective_other),
        );
        descriptor.insert(
            "warpRotate",
            DescriptorField::Enumerated(EnumeratedDescriptor::new("Ornt", self.rotate.key())),
        );

        let mut bounds = DescriptorStructure::new("classFloatRect");
        bounds.insert("Top ", DescriptorField::Double(self.bounds[0]));
        bounds.insert("Left", DescriptorField::Double(self.bounds[1]));
        bounds.insert("Btom", DescriptorField::Double(self.bounds[2]));
        bounds.insert("Rght", DescriptorField::Double(self.bounds[3]));
        descriptor.insert("bounds", DescriptorField::Descriptor(bounds));

        descriptor.insert("uOrder", DescriptorField::Integer(self.u_order));
        descriptor.insert("vOrder", DescriptorField::Integer(self.v_order));
    }

    /// Deserialize from a `warp` / `quiltWarp` descriptor.
    pub(crate) fn from_descriptor(descriptor: &DescriptorStructure) -> Result<Warp> {
        let style = match descriptor.get("warpStyle") {
            Some(DescriptorField::Enumerated(e)) => WarpStyle::from_key(&e.enum_id)?,
            _ => WarpStyle::None,
        };
        let rotate = match descriptor.get("warpRotate") {
            Some(DescriptorField::Enumerated(e)) => WarpRotate::from_key(&e.enum_id)?,
            _ => WarpRotate::Horizontal,
        };

        let bounds_descriptor = descriptor
            .get_descriptor("bounds")
            .ok_or_else(|| PsdError::CorruptDescriptor("warp without bounds".to_string()))?;
        let bounds = [
            bounds_descriptor.get_double("Top ").unwrap_or(0.0),
            bounds_descriptor.get_double("Left").unwrap_or(0.0),
            bounds_descriptor.get_double("Btom").unwrap_or(0.0),
            bounds_descriptor.get_double("Rght").unwrap_or(0.0),
        ];

        let is_quilt = descriptor.class_id == "quiltWarp";
        let (u_dims, v_dims) = if is_quilt {
            (
                descriptor.get_integer("deformNumCols").unwrap_or(4) as usize,
                descriptor.get_integer("deformNumRows").unwrap_or(4) as usize,
            )
        } else {
            (4, 4)
        };
        validate_dims("u", u_dims)?;
        validate_dims("v", v_dims)?;

        let width = bounds[3] - bounds[1];
        let height = bounds[2] - bounds[0];
        let mut warp = Warp::generate_default(width.max(1.0), height.max(1.0), u_dims, v_dims)?;
        warp.style = style;
        warp.rotate = rotate;
        warp.bounds = bounds;
        warp.value = descriptor.get_double("warpValue").unwrap_or(0.0);
        warp.perspective = descriptor.get_double("warpPerspective").unwrap_or(0.0);
        warp.perspective_other = descriptor.get_double("warpPerspectiveOther").unwrap_or(0.0);
        warp.u_order = descriptor.get_integer("uOrder").unwrap_or(4);
        warp.v_order = descriptor.get_integer("vOrder").unwrap_or(4);

        if let Some(envelope) = descriptor.get_descriptor("customEnvelopeWarp") {
            let mesh_points = envelope.get_object_array("meshPoints").ok_or_else(|| {
                PsdError::CorruptDescriptor("customEnvelopeWarp without meshPoints".to_string())
            })?;
            let horizontal = mesh_points.get_unit_floats("Hrzn").ok_or_else(|| {
                PsdError::CorruptDescriptor("meshPoints without Hrzn values".to_string())
            })?;
            let vertical = mesh_points.get_unit_floats("Vrtc").ok_or_else(|| {
                PsdError::CorruptDescriptor("meshPoints without Vrtc values".to_string())
            })?;
            if horizontal.values.len() != vertical.values.len()
                || horizontal.values.len() != u_dims * v_dims
            {
                return Err(PsdError::CorruptDescriptor(format!(
                    "mesh points hold {}x{} values for a {}x{} grid",
                    horizontal.values.len(),
                    vertical.values.len(),
                    u_dims,
                    v_dims
                )));
            }
            warp.points = horizontal
                .values
                .iter()
                .zip(&vertical.values)
                .map(|(x, y)| Point2D::new(*x, *y))
                .collect();

            if is_quilt {
                warp.quilt_slices_x = read_slices(envelope, "quiltSliceX")?;
                warp.quilt_slices_y = read_slices(envelope, "quiltSliceY")?;
            }
        }

        Ok(warp)
    }

    /// Read the placement quads from their descriptor lists, converting the
    /// disk order (top-left, top-right, bottom-right, bottom-left) into
    /// memory order (top-left, top-right, bottom-left, bottom-right).
    pub(crate) fn apply_transform_lists(
        &mut self,
        affine: &ListStructure,
        non_affine: &ListStructure,
    ) -> Result<()> {
        self.affine = quad_from_list(affine)?;
        self.non_affine = quad_from_list(non_affine)?;
        validate_affine_quad(&self.affine)?;
        Ok(())
    }
}

/// Quilt slices serialize as an object array wrapping one `UnFl` under the
/// same key.
fn slice_array(key: &str, slices: &[f64]) -> ObjectArrayStructure {
    let mut array = ObjectArrayStructure::new(slices.len() as u32, "UntF");
    array.insert(
        key,
        DescriptorField::UnitFloats(UnitFloatsStructure::pixels(slices.to_vec())),
    );
    array
}

fn read_slices(envelope: &DescriptorStructure, key: &str) -> Result<Vec<f64>> {
    let array = envelope
        .get_object_array(key)
        .and_then(|array| array.get_unit_floats(key))
        .ok_or_else(|| {
            PsdError::CorruptDescriptor(format!("quilt warp without {} slices", key))
        })?;
    Ok(array.values.clone())
}

/// Disk order is top-left, top-right, bottom-right, bottom-left; memory
/// order swaps the last two.
pub(crate) fn quad_from_list(list: &ListStructure) -> Result<[Point2D; 4]> {
    let values = list.as_doubles()?;
    if values.len() != 8 {
        return Err(PsdError::CorruptDescriptor(format!(
            "transform list holds {} values, expected 8",
            values.len()
        )));
    }
    let points: Vec<Point2D> = values
        .chunks_exact(2)
        .map(|pair| Point2D::new(pair[0], pair[1]))
        .collect();
    Ok([points[0], points[1], points[3], points[2]])
}

/// The inverse of [`quad_from_list`].
pub(crate) fn quad_to_list(quad: &[Point2D; 4]) -> ListStructure {
    let disk_order = [quad[0], quad[1], quad[3], quad[2]];
    let mut values = Vec::with_capacity(8);
    for point in disk_order {
        values.push(point.x);
        values.push(point.y);
    }
    ListStructure::from_doubles(&values)
}
