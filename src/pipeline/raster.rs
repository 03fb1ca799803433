//! In-memory raster surface for the native renderer.
//!
//! The surface is an RGB pixel grid initialised to opaque white (JPEG has no
//! alpha channel, so there is nothing to composite against later). Geometry
//! arrives already in device space: the caller multiplies every point by the
//! current transformation matrix before it reaches a [`Path`].
//!
//! Filling is non-antialiased scanline conversion: a pixel is inside a shape
//! when its centre is. That keeps output deterministic and cheap, and at
//! 1.5–2× scale the stair-stepping is not visible once the JPEG encoder has
//! run.

use crate::error::RenderError;
use image::{Rgb, RgbImage};

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// 2-D affine transform in PDF row-vector convention: `[x y 1] × M`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// `self` applied first, then `other`.
    pub fn concat(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    pub fn invert(&self) -> Option<Matrix> {
        let det = self.determinant();
        if det.abs() < f32::EPSILON {
            return None;
        }
        let a = self.d / det;
        let b = -self.b / det;
        let c = -self.c / det;
        let d = self.a / det;
        Some(Matrix {
            a,
            b,
            c,
            d,
            e: -(self.e * a + self.f * c),
            f: -(self.e * b + self.f * d),
        })
    }

    /// Geometric-mean scale, used to convert line widths to device pixels.
    pub fn mean_scale(&self) -> f32 {
        self.determinant().abs().sqrt()
    }
}

/// Winding rule for fills and clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillRule {
    NonZero,
    EvenOdd,
}

/// A device-space path made of flattened subpaths.
#[derive(Debug, Clone, Default)]
pub struct Path {
    subpaths: Vec<Subpath>,
}

#[derive(Debug, Clone, Default)]
struct Subpath {
    points: Vec<(f32, f32)>,
    closed: bool,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.subpaths.iter().all(|s| s.points.is_empty())
    }

    pub fn clear(&mut self) {
        self.subpaths.clear();
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        self.subpaths.push(Subpath {
            points: vec![(x, y)],
            closed: false,
        });
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        let reopen_at = match self.subpaths.last_mut() {
            Some(sp) if !sp.closed => {
                sp.points.push((x, y));
                return;
            }
            // After `h` the current point is the start of the closed subpath.
            Some(sp) => sp.points.first().copied(),
            None => None,
        };
        match reopen_at {
            Some(start) => self.subpaths.push(Subpath {
                points: vec![start, (x, y)],
                closed: false,
            }),
            None => self.move_to(x, y),
        }
    }

    /// Flatten a cubic Bézier from the current point.
    pub fn curve_to(&mut self, c1: (f32, f32), c2: (f32, f32), end: (f32, f32)) {
        let Some(start) = self.current_point() else {
            self.move_to(end.0, end.1);
            return;
        };
        let hull = dist(start, c1) + dist(c1, c2) + dist(c2, end);
        let steps = ((hull / 4.0).ceil() as usize).clamp(2, 64);
        for i in 1..=steps {
            let t = i as f32 / steps as f32;
            let mt = 1.0 - t;
            let x = mt * mt * mt * start.0
                + 3.0 * mt * mt * t * c1.0
                + 3.0 * mt * t * t * c2.0
                + t * t * t * end.0;
            let y = mt * mt * mt * start.1
                + 3.0 * mt * mt * t * c1.1
                + 3.0 * mt * t * t * c2.1
                + t * t * t * end.1;
            self.line_to(x, y);
        }
    }

    pub fn close(&mut self) {
        if let Some(sp) = self.subpaths.last_mut() {
            sp.closed = true;
        }
    }

    pub fn current_point(&self) -> Option<(f32, f32)> {
        self.subpaths.last().and_then(|sp| {
            if sp.closed {
                sp.points.first().copied()
            } else {
                sp.points.last().copied()
            }
        })
    }

    /// Append a closed polygon.
    pub fn polygon(&mut self, points: &[(f32, f32)]) {
        if points.is_empty() {
            return;
        }
        self.subpaths.push(Subpath {
            points: points.to_vec(),
            closed: true,
        });
    }

    /// Edges for filling: every subpath is implicitly closed.
    fn fill_edges(&self) -> Vec<Edge> {
        let mut edges = Vec::new();
        for sp in &self.subpaths {
            let n = sp.points.len();
            if n < 2 {
                continue;
            }
            for i in 0..n {
                let p0 = sp.points[i];
                let p1 = sp.points[(i + 1) % n];
                if let Some(e) = Edge::new(p0, p1) {
                    edges.push(e);
                }
            }
        }
        edges
    }

    /// Outline of the stroke as a union of per-segment quads.
    ///
    /// Joins and caps are not modelled; at raster resolution the quads of
    /// adjacent segments overlap enough to hide the seams.
    pub fn stroke_outline(&self, width: f32) -> Path {
        let half = width.max(1.0) / 2.0;
        let mut out = Path::new();
        for sp in &self.subpaths {
            let n = sp.points.len();
            let segments = if sp.closed { n } else { n.saturating_sub(1) };
            for i in 0..segments {
                let p0 = sp.points[i];
                let p1 = sp.points[(i + 1) % n];
                let len = dist(p0, p1);
                if len < f32::EPSILON {
                    // Zero-length segment: a dot the size of the pen.
                    out.polygon(&[
                        (p0.0 - half, p0.1 - half),
                        (p0.0 + half, p0.1 - half),
                        (p0.0 + half, p0.1 + half),
                        (p0.0 - half, p0.1 + half),
                    ]);
                    continue;
                }
                let nx = -(p1.1 - p0.1) / len * half;
                let ny = (p1.0 - p0.0) / len * half;
                out.polygon(&[
                    (p0.0 + nx, p0.1 + ny),
                    (p1.0 + nx, p1.1 + ny),
                    (p1.0 - nx, p1.1 - ny),
                    (p0.0 - nx, p0.1 - ny),
                ]);
            }
        }
        out
    }
}

fn dist(p: (f32, f32), q: (f32, f32)) -> f32 {
    ((q.0 - p.0).powi(2) + (q.1 - p.1).powi(2)).sqrt()
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    winding: i32,
}

impl Edge {
    fn new(p0: (f32, f32), p1: (f32, f32)) -> Option<Self> {
        if (p0.1 - p1.1).abs() < f32::EPSILON {
            return None;
        }
        let (top, bottom, winding) = if p0.1 < p1.1 { (p0, p1, 1) } else { (p1, p0, -1) };
        Some(Edge {
            x0: top.0,
            y0: top.1,
            x1: bottom.0,
            y1: bottom.1,
            winding,
        })
    }

    fn x_at(&self, y: f32) -> f32 {
        self.x0 + (y - self.y0) * (self.x1 - self.x0) / (self.y1 - self.y0)
    }
}

/// Call `span(y, x_start, x_end)` for every run of covered pixel centres.
fn scan_spans(path: &Path, rule: FillRule, width: u32, height: u32, mut span: impl FnMut(u32, u32, u32)) {
    let edges = path.fill_edges();
    if edges.is_empty() {
        return;
    }
    let y_min = edges.iter().map(|e| e.y0).fold(f32::INFINITY, f32::min);
    let y_max = edges.iter().map(|e| e.y1).fold(f32::NEG_INFINITY, f32::max);
    let row_start = (y_min - 0.5).ceil().max(0.0) as i64;
    let row_end = ((y_max - 0.5).ceil() as i64).min(height as i64);

    let mut crossings: Vec<(f32, i32)> = Vec::new();
    for row in row_start..row_end {
        let cy = row as f32 + 0.5;
        crossings.clear();
        crossings.extend(
            edges
                .iter()
                .filter(|e| e.y0 <= cy && cy < e.y1)
                .map(|e| (e.x_at(cy), e.winding)),
        );
        crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut winding = 0;
        for pair in crossings.windows(2) {
            winding += pair[0].1;
            let inside = match rule {
                FillRule::NonZero => winding != 0,
                FillRule::EvenOdd => winding % 2 != 0,
            };
            if !inside {
                continue;
            }
            let start = (pair[0].0 - 0.5).ceil().max(0.0) as i64;
            let end = ((pair[1].0 - 0.5).ceil() as i64).min(width as i64);
            if start < end {
                span(row as u32, start as u32, end as u32);
            }
        }
    }
}

/// Per-pixel clip coverage. Shared between graphics states via `Rc`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl ClipMask {
    pub fn from_path(path: &Path, rule: FillRule, width: u32, height: u32) -> Self {
        let mut bits = vec![false; width as usize * height as usize];
        scan_spans(path, rule, width, height, |y, x0, x1| {
            let row = y as usize * width as usize;
            bits[row + x0 as usize..row + x1 as usize].fill(true);
        });
        Self {
            width,
            height,
            bits,
        }
    }

    /// Pixels covered by both masks.
    pub fn intersect(&self, other: &ClipMask) -> ClipMask {
        let bits = self
            .bits
            .iter()
            .zip(other.bits.iter())
            .map(|(a, b)| *a && *b)
            .collect();
        ClipMask {
            width: self.width,
            height: self.height,
            bits,
        }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.bits[y as usize * self.width as usize + x as usize]
    }
}

/// Paint applied by fills, strokes and image draws.
#[derive(Debug, Clone, Copy)]
pub struct Paint<'a> {
    pub alpha: f32,
    pub clip: Option<&'a ClipMask>,
}

impl Default for Paint<'_> {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            clip: None,
        }
    }
}

/// Opaque RGB pixel buffer a page is drawn into.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    image: RgbImage,
}

impl RasterSurface {
    /// Allocate a white `width × height` surface.
    ///
    /// `page` (1-indexed) is only used for the error. Fails when either edge
    /// is zero or above `max_edge`, or the allocation itself fails.
    pub fn new(width: u32, height: u32, max_edge: u32, page: usize) -> Result<Self, RenderError> {
        let too_large = || RenderError::SurfaceTooLarge {
            page,
            width,
            height,
            limit: max_edge,
        };
        if width == 0 || height == 0 || width > max_edge || height > max_edge {
            return Err(too_large());
        }
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(3))
            .ok_or_else(too_large)?;
        let mut buf: Vec<u8> = Vec::new();
        buf.try_reserve_exact(len).map_err(|_| too_large())?;
        buf.resize(len, WHITE.0[0]);
        let image = RgbImage::from_raw(width, height, buf).ok_or_else(too_large)?;
        Ok(Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgb<u8> {
        *self.image.get_pixel(x, y)
    }

    pub fn fill_path(&mut self, path: &Path, rule: FillRule, color: Rgb<u8>, paint: Paint<'_>) {
        let (w, h) = (self.width(), self.height());
        let image = &mut self.image;
        scan_spans(path, rule, w, h, |y, x0, x1| {
            for x in x0..x1 {
                if paint.clip.is_some_and(|c| !c.contains(x, y)) {
                    continue;
                }
                blend(image.get_pixel_mut(x, y), color, paint.alpha);
            }
        });
    }

    pub fn stroke_path(&mut self, path: &Path, width: f32, color: Rgb<u8>, paint: Paint<'_>) {
        let outline = path.stroke_outline(width);
        self.fill_path(&outline, FillRule::NonZero, color, paint);
    }

    /// Draw `src` so that its unit square maps to device space through `m`.
    ///
    /// Image row 0 is the top of the picture, which sits at `v = 1` in image
    /// space. Sampling is nearest-neighbour.
    pub fn draw_image(&mut self, src: &RgbImage, m: &Matrix, paint: Paint<'_>) {
        let (sw, sh) = src.dimensions();
        if sw == 0 || sh == 0 {
            return;
        }
        let Some(inv) = m.invert() else {
            return;
        };
        let corners = [m.apply(0.0, 0.0), m.apply(1.0, 0.0), m.apply(0.0, 1.0), m.apply(1.0, 1.0)];
        let min_x = corners.iter().map(|p| p.0).fold(f32::INFINITY, f32::min);
        let max_x = corners.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max);
        let min_y = corners.iter().map(|p| p.1).fold(f32::INFINITY, f32::min);
        let max_y = corners.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max);

        let x_start = (min_x - 0.5).ceil().max(0.0) as u32;
        let x_end = ((max_x - 0.5).ceil().max(0.0) as u32).min(self.width());
        let y_start = (min_y - 0.5).ceil().max(0.0) as u32;
        let y_end = ((max_y - 0.5).ceil().max(0.0) as u32).min(self.height());

        for y in y_start..y_end {
            for x in x_start..x_end {
                if paint.clip.is_some_and(|c| !c.contains(x, y)) {
                    continue;
                }
                let (u, v) = inv.apply(x as f32 + 0.5, y as f32 + 0.5);
                if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
                    continue;
                }
                let sx = ((u * sw as f32) as u32).min(sw - 1);
                let sy = (((1.0 - v) * sh as f32) as u32).min(sh - 1);
                let color = *src.get_pixel(sx, sy);
                blend(self.image.get_pixel_mut(x, y), color, paint.alpha);
            }
        }
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

fn blend(dst: &mut Rgb<u8>, src: Rgb<u8>, alpha: f32) {
    if alpha >= 1.0 {
        *dst = src;
        return;
    }
    let a = alpha.max(0.0);
    for (d, s) in dst.0.iter_mut().zip(src.0.iter()) {
        *d = (*s as f32 * a + *d as f32 * (1.0 - a)).round() as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb<u8> = Rgb([255, 0, 0]);

    fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> Path {
        let mut p = Path::new();
        p.polygon(&[(x0, y0), (x1, y0), (x1, y1), (x0, y1)]);
        p
    }

    #[test]
    fn new_surface_is_white() {
        let s = RasterSurface::new(4, 3, 100, 1).unwrap();
        assert_eq!((s.width(), s.height()), (4, 3));
        assert!(s.into_image().pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn surface_limits() {
        assert!(matches!(
            RasterSurface::new(0, 10, 100, 2),
            Err(RenderError::SurfaceTooLarge { page: 2, .. })
        ));
        assert!(RasterSurface::new(101, 10, 100, 1).is_err());
    }

    #[test]
    fn fill_rect_covers_pixel_centres() {
        let mut s = RasterSurface::new(10, 10, 100, 1).unwrap();
        s.fill_path(&rect(2.0, 2.0, 5.0, 4.0), FillRule::NonZero, RED, Paint::default());
        assert_eq!(s.pixel(2, 2), RED);
        assert_eq!(s.pixel(4, 3), RED);
        assert_eq!(s.pixel(5, 3), WHITE);
        assert_eq!(s.pixel(2, 4), WHITE);
        assert_eq!(s.pixel(1, 2), WHITE);
    }

    #[test]
    fn even_odd_leaves_hole() {
        let mut p = rect(0.0, 0.0, 10.0, 10.0);
        p.polygon(&[(3.0, 3.0), (7.0, 3.0), (7.0, 7.0), (3.0, 7.0)]);

        let mut eo = RasterSurface::new(10, 10, 100, 1).unwrap();
        eo.fill_path(&p, FillRule::EvenOdd, RED, Paint::default());
        assert_eq!(eo.pixel(5, 5), WHITE);
        assert_eq!(eo.pixel(1, 1), RED);

        let mut nz = RasterSurface::new(10, 10, 100, 1).unwrap();
        nz.fill_path(&p, FillRule::NonZero, RED, Paint::default());
        assert_eq!(nz.pixel(5, 5), RED);
    }

    #[test]
    fn clip_restricts_fill() {
        let clip = ClipMask::from_path(&rect(0.0, 0.0, 5.0, 10.0), FillRule::NonZero, 10, 10);
        let mut s = RasterSurface::new(10, 10, 100, 1).unwrap();
        s.fill_path(
            &rect(0.0, 0.0, 10.0, 10.0),
            FillRule::NonZero,
            RED,
            Paint {
                alpha: 1.0,
                clip: Some(&clip),
            },
        );
        assert_eq!(s.pixel(4, 4), RED);
        assert_eq!(s.pixel(5, 4), WHITE);
    }

    #[test]
    fn half_alpha_blends_with_white() {
        let mut s = RasterSurface::new(2, 2, 100, 1).unwrap();
        s.fill_path(
            &rect(0.0, 0.0, 2.0, 2.0),
            FillRule::NonZero,
            Rgb([0, 0, 0]),
            Paint {
                alpha: 0.5,
                clip: None,
            },
        );
        assert_eq!(s.pixel(0, 0), Rgb([128, 128, 128]));
    }

    #[test]
    fn stroke_draws_line() {
        let mut p = Path::new();
        p.move_to(0.0, 5.0);
        p.line_to(10.0, 5.0);
        let mut s = RasterSurface::new(10, 10, 100, 1).unwrap();
        s.stroke_path(&p, 2.0, RED, Paint::default());
        assert_eq!(s.pixel(5, 4), RED);
        assert_eq!(s.pixel(5, 5), RED);
        assert_eq!(s.pixel(5, 8), WHITE);
    }

    #[test]
    fn draw_image_flips_rows() {
        // 1x2 source: top row red, bottom row blue.
        let mut src = RgbImage::new(1, 2);
        src.put_pixel(0, 0, RED);
        src.put_pixel(0, 1, Rgb([0, 0, 255]));
        // Unit square → 4x4 device box with y pointing down.
        let m = Matrix::new(4.0, 0.0, 0.0, -4.0, 0.0, 4.0);
        let mut s = RasterSurface::new(4, 4, 100, 1).unwrap();
        s.draw_image(&src, &m, Paint::default());
        assert_eq!(s.pixel(0, 0), RED);
        assert_eq!(s.pixel(3, 3), Rgb([0, 0, 255]));
    }

    #[test]
    fn matrix_inverse_round_trips() {
        let m = Matrix::new(2.0, 0.5, -1.0, 3.0, 10.0, -4.0);
        let inv = m.invert().unwrap();
        let (x, y) = m.apply(3.0, 7.0);
        let (bx, by) = inv.apply(x, y);
        assert!((bx - 3.0).abs() < 1e-3 && (by - 7.0).abs() < 1e-3);
        assert!(Matrix::new(0.0, 0.0, 0.0, 0.0, 1.0, 1.0).invert().is_none());
    }

    #[test]
    fn concat_applies_left_first() {
        let scale = Matrix::new(2.0, 0.0, 0.0, 2.0, 0.0, 0.0);
        let shift = Matrix::new(1.0, 0.0, 0.0, 1.0, 5.0, 0.0);
        assert_eq!(scale.concat(&shift).apply(1.0, 1.0), (7.0, 2.0));
        assert_eq!(shift.concat(&scale).apply(1.0, 1.0), (12.0, 2.0));
    }

    #[test]
    fn curve_flattens_to_end_point() {
        let mut p = Path::new();
        p.move_to(0.0, 0.0);
        p.curve_to((0.0, 10.0), (10.0, 10.0), (10.0, 0.0));
        assert_eq!(p.current_point(), Some((10.0, 0.0)));
    }
}
