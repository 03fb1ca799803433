//! Pure-Rust decoder: lopdf for parsing, [`RasterSurface`] for pixels.
//!
//! Covers what image-heavy and form-style PDFs are made of: vector paths with
//! solid colours, clipping, constant opacity, image XObjects and nested Form
//! XObjects. Text-showing operators are not rasterised (there is no font
//! engine here); use the pdfium backend when glyphs matter.
//!
//! Page geometry follows what viewers display: the visible box is
//! CropBox ∩ MediaBox, both inheritable from parent page-tree nodes, and
//! `/Rotate` turns the page clockwise in 90° steps.

use crate::error::{DecodeError, RenderError};
use crate::pipeline::decode::{
    check_pdf_header, check_render_args, PageSize, PdfDecoder, RenderedPage, SourceDocument,
    DEFAULT_PAGE_SIZE,
};
use crate::pipeline::raster::{ClipMask, FillRule, Matrix, Paint, Path, RasterSurface};
use image::{ImageFormat, Rgb, RgbImage};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Guard against reference cycles in the page tree.
const MAX_PARENT_DEPTH: usize = 32;
/// Guard against self-referencing or absurdly nested Form XObjects.
const MAX_FORM_DEPTH: usize = 16;

/// Opens PDFs with lopdf and renders them with the built-in rasteriser.
#[derive(Debug, Clone)]
pub struct NativeDecoder {
    max_pixel_edge: u32,
}

impl NativeDecoder {
    pub fn new(max_pixel_edge: u32) -> Self {
        Self { max_pixel_edge }
    }
}

impl Default for NativeDecoder {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl PdfDecoder for NativeDecoder {
    fn name(&self) -> &'static str {
        "native"
    }

    fn open(
        &self,
        bytes: &[u8],
        password: Option<&str>,
    ) -> Result<Box<dyn SourceDocument>, DecodeError> {
        check_pdf_header(bytes)?;

        let loaded = match password {
            Some(pwd) => Document::load_mem_with_password(bytes, pwd),
            None => Document::load_mem(bytes),
        };
        let mut doc = loaded.map_err(|e| {
            let detail = e.to_string();
            let lower = detail.to_ascii_lowercase();
            if lower.contains("decrypt") || lower.contains("password") {
                if password.is_some() {
                    DecodeError::WrongPassword
                } else {
                    DecodeError::PasswordRequired
                }
            } else {
                DecodeError::Corrupt { detail }
            }
        })?;

        if doc.is_encrypted() {
            match password {
                Some(pwd) => doc.decrypt(pwd).map_err(|_| DecodeError::WrongPassword)?,
                None => return Err(DecodeError::PasswordRequired),
            }
        }

        let pages: Vec<NativePage> = doc
            .get_pages()
            .into_values()
            .map(|id| NativePage {
                id,
                geometry: PageGeometry::read(&doc, id),
            })
            .collect();
        info!("PDF loaded (native): {} pages", pages.len());

        Ok(Box::new(NativeDocument {
            doc,
            pages,
            max_pixel_edge: self.max_pixel_edge,
        }))
    }
}

struct NativeDocument {
    doc: Document,
    pages: Vec<NativePage>,
    max_pixel_edge: u32,
}

struct NativePage {
    id: ObjectId,
    geometry: PageGeometry,
}

impl SourceDocument for NativeDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, index: usize) -> Result<PageSize, RenderError> {
        self.pages
            .get(index)
            .map(|p| p.geometry.size())
            .ok_or(RenderError::PageOutOfRange {
                page: index + 1,
                total: self.pages.len(),
            })
    }

    fn render_page(&self, index: usize, scale: f32) -> Result<RenderedPage, RenderError> {
        check_render_args(index, self.pages.len(), scale)?;
        let page = &self.pages[index];
        let page_num = index + 1;
        let corrupt = |detail: String| RenderError::CorruptContent {
            page: page_num,
            detail,
        };

        let size = page.geometry.size();
        let (width, height) = size.pixel_dimensions(scale);
        let surface = RasterSurface::new(width, height, self.max_pixel_edge, page_num)?;

        let page_dict = self
            .doc
            .get_dictionary(page.id)
            .map_err(|e| corrupt(format!("page dictionary: {e}")))?;
        let content = page_content(&self.doc, page_dict).map_err(corrupt)?;
        let resources = inherited(&self.doc, page.id, b"Resources")
            .and_then(|o| resolve(&self.doc, o))
            .and_then(|o| o.as_dict().ok());

        let mut renderer = Renderer {
            doc: &self.doc,
            surface,
            page: page_num,
            forms: Vec::new(),
            skipped_text: 0,
            max_image_pixels: u64::from(self.max_pixel_edge).pow(2),
        };
        let gs = GraphicsState::new(page.geometry.device_matrix(scale));
        renderer.run(&content, resources, gs)?;

        if renderer.skipped_text > 0 {
            debug!(
                "Page {}: {} text objects not rasterised by the native backend",
                page_num, renderer.skipped_text
            );
        }
        debug!("Rendered page {} → {}x{} px", page_num, width, height);

        Ok(RenderedPage {
            page_index: index,
            size,
            scale,
            image: renderer.surface.into_image(),
        })
    }
}

// ── Page geometry ────────────────────────────────────────────────────────

/// Visible page box in default user space plus its display rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PageGeometry {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    /// 0, 90, 180 or 270.
    rotate: i64,
}

impl PageGeometry {
    fn read(doc: &Document, page_id: ObjectId) -> Self {
        let media = inherited(doc, page_id, b"MediaBox").and_then(|o| parse_rect(doc, o));
        let [x0, y0, x1, y1] = media.unwrap_or_else(|| {
            warn!("Page object {:?} has no usable MediaBox; assuming US Letter", page_id);
            [0.0, 0.0, DEFAULT_PAGE_SIZE.width_pt, DEFAULT_PAGE_SIZE.height_pt]
        });

        let (mut bx0, mut by0, mut bx1, mut by1) = (x0, y0, x1, y1);
        if let Some([cx0, cy0, cx1, cy1]) =
            inherited(doc, page_id, b"CropBox").and_then(|o| parse_rect(doc, o))
        {
            let (ix0, iy0, ix1, iy1) = (x0.max(cx0), y0.max(cy0), x1.min(cx1), y1.min(cy1));
            if ix1 > ix0 && iy1 > iy0 {
                (bx0, by0, bx1, by1) = (ix0, iy0, ix1, iy1);
            }
        }

        let rotate = inherited(doc, page_id, b"Rotate")
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_i64().ok())
            .map(|r| r.rem_euclid(360))
            .filter(|r| r % 90 == 0)
            .unwrap_or(0);

        Self {
            x0: bx0,
            y0: by0,
            x1: bx1,
            y1: by1,
            rotate,
        }
    }

    fn size(&self) -> PageSize {
        let (w, h) = (self.x1 - self.x0, self.y1 - self.y0);
        match self.rotate {
            90 | 270 => PageSize::new(h, w),
            _ => PageSize::new(w, h),
        }
    }

    /// User space → device pixels, y pointing down, rotation applied.
    fn device_matrix(&self, s: f32) -> Matrix {
        let Self {
            x0, y0, x1, y1, ..
        } = *self;
        match self.rotate {
            90 => Matrix::new(0.0, s, s, 0.0, -y0 * s, -x0 * s),
            180 => Matrix::new(-s, 0.0, 0.0, s, x1 * s, -y0 * s),
            270 => Matrix::new(0.0, -s, -s, 0.0, y1 * s, x1 * s),
            _ => Matrix::new(s, 0.0, 0.0, -s, -x0 * s, y1 * s),
        }
    }
}

// ── lopdf helpers ────────────────────────────────────────────────────────

/// Follow indirect references until a direct object is reached.
fn resolve<'a>(doc: &'a Document, mut obj: &'a Object) -> Option<&'a Object> {
    for _ in 0..MAX_PARENT_DEPTH {
        match obj {
            Object::Reference(id) => obj = doc.get_object(*id).ok()?,
            other => return Some(other),
        }
    }
    None
}

/// Look up `key` on the page, walking `/Parent` links for inherited values.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut dict = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_PARENT_DEPTH {
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f),
        _ => None,
    }
}

fn numbers(operands: &[Object]) -> Option<Vec<f32>> {
    operands.iter().map(number).collect()
}

/// Parse a rectangle array into normalised `[x0, y0, x1, y1]`.
fn parse_rect(doc: &Document, obj: &Object) -> Option<[f32; 4]> {
    let arr = resolve(doc, obj)?.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let v: Vec<f32> = arr
        .iter()
        .map(|o| resolve(doc, o).and_then(number))
        .collect::<Option<_>>()?;
    let rect = [v[0].min(v[2]), v[1].min(v[3]), v[0].max(v[2]), v[1].max(v[3])];
    (rect[2] > rect[0] && rect[3] > rect[1]).then_some(rect)
}

fn stream_data(stream: &Stream) -> Result<Vec<u8>, String> {
    if stream.dict.get(b"Filter").is_ok() {
        stream
            .decompressed_content()
            .map_err(|e| format!("failed to decompress stream: {e}"))
    } else {
        Ok(stream.content.clone())
    }
}

/// Concatenated page content. A page without `/Contents` is blank.
fn page_content(doc: &Document, page: &Dictionary) -> Result<Vec<u8>, String> {
    let contents = match page.get(b"Contents") {
        Ok(obj) => obj,
        Err(_) => return Ok(Vec::new()),
    };
    let direct = match contents {
        Object::Reference(id) => doc
            .get_object(*id)
            .map_err(|e| format!("failed to resolve /Contents: {e}"))?,
        other => other,
    };
    match direct {
        Object::Stream(stream) => stream_data(stream),
        Object::Array(items) => {
            let mut content = Vec::new();
            for item in items {
                let stream = resolve(doc, item)
                    .and_then(|o| o.as_stream().ok())
                    .ok_or_else(|| "/Contents array item is not a stream".to_string())?;
                if !content.is_empty() {
                    content.push(b'\n');
                }
                content.extend_from_slice(&stream_data(stream)?);
            }
            Ok(content)
        }
        _ => Err("/Contents is not a stream or array".to_string()),
    }
}

/// Named entry from a resource sub-dictionary (`/XObject`, `/ExtGState`).
fn resource<'a>(
    doc: &'a Document,
    resources: Option<&'a Dictionary>,
    category: &[u8],
    name: &[u8],
) -> Option<&'a Object> {
    let dict = resolve(doc, resources?.get(category).ok()?)?.as_dict().ok()?;
    resolve(doc, dict.get(name).ok()?)
}

// ── Colour ───────────────────────────────────────────────────────────────

fn channel(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Colour from 1 (gray), 3 (RGB) or 4 (CMYK) components.
fn color_from(components: &[f32]) -> Option<Rgb<u8>> {
    match *components {
        [g] => Some(Rgb([channel(g); 3])),
        [r, g, b] => Some(Rgb([channel(r), channel(g), channel(b)])),
        [c, m, y, k] => Some(Rgb([
            channel((1.0 - c) * (1.0 - k)),
            channel((1.0 - m) * (1.0 - k)),
            channel((1.0 - y) * (1.0 - k)),
        ])),
        _ => None,
    }
}

fn cmyk_to_rgb(c: u8, m: u8, y: u8, k: u8) -> [u8; 3] {
    let inv = |v: u8| 255 - v as u16;
    let k = inv(k);
    [
        (inv(c) * k / 255) as u8,
        (inv(m) * k / 255) as u8,
        (inv(y) * k / 255) as u8,
    ]
}

// ── Images ───────────────────────────────────────────────────────────────

fn filter_names(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(n)) => vec![n.clone()],
        Ok(Object::Array(arr)) => arr
            .iter()
            .filter_map(|o| o.as_name().ok().map(|n| n.to_vec()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Number of colour components for supported colour spaces.
fn components(doc: &Document, cs: &Object) -> Option<usize> {
    match resolve(doc, cs)? {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => Some(1),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Some(3),
            b"DeviceCMYK" | b"CMYK" => Some(4),
            _ => None,
        },
        Object::Array(arr) => {
            let family = arr.first()?.as_name().ok()?;
            match family {
                b"ICCBased" => {
                    let stream = resolve(doc, arr.get(1)?)?.as_stream().ok()?;
                    let n = stream.dict.get(b"N").ok().and_then(|o| o.as_i64().ok())?;
                    matches!(n, 1 | 3 | 4).then_some(n as usize)
                }
                b"CalGray" => Some(1),
                b"CalRGB" => Some(3),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Decode an image XObject to RGB. `Ok(None)` for encodings this backend
/// does not handle (JPX, JBIG2, stencil masks, indexed or sub-byte images).
///
/// Raw images larger than `max_pixels` are rejected before any allocation.
fn decode_image(
    doc: &Document,
    stream: &Stream,
    max_pixels: u64,
) -> Result<Option<RgbImage>, String> {
    let dict = &stream.dict;
    let filters = filter_names(dict);

    if filters.last().is_some_and(|f| f.as_slice() == b"DCTDecode") {
        if filters.len() > 1 {
            return Ok(None);
        }
        let img = image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
            .map_err(|e| format!("DCTDecode image: {e}"))?;
        return Ok(Some(img.to_rgb8()));
    }
    if filters
        .iter()
        .any(|f| matches!(f.as_slice(), b"JPXDecode" | b"JBIG2Decode" | b"CCITTFaxDecode"))
    {
        return Ok(None);
    }

    let is_mask = dict
        .get(b"ImageMask")
        .ok()
        .and_then(|o| o.as_bool().ok())
        .unwrap_or(false);
    let bpc = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);
    if is_mask || bpc != 8 {
        return Ok(None);
    }
    let dim = |key: &[u8]| {
        dict.get(key)
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_i64().ok())
            .filter(|v| *v > 0 && *v <= u32::MAX as i64)
            .map(|v| v as u32)
    };
    let (Some(width), Some(height)) = (dim(b"Width"), dim(b"Height")) else {
        return Err("image is missing /Width or /Height".to_string());
    };
    let Some(n) = dict.get(b"ColorSpace").ok().and_then(|cs| components(doc, cs)) else {
        return Ok(None);
    };

    let too_large = || format!("image {width}x{height} exceeds the pixel limit");
    let pixels = u64::from(width) * u64::from(height);
    if pixels > max_pixels {
        return Err(too_large());
    }
    let pixels = usize::try_from(pixels).map_err(|_| too_large())?;
    let (Some(needed), Some(rgb_len)) = (pixels.checked_mul(n), pixels.checked_mul(3)) else {
        return Err(too_large());
    };

    let data = stream_data(stream)?;
    if data.len() < needed {
        return Err(format!(
            "image data too short: {} bytes for {}x{}x{}",
            data.len(),
            width,
            height,
            n
        ));
    }

    let mut rgb = Vec::new();
    rgb.try_reserve_exact(rgb_len).map_err(|_| too_large())?;
    for px in data.chunks_exact(n).take(pixels) {
        match *px {
            [g] => rgb.extend_from_slice(&[g, g, g]),
            [r, g, b] => rgb.extend_from_slice(&[r, g, b]),
            [c, m, y, k] => rgb.extend_from_slice(&cmyk_to_rgb(c, m, y, k)),
            _ => unreachable!("component count is 1, 3 or 4"),
        }
    }
    Ok(RgbImage::from_raw(width, height, rgb))
}

// ── Content interpretation ───────────────────────────────────────────────

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    fill: Rgb<u8>,
    stroke: Rgb<u8>,
    line_width: f32,
    fill_alpha: f32,
    stroke_alpha: f32,
    clip: Option<Rc<ClipMask>>,
}

impl GraphicsState {
    fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            fill: Rgb([0, 0, 0]),
            stroke: Rgb([0, 0, 0]),
            line_width: 1.0,
            fill_alpha: 1.0,
            stroke_alpha: 1.0,
            clip: None,
        }
    }

    fn fill_paint(&self) -> Paint<'_> {
        Paint {
            alpha: self.fill_alpha,
            clip: self.clip.as_deref(),
        }
    }

    fn stroke_paint(&self) -> Paint<'_> {
        Paint {
            alpha: self.stroke_alpha,
            clip: self.clip.as_deref(),
        }
    }

    fn add_clip(&mut self, mask: ClipMask) {
        let merged = match &self.clip {
            Some(current) => current.intersect(&mask),
            None => mask,
        };
        self.clip = Some(Rc::new(merged));
    }
}

/// How a path-painting operator uses the current path.
#[derive(Debug, Clone, Copy)]
struct PaintOp {
    close: bool,
    fill: Option<FillRule>,
    stroke: bool,
}

impl PaintOp {
    fn for_operator(op: &str) -> Option<Self> {
        let (close, fill, stroke) = match op {
            "f" | "F" => (false, Some(FillRule::NonZero), false),
            "f*" => (false, Some(FillRule::EvenOdd), false),
            "S" => (false, None, true),
            "s" => (true, None, true),
            "B" => (false, Some(FillRule::NonZero), true),
            "B*" => (false, Some(FillRule::EvenOdd), true),
            "b" => (true, Some(FillRule::NonZero), true),
            "b*" => (true, Some(FillRule::EvenOdd), true),
            "n" => (false, None, false),
            _ => return None,
        };
        Some(Self {
            close,
            fill,
            stroke,
        })
    }
}

struct Renderer<'a> {
    doc: &'a Document,
    surface: RasterSurface,
    /// 1-indexed, for errors.
    page: usize,
    /// Form XObjects currently being drawn, for cycle detection.
    forms: Vec<ObjectId>,
    skipped_text: usize,
    /// Largest raw image XObject accepted, in pixels.
    max_image_pixels: u64,
}

impl<'a> Renderer<'a> {
    fn corrupt(&self, detail: impl Into<String>) -> RenderError {
        RenderError::CorruptContent {
            page: self.page,
            detail: detail.into(),
        }
    }

    fn run(
        &mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
        initial: GraphicsState,
    ) -> Result<(), RenderError> {
        let ops = Content::decode(content)
            .map_err(|e| self.corrupt(format!("unparseable operators: {e}")))?
            .operations;

        let mut gs = initial;
        let mut saved: Vec<GraphicsState> = Vec::new();
        let mut path = Path::new();
        let mut pending_clip: Option<FillRule> = None;

        for op in &ops {
            let operator = op.operator.as_str();
            let operands = op.operands.as_slice();

            if let Some(paint) = PaintOp::for_operator(operator) {
                self.paint_path(&mut gs, &mut path, paint, pending_clip.take());
                continue;
            }

            match operator {
                "q" => saved.push(gs.clone()),
                "Q" => {
                    if let Some(prev) = saved.pop() {
                        gs = prev;
                    }
                }
                "cm" => {
                    if let Some(m) = matrix(operands) {
                        gs.ctm = m.concat(&gs.ctm);
                    }
                }
                "w" => {
                    if let Some(w) = operands.first().and_then(number) {
                        gs.line_width = w.max(0.0);
                    }
                }
                "gs" => self.apply_ext_gstate(&mut gs, resources, operands),

                // Path construction
                "m" => {
                    if let Some([x, y]) = point(operands, 0) {
                        let (dx, dy) = gs.ctm.apply(x, y);
                        path.move_to(dx, dy);
                    }
                }
                "l" => {
                    if let Some([x, y]) = point(operands, 0) {
                        let (dx, dy) = gs.ctm.apply(x, y);
                        path.line_to(dx, dy);
                    }
                }
                "c" => {
                    if let (Some(p1), Some(p2), Some(p3)) =
                        (point(operands, 0), point(operands, 2), point(operands, 4))
                    {
                        path.curve_to(apply(&gs.ctm, p1), apply(&gs.ctm, p2), apply(&gs.ctm, p3));
                    }
                }
                "v" => {
                    if let (Some(p2), Some(p3), Some(current)) =
                        (point(operands, 0), point(operands, 2), path.current_point())
                    {
                        path.curve_to(current, apply(&gs.ctm, p2), apply(&gs.ctm, p3));
                    }
                }
                "y" => {
                    if let (Some(p1), Some(p3)) = (point(operands, 0), point(operands, 2)) {
                        let end = apply(&gs.ctm, p3);
                        path.curve_to(apply(&gs.ctm, p1), end, end);
                    }
                }
                "h" => path.close(),
                "re" => {
                    if let (Some([x, y]), Some([w, h])) = (point(operands, 0), point(operands, 2)) {
                        let corners = [(x, y), (x + w, y), (x + w, y + h), (x, y + h)];
                        let (sx, sy) = gs.ctm.apply(x, y);
                        path.move_to(sx, sy);
                        for &(cx, cy) in &corners[1..] {
                            let (dx, dy) = gs.ctm.apply(cx, cy);
                            path.line_to(dx, dy);
                        }
                        path.close();
                    }
                }
                "W" => pending_clip = Some(FillRule::NonZero),
                "W*" => pending_clip = Some(FillRule::EvenOdd),

                // Colour
                "g" | "rg" | "k" | "sc" | "scn" => {
                    if let Some(color) = numbers(operands).as_deref().and_then(color_from) {
                        gs.fill = color;
                    }
                }
                "G" | "RG" | "K" | "SC" | "SCN" => {
                    if let Some(color) = numbers(operands).as_deref().and_then(color_from) {
                        gs.stroke = color;
                    }
                }
                "cs" => gs.fill = Rgb([0, 0, 0]),
                "CS" => gs.stroke = Rgb([0, 0, 0]),

                "Do" => {
                    if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                        self.draw_xobject(&gs, resources, name)?;
                    }
                }

                "BT" => self.skipped_text += 1,
                _ => {}
            }
        }
        Ok(())
    }

    fn paint_path(
        &mut self,
        gs: &mut GraphicsState,
        path: &mut Path,
        op: PaintOp,
        clip: Option<FillRule>,
    ) {
        if op.close {
            path.close();
        }
        if let Some(rule) = op.fill {
            self.surface.fill_path(path, rule, gs.fill, gs.fill_paint());
        }
        if op.stroke {
            let width = gs.line_width * gs.ctm.mean_scale();
            self.surface
                .stroke_path(path, width, gs.stroke, gs.stroke_paint());
        }
        if let Some(rule) = clip {
            let mask = ClipMask::from_path(path, rule, self.surface.width(), self.surface.height());
            gs.add_clip(mask);
        }
        path.clear();
    }

    fn apply_ext_gstate(
        &self,
        gs: &mut GraphicsState,
        resources: Option<&'a Dictionary>,
        operands: &[Object],
    ) {
        let Some(name) = operands.first().and_then(|o| o.as_name().ok()) else {
            return;
        };
        let Some(dict) = resource(self.doc, resources, b"ExtGState", name).and_then(|o| o.as_dict().ok())
        else {
            return;
        };
        let get = |key: &[u8]| dict.get(key).ok().and_then(number);
        if let Some(ca) = get(b"ca") {
            gs.fill_alpha = ca.clamp(0.0, 1.0);
        }
        if let Some(ca) = get(b"CA") {
            gs.stroke_alpha = ca.clamp(0.0, 1.0);
        }
        if let Some(lw) = get(b"LW") {
            gs.line_width = lw.max(0.0);
        }
    }

    fn draw_xobject(
        &mut self,
        gs: &GraphicsState,
        resources: Option<&'a Dictionary>,
        name: &[u8],
    ) -> Result<(), RenderError> {
        let Some(dict) = resources
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|o| resolve(self.doc, o))
            .and_then(|o| o.as_dict().ok())
        else {
            return Ok(());
        };
        let Ok(entry) = dict.get(name) else {
            debug!(
                "Page {}: XObject /{} not found",
                self.page,
                String::from_utf8_lossy(name)
            );
            return Ok(());
        };
        let id = entry.as_reference().ok();
        let Some(stream) = resolve(self.doc, entry).and_then(|o| o.as_stream().ok()) else {
            return Err(self.corrupt(format!(
                "XObject /{} is not a stream",
                String::from_utf8_lossy(name)
            )));
        };

        match stream.dict.get(b"Subtype").ok().and_then(|o| o.as_name().ok()) {
            Some(b"Image") => match decode_image(self.doc, stream, self.max_image_pixels) {
                Ok(Some(img)) => {
                    self.surface.draw_image(&img, &gs.ctm, gs.fill_paint());
                    Ok(())
                }
                Ok(None) => {
                    debug!(
                        "Page {}: image /{} uses an encoding the native backend skips",
                        self.page,
                        String::from_utf8_lossy(name)
                    );
                    Ok(())
                }
                Err(detail) => Err(self.corrupt(detail)),
            },
            Some(b"Form") => self.draw_form(gs, resources, stream, id),
            _ => Ok(()),
        }
    }

    fn draw_form(
        &mut self,
        gs: &GraphicsState,
        parent_resources: Option<&'a Dictionary>,
        stream: &'a Stream,
        id: Option<ObjectId>,
    ) -> Result<(), RenderError> {
        if self.forms.len() >= MAX_FORM_DEPTH || id.is_some_and(|id| self.forms.contains(&id)) {
            warn!("Page {}: Form XObject nesting too deep or cyclic; skipped", self.page);
            return Ok(());
        }

        let dict = &stream.dict;
        let form_matrix = dict
            .get(b"Matrix")
            .ok()
            .and_then(|o| resolve(self.doc, o))
            .and_then(|o| o.as_array().ok())
            .and_then(|arr| matrix(arr))
            .unwrap_or(Matrix::IDENTITY);

        let mut form_gs = gs.clone();
        form_gs.ctm = form_matrix.concat(&gs.ctm);

        if let Some([x0, y0, x1, y1]) = dict.get(b"BBox").ok().and_then(|o| parse_rect(self.doc, o)) {
            let mut bbox = Path::new();
            let corners: Vec<(f32, f32)> = [(x0, y0), (x1, y0), (x1, y1), (x0, y1)]
                .iter()
                .map(|&(x, y)| form_gs.ctm.apply(x, y))
                .collect();
            bbox.polygon(&corners);
            form_gs.add_clip(ClipMask::from_path(
                &bbox,
                FillRule::NonZero,
                self.surface.width(),
                self.surface.height(),
            ));
        }

        let resources = dict
            .get(b"Resources")
            .ok()
            .and_then(|o| resolve(self.doc, o))
            .and_then(|o| o.as_dict().ok())
            .or(parent_resources);
        let content = stream_data(stream).map_err(|e| self.corrupt(e))?;

        if let Some(id) = id {
            self.forms.push(id);
        }
        let result = self.run(&content, resources, form_gs);
        if id.is_some() {
            self.forms.pop();
        }
        result
    }
}

/// Six numbers as an affine matrix.
fn matrix(values: &[Object]) -> Option<Matrix> {
    match numbers(values)?.as_slice() {
        &[a, b, c, d, e, f] => Some(Matrix::new(a, b, c, d, e, f)),
        _ => None,
    }
}

/// Two numeric operands starting at `at`.
fn point(operands: &[Object], at: usize) -> Option<[f32; 2]> {
    Some([number(operands.get(at)?)?, number(operands.get(at + 1)?)?])
}

fn apply(m: &Matrix, [x, y]: [f32; 2]) -> (f32, f32) {
    m.apply(x, y)
}
