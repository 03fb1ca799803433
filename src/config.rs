//! Configuration types for a PDF re-encoding job.
//!
//! All job behaviour is controlled through [`ConversionConfig`], built via its
//! [`ConversionConfigBuilder`]. One struct carries every knob so the same
//! config can be reused across jobs, logged, and compared between runs.
//!
//! # Defaults
//! The render scale depends on the output mode: image export renders at 2.0×
//! (144 DPI) for readable JPEGs, compression renders at 1.5× (108 DPI) since
//! the goal there is a smaller file. Quality defaults to the `medium` preset.

use crate::error::RecodeError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Smallest accepted render scale.
pub const MIN_SCALE: f32 = 0.25;
/// Largest accepted render scale.
pub const MAX_SCALE: f32 = 8.0;

/// Configuration for one conversion job.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf_recode::{ConversionConfig, OutputMode, QualityPreset};
///
/// let config = ConversionConfig::builder()
///     .mode(OutputMode::Compress)
///     .quality_preset(QualityPreset::Low)
///     .scale(1.25)
///     .build()
///     .unwrap();
/// assert_eq!(config.effective_scale(), 1.25);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// What the job produces. Default: [`OutputMode::ExtractImages`].
    pub mode: OutputMode,

    /// Render resolution multiplier over the page's 72-DPI point size.
    /// `None` uses the mode default (see [`OutputMode::default_scale`]).
    pub scale: Option<f32>,

    /// JPEG quality factor. Default: [`QualityPreset::Medium`] (0.75).
    pub quality: QualityFactor,

    /// What happens when a single page fails. Default: fail-fast.
    pub error_policy: ErrorPolicy,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Which rasteriser opens the document. Default: [`DecoderBackend::Auto`].
    pub backend: DecoderBackend,

    /// Maximum raster surface edge in pixels. Default: 10 000.
    ///
    /// A 2× render of an A0 poster is already 6 700 × 9 500 px; anything
    /// beyond this cap is almost certainly a malformed `/MediaBox` and would
    /// allocate hundreds of megabytes for one page.
    pub max_pixel_edge: u32,

    /// Receives per-page events and the progress fraction.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::default(),
            scale: None,
            quality: QualityPreset::default().factor(),
            error_policy: ErrorPolicy::default(),
            password: None,
            backend: DecoderBackend::default(),
            max_pixel_edge: 10_000,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("mode", &self.mode)
            .field("scale", &self.scale)
            .field("quality", &self.quality)
            .field("error_policy", &self.error_policy)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("backend", &self.backend)
            .field("max_pixel_edge", &self.max_pixel_edge)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
            raw_quality: None,
        }
    }

    /// The render scale this job will use.
    pub fn effective_scale(&self) -> f32 {
        self.scale.unwrap_or_else(|| self.mode.default_scale())
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
    raw_quality: Option<f32>,
}

impl ConversionConfigBuilder {
    pub fn mode(mut self, mode: OutputMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.config.scale = Some(scale);
        self
    }

    /// Set the quality factor directly. Validated in [`Self::build`].
    pub fn quality(mut self, factor: f32) -> Self {
        self.raw_quality = Some(factor);
        self
    }

    pub fn quality_preset(mut self, preset: QualityPreset) -> Self {
        self.raw_quality = None;
        self.config.quality = preset.factor();
        self
    }

    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.config.error_policy = policy;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn backend(mut self, backend: DecoderBackend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn max_pixel_edge(mut self, px: u32) -> Self {
        self.config.max_pixel_edge = px.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<ConversionConfig, RecodeError> {
        if let Some(q) = self.raw_quality {
            self.config.quality = QualityFactor::new(q)?;
        }
        if let Some(scale) = self.config.scale {
            if !scale.is_finite() || !(MIN_SCALE..=MAX_SCALE).contains(&scale) {
                return Err(RecodeError::InvalidConfig(format!(
                    "Scale must be {MIN_SCALE}–{MAX_SCALE}, got {scale}"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Value types ──────────────────────────────────────────────────────────

/// JPEG quality factor in `[0.0, 1.0]`.
///
/// Higher values give larger, more faithful images. Values outside the range
/// are rejected rather than clamped, so a typo in a caller's setting surfaces
/// as an error instead of a silently different file size.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct QualityFactor(f32);

impl QualityFactor {
    pub fn new(value: f32) -> Result<Self, RecodeError> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(RecodeError::InvalidConfig(format!(
                "Quality factor must be within 0.0–1.0, got {value}"
            )))
        }
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Map to the encoder's 1–100 quality scale.
    pub fn jpeg_quality(self) -> u8 {
        (self.0 * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

impl Default for QualityFactor {
    fn default() -> Self {
        QualityPreset::default().factor()
    }
}

impl TryFrom<f32> for QualityFactor {
    type Error = RecodeError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<QualityFactor> for f32 {
    fn from(q: QualityFactor) -> f32 {
        q.0
    }
}

impl fmt::Display for QualityFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// The three quality settings offered to end users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    /// 0.5: smallest files, visible artefacts on fine text.
    Low,
    /// 0.75: balanced (default).
    #[default]
    Medium,
    /// 0.92: near-lossless look, largest files.
    High,
}

impl QualityPreset {
    pub fn factor(self) -> QualityFactor {
        match self {
            QualityPreset::Low => QualityFactor(0.5),
            QualityPreset::Medium => QualityFactor(0.75),
            QualityPreset::High => QualityFactor(0.92),
        }
    }
}

impl FromStr for QualityPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(QualityPreset::Low),
            "medium" | "med" => Ok(QualityPreset::Medium),
            "high" => Ok(QualityPreset::High),
            other => Err(format!(
                "unknown quality preset '{other}' (expected low, medium or high)"
            )),
        }
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// What a job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputMode {
    /// One JPEG per page, in page order.
    #[default]
    ExtractImages,
    /// One new PDF whose pages are full-bleed JPEGs.
    Compress,
}

impl OutputMode {
    /// Render scale used when the config does not set one.
    pub fn default_scale(self) -> f32 {
        match self {
            OutputMode::ExtractImages => 2.0,
            OutputMode::Compress => 1.5,
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::ExtractImages => f.write_str("extractImages"),
            OutputMode::Compress => f.write_str("compress"),
        }
    }
}

/// How a job reacts to a page that fails to render or encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorPolicy {
    /// Abort the whole job on the first page failure; no partial output.
    #[default]
    FailFast,
    /// Leave the page out, record a [`crate::error::PageError`], continue.
    SkipPage,
}

/// Rasteriser used to open and render the source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderBackend {
    /// pdfium when the library can be bound, otherwise native.
    #[default]
    Auto,
    /// pdfium via `pdfium-render`; fails if the library is missing.
    Pdfium,
    /// Built-in pure-Rust renderer (vector paths and images, no text).
    Native,
}

impl FromStr for DecoderBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(DecoderBackend::Auto),
            "pdfium" => Ok(DecoderBackend::Pdfium),
            "native" => Ok(DecoderBackend::Native),
            other => Err(format!(
                "unknown backend '{other}' (expected auto, pdfium or native)"
            )),
        }
    }
}
