//! Detection overlay rendering
//!
//! Detections arrive in source-pixel coordinates. The display canvas is the
//! source's natural size fitted into a bounding box (800x600 by default), so
//! every box is scaled by `canvas / natural` on each axis before drawing.
//!
//! Drawing goes through [`OverlaySurface`], a small 2D-canvas-like trait:
//! - [`CommandSurface`] records [`DrawCommand`]s for a UI layer to replay
//! - [`RasterSurface`] paints into an `RgbaImage` via `imageproc`

use crate::error::{MediaError, Result};
use ab_glyph::{FontVec, PxScale};
use image::{imageops::FilterType, DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Pixel size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Fit into `bounds` keeping the aspect ratio (scales up as well as down)
    pub fn fit_within(&self, bounds: Dimensions) -> Result<Dimensions> {
        if self.is_empty() {
            return Err(MediaError::ValidationFailed(
                "Source has no natural dimensions".to_string(),
            ));
        }
        let ratio = f64::min(
            bounds.width as f64 / self.width as f64,
            bounds.height as f64 / self.height as f64,
        );
        // Canvas sizes are integers; truncate, absorbing float noise first.
        let scale = |v: u32| ((v as f64 * ratio + 1e-9).floor() as u32).max(1);
        Ok(Dimensions::new(scale(self.width), scale(self.height)))
    }
}

/// One detector hit, in source-pixel coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// `[x1, y1, x2, y2]`
    pub bbox: [f64; 4],
    #[serde(rename = "class")]
    pub class_label: String,
    pub confidence: f64,
}

impl Detection {
    pub fn confidence_percent(&self) -> i64 {
        (self.confidence * 100.0).round() as i64
    }

    /// Text drawn above the box
    pub fn label(&self) -> String {
        format!("{} {}%", self.class_label, self.confidence_percent())
    }
}

/// Axis-aligned rectangle in canvas coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Where one detection ended up on the canvas
#[derive(Debug, Clone, PartialEq)]
pub struct BoxPlacement {
    pub rect: CanvasRect,
    pub label: String,
    pub label_x: f64,
    pub label_y: f64,
}

/// Stroke and label appearance
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
    pub color: [u8; 4],
    pub line_width: u32,
    pub font_px: f32,
    /// Gap between label baseline and box top
    pub label_offset: f64,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: [0x00, 0xff, 0x00, 0xff],
            line_width: 2,
            font_px: 16.0,
            label_offset: 5.0,
        }
    }
}

/// Recorded drawing operation
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Resize(Dimensions),
    Clear,
    DrawSource(Dimensions),
    StrokeRect { rect: CanvasRect, color: [u8; 4], line_width: u32 },
    FillText { text: String, x: f64, y: f64, color: [u8; 4], font_px: f32 },
}

/// Minimal 2D drawing target
pub trait OverlaySurface {
    fn resize(&mut self, canvas: Dimensions);
    fn clear(&mut self);
    /// Draw the source image stretched to `canvas`
    fn draw_source(&mut self, canvas: Dimensions);
    fn stroke_rect(&mut self, rect: CanvasRect, style: &OverlayStyle);
    /// `y` is the text baseline
    fn fill_text(&mut self, text: &str, x: f64, y: f64, style: &OverlayStyle);
}

/// Scale detections onto a canvas and draw them, in received order
pub fn render(
    surface: &mut dyn OverlaySurface,
    canvas: Dimensions,
    natural: Dimensions,
    detections: &[Detection],
    style: &OverlayStyle,
) -> Result<Vec<BoxPlacement>> {
    if natural.is_empty() {
        return Err(MediaError::ValidationFailed(
            "Source has no natural dimensions".to_string(),
        ));
    }

    surface.clear();
    surface.draw_source(canvas);

    let scale_x = canvas.width as f64 / natural.width as f64;
    let scale_y = canvas.height as f64 / natural.height as f64;

    let mut placements = Vec::with_capacity(detections.len());
    for detection in detections {
        let [x1, y1, x2, y2] = detection.bbox;
        let rect = CanvasRect {
            x: x1 * scale_x,
            y: y1 * scale_y,
            width: (x2 - x1) * scale_x,
            height: (y2 - y1) * scale_y,
        };
        let label = detection.label();
        let label_x = rect.x;
        let label_y = rect.y - style.label_offset;

        surface.stroke_rect(rect, style);
        surface.fill_text(&label, label_x, label_y, style);

        placements.push(BoxPlacement { rect, label, label_x, label_y });
    }

    debug!(
        "Rendered {} detections on {}x{} canvas (source {}x{})",
        placements.len(),
        canvas.width,
        canvas.height,
        natural.width,
        natural.height
    );

    Ok(placements)
}

/// Fits the canvas to the source, then renders
#[derive(Debug, Clone)]
pub struct OverlayRenderer {
    pub max_canvas: Dimensions,
    pub style: OverlayStyle,
}

impl OverlayRenderer {
    pub fn new(max_canvas: Dimensions) -> Self {
        Self {
            max_canvas,
            style: OverlayStyle::default(),
        }
    }

    pub fn canvas_for(&self, natural: Dimensions) -> Result<Dimensions> {
        natural.fit_within(self.max_canvas)
    }

    pub fn render(
        &self,
        surface: &mut dyn OverlaySurface,
        natural: Dimensions,
        detections: &[Detection],
    ) -> Result<Vec<BoxPlacement>> {
        let canvas = self.canvas_for(natural)?;
        surface.resize(canvas);
        render(surface, canvas, natural, detections, &self.style)
    }
}

/// Result list lines: `person (87% confidence)` / `Bounding Box: [10, 20, 30, 40]`
pub fn detection_summary(detections: &[Detection]) -> Vec<(String, String)> {
    detections
        .iter()
        .map(|d| {
            let coords: Vec<String> = d.bbox.iter().map(|v| format!("{}", v.round() as i64)).collect();
            (
                format!("{} ({}% confidence)", d.class_label, d.confidence_percent()),
                format!("Bounding Box: [{}]", coords.join(", ")),
            )
        })
        .collect()
}

/// Surface that records what was drawn
#[derive(Debug, Clone, Default)]
pub struct CommandSurface {
    commands: Vec<DrawCommand>,
}

impl CommandSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }
}

impl OverlaySurface for CommandSurface {
    fn resize(&mut self, canvas: Dimensions) {
        self.commands.push(DrawCommand::Resize(canvas));
    }

    fn clear(&mut self) {
        self.commands.push(DrawCommand::Clear);
    }

    fn draw_source(&mut self, canvas: Dimensions) {
        self.commands.push(DrawCommand::DrawSource(canvas));
    }

    fn stroke_rect(&mut self, rect: CanvasRect, style: &OverlayStyle) {
        self.commands.push(DrawCommand::StrokeRect {
            rect,
            color: style.color,
            line_width: style.line_width,
        });
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64, style: &OverlayStyle) {
        self.commands.push(DrawCommand::FillText {
            text: text.to_string(),
            x,
            y,
            color: style.color,
            font_px: style.font_px,
        });
    }
}

/// Raster canvas backed by an `RgbaImage`
pub struct RasterSurface {
    source: DynamicImage,
    canvas: RgbaImage,
    font: Option<FontVec>,
}

impl RasterSurface {
    pub fn new(source: DynamicImage) -> Self {
        let canvas = RgbaImage::new(source.width(), source.height());
        Self { source, canvas, font: None }
    }

    /// Decode an encoded image (JPEG, PNG, ...)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let source = image::load_from_memory(bytes)
            .map_err(|e| MediaError::Codec(format!("Failed to decode image: {}", e)))?;
        Ok(Self::new(source))
    }

    /// Labels are only painted once a font is supplied
    pub fn with_font(mut self, font_data: Vec<u8>) -> Result<Self> {
        let font = FontVec::try_from_vec(font_data)
            .map_err(|e| MediaError::Config(format!("Invalid font: {}", e)))?;
        self.font = Some(font);
        Ok(self)
    }

    pub fn natural_size(&self) -> Dimensions {
        Dimensions::new(self.source.width(), self.source.height())
    }

    pub fn image(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn into_image(self) -> RgbaImage {
        self.canvas
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.canvas
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| MediaError::Codec(format!("Failed to save overlay: {}", e)))
    }
}

impl OverlaySurface for RasterSurface {
    fn resize(&mut self, canvas: Dimensions) {
        self.canvas = RgbaImage::new(canvas.width, canvas.height);
    }

    fn clear(&mut self) {
        for pixel in self.canvas.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    fn draw_source(&mut self, canvas: Dimensions) {
        if canvas.is_empty() {
            return;
        }
        let scaled = image::imageops::resize(
            &self.source.to_rgba8(),
            canvas.width,
            canvas.height,
            FilterType::Triangle,
        );
        if scaled.dimensions() == self.canvas.dimensions() {
            self.canvas = scaled;
        } else {
            image::imageops::overlay(&mut self.canvas, &scaled, 0, 0);
        }
    }

    fn stroke_rect(&mut self, rect: CanvasRect, style: &OverlayStyle) {
        let color = Rgba(style.color);
        // Thickness grows inward from the outline.
        for t in 0..style.line_width {
            let inset = t as f64;
            let width = rect.width - 2.0 * inset;
            let height = rect.height - 2.0 * inset;
            if width < 1.0 || height < 1.0 {
                break;
            }
            let outline = Rect::at((rect.x + inset).round() as i32, (rect.y + inset).round() as i32)
                .of_size(width.round().max(1.0) as u32, height.round().max(1.0) as u32);
            draw_hollow_rect_mut(&mut self.canvas, outline, color);
        }
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64, style: &OverlayStyle) {
        let Some(font) = &self.font else {
            debug!("No font loaded, skipping label '{}'", text);
            return;
        };
        let top = (y - style.font_px as f64).round() as i32;
        draw_text_mut(
            &mut self.canvas,
            Rgba(style.color),
            x.round() as i32,
            top,
            PxScale::from(style.font_px),
            font,
            text,
        );
    }
}
