//! PNG export of the current view.
//!
//! Renders the laid-out nodes and edges with `tiny-skia` on a white
//! background. Node shape follows `_shape`, fill color follows `_type`, and
//! optional elements get a dashed border. Labels are not drawn.

use std::path::{Path, PathBuf};

use glam::Vec2;
use tiny_skia::{
    Color, FillRule, Paint, PathBuilder, Pixmap, Rect, Stroke, StrokeDash, Transform,
};

use super::canvas::GraphView;
use super::constants::{
    edge_color, node_color, ARROW_SIZE, COLOR_NODE_BORDER, EDGE_WIDTH, NODE_BORDER_WIDTH,
    NODE_RADIUS, SELF_LOOP_RADIUS,
};
use super::layout::{Bounds, Positions};
use crate::config::{clamp_scale, ExportConfig, MIN_EXPORT_SCALE};
use crate::error::AppError;
use crate::models::Element;

/// Blank space around the drawing, in layout units.
const MARGIN: f32 = 20.0;
/// Largest surface accepted, in pixels (256 MiB of RGBA).
const MAX_PIXELS: f32 = 64.0 * 1024.0 * 1024.0;

/// A generated file waiting to be saved.
///
/// Saving consumes the handle, so the bytes are released once written.
#[derive(Debug, Clone, PartialEq)]
pub struct Download {
    file_name: String,
    bytes: Vec<u8>,
}

impl Download {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Writes the file under its own name inside `dir`.
    pub fn save_to(self, dir: &Path) -> Result<PathBuf, AppError> {
        let path = dir.join(&self.file_name);
        self.save_as(&path)
    }

    /// Writes the file to `path`.
    pub fn save_as(self, path: &Path) -> Result<PathBuf, AppError> {
        std::fs::write(path, &self.bytes)?;
        tracing::debug!(path = %path.display(), bytes = self.bytes.len(), "Saved download");
        Ok(path.to_path_buf())
    }
}

/// Rasterizes the view.
#[derive(Debug, Clone)]
pub struct Exporter {
    scale: f32,
    file_name: String,
}

impl Default for Exporter {
    fn default() -> Self {
        Self::from_config(&ExportConfig::default())
    }
}

impl Exporter {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            scale: config.effective_scale(),
            file_name: config.file_name.clone(),
        }
    }

    /// Overrides the scale (clamped to the supported range).
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = clamp_scale(scale);
        self
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// The configured scale, lowered toward the minimum when the surface
    /// would exceed `MAX_PIXELS`.
    fn fit_scale(&self, extent: Vec2) -> f32 {
        let area = extent.x.max(1.0) * extent.y.max(1.0);
        if area * self.scale * self.scale <= MAX_PIXELS {
            return self.scale;
        }
        let fitted = (MAX_PIXELS / area).sqrt().max(MIN_EXPORT_SCALE);
        tracing::warn!(configured = self.scale, scale = fitted, "Lowered export scale for a large view");
        fitted
    }

    /// Renders every node with a position, and every edge between two such nodes.
    pub fn render<V: GraphView + ?Sized>(&self, view: &V, positions: &Positions) -> Result<Download, AppError> {
        let bounds = Bounds::of(positions)
            .map(|b| b.expand(NODE_RADIUS + MARGIN))
            .unwrap_or(Bounds {
                min: Vec2::ZERO,
                max: Vec2::splat(2.0 * MARGIN),
            });
        let scale = self.fit_scale(bounds.size());
        let size = (bounds.size() * scale).ceil();
        if scale <= MIN_EXPORT_SCALE && size.x * size.y > MAX_PIXELS {
            return Err(AppError::Export(format!(
                "image would be {}x{} px even at the lowest scale",
                size.x, size.y
            )));
        }
        let mut pixmap = Pixmap::new(size.x.max(1.0) as u32, size.y.max(1.0) as u32)
            .ok_or_else(|| AppError::Export(format!("failed to allocate {}x{} surface", size.x, size.y)))?;
        pixmap.fill(Color::WHITE);

        let canvas = Painter {
            origin: bounds.min,
            scale,
        };
        for edge in view.elements().filter(|e| e.is_edge()) {
            let from = edge.source().and_then(|id| positions.get(id));
            let to = edge.target().and_then(|id| positions.get(id));
            if let (Some(from), Some(to)) = (from, to) {
                canvas.edge(&mut pixmap, edge, *from, *to);
            }
        }
        for node in view.elements().filter(|e| e.is_node()) {
            if let Some(position) = positions.get(node.id()) {
                canvas.node(&mut pixmap, node, *position);
            }
        }

        let bytes = pixmap
            .encode_png()
            .map_err(|err| AppError::Export(format!("failed to encode PNG output: {err}")))?;
        tracing::info!(
            width = pixmap.width(),
            height = pixmap.height(),
            scale,
            "Exported view"
        );
        Ok(Download::new(self.file_name.clone(), bytes))
    }
}

/// Maps layout units to pixels and draws single elements.
struct Painter {
    origin: Vec2,
    scale: f32,
}

impl Painter {
    fn px(&self, point: Vec2) -> Vec2 {
        (point - self.origin) * self.scale
    }

    fn paint(rgb: [u8; 3]) -> Paint<'static> {
        let mut paint = Paint::default();
        paint.set_color_rgba8(rgb[0], rgb[1], rgb[2], 255);
        paint.anti_alias = true;
        paint
    }

    fn stroke(&self, width: f32, dashed: bool) -> Stroke {
        let mut stroke = Stroke {
            width: width * self.scale,
            ..Stroke::default()
        };
        if dashed {
            stroke.dash = StrokeDash::new(vec![4.0 * self.scale, 3.0 * self.scale], 0.0);
        }
        stroke
    }

    fn edge(&self, pixmap: &mut Pixmap, edge: &Element, from: Vec2, to: Vec2) {
        let paint = Self::paint(edge_color(edge.edge_type()));
        let stroke = self.stroke(EDGE_WIDTH, edge.has_class("optional"));
        let radius = NODE_RADIUS * self.scale;

        if edge.source() == edge.target() {
            let center = self.px(from) - Vec2::new(0.0, radius + SELF_LOOP_RADIUS * self.scale * 0.5);
            if let Some(path) = PathBuilder::from_circle(center.x, center.y, SELF_LOOP_RADIUS * self.scale) {
                pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
            }
            return;
        }

        let (from, to) = (self.px(from), self.px(to));
        let dir = (to - from).normalize_or_zero();
        if dir == Vec2::ZERO {
            return;
        }
        let start = from + dir * radius;
        let end = to - dir * radius;

        let mut line = PathBuilder::new();
        line.move_to(start.x, start.y);
        line.line_to(end.x, end.y);
        if let Some(path) = line.finish() {
            pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }

        let arrow = ARROW_SIZE * self.scale;
        let back = end - dir * arrow;
        let side = Vec2::new(-dir.y, dir.x) * arrow * 0.5;
        let mut head = PathBuilder::new();
        head.move_to(end.x, end.y);
        head.line_to(back.x + side.x, back.y + side.y);
        head.line_to(back.x - side.x, back.y - side.y);
        head.close();
        if let Some(path) = head.finish() {
            pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
        }
    }

    fn node(&self, pixmap: &mut Pixmap, node: &Element, position: Vec2) {
        let center = self.px(position);
        let r = NODE_RADIUS * self.scale;
        let path = match node.shape() {
            Some("diamond") => {
                let mut pb = PathBuilder::new();
                pb.move_to(center.x, center.y - r);
                pb.line_to(center.x + r, center.y);
                pb.line_to(center.x, center.y + r);
                pb.line_to(center.x - r, center.y);
                pb.close();
                pb.finish()
            }
            Some("square") => {
                Rect::from_xywh(center.x - r, center.y - r, 2.0 * r, 2.0 * r).map(PathBuilder::from_rect)
            }
            _ => PathBuilder::from_circle(center.x, center.y, r),
        };
        let Some(path) = path else {
            return;
        };

        let fill = Self::paint(node_color(node.node_type()));
        pixmap.fill_path(&path, &fill, FillRule::Winding, Transform::identity(), None);
        let border = Self::paint(COLOR_NODE_BORDER);
        let stroke = self.stroke(NODE_BORDER_WIDTH, node.has_class("optional"));
        pixmap.stroke_path(&path, &border, &stroke, Transform::identity(), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::canvas::Canvas;
    use crate::view::layout::LayoutRunner;

    fn view() -> Canvas {
        let mut canvas = Canvas::new();
        canvas.add(Element::node("root", "Root", "root", "diamond"));
        canvas.add(Element::node("a", "A", "child", "ellipse"));
        canvas.add(Element::node("p", "P", "participant", "square"));
        canvas.add(Element::edge("root", "a", "step_child"));
        canvas.add(Element::edge("root", "p", "step_participant"));
        canvas.add(Element::edge("a", "a", "child_outlink"));
        canvas
    }

    #[test]
    fn test_render_produces_png_at_scale() {
        let view = view();
        let mut runner = LayoutRunner::default();
        runner.run(&view);

        let exporter = Exporter::default();
        let download = exporter.render(&view, runner.positions()).unwrap();
        assert_eq!(download.file_name(), "graph.png");

        let image = Pixmap::decode_png(download.bytes()).unwrap();
        let bounds = Bounds::of(runner.positions()).unwrap().expand(NODE_RADIUS + MARGIN);
        let expected = (bounds.size() * exporter.scale()).ceil();
        assert_eq!(image.width(), expected.x as u32);
        assert_eq!(image.height(), expected.y as u32);

        let corner = image.pixel(0, 0).unwrap();
        assert_eq!((corner.red(), corner.green(), corner.blue()), (255, 255, 255));
    }

    #[test]
    fn test_scale_is_clamped() {
        assert_eq!(Exporter::default().with_scale(8.0).scale(), 3.0);
        assert_eq!(Exporter::default().with_scale(1.0).scale(), 1.5);
    }

    #[test]
    fn test_empty_view_renders_blank_image() {
        let download = Exporter::default()
            .render(&Canvas::new(), &Positions::new())
            .unwrap();
        let image = Pixmap::decode_png(download.bytes()).unwrap();
        assert_eq!(image.width(), 80);
    }

    #[test]
    fn test_wide_view_renders_at_configured_scale() {
        let mut view = Canvas::new();
        view.add(Element::node("root", "Root", "root", "diamond"));
        for i in 0..100 {
            let id = format!("c{i}");
            view.add(Element::node(&id, &id, "child", "ellipse"));
            view.add(Element::edge("root", &id, "step_child"));
        }
        let mut runner = LayoutRunner::default();
        runner.run(&view);

        let exporter = Exporter::default();
        let download = exporter.render(&view, runner.positions()).unwrap();
        let image = Pixmap::decode_png(download.bytes()).unwrap();
        let bounds = Bounds::of(runner.positions()).unwrap().expand(NODE_RADIUS + MARGIN);
        let expected = (bounds.size() * exporter.scale()).ceil();
        assert!(expected.x > 16_384.0);
        assert_eq!(image.width(), expected.x as u32);
        assert_eq!(image.height(), expected.y as u32);
    }

    #[test]
    fn test_oversized_surface_lowers_scale() {
        let exporter = Exporter::default().with_scale(3.0);
        assert_eq!(exporter.fit_scale(Vec2::new(1000.0, 500.0)), 3.0);

        let lowered = exporter.fit_scale(Vec2::new(6000.0, 4000.0));
        assert!(lowered < 3.0 && lowered >= MIN_EXPORT_SCALE);
        assert!(6000.0 * 4000.0 * lowered * lowered <= MAX_PIXELS * 1.001);

        assert_eq!(exporter.fit_scale(Vec2::new(100_000.0, 100_000.0)), MIN_EXPORT_SCALE);
    }

    #[test]
    fn test_save_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let download = Download::new("graph.png", vec![1, 2, 3]);
        let path = download.save_to(dir.path()).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), vec![1, 2, 3]);
    }
}
