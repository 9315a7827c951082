//! Visible window onto the laid-out graph.

use glam::Vec2;

use super::layout::Bounds;
use crate::config::ViewportConfig;

/// Screen size, zoom and pan. Zoom always stays within
/// `min_zoom..=max_zoom`.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    width: f32,
    height: f32,
    zoom: f32,
    pan: Vec2,
    min_zoom: f32,
    max_zoom: f32,
    padding: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::from_config(&ViewportConfig::default())
    }
}

impl Viewport {
    pub fn from_config(config: &ViewportConfig) -> Self {
        let min_zoom = config.min_zoom.min(config.max_zoom);
        let max_zoom = config.max_zoom.max(config.min_zoom);
        let width = config.width.max(1.0);
        let height = config.height.max(1.0);
        Self {
            width,
            height,
            zoom: 1.0_f32.clamp(min_zoom, max_zoom),
            pan: Vec2::new(width, height) / 2.0,
            min_zoom,
            max_zoom,
            padding: config.padding.max(0.0),
        }
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn pan(&self) -> Vec2 {
        self.pan
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    /// Sets the zoom, clamped to the allowed range. Non-finite values are ignored.
    pub fn set_zoom(&mut self, zoom: f32) {
        if zoom.is_finite() {
            self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        }
    }

    /// Zooms so `bounds` fills the screen minus padding, and centers it.
    /// A single point (or nothing) is centered at zoom 1.
    pub fn fit(&mut self, bounds: Option<Bounds>) {
        let center = self.size() / 2.0;
        let Some(bounds) = bounds else {
            self.set_zoom(1.0);
            self.pan = center;
            return;
        };

        let extent = bounds.size();
        if extent.max_element() <= f32::EPSILON {
            self.set_zoom(1.0);
        } else {
            let available = (self.size() - Vec2::splat(2.0 * self.padding)).max(Vec2::ONE);
            let fit = available / extent.max(Vec2::ONE);
            self.set_zoom(fit.min_element());
        }
        self.pan = center - bounds.center() * self.zoom;
    }

    /// Maps a layout position to screen coordinates.
    pub fn to_screen(&self, point: Vec2) -> Vec2 {
        point * self.zoom + self.pan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(min: (f32, f32), max: (f32, f32)) -> Bounds {
        Bounds {
            min: Vec2::new(min.0, min.1),
            max: Vec2::new(max.0, max.1),
        }
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut viewport = Viewport::default();
        viewport.set_zoom(10.0);
        assert_eq!(viewport.zoom(), 4.0);
        viewport.set_zoom(0.1);
        assert_eq!(viewport.zoom(), 0.5);
        viewport.set_zoom(f32::NAN);
        assert_eq!(viewport.zoom(), 0.5);
    }

    #[test]
    fn test_fit_centers_bounds() {
        let mut viewport = Viewport::default();
        viewport.fit(Some(bounds((-100.0, -50.0), (300.0, 150.0))));

        let center = viewport.to_screen(Vec2::new(100.0, 50.0));
        assert!((center - Vec2::new(640.0, 360.0)).length() < 1e-3);
        assert!(viewport.zoom() >= 0.5 && viewport.zoom() <= 4.0);
    }

    #[test]
    fn test_fit_huge_graph_hits_min_zoom() {
        let mut viewport = Viewport::default();
        viewport.fit(Some(bounds((0.0, 0.0), (100_000.0, 100_000.0))));
        assert_eq!(viewport.zoom(), 0.5);
    }

    #[test]
    fn test_fit_single_point_uses_unit_zoom() {
        let mut viewport = Viewport::default();
        viewport.fit(Some(bounds((5.0, 5.0), (5.0, 5.0))));
        assert_eq!(viewport.zoom(), 1.0);
        assert_eq!(viewport.to_screen(Vec2::new(5.0, 5.0)), Vec2::new(640.0, 360.0));

        viewport.fit(None);
        assert_eq!(viewport.pan(), Vec2::new(640.0, 360.0));
    }

    #[test]
    fn test_degenerate_size_centers_on_clamped_screen() {
        let viewport = Viewport::from_config(&ViewportConfig {
            width: 0.0,
            height: -200.0,
            ..ViewportConfig::default()
        });
        assert_eq!(viewport.size(), Vec2::ONE);
        assert_eq!(viewport.pan(), Vec2::splat(0.5));
    }
}
