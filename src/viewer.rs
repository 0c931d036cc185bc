//! Page viewer state: current page, display rendering and wheel zoom

use crate::error::{Error, Result};
use crate::pdf::{encode_png, PageSource};
use base64::Engine;
use serde::Serialize;

/// Zoom multiplier for one wheel notch towards the user
pub const ZOOM_IN_FACTOR: f64 = 1.25;
/// Zoom multiplier for one wheel notch away from the user
pub const ZOOM_OUT_FACTOR: f64 = 0.8;

/// Rendered page image data
#[derive(Debug, Clone, Serialize)]
pub struct RenderedPage {
    /// Page index (0 = placeholder)
    pub page: u32,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Current view zoom applied on top of the render scale
    pub zoom: f64,
    /// Base64-encoded PNG image data
    pub data_base64: String,
    /// MIME type (always "image/png")
    pub mime_type: String,
}

/// Pannable/zoomable view over one page at a time
#[derive(Debug, Clone)]
pub struct Viewer {
    current_page: u32,
    zoom: f64,
    render_scale: f32,
}

impl Viewer {
    pub fn new(render_scale: f32) -> Self {
        Self {
            current_page: 0,
            zoom: 1.0,
            render_scale,
        }
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Move to a page after checking it exists in `pages`
    pub fn go_to(&mut self, page: u32, page_count: u32) -> Result<()> {
        if page >= page_count {
            return Err(Error::PageOutOfBounds {
                page,
                total: page_count,
            });
        }
        self.current_page = page;
        Ok(())
    }

    /// Apply one wheel event; positive deltas zoom in, anything else zooms out
    pub fn wheel(&mut self, delta: i32) -> f64 {
        let factor = if delta > 0 {
            ZOOM_IN_FACTOR
        } else {
            ZOOM_OUT_FACTOR
        };
        self.zoom *= factor;
        self.zoom
    }

    /// Forget the current page and zoom (document replaced)
    pub fn reset(&mut self) {
        self.current_page = 0;
        self.zoom = 1.0;
    }

    /// Render the current page for display
    pub fn render(&self, pages: &dyn PageSource) -> Result<RenderedPage> {
        let image = pages.render_page(self.current_page, self.render_scale)?;
        let png = encode_png(&image)?;

        Ok(RenderedPage {
            page: self.current_page,
            width: image.width(),
            height: image.height(),
            zoom: self.zoom,
            data_base64: base64::engine::general_purpose::STANDARD.encode(&png),
            mime_type: "image/png".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::testing::FakePages;

    #[test]
    fn test_wheel_zoom_is_unbounded() {
        let mut viewer = Viewer::new(2.0);
        assert_eq!(viewer.wheel(120), 1.25);
        assert!((viewer.wheel(120) - 1.5625).abs() < 1e-9);

        let mut viewer = Viewer::new(2.0);
        for _ in 0..50 {
            viewer.wheel(-120);
        }
        assert!(viewer.zoom() > 0.0);
        assert!(viewer.zoom() < 1e-4);
    }

    #[test]
    fn test_zero_delta_zooms_out() {
        let mut viewer = Viewer::new(2.0);
        assert_eq!(viewer.wheel(0), 0.8);
    }

    #[test]
    fn test_go_to_out_of_bounds() {
        let mut viewer = Viewer::new(2.0);
        assert!(viewer.go_to(2, 3).is_ok());
        assert!(matches!(
            viewer.go_to(3, 3),
            Err(Error::PageOutOfBounds { page: 3, total: 3 })
        ));
        assert_eq!(viewer.current_page(), 2);
    }

    #[test]
    fn test_render_uses_display_scale() {
        let pages = FakePages { pages: 2 };
        let mut viewer = Viewer::new(2.0);
        viewer.go_to(1, 2).unwrap();

        let rendered = viewer.render(&pages).unwrap();
        assert_eq!(rendered.page, 1);
        assert_eq!(rendered.width, 20);
        assert_eq!(rendered.height, 20);
        assert_eq!(rendered.mime_type, "image/png");
        assert!(!rendered.data_base64.is_empty());
    }
}
