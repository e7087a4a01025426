//! Configuration for SVG rendering

/// Root node defaults for generated documents
#[derive(Debug, Clone)]
pub struct SvgConfig {
    /// Root `width` attribute
    pub width: f64,

    /// Root `height` attribute
    pub height: f64,

    /// Root `viewBox` attribute
    pub view_box: String,

    /// Root `preserveAspectRatio` attribute
    pub preserve_aspect_ratio: String,

    /// Whether to format output with indentation
    pub pretty_print: bool,
}

impl Default for SvgConfig {
    fn default() -> Self {
        Self {
            width: 1600.0,
            height: 900.0,
            view_box: "0 0 1600 800".to_string(),
            preserve_aspect_ratio: "xMinYMin none".to_string(),
            pretty_print: false,
        }
    }
}

impl SvgConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the root size
    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the root viewBox
    pub fn with_view_box(mut self, view_box: impl Into<String>) -> Self {
        self.view_box = view_box.into();
        self
    }

    /// Set whether to pretty-print output
    pub fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }
}

/// Per-render switches, threaded through one descriptor's render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// When false, animations are stripped from the rendered document
    pub animations: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { animations: true }
    }
}

impl RenderOptions {
    pub fn without_animations(mut self) -> Self {
        self.animations = false;
        self
    }
}
