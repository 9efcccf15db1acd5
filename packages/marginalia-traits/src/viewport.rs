#[derive(Debug, Clone)]
pub struct Viewport {
    pub window_size: (u32, u32),

    hidpi_scale: f32,

    /// Line height in CSS pixels, used to convert `em` based hit ranges.
    pub font_size: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(800, 600, 1.0)
    }
}

impl Viewport {
    pub fn new(physical_width: u32, physical_height: u32, scale_factor: f32) -> Self {
        Self {
            window_size: (physical_width, physical_height),
            hidpi_scale: scale_factor,
            font_size: 16.0,
        }
    }

    pub fn scale(&self) -> f32 {
        self.hidpi_scale
    }

    pub fn set_hidpi_scale(&mut self, scale: f32) {
        self.hidpi_scale = scale;
    }

    /// The window size in CSS pixels
    pub fn css_size(&self) -> (f32, f32) {
        (
            self.window_size.0 as f32 / self.scale(),
            self.window_size.1 as f32 / self.scale(),
        )
    }
}
