pub mod canvas;
pub mod text;

use crate::button::{Appearance, Button, DeckButton};
use crate::config::schema::ButtonDefaults;
use crate::error::Result;
use ab_glyph::FontVec;
use canvas::create_canvas;
use image::DynamicImage;
use std::path::Path;

/// Turns button state into key images.
pub struct Renderer {
    defaults: ButtonDefaults,
    font: Option<FontVec>,
}

impl Renderer {
    /// Build a renderer, loading the label font if one is configured.
    ///
    /// # Errors
    /// Returns `DeckError::Font` if the configured font cannot be loaded.
    pub fn new(defaults: ButtonDefaults, font_path: Option<&Path>) -> Result<Self> {
        let font = font_path.map(text::load_font).transpose()?;
        Ok(Self { defaults, font })
    }

    #[must_use]
    pub const fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Render a button as it should currently look.
    ///
    /// # Errors
    /// Returns `DeckError::Render` if a configured color is invalid.
    pub fn render(&self, button: &DeckButton) -> Result<DynamicImage> {
        self.render_appearance(button.appearance(), button.is_active())
    }

    /// Render an appearance; inactive buttons are greyed out.
    ///
    /// # Errors
    /// Returns `DeckError::Render` if a configured color is invalid.
    pub fn render_appearance(&self, appearance: &Appearance, active: bool) -> Result<DynamicImage> {
        let bg = appearance
            .background
            .as_deref()
            .unwrap_or(&self.defaults.background);
        let text_color = appearance
            .text_color
            .as_deref()
            .unwrap_or(&self.defaults.text_color);

        let mut pm = create_canvas(bg)?;

        if let (Some(label), Some(font)) = (&appearance.label, &self.font) {
            text::render_text(&mut pm, font, label, text_color, self.defaults.font_size)?;
        }

        if !active {
            canvas::grey_out(&mut pm);
        }

        canvas::into_image(pm)
    }
}
