use crate::error::{DeckError, Result};
use crate::render::canvas::{parse_hex_color, BUTTON_SIZE};
use ab_glyph::{Font, FontVec, PxScale, PxScaleFont, ScaleFont};
use std::path::Path;
use tiny_skia::Pixmap;

/// Read a TTF/OTF font for button labels.
///
/// # Errors
/// Returns `DeckError::Font` if the file is missing or not a usable font.
pub fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = std::fs::read(path).map_err(|e| DeckError::Font {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    FontVec::try_from_vec(bytes).map_err(|e| DeckError::Font {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Rasterize text centered on the canvas. `\n` starts a new line.
///
/// # Errors
/// Returns `DeckError::Render` if the color is invalid.
pub fn render_text<F: Font>(
    canvas: &mut Pixmap,
    font: &F,
    text: &str,
    color_hex: &str,
    font_size: f32,
) -> Result<()> {
    let color = parse_hex_color(color_hex)?;
    let rgb = [
        (color.red() * 255.0) as u8,
        (color.green() * 255.0) as u8,
        (color.blue() * 255.0) as u8,
    ];

    let scale = PxScale::from(font_size);
    let scaled_font = font.as_scaled(scale);

    let lines: Vec<&str> = text.split('\n').collect();
    let line_height = scaled_font.height();
    let total_height = line_height * lines.len() as f32;
    let start_y = ((BUTTON_SIZE as f32 - total_height) / 2.0).max(2.0);

    let canvas_w = canvas.width() as i32;
    let canvas_h = canvas.height() as i32;
    let data = canvas.data_mut();

    for (line_idx, line) in lines.iter().enumerate() {
        let line_width = measure_line(&scaled_font, line);
        let mut cursor_x = ((BUTTON_SIZE as f32 - line_width) / 2.0).max(1.0);
        let baseline = start_y + line_height * (line_idx as f32 + 0.8);
        let mut prev = None;

        for ch in line.chars() {
            let glyph_id = scaled_font.glyph_id(ch);
            if let Some(prev) = prev {
                cursor_x += scaled_font.kern(prev, glyph_id);
            }

            let glyph = glyph_id.with_scale_and_position(scale, ab_glyph::point(cursor_x, baseline));
            if let Some(outlined) = scaled_font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|px, py, coverage| {
                    let x = px as i32 + bounds.min.x as i32;
                    let y = py as i32 + bounds.min.y as i32;
                    if x >= 0 && x < canvas_w && y >= 0 && y < canvas_h {
                        let idx = (y * canvas_w + x) as usize * 4;
                        blend(&mut data[idx..idx + 4], rgb, coverage);
                    }
                });
            }

            cursor_x += scaled_font.h_advance(glyph_id);
            prev = Some(glyph_id);
        }
    }

    Ok(())
}

/// Alpha-blend `rgb` over an opaque pixel.
fn blend(px: &mut [u8], rgb: [u8; 3], coverage: f32) {
    let alpha = u16::from((coverage.clamp(0.0, 1.0) * 255.0) as u8);
    let inv = 255 - alpha;
    for (dst, src) in px.iter_mut().zip(rgb) {
        *dst = ((u16::from(src) * alpha + u16::from(*dst) * inv) / 255) as u8;
    }
    px[3] = 255;
}

fn measure_line<F: Font>(font: &PxScaleFont<&F>, text: &str) -> f32 {
    let mut width = 0.0f32;
    let mut prev = None;
    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev_id) = prev {
            width += font.kern(prev_id, glyph_id);
        }
        width += font.h_advance(glyph_id);
        prev = Some(glyph_id);
    }
    width
}
