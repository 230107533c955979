use crate::error::{DeckError, Result};
use image::{DynamicImage, RgbaImage};
use tiny_skia::{Color, Pixmap};

/// Size buttons are drawn at. The driver rescales to the device's key size.
pub const BUTTON_SIZE: u32 = 72;

/// Contrast kept by inactive buttons, in percent.
const INACTIVE_CONTRAST: u16 = 30;

/// Create a new pixmap filled with a solid background color.
///
/// # Errors
/// Returns `DeckError::Render` if the hex color is invalid or pixmap creation fails.
pub fn create_canvas(bg_hex: &str) -> Result<Pixmap> {
    let mut pixmap = Pixmap::new(BUTTON_SIZE, BUTTON_SIZE)
        .ok_or_else(|| DeckError::Render("failed to create pixmap".into()))?;

    let color = parse_hex_color(bg_hex)?;
    pixmap.fill(color);
    Ok(pixmap)
}

/// Pull every color channel toward mid grey, the look of a disabled key.
pub fn grey_out(canvas: &mut Pixmap) {
    for px in canvas.data_mut().chunks_exact_mut(4) {
        for channel in &mut px[..3] {
            let v = i32::from(*channel);
            *channel = (128 + (v - 128) * i32::from(INACTIVE_CONTRAST) / 100) as u8;
        }
    }
}

/// Convert a fully opaque canvas into an image for the device driver.
///
/// # Errors
/// Returns `DeckError::Render` if the pixel buffer does not match the size.
pub fn into_image(canvas: Pixmap) -> Result<DynamicImage> {
    let (w, h) = (canvas.width(), canvas.height());
    RgbaImage::from_raw(w, h, canvas.take())
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| DeckError::Render("pixel buffer size mismatch".into()))
}

/// Parse a hex color string like "#1a1a2e" or "#fff" into a tiny-skia Color.
///
/// # Errors
/// Returns `DeckError::Render` if the hex string is malformed.
pub fn parse_hex_color(hex: &str) -> Result<Color> {
    let hex = hex.trim_start_matches('#');
    let parse_err = || DeckError::Render(format!("invalid hex color: #{hex}"));
    let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| parse_err());

    if !hex.is_ascii() {
        return Err(parse_err());
    }

    let (r, g, b) = match hex.len() {
        3 => (
            channel(&hex[0..1].repeat(2))?,
            channel(&hex[1..2].repeat(2))?,
            channel(&hex[2..3].repeat(2))?,
        ),
        6 => (
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        ),
        _ => return Err(parse_err()),
    };

    Ok(Color::from_rgba8(r, g, b, 255))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_6_digit_hex() {
        let c = parse_hex_color("#1a1a2e").unwrap();
        assert_eq!(c.red(), 0x1a as f32 / 255.0);
    }

    #[test]
    fn parse_3_digit_hex() {
        let c = parse_hex_color("#fff").unwrap();
        assert_eq!(c.red(), 1.0);
        assert_eq!(c.green(), 1.0);
    }

    #[test]
    fn reject_garbage_hex() {
        assert!(parse_hex_color("#12345").is_err());
        assert!(parse_hex_color("#zzzzzz").is_err());
        assert!(parse_hex_color("#ééé").is_err());
    }

    #[test]
    fn grey_out_reduces_contrast() {
        let mut pm = create_canvas("#ffffff").unwrap();
        grey_out(&mut pm);
        let px = &pm.data()[..4];
        assert_eq!(px, &[166, 166, 166, 255]);

        let mut pm = create_canvas("#000000").unwrap();
        grey_out(&mut pm);
        assert_eq!(&pm.data()[..4], &[90, 90, 90, 255]);
    }

    #[test]
    fn canvas_converts_to_image() {
        let img = into_image(create_canvas("#ff0000").unwrap()).unwrap();
        assert_eq!(img.width(), BUTTON_SIZE);
        let rgba = img.to_rgba8();
        assert_eq!(rgba.get_pixel(0, 0).0, [255, 0, 0, 255]);
    }
}
