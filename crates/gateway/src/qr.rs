//! QR payload to PNG data URL.

use std::io::Cursor;

use {
    base64::{Engine as _, engine::general_purpose::STANDARD},
    image::{ImageBuffer, ImageFormat, Luma},
    qrcode::{Color, EcLevel, QrCode},
};

use crate::error::Result;

const MODULE_SIZE: u32 = 4;
const QUIET_ZONE: u32 = 4;

/// Render `payload` as a QR code and return it as a `data:image/png;base64,`
/// URL the UI can use directly as an `<img src>`.
pub fn qr_data_url(payload: &str) -> Result<String> {
    let png = render_png(payload)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

fn render_png(payload: &str) -> Result<Vec<u8>> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M)?;
    let modules = code.width() as u32;
    let size = (modules + QUIET_ZONE * 2) * MODULE_SIZE;

    let img = ImageBuffer::from_fn(size, size, |x, y| {
        let (cx, cy) = (x / MODULE_SIZE, y / MODULE_SIZE);
        let inside = (QUIET_ZONE..QUIET_ZONE + modules).contains(&cx)
            && (QUIET_ZONE..QUIET_ZONE + modules).contains(&cy);
        if !inside {
            return Luma([255u8]);
        }
        match code[((cx - QUIET_ZONE) as usize, (cy - QUIET_ZONE) as usize)] {
            Color::Dark => Luma([0u8]),
            Color::Light => Luma([255u8]),
        }
    });

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_wraps_a_png() {
        let url = qr_data_url("2@AbCdEf,GhIjKl,MnOpQr==").unwrap();
        let encoded = url.strip_prefix("data:image/png;base64,").unwrap();
        let png = STANDARD.decode(encoded).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn image_includes_quiet_zone() {
        let png = render_png("hello").unwrap();
        let img = image::load_from_memory_with_format(&png, ImageFormat::Png)
            .unwrap()
            .to_luma8();
        let code = QrCode::with_error_correction_level(b"hello", EcLevel::M).unwrap();
        let expected = (code.width() as u32 + QUIET_ZONE * 2) * MODULE_SIZE;
        assert_eq!(img.width(), expected);
        assert_eq!(img.get_pixel(0, 0), &Luma([255u8]));
        // Top-left finder pattern starts right after the quiet zone.
        let corner = QUIET_ZONE * MODULE_SIZE;
        assert_eq!(img.get_pixel(corner, corner), &Luma([0u8]));
    }
}
