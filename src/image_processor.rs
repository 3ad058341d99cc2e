use image::ImageFormat;

use crate::errors::{AppError, AppResult};
use crate::security::InputValidator;

/// Dimensions and format of a decoded image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
}

impl ImageInfo {
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("img")
    }
}

/// MIME type sent for a file, detected from its extension
pub fn mime_type_for(file_name: &str) -> &'static str {
    match InputValidator::file_extension(file_name).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Decode `bytes` fully to make sure an image element will be able to show them.
pub fn verify_image_bytes(bytes: &[u8]) -> AppResult<ImageInfo> {
    if bytes.is_empty() {
        return Err(AppError::validation("image", "Image data is empty"));
    }

    let format = image::guess_format(bytes)?;
    let img = image::load_from_memory_with_format(bytes, format)?;

    log::debug!(
        "Decoded {:?} image {}x{} ({} bytes)",
        format,
        img.width(),
        img.height(),
        bytes.len()
    );

    Ok(ImageInfo {
        width: img.width(),
        height: img.height(),
        format,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    pub(crate) fn create_test_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
        let mut output = Vec::new();
        img.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
            .unwrap();
        output
    }

    #[test]
    fn test_mime_type_for() {
        assert_eq!(mime_type_for("a.png"), "image/png");
        assert_eq!(mime_type_for("a.JPG"), "image/jpeg");
        assert_eq!(mime_type_for("a.jpeg"), "image/jpeg");
        assert_eq!(mime_type_for("a.gif"), "image/gif");
        assert_eq!(mime_type_for("a.pdf"), "application/octet-stream");
        assert_eq!(mime_type_for("noext"), "application/octet-stream");
    }

    #[test]
    fn test_verify_image_bytes_valid_png() {
        let info = verify_image_bytes(&create_test_png(3, 2)).unwrap();
        assert_eq!(info.width, 3);
        assert_eq!(info.height, 2);
        assert_eq!(info.format, ImageFormat::Png);
        assert_eq!(info.extension(), "png");
    }

    #[test]
    fn test_verify_image_bytes_rejects_garbage() {
        assert!(verify_image_bytes(b"This is not an image").is_err());
        assert!(verify_image_bytes(&[]).is_err());
    }

    #[test]
    fn test_verify_image_bytes_rejects_truncated_png() {
        let png = create_test_png(16, 16);
        assert!(verify_image_bytes(&png[..png.len() / 2]).is_err());
    }
}
