use std::path::Path;

use lumen_common::Image;

use crate::AssetError;

/// Load an image file (PNG or JPEG) and convert it to RGBA8.
pub fn load_image(path: impl AsRef<Path>) -> Result<Image, AssetError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let image = decode_image(&bytes)?;
    tracing::debug!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "loaded image"
    );
    Ok(image)
}

/// Decode an encoded image held in memory.
pub fn decode_image(bytes: &[u8]) -> Result<Image, AssetError> {
    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(Image::new(width, height, rgba.into_raw())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode_png(width: u32, height: u32, pixel: [u8; 4]) -> Vec<u8> {
        let buffer = image::RgbaImage::from_pixel(width, height, image::Rgba(pixel));
        let mut bytes = Vec::new();
        buffer
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn decodes_png_to_rgba8() {
        let image = decode_image(&encode_png(3, 2, [10, 20, 30, 255])).unwrap();
        assert_eq!(image.width(), 3);
        assert_eq!(image.height(), 2);
        assert_eq!(image.pixels().len(), 3 * 2 * 4);
        assert_eq!(&image.pixels()[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            decode_image(b"definitely not a png"),
            Err(AssetError::Decode(_))
        ));
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");
        std::fs::write(&path, encode_png(4, 4, [255, 0, 0, 255])).unwrap();
        let image = load_image(&path).unwrap();
        assert_eq!(image.extent(), lumen_common::Extent::new(4, 4));

        assert!(matches!(
            load_image(dir.path().join("absent.png")),
            Err(AssetError::Io { .. })
        ));
    }
}
