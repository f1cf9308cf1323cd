//! Image transcoding between the supported raster formats.

use crate::media::MediaKind;
use crate::{FragmentError, Result};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

fn image_format(kind: MediaKind) -> Result<ImageFormat> {
    match kind {
        MediaKind::Png => Ok(ImageFormat::Png),
        MediaKind::Jpeg => Ok(ImageFormat::Jpeg),
        MediaKind::Webp => Ok(ImageFormat::WebP),
        MediaKind::Gif => Ok(ImageFormat::Gif),
        MediaKind::Avif => Ok(ImageFormat::Avif),
        other => Err(FragmentError::conversion_failed(format!(
            "{other} is not an image format"
        ))),
    }
}

/// Decode `data` as `from` and re-encode it as `to`
///
/// JPEG has no alpha channel, so JPEG output is flattened to RGB first.
pub(super) fn transcode(from: MediaKind, to: MediaKind, data: &[u8]) -> Result<Vec<u8>> {
    let source = image::load_from_memory_with_format(data, image_format(from)?)
        .map_err(|e| FragmentError::conversion_failed(format!("failed to decode {from}: {e}")))?;

    let prepared = match to {
        MediaKind::Jpeg => DynamicImage::ImageRgb8(source.to_rgb8()),
        _ => DynamicImage::ImageRgba8(source.to_rgba8()),
    };

    let mut out = Cursor::new(Vec::new());
    prepared
        .write_to(&mut out, image_format(to)?)
        .map_err(|e| FragmentError::conversion_failed(format!("failed to encode {to}: {e}")))?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};

    fn sample_png() -> Vec<u8> {
        let img = RgbaImage::from_fn(4, 3, |x, y| Rgba([(x * 60) as u8, (y * 80) as u8, 128, 255]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_png_to_decodable_targets() {
        let png = sample_png();
        for (target, format) in [
            (MediaKind::Jpeg, ImageFormat::Jpeg),
            (MediaKind::Webp, ImageFormat::WebP),
            (MediaKind::Gif, ImageFormat::Gif),
        ] {
            let encoded = transcode(MediaKind::Png, target, &png).unwrap();
            let decoded = image::load_from_memory_with_format(&encoded, format).unwrap();
            assert_eq!(decoded.dimensions(), (4, 3), "{target} keeps dimensions");
        }
    }

    #[test]
    fn test_jpeg_back_to_png() {
        let jpeg = transcode(MediaKind::Png, MediaKind::Jpeg, &sample_png()).unwrap();
        let png = transcode(MediaKind::Jpeg, MediaKind::Png, &jpeg).unwrap();
        assert_eq!(image::guess_format(&png).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_png_to_avif_produces_output() {
        let avif = transcode(MediaKind::Png, MediaKind::Avif, &sample_png()).unwrap();
        assert!(!avif.is_empty());
    }

    #[cfg(feature = "avif-decode")]
    #[test]
    fn test_avif_decodes_back_to_png() {
        let avif = transcode(MediaKind::Png, MediaKind::Avif, &sample_png()).unwrap();
        let png = transcode(MediaKind::Avif, MediaKind::Png, &avif).unwrap();
        let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
        assert_eq!(decoded.dimensions(), (4, 3));
    }

    #[test]
    fn test_mislabelled_source_fails() {
        let png = sample_png();
        let err = transcode(MediaKind::Gif, MediaKind::Png, &png).unwrap_err();
        assert!(matches!(err, FragmentError::ConversionFailed(_)));
    }

    #[test]
    fn test_text_kind_is_not_an_image_format() {
        assert!(image_format(MediaKind::Csv).is_err());
    }
}
