use bytes::Bytes;
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, GenericImageView};
use thiserror::Error;
use tracing::info;

/// Anything shorter can't be a real drawing.
pub const MIN_UPLOAD_BYTES: usize = 100;
/// Longest side sent to detection sources; larger images are downscaled first.
pub const DEFAULT_MAX_DIMENSION: u32 = 1536;
const JPEG_QUALITY: u8 = 85;

const SIGNATURES: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "png"),
    (b"\xff\xd8\xff", "jpeg"),
    (b"GIF87a", "gif"),
    (b"GIF89a", "gif"),
    (b"BM", "bmp"),
];

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("empty upload")]
    Empty,
    #[error("file too small ({0} bytes); please upload a valid image file")]
    TooSmall(usize),
    #[error("invalid image format; please upload a PNG, JPEG, GIF, or BMP file")]
    UnrecognizedSignature,
    #[error("cannot decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("invalid image dimensions: {0}x{1}")]
    InvalidDimensions(u32, u32),
    #[error("cannot re-encode resized image: {0}")]
    Encode(#[source] image::ImageError),
}

/// The image as sent to detection sources. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub bytes: Bytes,
    pub format: &'static str,
    pub width: u32,
    pub height: u32,
    pub original_width: u32,
    pub original_height: u32,
}

impl PreparedImage {
    pub fn resized(&self) -> bool {
        (self.width, self.height) != (self.original_width, self.original_height)
    }
}

pub fn sniff_format(data: &[u8]) -> Result<&'static str, ImageError> {
    if data.is_empty() {
        return Err(ImageError::Empty);
    }
    if data.len() < MIN_UPLOAD_BYTES {
        return Err(ImageError::TooSmall(data.len()));
    }
    SIGNATURES
        .iter()
        .find(|(sig, _)| data.starts_with(sig))
        .map(|(_, fmt)| *fmt)
        .ok_or(ImageError::UnrecognizedSignature)
}

/// Validates an upload and downscales it so its longest side is at most `max_dimension`.
///
/// Images already within the limit are passed through byte for byte; resized ones are
/// re-encoded as JPEG.
pub fn prepare_image(data: Bytes, max_dimension: u32) -> Result<PreparedImage, ImageError> {
    let format = sniff_format(&data)?;
    let img = image::load_from_memory(&data).map_err(ImageError::Decode)?;
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Err(ImageError::InvalidDimensions(w, h));
    }

    let longest = w.max(h);
    if max_dimension == 0 || longest <= max_dimension {
        info!("image: {}x{} {} within limit, no resize", w, h, format);
        return Ok(PreparedImage { bytes: data, format, width: w, height: h, original_width: w, original_height: h });
    }

    let factor = max_dimension as f64 / longest as f64;
    let nw = ((w as f64 * factor) as u32).max(1);
    let nh = ((h as f64 * factor) as u32).max(1);
    let rgb = img.resize_exact(nw, nh, FilterType::Lanczos3).to_rgb8();

    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(ImageError::Encode)?;

    info!("image: resized {}x{} -> {}x{} (factor {:.2})", w, h, nw, nh, factor);
    Ok(PreparedImage {
        bytes: Bytes::from(buf),
        format: "jpeg",
        width: nw,
        height: nh,
        original_width: w,
        original_height: h,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    fn encoded(w: u32, h: u32, format: ImageFormat) -> Bytes {
        let img = RgbImage::from_fn(w, h, |x, y| image::Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x ^ y) % 256) as u8]));
        let img = match format {
            // the gif encoder wants rgba
            ImageFormat::Gif => DynamicImage::ImageRgba8(DynamicImage::ImageRgb8(img).to_rgba8()),
            _ => DynamicImage::ImageRgb8(img),
        };
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        Bytes::from(buf)
    }

    fn png(w: u32, h: u32) -> Bytes {
        encoded(w, h, ImageFormat::Png)
    }

    #[test]
    fn rejects_bad_uploads() {
        assert!(matches!(prepare_image(Bytes::new(), 1536), Err(ImageError::Empty)));
        assert!(matches!(prepare_image(Bytes::from_static(b"\x89PNG"), 1536), Err(ImageError::TooSmall(4))));
        assert!(matches!(prepare_image(Bytes::from(vec![b'x'; 200]), 1536), Err(ImageError::UnrecognizedSignature)));

        let mut fake = b"\xff\xd8\xff".to_vec();
        fake.resize(300, 0);
        assert!(matches!(prepare_image(Bytes::from(fake), 1536), Err(ImageError::Decode(_))));
    }

    #[test]
    fn size_floor_is_inclusive() {
        let mut data = b"BM".to_vec();
        data.resize(MIN_UPLOAD_BYTES - 1, 0);
        assert!(matches!(sniff_format(&data), Err(ImageError::TooSmall(99))));
        data.push(0);
        assert_eq!(sniff_format(&data).unwrap(), "bmp");
        assert!(matches!(sniff_format(b"GIF87a"), Err(ImageError::TooSmall(6))));
    }

    #[test]
    fn gif_and_bmp_uploads_are_accepted() {
        for (format, name) in [(ImageFormat::Gif, "gif"), (ImageFormat::Bmp, "bmp")] {
            let data = encoded(40, 30, format);
            let out = prepare_image(data.clone(), 1536).unwrap();
            assert_eq!(out.format, name);
            assert_eq!((out.width, out.height), (40, 30));
            assert!(!out.resized());
            assert_eq!(out.bytes, data);
        }
    }

    #[test]
    fn small_image_passes_through() {
        let data = png(300, 200);
        let out = prepare_image(data.clone(), 1536).unwrap();
        assert_eq!((out.width, out.height), (300, 200));
        assert!(!out.resized());
        assert_eq!(out.format, "png");
        assert_eq!(out.bytes, data);
    }

    #[test]
    fn large_image_is_downscaled_keeping_aspect() {
        let out = prepare_image(png(400, 200), 100).unwrap();
        assert_eq!((out.width, out.height), (100, 50));
        assert_eq!((out.original_width, out.original_height), (400, 200));
        assert!(out.resized());
        assert_eq!(out.format, "jpeg");
        assert!(out.bytes.starts_with(b"\xff\xd8\xff"));
    }
}
