//! Square RGB frames shared by the decoder, the model and the encoder.

use image::imageops::FilterType;
use std::path::Path;

use crate::error::{MediaError, MediaResult};

/// Packed RGB8 frame in row-major HWC order.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    pub const CHANNELS: usize = 3;

    /// Wrap a packed RGB8 buffer.
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> MediaResult<Self> {
        let expected = Self::byte_len(width, height);
        if data.len() != expected {
            return Err(MediaError::internal(format!(
                "frame buffer is {} bytes, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A frame filled with one colour.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(Self::byte_len(width, height))
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    /// Bytes needed for one RGB8 frame.
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * Self::CHANNELS
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Planar CHW floats in `[0, 1]`, the layout the networks consume.
    pub fn to_chw(&self) -> Vec<f32> {
        let plane = self.width as usize * self.height as usize;
        let mut chw = vec![0.0f32; plane * Self::CHANNELS];
        for (i, px) in self.data.chunks_exact(Self::CHANNELS).enumerate() {
            for c in 0..Self::CHANNELS {
                chw[c * plane + i] = px[c] as f32 / 255.0;
            }
        }
        chw
    }

    /// Build a frame from planar CHW floats, clamping to `[0, 1]` first.
    pub fn from_chw(width: u32, height: u32, chw: &[f32]) -> MediaResult<Self> {
        let plane = width as usize * height as usize;
        if chw.len() != plane * Self::CHANNELS {
            return Err(MediaError::inference(format!(
                "generator produced {} values, expected {}",
                chw.len(),
                plane * Self::CHANNELS
            )));
        }

        let mut data = Vec::with_capacity(plane * Self::CHANNELS);
        for i in 0..plane {
            for c in 0..Self::CHANNELS {
                let v = chw[c * plane + i];
                let v = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
                data.push((v * 255.0).round() as u8);
            }
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }
}

/// Read a still image, drop any alpha channel and resize to `size`x`size`.
pub fn load_source_image(path: &Path, size: u32) -> MediaResult<Frame> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    // stored upload names may lack an extension, so sniff the content
    let img = image::io::Reader::open(path)?
        .with_guessed_format()?
        .decode()?
        .to_rgb8();
    let resized = image::imageops::resize(&img, size, size, FilterType::Triangle);
    Frame::from_rgb(size, size, resized.into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chw_layout() {
        let frame = Frame::from_rgb(2, 1, vec![255, 0, 0, 0, 255, 0]).unwrap();
        let chw = frame.to_chw();
        // R plane, then G plane, then B plane
        assert_eq!(chw, vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

        let back = Frame::from_chw(2, 1, &chw).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn test_from_chw_clamps() {
        let frame = Frame::from_chw(1, 1, &[1.7, -0.3, f32::NAN]).unwrap();
        assert_eq!(frame.as_bytes(), &[255, 0, 0]);
    }

    #[test]
    fn test_buffer_size_checked() {
        assert!(Frame::from_rgb(2, 2, vec![0; 5]).is_err());
        assert!(Frame::from_chw(2, 2, &[0.0; 3]).is_err());
    }

    #[test]
    fn test_load_source_image_drops_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.png");
        image::RgbaImage::from_pixel(40, 20, image::Rgba([10, 20, 30, 128]))
            .save(&path)
            .unwrap();

        let frame = load_source_image(&path, 16).unwrap();
        assert_eq!((frame.width(), frame.height()), (16, 16));
        assert_eq!(frame.as_bytes().len(), 16 * 16 * 3);
        assert_eq!(&frame.as_bytes()[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_load_missing_image() {
        let err = load_source_image(Path::new("/nonexistent/face.png"), 256).unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }

    #[test]
    fn test_load_source_image_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0b6f_png");
        image::RgbImage::from_pixel(8, 8, image::Rgb([200, 100, 50]))
            .save_with_format(&path, image::ImageFormat::Png)
            .unwrap();

        let frame = load_source_image(&path, 8).unwrap();
        assert_eq!(&frame.as_bytes()[..3], &[200, 100, 50]);
    }
}
