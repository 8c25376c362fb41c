//! Overlay image sources
//!
//! Overlays keep the raw PNG bytes the user selected. The pixels are decoded
//! once up front to reject unusable files, and again at commit time when the
//! image is converted into PDF image streams.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::StampError;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// A validated PNG image staged as an overlay source
#[derive(Clone, PartialEq)]
pub struct OverlayImage {
    bytes: Arc<[u8]>,
    width: u32,
    height: u32,
}

impl fmt::Debug for OverlayImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayImage")
            .field("len", &self.bytes.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl OverlayImage {
    /// Validate raw PNG bytes
    pub fn from_png_bytes(bytes: &[u8]) -> Result<Self, StampError> {
        let decoded = decode_png(bytes)?;
        Ok(Self {
            bytes: Arc::from(bytes),
            width: decoded.width,
            height: decoded.height,
        })
    }

    /// Validate a `data:image/png;base64,...` URL, as produced by a file reader
    pub fn from_data_url(url: &str) -> Result<Self, StampError> {
        let payload = url
            .strip_prefix(PNG_DATA_URL_PREFIX)
            .ok_or_else(|| StampError::Decode("expected a base64 PNG data URL".to_string()))?;
        let bytes = B64
            .decode(payload.trim().as_bytes())
            .map_err(|e| StampError::Decode(format!("invalid base64: {}", e)))?;
        Self::from_png_bytes(&bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("{}{}", PNG_DATA_URL_PREFIX, B64.encode(&self.bytes))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Pixel width
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Pixel height
    pub fn height(&self) -> u32 {
        self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColorSpace {
    Gray,
    Rgb,
}

impl ColorSpace {
    pub(crate) fn pdf_name(self) -> &'static str {
        match self {
            ColorSpace::Gray => "DeviceGray",
            ColorSpace::Rgb => "DeviceRGB",
        }
    }
}

/// 8-bit pixels split into color samples and an optional alpha plane
pub(crate) struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    pub color: Vec<u8>,
    pub alpha: Option<Vec<u8>>,
}

pub(crate) fn decode_png(bytes: &[u8]) -> Result<DecodedImage, StampError> {
    if !bytes.starts_with(PNG_SIGNATURE) {
        return Err(StampError::Decode("not a PNG file".to_string()));
    }

    let mut decoder = png::Decoder::new(bytes);
    // Palette and low bit depths become plain 8-bit samples
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder
        .read_info()
        .map_err(|e| StampError::Decode(e.to_string()))?;

    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| StampError::Decode(e.to_string()))?;
    buf.truncate(info.buffer_size());

    if info.width == 0 || info.height == 0 {
        return Err(StampError::Decode("image has no pixels".to_string()));
    }

    let (color_space, color, alpha) = match info.color_type {
        png::ColorType::Rgb => (ColorSpace::Rgb, buf, None),
        png::ColorType::Grayscale => (ColorSpace::Gray, buf, None),
        png::ColorType::Rgba => {
            let (color, alpha) = split_alpha(&buf, 4);
            (ColorSpace::Rgb, color, Some(alpha))
        }
        png::ColorType::GrayscaleAlpha => {
            let (color, alpha) = split_alpha(&buf, 2);
            (ColorSpace::Gray, color, Some(alpha))
        }
        other => {
            return Err(StampError::Decode(format!(
                "unsupported color type {:?}",
                other
            )))
        }
    };

    Ok(DecodedImage {
        width: info.width,
        height: info.height,
        color_space,
        color,
        alpha: alpha.filter(|plane| plane.iter().any(|&a| a != 0xFF)),
    })
}

fn split_alpha(pixels: &[u8], channels: usize) -> (Vec<u8>, Vec<u8>) {
    let count = pixels.len() / channels;
    let mut color = Vec::with_capacity(count * (channels - 1));
    let mut alpha = Vec::with_capacity(count);
    for pixel in pixels.chunks_exact(channels) {
        color.extend_from_slice(&pixel[..channels - 1]);
        alpha.push(pixel[channels - 1]);
    }
    (color, alpha)
}

/// Zlib-compress a sample plane for a `/FlateDecode` stream
pub(crate) fn deflate(data: &[u8]) -> Result<Vec<u8>, StampError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| StampError::Embed(e.to_string()))?;
    encoder.finish().map_err(|e| StampError::Embed(e.to_string()))
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Encode a solid-colour PNG for tests
    pub fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, width, height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            let data: Vec<u8> = (0..width * height).flat_map(|_| rgba).collect();
            writer.write_image_data(&data).unwrap();
        }
        out
    }
}
