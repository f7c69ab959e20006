//! Turns the data URL posted by the drawing client into the inline image
//! payload sent upstream.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use regex::Regex;
use sha2::{Digest, Sha256};

pub const MAX_CANVAS_DIM: u32 = 1600;
const JPEG_QUALITY: u8 = 90;
const DEFAULT_MIME: &str = "image/png";

static DATA_URL_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^data:image/(\w+);base64,").expect("valid regex literal"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedImage {
    /// Base64 payload, without any data-URL prefix.
    pub data: String,
    pub mime_type: String,
    /// First 12 hex chars of the sha256 of the decoded bytes (or of the raw
    /// payload when it is not valid base64). Used to correlate logs.
    pub digest: String,
    pub dimensions: Option<(u32, u32)>,
    pub reencoded: bool,
}

/// Splits `data:image/<fmt>;base64,<payload>` into a MIME type and payload.
/// Text without the prefix is taken as a bare PNG payload.
pub fn split_data_url(raw: &str) -> (String, &str) {
    let Some(caps) = DATA_URL_PREFIX.captures(raw) else {
        return (DEFAULT_MIME.to_string(), raw);
    };
    let format = caps[1].to_ascii_lowercase();
    let mime = match format.as_str() {
        "jpg" => "image/jpeg".to_string(),
        _ => format!("image/{format}"),
    };
    (mime, &raw[caps[0].len()..])
}

/// Normalizes a drawn canvas for the vision model.
///
/// Images with transparency are flattened onto the black canvas background and
/// anything larger than [`MAX_CANVAS_DIM`] is downscaled; either change
/// re-encodes as JPEG. Payloads that are not decodable images are forwarded
/// untouched and left for the upstream call to reject.
pub fn prepare_canvas_image(raw: &str) -> PreparedImage {
    let (mime_type, payload) = split_data_url(raw.trim());
    let passthrough = |digest: String, dimensions: Option<(u32, u32)>| PreparedImage {
        data: payload.to_string(),
        mime_type: mime_type.clone(),
        digest,
        dimensions,
        reencoded: false,
    };

    let Ok(bytes) = BASE64.decode(payload.as_bytes()) else {
        return passthrough(short_digest(payload.as_bytes()), None);
    };
    let digest = short_digest(&bytes);
    let Ok(image) = image::load_from_memory(&bytes) else {
        return passthrough(digest, None);
    };

    let (width, height) = image.dimensions();
    let oversized = width.max(height) > MAX_CANVAS_DIM;
    if !oversized && !image.color().has_alpha() {
        return passthrough(digest, Some((width, height)));
    }

    match flatten_and_encode(image, oversized) {
        Ok((encoded, dimensions)) => PreparedImage {
            data: BASE64.encode(encoded),
            mime_type: "image/jpeg".to_string(),
            digest,
            dimensions: Some(dimensions),
            reencoded: true,
        },
        Err(_) => passthrough(digest, Some((width, height))),
    }
}

fn flatten_and_encode(image: DynamicImage, downscale: bool) -> Result<(Vec<u8>, (u32, u32))> {
    let rgba = image.to_rgba8();
    let mut flattened = RgbaImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u16::from(pixel[3]);
        let blend = |channel: u8| -> u8 { ((u16::from(channel) * alpha) / 255) as u8 };
        flattened.put_pixel(
            x,
            y,
            Rgba([blend(pixel[0]), blend(pixel[1]), blend(pixel[2]), 255]),
        );
    }

    let mut flattened = DynamicImage::ImageRgba8(flattened);
    if downscale {
        flattened = flattened.resize(MAX_CANVAS_DIM, MAX_CANVAS_DIM, FilterType::Triangle);
    }
    let rgb = flattened.to_rgb8();
    let dimensions = rgb.dimensions();

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
        .encode_image(&rgb)
        .context("canvas JPEG encode failed")?;
    Ok((bytes, dimensions))
}

pub fn short_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..6])
}
