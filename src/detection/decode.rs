use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use image::RgbaImage;

/// Turns an encoded capture into an RGBA raster.
///
/// The detector only ever talks to this trait, so hosts can swap in their own
/// decoder (GPU readback, cached frames, ...) without touching comparison logic.
#[async_trait]
pub trait ImageDecoder: Send + Sync {
    async fn decode(&self, encoded: &str) -> Result<RgbaImage>;
}

/// Base64 PNG/JPEG decoder backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterDecoder;

#[async_trait]
impl ImageDecoder for RasterDecoder {
    async fn decode(&self, encoded: &str) -> Result<RgbaImage> {
        let payload = strip_data_uri(encoded).trim().to_string();
        tokio::task::spawn_blocking(move || decode_base64_raster(&payload))
            .await
            .context("image decode worker join failed")?
    }
}

/// Drops a leading `data:<mime>;base64,` marker if present.
pub fn strip_data_uri(encoded: &str) -> &str {
    if encoded.starts_with("data:") {
        if let Some((_, payload)) = encoded.split_once(',') {
            return payload;
        }
    }
    encoded
}

pub fn decode_base64_raster(payload: &str) -> Result<RgbaImage> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .context("capture is not valid base64")?;
    let img = image::load_from_memory(&bytes).context("capture is not a decodable image")?;
    Ok(img.to_rgba8())
}
