//! Image payload decoding into premultiplied RGBA8.

use std::sync::Arc;

use anyhow::Context;

use crate::foundation::error::ReplayResult;

/// Decoded raster image in premultiplied RGBA8 form, shareable across
/// mutations that reference the same payload.
#[derive(Clone, Debug)]
pub struct PreparedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Premultiplied RGBA8, row-major, tightly packed.
    pub rgba8_premul: Arc<Vec<u8>>,
}

/// Decode encoded image bytes (PNG, JPEG, ...) into a [`PreparedImage`].
pub fn decode_image(bytes: &[u8]) -> ReplayResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image payload")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut data = rgba.into_raw();
    premultiply_in_place(&mut data);

    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(data),
    })
}

fn premultiply_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * a + 127) / 255) as u8;
        }
    }
}
