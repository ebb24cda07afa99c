//! Encoded-image conveniences: decode, obscure regions, re-encode as PNG.

use log::warn;

use faceblur_utils::{decode_image, encode_png, timing_guard};

use crate::compositing::{CompositeOptions, apply_obscure};
use crate::error::{FaceBlurError, Result};
use crate::region::Region;

/// Decode `bytes`, obscure every region in order and return the result as PNG.
pub fn blur_image_bytes(
    bytes: &[u8],
    regions: &[Region],
    options: &CompositeOptions,
) -> Result<Vec<u8>> {
    let _guard = timing_guard("faceblur_core::blur_image_bytes", log::Level::Debug);
    let mut image = decode_image(bytes)
        .map_err(|err| FaceBlurError::Decode(FaceBlurError::chain(&err)))?
        .to_rgba8();
    apply_obscure(&mut image, regions, options);
    encode_png(&image).map_err(|err| FaceBlurError::Encode(FaceBlurError::chain(&err)))
}

/// Obscure a single region.
///
/// When the region does not overlap the image the input bytes come back unchanged, without a
/// decode/encode round trip through PNG.
pub fn blur_face_area(bytes: &[u8], region: Region, options: &CompositeOptions) -> Result<Vec<u8>> {
    let image =
        decode_image(bytes).map_err(|err| FaceBlurError::Decode(FaceBlurError::chain(&err)))?;
    if region.clip(image.width(), image.height()).is_none() {
        return Ok(bytes.to_vec());
    }
    let mut rgba = image.to_rgba8();
    apply_obscure(&mut rgba, std::slice::from_ref(&region), options);
    encode_png(&rgba).map_err(|err| FaceBlurError::Encode(FaceBlurError::chain(&err)))
}

/// Fail-open variant of [`blur_image_bytes`]: on any error the cause is logged and the original
/// bytes are returned.
pub fn blur_image_bytes_or_original(
    bytes: &[u8],
    regions: &[Region],
    options: &CompositeOptions,
) -> Vec<u8> {
    match blur_image_bytes(bytes, regions, options) {
        Ok(encoded) => encoded,
        Err(err) => {
            warn!("blurring failed, returning original image: {err}");
            bytes.to_vec()
        }
    }
}
