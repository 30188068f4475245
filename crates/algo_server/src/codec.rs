//! Base64-wrapped PNG codec used at the transport boundary.

use std::io::Cursor;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma};
use mask::LabelMask;

use crate::error::CodecError;

/// Decode a base64 string holding any format the `image` crate reads
pub fn decode_image(data: &str) -> Result<DynamicImage, CodecError> {
    let bytes = STANDARD.decode(data.trim())?;
    image::load_from_memory(&bytes).map_err(CodecError::Decode)
}

/// Encode as base64 PNG, keeping the pixel type (16-bit stays 16-bit)
pub fn encode_image(image: &DynamicImage) -> Result<String, CodecError> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .map_err(CodecError::Encode)?;
    Ok(STANDARD.encode(bytes.into_inner()))
}

/// Encode a label mask as a 16-bit grayscale base64 PNG
pub fn encode_mask(mask: &LabelMask) -> Result<String, CodecError> {
    let mut labels = ImageBuffer::<Luma<u16>, Vec<u16>>::new(mask.width(), mask.height());
    for (x, y, pixel) in mask.enumerate_pixels() {
        let label = u16::try_from(pixel[0]).map_err(|_| CodecError::LabelOutOfRange(pixel[0]))?;
        labels.put_pixel(x, y, Luma([label]));
    }
    encode_image(&DynamicImage::ImageLuma16(labels))
}

pub fn load_image(path: impl AsRef<Path>) -> Result<DynamicImage, CodecError> {
    let path = path.as_ref();
    image::open(path).map_err(|source| CodecError::Read {
        path: path.to_path_buf(),
        source,
    })
}
