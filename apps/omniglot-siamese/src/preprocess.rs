use std::path::Path;

use image::imageops::FilterType;
use tch::Tensor;
use tracing::debug;

use crate::{
    config::InputShape,
    error::{Result, SiameseError},
};

/// Decodes one image file into a `[C, H, W]` float tensor scaled to `[0, 1]`
/// and resized to `shape`. Grayscale for one channel, RGB for three.
pub fn load_image<P: AsRef<Path>>(path: P, shape: InputShape) -> Result<Tensor> {
    let path = path.as_ref();
    let (width, height) = match (u32::try_from(shape.width), u32::try_from(shape.height)) {
        (Ok(w), Ok(h)) if shape.is_valid() => (w, h),
        _ => return Err(SiameseError::InvalidInputShape(shape)),
    };

    let img = image::open(path)?.resize_exact(width, height, FilterType::Triangle);
    let raw = match shape.channels {
        1 => img.to_luma8().into_raw(),
        3 => img.to_rgb8().into_raw(),
        other => return Err(SiameseError::UnsupportedChannels(other)),
    };
    debug!("loaded {:?} as {}", path, shape);

    let pixels: Vec<f32> = raw.iter().map(|&p| f32::from(p) / 255.0).collect();
    let tensor = Tensor::from_slice(&pixels)
        .f_view([shape.height, shape.width, shape.channels])?
        .f_permute([2, 0, 1])?
        .f_contiguous()?;
    Ok(tensor)
}
