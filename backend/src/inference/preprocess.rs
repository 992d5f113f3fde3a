use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageReader, RgbImage};
use ndarray::{Array4, ArrayView4};

/// Side length the classifier was trained on.
pub const INPUT_SIZE: u32 = 160;
pub const CHANNELS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("Unable to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Unable to read image bytes: {0}")]
    Io(#[from] std::io::Error),
}

/// Single-image batch in NHWC layout, RGB, values in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct NormalizedTensor {
    data: Array4<f32>,
}

impl NormalizedTensor {
    pub fn zeros(width: u32, height: u32) -> Self {
        Self {
            data: Array4::zeros((1, height as usize, width as usize, CHANNELS)),
        }
    }

    pub fn shape(&self) -> [usize; 4] {
        let dims = self.data.dim();
        [dims.0, dims.1, dims.2, dims.3]
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    /// Row-major values, the order `[1, H, W, C]` lays them out in memory.
    pub fn as_slice(&self) -> &[f32] {
        self.data.as_slice().unwrap_or_default()
    }
}

/// Turns uploaded bytes into the tensor the classifier expects.
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    width: u32,
    height: u32,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(INPUT_SIZE, INPUT_SIZE)
    }
}

impl Preprocessor {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn input_shape(&self) -> [usize; 4] {
        [1, self.height as usize, self.width as usize, CHANNELS]
    }

    pub fn preprocess(&self, bytes: &[u8]) -> Result<NormalizedTensor, PreprocessError> {
        let image = decode(bytes)?;
        Ok(self.preprocess_image(&image))
    }

    pub fn preprocess_image(&self, image: &DynamicImage) -> NormalizedTensor {
        // RGB first: resampling must see the same channels the model was trained on.
        let rgb = image.to_rgb8();
        let fitted = fit(&rgb, self.width, self.height);
        to_tensor(&fitted)
    }
}

pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PreprocessError> {
    let image = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .decode()?;
    Ok(image)
}

/// Crop-to-fill: take the centered region with the target aspect ratio, then
/// resample it to exactly `width` x `height` with Lanczos3.
///
/// The crop box is snapped to whole pixels with its offset rounded down, so it
/// can sit up to half a pixel left of (or above) the exact fractional center.
/// A snapped box that already has the target size is returned without
/// resampling: a 161x160 source yields its columns `0..160` untouched.
pub fn fit(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    let (src_w, src_h) = image.dimensions();
    let (crop_w, crop_h) = crop_extent(src_w, src_h, width, height);
    let left = (src_w - crop_w) / 2;
    let top = (src_h - crop_h) / 2;

    let cropped = imageops::crop_imm(image, left, top, crop_w, crop_h).to_image();
    if (crop_w, crop_h) == (width, height) {
        return cropped;
    }
    imageops::resize(&cropped, width, height, FilterType::Lanczos3)
}

/// Largest centered box in `src` sharing the `dst` aspect ratio.
fn crop_extent(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> (u32, u32) {
    let (sw, sh, dw, dh) = (src_w as u64, src_h as u64, dst_w as u64, dst_h as u64);
    if sw * dh == sh * dw {
        (src_w, src_h)
    } else if sw * dh > sh * dw {
        let w = ((sh * dw + dh / 2) / dh).clamp(1, sw);
        (w as u32, src_h)
    } else {
        let h = ((sw * dh + dw / 2) / dw).clamp(1, sh);
        (src_w, h as u32)
    }
}

pub fn to_tensor(image: &RgbImage) -> NormalizedTensor {
    let (width, height) = image.dimensions();
    let data = Array4::from_shape_fn(
        (1, height as usize, width as usize, CHANNELS),
        |(_, y, x, c)| image.get_pixel(x as u32, y as u32)[c] as f32 / 255.0,
    );
    NormalizedTensor { data }
}
