mod error;
mod raster;
mod saliency;

pub use error::{Error, Result};
pub use raster::Raster;
pub use saliency::saliency_png;

use std::io::Cursor;

use image::{
	ImageBuffer, ImageFormat, Luma,
	imageops::{self, FilterType},
};

type GrayF32 = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Decode raw upload bytes into the model's expected single-channel square
/// raster: collapse channels, map 8-bit intensities to [-1024, 1024]
/// (torchxrayvision convention), center crop, resize to `input_size`.
pub fn decode_and_normalize(bytes: &[u8], input_size: u32) -> Result<Raster> {
	if bytes.is_empty() {
		return Err(Error::EmptyPayload);
	}

	let decoded =
		image::load_from_memory(bytes).map_err(|source| Error::Decode { source })?.to_luma32f();
	let (width, height) = decoded.dimensions();

	if width == 0 || height == 0 {
		return Err(Error::UnexpectedShape { width, height });
	}

	let cropped = center_crop(&decoded);
	let resized = imageops::resize(&cropped, input_size, input_size, FilterType::Triangle);
	let data = resized.into_raw().into_iter().map(|v| v * 2_048.0 - 1_024.0).collect();

	Raster::new(input_size, input_size, data)
}

/// Best-effort extension sniff for staging the original upload.
pub fn sniff_extension(bytes: &[u8]) -> &'static str {
	match image::guess_format(bytes) {
		Ok(ImageFormat::Jpeg) => "jpg",
		Ok(ImageFormat::Png) => "png",
		_ => "bin",
	}
}

/// Encode an 8-bit single-channel raster as PNG bytes.
pub fn gray_png(width: u32, height: u32, pixels: Vec<u8>) -> Result<Vec<u8>> {
	let buffer: ImageBuffer<Luma<u8>, Vec<u8>> = ImageBuffer::from_raw(width, height, pixels)
		.ok_or(Error::LengthMismatch { width, height, len: 0 })?;
	let mut out = Cursor::new(Vec::new());

	buffer
		.write_to(&mut out, ImageFormat::Png)
		.map_err(|source| Error::Encode { source })?;

	Ok(out.into_inner())
}

fn center_crop(img: &GrayF32) -> GrayF32 {
	let (width, height) = img.dimensions();
	let side = width.min(height);
	let x = (width - side) / 2;
	let y = (height - side) / 2;

	imageops::crop_imm(img, x, y, side, side).to_image()
}
