pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Empty image payload.")]
	EmptyPayload,
	#[error("Failed to decode image bytes.")]
	Decode { source: image::ImageError },
	#[error("Unexpected raster shape {width}x{height}.")]
	UnexpectedShape { width: u32, height: u32 },
	#[error("Raster data length {len} does not match {width}x{height}.")]
	LengthMismatch { width: u32, height: u32, len: usize },
	#[error("Gradient contains non-finite values.")]
	NonFiniteGradient,
	#[error("Failed to encode PNG.")]
	Encode { source: image::ImageError },
}
