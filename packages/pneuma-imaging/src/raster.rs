use crate::error::{Error, Result};

/// Single-channel floating-point raster with row-major storage.
#[derive(Clone, Debug, PartialEq)]
pub struct Raster {
	width: u32,
	height: u32,
	data: Vec<f32>,
}
impl Raster {
	pub fn new(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
		if width == 0 || height == 0 {
			return Err(Error::UnexpectedShape { width, height });
		}
		if data.len() != (width as usize) * (height as usize) {
			return Err(Error::LengthMismatch { width, height, len: data.len() });
		}

		Ok(Self { width, height, data })
	}

	pub fn width(&self) -> u32 {
		self.width
	}

	pub fn height(&self) -> u32 {
		self.height
	}

	pub fn data(&self) -> &[f32] {
		&self.data
	}

	pub fn into_data(self) -> Vec<f32> {
		self.data
	}
}
