use crate::{
	error::{Error, Result},
	gray_png,
	raster::Raster,
};

const RANGE_EPSILON: f32 = 1e-12;

/// Turn the target label's input gradient into a grayscale importance map:
/// per-pixel magnitude, min-max normalized to [0, 255], PNG encoded. The
/// epsilon keeps a flat gradient from dividing by a zero-width range.
pub fn saliency_png(gradient: &Raster) -> Result<Vec<u8>> {
	let magnitudes: Vec<f32> = gradient.data().iter().map(|v| v.abs()).collect();

	if magnitudes.iter().any(|v| !v.is_finite()) {
		return Err(Error::NonFiniteGradient);
	}

	let min = magnitudes.iter().copied().fold(f32::INFINITY, f32::min);
	let max = magnitudes.iter().copied().fold(f32::NEG_INFINITY, f32::max);
	let range = (max - min).max(RANGE_EPSILON);
	let pixels: Vec<u8> =
		magnitudes.iter().map(|v| (((v - min) / range) * 255.0).round() as u8).collect();

	gray_png(gradient.width(), gradient.height(), pixels)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalizes_gradient_to_full_byte_range() {
		let gradient = Raster::new(2, 2, vec![0.0, -1.0, 2.0, -4.0]).unwrap();
		let png = saliency_png(&gradient).expect("saliency failed");
		let decoded = image::load_from_memory(&png).expect("png decode failed").to_luma8();

		let pixels: Vec<u8> = decoded.into_raw();

		assert_eq!(pixels[0], 0);
		assert_eq!(pixels[3], 255);
		assert_eq!(pixels[2], 128);
	}

	#[test]
	fn flat_gradient_does_not_divide_by_zero() {
		let gradient = Raster::new(2, 2, vec![0.5; 4]).unwrap();
		let png = saliency_png(&gradient).expect("saliency failed");
		let decoded = image::load_from_memory(&png).expect("png decode failed").to_luma8();

		assert!(decoded.into_raw().iter().all(|&p| p == 0));
	}

	#[test]
	fn non_finite_gradient_is_rejected() {
		let gradient = Raster::new(1, 2, vec![f32::NAN, 1.0]).unwrap();

		assert!(matches!(saliency_png(&gradient), Err(Error::NonFiniteGradient)));
	}
}
