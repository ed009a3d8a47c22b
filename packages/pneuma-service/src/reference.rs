use std::{collections::HashMap, fs, path::Path, sync::OnceLock};

use color_eyre::{Result, eyre};

use pneuma_config::Reference;

/// Lazily built, read-mostly index from lower-cased file stem to the
/// radiologist-annotated opacity boxes for that study. Built at most once
/// per process; a failed build is cached as permanently unavailable so a bad
/// dataset path cannot turn into a per-request retry storm.
pub struct ReferenceIndexCell {
	cell: OnceLock<Option<ReferenceMaskIndex>>,
}
impl ReferenceIndexCell {
	pub fn new() -> Self {
		Self { cell: OnceLock::new() }
	}

	pub fn get_or_build(&self, cfg: Option<&Reference>) -> Option<&ReferenceMaskIndex> {
		self.cell
			.get_or_init(|| {
				let cfg = cfg?;

				match ReferenceMaskIndex::load(cfg) {
					Ok(index) => Some(index),
					Err(err) => {
						tracing::warn!(
							error = %err,
							"Reference mask index failed to build; lookups disabled for process lifetime.",
						);

						None
					},
				}
			})
			.as_ref()
	}
}
impl Default for ReferenceIndexCell {
	fn default() -> Self {
		Self::new()
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnnotationBox {
	pub x: f32,
	pub y: f32,
	pub width: f32,
	pub height: f32,
}

pub struct ReferenceMaskIndex {
	mask_size: u32,
	rows: HashMap<String, Vec<AnnotationBox>>,
}
impl ReferenceMaskIndex {
	pub fn load(cfg: &Reference) -> Result<Self> {
		let raw = fs::read_to_string(&cfg.boxes_csv).map_err(|err| {
			eyre::eyre!("Failed to read reference CSV at {:?}: {err}.", cfg.boxes_csv)
		})?;
		let rows = parse_rows(&raw)?;

		tracing::info!(studies = rows.len(), "Reference mask index built.");

		Ok(Self { mask_size: cfg.mask_size, rows })
	}

	/// Render the first matching row's annotations as an 8-bit mask PNG,
	/// combining overlapping boxes by element-wise maximum. `None` when the
	/// filename is empty or no positive-target row matches.
	pub fn lookup(&self, original_filename: &str) -> Option<Vec<u8>> {
		let stem = file_stem(original_filename)?;
		let boxes = self.rows.get(&stem)?;
		let size = self.mask_size;
		let mut mask = vec![0_u8; (size as usize) * (size as usize)];

		for annotation in boxes {
			render_box(&mut mask, size, annotation);
		}

		match pneuma_imaging::gray_png(size, size, mask) {
			Ok(png) => Some(png),
			Err(err) => {
				tracing::warn!(error = %err, "Failed to encode reference mask.");

				None
			},
		}
	}

	pub fn len(&self) -> usize {
		self.rows.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rows.is_empty()
	}
}

/// RSNA-style rows: `patientId,x,y,width,height,Target`. Negative-target rows
/// carry empty box columns and are skipped.
fn parse_rows(raw: &str) -> Result<HashMap<String, Vec<AnnotationBox>>> {
	let mut rows: HashMap<String, Vec<AnnotationBox>> = HashMap::new();

	for (line_no, line) in raw.lines().enumerate().skip(1) {
		let line = line.trim();

		if line.is_empty() {
			continue;
		}

		let columns: Vec<&str> = line.split(',').map(|column| column.trim()).collect();

		if columns.len() != 6 {
			return Err(eyre::eyre!(
				"Reference CSV line {} has {} columns, expected 6.",
				line_no + 1,
				columns.len()
			));
		}
		if columns[5] != "1" {
			continue;
		}

		let parse = |label: &str, value: &str| {
			value.parse::<f32>().map_err(|_| {
				eyre::eyre!("Reference CSV line {} has non-numeric {label}.", line_no + 1)
			})
		};
		let annotation = AnnotationBox {
			x: parse("x", columns[1])?,
			y: parse("y", columns[2])?,
			width: parse("width", columns[3])?,
			height: parse("height", columns[4])?,
		};

		rows.entry(columns[0].to_lowercase()).or_default().push(annotation);
	}

	Ok(rows)
}

fn file_stem(original_filename: &str) -> Option<String> {
	let trimmed = original_filename.trim();

	if trimmed.is_empty() {
		return None;
	}

	Path::new(trimmed)
		.file_stem()
		.and_then(|stem| stem.to_str())
		.map(|stem| stem.to_lowercase())
}

fn render_box(mask: &mut [u8], size: u32, annotation: &AnnotationBox) {
	let x0 = annotation.x.max(0.0) as u32;
	let y0 = annotation.y.max(0.0) as u32;
	let x1 = ((annotation.x + annotation.width).max(0.0) as u32).min(size);
	let y1 = ((annotation.y + annotation.height).max(0.0) as u32).min(size);

	for y in y0..y1 {
		for x in x0..x1 {
			// Element-wise maximum of saturated per-box rasters is their union.
			mask[(y as usize) * (size as usize) + (x as usize)] = 255;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const SAMPLE_CSV: &str = "\
patientId,x,y,width,height,Target
abc123,2,1,2,2,1
abc123,3,2,2,2,1
negative,,,,,0
";

	fn index(mask_size: u32) -> ReferenceMaskIndex {
		ReferenceMaskIndex { mask_size, rows: parse_rows(SAMPLE_CSV).expect("parse failed") }
	}

	#[test]
	fn parses_positive_rows_and_skips_negatives() {
		let rows = parse_rows(SAMPLE_CSV).expect("parse failed");

		assert_eq!(rows.len(), 1);
		assert_eq!(rows["abc123"].len(), 2);
	}

	#[test]
	fn lookup_matches_lowercased_stem() {
		let index = index(8);

		assert!(index.lookup("ABC123.dcm").is_some());
		assert!(index.lookup("abc123.png").is_some());
		assert!(index.lookup("missing.png").is_none());
		assert!(index.lookup("").is_none());
	}

	#[test]
	fn overlapping_boxes_combine_by_maximum() {
		let index = index(8);
		let png = index.lookup("abc123.dcm").expect("lookup failed");
		let decoded = image::load_from_memory(&png).expect("png decode failed").to_luma8();
		let pixel = |x: u32, y: u32| decoded.get_pixel(x, y).0[0];

		// Overlap region of the two boxes stays saturated, outside is clear.
		assert_eq!(pixel(3, 2), 255);
		assert_eq!(pixel(2, 1), 255);
		assert_eq!(pixel(4, 3), 255);
		assert_eq!(pixel(7, 7), 0);
		assert_eq!(pixel(0, 0), 0);
	}

	#[test]
	fn malformed_rows_fail_the_build() {
		assert!(parse_rows("patientId,x,y,width,height,Target\nbad,1,2,3\n").is_err());
		assert!(parse_rows("patientId,x,y,width,height,Target\nbad,a,2,3,4,1\n").is_err());
	}
}
