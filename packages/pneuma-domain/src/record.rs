use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// One accepted submission, as returned to callers and held by the store.
/// Immutable after insertion; durable promotion never rewrites these fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
	pub prediction_id: Uuid,
	pub original_filename: String,
	/// `None` means the model did not produce the target label at all.
	/// Callers must not read this as a zero probability.
	pub probability: Option<f32>,
	/// Threshold in effect when the record was created.
	pub threshold: f32,
	pub meets_threshold: bool,
	pub assessment: String,
	pub inference_ms: u64,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	pub assets: AssetBundle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetKind {
	Original,
	Saliency,
	ReferenceMask,
}
impl AssetKind {
	/// Deterministic staging filename for this kind. The original keeps its
	/// decoded extension; generated rasters are always PNG.
	pub fn file_name(&self, original_ext: &str) -> String {
		match self {
			Self::Original => format!("image.{original_ext}"),
			Self::Saliency => "saliency.png".to_string(),
			Self::ReferenceMask => "reference_mask.png".to_string(),
		}
	}

	/// Canonical object name, a pure function of identifier and kind.
	pub fn object_name(&self, prediction_id: Uuid, original_ext: &str) -> String {
		format!("predictions/{prediction_id}/{}", self.file_name(original_ext))
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetBackend {
	Durable,
	Local,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetSlot {
	pub available: bool,
	pub object_name: String,
	pub url: String,
	pub backend: AssetBackend,
}
impl AssetSlot {
	pub fn unavailable(object_name: String, url: String, backend: AssetBackend) -> Self {
		Self { available: false, object_name, url, backend }
	}

	pub fn available(object_name: String, url: String, backend: AssetBackend) -> Self {
		Self { available: true, object_name, url, backend }
	}
}

/// One slot per asset kind. Object names are assigned at staging time and
/// never change; only the resolved URL's backend differs between local and
/// durable modes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetBundle {
	pub original: AssetSlot,
	pub saliency: AssetSlot,
	pub reference_mask: AssetSlot,
}
impl AssetBundle {
	pub fn has_any_mask(&self) -> bool {
		self.saliency.available || self.reference_mask.available
	}
}
