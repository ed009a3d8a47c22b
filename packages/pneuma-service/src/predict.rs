use std::time::Instant;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{PneumaService, ServiceError, ServiceResult, UploadJob, staging};
use pneuma_domain::{AssetBundle, AssetKind, AssetSlot, PredictionRecord, assessment, meets_threshold};
use pneuma_imaging::Raster;

impl PneumaService {
	/// The full prediction lifecycle: decode, classify, threshold-gate,
	/// stage assets, insert into the store, enqueue durable promotion.
	/// Returns before any upload happens. Only structurally invalid input or
	/// a failed classification reject the request; every explainability step
	/// is best-effort.
	pub async fn submit(
		&self,
		bytes: &[u8],
		original_filename: &str,
	) -> ServiceResult<PredictionRecord> {
		let input_size = self.cfg.triage.input_size;
		let raster = pneuma_imaging::decode_and_normalize(bytes, input_size)
			.map_err(|err| ServiceError::InvalidImage { message: err.to_string() })?;

		let classifier_cfg = &self.cfg.providers.classifier;
		let started = Instant::now();
		let probabilities = self
			.providers()
			.classifier
			.classify(classifier_cfg, &raster)
			.await
			.map_err(|err| ServiceError::Classifier { message: err.to_string() })?;
		let inference_ms = started.elapsed().as_millis() as u64;

		let target_label = self.cfg.triage.target_label.as_str();
		let threshold = self.cfg.triage.threshold;
		let probability = probabilities.get(target_label).copied();
		let meets = meets_threshold(probability, threshold);

		let prediction_id = Uuid::new_v4();
		let ext = pneuma_imaging::sniff_extension(bytes);
		let original = self.stage_original(prediction_id, ext, bytes);
		let (saliency, reference_mask) = if meets {
			(
				self.stage_saliency(prediction_id, &raster, target_label).await,
				self.stage_reference_mask(prediction_id, original_filename),
			)
		} else {
			(
				self.slot(prediction_id, AssetKind::Saliency, ext, false),
				self.slot(prediction_id, AssetKind::ReferenceMask, ext, false),
			)
		};

		let record = PredictionRecord {
			prediction_id,
			original_filename: original_filename.to_string(),
			probability,
			threshold,
			meets_threshold: meets,
			assessment: assessment(probability, threshold),
			inference_ms,
			created_at: OffsetDateTime::now_utc(),
			assets: AssetBundle { original, saliency, reference_mask },
		};

		self.store().put(record.clone());
		self.enqueue_upload(UploadJob {
			prediction_id,
			staging_dir: staging::staging_dir(&self.cfg.staging.root, prediction_id),
		});

		tracing::info!(
			prediction_id = %prediction_id,
			probability = ?probability,
			meets_threshold = meets,
			inference_ms,
			"Prediction recorded.",
		);

		Ok(record)
	}

	fn slot(&self, prediction_id: Uuid, kind: AssetKind, ext: &str, available: bool) -> AssetSlot {
		staging::resolve_slot(
			self.cfg.object_storage.as_ref(),
			prediction_id,
			kind,
			ext,
			available,
		)
	}

	fn stage_original(&self, prediction_id: Uuid, ext: &str, bytes: &[u8]) -> AssetSlot {
		let staged = staging::stage_bytes(
			&self.cfg.staging.root,
			prediction_id,
			AssetKind::Original,
			ext,
			bytes,
		);

		match staged {
			Ok(_) => self.slot(prediction_id, AssetKind::Original, ext, true),
			Err(err) => {
				tracing::warn!(
					error = %err,
					prediction_id = %prediction_id,
					"Failed to stage original image.",
				);

				self.slot(prediction_id, AssetKind::Original, ext, false)
			},
		}
	}

	async fn stage_saliency(
		&self,
		prediction_id: Uuid,
		raster: &Raster,
		target_label: &str,
	) -> AssetSlot {
		let classifier_cfg = &self.cfg.providers.classifier;
		let gradient = self
			.providers()
			.classifier
			.input_gradient(classifier_cfg, raster, target_label)
			.await;
		let png = match gradient {
			Ok(gradient) => pneuma_imaging::saliency_png(&gradient).map_err(|err| err.to_string()),
			Err(err) => Err(err.to_string()),
		};
		let staged = png.and_then(|png| {
			staging::stage_bytes(
				&self.cfg.staging.root,
				prediction_id,
				AssetKind::Saliency,
				"png",
				&png,
			)
			.map_err(|err| err.to_string())
		});

		match staged {
			Ok(_) => self.slot(prediction_id, AssetKind::Saliency, "png", true),
			Err(message) => {
				tracing::warn!(
					error = %message,
					prediction_id = %prediction_id,
					"Saliency generation unavailable.",
				);

				self.slot(prediction_id, AssetKind::Saliency, "png", false)
			},
		}
	}

	fn stage_reference_mask(&self, prediction_id: Uuid, original_filename: &str) -> AssetSlot {
		let index = self.reference_index();
		let png = index.and_then(|index| index.lookup(original_filename));
		let Some(png) = png else {
			return self.slot(prediction_id, AssetKind::ReferenceMask, "png", false);
		};
		let staged = staging::stage_bytes(
			&self.cfg.staging.root,
			prediction_id,
			AssetKind::ReferenceMask,
			"png",
			&png,
		);

		match staged {
			Ok(_) => self.slot(prediction_id, AssetKind::ReferenceMask, "png", true),
			Err(err) => {
				tracing::warn!(
					error = %err,
					prediction_id = %prediction_id,
					"Failed to stage reference mask.",
				);

				self.slot(prediction_id, AssetKind::ReferenceMask, "png", false)
			},
		}
	}

	fn reference_index(&self) -> Option<&crate::reference::ReferenceMaskIndex> {
		self.reference.get_or_build(self.cfg.reference.as_ref())
	}
}
