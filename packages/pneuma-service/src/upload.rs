use std::{fs, path::PathBuf, sync::Arc};

use color_eyre::{Result, eyre};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::ObjectStorageProvider;
use pneuma_config::ObjectStorage;

/// One-way message from the request path to the uploader. The requester
/// never waits on it and receives no completion signal.
#[derive(Debug)]
pub struct UploadJob {
	pub prediction_id: Uuid,
	pub staging_dir: PathBuf,
}

/// Long-lived durable-promotion loop. Without credentials every job is a
/// no-op and staged files stay local, served by the static route. Failures
/// are swallowed per job; partially promoted state is an accepted limitation.
pub async fn run_uploader(
	storage: Option<ObjectStorage>,
	provider: Arc<dyn ObjectStorageProvider>,
	mut jobs: mpsc::UnboundedReceiver<UploadJob>,
) {
	while let Some(job) = jobs.recv().await {
		if let Err(err) = promote(storage.as_ref(), provider.as_ref(), &job).await {
			tracing::warn!(
				error = %err,
				prediction_id = %job.prediction_id,
				"Durable promotion failed; staged files remain local.",
			);
		}
	}
}

async fn promote(
	storage: Option<&ObjectStorage>,
	provider: &dyn ObjectStorageProvider,
	job: &UploadJob,
) -> Result<()> {
	let Some(storage) = storage else {
		return Ok(());
	};
	let Some(token) = storage.token.as_deref() else {
		return Ok(());
	};

	if !job.staging_dir.is_dir() {
		return Ok(());
	}

	for entry in fs::read_dir(&job.staging_dir)? {
		let entry = entry?;
		let path = entry.path();

		if !path.is_file() {
			continue;
		}

		let file_name = entry
			.file_name()
			.into_string()
			.map_err(|_| eyre::eyre!("Staged file has a non-UTF-8 name."))?;
		let object_name = format!("predictions/{}/{}", job.prediction_id, file_name);

		provider.upload(storage, token, &path, &object_name).await?;
		provider.make_public(storage, token, &object_name).await?;
	}

	fs::remove_dir_all(&job.staging_dir)?;

	tracing::info!(prediction_id = %job.prediction_id, "Staged assets promoted to durable storage.");

	Ok(())
}
