use std::{path::Path, time::Duration};

use color_eyre::Result;
use reqwest::{Client, header::CONTENT_TYPE};

use pneuma_config::ObjectStorage;

const UPLOAD_TIMEOUT_MS: u64 = 60_000;

/// Upload one staged file under its canonical object name via the GCS JSON
/// API media endpoint.
pub async fn upload(
	cfg: &ObjectStorage,
	token: &str,
	local_path: &Path,
	object_name: &str,
) -> Result<()> {
	let bytes = tokio::fs::read(local_path).await?;
	let client = Client::builder().timeout(Duration::from_millis(UPLOAD_TIMEOUT_MS)).build()?;
	let url = format!("{}/b/{}/o", cfg.upload_base, cfg.bucket);

	client
		.post(url)
		.query(&[("uploadType", "media"), ("name", object_name)])
		.headers(crate::auth_headers(token)?)
		.header(CONTENT_TYPE, content_type_for(object_name))
		.body(bytes)
		.send()
		.await?
		.error_for_status()?;

	Ok(())
}

/// Grant allUsers read access to an uploaded object.
pub async fn make_public(cfg: &ObjectStorage, token: &str, object_name: &str) -> Result<()> {
	let client = Client::builder().timeout(Duration::from_millis(UPLOAD_TIMEOUT_MS)).build()?;
	let encoded = object_name.replace('/', "%2F");
	let url = format!("{}/b/{}/o/{}/acl", cfg.api_base, cfg.bucket, encoded);
	let body = serde_json::json!({ "entity": "allUsers", "role": "READER" });

	client
		.post(url)
		.headers(crate::auth_headers(token)?)
		.json(&body)
		.send()
		.await?
		.error_for_status()?;

	Ok(())
}

fn content_type_for(object_name: &str) -> &'static str {
	if object_name.ends_with(".png") {
		"image/png"
	} else if object_name.ends_with(".jpg") || object_name.ends_with(".jpeg") {
		"image/jpeg"
	} else {
		"application/octet-stream"
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn content_type_follows_extension() {
		assert_eq!(content_type_for("predictions/a/saliency.png"), "image/png");
		assert_eq!(content_type_for("predictions/a/image.jpg"), "image/jpeg");
		assert_eq!(content_type_for("predictions/a/image.bin"), "application/octet-stream");
	}
}
