use std::{collections::HashMap, time::Duration};

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

use pneuma_config::ClassifierProviderConfig;
use pneuma_imaging::Raster;

/// Run the classification endpoint over a prepared raster. The response is a
/// named probability vector; the caller decides which label it cares about.
pub async fn classify(
	cfg: &ClassifierProviderConfig,
	raster: &Raster,
) -> Result<HashMap<String, f32>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.classify_path);
	let body = serde_json::json!({
		"model": cfg.model,
		"width": raster.width(),
		"height": raster.height(),
		"pixels": raster.data(),
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_classify_response(json)
}

/// Fetch the gradient of the target label's output score with respect to the
/// input raster.
pub async fn input_gradient(
	cfg: &ClassifierProviderConfig,
	raster: &Raster,
	target_label: &str,
) -> Result<Raster> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.gradient_path);
	let body = serde_json::json!({
		"model": cfg.model,
		"width": raster.width(),
		"height": raster.height(),
		"pixels": raster.data(),
		"label": target_label,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_gradient_response(json)
}

fn parse_classify_response(json: Value) -> Result<HashMap<String, f32>> {
	let labels = json
		.get("pathologies")
		.and_then(|v| v.as_array())
		.ok_or_else(|| eyre::eyre!("Classify response is missing pathologies array."))?;
	let probabilities = json
		.get("probabilities")
		.and_then(|v| v.as_array())
		.ok_or_else(|| eyre::eyre!("Classify response is missing probabilities array."))?;

	if labels.len() != probabilities.len() {
		return Err(eyre::eyre!(
			"Classify response has {} labels but {} probabilities.",
			labels.len(),
			probabilities.len()
		));
	}

	let mut out = HashMap::with_capacity(labels.len());

	for (label, probability) in labels.iter().zip(probabilities.iter()) {
		let label = label
			.as_str()
			.ok_or_else(|| eyre::eyre!("Classify label must be a string."))?;
		let probability = probability
			.as_f64()
			.ok_or_else(|| eyre::eyre!("Classify probability must be numeric."))?;

		out.insert(label.to_string(), probability as f32);
	}

	Ok(out)
}

fn parse_gradient_response(json: Value) -> Result<Raster> {
	let width = json
		.get("width")
		.and_then(|v| v.as_u64())
		.ok_or_else(|| eyre::eyre!("Gradient response is missing width."))? as u32;
	let height = json
		.get("height")
		.and_then(|v| v.as_u64())
		.ok_or_else(|| eyre::eyre!("Gradient response is missing height."))? as u32;
	let values = json
		.get("gradient")
		.and_then(|v| v.as_array())
		.ok_or_else(|| eyre::eyre!("Gradient response is missing gradient array."))?;
	let mut data = Vec::with_capacity(values.len());

	for value in values {
		let number =
			value.as_f64().ok_or_else(|| eyre::eyre!("Gradient value must be numeric."))?;

		data.push(number as f32);
	}

	Raster::new(width, height, data).map_err(|err| eyre::eyre!(err.to_string()))
}
