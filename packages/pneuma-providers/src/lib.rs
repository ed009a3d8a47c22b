pub mod classifier;
pub mod llm;
pub mod objectstore;

use color_eyre::Result;
use reqwest::header::{AUTHORIZATION, HeaderMap};

/// Bearer auth headers; an empty key yields no auth header so unauthenticated
/// local inference endpoints keep working.
pub fn auth_headers(api_key: &str) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	if !api_key.is_empty() {
		headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);
	}

	Ok(headers)
}
