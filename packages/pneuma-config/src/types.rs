use std::path::PathBuf;

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub triage: Triage,
	pub store: Store,
	pub staging: Staging,
	pub providers: Providers,
	pub object_storage: Option<ObjectStorage>,
	pub reference: Option<Reference>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Triage {
	/// Label the classifier must produce for the record to carry a probability.
	pub target_label: String,
	#[serde(default = "default_threshold")]
	pub threshold: f32,
	#[serde(default = "default_input_size")]
	pub input_size: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Store {
	#[serde(default = "default_capacity")]
	pub capacity: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Staging {
	pub root: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Providers {
	pub classifier: ClassifierProviderConfig,
	pub llm: LlmProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ClassifierProviderConfig {
	pub api_base: String,
	pub classify_path: String,
	pub gradient_path: String,
	pub model: String,
	#[serde(default)]
	pub api_key: String,
	pub timeout_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub api_base: String,
	pub path: String,
	/// Empty key degrades report/chat to a fixed unavailable message.
	#[serde(default)]
	pub api_key: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ObjectStorage {
	pub bucket: String,
	#[serde(default = "default_upload_base")]
	pub upload_base: String,
	#[serde(default = "default_storage_api_base")]
	pub api_base: String,
	/// Bearer token for durable promotion. Absent token means staged files
	/// stay local (or are synced out of band).
	pub token: Option<String>,
	/// Public URL prefix for resolved asset references. Absent prefix means
	/// assets are served from the local static route.
	pub public_url_base: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Reference {
	pub boxes_csv: PathBuf,
	#[serde(default = "default_mask_size")]
	pub mask_size: u32,
}

fn default_threshold() -> f32 {
	0.70
}

fn default_input_size() -> u32 {
	224
}

fn default_capacity() -> usize {
	500
}

fn default_upload_base() -> String {
	"https://storage.googleapis.com/upload/storage/v1".to_string()
}

fn default_storage_api_base() -> String {
	"https://storage.googleapis.com/storage/v1".to_string()
}

fn default_mask_size() -> u32 {
	1_024
}
