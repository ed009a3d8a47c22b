//! Hermetic test doubles for the three external collaborators plus staging
//! fixtures, so service and HTTP tests run without a model server, LLM, or
//! object-storage backend.

use std::{
	collections::HashMap,
	path::{Path, PathBuf},
	sync::{Arc, Mutex},
};

use color_eyre::eyre;
use tempfile::TempDir;

use pneuma_config::{
	ClassifierProviderConfig, Config, LlmProviderConfig, ObjectStorage, Providers, Reference,
	Service, Staging, Store, Triage,
};
use pneuma_imaging::Raster;
use pneuma_service::{
	BoxFuture, ClassifierProvider, LlmProvider, ObjectStorageProvider, ProviderSet,
};

/// Temporary staging root, removed on drop.
pub struct StagingDir {
	dir: TempDir,
}
impl StagingDir {
	pub fn new() -> Self {
		Self { dir: TempDir::new().expect("Failed to create staging tempdir.") }
	}

	pub fn path(&self) -> &Path {
		self.dir.path()
	}
}
impl Default for StagingDir {
	fn default() -> Self {
		Self::new()
	}
}

/// A small valid grayscale PNG for submissions.
pub fn sample_image(width: u32, height: u32) -> Vec<u8> {
	let pixels: Vec<u8> = (0..width * height).map(|i| (i % 256) as u8).collect();

	pneuma_imaging::gray_png(width, height, pixels).expect("Failed to encode sample image.")
}

pub fn test_config(staging_root: PathBuf) -> Config {
	Config {
		service: Service {
			http_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
		},
		triage: Triage {
			target_label: "Pneumonia".to_string(),
			threshold: 0.70,
			input_size: 32,
		},
		store: Store { capacity: 500 },
		staging: Staging { root: staging_root },
		providers: Providers {
			classifier: ClassifierProviderConfig {
				api_base: "http://127.0.0.1:1".to_string(),
				classify_path: "/v1/classify".to_string(),
				gradient_path: "/v1/gradient".to_string(),
				model: "test".to_string(),
				api_key: String::new(),
				timeout_ms: 1_000,
			},
			llm: LlmProviderConfig {
				api_base: "http://127.0.0.1:1".to_string(),
				path: "/v1/chat/completions".to_string(),
				api_key: "test-key".to_string(),
				model: "test".to_string(),
				temperature: 0.2,
				timeout_ms: 1_000,
			},
		},
		object_storage: None,
		reference: None,
	}
}

pub fn durable_storage(token: Option<&str>, public_url_base: Option<&str>) -> ObjectStorage {
	ObjectStorage {
		bucket: "test-bucket".to_string(),
		upload_base: "http://127.0.0.1:1/upload".to_string(),
		api_base: "http://127.0.0.1:1/storage".to_string(),
		token: token.map(|token| token.to_string()),
		public_url_base: public_url_base.map(|base| base.to_string()),
	}
}

pub fn reference_config(boxes_csv: PathBuf, mask_size: u32) -> Reference {
	Reference { boxes_csv, mask_size }
}

/// Fixed probability vector plus a deterministic gradient; both halves can
/// be forced to fail independently.
pub struct MockClassifier {
	pub probabilities: HashMap<String, f32>,
	pub fail_classify: bool,
	pub fail_gradient: bool,
}
impl MockClassifier {
	pub fn with_probability(label: &str, probability: f32) -> Self {
		let mut probabilities = HashMap::new();

		probabilities.insert(label.to_string(), probability);
		probabilities.insert("Atelectasis".to_string(), 0.05);

		Self { probabilities, fail_classify: false, fail_gradient: false }
	}

	pub fn without_label() -> Self {
		let mut probabilities = HashMap::new();

		probabilities.insert("Atelectasis".to_string(), 0.05);

		Self { probabilities, fail_classify: false, fail_gradient: false }
	}
}
impl ClassifierProvider for MockClassifier {
	fn classify<'a>(
		&'a self,
		_cfg: &'a ClassifierProviderConfig,
		_raster: &'a Raster,
	) -> BoxFuture<'a, color_eyre::Result<HashMap<String, f32>>> {
		Box::pin(async move {
			if self.fail_classify {
				return Err(eyre::eyre!("Mock classifier offline."));
			}

			Ok(self.probabilities.clone())
		})
	}

	fn input_gradient<'a>(
		&'a self,
		_cfg: &'a ClassifierProviderConfig,
		raster: &'a Raster,
		_target_label: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Raster>> {
		Box::pin(async move {
			if self.fail_gradient {
				return Err(eyre::eyre!("Mock gradient unavailable."));
			}

			let data: Vec<f32> = (0..raster.data().len()).map(|i| i as f32).collect();

			Ok(Raster::new(raster.width(), raster.height(), data)
				.expect("Mock gradient shape mismatch."))
		})
	}
}

/// Replies with a canned completion, or fails when `reply` is `None`.
pub struct MockLlm {
	pub reply: Option<String>,
}
impl MockLlm {
	pub fn replying(reply: &str) -> Self {
		Self { reply: Some(reply.to_string()) }
	}

	pub fn failing() -> Self {
		Self { reply: None }
	}
}
impl LlmProvider for MockLlm {
	fn complete<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		_system: &'a str,
		_user: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(async move {
			self.reply.clone().ok_or_else(|| eyre::eyre!("Mock LLM offline."))
		})
	}
}

/// Records uploads and ACL grants instead of talking to a backend.
pub struct RecordingStorage {
	pub uploads: Mutex<Vec<String>>,
	pub public: Mutex<Vec<String>>,
	pub fail_uploads: bool,
}
impl RecordingStorage {
	pub fn new() -> Arc<Self> {
		Arc::new(Self { uploads: Mutex::new(Vec::new()), public: Mutex::new(Vec::new()), fail_uploads: false })
	}

	pub fn failing() -> Arc<Self> {
		Arc::new(Self { uploads: Mutex::new(Vec::new()), public: Mutex::new(Vec::new()), fail_uploads: true })
	}

	pub fn uploaded(&self) -> Vec<String> {
		self.uploads.lock().expect("Uploads mutex poisoned.").clone()
	}

	pub fn made_public(&self) -> Vec<String> {
		self.public.lock().expect("Public mutex poisoned.").clone()
	}
}
impl ObjectStorageProvider for RecordingStorage {
	fn upload<'a>(
		&'a self,
		_cfg: &'a ObjectStorage,
		_token: &'a str,
		_local_path: &'a Path,
		object_name: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			if self.fail_uploads {
				return Err(eyre::eyre!("Mock storage rejecting uploads."));
			}

			self.uploads.lock().expect("Uploads mutex poisoned.").push(object_name.to_string());

			Ok(())
		})
	}

	fn make_public<'a>(
		&'a self,
		_cfg: &'a ObjectStorage,
		_token: &'a str,
		object_name: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			self.public.lock().expect("Public mutex poisoned.").push(object_name.to_string());

			Ok(())
		})
	}
}

pub fn provider_set(
	classifier: MockClassifier,
	llm: MockLlm,
	storage: Arc<RecordingStorage>,
) -> ProviderSet {
	ProviderSet { classifier: Arc::new(classifier), llm: Arc::new(llm), storage }
}
