mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	ClassifierProviderConfig, Config, LlmProviderConfig, ObjectStorage, Providers, Reference,
	Service, Staging, Store, Triage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.triage.target_label.trim().is_empty() {
		return Err(Error::Validation {
			message: "triage.target_label must be non-empty.".to_string(),
		});
	}
	if !cfg.triage.threshold.is_finite() || !(0.0..=1.0).contains(&cfg.triage.threshold) {
		return Err(Error::Validation {
			message: "triage.threshold must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.triage.input_size == 0 {
		return Err(Error::Validation {
			message: "triage.input_size must be greater than zero.".to_string(),
		});
	}
	if cfg.store.capacity == 0 {
		return Err(Error::Validation {
			message: "store.capacity must be greater than zero.".to_string(),
		});
	}
	if cfg.staging.root.as_os_str().is_empty() {
		return Err(Error::Validation { message: "staging.root must be non-empty.".to_string() });
	}

	let classifier = &cfg.providers.classifier;

	if classifier.api_base.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.classifier.api_base must be non-empty.".to_string(),
		});
	}
	if classifier.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.classifier.timeout_ms must be greater than zero.".to_string(),
		});
	}

	let llm = &cfg.providers.llm;

	if llm.api_base.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.llm.api_base must be non-empty.".to_string(),
		});
	}
	if !llm.temperature.is_finite() || llm.temperature < 0.0 {
		return Err(Error::Validation {
			message: "providers.llm.temperature must be zero or greater.".to_string(),
		});
	}
	if llm.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.llm.timeout_ms must be greater than zero.".to_string(),
		});
	}

	if let Some(storage) = cfg.object_storage.as_ref() {
		if storage.bucket.trim().is_empty() {
			return Err(Error::Validation {
				message: "object_storage.bucket must be non-empty.".to_string(),
			});
		}
		if storage.upload_base.trim().is_empty() {
			return Err(Error::Validation {
				message: "object_storage.upload_base must be non-empty.".to_string(),
			});
		}
		if storage.api_base.trim().is_empty() {
			return Err(Error::Validation {
				message: "object_storage.api_base must be non-empty.".to_string(),
			});
		}
	}

	if let Some(reference) = cfg.reference.as_ref() {
		if reference.boxes_csv.as_os_str().is_empty() {
			return Err(Error::Validation {
				message: "reference.boxes_csv must be non-empty.".to_string(),
			});
		}
		if reference.mask_size == 0 {
			return Err(Error::Validation {
				message: "reference.mask_size must be greater than zero.".to_string(),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if let Some(storage) = cfg.object_storage.as_mut() {
		if storage.token.as_deref().map(|token| token.trim().is_empty()).unwrap_or(false) {
			storage.token = None;
		}
		if let Some(base) = storage.public_url_base.as_mut() {
			if base.trim().is_empty() {
				storage.public_url_base = None;
			} else {
				while base.ends_with('/') {
					base.pop();
				}
			}
		}
	}
}
