use std::{fs, io, path::Path, path::PathBuf};

use uuid::Uuid;

use pneuma_config::ObjectStorage;
use pneuma_domain::{AssetBackend, AssetKind, AssetSlot};

/// Local staging directory for one identifier. Distinct identifiers never
/// share a directory, so concurrent uploads cannot contend.
pub fn staging_dir(root: &Path, prediction_id: Uuid) -> PathBuf {
	root.join("predictions").join(prediction_id.to_string())
}

/// Write bytes under the deterministic staging filename for this kind,
/// creating the per-identifier directory on demand. Staging the same kind
/// twice overwrites. Returns the canonical object name.
pub fn stage_bytes(
	root: &Path,
	prediction_id: Uuid,
	kind: AssetKind,
	original_ext: &str,
	bytes: &[u8],
) -> io::Result<String> {
	let dir = staging_dir(root, prediction_id);

	fs::create_dir_all(&dir)?;
	fs::write(dir.join(kind.file_name(original_ext)), bytes)?;

	Ok(kind.object_name(prediction_id, original_ext))
}

/// Resolve an asset slot's object name and access reference. The object name
/// is fixed at staging time; only the backend tag differs between a durable
/// public prefix and the local static route.
pub fn resolve_slot(
	storage: Option<&ObjectStorage>,
	prediction_id: Uuid,
	kind: AssetKind,
	original_ext: &str,
	available: bool,
) -> AssetSlot {
	let object_name = kind.object_name(prediction_id, original_ext);
	let file_name = kind.file_name(original_ext);
	let (url, backend) = match storage.and_then(|storage| storage.public_url_base.as_deref()) {
		Some(base) => (format!("{base}/{object_name}"), AssetBackend::Durable),
		None => (format!("/assets/{prediction_id}/{file_name}"), AssetBackend::Local),
	};

	if available {
		AssetSlot::available(object_name, url, backend)
	} else {
		AssetSlot::unavailable(object_name, url, backend)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn storage(public_url_base: Option<&str>) -> ObjectStorage {
		ObjectStorage {
			bucket: "bucket".to_string(),
			upload_base: "https://storage.googleapis.com/upload/storage/v1".to_string(),
			api_base: "https://storage.googleapis.com/storage/v1".to_string(),
			token: None,
			public_url_base: public_url_base.map(|base| base.to_string()),
		}
	}

	#[test]
	fn staging_same_kind_twice_overwrites() {
		let dir = tempfile::tempdir().expect("tempdir failed");
		let id = Uuid::new_v4();

		let first = stage_bytes(dir.path(), id, AssetKind::Saliency, "png", b"one").unwrap();
		let second = stage_bytes(dir.path(), id, AssetKind::Saliency, "png", b"two").unwrap();

		assert_eq!(first, second);

		let entries =
			fs::read_dir(staging_dir(dir.path(), id)).unwrap().count();

		assert_eq!(entries, 1);
		assert_eq!(
			fs::read(staging_dir(dir.path(), id).join("saliency.png")).unwrap(),
			b"two"
		);
	}

	#[test]
	fn slot_resolution_flips_backend_not_object_name() {
		let id = Uuid::new_v4();
		let local = resolve_slot(None, id, AssetKind::Original, "jpg", true);
		let durable = resolve_slot(
			Some(&storage(Some("https://storage.googleapis.com/bucket"))),
			id,
			AssetKind::Original,
			"jpg",
			true,
		);

		assert_eq!(local.object_name, durable.object_name);
		assert_eq!(local.backend, AssetBackend::Local);
		assert_eq!(durable.backend, AssetBackend::Durable);
		assert!(local.url.starts_with("/assets/"));
		assert!(durable.url.ends_with(&durable.object_name));
	}

	#[test]
	fn storage_without_public_prefix_stays_local() {
		let id = Uuid::new_v4();
		let slot = resolve_slot(Some(&storage(None)), id, AssetKind::Saliency, "png", false);

		assert_eq!(slot.backend, AssetBackend::Local);
		assert!(!slot.available);
	}
}
