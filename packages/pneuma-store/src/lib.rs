use std::{collections::HashMap, sync::Mutex};

use uuid::Uuid;

use pneuma_domain::PredictionRecord;

/// Bounded in-memory map from prediction identifier to record.
///
/// Eviction is strict oldest-first by `created_at`, found by a linear scan
/// on `put`. The mutex guards only the map mutation itself; callers never
/// hold it across staging or upload work.
pub struct PredictionStore {
	capacity: usize,
	records: Mutex<HashMap<Uuid, PredictionRecord>>,
}
impl PredictionStore {
	pub fn new(capacity: usize) -> Self {
		Self { capacity: capacity.max(1), records: Mutex::new(HashMap::new()) }
	}

	/// Insert a record, evicting the entry with the smallest creation
	/// timestamp when the store is at capacity. Ties break arbitrarily.
	pub fn put(&self, record: PredictionRecord) {
		let mut records = self.records.lock().unwrap_or_else(|err| err.into_inner());

		if records.len() >= self.capacity && !records.contains_key(&record.prediction_id) {
			let oldest = records
				.values()
				.min_by_key(|existing| existing.created_at)
				.map(|existing| existing.prediction_id);

			if let Some(oldest) = oldest {
				records.remove(&oldest);
			}
		}

		records.insert(record.prediction_id, record);
	}

	/// A missing identifier and an evicted one both return a plain `None`;
	/// callers cannot tell the two apart.
	pub fn get(&self, prediction_id: Uuid) -> Option<PredictionRecord> {
		let records = self.records.lock().unwrap_or_else(|err| err.into_inner());

		records.get(&prediction_id).cloned()
	}

	pub fn len(&self) -> usize {
		let records = self.records.lock().unwrap_or_else(|err| err.into_inner());

		records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
