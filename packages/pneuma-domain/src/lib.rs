pub mod assessment;
pub mod record;
pub mod time_serde;

pub use assessment::{assessment, meets_threshold, probability_text};
pub use record::{AssetBackend, AssetBundle, AssetKind, AssetSlot, PredictionRecord};
