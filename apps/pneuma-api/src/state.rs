use std::sync::Arc;

use pneuma_service::{PneumaService, ProviderSet, upload};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<PneumaService>,
}
impl AppState {
	pub fn new(config: pneuma_config::Config) -> Self {
		Self::with_providers(config, ProviderSet::default_http())
	}

	/// Wires the service to the given providers and spawns the durable
	/// promotion loop on the ambient runtime.
	pub fn with_providers(config: pneuma_config::Config, providers: ProviderSet) -> Self {
		let storage = config.object_storage.clone();
		let storage_provider = providers.storage.clone();
		let (service, upload_rx) = PneumaService::new(config, providers);

		tokio::spawn(upload::run_uploader(storage, storage_provider, upload_rx));

		Self { service: Arc::new(service) }
	}
}
