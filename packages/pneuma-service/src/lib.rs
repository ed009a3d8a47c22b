pub mod chat;
pub mod predict;
pub mod reference;
pub mod report;
pub mod staging;
pub mod upload;

use std::{future::Future, path::Path, pin::Pin, sync::Arc};

use tokio::sync::mpsc;
use uuid::Uuid;

pub use chat::{ChatRequest, ChatResponse};
pub use report::{ReportRequest, ReportResponse, TriageReport};
pub use upload::UploadJob;

use pneuma_config::{ClassifierProviderConfig, Config, LlmProviderConfig, ObjectStorage};
use pneuma_domain::PredictionRecord;
use pneuma_imaging::Raster;
use pneuma_store::PredictionStore;

pub type ServiceResult<T> = Result<T, ServiceError>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Central system prompt governing both report generation and chat
/// follow-ups. Scope restriction, probability usage, and the disclaimer are
/// deliberate guardrails; keep them when editing.
pub const SYSTEM_PROMPT: &str = "You are Pneuma, an assistant radiology support tool for \
	CHEST X-RAY PNEUMONIA TRIAGE ONLY. Inputs you may receive: (a) a model-estimated pneumonia \
	probability (0-1), (b) structured triage JSON, (c) a user question. Core behaviors: \
	1. Always stay within chest X-ray pneumonia triage context. \
	2. If the user asks for the probability, restate it as: 'Model-estimated pneumonia \
	probability: <value> (not a diagnosis).' \
	3. NEVER fabricate a probability if absent; say it is unavailable. \
	4. Refuse out-of-scope topics (politics, unrelated anatomy, prescriptions, dosing, \
	non-imaging diseases) with a short redirect. \
	5. ALWAYS append a brief disclaimer: 'NOT A FINAL DIAGNOSIS. Consult a licensed physician.' \
	6. Style: concise, plain English; do not exceed necessary length. \
	7. Do NOT provide patient-identifying assumptions; remain general. \
	8. If asked for treatment, refuse and advise medical consultation.";

pub trait ClassifierProvider
where
	Self: Send + Sync,
{
	fn classify<'a>(
		&'a self,
		cfg: &'a ClassifierProviderConfig,
		raster: &'a Raster,
	) -> BoxFuture<'a, color_eyre::Result<std::collections::HashMap<String, f32>>>;

	fn input_gradient<'a>(
		&'a self,
		cfg: &'a ClassifierProviderConfig,
		raster: &'a Raster,
		target_label: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Raster>>;
}

pub trait LlmProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		system: &'a str,
		user: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

pub trait ObjectStorageProvider
where
	Self: Send + Sync,
{
	fn upload<'a>(
		&'a self,
		cfg: &'a ObjectStorage,
		token: &'a str,
		local_path: &'a Path,
		object_name: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<()>>;

	fn make_public<'a>(
		&'a self,
		cfg: &'a ObjectStorage,
		token: &'a str,
		object_name: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<()>>;
}

#[derive(Clone)]
pub struct ProviderSet {
	pub classifier: Arc<dyn ClassifierProvider>,
	pub llm: Arc<dyn LlmProvider>,
	pub storage: Arc<dyn ObjectStorageProvider>,
}
impl ProviderSet {
	pub fn default_http() -> Self {
		Self {
			classifier: Arc::new(DefaultProviders),
			llm: Arc::new(DefaultProviders),
			storage: Arc::new(DefaultProviders),
		}
	}
}

#[derive(Debug)]
pub enum ServiceError {
	InvalidImage { message: String },
	InvalidRequest { message: String },
	NotFound,
	Classifier { message: String },
}
impl std::fmt::Display for ServiceError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::InvalidImage { message } => write!(f, "Invalid image: {message}"),
			Self::InvalidRequest { message } => write!(f, "Invalid request: {message}"),
			Self::NotFound => write!(f, "Prediction not found."),
			Self::Classifier { message } => write!(f, "Classifier unavailable: {message}"),
		}
	}
}
impl std::error::Error for ServiceError {}

/// The prediction lifecycle orchestrator. Owns the bounded store, the lazy
/// reference-mask index, and the sending half of the one-way upload channel.
pub struct PneumaService {
	pub cfg: Config,
	store: PredictionStore,
	providers: ProviderSet,
	reference: reference::ReferenceIndexCell,
	upload_tx: mpsc::UnboundedSender<UploadJob>,
}
impl PneumaService {
	/// Build the service plus the receiving half of the upload channel. The
	/// caller hands the receiver to [`upload::run_uploader`]; the requester
	/// side never observes upload completion.
	pub fn new(cfg: Config, providers: ProviderSet) -> (Self, mpsc::UnboundedReceiver<UploadJob>) {
		let (upload_tx, upload_rx) = mpsc::unbounded_channel();
		let store = PredictionStore::new(cfg.store.capacity);
		let service = Self {
			cfg,
			store,
			providers,
			reference: reference::ReferenceIndexCell::new(),
			upload_tx,
		};

		(service, upload_rx)
	}

	pub fn fetch(&self, prediction_id: Uuid) -> ServiceResult<PredictionRecord> {
		self.store.get(prediction_id).ok_or(ServiceError::NotFound)
	}

	pub(crate) fn store(&self) -> &PredictionStore {
		&self.store
	}

	pub(crate) fn providers(&self) -> &ProviderSet {
		&self.providers
	}

	pub(crate) fn enqueue_upload(&self, job: UploadJob) {
		// The receiver only drops at shutdown; a failed send just means the
		// staged files stay local.
		if self.upload_tx.send(job).is_err() {
			tracing::warn!("Upload channel closed; staged files remain local.");
		}
	}
}

struct DefaultProviders;

impl ClassifierProvider for DefaultProviders {
	fn classify<'a>(
		&'a self,
		cfg: &'a ClassifierProviderConfig,
		raster: &'a Raster,
	) -> BoxFuture<'a, color_eyre::Result<std::collections::HashMap<String, f32>>> {
		Box::pin(pneuma_providers::classifier::classify(cfg, raster))
	}

	fn input_gradient<'a>(
		&'a self,
		cfg: &'a ClassifierProviderConfig,
		raster: &'a Raster,
		target_label: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Raster>> {
		Box::pin(pneuma_providers::classifier::input_gradient(cfg, raster, target_label))
	}
}
impl LlmProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		system: &'a str,
		user: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(pneuma_providers::llm::complete(cfg, system, user))
	}
}
impl ObjectStorageProvider for DefaultProviders {
	fn upload<'a>(
		&'a self,
		cfg: &'a ObjectStorage,
		token: &'a str,
		local_path: &'a Path,
		object_name: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(pneuma_providers::objectstore::upload(cfg, token, local_path, object_name))
	}

	fn make_public<'a>(
		&'a self,
		cfg: &'a ObjectStorage,
		token: &'a str,
		object_name: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(pneuma_providers::objectstore::make_public(cfg, token, object_name))
	}
}
