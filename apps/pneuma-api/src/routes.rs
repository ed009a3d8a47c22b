use axum::extract::{Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use uuid::Uuid;

use crate::state::AppState;
use pneuma_domain::PredictionRecord;
use pneuma_service::{ChatRequest, ChatResponse, ReportRequest, ReportResponse, ServiceError};

const ALLOWED_CONTENT_TYPES: &[&str] =
	&["image/jpeg", "image/jpg", "image/png", "application/octet-stream"];

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/predict", post(predict))
		.route("/v1/predictions/{id}", get(fetch))
		.route("/v1/report", post(report))
		.route("/v1/chat", post(chat))
		.route("/assets/{id}/{file}", get(asset))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn predict(
	State(state): State<AppState>,
	mut multipart: Multipart,
) -> Result<Json<PredictionRecord>, ApiError> {
	let mut upload = None;

	while let Some(field) = multipart
		.next_field()
		.await
		.map_err(|err| json_error(StatusCode::BAD_REQUEST, "invalid_multipart", err.to_string()))?
	{
		if field.name() != Some("file") {
			continue;
		}

		if let Some(content_type) = field.content_type() {
			if !ALLOWED_CONTENT_TYPES.contains(&content_type) {
				return Err(json_error(
					StatusCode::UNSUPPORTED_MEDIA_TYPE,
					"unsupported_media_type",
					format!("Content type {content_type} is not supported."),
				));
			}
		}

		let original_filename =
			field.file_name().unwrap_or("upload").to_string();
		let bytes = field.bytes().await.map_err(|err| {
			json_error(StatusCode::BAD_REQUEST, "invalid_multipart", err.to_string())
		})?;

		upload = Some((original_filename, bytes));
		break;
	}

	let Some((original_filename, bytes)) = upload else {
		return Err(json_error(
			StatusCode::BAD_REQUEST,
			"invalid_request",
			"Multipart field `file` is required.",
		));
	};
	let record = state.service.submit(&bytes, &original_filename).await?;
	Ok(Json(record))
}

async fn fetch(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<Json<PredictionRecord>, ApiError> {
	let record = state.service.fetch(id)?;
	Ok(Json(record))
}

async fn report(
	State(state): State<AppState>,
	Json(payload): Json<ReportRequest>,
) -> Result<Json<ReportResponse>, ApiError> {
	let response = state.service.report(payload).await?;
	Ok(Json(response))
}

async fn chat(
	State(state): State<AppState>,
	Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
	let response = state.service.chat(payload).await?;
	Ok(Json(response))
}

/// Serves locally staged assets. Durable mode replaces these URLs with
/// public object-storage links, so this route only matters before promotion
/// or when no storage is configured.
async fn asset(
	State(state): State<AppState>,
	Path((id, file)): Path<(Uuid, String)>,
) -> Result<Response, ApiError> {
	if file.contains('/') || file.contains('\\') || file.contains("..") {
		return Err(json_error(
			StatusCode::BAD_REQUEST,
			"invalid_request",
			"Asset file name is invalid.",
		));
	}

	let path =
		pneuma_service::staging::staging_dir(&state.service.cfg.staging.root, id).join(&file);
	let bytes = tokio::fs::read(&path)
		.await
		.map_err(|_| json_error(StatusCode::NOT_FOUND, "not_found", "Asset not found."))?;
	let content_type = match path.extension().and_then(|ext| ext.to_str()) {
		Some("png") => "image/png",
		Some("jpg") | Some("jpeg") => "image/jpeg",
		_ => "application/octet-stream",
	};

	Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}

pub fn json_error(
	status: StatusCode,
	code: &str,
	message: impl Into<String>,
) -> ApiError {
	ApiError { status, error_code: code.to_string(), message: message.into() }
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidImage { message } => {
				json_error(StatusCode::BAD_REQUEST, "invalid_image", message)
			},
			ServiceError::InvalidRequest { message } => {
				json_error(StatusCode::BAD_REQUEST, "invalid_request", message)
			},
			ServiceError::NotFound => {
				json_error(StatusCode::NOT_FOUND, "not_found", "Prediction not found.")
			},
			ServiceError::Classifier { message } => {
				json_error(StatusCode::BAD_GATEWAY, "classifier_unavailable", message)
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };
		(self.status, Json(body)).into_response()
	}
}
