use std::{fs, sync::Arc};

use pneuma_domain::AssetBackend;
use pneuma_service::{PneumaService, ServiceError, staging, upload};
use pneuma_testkit::{MockClassifier, MockLlm, RecordingStorage, StagingDir};

fn service_with(
	staging: &StagingDir,
	classifier: MockClassifier,
) -> (PneumaService, tokio::sync::mpsc::UnboundedReceiver<upload::UploadJob>) {
	let config = pneuma_testkit::test_config(staging.path().to_path_buf());
	let providers =
		pneuma_testkit::provider_set(classifier, MockLlm::replying("ok"), RecordingStorage::new());

	PneumaService::new(config, providers)
}

#[tokio::test]
async fn meeting_threshold_stages_original_and_saliency() {
	let staging_dir = StagingDir::new();
	let (service, _rx) =
		service_with(&staging_dir, MockClassifier::with_probability("Pneumonia", 0.85));
	let png = pneuma_testkit::sample_image(32, 32);
	let record = service.submit(&png, "scan.png").await.expect("submit failed");

	assert_eq!(record.probability, Some(0.85));
	assert!(record.meets_threshold);
	assert!(record.assessment.contains("meets the triage threshold"));
	assert!(record.assets.original.available);
	assert!(record.assets.saliency.available);
	assert!(!record.assets.reference_mask.available);
	assert_eq!(record.assets.saliency.backend, AssetBackend::Local);

	let dir = staging::staging_dir(staging_dir.path(), record.prediction_id);

	assert!(dir.join("image.png").is_file());
	assert!(dir.join("saliency.png").is_file());

	let fetched = service.fetch(record.prediction_id).expect("fetch failed");

	assert_eq!(fetched.prediction_id, record.prediction_id);
}

#[tokio::test]
async fn below_threshold_skips_explainability() {
	let staging_dir = StagingDir::new();
	let (service, _rx) =
		service_with(&staging_dir, MockClassifier::with_probability("Pneumonia", 0.10));
	let png = pneuma_testkit::sample_image(32, 32);
	let record = service.submit(&png, "scan.png").await.expect("submit failed");

	assert!(!record.meets_threshold);
	assert!(record.assessment.contains("is below the triage threshold"));
	assert!(record.assets.original.available);
	assert!(!record.assets.saliency.available);
	assert!(!record.assets.reference_mask.available);

	let dir = staging::staging_dir(staging_dir.path(), record.prediction_id);

	assert!(dir.join("image.png").is_file());
	assert!(!dir.join("saliency.png").exists());
}

#[tokio::test]
async fn missing_target_label_never_meets_threshold() {
	let staging_dir = StagingDir::new();
	let (service, _rx) = service_with(&staging_dir, MockClassifier::without_label());
	let png = pneuma_testkit::sample_image(32, 32);
	let record = service.submit(&png, "scan.png").await.expect("submit failed");

	assert_eq!(record.probability, None);
	assert!(!record.meets_threshold);
	assert!(record.assessment.contains("unavailable"));
}

#[tokio::test]
async fn classifier_failure_rejects_the_submission() {
	let staging_dir = StagingDir::new();
	let mut classifier = MockClassifier::with_probability("Pneumonia", 0.85);

	classifier.fail_classify = true;

	let (service, _rx) = service_with(&staging_dir, classifier);
	let png = pneuma_testkit::sample_image(32, 32);
	let err = service.submit(&png, "scan.png").await.expect_err("submit should fail");

	assert!(matches!(err, ServiceError::Classifier { .. }));
}

#[tokio::test]
async fn gradient_failure_degrades_to_unavailable_saliency() {
	let staging_dir = StagingDir::new();
	let mut classifier = MockClassifier::with_probability("Pneumonia", 0.85);

	classifier.fail_gradient = true;

	let (service, _rx) = service_with(&staging_dir, classifier);
	let png = pneuma_testkit::sample_image(32, 32);
	let record = service.submit(&png, "scan.png").await.expect("submit failed");

	assert!(record.meets_threshold);
	assert!(record.assets.original.available);
	assert!(!record.assets.saliency.available);
}

#[tokio::test]
async fn reference_mask_is_staged_for_annotated_filenames() {
	let staging_dir = StagingDir::new();
	let csv_path = staging_dir.path().join("boxes.csv");

	fs::write(
		&csv_path,
		"patientId,x,y,width,height,Target\nCase-0017,100,120,200,180,1\nCase-0099,0,0,0,0,0\n",
	)
	.expect("failed to write csv");

	let mut config = pneuma_testkit::test_config(staging_dir.path().to_path_buf());

	config.reference = Some(pneuma_testkit::reference_config(csv_path, 256));

	let providers = pneuma_testkit::provider_set(
		MockClassifier::with_probability("Pneumonia", 0.85),
		MockLlm::replying("ok"),
		RecordingStorage::new(),
	);
	let (service, _rx) = PneumaService::new(config, providers);
	let png = pneuma_testkit::sample_image(32, 32);
	let record = service.submit(&png, "case-0017.png").await.expect("submit failed");

	assert!(record.assets.reference_mask.available);

	let dir = staging::staging_dir(staging_dir.path(), record.prediction_id);

	assert!(dir.join("reference_mask.png").is_file());

	let unannotated = service.submit(&png, "case-0099.png").await.expect("submit failed");

	assert!(!unannotated.assets.reference_mask.available);
}

#[tokio::test]
async fn failed_reference_index_build_is_cached_for_the_process() {
	let staging_dir = StagingDir::new();
	let csv_path = staging_dir.path().join("boxes.csv");

	fs::write(&csv_path, "patientId,x,y,width,height,Target\nCase-0017,broken\n")
		.expect("failed to write csv");

	let mut config = pneuma_testkit::test_config(staging_dir.path().to_path_buf());

	config.reference = Some(pneuma_testkit::reference_config(csv_path.clone(), 256));

	let providers = pneuma_testkit::provider_set(
		MockClassifier::with_probability("Pneumonia", 0.85),
		MockLlm::replying("ok"),
		RecordingStorage::new(),
	);
	let (service, _rx) = PneumaService::new(config, providers);
	let png = pneuma_testkit::sample_image(32, 32);
	let first = service.submit(&png, "case-0017.png").await.expect("submit failed");

	assert!(!first.assets.reference_mask.available);

	// Repairing the CSV must not matter; the failed build sticks for the
	// lifetime of the service.
	fs::write(&csv_path, "patientId,x,y,width,height,Target\nCase-0017,100,120,200,180,1\n")
		.expect("failed to rewrite csv");

	let second = service.submit(&png, "case-0017.png").await.expect("submit failed");

	assert!(!second.assets.reference_mask.available);
}

#[tokio::test]
async fn uploader_promotes_staged_assets_and_clears_the_directory() {
	let staging_dir = StagingDir::new();
	let mut config = pneuma_testkit::test_config(staging_dir.path().to_path_buf());

	config.object_storage =
		Some(pneuma_testkit::durable_storage(Some("token"), Some("https://cdn.example/pneuma")));

	let storage = RecordingStorage::new();
	let providers = pneuma_testkit::provider_set(
		MockClassifier::with_probability("Pneumonia", 0.85),
		MockLlm::replying("ok"),
		storage.clone(),
	);
	let object_storage = config.object_storage.clone();
	let (service, upload_rx) = PneumaService::new(config, providers);
	let uploader = tokio::spawn(upload::run_uploader(
		object_storage,
		storage.clone() as Arc<dyn pneuma_service::ObjectStorageProvider>,
		upload_rx,
	));
	let png = pneuma_testkit::sample_image(32, 32);
	let record = service.submit(&png, "scan.png").await.expect("submit failed");

	assert_eq!(record.assets.original.backend, AssetBackend::Durable);
	assert!(record.assets.original.url.starts_with("https://cdn.example/pneuma/"));

	drop(service);
	uploader.await.expect("uploader panicked");

	let uploaded = storage.uploaded();
	let id = record.prediction_id;

	assert!(uploaded.contains(&format!("predictions/{id}/image.png")));
	assert!(uploaded.contains(&format!("predictions/{id}/saliency.png")));
	assert_eq!(storage.made_public().len(), uploaded.len());
	assert!(!staging::staging_dir(staging_dir.path(), id).exists());
}

#[tokio::test]
async fn upload_failure_leaves_the_record_and_staged_files_intact() {
	let staging_dir = StagingDir::new();
	let mut config = pneuma_testkit::test_config(staging_dir.path().to_path_buf());

	config.object_storage =
		Some(pneuma_testkit::durable_storage(Some("token"), Some("https://cdn.example/pneuma")));

	let storage = RecordingStorage::failing();
	let providers = pneuma_testkit::provider_set(
		MockClassifier::with_probability("Pneumonia", 0.85),
		MockLlm::replying("ok"),
		storage.clone(),
	);
	let object_storage = config.object_storage.clone();
	let (service, upload_rx) = PneumaService::new(config, providers);
	let uploader = tokio::spawn(upload::run_uploader(
		object_storage,
		storage.clone() as Arc<dyn pneuma_service::ObjectStorageProvider>,
		upload_rx,
	));
	let png = pneuma_testkit::sample_image(32, 32);
	let record = service.submit(&png, "scan.png").await.expect("submit failed");
	let id = record.prediction_id;
	let fetched = service.fetch(id).expect("fetch failed");

	assert_eq!(fetched.prediction_id, id);

	drop(service);
	uploader.await.expect("uploader panicked");

	assert!(storage.uploaded().is_empty());
	assert!(staging::staging_dir(staging_dir.path(), id).join("image.png").is_file());
}

#[tokio::test]
async fn missing_token_keeps_assets_local_without_errors() {
	let staging_dir = StagingDir::new();
	let mut config = pneuma_testkit::test_config(staging_dir.path().to_path_buf());

	config.object_storage = Some(pneuma_testkit::durable_storage(None, None));

	let storage = RecordingStorage::new();
	let providers = pneuma_testkit::provider_set(
		MockClassifier::with_probability("Pneumonia", 0.85),
		MockLlm::replying("ok"),
		storage.clone(),
	);
	let object_storage = config.object_storage.clone();
	let (service, upload_rx) = PneumaService::new(config, providers);
	let uploader = tokio::spawn(upload::run_uploader(
		object_storage,
		storage.clone() as Arc<dyn pneuma_service::ObjectStorageProvider>,
		upload_rx,
	));
	let png = pneuma_testkit::sample_image(32, 32);
	let record = service.submit(&png, "scan.png").await.expect("submit failed");

	assert_eq!(record.assets.original.backend, AssetBackend::Local);

	drop(service);
	uploader.await.expect("uploader panicked");

	assert!(storage.uploaded().is_empty());
	assert!(
		staging::staging_dir(staging_dir.path(), record.prediction_id)
			.join("image.png")
			.is_file()
	);
}

#[tokio::test]
async fn report_degrades_when_no_llm_key_is_configured() {
	let staging_dir = StagingDir::new();
	let mut config = pneuma_testkit::test_config(staging_dir.path().to_path_buf());

	config.providers.llm.api_key = String::new();

	let providers = pneuma_testkit::provider_set(
		MockClassifier::with_probability("Pneumonia", 0.85),
		MockLlm::failing(),
		RecordingStorage::new(),
	);
	let (service, _rx) = PneumaService::new(config, providers);
	let png = pneuma_testkit::sample_image(32, 32);
	let record = service.submit(&png, "scan.png").await.expect("submit failed");
	let response = service
		.report(pneuma_service::ReportRequest { prediction_id: record.prediction_id })
		.await
		.expect("report failed");

	assert!(response.report.error.as_deref().unwrap_or("").contains("LLM unavailable"));
	assert!(response.report.parsed.is_none());
}

#[tokio::test]
async fn report_parses_llm_json_output() {
	let staging_dir = StagingDir::new();
	let (service, _rx) = {
		let config = pneuma_testkit::test_config(staging_dir.path().to_path_buf());
		let providers = pneuma_testkit::provider_set(
			MockClassifier::with_probability("Pneumonia", 0.85),
			MockLlm::replying("Sure:\n{\"summary\": \"High likelihood of pneumonia.\"}"),
			RecordingStorage::new(),
		);

		PneumaService::new(config, providers)
	};
	let png = pneuma_testkit::sample_image(32, 32);
	let record = service.submit(&png, "scan.png").await.expect("submit failed");
	let response = service
		.report(pneuma_service::ReportRequest { prediction_id: record.prediction_id })
		.await
		.expect("report failed");

	assert!(response.report.error.is_none());

	let parsed = response.report.parsed.expect("report JSON missing");

	assert_eq!(parsed["summary"], "High likelihood of pneumonia.");
}

#[tokio::test]
async fn chat_answers_with_record_context() {
	let staging_dir = StagingDir::new();
	let (service, _rx) =
		service_with(&staging_dir, MockClassifier::with_probability("Pneumonia", 0.85));
	let png = pneuma_testkit::sample_image(32, 32);
	let record = service.submit(&png, "scan.png").await.expect("submit failed");
	let response = service
		.chat(pneuma_service::ChatRequest {
			prediction_id: Some(record.prediction_id),
			message: "What is my probability?".to_string(),
		})
		.await
		.expect("chat failed");

	assert_eq!(response.answer, "ok");

	let err = service
		.chat(pneuma_service::ChatRequest {
			prediction_id: Some(uuid::Uuid::new_v4()),
			message: "hello".to_string(),
		})
		.await
		.expect_err("chat should fail");

	assert!(matches!(err, ServiceError::NotFound));
}
