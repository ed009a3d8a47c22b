use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{PneumaService, SYSTEM_PROMPT, ServiceResult};
use pneuma_domain::PredictionRecord;

pub const DISCLAIMER: &str =
	"Model + LLM output is not a medical diagnosis. Seek licensed physician confirmation.";

const LLM_UNAVAILABLE: &str = "LLM unavailable: no API key configured.";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportRequest {
	pub prediction_id: Uuid,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportResponse {
	pub prediction: PredictionRecord,
	pub report: TriageReport,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TriageReport {
	pub raw: String,
	pub parsed: Option<Value>,
	pub context: String,
	pub disclaimer: String,
	pub error: Option<String>,
}

impl PneumaService {
	/// Structured triage report for a stored prediction. An unconfigured or
	/// failing LLM degrades to an error field on the report; only an unknown
	/// identifier rejects the request.
	pub async fn report(&self, req: ReportRequest) -> ServiceResult<ReportResponse> {
		let prediction = self.fetch(req.prediction_id)?;
		let context = build_context(&self.cfg.triage.target_label, prediction.probability);
		let llm_cfg = &self.cfg.providers.llm;

		if llm_cfg.api_key.is_empty() {
			return Ok(ReportResponse {
				prediction,
				report: TriageReport {
					raw: String::new(),
					parsed: None,
					context,
					disclaimer: DISCLAIMER.to_string(),
					error: Some(LLM_UNAVAILABLE.to_string()),
				},
			});
		}

		let system = format!(
			"{SYSTEM_PROMPT} You are generating a structured triage JSON report. \
			Output ONLY a JSON object."
		);
		let guidance = format!(
			"{context}\n\nProduce a concise triage JSON with keys: summary, \
			pneumonia_assessment, differential, next_steps, patient_friendly. Rules: summary: \
			one sentence. pneumonia_assessment: one of low (<0.2), uncertain (0.2-<0.4), \
			moderate (0.4-<0.6), high (>=0.6) plus brief justification. differential: only if \
			probability <0.6 (1-2 benign alternatives or empty string). next_steps: brief \
			actions (clinical correlation, follow-up). patient_friendly: <=40 words, \
			reassuring, plain language. Output ONLY JSON."
		);
		let report = match self.providers().llm.complete(llm_cfg, &system, &guidance).await {
			Ok(raw) => {
				let parsed = extract_json_object(&raw);

				TriageReport {
					raw,
					parsed,
					context,
					disclaimer: DISCLAIMER.to_string(),
					error: None,
				}
			},
			Err(err) => {
				tracing::warn!(error = %err, prediction_id = %req.prediction_id, "Report generation failed.");

				TriageReport {
					raw: String::new(),
					parsed: None,
					context,
					disclaimer: DISCLAIMER.to_string(),
					error: Some(format!("LLM invocation failed: {err}")),
				}
			},
		};

		Ok(ReportResponse { prediction, report })
	}
}

/// Human-readable context line for the label→probability mapping the LLM
/// receives. At most one scalar probability, never fabricated.
pub fn build_context(target_label: &str, probability: Option<f32>) -> String {
	match probability {
		Some(p) => {
			format!("Model probability: {target_label}: {p:.3} (NOT diagnostic, single-label focus).")
		},
		None => "No pneumonia probability available.".to_string(),
	}
}

/// First-brace to last-brace JSON extraction; models often wrap the object
/// in prose or code fences.
pub fn extract_json_object(text: &str) -> Option<Value> {
	let start = text.find('{')?;
	let end = text.rfind('}')?;

	if end < start {
		return None;
	}

	serde_json::from_str(&text[start..=end]).ok()
}
