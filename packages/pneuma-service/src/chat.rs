use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{PneumaService, SYSTEM_PROMPT, ServiceError, ServiceResult};
use pneuma_domain::{PredictionRecord, probability_text};

const LLM_UNAVAILABLE: &str = "LLM unavailable: no API key configured.";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatRequest {
	pub prediction_id: Option<Uuid>,
	pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatResponse {
	pub answer: String,
}

impl PneumaService {
	/// Conversational follow-up constrained to pneumonia triage. A missing
	/// question is the only hard failure; LLM trouble degrades to an answer
	/// string, matching the report path.
	pub async fn chat(&self, req: ChatRequest) -> ServiceResult<ChatResponse> {
		if req.message.trim().is_empty() {
			return Err(ServiceError::InvalidRequest {
				message: "message must be non-empty.".to_string(),
			});
		}

		let prediction = match req.prediction_id {
			Some(prediction_id) => Some(self.fetch(prediction_id)?),
			None => None,
		};
		let llm_cfg = &self.cfg.providers.llm;

		if llm_cfg.api_key.is_empty() {
			return Ok(ChatResponse { answer: LLM_UNAVAILABLE.to_string() });
		}

		let system = format!(
			"{SYSTEM_PROMPT} You are in chat / follow-up mode. Refuse unrelated topics \
			(non-imaging, prescriptions, politics). Do not fabricate data."
		);
		let instruction = build_chat_instruction(prediction.as_ref(), req.message.trim());
		let answer = match self.providers().llm.complete(llm_cfg, &system, &instruction).await {
			Ok(answer) => answer,
			Err(err) => {
				tracing::warn!(error = %err, "Chat completion failed.");

				format!("LLM error: {err}")
			},
		};

		Ok(ChatResponse { answer })
	}
}

/// Probability fragment, threshold summary, and mask-availability context,
/// followed by the user question and answering rules.
pub fn build_chat_instruction(prediction: Option<&PredictionRecord>, message: &str) -> String {
	let mut out = String::new();

	match prediction {
		Some(prediction) => {
			out.push_str(&format!(
				"Model pneumonia probability: {}. ",
				probability_text(prediction.probability)
			));
			out.push_str(&format!(
				"Threshold: {:.2}. Meets threshold: {}. ",
				prediction.threshold, prediction.meets_threshold
			));
			out.push_str(&mask_context(prediction));
		},
		None => out.push_str("Model pneumonia probability: unavailable. "),
	}

	out.push_str(&format!(
		"User question: {message}\nRespond within 120 words. If the user asks about:\n\
		- probability: restate it exactly (4 decimal places) and remind it is not diagnostic.\n\
		- why/where the mask: explain saliency = sensitivity map (bright = contributed more); \
		reference mask = annotated opacity region if present.\n\
		- absence of a mask: explain threshold gating or unavailability.\n\
		Do NOT infer or localize disease outside provided masks. Maintain disclaimer at end."
	));

	out
}

fn mask_context(prediction: &PredictionRecord) -> String {
	let mut details = Vec::new();

	if prediction.assets.saliency.available {
		details.push(
			"saliency mask (gradient-based, highlights influential pixel regions, NOT a diagnosis)",
		);
	}
	if prediction.assets.reference_mask.available {
		details.push("reference mask (radiologist-annotated lung opacity region)");
	}

	if !details.is_empty() {
		format!("Available explanation asset(s): {}. ", details.join(", "))
	} else if prediction.meets_threshold {
		"No mask present despite meeting threshold (may be a processing issue). ".to_string()
	} else {
		"No mask generated because probability did not meet threshold. ".to_string()
	}
}
