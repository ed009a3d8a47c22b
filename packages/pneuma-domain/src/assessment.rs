/// Strict `>=` comparison against the configured threshold. An absent
/// probability never meets the threshold.
pub fn meets_threshold(probability: Option<f32>, threshold: f32) -> bool {
	matches!(probability, Some(p) if p >= threshold)
}

/// Natural-language assessment with exactly two branches, keyed on whether
/// the probability meets the live threshold.
pub fn assessment(probability: Option<f32>, threshold: f32) -> String {
	let shown = probability_text(probability);

	if meets_threshold(probability, threshold) {
		format!(
			"Model-estimated pneumonia probability {shown} meets the triage threshold \
			{threshold:.2}. High-likelihood opacity pattern; radiologist review is recommended. \
			NOT A FINAL DIAGNOSIS."
		)
	} else {
		format!(
			"Model-estimated pneumonia probability {shown} is below the triage threshold \
			{threshold:.2}. No automated opacity localization was produced. \
			NOT A FINAL DIAGNOSIS."
		)
	}
}

pub fn probability_text(probability: Option<f32>) -> String {
	match probability {
		Some(p) => format!("{p:.4}"),
		None => "unavailable".to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn threshold_comparison_is_strict_gte() {
		assert!(meets_threshold(Some(0.70), 0.70));
		assert!(meets_threshold(Some(0.85), 0.70));
		assert!(!meets_threshold(Some(0.699_99), 0.70));
		assert!(!meets_threshold(None, 0.70));
	}

	#[test]
	fn assessment_branches_on_threshold() {
		let high = assessment(Some(0.85), 0.70);

		assert!(high.contains("meets the triage threshold"));
		assert!(high.contains("0.8500"));
		assert!(high.contains("0.70"));

		let low = assessment(Some(0.10), 0.70);

		assert!(low.contains("is below the triage threshold"));
	}

	#[test]
	fn unavailable_probability_is_not_rendered_as_zero() {
		let text = assessment(None, 0.70);

		assert!(text.contains("unavailable"));
		assert!(!text.contains("0.0000"));
	}
}
