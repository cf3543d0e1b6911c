use crate::models::classify_types::{Diagnosis, Label, ResultView, Tone};
use crate::services::classifier::decision::{DECISION_THRESHOLD, HIGH_SCORE_LABEL, LOW_SCORE_LABEL};

pub fn tone_for(label: Label) -> Tone {
    match label {
        Label::Katarak => Tone::Alert,
        Label::Normal => Tone::Success,
    }
}

/// `0.8` → `"80.00%"`.
pub fn format_percent(fraction: f32) -> String {
    format!("{:.2}%", fraction * 100.0)
}

pub fn threshold_explanation(score: f32) -> String {
    format!(
        "The model outputs a score between 0 and 1. Scores below {:.1} are classified as {} \
         with confidence 1 - score; scores of {:.1} or above are classified as {} with \
         confidence equal to the score. This image scored {:.4}.",
        DECISION_THRESHOLD, LOW_SCORE_LABEL, DECISION_THRESHOLD, HIGH_SCORE_LABEL, score
    )
}

/// Build the result panel for one diagnosis.
pub fn render(diagnosis: &Diagnosis, preview: Option<String>) -> ResultView {
    let headline = match diagnosis.label {
        Label::Katarak => "Katarak detected".to_string(),
        Label::Normal => "Normal".to_string(),
    };

    ResultView {
        label: diagnosis.label,
        tone: tone_for(diagnosis.label),
        headline,
        confidence_text: format_percent(diagnosis.confidence),
        score_text: format!("{:.4}", diagnosis.score),
        explanation: threshold_explanation(diagnosis.score),
        preview,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::classifier::decision::decide;

    #[test]
    fn test_katarak_is_alert() {
        let view = render(&decide(0.2), None);
        assert_eq!(view.label, Label::Katarak);
        assert_eq!(view.tone, Tone::Alert);
        assert_eq!(view.confidence_text, "80.00%");
        assert_eq!(view.score_text, "0.2000");
    }

    #[test]
    fn test_missing_preview_serializes_as_null() {
        let json = serde_json::to_value(render(&decide(0.2), None)).unwrap();
        assert!(json["preview"].is_null());
    }

    #[test]
    fn test_normal_is_success() {
        let view = render(&decide(0.9), Some("data:image/jpeg;base64,".into()));
        assert_eq!(view.label, Label::Normal);
        assert_eq!(view.tone, Tone::Success);
        assert_eq!(view.confidence_text, "90.00%");
        assert_eq!(view.headline, "Normal");
        assert!(view.preview.is_some());
    }

    #[test]
    fn test_boundary_formatting() {
        assert_eq!(render(&decide(0.5), None).confidence_text, "50.00%");
        assert_eq!(render(&decide(0.0), None).confidence_text, "100.00%");
    }

    #[test]
    fn test_explanation_mentions_rule_and_score() {
        let text = threshold_explanation(0.1234);
        assert!(text.contains("below 0.5 are classified as Katarak"));
        assert!(text.contains("0.5 or above are classified as Normal"));
        assert!(text.contains("0.1234"));
    }

    #[test]
    fn test_tone_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Tone::Alert).unwrap(), "\"alert\"");
        assert_eq!(serde_json::to_string(&Tone::Success).unwrap(), "\"success\"");
    }
}
