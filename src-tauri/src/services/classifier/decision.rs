use crate::models::classify_types::{Diagnosis, Label};

pub const DECISION_THRESHOLD: f32 = 0.5;

// The model was trained with Katarak near 0 and Normal near 1.
pub const LOW_SCORE_LABEL: Label = Label::Katarak;
pub const HIGH_SCORE_LABEL: Label = Label::Normal;

/// Map a sigmoid score to a label and the probability of that label.
///
/// Scores outside [0, 1] are clamped first, so confidence stays in [0.5, 1].
/// NaN carries no information and lands on the threshold.
pub fn decide(score: f32) -> Diagnosis {
    let score = if score.is_nan() {
        DECISION_THRESHOLD
    } else {
        score.clamp(0.0, 1.0)
    };
    if score < DECISION_THRESHOLD {
        Diagnosis {
            label: LOW_SCORE_LABEL,
            confidence: 1.0 - score,
            score,
        }
    } else {
        Diagnosis {
            label: HIGH_SCORE_LABEL,
            confidence: score,
            score,
        }
    }
}
