use serde::Serialize;
use std::fmt;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Normal,
    Katarak,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Normal => "Normal",
            Label::Katarak => "Katarak",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the decision policy for one upload.
#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct Diagnosis {
    pub label: Label,
    /// Always in [0.5, 1.0].
    pub confidence: f32,
    /// Model output after clamping to [0, 1].
    pub score: f32,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Alert,
    Success,
}

/// Everything the page needs to render one result.
#[derive(Debug, Serialize, Clone)]
pub struct ResultView {
    pub label: Label,
    pub tone: Tone,
    pub headline: String,
    pub confidence_text: String,
    pub score_text: String,
    pub explanation: String,
    pub preview: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct ModelStatus {
    pub downloaded: bool,
    pub loading: bool,
    pub ready: bool,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub downloaded: u64,
    /// Zero when the server sent no Content-Length.
    pub total: u64,
    pub percent: u64,
}
