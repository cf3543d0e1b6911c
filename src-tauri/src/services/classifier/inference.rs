use crate::error::PipelineError;
use crate::models::classify_types::Diagnosis;
use crate::services::classifier::decision::decide;
use image::imageops::FilterType;
use image::{ImageFormat, RgbImage};
use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;
use std::sync::Mutex;

/// Side length the classifier was trained on.
pub const INPUT_SIZE: u32 = 150;

/// NHWC, batch of one.
pub const INPUT_SHAPE: [usize; 4] = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3];

/// A loaded model: one forward pass per call, returning the sigmoid output.
pub trait Scorer: Send + Sync {
    fn score(&self, input: &Array4<f32>) -> Result<f32, PipelineError>;
}

/// ONNX Runtime session behind a mutex; `Session::run` needs `&mut`.
pub struct OnnxModel {
    session: Mutex<Session>,
    input_name: String,
}

impl OnnxModel {
    pub fn new(session: Session) -> Result<Self, PipelineError> {
        // Get the input name from the model (assuming single input)
        let input_name = session
            .inputs()
            .first()
            .map(|input| input.name().to_string())
            .ok_or_else(|| PipelineError::Inference("Model declares no inputs".to_string()))?;

        Ok(Self {
            session: Mutex::new(session),
            input_name,
        })
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }
}

impl Scorer for OnnxModel {
    fn score(&self, input: &Array4<f32>) -> Result<f32, PipelineError> {
        let input_tensor = Value::from_array(input.clone()).map_err(|e| {
            PipelineError::Inference(format!("Failed to create tensor value: {}", e))
        })?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| PipelineError::Inference("Model session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| PipelineError::Inference(format!("Forward pass failed: {}", e)))?;

        let output_value = outputs
            .values()
            .next()
            .ok_or_else(|| PipelineError::Inference("Model produced no outputs".to_string()))?;

        let (_, data) = output_value.try_extract_tensor::<f32>().map_err(|e| {
            PipelineError::Inference(format!("Failed to extract output tensor: {}", e))
        })?;

        // Single-logit head: exactly one value for a batch of one.
        match data {
            [value] => Ok(*value),
            _ => Err(PipelineError::Inference(format!(
                "Expected a single output value, got {}",
                data.len()
            ))),
        }
    }
}

/// Decode an upload into RGB. Only JPEG and PNG are accepted.
pub fn decode_upload(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    let format = image::guess_format(bytes)
        .map_err(|e| PipelineError::Decode(format!("Unrecognized image data: {}", e)))?;

    if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
        return Err(PipelineError::Decode(format!(
            "Unsupported image format {:?}, expected JPEG or PNG",
            format
        )));
    }

    let img = image::load_from_memory_with_format(bytes, format)?;
    Ok(img.to_rgb8())
}

/// Stretch to 150x150 and scale channels to [0, 1].
pub fn preprocess_rgb(rgb: &RgbImage) -> Result<Array4<f32>, PipelineError> {
    let resized = image::imageops::resize(rgb, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

    let data: Vec<f32> = resized
        .into_raw()
        .into_iter()
        .map(|v| v as f32 / 255.0)
        .collect();

    Array4::from_shape_vec(
        (INPUT_SHAPE[0], INPUT_SHAPE[1], INPUT_SHAPE[2], INPUT_SHAPE[3]),
        data,
    )
    .map_err(|e| PipelineError::Inference(format!("Failed to create tensor: {}", e)))
}

pub fn preprocess_image(bytes: &[u8]) -> Result<Array4<f32>, PipelineError> {
    let rgb = decode_upload(bytes)?;
    preprocess_rgb(&rgb)
}

/// One forward pass. The tensor must be exactly [`INPUT_SHAPE`].
pub fn run_inference(model: &dyn Scorer, input: &Array4<f32>) -> Result<f32, PipelineError> {
    if input.shape() != INPUT_SHAPE {
        return Err(PipelineError::Inference(format!(
            "Input shape {:?} does not match model input {:?}",
            input.shape(),
            INPUT_SHAPE
        )));
    }

    let score = model.score(input)?;
    if !score.is_finite() {
        return Err(PipelineError::Inference(format!(
            "Model returned a non-finite score: {}",
            score
        )));
    }

    tracing::debug!(score, "Inference complete");
    Ok(score)
}

/// Full per-upload pipeline. Also returns the decoded image for preview.
pub fn classify_upload_with_model(
    model: &dyn Scorer,
    bytes: &[u8],
) -> Result<(Diagnosis, RgbImage), PipelineError> {
    let rgb = decode_upload(bytes)?;
    tracing::debug!(
        width = rgb.width(),
        height = rgb.height(),
        "Decoded upload"
    );

    let tensor = preprocess_rgb(&rgb)?;
    let score = run_inference(model, &tensor)?;
    Ok((decide(score), rgb))
}
