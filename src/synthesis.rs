//! Image Synthesizer
//!
//! One backend call per variation, strictly in order. A failed item is
//! recorded and the loop moves on; output position i always belongs to
//! input variation i.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::service::ImageGenerator;
use crate::variations::PromptVariation;

pub const INVALID_PROMPT_TYPE: &str = "invalid prompt type";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Succeeded,
    Failed,
}

/// Result of attempting one variation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageArtifact {
    /// Zero-based position of the variation this artifact came from.
    pub source_variation_index: usize,
    pub prompt: Option<String>,
    pub raw_image_bytes: Vec<u8>,
    pub status: ArtifactStatus,
    pub error_detail: Option<String>,
}

impl ImageArtifact {
    pub fn succeeded(index: usize, prompt: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            source_variation_index: index,
            prompt: Some(prompt.into()),
            raw_image_bytes: bytes,
            status: ArtifactStatus::Succeeded,
            error_detail: None,
        }
    }

    pub fn failed(index: usize, prompt: Option<String>, detail: impl Into<String>) -> Self {
        Self {
            source_variation_index: index,
            prompt,
            raw_image_bytes: Vec::new(),
            status: ArtifactStatus::Failed,
            error_detail: Some(detail.into()),
        }
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == ArtifactStatus::Succeeded
    }
}

pub struct ImageSynthesizer<'a> {
    backend: &'a dyn ImageGenerator,
}

impl<'a> ImageSynthesizer<'a> {
    pub fn new(backend: &'a dyn ImageGenerator) -> Self {
        Self { backend }
    }

    pub fn synthesize(&self, variations: &[PromptVariation]) -> Vec<ImageArtifact> {
        let total = variations.len();
        let artifacts: Vec<ImageArtifact> = variations
            .iter()
            .enumerate()
            .map(|(index, variation)| {
                let artifact = self.synthesize_one(index, variation);
                match &artifact.error_detail {
                    None => info!(item = index + 1, total, "image generated"),
                    Some(detail) => warn!(
                        item = index + 1,
                        total,
                        prompt = variation.display(),
                        error = %detail,
                        "skipping prompt"
                    ),
                }
                artifact
            })
            .collect();

        let succeeded = artifacts.iter().filter(|a| a.is_succeeded()).count();
        info!(attempted = total, succeeded, "image synthesis finished");
        artifacts
    }

    fn synthesize_one(&self, index: usize, variation: &PromptVariation) -> ImageArtifact {
        let Some(prompt) = variation.as_text() else {
            let shown = Some(variation.display().to_string());
            return ImageArtifact::failed(index, shown, INVALID_PROMPT_TYPE);
        };

        let result = self
            .backend
            .generate_image(prompt)
            .map_err(|e| e.to_string())
            .and_then(|encoded| decode_payload(&encoded));

        match result {
            Ok(bytes) => ImageArtifact::succeeded(index, prompt, bytes),
            Err(detail) => ImageArtifact::failed(index, Some(prompt.to_string()), detail),
        }
    }
}

/// Decode a base64 payload and check it is a recognisable image.
pub fn decode_payload(encoded: &str) -> Result<Vec<u8>, String> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| format!("invalid base64 payload: {e}"))?;
    image::guess_format(&bytes).map_err(|e| format!("unrecognised image data: {e}"))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ServiceError;
    use std::cell::RefCell;
    use std::io::Cursor;

    fn png_base64() -> String {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(2, 2));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageOutputFormat::Png).unwrap();
        STANDARD.encode(buf.into_inner())
    }

    struct ScriptedImages {
        calls: RefCell<Vec<String>>,
    }

    impl ImageGenerator for ScriptedImages {
        fn generate_image(&self, prompt: &str) -> Result<String, ServiceError> {
            self.calls.borrow_mut().push(prompt.to_string());
            match prompt {
                "reject" => Err(ServiceError::Rejected("safety system".into())),
                "garbage" => Ok("!!!not base64!!!".into()),
                "text" => Ok(STANDARD.encode(b"plain text, not an image")),
                _ => Ok(png_base64()),
            }
        }
    }

    #[test]
    fn test_failures_are_isolated_and_positioned() {
        let backend = ScriptedImages { calls: RefCell::new(vec![]) };
        let synth = ImageSynthesizer::new(&backend);
        let input = vec![
            PromptVariation::from("castle"),
            PromptVariation::from("reject"),
            PromptVariation::Malformed("42".into()),
            PromptVariation::from("garbage"),
            PromptVariation::from("text"),
            PromptVariation::from("dragon"),
        ];

        let out = synth.synthesize(&input);
        assert_eq!(out.len(), input.len());
        for (i, artifact) in out.iter().enumerate() {
            assert_eq!(artifact.source_variation_index, i);
        }

        let statuses: Vec<_> = out.iter().map(|a| a.status).collect();
        use ArtifactStatus::*;
        assert_eq!(statuses, vec![Succeeded, Failed, Failed, Failed, Failed, Succeeded]);

        assert!(out[1].error_detail.as_deref().unwrap().contains("safety system"));
        assert_eq!(out[2].error_detail.as_deref(), Some(INVALID_PROMPT_TYPE));
        assert!(out[3].error_detail.as_deref().unwrap().contains("base64"));
        assert!(out[4].error_detail.as_deref().unwrap().contains("unrecognised"));
        assert!(!out[0].raw_image_bytes.is_empty());
        assert!(out[1].raw_image_bytes.is_empty());
    }

    #[test]
    fn test_malformed_entry_skips_backend() {
        let backend = ScriptedImages { calls: RefCell::new(vec![]) };
        let synth = ImageSynthesizer::new(&backend);
        let out = synth.synthesize(&[PromptVariation::Malformed("null".into()), PromptVariation::from("cat")]);

        assert_eq!(*backend.calls.borrow(), vec!["cat".to_string()]);
        assert_eq!(out[0].prompt.as_deref(), Some("null"));
    }

    #[test]
    fn test_empty_input() {
        let backend = ScriptedImages { calls: RefCell::new(vec![]) };
        assert!(ImageSynthesizer::new(&backend).synthesize(&[]).is_empty());
    }
}
