//! Coloring Pipeline - Single Entry Point
//!
//! variations -> images -> document -> (optional) printer. Each stage gets
//! the previous stage's full output. Only a failed variation request aborts
//! a run; item failures and an empty batch are recorded in the report.

use std::path::PathBuf;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::assembly::{assemble, AssembledDocument, AssemblyError};
use crate::config::PipelineConfig;
use crate::hashing::{compute_manifest_hash, sha256_hex};
use crate::layout::{write_new, LayoutError, OutputLayout};
use crate::print::{PrintJob, PrintOutcome, PrinterBackend};
use crate::request::GenerationRequest;
use crate::service::{ImageGenerator, ServiceError, TextGenerator};
use crate::synthesis::{ArtifactStatus, ImageArtifact, ImageSynthesizer};
use crate::variations::VariationGenerator;
use crate::ENGINE_VERSION;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Variation generation failed: {0}")]
    Variations(#[from] ServiceError),

    #[error("Document assembly failed: {0}")]
    Assembly(#[from] AssemblyError),

    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// Where and how many times to print the finished document.
pub struct Delivery<'a> {
    pub printer: &'a dyn PrinterBackend,
    pub printer_name: String,
    pub copies: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReport {
    /// 1-based, matches the image file suffix.
    pub index: usize,
    pub prompt: Option<String>,
    pub status: ArtifactStatus,
    pub error: Option<String>,
    pub file: Option<PathBuf>,
    pub sha256: Option<String>,
}

/// Run manifest: what was asked for, what each item produced, and where it went.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub engine_version: String,
    pub created_at: DateTime<Utc>,
    pub theme: String,
    pub requested: u32,
    pub output_dir: PathBuf,
    pub items: Vec<ItemReport>,
    pub attempted: usize,
    pub succeeded: usize,
    pub document: Option<PathBuf>,
    /// 1-based item index of each page, page 1 first.
    pub pages: Vec<usize>,
    pub page_count: usize,
    pub print: Option<PrintOutcome>,
    pub manifest_hash: String,
}

impl RunReport {
    pub fn has_document(&self) -> bool {
        self.document.is_some()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemReport> {
        self.items.iter().filter(|i| i.status == ArtifactStatus::Failed)
    }
}

pub struct ColoringPipeline<'a> {
    variations: VariationGenerator<'a>,
    synthesizer: ImageSynthesizer<'a>,
    output_root: PathBuf,
}

impl<'a> ColoringPipeline<'a> {
    pub fn new(
        text: &'a dyn TextGenerator,
        images: &'a dyn ImageGenerator,
        output_root: impl Into<PathBuf>,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            variations: VariationGenerator::new(text, signature),
            synthesizer: ImageSynthesizer::new(images),
            output_root: output_root.into(),
        }
    }

    /// Use one backend for both text and images.
    pub fn from_config<B>(backend: &'a B, config: &PipelineConfig) -> Self
    where
        B: TextGenerator + ImageGenerator,
    {
        Self::new(backend, backend, config.output_dir.clone(), config.signature.clone())
    }

    pub fn run(&self, request: &GenerationRequest, delivery: Option<&Delivery<'_>>) -> Result<RunReport, PipelineError> {
        self.run_at(request, delivery, Local::now())
    }

    pub fn run_at(
        &self,
        request: &GenerationRequest,
        delivery: Option<&Delivery<'_>>,
        at: DateTime<Local>,
    ) -> Result<RunReport, PipelineError> {
        info!(theme = request.theme(), pages = request.page_count(), "step 1/4: generating prompt variations");
        let variations = self
            .variations
            .generate_variations(request.theme(), request.page_count())?;

        let layout = OutputLayout::new(&self.output_root, request.theme(), at);
        layout.ensure_dir()?;
        layout.ensure_unclaimed()?;
        info!(dir = %layout.dir().display(), "output directory ready");

        info!(count = variations.len(), "step 2/4: generating images");
        let artifacts = self.synthesizer.synthesize(&variations);
        let items = persist_images(&layout, &artifacts);

        let attempted = artifacts.len();
        let succeeded = artifacts.iter().filter(|a| a.is_succeeded()).count();

        info!("step 3/4: assembling document");
        let document = match assemble(&artifacts, &layout.document_path()) {
            Ok(doc) => Some(doc),
            Err(AssemblyError::EmptyBatch) => {
                error!(attempted, succeeded, "no images were generated, document not created");
                None
            }
            Err(e) => return Err(e.into()),
        };

        let print = match (&document, delivery) {
            (Some(doc), Some(delivery)) => {
                info!(printer = %delivery.printer_name, "step 4/4: printing");
                Some(deliver(doc, delivery))
            }
            (None, Some(delivery)) => {
                warn!(printer = %delivery.printer_name, "step 4/4: nothing to print");
                None
            }
            _ => None,
        };

        let mut report = RunReport {
            run_id: Uuid::new_v4(),
            engine_version: ENGINE_VERSION.to_string(),
            created_at: Utc::now(),
            theme: request.theme().to_string(),
            requested: request.page_count(),
            output_dir: layout.dir().to_path_buf(),
            items,
            attempted,
            succeeded,
            pages: document
                .as_ref()
                .map_or_else(Vec::new, |d| d.pages.iter().map(|i| i + 1).collect()),
            page_count: document.as_ref().map_or(0, AssembledDocument::page_count),
            document: document.map(|d| d.path),
            print,
            manifest_hash: String::new(),
        };
        report.manifest_hash = compute_manifest_hash(&report).map_err(LayoutError::from)?;

        let manifest = serde_json::to_vec_pretty(&report).map_err(LayoutError::from)?;
        write_new(&layout.manifest_path(), &manifest)?;

        info!(attempted, succeeded, pages = report.page_count, "run finished");
        Ok(report)
    }
}

fn persist_images(layout: &OutputLayout, artifacts: &[ImageArtifact]) -> Vec<ItemReport> {
    artifacts
        .iter()
        .map(|artifact| {
            let index = artifact.source_variation_index + 1;
            let mut item = ItemReport {
                index,
                prompt: artifact.prompt.clone(),
                status: artifact.status,
                error: artifact.error_detail.clone(),
                file: None,
                sha256: None,
            };

            if artifact.is_succeeded() {
                item.sha256 = Some(sha256_hex(&artifact.raw_image_bytes));
                let path = layout.image_path(index);
                match write_new(&path, &artifact.raw_image_bytes) {
                    Ok(()) => {
                        info!(item = index, path = %path.display(), "saved image");
                        item.file = Some(path);
                    }
                    Err(e) => warn!(item = index, error = %e, "could not save image"),
                }
            }
            item
        })
        .collect()
}

fn deliver(document: &AssembledDocument, delivery: &Delivery<'_>) -> PrintOutcome {
    let outcome = match PrintJob::from_document(document, delivery.printer_name.clone(), delivery.copies) {
        Ok(job) => delivery.printer.submit(&job),
        Err(e) => PrintOutcome::Failed { reason: e.to_string() },
    };

    match &outcome {
        PrintOutcome::Succeeded { .. } => info!(printer = %delivery.printer_name, "document sent to printer"),
        PrintOutcome::Failed { reason } => warn!(printer = %delivery.printer_name, %reason, "printing failed"),
    }
    outcome
}
