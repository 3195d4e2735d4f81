//! Artifact Assembler
//!
//! Succeeded artifacts become one A4 page each, in original order. Every
//! image is normalised to 8-bit RGB first; a single conversion failure fails
//! the whole document. Nothing is written for an empty batch.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use image::DynamicImage;
use printpdf::{Image, ImageTransform, Mm, PdfDocument};
use thiserror::Error;
use tracing::info;

use crate::synthesis::ImageArtifact;

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;
const MM_PER_INCH: f32 = 25.4;
const LAYER_NAME: &str = "Colouring";

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("No successfully generated images to assemble")]
    EmptyBatch,

    #[error("Failed to decode image for variation {index}: {source}")]
    Decode {
        index: usize,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to create document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write PDF: {0}")]
    Pdf(String),
}

/// The persisted, paginated result of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledDocument {
    pub path: PathBuf,
    /// `source_variation_index` of each page, page 1 first.
    pub pages: Vec<usize>,
}

impl AssembledDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Normalise to the single colour mode used for pages.
pub fn normalize(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageRgb8(_) => image,
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

/// Resolution at which `width_px` x `height_px` fits inside an A4 page.
fn fit_dpi(width_px: u32, height_px: u32) -> f32 {
    let by_width = width_px as f32 / (PAGE_WIDTH_MM / MM_PER_INCH);
    let by_height = height_px as f32 / (PAGE_HEIGHT_MM / MM_PER_INCH);
    by_width.max(by_height).max(1.0)
}

/// Create `destination` exclusively and hand it to `write`. A failed write
/// removes the partial file.
fn write_exclusive<F>(destination: &Path, write: F) -> Result<(), AssemblyError>
where
    F: FnOnce(File) -> Result<(), String>,
{
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)
        .map_err(|source| AssemblyError::Io {
            path: destination.to_path_buf(),
            source,
        })?;

    write(file).map_err(|reason| {
        let _ = fs::remove_file(destination);
        AssemblyError::Pdf(reason)
    })
}

pub fn assemble(artifacts: &[ImageArtifact], destination: &Path) -> Result<AssembledDocument, AssemblyError> {
    let mut pages = Vec::new();
    let mut images = Vec::new();

    for artifact in artifacts.iter().filter(|a| a.is_succeeded()) {
        let decoded = image::load_from_memory(&artifact.raw_image_bytes).map_err(|source| {
            AssemblyError::Decode {
                index: artifact.source_variation_index,
                source,
            }
        })?;
        images.push(normalize(decoded));
        pages.push(artifact.source_variation_index);
    }

    if images.is_empty() {
        return Err(AssemblyError::EmptyBatch);
    }

    let title = destination
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "colouring".to_string());
    let (doc, first_page, first_layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), LAYER_NAME);

    let mut first = Some((first_page, first_layer));
    for img in &images {
        let (page, layer) = first
            .take()
            .unwrap_or_else(|| doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), LAYER_NAME));
        let layer = doc.get_page(page).get_layer(layer);

        let dpi = fit_dpi(img.width(), img.height());
        let width_mm = img.width() as f32 / dpi * MM_PER_INCH;
        let height_mm = img.height() as f32 / dpi * MM_PER_INCH;

        Image::from_dynamic_image(img).add_to_layer(
            layer,
            ImageTransform {
                translate_x: Some(Mm((PAGE_WIDTH_MM - width_mm) / 2.0)),
                translate_y: Some(Mm((PAGE_HEIGHT_MM - height_mm) / 2.0)),
                dpi: Some(dpi),
                ..Default::default()
            },
        );
    }

    write_exclusive(destination, |file| {
        doc.save(&mut BufWriter::new(file)).map_err(|e| e.to_string())
    })?;

    info!(path = %destination.display(), pages = pages.len(), "document assembled");

    Ok(AssembledDocument {
        path: destination.to_path_buf(),
        pages,
    })
}
