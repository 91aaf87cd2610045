//! Artifact-authoring boundary.
//!
//! The assembler only knows the [`ArtifactWriter`] trait; the production
//! implementation paints each page image onto an A4 PDF page, scaled to fill
//! it. Tests substitute their own writers.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use printpdf::image_crate::GenericImageView;
use printpdf::{Image, ImageTransform, Mm, PdfDocument, PdfLayerReference};
use thiserror::Error;

/// Failure while rendering or saving an artifact, attributed to the
/// offending page when the failure is page-specific.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ArtifactError {
    pub page: Option<usize>,
    pub message: String,
}

impl ArtifactError {
    pub fn page(index: usize, message: impl Into<String>) -> Self {
        Self {
            page: Some(index),
            message: message.into(),
        }
    }

    pub fn whole(message: impl Into<String>) -> Self {
        Self {
            page: None,
            message: message.into(),
        }
    }
}

/// Paints an ordered list of page images into one saved document.
pub trait ArtifactWriter: Send + Sync {
    /// File extension for artifacts produced by this writer, without the dot.
    fn extension(&self) -> &str;

    /// Render `pages` in order into a single document at `dest`.
    fn write(&self, pages: &[Vec<u8>], dest: &Path) -> Result<(), ArtifactError>;
}

// A4 at the resolution scanners typically produce.
const PAGE_WIDTH_MM: f64 = 210.0;
const PAGE_HEIGHT_MM: f64 = 297.0;
const RENDER_DPI: f64 = 300.0;
const MM_PER_INCH: f64 = 25.4;

/// Production writer: one A4 PDF page per input image.
#[derive(Clone, Copy, Debug, Default)]
pub struct PdfWriter;

impl ArtifactWriter for PdfWriter {
    fn extension(&self) -> &str {
        "pdf"
    }

    fn write(&self, pages: &[Vec<u8>], dest: &Path) -> Result<(), ArtifactError> {
        if pages.is_empty() {
            return Err(ArtifactError::whole("batch contains no pages"));
        }

        let (doc, first_page, first_layer) = PdfDocument::new(
            "scanned document",
            Mm(PAGE_WIDTH_MM as f32),
            Mm(PAGE_HEIGHT_MM as f32),
            "scan",
        );

        for (index, bytes) in pages.iter().enumerate() {
            let layer = if index == 0 {
                doc.get_page(first_page).get_layer(first_layer)
            } else {
                let (page, layer) = doc.add_page(Mm(PAGE_WIDTH_MM as f32), Mm(PAGE_HEIGHT_MM as f32), "scan");
                doc.get_page(page).get_layer(layer)
            };
            paint_page(bytes, layer).map_err(|message| ArtifactError::page(index, message))?;
        }

        let file = File::create(dest).map_err(|err| ArtifactError::whole(err.to_string()))?;
        doc.save(&mut BufWriter::new(file))
            .map_err(|err| ArtifactError::whole(err.to_string()))?;
        Ok(())
    }
}

fn paint_page(bytes: &[u8], layer: PdfLayerReference) -> Result<(), String> {
    let decoded = printpdf::image_crate::load_from_memory(bytes).map_err(|err| err.to_string())?;
    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err("image has zero dimensions".to_string());
    }

    // Scale so the image fills the whole page regardless of its pixel size.
    let width_mm = f64::from(width) * MM_PER_INCH / RENDER_DPI;
    let height_mm = f64::from(height) * MM_PER_INCH / RENDER_DPI;
    let image = Image::from_dynamic_image(&decoded);
    image.add_to_layer(
        layer,
        ImageTransform {
            scale_x: Some((PAGE_WIDTH_MM / width_mm) as f32),
            scale_y: Some((PAGE_HEIGHT_MM / height_mm) as f32),
            dpi: Some(RENDER_DPI as f32),
            ..Default::default()
        },
    );
    Ok(())
}
