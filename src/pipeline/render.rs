//! PDF rasterisation: render a single-page fragment PDF to a `DynamicImage`
//! via pdfium.
//!
//! pdfium calls are blocking and CPU-bound, so [`rasterize`] moves them onto
//! the blocking thread pool with `tokio::task::spawn_blocking`.

use crate::error::{FragmentError, Latex2ImageError};
use image::{DynamicImage, ImageFormat};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Environment variable naming an explicit pdfium library file.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// PDF points per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Renders the only page of a PDF.
pub trait Rasterizer: Send + Sync {
    /// Fails with [`FragmentError::MultiPage`] unless the document has
    /// exactly one page.
    fn rasterize(&self, pdf_path: &Path) -> Result<DynamicImage, FragmentError>;
}

/// pdfium-backed rasteriser.
///
/// Holds only the library location; a `Pdfium` handle is bound per call on
/// the blocking thread that renders.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    library: Option<PathBuf>,
    dpi: u32,
}

impl PdfiumRasterizer {
    /// Bind to pdfium once to check it is loadable: the library named by
    /// `PDFIUM_LIB_PATH` when set, otherwise the system library.
    pub fn bind(dpi: u32) -> Result<Self, Latex2ImageError> {
        let library = std::env::var_os(PDFIUM_LIB_PATH_ENV).map(PathBuf::from);
        if let Some(path) = &library {
            info!("Binding pdfium from {}", path.display());
        }
        bind_pdfium(library.as_deref())
            .map_err(|e| Latex2ImageError::PdfiumBindingFailed(e.to_string()))?;

        Ok(Self { library, dpi })
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }
}

fn bind_pdfium(library: Option<&Path>) -> Result<Pdfium, PdfiumError> {
    match library {
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_system_library(),
    }
    .map(Pdfium::new)
}

impl Rasterizer for PdfiumRasterizer {
    fn rasterize(&self, pdf_path: &Path) -> Result<DynamicImage, FragmentError> {
        let failed = |e: PdfiumError| FragmentError::RasterizeFailed {
            detail: format!("{:?}", e),
        };

        let pdfium = bind_pdfium(self.library.as_deref()).map_err(failed)?;
        let document = pdfium.load_pdf_from_file(pdf_path, None).map_err(failed)?;
        let pages = document.pages();
        let page_count = pages.len() as usize;
        if page_count != 1 {
            return Err(FragmentError::MultiPage { pages: page_count });
        }

        let render_config =
            PdfRenderConfig::new().scale_page_by_factor(self.dpi as f32 / POINTS_PER_INCH);
        let page = pages.get(0).map_err(failed)?;
        let image = page.render_with_config(&render_config).map_err(failed)?.as_image();

        debug!(
            "Rendered {} → {}x{} px",
            pdf_path.display(),
            image.width(),
            image.height()
        );
        Ok(image)
    }
}

/// Run a rasteriser on the blocking thread pool.
pub async fn rasterize<R: Rasterizer + ?Sized + 'static>(
    rasterizer: Arc<R>,
    pdf_path: PathBuf,
) -> Result<DynamicImage, FragmentError> {
    tokio::task::spawn_blocking(move || rasterizer.rasterize(&pdf_path))
        .await
        .map_err(|e| FragmentError::RasterizeFailed {
            detail: format!("render task panicked: {}", e),
        })?
}

/// Reject images below the minimum size.
pub fn check_size(image: &DynamicImage, min_width: u32, min_height: u32) -> Result<(), FragmentError> {
    if image.width() < min_width || image.height() < min_height {
        return Err(FragmentError::ImageTooSmall {
            width: image.width(),
            height: image.height(),
            min_width,
            min_height,
        });
    }
    Ok(())
}

/// Save as PNG.
pub fn save_png(image: &DynamicImage, path: &Path) -> Result<(), FragmentError> {
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| FragmentError::SaveFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
}
