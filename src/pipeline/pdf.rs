//! PDF rendering of a finished Markdown journal
//!
//! The journal written by [`MarkdownDocument`](super::MarkdownDocument) is the
//! source of truth while crawling. Once a run ends it can be typeset into a
//! PDF with the configured fonts. Stored images are flattened to opaque RGB
//! before embedding; formats the decoder cannot read (SVG) are left out with a
//! warning.

use crate::DocumentError;
use genpdf::elements::{Break, Image, Paragraph};
use genpdf::fonts::{FontData, FontFamily};
use genpdf::style::{Color, Style};
use genpdf::{Alignment, Element, Scale, SimplePageDecorator};
use std::path::{Path, PathBuf};

/// Page margin on every side (mm)
const MARGIN_MM: i32 = 10;

/// Printable area of an A4 page inside the margins (mm)
const CONTENT_WIDTH_MM: f64 = 210.0 - 2.0 * MARGIN_MM as f64;
const CONTENT_HEIGHT_MM: f64 = 160.0;

/// Resolution genpdf assumes for embedded images
const IMAGE_DPI: f64 = 300.0;

/// One page entry read back from the journal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalSection {
    pub heading: String,
    pub url: Option<String>,
    /// Absolute path of the stored image
    pub image: Option<PathBuf>,
    pub text: String,
}

/// A journal read back from disk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Journal {
    pub title: Option<String>,
    pub sections: Vec<JournalSection>,
}

/// What went into a rendered PDF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdfSummary {
    pub sections: usize,
    pub images: usize,
}

/// Parses the Markdown journal format
///
/// Image targets are resolved against `base`, the directory holding the
/// journal. Blocks that do not belong to a section are ignored.
pub fn parse_journal(markdown: &str, base: &Path) -> Journal {
    let mut journal = Journal::default();

    let blocks = markdown
        .split("\n\n")
        .map(str::trim)
        .filter(|block| !block.is_empty());

    for block in blocks {
        if let Some(heading) = block.strip_prefix("## ") {
            journal.sections.push(JournalSection {
                heading: heading.trim().to_string(),
                url: None,
                image: None,
                text: String::new(),
            });
            continue;
        }

        let section = match journal.sections.last_mut() {
            Some(section) => section,
            None => {
                if let Some(title) = block.strip_prefix("# ") {
                    journal.title.get_or_insert_with(|| title.trim().to_string());
                }
                continue;
            }
        };

        if section.url.is_none() && section.text.is_empty() {
            if let Some(url) = block.strip_prefix('<').and_then(|b| b.strip_suffix('>')) {
                section.url = Some(url.to_string());
                continue;
            }
        }

        if section.image.is_none() && section.text.is_empty() {
            if let Some(target) = image_target(block) {
                section.image = Some(base.join(target));
                continue;
            }
        }

        if !section.text.is_empty() {
            section.text.push(' ');
        }
        section.text.push_str(block);
    }

    journal
}

/// Target of a `![alt](target)` block
fn image_target(block: &str) -> Option<&str> {
    if !block.starts_with("![") || !block.ends_with(')') {
        return None;
    }
    let start = block.rfind("](")? + 2;
    let target = &block[start..block.len() - 1];
    Some(target).filter(|t| !t.is_empty())
}

/// Loads the regular and bold faces from `font_dir`
///
/// The first listed file is the regular face and the second the bold one;
/// with a single file it is used for both.
pub fn load_font_family(
    font_dir: &Path,
    fonts: &[String],
) -> Result<FontFamily<FontData>, DocumentError> {
    let regular_name = fonts
        .first()
        .ok_or_else(|| DocumentError::Render("no font files configured".to_string()))?;
    let bold_name = fonts.get(1).unwrap_or(regular_name);

    let regular = load_font(&font_dir.join(regular_name))?;
    let bold = load_font(&font_dir.join(bold_name))?;

    Ok(FontFamily {
        italic: regular.clone(),
        bold_italic: bold.clone(),
        regular,
        bold,
    })
}

fn load_font(path: &Path) -> Result<FontData, DocumentError> {
    FontData::load(path, None)
        .map_err(|e| DocumentError::Render(format!("font '{}': {}", path.display(), e)))
}

/// Typesets the journal at `markdown_path` into `pdf_path`
///
/// Blocking; run it off the async runtime.
pub fn render_pdf(
    markdown_path: &Path,
    pdf_path: &Path,
    font_dir: &Path,
    fonts: &[String],
) -> Result<PdfSummary, DocumentError> {
    let markdown = std::fs::read_to_string(markdown_path)?;
    let base = markdown_path.parent().unwrap_or_else(|| Path::new(""));
    let journal = parse_journal(&markdown, base);
    let family = load_font_family(font_dir, fonts)?;

    let title = journal
        .title
        .clone()
        .unwrap_or_else(|| "Web Content".to_string());

    let mut doc = genpdf::Document::new(family);
    doc.set_title(title.clone());
    doc.set_font_size(10);
    let mut decorator = SimplePageDecorator::new();
    decorator.set_margins(MARGIN_MM);
    doc.set_page_decorator(decorator);

    doc.push(Paragraph::new(title).styled(Style::new().bold().with_font_size(18)));
    doc.push(Break::new(1));

    let mut images = 0;
    for section in &journal.sections {
        doc.push(
            Paragraph::new(section.heading.clone())
                .styled(Style::new().bold().with_font_size(14)),
        );
        if let Some(url) = &section.url {
            doc.push(
                Paragraph::new(url.clone())
                    .styled(Style::new().with_font_size(8).with_color(Color::Rgb(0, 0, 160))),
            );
        }
        if let Some(path) = &section.image {
            match load_image(path) {
                Ok(image) => {
                    doc.push(Break::new(0.5));
                    doc.push(image);
                    images += 1;
                }
                Err(e) => tracing::warn!("Leaving image out of the PDF: {}", e),
            }
        }
        if !section.text.is_empty() {
            doc.push(Break::new(0.5));
            doc.push(Paragraph::new(section.text.clone()));
        }
        doc.push(Break::new(1.5));
    }

    doc.render_to_file(pdf_path)
        .map_err(|e| DocumentError::Render(format!("{}: {}", pdf_path.display(), e)))?;

    tracing::info!(
        "Rendered {} sections ({} images) to {}",
        journal.sections.len(),
        images,
        pdf_path.display()
    );

    Ok(PdfSummary {
        sections: journal.sections.len(),
        images,
    })
}

/// Decodes a stored image and flattens it to opaque RGB
fn load_image(path: &Path) -> Result<Image, DocumentError> {
    let decoded = image::open(path)
        .map_err(|e| DocumentError::Render(format!("image '{}': {}", path.display(), e)))?;
    let rgb = decoded.to_rgb8();
    let scale = fit_scale(rgb.width(), rgb.height());

    let image = Image::from_dynamic_image(image::DynamicImage::ImageRgb8(rgb))
        .map_err(|e| DocumentError::Render(format!("image '{}': {}", path.display(), e)))?
        .with_alignment(Alignment::Center)
        .with_scale(Scale::new(scale, scale));
    Ok(image)
}

/// Scale factor that fits an image of the given pixel size on the page
///
/// Small images keep their natural size.
fn fit_scale(width_px: u32, height_px: u32) -> f64 {
    let to_mm = |px: u32| f64::from(px.max(1)) * 25.4 / IMAGE_DPI;
    let horizontal = CONTENT_WIDTH_MM / to_mm(width_px);
    let vertical = CONTENT_HEIGHT_MM / to_mm(height_px);
    horizontal.min(vertical).min(1.0)
}
