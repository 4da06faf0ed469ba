//! Markdown output document
//!
//! Every visited page becomes one section of the document. Sections are
//! written and flushed one at a time, so whatever was appended before an
//! interruption stays on disk.

use crate::DocumentError;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use url::Url;

/// One page's contribution to the document
#[derive(Debug, Clone, Copy)]
pub struct Section<'a> {
    pub url: &'a Url,
    pub title: Option<&'a str>,
    pub text: &'a str,
    pub image: Option<&'a Path>,
}

impl Section<'_> {
    /// Heading text: the title, else the last path segment, else the URL
    pub fn heading(&self) -> String {
        if let Some(title) = self.title.map(str::trim).filter(|t| !t.is_empty()) {
            return title.to_string();
        }

        self.url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.to_string())
            .unwrap_or_else(|| self.url.to_string())
    }
}

/// Append-only Markdown document shared by all units of work
#[derive(Debug)]
pub struct MarkdownDocument {
    path: PathBuf,
    file: Mutex<File>,
    sections: AtomicUsize,
}

impl MarkdownDocument {
    /// Creates (or truncates) the document and writes its top-level heading
    pub async fn create(path: impl Into<PathBuf>, title: &str) -> Result<Self, DocumentError> {
        let path = path.into();
        create_parent(&path).await?;

        let mut file = File::create(&path).await?;
        file.write_all(format!("# {}\n\n", title).as_bytes()).await?;
        file.flush().await?;

        Ok(Self::from_file(path, file))
    }

    /// Opens an existing document for appending, creating it if missing
    ///
    /// Used when resuming, so sections from the earlier run are kept.
    pub async fn open_append(path: impl Into<PathBuf>) -> Result<Self, DocumentError> {
        let path = path.into();
        create_parent(&path).await?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self::from_file(path, file))
    }

    fn from_file(path: PathBuf, file: File) -> Self {
        Self {
            path,
            file: Mutex::new(file),
            sections: AtomicUsize::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of sections appended through this handle
    pub fn sections_written(&self) -> usize {
        self.sections.load(Ordering::Relaxed)
    }

    /// Appends one section and flushes it to disk
    pub async fn append(&self, section: &Section<'_>) -> Result<(), DocumentError> {
        let base = self.path.parent().unwrap_or_else(|| Path::new(""));
        let markdown = format_section(section, base);

        let mut file = self.file.lock().await;
        file.write_all(markdown.as_bytes()).await?;
        file.flush().await?;
        self.sections.fetch_add(1, Ordering::Relaxed);

        Ok(())
    }
}

async fn create_parent(path: &Path) -> Result<(), DocumentError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

/// Formats a section as Markdown
///
/// Image paths are written relative to `base` (the document's directory)
/// when they live under it.
pub fn format_section(section: &Section<'_>, base: &Path) -> String {
    let heading = section.heading();
    let mut md = String::new();

    md.push_str(&format!("## {}\n\n", heading));
    md.push_str(&format!("<{}>\n\n", section.url));

    if let Some(image) = section.image {
        let relative = image.strip_prefix(base).unwrap_or(image);
        let target = relative.to_string_lossy().replace('\\', "/");
        md.push_str(&format!("![{}]({})\n\n", heading, target));
    }

    let text = section.text.trim();
    if !text.is_empty() {
        md.push_str(text);
        md.push_str("\n\n");
    }

    md
}
