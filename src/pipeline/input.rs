//! Input resolution: find the PDFs to convert and vet a user-supplied path.
//!
//! ## Why check the magic bytes?
//!
//! We validate the PDF header (`%PDF`) before handing a file to the parser
//! so callers get a meaningful error rather than a parser error deep in the
//! object graph.

use crate::error::Pdf2MdError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// List the `*.pdf` files directly inside `dir`, sorted by path.
///
/// Only a lower-case `.pdf` extension matches, so `a.pdf` and `a.PDF` can
/// never both claim the output directory `a/`. Sub-directories are not
/// searched.
pub fn discover_pdfs(dir: &Path) -> Result<Vec<PathBuf>, Pdf2MdError> {
    let unreadable = |source| Pdf2MdError::InputDirUnreadable {
        dir: dir.to_path_buf(),
        source,
    };

    let mut pdfs = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        if path.is_file() && has_pdf_extension(&path) {
            pdfs.push(path);
        }
    }
    pdfs.sort();

    debug!("Found {} PDF(s) in {}", pdfs.len(), dir.display());
    Ok(pdfs)
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == "pdf")
}

/// Name used for a document's output directory and Markdown file: the file
/// stem of its path.
pub fn document_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

/// Validate a local file: existence, read permission and PDF magic bytes.
pub fn resolve_local(path: &Path) -> Result<PathBuf, Pdf2MdError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(Pdf2MdError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            // Short files keep their zero padding in the error.
            let read = f.read(&mut magic).unwrap_or(0);
            if read < 4 || &magic != b"%PDF" {
                return Err(Pdf2MdError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2MdError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(Pdf2MdError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}
