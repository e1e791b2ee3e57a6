//! PDF Source: recursive discovery under the configured root.
//!
//! pdfium crashes on some non-PDF inputs instead of returning an error, so
//! every candidate is checked for the `%PDF` magic bytes before it is opened.

use crate::error::{FileError, IngestError};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Find every `*.pdf` (case-insensitive) below `root`, sorted by path.
///
/// A missing root is created empty and yields no files.
pub fn discover_pdfs(root: &Path) -> Result<Vec<PathBuf>, IngestError> {
    if !root.exists() {
        std::fs::create_dir_all(root).map_err(|e| IngestError::SourceDirectory {
            path: root.to_path_buf(),
            detail: e.to_string(),
        })?;
        info!("Created empty PDF folder: {}", root.display());
        return Ok(Vec::new());
    }

    if !root.is_dir() {
        return Err(IngestError::SourceDirectory {
            path: root.to_path_buf(),
            detail: "not a directory".to_string(),
        });
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                None
            }
        })
        .filter(|e| e.file_type().is_file() && has_pdf_extension(e.path()))
        .map(|e| e.into_path())
        .collect();

    files.sort();
    debug!("Discovered {} PDF(s) under {}", files.len(), root.display());
    Ok(files)
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// The file name used as `source` in records.
pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Identity of a PDF within the library: its path relative to `root`,
/// `/`-separated. Files outside `root` keep their full path.
pub fn document_key(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(relative) => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

/// Validate existence and the `%PDF` magic bytes.
pub fn check_pdf_magic(path: &Path) -> Result<(), FileError> {
    let mut file = std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => FileError::NotFound {
            path: path.to_path_buf(),
        },
        _ => FileError::Open {
            path: path.to_path_buf(),
            detail: e.to_string(),
        },
    })?;

    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic) {
        Ok(()) if &magic == b"%PDF" => Ok(()),
        Ok(()) => Err(FileError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        }),
        Err(_) => Err(FileError::Open {
            path: path.to_path_buf(),
            detail: "file is shorter than a PDF header".to_string(),
        }),
    }
}
