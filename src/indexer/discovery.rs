// Source file discovery under a project root

use std::path::{Path, PathBuf};

use globset::GlobSet;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::ParseError;
use crate::index::{is_header_file, is_supported_file};

/// Which files under a root take part in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Descend into subdirectories; when false only the root's own files
    pub recursive: bool,
    /// Deepest directory level below the root to read files from.
    /// Files directly in the root are at depth 0.
    pub max_depth: Option<usize>,
    pub include_headers: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            max_depth: None,
            include_headers: true,
        }
    }
}

/// Files selected for a batch, plus directories that could not be read
#[derive(Debug, Default)]
pub struct Discovered {
    pub files: Vec<PathBuf>,
    pub errors: Vec<ParseError>,
}

/// Walk `root` in file-name order and select C and C++ sources
pub fn discover_files(root: &Path, options: &ScanOptions, excludes: &GlobSet) -> Discovered {
    let mut discovered = Discovered::default();

    // walkdir counts the root as depth 0 and its files as depth 1
    let walk_depth = if options.recursive {
        options.max_depth.map_or(usize::MAX, |depth| depth.saturating_add(1))
    } else {
        1
    };

    let walker = WalkDir::new(root)
        .max_depth(walk_depth)
        .sort_by_file_name()
        .into_iter();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .unwrap_or(root)
                    .display()
                    .to_string();
                tracing::warn!("Cannot read {}: {}", path, err);
                discovered.errors.push(ParseError::new(path, std::io::Error::from(err)));
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if !is_supported_file(path) {
            continue;
        }
        if !options.include_headers && is_header_file(path) {
            continue;
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        if excludes.is_match(relative) {
            debug!("Excluded {}", relative.display());
            continue;
        }

        discovered.files.push(path.to_path_buf());
    }

    debug!(
        "Discovered {} source files under {}",
        discovered.files.len(),
        root.display()
    );

    discovered
}
