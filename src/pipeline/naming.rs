use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Replaces characters that are not portable in file names.
pub fn sanitize_file_stem(name: &str) -> String {
    let sanitized = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>();

    if sanitized.is_empty() {
        "unnamed".to_string()
    } else {
        sanitized
    }
}

/// Hands out output paths for one session. A name that was already handed
/// out in the same directory gets the first free `_1`, `_2`, ... suffix.
/// Comparison ignores case, so the result is stable on case-insensitive
/// file systems too.
#[derive(Debug, Default)]
pub struct OutputNamer {
    claimed: HashSet<String>,
}

impl OutputNamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&mut self, directory: &Path, name: &str, extension: &str) -> PathBuf {
        let stem = sanitize_file_stem(name);

        let mut candidate = stem.clone();
        let mut suffix = 0;
        while !self.claimed.insert(Self::key(directory, &candidate, extension)) {
            suffix += 1;
            candidate = format!("{}_{}", stem, suffix);
        }

        if suffix > 0 {
            log::debug!("Output name `{}` taken, using `{}`", stem, candidate);
        }

        directory.join(format!("{}.{}", candidate, extension))
    }

    fn key(directory: &Path, stem: &str, extension: &str) -> String {
        directory
            .join(format!("{}.{}", stem, extension))
            .to_string_lossy()
            .to_lowercase()
    }
}
