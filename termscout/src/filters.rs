/// Corpus file selection.
///
/// The scanner accepts any `Fn(&Path) -> bool` as its file predicate. The
/// [`FileSelector`] built from a [`ScanConfig`] is the usual one: it keeps
/// files whose extension is listed (case-insensitively), skips anything that
/// matches an ignore glob, and never selects well-known binary formats.
use glob::Pattern;
use std::path::Path;
use tracing::warn;

use crate::config::ScanConfig;

/// Checks if a file should be included based on its extension
pub fn has_valid_extension(path: &Path, extensions: &Option<Vec<String>>) -> bool {
    match extensions {
        None => true,
        Some(exts) => path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                exts.iter()
                    .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
            }),
    }
}

/// Checks if a file is likely to be binary
pub fn is_likely_binary(path: &Path) -> bool {
    const BINARY_EXTENSIONS: &[&str] = &[
        "exe", "dll", "so", "dylib", "bin", "obj", "o", "class", "jar", "png", "jpg", "jpeg",
        "gif", "bmp", "ico", "pdf", "doc", "docx", "xls", "xlsx", "zip", "tar", "gz", "7z", "rar",
    ];

    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            BINARY_EXTENSIONS
                .iter()
                .any(|bin_ext| bin_ext.eq_ignore_ascii_case(ext))
        })
}

/// Compiled file predicate for a scan
#[derive(Debug, Clone, Default)]
pub struct FileSelector {
    extensions: Option<Vec<String>>,
    ignore: Vec<Pattern>,
}

impl FileSelector {
    pub fn new(extensions: Option<Vec<String>>, ignore_patterns: &[String]) -> Self {
        let ignore = ignore_patterns
            .iter()
            .filter_map(|pattern| match Pattern::new(pattern) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("Ignoring invalid glob '{}': {}", pattern, e);
                    None
                }
            })
            .collect();
        Self { extensions, ignore }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.file_extensions.clone(), &config.ignore_patterns)
    }

    /// Checks a path (relative to the scan root) against the ignore globs
    pub fn is_ignored(&self, path: &Path) -> bool {
        let normalized = path.to_string_lossy().replace('\\', "/");
        if normalized.split('/').any(|component| component == ".git") {
            return true;
        }
        self.ignore.iter().any(|p| p.matches(&normalized))
    }

    /// Determines if a file belongs to the corpus
    pub fn matches(&self, path: &Path) -> bool {
        !is_likely_binary(path)
            && has_valid_extension(path, &self.extensions)
            && !self.is_ignored(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_valid_extension() {
        let extensions = Some(vec!["txt".to_string()]);
        assert!(has_valid_extension(Path::new("paper.txt"), &extensions));
        assert!(has_valid_extension(Path::new("paper.TXT"), &extensions));
        assert!(!has_valid_extension(Path::new("paper.md"), &extensions));
        assert!(!has_valid_extension(Path::new("README"), &extensions));
        assert!(has_valid_extension(Path::new("paper.md"), &None));

        let dotted = Some(vec![".md".to_string()]);
        assert!(has_valid_extension(Path::new("notes.md"), &dotted));
    }

    #[test]
    fn test_is_likely_binary() {
        assert!(is_likely_binary(Path::new("paper.pdf")));
        assert!(is_likely_binary(Path::new("figure.PNG")));
        assert!(!is_likely_binary(Path::new("paper.txt")));
        assert!(!is_likely_binary(Path::new("paper")));
    }

    #[test]
    fn test_ignore_patterns() {
        let selector = FileSelector::new(
            None,
            &[
                "**/drafts/**".to_string(),
                "**/*.tmp".to_string(),
                "[".to_string(), // invalid, dropped
            ],
        );
        assert!(selector.is_ignored(Path::new("2023/drafts/a.txt")));
        assert!(selector.is_ignored(Path::new("notes.tmp")));
        assert!(selector.is_ignored(Path::new(".git/HEAD")));
        assert!(!selector.is_ignored(Path::new("2023/final/a.txt")));
        assert!(!selector.is_ignored(Path::new(".gitignore")));
    }

    #[test]
    fn test_selector_matches() {
        let selector = FileSelector::new(Some(vec!["txt".to_string()]), &["skip/*".to_string()]);
        assert!(selector.matches(Path::new("cancer/paper1.txt")));
        assert!(!selector.matches(Path::new("cancer/paper1.pdf")));
        assert!(!selector.matches(Path::new("skip/paper2.txt")));

        let all = FileSelector::new(None, &[]);
        assert!(all.matches(Path::new("notes.md")));
        assert!(!all.matches(Path::new("scan.pdf")));
    }

    #[test]
    fn test_from_config_defaults_to_txt() {
        let selector = FileSelector::from_config(&ScanConfig::default());
        assert!(selector.matches(Path::new("a.txt")));
        assert!(!selector.matches(Path::new("a.csv")));
    }
}
