//! Requirement manifests: one package specifier per line, `#` comments and
//! blank lines allowed.
//!
//! ```text
//! # Web scraping
//! playwright>=1.40.0
//! httpx[http2]>=0.25, <1.0 ; python_version >= "3.8"
//! ```

pub mod specifier;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use tracing::debug;

pub use specifier::{ComparisonOp, Requirement, SpecifierError, VersionConstraint};

use crate::error::{CrawlError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum LineKind {
    Blank,
    Comment(String),
    Requirement(Requirement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManifestLine {
    /// 1-based line number
    pub number: usize,
    pub kind: LineKind,
}

/// A line that failed to parse.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("line {line}: {source} (`{text}`)")]
pub struct ManifestError {
    pub line: usize,
    pub text: String,
    pub source: SpecifierError,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Manifest {
    pub lines: Vec<ManifestLine>,
}

impl Manifest {
    /// Parse a whole manifest. Every line error is collected so a caller can
    /// report all of them at once.
    pub fn parse(text: &str) -> std::result::Result<Self, Vec<ManifestError>> {
        let mut lines = Vec::new();
        let mut errors = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let number = idx + 1;
            let trimmed = raw.trim();

            if trimmed.is_empty() {
                lines.push(ManifestLine { number, kind: LineKind::Blank });
                continue;
            }
            if let Some(comment) = trimmed.strip_prefix('#') {
                lines.push(ManifestLine {
                    number,
                    kind: LineKind::Comment(comment.trim().to_string()),
                });
                continue;
            }

            let spec = strip_inline_comment(trimmed);
            match spec.parse::<Requirement>() {
                Ok(requirement) => lines.push(ManifestLine {
                    number,
                    kind: LineKind::Requirement(requirement),
                }),
                Err(source) => errors.push(ManifestError {
                    line: number,
                    text: trimmed.to_string(),
                    source,
                }),
            }
        }

        if errors.is_empty() {
            debug!("Parsed manifest with {} lines", lines.len());
            Ok(Self { lines })
        } else {
            Err(errors)
        }
    }

    /// Read and parse a manifest file. The outer error is the read failure,
    /// the inner one carries every line error from [`Manifest::parse`].
    pub fn read(path: &Path) -> Result<std::result::Result<Self, Vec<ManifestError>>> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CrawlError::StorageError(format!("Failed to read {}: {}", path.display(), e)))?;
        Ok(Self::parse(&text))
    }

    /// Like [`Manifest::read`] with line errors folded into one `ParseError`.
    pub fn load(path: &Path) -> Result<Self> {
        Self::read(path)?.map_err(|errors| {
            let joined = errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ");
            CrawlError::ParseError(format!("{}: {}", path.display(), joined)).into()
        })
    }

    pub fn requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.lines.iter().filter_map(|line| match &line.kind {
            LineKind::Requirement(req) => Some(req),
            _ => None,
        })
    }

    /// Requirements locked to one version with `==` or `===`.
    pub fn pinned(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements().filter(|req| req.is_pinned())
    }

    pub fn comments(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|line| match &line.kind {
            LineKind::Comment(text) => Some(text.as_str()),
            _ => None,
        })
    }

    /// Normalized names declared more than once, in order of first repeat.
    pub fn duplicates(&self) -> Vec<String> {
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut duplicates = Vec::new();
        for req in self.requirements() {
            let name = req.normalized_name();
            let count = seen.entry(name.clone()).or_insert(0);
            *count += 1;
            if *count == 2 {
                duplicates.push(name);
            }
        }
        duplicates
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            match &line.kind {
                LineKind::Blank => writeln!(f)?,
                LineKind::Comment(text) => writeln!(f, "# {}", text)?,
                LineKind::Requirement(req) => writeln!(f, "{}", req)?,
            }
        }
        Ok(())
    }
}

/// Drop a trailing ` # comment`. A `#` glued to the specifier is left alone
/// so the parser reports it.
fn strip_inline_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'#' && i > 0 && bytes[i - 1].is_ascii_whitespace() {
            return line[..i].trim_end();
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRAPER_MANIFEST: &str = include_str!("../../tests/fixtures/requirements.txt");

    #[test]
    fn test_fixture_manifest_parses() {
        let manifest = Manifest::parse(SCRAPER_MANIFEST).unwrap();
        let names: Vec<&str> = manifest.requirements().map(|r| r.name.as_str()).collect();

        assert!(names.contains(&"playwright"));
        assert!(names.contains(&"transformers"));
        assert!(names.contains(&"python-dotenv"));
        assert!(manifest.comments().count() >= 3);
        assert!(manifest.duplicates().is_empty());

        let transformers = manifest
            .requirements()
            .find(|r| r.name == "transformers")
            .unwrap();
        assert_eq!(transformers.extras, vec!["torch".to_string()]);
        assert_eq!(transformers.constraints[0].op, ComparisonOp::GreaterEqual);
    }

    #[test]
    fn test_blank_and_comment_lines() {
        let manifest = Manifest::parse("\n# heading\n   \nrequests>=2.0\n").unwrap();
        assert_eq!(manifest.lines.len(), 4);
        assert_eq!(manifest.lines[0].kind, LineKind::Blank);
        assert_eq!(manifest.lines[1].kind, LineKind::Comment("heading".to_string()));
        assert_eq!(manifest.lines[3].number, 4);
        assert_eq!(manifest.requirements().count(), 1);
    }

    #[test]
    fn test_inline_comment_is_stripped() {
        let manifest = Manifest::parse("aiohttp>=3.9.0  # async http\n").unwrap();
        let req = manifest.requirements().next().unwrap();
        assert_eq!(req.name, "aiohttp");
        assert_eq!(req.constraints[0].version, "3.9.0");
    }

    #[test]
    fn test_all_errors_are_reported_with_line_numbers() {
        let text = "requests>=2.0\n>=1.0\nfoo[bar\nok==1\nbaz>=\n";
        let errors = Manifest::parse(text).unwrap_err();

        let lines: Vec<usize> = errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![2, 3, 5]);
        assert_eq!(errors[0].source, SpecifierError::EmptyName);
        assert_eq!(errors[1].source, SpecifierError::UnclosedExtras);
        assert!(errors[2].to_string().starts_with("line 5:"));
    }

    #[test]
    fn test_duplicates_use_normalized_names() {
        let manifest = Manifest::parse("python-dotenv>=1.0\nPython_Dotenv==1.0.1\ntqdm\n").unwrap();
        assert_eq!(manifest.duplicates(), vec!["python-dotenv".to_string()]);
    }

    #[test]
    fn test_display_renders_canonical_lines() {
        let manifest = Manifest::parse("# deps\nhttpx[http2] >= 0.25 , <1\n").unwrap();
        assert_eq!(manifest.to_string(), "# deps\nhttpx[http2]>=0.25,<1\n");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requirements.txt");
        std::fs::write(&path, "tqdm>=4.66.0\nbroken[\n").unwrap();

        let err = Manifest::load(&path).unwrap_err();
        assert!(err.to_string().contains("line 2"));

        std::fs::write(&path, "tqdm>=4.66.0\n").unwrap();
        assert_eq!(Manifest::load(&path).unwrap().requirements().count(), 1);
    }

    #[test]
    fn test_read_keeps_every_line_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requirements.txt");
        std::fs::write(&path, "broken[\nrequests==2.31.0\nhttpx>=0.25\npkg;\n").unwrap();

        let errors = Manifest::read(&path).unwrap().unwrap_err();
        assert_eq!(errors.iter().map(|e| e.line).collect::<Vec<_>>(), vec![1, 4]);

        std::fs::write(&path, "requests==2.31.0\nhttpx>=0.25\n").unwrap();
        let manifest = Manifest::read(&path).unwrap().unwrap();
        let pinned: Vec<&str> = manifest.pinned().map(|req| req.name.as_str()).collect();
        assert_eq!(pinned, vec!["requests"]);

        let err = Manifest::read(&dir.path().join("missing.txt")).unwrap_err();
        assert!(err.to_string().contains("Storage error"));
    }
}
