//! Module specifier resolution.
//!
//! Relative and absolute specifiers resolve against the importing file
//! with extension inference over the known source types. Bare specifiers
//! (package names) are not supported and resolve to an error; an optional
//! dependency downgrades that error to a dropped-with-warning diagnostic
//! at the call site.

use std::path::{Component, Path, PathBuf};

use fardel_graph::Dependency;

use crate::error::BuildError;

/// Extensions tried, in order, when a specifier names no file directly.
const INFERRED_EXTENSIONS: &[&str] = &["js", "json", "css"];

/// Resolves module specifiers to absolute file paths.
#[derive(Clone, Debug)]
pub struct Resolver {
    project_root: PathBuf,
}

impl Resolver {
    /// Creates a resolver rooted at the project directory.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    /// Resolves a dependency's specifier to an existing file.
    ///
    /// Entry dependencies resolve against the project root; everything
    /// else resolves against the importing file's directory. Bare
    /// specifiers and nonexistent files are resolution errors.
    pub fn resolve(&self, dep: &Dependency) -> Result<PathBuf, BuildError> {
        let specifier = dep.specifier.as_str();
        let base = match &dep.source_path {
            Some(source) => source
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.project_root.clone()),
            None => self.project_root.clone(),
        };

        let candidate = if Path::new(specifier).is_absolute() {
            PathBuf::from(specifier)
        } else if dep.is_entry || is_relative_specifier(specifier) {
            normalize(&base.join(specifier))
        } else {
            // Bare specifiers (package names) are out of scope.
            return Err(self.unresolved(dep));
        };

        if candidate.is_file() {
            return Ok(candidate);
        }
        for ext in INFERRED_EXTENSIONS {
            let with_ext = candidate.with_extension(ext);
            if with_ext.is_file() {
                return Ok(with_ext);
            }
        }

        Err(self.unresolved(dep))
    }

    fn unresolved(&self, dep: &Dependency) -> BuildError {
        BuildError::Resolution {
            specifier: dep.specifier.clone(),
            from: dep
                .source_path
                .clone()
                .unwrap_or_else(|| self.project_root.clone()),
        }
    }
}

/// Returns `true` for `./` and `../` specifiers.
fn is_relative_specifier(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

/// Collapses `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component.as_os_str());
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fardel_common::Environment;

    fn project() -> (tempfile::TempDir, Resolver) {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("src/lib")).unwrap();
        std::fs::write(tmp.path().join("src/index.js"), "").unwrap();
        std::fs::write(tmp.path().join("src/styles.css"), "").unwrap();
        std::fs::write(tmp.path().join("src/lib/util.js"), "").unwrap();
        let resolver = Resolver::new(tmp.path());
        (tmp, resolver)
    }

    fn dep_from(source: &Path, specifier: &str) -> Dependency {
        Dependency::new(specifier, source, Environment::browser())
    }

    #[test]
    fn relative_specifier_resolves() {
        let (tmp, resolver) = project();
        let dep = dep_from(&tmp.path().join("src/index.js"), "./styles.css");
        assert_eq!(
            resolver.resolve(&dep).unwrap(),
            tmp.path().join("src/styles.css")
        );
    }

    #[test]
    fn parent_specifier_resolves() {
        let (tmp, resolver) = project();
        let dep = dep_from(&tmp.path().join("src/lib/util.js"), "../index.js");
        assert_eq!(
            resolver.resolve(&dep).unwrap(),
            tmp.path().join("src/index.js")
        );
    }

    #[test]
    fn extension_is_inferred() {
        let (tmp, resolver) = project();
        let dep = dep_from(&tmp.path().join("src/index.js"), "./lib/util");
        assert_eq!(
            resolver.resolve(&dep).unwrap(),
            tmp.path().join("src/lib/util.js")
        );
    }

    #[test]
    fn entry_resolves_against_project_root() {
        let (tmp, resolver) = project();
        let dep = Dependency::entry("src/index.js", Environment::browser());
        assert_eq!(
            resolver.resolve(&dep).unwrap(),
            tmp.path().join("src/index.js")
        );
    }

    #[test]
    fn bare_specifier_is_an_error() {
        let (tmp, resolver) = project();
        let dep = dep_from(&tmp.path().join("src/index.js"), "react");
        let err = resolver.resolve(&dep).unwrap_err();
        assert!(matches!(
            err,
            BuildError::Resolution { specifier, .. } if specifier == "react"
        ));
    }

    #[test]
    fn missing_file_is_an_error() {
        let (tmp, resolver) = project();
        let dep = dep_from(&tmp.path().join("src/index.js"), "./nope");
        assert!(resolver.resolve(&dep).is_err());
    }
}
