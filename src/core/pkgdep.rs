//! Externally-resolved package dependencies.
//!
//! A [`PkgDep`] is the immutable value a package-query collaborator (a
//! pkg-config equivalent) hands back: libraries, search paths, defines,
//! include paths, and whether consumers need an rpath entry. The core only
//! consumes this shape; how it is produced is collaborator territory.

use std::path::PathBuf;

use semver::Version;
use thiserror::Error;

use crate::util::process::ProcessBuilder;

/// An externally-resolved package dependency. Has no owning project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PkgDep {
    /// Package name, for diagnostics.
    pub name: String,
    /// Library names to link (without platform prefix/suffix).
    pub libs: Vec<String>,
    /// Library search directories.
    pub lib_dirs: Vec<PathBuf>,
    /// Preprocessor defines contributed to consumers.
    pub defines: Vec<(String, Option<String>)>,
    /// Include search paths contributed to consumers.
    pub include_paths: Vec<PathBuf>,
    /// Whether consumers must embed an rpath entry pointing at `lib_dirs`.
    pub needs_rpath: bool,
}

/// Version constraint for a package query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    AtLeast(Version),
    AtMost(Version),
    Exactly(Version),
}

impl std::fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionConstraint::AtLeast(v) => write!(f, "{} or greater", v),
            VersionConstraint::AtMost(v) => write!(f, "{} or less", v),
            VersionConstraint::Exactly(v) => write!(f, "exactly {}", v),
        }
    }
}

/// Error raised by a package query.
#[derive(Debug, Error)]
pub enum PkgQueryError {
    #[error("required package `{name}` not found{}", constraint_suffix(.constraint))]
    RequiredMissing {
        name: String,
        constraint: Option<VersionConstraint>,
    },
    #[error("package query tool failed: {0}")]
    Tool(#[from] anyhow::Error),
}

fn constraint_suffix(constraint: &Option<VersionConstraint>) -> String {
    match constraint {
        Some(c) => format!(" (need version {})", c),
        None => String::new(),
    }
}

/// Narrow interface to the package-query collaborator.
pub trait PackageQuery {
    /// Query a package. `required` makes a missing package a fatal error;
    /// otherwise missing packages yield `Ok(None)`.
    fn query(
        &self,
        name: &str,
        required: bool,
        constraint: Option<VersionConstraint>,
    ) -> Result<Option<PkgDep>, PkgQueryError>;
}

/// pkg-config backed implementation of [`PackageQuery`].
#[derive(Debug, Clone)]
pub struct PkgConfig {
    program: PathBuf,
}

impl PkgConfig {
    pub fn new() -> Self {
        PkgConfig {
            program: PathBuf::from("pkg-config"),
        }
    }

    /// Use a specific pkg-config binary (e.g. a cross wrapper).
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        PkgConfig {
            program: program.into(),
        }
    }

    fn exists(&self, name: &str, constraint: Option<&VersionConstraint>) -> anyhow::Result<bool> {
        let mut cmd = ProcessBuilder::new(&self.program);
        cmd = match constraint {
            Some(VersionConstraint::AtLeast(v)) => {
                cmd.arg(format!("--atleast-version={}", v)).arg(name)
            }
            Some(VersionConstraint::AtMost(v)) => {
                cmd.arg(format!("--max-version={}", v)).arg(name)
            }
            Some(VersionConstraint::Exactly(v)) => {
                cmd.arg(format!("--exact-version={}", v)).arg(name)
            }
            None => cmd.arg("--exists").arg(name),
        };
        Ok(cmd.exec()?.success())
    }

    fn flags(&self, name: &str, flag: &str) -> anyhow::Result<Vec<String>> {
        let outcome = ProcessBuilder::new(&self.program)
            .arg(flag)
            .arg(name)
            .exec()?;
        if !outcome.success() {
            anyhow::bail!("pkg-config {} {} failed: {}", flag, name, outcome.stderr);
        }
        Ok(outcome
            .stdout
            .split_whitespace()
            .map(str::to_string)
            .collect())
    }
}

impl Default for PkgConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageQuery for PkgConfig {
    fn query(
        &self,
        name: &str,
        required: bool,
        constraint: Option<VersionConstraint>,
    ) -> Result<Option<PkgDep>, PkgQueryError> {
        if !self.exists(name, constraint.as_ref())? {
            if required {
                return Err(PkgQueryError::RequiredMissing {
                    name: name.to_string(),
                    constraint,
                });
            }
            tracing::debug!("optional package `{}` not found", name);
            return Ok(None);
        }

        let cflags = self.flags(name, "--cflags")?;
        let libflags = self.flags(name, "--libs")?;

        Ok(Some(parse_pkg_flags(name, &cflags, &libflags)))
    }
}

/// Build a PkgDep from pkg-config style cflags/libs output.
fn parse_pkg_flags(name: &str, cflags: &[String], libflags: &[String]) -> PkgDep {
    let mut dep = PkgDep {
        name: name.to_string(),
        ..PkgDep::default()
    };

    for flag in cflags {
        if let Some(path) = flag.strip_prefix("-I") {
            dep.include_paths.push(PathBuf::from(path));
        } else if let Some(def) = flag.strip_prefix("-D") {
            match def.split_once('=') {
                Some((k, v)) => dep.defines.push((k.to_string(), Some(v.to_string()))),
                None => dep.defines.push((def.to_string(), None)),
            }
        }
    }

    for flag in libflags {
        if let Some(lib) = flag.strip_prefix("-l") {
            dep.libs.push(lib.to_string());
        } else if let Some(dir) = flag.strip_prefix("-L") {
            // Non-system lib dirs need an rpath entry in consumers.
            let dir = PathBuf::from(dir);
            dep.needs_rpath = dep.needs_rpath || !is_system_lib_dir(&dir);
            dep.lib_dirs.push(dir);
        }
    }

    dep
}

fn is_system_lib_dir(dir: &std::path::Path) -> bool {
    matches!(
        dir.to_str(),
        Some("/lib" | "/usr/lib" | "/lib64" | "/usr/lib64" | "/usr/local/lib")
    )
}
