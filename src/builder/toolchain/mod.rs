//! Toolchain abstraction for compilers, linkers and archivers.
//!
//! A [`Toolchain`] translates a project's abstract settings into concrete
//! tool invocations. Variants differ in flag vocabulary, archiving command,
//! link-mode flags, PCH quirks and target-specific injected flags; the
//! orchestrator only sees [`ProcessBuilder`] values and executes them.
//!
//! Support probing runs at most once per toolchain instance; the verdict is
//! cached for the process lifetime.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{anyhow, Result};

use crate::builder::depfile;
use crate::core::language::Language;
use crate::core::machine::MachineDescriptor;
use crate::core::project::Project;
use crate::core::workspace::Workspace;
use crate::util::process::{find_executable, ProcessBuilder};

mod dmd;
mod embedded;
mod gnu;

pub use dmd::DmdToolchain;
pub use embedded::EmbeddedGnuToolchain;
pub use gnu::GnuToolchain;

/// Cached result of probing a toolchain's underlying binary.
#[derive(Debug, Clone)]
pub struct SupportVerdict {
    pub supported: bool,
    /// Human-readable reason when unsupported.
    pub reason: String,
}

impl SupportVerdict {
    fn ok() -> Self {
        SupportVerdict {
            supported: true,
            reason: String::new(),
        }
    }

    fn missing(program: &Path) -> Self {
        SupportVerdict {
            supported: false,
            reason: format!("`{}` was not found on PATH", program.display()),
        }
    }
}

/// One-shot probe cache. Uninitialized until the first `is_supported` call,
/// then Probed(supported|unsupported) forever.
#[derive(Debug, Default)]
pub struct Probe {
    verdict: OnceLock<SupportVerdict>,
}

impl Probe {
    pub fn new() -> Self {
        Probe::default()
    }

    /// Probe by running `program --version`, caching the verdict.
    pub fn check_version(&self, program: &Path) -> &SupportVerdict {
        self.verdict.get_or_init(|| {
            if program.is_absolute() {
                if !program.exists() {
                    return SupportVerdict::missing(program);
                }
            } else if find_executable(&program.to_string_lossy()).is_none() {
                return SupportVerdict::missing(program);
            }

            match ProcessBuilder::new(program).arg("--version").exec() {
                Ok(outcome) if outcome.success() => {
                    let first = outcome.stdout.lines().next().unwrap_or_default();
                    tracing::debug!("probed `{}`: {}", program.display(), first);
                    SupportVerdict::ok()
                }
                Ok(outcome) => SupportVerdict {
                    supported: false,
                    reason: format!(
                        "`{} --version` exited with {:?}: {}",
                        program.display(),
                        outcome.code,
                        outcome.stderr.trim()
                    ),
                },
                Err(e) => SupportVerdict {
                    supported: false,
                    reason: format!("failed to run `{}`: {:#}", program.display(), e),
                },
            }
        })
    }
}

/// Translates project settings into tool invocations for one family.
pub trait Toolchain: Send + Sync {
    /// Family name for logs and diagnostics ("gnu", "dmd", "embedded-gnu").
    fn family(&self) -> &'static str;

    /// Probe the underlying tool once and cache the verdict.
    fn is_supported(&self) -> &SupportVerdict;

    /// Object file extension ("o").
    fn object_extension(&self) -> &'static str;

    /// Validate project settings against target-specific rules.
    fn validate(&self, _project: &Project) -> Result<()> {
        Ok(())
    }

    /// Command compiling one source file to an object file.
    fn compile_command(
        &self,
        ws: &Workspace,
        project: &Project,
        source: &Path,
        output: &Path,
    ) -> ProcessBuilder;

    /// Command linking (or archiving) the project from its object files.
    fn link_command(
        &self,
        ws: &Workspace,
        project: &Project,
        objects: &[PathBuf],
        output: &Path,
    ) -> ProcessBuilder;

    /// Command compiling the project's precompiled header, or `None` when
    /// the family has no PCH support (then PCH handling is a no-op).
    fn pch_command(&self, ws: &Workspace, project: &Project) -> Option<ProcessBuilder>;

    /// Where the compiled PCH lands for this project, if the family
    /// supports PCH and the project declares one.
    fn compiled_pch_location(&self, project: &Project) -> Option<PathBuf>;

    /// Sidecar dependency-file path for an object.
    fn depfile_path(&self, object: &Path) -> PathBuf {
        PathBuf::from(format!("{}.d", object.display()))
    }

    /// Dependency listing for an object. `None` means the sidecar file is
    /// unavailable; callers fall back to timestamp-only staleness checks.
    fn dependencies(&self, _project: &Project, object: &Path) -> Option<Vec<PathBuf>> {
        depfile::load(&self.depfile_path(object))
    }

    /// Optional post-link step (e.g. flat binary image for embedded).
    fn postprocess_command(&self, _project: &Project, _output: &Path) -> Option<ProcessBuilder> {
        None
    }
}

/// Select the toolchain for a project on the given target machine.
///
/// Precedence for the compiler binary: `compilers.<language>` config key,
/// then the machine's binary override, then the family default.
pub fn toolchain_for(
    ws: &Workspace,
    project: &Project,
    target: &MachineDescriptor,
) -> Result<Box<dyn Toolchain>> {
    // Freestanding targets get the embedded variant regardless of language.
    if target.os == "none" {
        if project.language == Language::D {
            return Err(anyhow!(
                "project `{}`: D is not supported on freestanding target {}",
                project.name,
                target
            ));
        }
        return Ok(Box::new(EmbeddedGnuToolchain::new(ws, project, target)));
    }

    match project.language {
        Language::C | Language::Cxx => Ok(Box::new(GnuToolchain::new(ws, project, target))),
        Language::D => Ok(Box::new(DmdToolchain::new(ws, project, target))),
    }
}

/// Resolve the compiler binary for a language, honoring config and machine
/// overrides.
pub(crate) fn resolve_compiler(
    ws: &Workspace,
    language: Language,
    target: &MachineDescriptor,
    default: &str,
) -> PathBuf {
    if let Some(configured) = ws.config().get_str(&["compilers", language.config_key()]) {
        return PathBuf::from(configured);
    }
    target.binary_path(default, default)
}
