//! Cross toolchain for freestanding (`os = "none"`) targets.
//!
//! Wraps the GNU variant with cross-prefixed tool defaults and two extra
//! rules: position-independent code is rejected (no dynamic loader exists
//! on these targets), and executables get a post-link `objcopy` step that
//! produces a flat binary image next to the ELF.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::builder::toolchain::{GnuToolchain, SupportVerdict, Toolchain};
use crate::core::language::Language;
use crate::core::machine::MachineDescriptor;
use crate::core::project::Project;
use crate::core::workspace::Workspace;
use crate::util::process::ProcessBuilder;

const CROSS_PREFIX: &str = "arm-none-eabi";

pub struct EmbeddedGnuToolchain {
    inner: GnuToolchain,
    objcopy: PathBuf,
    /// Target SDK include directory injected into every compile.
    sdk_include: Option<PathBuf>,
    /// Linker script injected into executable links.
    linker_script: Option<PathBuf>,
}

impl EmbeddedGnuToolchain {
    pub fn new(ws: &Workspace, project: &Project, target: &MachineDescriptor) -> Self {
        let default = match project.language {
            Language::Cxx => format!("{}-g++", CROSS_PREFIX),
            _ => format!("{}-gcc", CROSS_PREFIX),
        };
        let compiler = ws
            .config()
            .get_str(&["compilers", project.language.config_key()])
            .map(PathBuf::from)
            .unwrap_or_else(|| target.binary_path("gcc", &default));

        EmbeddedGnuToolchain {
            inner: GnuToolchain::with_tools(
                compiler,
                target.binary_path("ar", &format!("{}-ar", CROSS_PREFIX)),
                target,
            ),
            objcopy: target.binary_path("objcopy", &format!("{}-objcopy", CROSS_PREFIX)),
            sdk_include: ws
                .config()
                .get_str(&["embedded", "includeDir"])
                .map(PathBuf::from),
            linker_script: ws
                .config()
                .get_str(&["embedded", "linkerScript"])
                .map(PathBuf::from),
        }
    }
}

impl Toolchain for EmbeddedGnuToolchain {
    fn family(&self) -> &'static str {
        "embedded-gnu"
    }

    fn is_supported(&self) -> &SupportVerdict {
        self.inner.is_supported()
    }

    fn object_extension(&self) -> &'static str {
        "o"
    }

    fn validate(&self, project: &Project) -> Result<()> {
        if project.pic {
            bail!(
                "project `{}`: position-independent code is not supported on freestanding targets",
                project.name
            );
        }
        Ok(())
    }

    fn compile_command(
        &self,
        ws: &Workspace,
        project: &Project,
        source: &Path,
        output: &Path,
    ) -> ProcessBuilder {
        let mut cmd = self
            .inner
            .compile_command(ws, project, source, output)
            .arg("-ffreestanding")
            .arg("-nostdlib");
        if let Some(include) = &self.sdk_include {
            cmd = cmd.arg(format!("-I{}", include.display()));
        }
        cmd
    }

    fn link_command(
        &self,
        ws: &Workspace,
        project: &Project,
        objects: &[PathBuf],
        output: &Path,
    ) -> ProcessBuilder {
        let mut cmd = self.inner.link_command(ws, project, objects, output);
        if project.binary_type.is_executable() {
            cmd = cmd.arg("-nostdlib");
            if let Some(script) = &self.linker_script {
                cmd = cmd.arg("-T").arg(script);
            }
        }
        cmd
    }

    fn pch_command(&self, ws: &Workspace, project: &Project) -> Option<ProcessBuilder> {
        self.inner.pch_command(ws, project)
    }

    fn compiled_pch_location(&self, project: &Project) -> Option<PathBuf> {
        self.inner.compiled_pch_location(project)
    }

    fn postprocess_command(&self, project: &Project, output: &Path) -> Option<ProcessBuilder> {
        if !project.binary_type.is_executable() {
            return None;
        }
        let image = output.with_extension("bin");
        Some(
            ProcessBuilder::new(&self.objcopy)
                .arg("-O")
                .arg("binary")
                .arg(output)
                .arg(image),
        )
    }
}
