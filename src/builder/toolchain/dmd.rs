//! D toolchain driven through the `dmd` flag vocabulary.
//!
//! D has no precompiled headers; the PCH hooks return `None` and the
//! orchestrator treats the whole phase as a no-op for D projects.

use std::path::{Path, PathBuf};

use crate::builder::toolchain::{resolve_compiler, Probe, SupportVerdict, Toolchain};
use crate::core::language::OptLevel;
use crate::core::machine::MachineDescriptor;
use crate::core::project::{BinaryType, Project};
use crate::core::workspace::Workspace;
use crate::util::process::ProcessBuilder;

pub struct DmdToolchain {
    compiler: PathBuf,
    target: MachineDescriptor,
    probe: Probe,
}

impl DmdToolchain {
    pub fn new(ws: &Workspace, project: &Project, target: &MachineDescriptor) -> Self {
        DmdToolchain {
            compiler: resolve_compiler(ws, project.language, target, "dmd"),
            target: target.clone(),
            probe: Probe::new(),
        }
    }
}

impl Toolchain for DmdToolchain {
    fn family(&self) -> &'static str {
        "dmd"
    }

    fn is_supported(&self) -> &SupportVerdict {
        self.probe.check_version(&self.compiler)
    }

    fn object_extension(&self) -> &'static str {
        "o"
    }

    fn compile_command(
        &self,
        ws: &Workspace,
        project: &Project,
        source: &Path,
        output: &Path,
    ) -> ProcessBuilder {
        let mut cmd = ProcessBuilder::new(&self.compiler)
            .args(self.target.compile_args(project.language));

        // Defines map onto version identifiers; D versions carry no value.
        for (name, _) in project.effective_defines(ws) {
            cmd = cmd.arg(format!("-version={}", name));
        }
        for (name, _) in self.target.defines(project.language) {
            cmd = cmd.arg(format!("-version={}", name));
        }
        for path in project.include_paths(ws) {
            cmd = cmd.arg(format!("-I{}", path.display()));
        }

        if project.opt_level != OptLevel::None {
            cmd = cmd.arg("-O");
        }
        if project.emit_symbols {
            cmd = cmd.arg("-g");
        }
        if project.pic {
            cmd = cmd.arg("-fPIC");
        }

        cmd.arg(format!("-makedeps={}", self.depfile_path(output).display()))
            .arg("-c")
            .arg(source)
            .arg(format!("-of={}", output.display()))
    }

    fn link_command(
        &self,
        ws: &Workspace,
        project: &Project,
        objects: &[PathBuf],
        output: &Path,
    ) -> ProcessBuilder {
        let mut cmd = ProcessBuilder::new(&self.compiler)
            .args(self.target.link_args(project.language))
            .args(objects);

        match project.binary_type {
            BinaryType::StaticLib => cmd = cmd.arg("-lib"),
            BinaryType::SharedObj => cmd = cmd.arg("-shared"),
            _ => {}
        }
        if project.emit_symbols {
            cmd = cmd.arg("-g");
        }

        // Linker pass-throughs use the -L prefix.
        for path in project.link_paths(ws) {
            cmd = cmd.arg(format!("-L-L{}", path.display()));
        }
        for lib in project.link_libraries(ws) {
            cmd = cmd.arg(format!("-L-l{}", lib));
        }
        for rpath in project.rpaths(ws, &project.output_dir) {
            cmd = cmd.arg(format!("-L-rpath=$ORIGIN/{}", rpath.display()));
        }

        cmd.arg(format!("-of={}", output.display()))
    }

    fn pch_command(&self, _ws: &Workspace, _project: &Project) -> Option<ProcessBuilder> {
        None
    }

    fn compiled_pch_location(&self, _project: &Project) -> Option<PathBuf> {
        None
    }
}
