//! GNU-flavoured C/C++ toolchain (`cc`, `c++`, gcc, clang).

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::builder::toolchain::{resolve_compiler, Probe, SupportVerdict, Toolchain};
use crate::core::language::Language;
use crate::core::machine::MachineDescriptor;
use crate::core::project::{BinaryType, Project};
use crate::core::workspace::Workspace;
use crate::util::process::ProcessBuilder;

/// Driver for the GNU compiler-driver flag vocabulary.
///
/// One instance per (project, target) pair; the support probe result is
/// cached on the instance.
pub struct GnuToolchain {
    compiler: PathBuf,
    archiver: PathBuf,
    target: MachineDescriptor,
    probe: Probe,
}

impl GnuToolchain {
    pub fn new(ws: &Workspace, project: &Project, target: &MachineDescriptor) -> Self {
        let default = match project.language {
            Language::Cxx => "c++",
            _ => "cc",
        };
        let compiler = resolve_compiler(ws, project.language, target, default);
        GnuToolchain::with_tools(compiler, target.binary_path("ar", "ar"), target)
    }

    /// Construct with explicit tool paths. Used by the embedded variant,
    /// which carries its own cross-prefixed defaults.
    pub(crate) fn with_tools(
        compiler: PathBuf,
        archiver: PathBuf,
        target: &MachineDescriptor,
    ) -> Self {
        GnuToolchain {
            compiler,
            archiver,
            target: target.clone(),
            probe: Probe::new(),
        }
    }

    fn define_flags(&self, ws: &Workspace, project: &Project) -> Vec<String> {
        let mut flags = Vec::new();
        for (name, value) in project.effective_defines(ws) {
            flags.push(match value {
                Some(v) => format!("-D{}={}", name, v),
                None => format!("-D{}", name),
            });
        }
        for (name, value) in self.target.defines(project.language) {
            flags.push(match value {
                Some(v) => format!("-D{}={}", name, v),
                None => format!("-D{}", name),
            });
        }
        flags
    }

    fn common_compile_flags(&self, ws: &Workspace, project: &Project) -> Vec<String> {
        let mut flags: Vec<String> = self
            .target
            .compile_args(project.language)
            .iter()
            .cloned()
            .collect();

        if let Some(std) = &project.standard {
            flags.push(format!("-std={}", std));
        }
        flags.push(project.opt_level.as_gnu_flag().to_string());
        if project.emit_symbols {
            flags.push("-g".to_string());
        }
        if project.pic {
            flags.push("-fPIC".to_string());
        }

        flags.extend(self.define_flags(ws, project));

        // PCH lives in the intermediate directory; make it the first place
        // the preprocessor looks.
        if project.pch.is_some() {
            flags.push(format!("-I{}", project.intermediate_dir.display()));
        }
        for path in project.include_paths(ws) {
            flags.push(format!("-I{}", path.display()));
        }

        flags
    }
}

impl Toolchain for GnuToolchain {
    fn family(&self) -> &'static str {
        "gnu"
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
            .args(self.common_compile_flags(ws, project));

        if let Some(pch) = &project.pch {
            if let Some(name) = pch.file_name() {
                cmd = cmd.arg("-include").arg(name);
            }
        }

        cmd.arg("-MMD")
            .arg("-MF")
            .arg(self.depfile_path(output))
            .arg("-c")
            .arg(source)
            .arg("-o")
            .arg(output)
    }

    fn link_command(
        &self,
        ws: &Workspace,
        project: &Project,
        objects: &[PathBuf],
        output: &Path,
    ) -> ProcessBuilder {
        if project.binary_type == BinaryType::StaticLib {
            return ProcessBuilder::new(&self.archiver)
                .arg("rcs")
                .arg(output)
                .args(objects);
        }

        let mut cmd = ProcessBuilder::new(&self.compiler)
            .args(self.target.link_args(project.language))
            .args(objects)
            .arg("-o")
            .arg(output);

        match project.binary_type {
            BinaryType::SharedObj => cmd = cmd.arg("-shared"),
            BinaryType::WindowsApp if self.target.os == "windows" => {
                cmd = cmd.arg("-mwindows");
            }
            _ => {}
        }

        if project.emit_symbols {
            cmd = cmd.arg("-g");
        }
        if project.static_stdlib {
            if project.language == Language::Cxx {
                cmd = cmd.arg("-static-libstdc++");
            }
            cmd = cmd.arg("-static-libgcc");
        }

        for path in project.link_paths(ws) {
            cmd = cmd.arg(format!("-L{}", path.display()));
        }
        for lib in project.link_libraries(ws) {
            cmd = cmd.arg(format!("-l{}", lib));
        }
        for rpath in project.rpaths(ws, &project.output_dir) {
            cmd = cmd.arg(format!("-Wl,-rpath,$ORIGIN/{}", rpath.display()));
        }

        cmd
    }

    fn pch_command(&self, ws: &Workspace, project: &Project) -> Option<ProcessBuilder> {
        let header = project.pch_header()?;
        let compiled = self.compiled_pch_location(project)?;

        let kind = match project.language {
            Language::Cxx => "c++-header",
            _ => "c-header",
        };

        // The PCH gets a sidecar of its own, so headers it includes are
        // seen by the staleness checks just like object dependencies.
        Some(
            ProcessBuilder::new(&self.compiler)
                .args(self.common_compile_flags(ws, project))
                .arg("-x")
                .arg(kind)
                .arg("-MMD")
                .arg("-MF")
                .arg(self.depfile_path(&compiled))
                .arg(&header)
                .arg("-o")
                .arg(compiled),
        )
    }

    fn compiled_pch_location(&self, project: &Project) -> Option<PathBuf> {
        let name = project.pch.as_ref()?.file_name()?;
        let mut compiled = project.intermediate_dir.join(name);
        let ext = match compiled.extension() {
            Some(e) => format!("{}.gch", e.to_string_lossy()),
            None => "gch".to_string(),
        };
        compiled.set_extension(ext);
        Some(compiled)
    }

    fn validate(&self, _project: &Project) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::language::OptLevel;
    use crate::core::project::Visibility;
    use crate::util::config::ConfigStore;

    fn workspace() -> Workspace {
        Workspace::new(Path::new("/ws"), ConfigStore::with_defaults())
    }

    fn target() -> MachineDescriptor {
        MachineDescriptor::new(
            "linux",
            "x86_64",
            "unknown",
            "gnu",
            "unknown",
            crate::core::machine::Affixes::unix(),
        )
    }

    #[test]
    fn test_compile_command_shape() {
        let mut ws = workspace();
        ws.create_project("app", BinaryType::ConsoleApp, Language::Cxx, Path::new("/ws/app"))
            .unwrap();
        {
            let app = ws.project_mut("app").unwrap();
            app.standard = Some("c++20".to_string());
            app.opt_level = OptLevel::Speed;
            app.emit_symbols = true;
            app.add_define("VERBOSE", None);
            app.add_define("LIMIT", Some("32"));
            app.add_include_path("include", Visibility::Private);
        }

        let target = target();
        let app = ws.project("app").unwrap();
        let tc = GnuToolchain::new(&ws, app, &target);

        let cmd = tc.compile_command(
            &ws,
            app,
            Path::new("/ws/app/main.cpp"),
            Path::new("/int/app/main.o"),
        );
        let args = cmd.get_args();

        assert_eq!(cmd.get_program(), Path::new("c++"));
        assert!(args.contains(&"-std=c++20".to_string()));
        assert!(args.contains(&"-O3".to_string()));
        assert!(args.contains(&"-g".to_string()));
        assert!(args.contains(&"-DVERBOSE".to_string()));
        assert!(args.contains(&"-DLIMIT=32".to_string()));
        assert!(args.contains(&"-I/ws/app/include".to_string()));
        assert!(args.contains(&"-MMD".to_string()));
        assert!(args.contains(&"/int/app/main.o.d".to_string()));
        // Not a shared object: no PIC.
        assert!(!args.contains(&"-fPIC".to_string()));
    }

    #[test]
    fn test_shared_obj_gets_pic_and_shared() {
        let mut ws = workspace();
        ws.create_project("dyn", BinaryType::SharedObj, Language::C, Path::new("/ws/dyn"))
            .unwrap();
        let target = target();
        let dyn_p = ws.project("dyn").unwrap();
        let tc = GnuToolchain::new(&ws, dyn_p, &target);

        let compile = tc.compile_command(&ws, dyn_p, Path::new("a.c"), Path::new("a.o"));
        assert!(compile.get_args().contains(&"-fPIC".to_string()));

        let link = tc.link_command(&ws, dyn_p, &[PathBuf::from("a.o")], Path::new("libdyn.so"));
        assert!(link.get_args().contains(&"-shared".to_string()));
    }

    #[test]
    fn test_static_lib_uses_archiver() {
        let mut ws = workspace();
        ws.create_project("core", BinaryType::StaticLib, Language::C, Path::new("/ws/core"))
            .unwrap();
        let target = target();
        let core = ws.project("core").unwrap();
        let tc = GnuToolchain::new(&ws, core, &target);

        let link = tc.link_command(
            &ws,
            core,
            &[PathBuf::from("a.o"), PathBuf::from("b.o")],
            Path::new("libcore.a"),
        );
        assert_eq!(link.get_program(), Path::new("ar"));
        assert_eq!(
            link.get_args(),
            &["rcs", "libcore.a", "a.o", "b.o"]
        );
    }

    #[test]
    fn test_link_carries_libs_paths_and_rpaths() {
        let mut ws = workspace();
        ws.create_project("dyn", BinaryType::SharedObj, Language::C, Path::new("/ws/dyn"))
            .unwrap();
        ws.create_project("app", BinaryType::ConsoleApp, Language::C, Path::new("/ws/app"))
            .unwrap();
        {
            let app = ws.project_mut("app").unwrap();
            app.add_library("m");
            app.add_dependency("dyn").unwrap();
        }

        let target = target();
        let app = ws.project("app").unwrap();
        let tc = GnuToolchain::new(&ws, app, &target);
        let link = tc.link_command(&ws, app, &[PathBuf::from("main.o")], Path::new("app"));
        let args = link.get_args();

        assert!(args.contains(&"-lm".to_string()));
        assert!(args.contains(&"-ldyn".to_string()));
        assert!(args.iter().any(|a| a.starts_with("-L") && a.contains("dyn")));
        assert!(args.iter().any(|a| a.starts_with("-Wl,-rpath,$ORIGIN/")));
    }

    #[test]
    fn test_pch_command_and_location() {
        let mut ws = workspace();
        ws.create_project("app", BinaryType::ConsoleApp, Language::Cxx, Path::new("/ws/app"))
            .unwrap();
        ws.project_mut("app").unwrap().pch = Some(PathBuf::from("src/pch.h"));

        let target = target();
        let app = ws.project("app").unwrap();
        let tc = GnuToolchain::new(&ws, app, &target);

        let compiled = tc.compiled_pch_location(app).unwrap();
        assert_eq!(compiled.file_name().unwrap(), "pch.h.gch");
        assert!(compiled.starts_with(&app.intermediate_dir));

        let cmd = tc.pch_command(&ws, app).unwrap();
        let args = cmd.get_args();
        assert!(args.contains(&"-x".to_string()));
        assert!(args.contains(&"c++-header".to_string()));
        assert!(args.contains(&"/ws/app/src/pch.h".to_string()));

        // The PCH compile writes its own dependency sidecar.
        assert!(args.contains(&"-MMD".to_string()));
        let dep = tc.depfile_path(&compiled);
        assert!(args.contains(&dep.display().to_string()));
    }

    #[test]
    fn test_config_compiler_override() {
        let mut config = ConfigStore::with_defaults();
        config.set_layer(
            crate::util::config::Layer::Workspace,
            r#"compilers = { c = "clang-18" }"#.parse().unwrap(),
        );
        let mut ws = Workspace::new(Path::new("/ws"), config);
        ws.create_project("app", BinaryType::ConsoleApp, Language::C, Path::new("/ws/app"))
            .unwrap();

        let target = target();
        let app = ws.project("app").unwrap();
        let tc = GnuToolchain::new(&ws, app, &target);
        let cmd = tc.compile_command(&ws, app, Path::new("a.c"), Path::new("a.o"));
        assert_eq!(cmd.get_program(), Path::new("clang-18"));
    }
}
