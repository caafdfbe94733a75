//! The project entity.
//!
//! A [`Project`] describes one compilation unit group: an executable, shared
//! library or static archive, its sources, visibility-scoped include paths,
//! defines, link inputs and dependencies on other projects. Projects are
//! created during build-script evaluation and registered into a
//! [`Workspace`](crate::core::workspace::Workspace); the orchestrator reads
//! them at build time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::language::{Language, OptLevel};
use crate::core::machine::Affixes;
use crate::core::pkgdep::PkgDep;
use crate::core::workspace::Workspace;
use crate::util::config::ConfigStore;
use crate::util::fs::relative_path;

/// What a project produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryType {
    /// Console executable
    ConsoleApp,
    /// GUI executable (no console on Windows)
    WindowsApp,
    /// Shared library
    SharedObj,
    /// Static archive
    StaticLib,
}

impl BinaryType {
    /// Whether this type produces an executable.
    pub fn is_executable(&self) -> bool {
        matches!(self, BinaryType::ConsoleApp | BinaryType::WindowsApp)
    }
}

/// Include path visibility. Public paths propagate to dependents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

/// Error constructing a project.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("project `{0}`: output directory resolved to an empty path")]
    EmptyOutputDir(String),
    #[error("project `{0}`: intermediate directory resolved to an empty path")]
    EmptyIntermediateDir(String),
    #[error("project `{0}`: dependency name must not be empty")]
    EmptyDependency(String),
}

/// One compilation unit group.
#[derive(Debug, Clone)]
pub struct Project {
    /// Project name. Unique within a workspace (enforced at registration).
    pub name: String,
    /// Base path for relative resolution.
    pub directory: PathBuf,
    pub binary_type: BinaryType,
    pub language: Language,
    /// Where the linked output lands. Never empty after construction.
    pub output_dir: PathBuf,
    /// Where object files land. Never empty after construction.
    pub intermediate_dir: PathBuf,
    /// Ordered source files.
    pub sources: Vec<PathBuf>,
    /// Include paths visible to dependents.
    pub public_include_paths: Vec<PathBuf>,
    /// Include paths used only when compiling this project.
    pub private_include_paths: Vec<PathBuf>,
    /// Preprocessor defines.
    pub defines: BTreeMap<String, Option<String>>,
    pub library_paths: Vec<PathBuf>,
    /// Direct link library names.
    pub libraries: Vec<String>,
    /// Externally-resolved package dependencies.
    pub pkg_deps: Vec<PkgDep>,
    /// Names of projects this one depends on.
    pub dependencies: Vec<String>,
    pub pic: bool,
    pub emit_symbols: bool,
    pub static_stdlib: bool,
    pub generate_rpaths: bool,
    pub opt_level: OptLevel,
    /// Language standard, e.g. "c11" or "c++20".
    pub standard: Option<String>,
    /// Precompiled header, relative to the project directory.
    pub pch: Option<PathBuf>,
}

impl Project {
    /// Construct a project without registering it anywhere.
    ///
    /// Output and intermediate directories are template-expanded from the
    /// config keys `paths.output` / `paths.int`; an empty expansion is a
    /// fatal configuration error.
    pub fn new(
        name: &str,
        binary_type: BinaryType,
        language: Language,
        directory: &Path,
        config: &ConfigStore,
        workspace_root: &Path,
    ) -> Result<Self, ProjectError> {
        let output_dir = expand_dir_template(
            config.get_str(&["paths", "output"]).unwrap_or_default(),
            directory,
            workspace_root,
            name,
        );
        if output_dir.as_os_str().is_empty() {
            return Err(ProjectError::EmptyOutputDir(name.to_string()));
        }

        let intermediate_dir = expand_dir_template(
            config.get_str(&["paths", "int"]).unwrap_or_default(),
            directory,
            workspace_root,
            name,
        );
        if intermediate_dir.as_os_str().is_empty() {
            return Err(ProjectError::EmptyIntermediateDir(name.to_string()));
        }

        Ok(Project {
            name: name.to_string(),
            directory: directory.to_path_buf(),
            binary_type,
            language,
            output_dir,
            intermediate_dir,
            sources: Vec::new(),
            public_include_paths: Vec::new(),
            private_include_paths: Vec::new(),
            defines: BTreeMap::new(),
            library_paths: Vec::new(),
            libraries: Vec::new(),
            pkg_deps: Vec::new(),
            dependencies: Vec::new(),
            pic: binary_type == BinaryType::SharedObj,
            emit_symbols: false,
            static_stdlib: false,
            generate_rpaths: true,
            opt_level: OptLevel::None,
            standard: None,
            pch: None,
        })
    }

    /// Add a source file, resolved against the project directory.
    pub fn add_source(&mut self, source: impl AsRef<Path>) {
        self.sources.push(self.directory.join(source.as_ref()));
    }

    /// Add an include path with the given visibility.
    pub fn add_include_path(&mut self, path: impl AsRef<Path>, visibility: Visibility) {
        let path = self.directory.join(path.as_ref());
        match visibility {
            Visibility::Public => self.public_include_paths.push(path),
            Visibility::Private => self.private_include_paths.push(path),
        }
    }

    /// Add a preprocessor define.
    pub fn add_define(&mut self, name: &str, value: Option<&str>) {
        self.defines
            .insert(name.to_string(), value.map(str::to_string));
    }

    /// Add a library to link.
    pub fn add_library(&mut self, name: &str) {
        self.libraries.push(name.to_string());
    }

    /// Add a library search path.
    pub fn add_library_path(&mut self, path: impl AsRef<Path>) {
        self.library_paths.push(self.directory.join(path.as_ref()));
    }

    /// Attach an externally-resolved package dependency.
    pub fn add_pkg_dep(&mut self, dep: PkgDep) {
        self.pkg_deps.push(dep);
    }

    /// Add a dependency on another project. Idempotent; rejects empty names.
    pub fn add_dependency(&mut self, other: &str) -> Result<(), ProjectError> {
        if other.is_empty() {
            return Err(ProjectError::EmptyDependency(self.name.clone()));
        }
        if !self.dependencies.iter().any(|d| d == other) {
            self.dependencies.push(other.to_string());
        }
        Ok(())
    }

    /// Filename of the linked output for the given machine affixes.
    pub fn output_filename(&self, affixes: &Affixes) -> String {
        match self.binary_type {
            BinaryType::ConsoleApp | BinaryType::WindowsApp => {
                format!("{}{}{}", affixes.exe_prefix, self.name, affixes.exe_suffix)
            }
            BinaryType::SharedObj => format!(
                "{}{}{}",
                affixes.shared_prefix, self.name, affixes.shared_suffix
            ),
            BinaryType::StaticLib => format!(
                "{}{}{}",
                affixes.static_prefix, self.name, affixes.static_suffix
            ),
        }
    }

    /// Full path of the linked output.
    pub fn output_path(&self, affixes: &Affixes) -> PathBuf {
        self.output_dir.join(self.output_filename(affixes))
    }

    /// All include paths for compiling this project: own public and private
    /// paths, package-dep includes, and the *public* include paths of direct
    /// dependencies (one level of transitivity).
    pub fn include_paths(&self, ws: &Workspace) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        paths.extend(self.public_include_paths.iter().cloned());
        paths.extend(self.private_include_paths.iter().cloned());

        for pkg in &self.pkg_deps {
            paths.extend(pkg.include_paths.iter().cloned());
        }

        for dep in self.resolved_deps(ws) {
            paths.extend(dep.public_include_paths.iter().cloned());
            for pkg in &dep.pkg_deps {
                paths.extend(pkg.include_paths.iter().cloned());
            }
        }

        dedup_paths(paths)
    }

    /// All library search paths: own, package deps, dependency output
    /// directories. A StaticLib dependency forwards its entire set as well,
    /// because a static archive carries no runtime link information of its
    /// own; its consumers must re-link everything it would have linked.
    pub fn link_paths(&self, ws: &Workspace) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        paths.extend(self.library_paths.iter().cloned());

        for pkg in &self.pkg_deps {
            paths.extend(pkg.lib_dirs.iter().cloned());
        }

        for dep in self.resolved_deps(ws) {
            paths.push(dep.output_dir.clone());
            if dep.binary_type == BinaryType::StaticLib {
                paths.extend(dep.link_paths(ws));
            }
        }

        dedup_paths(paths)
    }

    /// All library names to link, with the same StaticLib forwarding rule
    /// as [`Project::link_paths`].
    pub fn link_libraries(&self, ws: &Workspace) -> Vec<String> {
        let mut libs = Vec::new();
        libs.extend(self.libraries.iter().cloned());

        for pkg in &self.pkg_deps {
            libs.extend(pkg.libs.iter().cloned());
        }

        for dep in self.resolved_deps(ws) {
            libs.push(dep.name.clone());
            if dep.binary_type == BinaryType::StaticLib {
                libs.extend(dep.link_libraries(ws));
            }
        }

        let mut seen = std::collections::HashSet::new();
        libs.retain(|l| seen.insert(l.clone()));
        libs
    }

    /// All effective defines: own plus package-dep contributions.
    pub fn effective_defines(&self, _ws: &Workspace) -> Vec<(String, Option<String>)> {
        let mut defines: Vec<(String, Option<String>)> = self
            .defines
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        for pkg in &self.pkg_deps {
            for (k, v) in &pkg.defines {
                if !defines.iter().any(|(name, _)| name == k) {
                    defines.push((k.clone(), v.clone()));
                }
            }
        }

        defines
    }

    /// Runtime search paths to embed in the output, relative to
    /// `output_dir`: one per package dep that needs an rpath and one per
    /// SharedObj dependency. Empty when rpath generation is disabled.
    pub fn rpaths(&self, ws: &Workspace, output_dir: &Path) -> Vec<PathBuf> {
        if !self.generate_rpaths {
            return Vec::new();
        }

        let mut rpaths = Vec::new();

        for pkg in &self.pkg_deps {
            if pkg.needs_rpath {
                for dir in &pkg.lib_dirs {
                    rpaths.push(relative_path(output_dir, dir));
                }
            }
        }

        for dep in self.resolved_deps(ws) {
            if dep.binary_type == BinaryType::SharedObj {
                rpaths.push(relative_path(output_dir, &dep.output_dir));
            }
        }

        dedup_paths(rpaths)
    }

    /// Absolute path of the PCH header, if one is configured.
    pub fn pch_header(&self) -> Option<PathBuf> {
        self.pch.as_ref().map(|p| self.directory.join(p))
    }

    fn resolved_deps<'a>(&'a self, ws: &'a Workspace) -> impl Iterator<Item = &'a Project> {
        self.dependencies.iter().filter_map(|name| ws.project(name))
    }
}

/// Expand `$PROJECT_DIR`, `$WORKSPACE_DIR` and `$PROJECT_NAME` tokens in a
/// directory template from the config store.
fn expand_dir_template(
    template: &str,
    project_dir: &Path,
    workspace_root: &Path,
    project_name: &str,
) -> PathBuf {
    let expanded = template
        .replace("$PROJECT_DIR", &project_dir.to_string_lossy())
        .replace("$WORKSPACE_DIR", &workspace_root.to_string_lossy())
        .replace("$PROJECT_NAME", project_name);
    PathBuf::from(expanded)
}

fn dedup_paths(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = std::collections::HashSet::new();
    paths.into_iter().filter(|p| seen.insert(p.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::workspace::Workspace;

    fn test_workspace() -> Workspace {
        Workspace::new(Path::new("/ws"), ConfigStore::with_defaults())
    }

    fn add_project(ws: &mut Workspace, name: &str, ty: BinaryType) {
        ws.create_project(name, ty, Language::C, Path::new("/ws").join(name).as_path())
            .unwrap();
    }

    #[test]
    fn test_dir_template_expansion() {
        let expanded = expand_dir_template(
            "$WORKSPACE_DIR/out/$PROJECT_NAME",
            Path::new("/ws/app"),
            Path::new("/ws"),
            "app",
        );
        assert_eq!(expanded, PathBuf::from("/ws/out/app"));
    }

    #[test]
    fn test_empty_output_dir_is_fatal() {
        let mut config = ConfigStore::with_defaults();
        config.set_layer(
            crate::util::config::Layer::Workspace,
            r#"paths = { output = "" }"#.parse().unwrap(),
        );

        let result = Project::new(
            "app",
            BinaryType::ConsoleApp,
            Language::C,
            Path::new("/ws/app"),
            &config,
            Path::new("/ws"),
        );
        assert!(matches!(result, Err(ProjectError::EmptyOutputDir(_))));
    }

    #[test]
    fn test_add_dependency_idempotent() {
        let mut ws = test_workspace();
        add_project(&mut ws, "app", BinaryType::ConsoleApp);

        let app = ws.project_mut("app").unwrap();
        app.add_dependency("libfoo").unwrap();
        app.add_dependency("libfoo").unwrap();
        assert_eq!(app.dependencies, vec!["libfoo"]);

        assert!(app.add_dependency("").is_err());
    }

    #[test]
    fn test_output_filename_affixes() {
        let ws = {
            let mut ws = test_workspace();
            add_project(&mut ws, "foo", BinaryType::SharedObj);
            ws
        };
        let foo = ws.project("foo").unwrap();

        assert_eq!(foo.output_filename(&Affixes::unix()), "libfoo.so");
        assert_eq!(foo.output_filename(&Affixes::windows()), "foo.dll");
    }

    #[test]
    fn test_public_includes_propagate_private_do_not() {
        let mut ws = test_workspace();
        add_project(&mut ws, "lib", BinaryType::StaticLib);
        add_project(&mut ws, "app", BinaryType::ConsoleApp);

        {
            let lib = ws.project_mut("lib").unwrap();
            lib.add_include_path("include", Visibility::Public);
            lib.add_include_path("src", Visibility::Private);
        }
        {
            let app = ws.project_mut("app").unwrap();
            app.add_dependency("lib").unwrap();
        }

        let app = ws.project("app").unwrap();
        let includes = app.include_paths(&ws);
        assert!(includes.contains(&PathBuf::from("/ws/lib/include")));
        assert!(!includes.contains(&PathBuf::from("/ws/lib/src")));
    }

    #[test]
    fn test_static_lib_forwards_full_link_set() {
        let mut ws = test_workspace();
        add_project(&mut ws, "base", BinaryType::StaticLib);
        add_project(&mut ws, "mid", BinaryType::StaticLib);
        add_project(&mut ws, "app", BinaryType::ConsoleApp);

        {
            let base = ws.project_mut("base").unwrap();
            base.add_library("m");
            base.add_library_path("vendor/lib");
        }
        {
            let mid = ws.project_mut("mid").unwrap();
            mid.add_dependency("base").unwrap();
        }
        {
            let app = ws.project_mut("app").unwrap();
            app.add_dependency("mid").unwrap();
        }

        // app links mid, and because mid is a static lib it re-links
        // everything mid would have linked, transitively through base.
        let app = ws.project("app").unwrap();
        let libs = app.link_libraries(&ws);
        assert!(libs.contains(&"mid".to_string()));
        assert!(libs.contains(&"base".to_string()));
        assert!(libs.contains(&"m".to_string()));

        let paths = app.link_paths(&ws);
        assert!(paths.contains(&PathBuf::from("/ws/base/vendor/lib")));
    }

    #[test]
    fn test_shared_lib_does_not_forward() {
        let mut ws = test_workspace();
        add_project(&mut ws, "base", BinaryType::StaticLib);
        add_project(&mut ws, "mid", BinaryType::SharedObj);
        add_project(&mut ws, "app", BinaryType::ConsoleApp);

        {
            let base = ws.project_mut("base").unwrap();
            base.add_library("m");
        }
        {
            let mid = ws.project_mut("mid").unwrap();
            mid.add_dependency("base").unwrap();
        }
        {
            let app = ws.project_mut("app").unwrap();
            app.add_dependency("mid").unwrap();
        }

        // mid is a shared object; its own link inputs stay with it.
        let app = ws.project("app").unwrap();
        let libs = app.link_libraries(&ws);
        assert!(libs.contains(&"mid".to_string()));
        assert!(!libs.contains(&"m".to_string()));
    }

    #[test]
    fn test_rpaths_disabled() {
        let mut ws = test_workspace();
        add_project(&mut ws, "app", BinaryType::ConsoleApp);

        {
            let app = ws.project_mut("app").unwrap();
            app.generate_rpaths = false;
            app.add_pkg_dep(PkgDep {
                name: "foo".to_string(),
                lib_dirs: vec![PathBuf::from("/opt/foo/lib")],
                needs_rpath: true,
                ..PkgDep::default()
            });
        }

        let app = ws.project("app").unwrap();
        assert!(app.rpaths(&ws, Path::new("/ws/out/app")).is_empty());
    }

    #[test]
    fn test_rpaths_relative_to_output() {
        let mut ws = test_workspace();
        add_project(&mut ws, "dyn", BinaryType::SharedObj);
        add_project(&mut ws, "app", BinaryType::ConsoleApp);

        {
            let app = ws.project_mut("app").unwrap();
            app.add_dependency("dyn").unwrap();
        }

        let app = ws.project("app").unwrap();
        let out_dir = app.output_dir.clone();
        let rpaths = app.rpaths(&ws, &out_dir);
        assert_eq!(rpaths.len(), 1);
        // Default config puts outputs under a shared parent; the rpath is
        // expressed relative to the consumer's output directory.
        assert_eq!(rpaths[0], PathBuf::from("../dyn"));
    }
}
