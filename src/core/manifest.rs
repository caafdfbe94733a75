//! Declarative project descriptions in `drydock.toml`.
//!
//! `drydock.toml` is both the workspace configuration layer and, through
//! its `[[project]]` tables, a declarative build description. The tables
//! are deserialized here and registered through the same narrow Workspace
//! API an external script collaborator would use.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::language::{Language, OptLevel};
use crate::core::project::{BinaryType, Visibility};
use crate::core::workspace::Workspace;
use crate::util::config::ConfigStore;
use crate::util::fs::glob_files;

/// One `[[project]]` table.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectDesc {
    pub name: String,
    #[serde(rename = "type")]
    pub binary_type: BinaryType,
    #[serde(default)]
    pub language: Language,
    /// Project directory relative to the workspace root.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Source file globs relative to the project directory.
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub include_paths: Vec<PathBuf>,
    #[serde(default)]
    pub private_include_paths: Vec<PathBuf>,
    /// `NAME` or `NAME=value` entries.
    #[serde(default)]
    pub defines: Vec<String>,
    #[serde(default)]
    pub libraries: Vec<String>,
    #[serde(default)]
    pub library_paths: Vec<PathBuf>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub pic: Option<bool>,
    #[serde(default)]
    pub emit_symbols: Option<bool>,
    #[serde(default)]
    pub static_stdlib: Option<bool>,
    #[serde(default)]
    pub generate_rpaths: Option<bool>,
    #[serde(default)]
    pub opt: Option<OptLevel>,
    #[serde(default)]
    pub standard: Option<String>,
    #[serde(default)]
    pub pch: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ManifestDoc {
    #[serde(default)]
    project: Vec<ProjectDesc>,
}

/// Load a workspace rooted at `root`: configuration layers first, then
/// every `[[project]]` table from `drydock.toml`.
pub fn load_workspace(root: &Path) -> Result<Workspace> {
    let mut config = ConfigStore::with_defaults();
    config.load_standard_layers(root)?;

    let mut ws = Workspace::new(root, config);

    let manifest_path = root.join("drydock.toml");
    if manifest_path.exists() {
        let contents = crate::util::fs::read_to_string(&manifest_path)?;
        let doc: ManifestDoc = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", manifest_path.display()))?;
        for desc in doc.project {
            register(&mut ws, desc)?;
        }
    }

    Ok(ws)
}

/// Register one described project through the workspace API.
pub fn register(ws: &mut Workspace, desc: ProjectDesc) -> Result<()> {
    let root = ws.root().to_path_buf();
    let dir = match &desc.dir {
        Some(d) => root.join(d),
        None => root.clone(),
    };

    let sources = glob_files(&dir, &desc.sources)?;

    let project = ws
        .create_project(&desc.name, desc.binary_type, desc.language, &dir)
        .with_context(|| format!("failed to register project `{}`", desc.name))?;

    for source in sources {
        // glob_files returns absolute paths; keep them as-is.
        project.sources.push(source);
    }
    for path in &desc.include_paths {
        project.add_include_path(path, Visibility::Public);
    }
    for path in &desc.private_include_paths {
        project.add_include_path(path, Visibility::Private);
    }
    for define in &desc.defines {
        match define.split_once('=') {
            Some((name, value)) => project.add_define(name, Some(value)),
            None => project.add_define(define, None),
        }
    }
    for lib in &desc.libraries {
        project.add_library(lib);
    }
    for path in &desc.library_paths {
        project.add_library_path(path);
    }
    for dep in &desc.dependencies {
        project.add_dependency(dep)?;
    }

    if let Some(pic) = desc.pic {
        project.pic = pic;
    }
    if let Some(v) = desc.emit_symbols {
        project.emit_symbols = v;
    }
    if let Some(v) = desc.static_stdlib {
        project.static_stdlib = v;
    }
    if let Some(v) = desc.generate_rpaths {
        project.generate_rpaths = v;
    }
    if let Some(opt) = desc.opt {
        project.opt_level = opt;
    }
    project.standard = desc.standard.clone();
    project.pch = desc.pch.clone();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_projects_from_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("app/src")).unwrap();
        fs::write(root.join("app/src/main.c"), "int main(){}").unwrap();
        fs::write(
            root.join("drydock.toml"),
            r#"
                [mt]
                maxThreads = 4

                [[project]]
                name = "core"
                type = "static_lib"
                dir = "core"
                defines = ["CORE_BUILD", "LIMIT=8"]

                [[project]]
                name = "app"
                type = "console_app"
                dir = "app"
                sources = ["src/*.c"]
                dependencies = ["core"]
                standard = "c11"
                opt = "speed"
            "#,
        )
        .unwrap();

        let ws = load_workspace(root).unwrap();
        assert_eq!(ws.projects().len(), 2);
        // The same file feeds the Workspace config layer.
        assert_eq!(ws.config().get_i64(&["mt", "maxThreads"]), Some(4));

        let app = ws.project("app").unwrap();
        assert_eq!(app.sources.len(), 1);
        assert_eq!(app.dependencies, vec!["core"]);
        assert_eq!(app.standard.as_deref(), Some("c11"));
        assert_eq!(app.opt_level, OptLevel::Speed);

        let core = ws.project("core").unwrap();
        assert_eq!(core.defines.get("LIMIT"), Some(&Some("8".to_string())));
        assert_eq!(core.defines.get("CORE_BUILD"), Some(&None));
    }

    #[test]
    fn test_missing_manifest_gives_empty_workspace() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = load_workspace(tmp.path()).unwrap();
        assert!(ws.projects().is_empty());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("drydock.toml"),
            r#"
                [[project]]
                name = "app"
                type = "console_app"
                srcs = ["*.c"]
            "#,
        )
        .unwrap();

        assert!(load_workspace(tmp.path()).is_err());
    }

    #[test]
    fn test_shared_obj_defaults_to_pic() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("drydock.toml"),
            r#"
                [[project]]
                name = "dyn"
                type = "shared_obj"
            "#,
        )
        .unwrap();

        let ws = load_workspace(tmp.path()).unwrap();
        assert!(ws.project("dyn").unwrap().pic);
    }
}
