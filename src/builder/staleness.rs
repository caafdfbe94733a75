//! Incremental rebuild analysis.
//!
//! Decides, per source file, whether its object can be reused from the
//! previous run. Checks are ordered cheapest first and the first hit wins:
//!
//! 1. forced runs (just-print) compile everything;
//! 2. a missing object compiles;
//! 3. a source strictly newer than its object compiles;
//! 4. otherwise the sidecar dependency file is consulted: any recorded
//!    dependency newer than the object (or missing on disk) compiles.
//!
//! An unreadable or absent sidecar degrades gracefully to the timestamp
//! comparison already made, never to a forced rebuild.
//!
//! A project's precompiled header is a precursor: it goes through the same
//! precedence, and a stale PCH forces every source in the project to
//! compile against the fresh one.

use std::path::{Path, PathBuf};

use crate::builder::toolchain::Toolchain;
use crate::core::project::Project;
use crate::util::fs::mtime;

/// Why a source is scheduled for compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileReason {
    /// Forced run; nothing was inspected.
    Forced,
    /// No object from a previous run.
    MissingObject,
    /// The source is newer than its object.
    SourceNewer,
    /// A recorded dependency is newer than the object, or gone.
    DependencyNewer(PathBuf),
    /// The project's precompiled header was rebuilt.
    PchRebuilt,
}

/// One source scheduled for compilation.
#[derive(Debug, Clone)]
pub struct CompileJob {
    pub source: PathBuf,
    pub object: PathBuf,
    pub reason: CompileReason,
}

/// Precompiled-header work for a project.
#[derive(Debug, Clone)]
pub struct PchJob {
    pub header: PathBuf,
    pub compiled: PathBuf,
    pub stale: bool,
}

/// The analysis result for one project.
#[derive(Debug, Clone, Default)]
pub struct CompilePlan {
    /// PCH precursor, when the project declares one and the toolchain
    /// supports it.
    pub pch: Option<PchJob>,
    /// Sources that must compile, in project source order.
    pub jobs: Vec<CompileJob>,
    /// Objects reused from the previous run.
    pub reused: Vec<PathBuf>,
}

impl CompilePlan {
    /// Whether any compilation (PCH included) happens under this plan.
    pub fn has_work(&self) -> bool {
        !self.jobs.is_empty() || self.pch.as_ref().is_some_and(|p| p.stale)
    }

    /// Every object the link step consumes, compiled or reused, in source
    /// order.
    pub fn all_objects(&self) -> Vec<PathBuf> {
        let mut objects: Vec<PathBuf> = self.jobs.iter().map(|j| j.object.clone()).collect();
        objects.extend(self.reused.iter().cloned());
        objects
    }
}

/// Map a source file to its object path under the intermediate directory.
///
/// The source's path relative to the project directory is mirrored so two
/// sources with the same stem in different subdirectories cannot collide.
pub fn object_path(project: &Project, toolchain: &dyn Toolchain, source: &Path) -> PathBuf {
    let relative = source
        .strip_prefix(&project.directory)
        .unwrap_or_else(|_| Path::new(source.file_name().unwrap_or(source.as_os_str())));
    project
        .intermediate_dir
        .join(relative)
        .with_extension(toolchain.object_extension())
}

/// Analyze one project, deciding which sources compile and which objects
/// are reused. `force` skips all inspection (just-print runs).
pub fn analyze(project: &Project, toolchain: &dyn Toolchain, force: bool) -> CompilePlan {
    let mut plan = CompilePlan::default();

    let pch_rebuilt = match pch_job(project, toolchain, force) {
        Some(job) => {
            let stale = job.stale;
            plan.pch = Some(job);
            stale
        }
        None => false,
    };

    for source in &project.sources {
        let object = object_path(project, toolchain, source);

        let reason = if force {
            Some(CompileReason::Forced)
        } else if pch_rebuilt {
            Some(CompileReason::PchRebuilt)
        } else {
            staleness_of(source, &object, toolchain, project)
        };

        match reason {
            Some(reason) => {
                tracing::debug!(
                    "`{}`: compiling {} ({:?})",
                    project.name,
                    source.display(),
                    reason
                );
                plan.jobs.push(CompileJob {
                    source: source.clone(),
                    object,
                    reason,
                });
            }
            None => {
                tracing::debug!("`{}`: reusing {}", project.name, object.display());
                plan.reused.push(object);
            }
        }
    }

    plan
}

/// Whether the project must be re-linked given its plan and what happened
/// earlier in the run.
///
/// Linking happens when the output is missing, when anything compiled this
/// run (PCH included), or when a dependency project was rebuilt: a rebuilt
/// dependency changes link inputs even if this project's own objects are
/// all current.
pub fn needs_link(output: &Path, plan: &CompilePlan, dependency_rebuilt: bool) -> bool {
    if plan.has_work() || dependency_rebuilt {
        return true;
    }
    mtime(output).is_none()
}

fn pch_job(project: &Project, toolchain: &dyn Toolchain, force: bool) -> Option<PchJob> {
    let header = project.pch_header()?;
    let compiled = toolchain.compiled_pch_location(project)?;

    let stale = if force {
        true
    } else {
        staleness_of(&header, &compiled, toolchain, project).is_some()
    };

    Some(PchJob {
        header,
        compiled,
        stale,
    })
}

/// The ordered staleness checks for one (input, product) pair.
/// `None` means the product is current and can be reused.
fn staleness_of(
    input: &Path,
    product: &Path,
    toolchain: &dyn Toolchain,
    project: &Project,
) -> Option<CompileReason> {
    let product_time = match mtime(product) {
        Some(t) => t,
        None => return Some(CompileReason::MissingObject),
    };

    if let Some(input_time) = mtime(input) {
        if input_time > product_time {
            return Some(CompileReason::SourceNewer);
        }
    }

    // Sidecar check. A missing sidecar is not an error: the timestamp
    // comparison above already ran, so the product is reused.
    if let Some(deps) = toolchain.dependencies(project, product) {
        for dep in deps {
            match mtime(&dep) {
                Some(t) if t > product_time => {
                    return Some(CompileReason::DependencyNewer(dep));
                }
                Some(_) => {}
                None => return Some(CompileReason::DependencyNewer(dep)),
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::toolchain::GnuToolchain;
    use crate::core::language::Language;
    use crate::core::machine::{Affixes, MachineDescriptor};
    use crate::core::project::BinaryType;
    use crate::core::workspace::Workspace;
    use crate::util::config::ConfigStore;
    use filetime::{set_file_mtime, FileTime};
    use std::fs;

    fn touch(path: &Path, seconds: i64) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
        set_file_mtime(path, FileTime::from_unix_time(seconds, 0)).unwrap();
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        ws: Workspace,
        target: MachineDescriptor,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().to_path_buf();
            let mut ws = Workspace::new(&root, ConfigStore::with_defaults());
            ws.create_project("app", BinaryType::ConsoleApp, Language::C, &root.join("app"))
                .unwrap();
            Fixture {
                _dir: dir,
                ws,
                target: MachineDescriptor::new(
                    "linux",
                    "x86_64",
                    "unknown",
                    "gnu",
                    "unknown",
                    Affixes::unix(),
                ),
            }
        }

        fn toolchain(&self) -> GnuToolchain {
            GnuToolchain::new(&self.ws, self.project(), &self.target)
        }

        fn project(&self) -> &Project {
            self.ws.project("app").unwrap()
        }

        fn add_source(&mut self, name: &str) -> PathBuf {
            let p = self.ws.project_mut("app").unwrap();
            p.add_source(name);
            p.sources.last().unwrap().clone()
        }
    }

    #[test]
    fn test_missing_object_compiles() {
        let mut fx = Fixture::new();
        let src = fx.add_source("main.c");
        touch(&src, 1000);

        let tc = fx.toolchain();
        let plan = analyze(fx.project(), &tc, false);
        assert_eq!(plan.jobs.len(), 1);
        assert_eq!(plan.jobs[0].reason, CompileReason::MissingObject);
    }

    #[test]
    fn test_current_object_reused() {
        let mut fx = Fixture::new();
        let src = fx.add_source("main.c");
        touch(&src, 1000);

        let tc = fx.toolchain();
        let obj = object_path(fx.project(), &tc, &src);
        touch(&obj, 2000);

        let plan = analyze(fx.project(), &tc, false);
        assert!(plan.jobs.is_empty());
        assert_eq!(plan.reused, vec![obj]);
    }

    #[test]
    fn test_newer_source_compiles() {
        let mut fx = Fixture::new();
        let src = fx.add_source("main.c");
        touch(&src, 3000);

        let tc = fx.toolchain();
        let obj = object_path(fx.project(), &tc, &src);
        touch(&obj, 2000);

        let plan = analyze(fx.project(), &tc, false);
        assert_eq!(plan.jobs[0].reason, CompileReason::SourceNewer);
    }

    #[test]
    fn test_equal_timestamps_reuse() {
        // Strict comparison: equal mtimes do not trigger a rebuild.
        let mut fx = Fixture::new();
        let src = fx.add_source("main.c");
        touch(&src, 2000);

        let tc = fx.toolchain();
        let obj = object_path(fx.project(), &tc, &src);
        touch(&obj, 2000);

        let plan = analyze(fx.project(), &tc, false);
        assert!(plan.jobs.is_empty());
    }

    #[test]
    fn test_newer_header_dependency_compiles() {
        let mut fx = Fixture::new();
        let src = fx.add_source("main.c");
        touch(&src, 1000);

        let tc = fx.toolchain();
        let obj = object_path(fx.project(), &tc, &src);
        touch(&obj, 2000);

        let header = fx.ws.root().join("app/app.h");
        touch(&header, 3000);
        fs::write(
            tc.depfile_path(&obj),
            format!("{}: {} {}\n", obj.display(), src.display(), header.display()),
        )
        .unwrap();

        let plan = analyze(fx.project(), &tc, false);
        assert_eq!(
            plan.jobs[0].reason,
            CompileReason::DependencyNewer(header)
        );
    }

    #[test]
    fn test_deleted_dependency_compiles() {
        let mut fx = Fixture::new();
        let src = fx.add_source("main.c");
        touch(&src, 1000);

        let tc = fx.toolchain();
        let obj = object_path(fx.project(), &tc, &src);
        touch(&obj, 2000);

        let gone = fx.ws.root().join("app/removed.h");
        fs::write(
            tc.depfile_path(&obj),
            format!("{}: {}\n", obj.display(), gone.display()),
        )
        .unwrap();

        let plan = analyze(fx.project(), &tc, false);
        assert_eq!(plan.jobs[0].reason, CompileReason::DependencyNewer(gone));
    }

    #[test]
    fn test_missing_sidecar_degrades_to_reuse() {
        let mut fx = Fixture::new();
        let src = fx.add_source("main.c");
        touch(&src, 1000);

        let tc = fx.toolchain();
        let obj = object_path(fx.project(), &tc, &src);
        touch(&obj, 2000);
        // No depfile on disk: timestamps alone decide, and they say reuse.

        let plan = analyze(fx.project(), &tc, false);
        assert!(plan.jobs.is_empty());
        assert_eq!(plan.reused.len(), 1);
    }

    #[test]
    fn test_forced_run_compiles_everything() {
        let mut fx = Fixture::new();
        let src = fx.add_source("main.c");
        touch(&src, 1000);

        let tc = fx.toolchain();
        let obj = object_path(fx.project(), &tc, &src);
        touch(&obj, 2000);

        let plan = analyze(fx.project(), &tc, true);
        assert_eq!(plan.jobs[0].reason, CompileReason::Forced);
    }

    #[test]
    fn test_stale_pch_forces_all_sources() {
        let mut fx = Fixture::new();
        let a = fx.add_source("a.c");
        let b = fx.add_source("b.c");
        touch(&a, 1000);
        touch(&b, 1000);
        fx.ws.project_mut("app").unwrap().pch = Some(PathBuf::from("pch.h"));

        let tc = fx.toolchain();
        let header = fx.project().pch_header().unwrap();
        touch(&header, 3000);
        let compiled = tc.compiled_pch_location(fx.project()).unwrap();
        touch(&compiled, 2000);
        for src in [&a, &b] {
            touch(&object_path(fx.project(), &tc, src), 2000);
        }

        let plan = analyze(fx.project(), &tc, false);
        assert!(plan.pch.as_ref().unwrap().stale);
        assert_eq!(plan.jobs.len(), 2);
        assert!(plan
            .jobs
            .iter()
            .all(|j| j.reason == CompileReason::PchRebuilt));
    }

    #[test]
    fn test_header_included_by_pch_triggers_rebuild() {
        // The PCH's own sidecar records headers the PCH header includes;
        // touching one of them makes the PCH stale.
        let mut fx = Fixture::new();
        let src = fx.add_source("a.c");
        touch(&src, 1000);
        fx.ws.project_mut("app").unwrap().pch = Some(PathBuf::from("pch.h"));

        let tc = fx.toolchain();
        let header = fx.project().pch_header().unwrap();
        touch(&header, 1000);
        let compiled = tc.compiled_pch_location(fx.project()).unwrap();
        touch(&compiled, 2000);
        touch(&object_path(fx.project(), &tc, &src), 2000);

        let inner = fx.ws.root().join("app/types.h");
        touch(&inner, 3000);
        fs::write(
            tc.depfile_path(&compiled),
            format!("{}: {} {}\n", compiled.display(), header.display(), inner.display()),
        )
        .unwrap();

        let plan = analyze(fx.project(), &tc, false);
        assert!(plan.pch.as_ref().unwrap().stale);
        assert!(plan
            .jobs
            .iter()
            .all(|j| j.reason == CompileReason::PchRebuilt));
    }

    #[test]
    fn test_current_pch_leaves_sources_alone() {
        let mut fx = Fixture::new();
        let src = fx.add_source("a.c");
        touch(&src, 1000);
        fx.ws.project_mut("app").unwrap().pch = Some(PathBuf::from("pch.h"));

        let tc = fx.toolchain();
        touch(&fx.project().pch_header().unwrap(), 1000);
        touch(&tc.compiled_pch_location(fx.project()).unwrap(), 2000);
        touch(&object_path(fx.project(), &tc, &src), 2000);

        let plan = analyze(fx.project(), &tc, false);
        assert!(!plan.pch.as_ref().unwrap().stale);
        assert!(plan.jobs.is_empty());
    }

    #[test]
    fn test_object_paths_mirror_subdirectories() {
        let mut fx = Fixture::new();
        let a = fx.add_source("net/io.c");
        let b = fx.add_source("disk/io.c");

        let tc = fx.toolchain();
        let oa = object_path(fx.project(), &tc, &a);
        let ob = object_path(fx.project(), &tc, &b);
        assert_ne!(oa, ob);
        assert!(oa.ends_with("net/io.o"));
    }

    #[test]
    fn test_needs_link_rules() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("app");
        let plan = CompilePlan::default();

        // Output missing.
        assert!(needs_link(&output, &plan, false));

        touch(&output, 1000);
        // Nothing compiled, no dependency rebuilt: reuse.
        assert!(!needs_link(&output, &plan, false));
        // Dependency rebuilt this run forces a relink.
        assert!(needs_link(&output, &plan, true));

        // Stale PCH alone forces a relink.
        let mut with_pch = CompilePlan::default();
        with_pch.pch = Some(PchJob {
            header: PathBuf::from("pch.h"),
            compiled: PathBuf::from("pch.h.gch"),
            stale: true,
        });
        assert!(needs_link(&output, &with_pch, false));
    }
}
