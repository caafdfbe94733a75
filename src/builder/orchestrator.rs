//! The build orchestrator.
//!
//! Drives one build run end to end: resolve the target machine, order the
//! projects, and for each project in dependency order run the per-project
//! pipeline (precompiled header, parallel compilation, link, post-link).
//! Projects build sequentially; sources within a project compile in
//! parallel on a bounded worker pool.
//!
//! The first failing tool invocation halts the whole run. Later projects
//! are not attempted: their inputs may depend on outputs the failed project
//! never produced.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::builder::compile_commands::CompileCommandsDb;
use crate::builder::graph;
use crate::builder::options::{BuildOptions, BuildState, ProjectOutcome};
use crate::builder::staleness::{self, CompilePlan};
use crate::builder::toolchain::{toolchain_for, Toolchain};
use crate::core::machine::MachineDescriptor;
use crate::core::project::Project;
use crate::core::workspace::Workspace;
use crate::util::fs::{ensure_dir, file_size};
use crate::util::process::ProcessBuilder;

/// Summary of one completed run.
#[derive(Debug)]
pub struct BuildReport {
    /// (project, outcome) in build order.
    pub outcomes: Vec<(String, ProjectOutcome)>,
    /// Objects compiled across all projects.
    pub compiled: usize,
    /// Objects reused across all projects.
    pub reused: usize,
}

impl BuildReport {
    /// Whether every project was already current.
    pub fn all_up_to_date(&self) -> bool {
        self.outcomes
            .iter()
            .all(|(_, o)| *o == ProjectOutcome::UpToDate)
    }
}

/// Run a build over the whole workspace.
pub fn build(ws: &Workspace, options: &BuildOptions) -> Result<BuildReport> {
    options.validate(ws.config())?;

    let target = resolve_target(ws, options)?;
    let order = graph::sorted_projects(ws)?;
    let workers = worker_count(ws, options);
    tracing::info!(
        "building {} project(s) for {} with {} worker(s), configuration `{}`",
        order.len(),
        target,
        workers,
        options.config
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .context("failed to create compile worker pool")?;

    let emit_db = options.emit_compile_commands(ws.config());
    let combine = ws
        .config()
        .get_bool(&["builder", "combineCmds"])
        .unwrap_or(false);
    let combined_db = (emit_db && combine).then(CompileCommandsDb::new);

    let mut state = BuildState::new();
    let mut outcomes = Vec::with_capacity(order.len());

    for name in &order {
        // Names come from the graph over this workspace's projects.
        let project = ws
            .project(name)
            .ok_or_else(|| anyhow!("project `{}` vanished from the workspace", name))?;

        let toolchain = toolchain_for(ws, project, &target)?;
        let verdict = toolchain.is_supported();
        if !verdict.supported {
            bail!(
                "project `{}`: {} toolchain unavailable: {}",
                name,
                toolchain.family(),
                verdict.reason
            );
        }
        toolchain.validate(project)?;

        let project_db = emit_db.then(CompileCommandsDb::new);
        let outcome = build_project(
            ws,
            project,
            toolchain.as_ref(),
            &target,
            options,
            &pool,
            project_db.as_ref(),
            &mut state,
        )
        .with_context(|| format!("failed to build project `{}`", name))?;

        // Entries for recompiled files replace their predecessors; the
        // rest of the existing database is preserved. Just-print runs
        // write nothing.
        if let Some(db) = project_db.filter(|_| !options.just_print) {
            match &combined_db {
                Some(combined) => combined.extend(db.drain()),
                None if !db.is_empty() => {
                    db.write(&project.directory, true)?;
                }
                None => {}
            }
        }

        if outcome == ProjectOutcome::Built {
            state.mark_rebuilt(name);
        }
        state.record(outcome);
        outcomes.push((name.clone(), outcome));
    }

    if let Some(db) = combined_db.filter(|_| !options.just_print) {
        let path = db.write(ws.root(), true)?;
        tracing::info!("compilation database: {}", path.display());
    }

    Ok(BuildReport {
        outcomes,
        compiled: state.compiled,
        reused: state.reused,
    })
}

/// Record the compile command for every source of every project, without
/// executing anything, and write the workspace-level compilation database.
/// Backs `drydock generate compile-commands`.
pub fn generate_compile_commands(ws: &Workspace, target: Option<&str>) -> Result<PathBuf> {
    let options = BuildOptions {
        target: target.map(str::to_string),
        ..BuildOptions::default()
    };
    let machine = resolve_target(ws, &options)?;
    let order = graph::sorted_projects(ws)?;
    let db = CompileCommandsDb::new();

    for name in &order {
        let project = ws
            .project(name)
            .ok_or_else(|| anyhow!("project `{}` vanished from the workspace", name))?;
        let toolchain = toolchain_for(ws, project, &machine)?;
        for source in &project.sources {
            let object = staleness::object_path(project, toolchain.as_ref(), source);
            let cmd = toolchain.compile_command(ws, project, source, &object);
            db.record(&project.directory, source, &object, &cmd);
        }
    }

    db.write(ws.root(), true)
}

/// Resolve the target descriptor for this run: the requested tuple, or the
/// host machine.
fn resolve_target(ws: &Workspace, options: &BuildOptions) -> Result<MachineDescriptor> {
    match &options.target {
        Some(tuple) => match ws.machines().parse(tuple)? {
            Some(m) => Ok(m.clone()),
            None => {
                let known: Vec<String> =
                    ws.machines().known().map(|m| m.to_string()).collect();
                bail!(
                    "unknown target machine `{}`; known machines: {}",
                    tuple,
                    known.join(", ")
                )
            }
        },
        None => ws
            .machines()
            .host()
            .cloned()
            .ok_or_else(|| anyhow!("host machine is not in the registry")),
    }
}

/// Bounded worker count: an explicit `--jobs` wins; otherwise the smallest
/// of the configured thread cap, the CPU count, and how many workers fit in
/// available memory at `mt.minThreadMem` bytes each.
fn worker_count(ws: &Workspace, options: &BuildOptions) -> usize {
    if let Some(jobs) = options.jobs {
        return jobs.max(1);
    }

    let config = ws.config();
    let max_threads = config
        .get_i64(&["mt", "maxThreads"])
        .map(|v| v.max(1) as usize)
        .unwrap_or(16);
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    let min_thread_mem = config
        .get_i64(&["mt", "minThreadMem"])
        .map(|v| v.max(1) as u64)
        .unwrap_or(512 * 1024 * 1024);
    let mut sys = sysinfo::System::new();
    sys.refresh_memory();
    let mem_workers = (sys.available_memory() / min_thread_mem).max(1) as usize;

    max_threads.min(cpus).min(mem_workers).max(1)
}

/// The per-project pipeline: PCH, parallel compiles, link, post-link.
fn build_project(
    ws: &Workspace,
    project: &Project,
    toolchain: &dyn Toolchain,
    target: &MachineDescriptor,
    options: &BuildOptions,
    pool: &rayon::ThreadPool,
    db: Option<&CompileCommandsDb>,
    state: &mut BuildState,
) -> Result<ProjectOutcome> {
    let plan = staleness::analyze(project, toolchain, options.just_print);
    let output = project.output_path(&target.affixes);

    let dependency_rebuilt = state.any_rebuilt(&project.dependencies);
    let link = staleness::needs_link(&output, &plan, dependency_rebuilt);

    state.compiled += plan.jobs.len();
    state.reused += plan.reused.len();

    if options.just_print {
        print_plan(ws, project, toolchain, &plan, &output, link);
        return Ok(ProjectOutcome::Built);
    }

    if !plan.has_work() && !link {
        tracing::info!("`{}` is up to date", project.name);
        return Ok(ProjectOutcome::UpToDate);
    }

    ensure_dir(&project.intermediate_dir)?;
    ensure_dir(&project.output_dir)?;

    if let Some(pch) = &plan.pch {
        if pch.stale {
            if let Some(cmd) = toolchain.pch_command(ws, project) {
                tracing::info!("`{}`: compiling precompiled header", project.name);
                run_tool(&cmd, &pch.compiled)?;
            }
        }
    }

    if !plan.jobs.is_empty() {
        compile_parallel(ws, project, toolchain, &plan, pool, db)?;
    }

    if link {
        tracing::info!("`{}`: linking {}", project.name, output.display());
        let cmd = toolchain.link_command(ws, project, &plan.all_objects(), &output);
        run_tool(&cmd, &output)?;

        if let Some(post) = toolchain.postprocess_command(project, &output) {
            let outcome = post.exec()?;
            if !outcome.success() {
                bail!(
                    "post-link step failed for `{}`:\n{}",
                    project.name,
                    outcome.stderr
                );
            }
        }
    }

    Ok(ProjectOutcome::Built)
}

/// Compile all scheduled sources on the worker pool. The first failure
/// stops the run; workers already in flight finish their current source.
fn compile_parallel(
    ws: &Workspace,
    project: &Project,
    toolchain: &dyn Toolchain,
    plan: &CompilePlan,
    pool: &rayon::ThreadPool,
    db: Option<&CompileCommandsDb>,
) -> Result<()> {
    let bar = ProgressBar::new(plan.jobs.len() as u64);
    if let Ok(style) = ProgressStyle::with_template("{prefix} [{bar:30}] {pos}/{len} {msg}") {
        bar.set_style(style);
    }
    bar.set_prefix(project.name.clone());

    let result = pool.install(|| {
        plan.jobs.par_iter().try_for_each(|job| {
            if let Some(parent) = job.object.parent() {
                ensure_dir(parent)?;
            }

            let cmd = toolchain.compile_command(ws, project, &job.source, &job.object);
            bar.set_message(
                job.source
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
            run_tool(&cmd, &job.object)
                .with_context(|| format!("failed to compile {}", job.source.display()))?;

            if let Some(db) = db {
                db.record(&project.directory, &job.source, &job.object, &cmd);
            }
            bar.inc(1);
            Ok(())
        })
    });

    bar.finish_and_clear();
    result
}

/// Execute one tool invocation and verify its product.
///
/// A tool that exits zero but leaves a zero-byte product (interrupted
/// write, full disk) is treated as a failure so the next run does not
/// mistake the husk for a valid object.
fn run_tool(cmd: &ProcessBuilder, product: &std::path::Path) -> Result<()> {
    tracing::debug!("running: {}", cmd.display_command());
    let outcome = cmd.exec()?;

    if !outcome.success() {
        bail!(
            "`{}` exited with {:?}:\n{}",
            cmd.get_program().display(),
            outcome.code,
            outcome.stderr.trim_end()
        );
    }
    if file_size(product) == Some(0) {
        bail!(
            "`{}` produced an empty file: {}",
            cmd.get_program().display(),
            product.display()
        );
    }
    if !outcome.stderr.trim().is_empty() {
        // Warnings from a successful invocation still reach the user.
        tracing::warn!("{}", outcome.stderr.trim_end());
    }
    Ok(())
}

/// Print every command this run would execute, without touching anything.
fn print_plan(
    ws: &Workspace,
    project: &Project,
    toolchain: &dyn Toolchain,
    plan: &CompilePlan,
    output: &PathBuf,
    link: bool,
) {
    if let Some(pch) = &plan.pch {
        if pch.stale {
            if let Some(cmd) = toolchain.pch_command(ws, project) {
                println!("{}", cmd.display_command());
            }
        }
    }
    for job in &plan.jobs {
        let cmd = toolchain.compile_command(ws, project, &job.source, &job.object);
        println!("{}", cmd.display_command());
    }
    if link {
        let cmd = toolchain.link_command(ws, project, &plan.all_objects(), output);
        println!("{}", cmd.display_command());
        if let Some(post) = toolchain.postprocess_command(project, output) {
            println!("{}", post.display_command());
        }
    }
}
