//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};

/// Drydock - a build orchestrator for C, C++ and D projects
#[derive(Parser)]
#[command(name = "drydock")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the workspace
    Build(BuildArgs),

    /// Run a generator without building
    Generate(GenerateArgs),

    /// List known target machines
    Targets(TargetsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Named build configuration (must be declared in `build.configs`)
    #[arg(default_value = "debug")]
    pub config: String,

    /// Print every command instead of executing anything
    #[arg(short = 'n', long)]
    pub just_print: bool,

    /// Number of parallel compile jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Target machine tuple, e.g. `linux-x86_64` or `none-armv7m`
    #[arg(long)]
    pub target: Option<String>,

    /// Emit compile_commands.json alongside the build
    #[arg(long)]
    pub compile_commands: bool,
}

#[derive(Args)]
pub struct GenerateArgs {
    /// Generator name; `compile-commands` is the only built-in generator
    pub generator: String,

    /// Target machine tuple the generated commands are for
    #[arg(long)]
    pub target: Option<String>,
}

#[derive(Args)]
pub struct TargetsArgs {}
