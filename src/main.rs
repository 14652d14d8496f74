use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use venvsync::ignore::IgnoreRules;
use venvsync::pip::PipCli;

/// venvsync - reconcile a Python environment against a pinned reference
///
/// Installs missing packages, forces exact versions on mismatches, and
/// reports (but never removes) packages that are not in the reference file.
///
/// Examples:
///   venvsync sync                # reconcile against ./reference.txt
///   venvsync check -f pins.txt   # report drift without changing anything
#[derive(Parser, Debug)]
#[command(author, version = env!("VENVSYNC_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Reference file of name==version pins (also via VENVSYNC_REFERENCE)
    #[arg(
        long = "reference",
        short = 'f',
        env = "VENVSYNC_REFERENCE",
        value_name = "PATH",
        default_value = "reference.txt",
        global = true
    )]
    pub reference: PathBuf,

    /// pip executable to invoke (also via VENVSYNC_PIP)
    #[arg(
        long = "pip",
        env = "VENVSYNC_PIP",
        value_name = "PROGRAM",
        default_value = "pip",
        global = true
    )]
    pub pip: String,

    /// Additional exact package name to ignore (repeatable)
    #[arg(long = "ignore", value_name = "NAME", global = true)]
    pub ignore: Vec<String>,

    /// Additional package name prefix to ignore (repeatable)
    #[arg(long = "ignore-prefix", value_name = "PREFIX", global = true)]
    pub ignore_prefix: Vec<String>,

    /// Start from an empty ignore list instead of the built-in one
    #[arg(long = "no-default-ignores", global = true)]
    pub no_default_ignores: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Reconcile the environment against the reference file
    Sync(SyncArgs),

    /// Report differences without changing anything
    Check(CheckArgs),
}

#[derive(clap::Args, Debug)]
pub struct SyncArgs {}

#[derive(clap::Args, Debug)]
pub struct CheckArgs {}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let base = if cli.no_default_ignores {
        IgnoreRules::empty()
    } else {
        IgnoreRules::builtin()
    };
    let ignores = base
        .with_exact(cli.ignore.iter())
        .with_prefixes(cli.ignore_prefix.iter());
    let pip = PipCli::new(cli.pip);

    match cli.command {
        Commands::Sync(_args) => venvsync::commands::sync(&pip, &cli.reference, &ignores)?,
        Commands::Check(_args) => venvsync::commands::check(&pip, &cli.reference, &ignores)?,
    }
    Ok(())
}
