//! friendlizer - Add a module to the friend list of NetBeans plugin JARs
//!
//! Usage:
//!   friendlizer patch <jar>...                    - Patch specific archives
//!   friendlizer dir <dir> [-f filter] [-r]        - Patch every .jar in a directory
//!   friendlizer modules <root> -c <config>        - Patch configured module groups
//!   friendlizer inspect <jar>...                  - Show friend lists without patching

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use friendlizer::{
    create_glob_matcher, BatchRunner, FriendListState, FriendPatcher, FriendlizerConfig, LogSink,
    TracingSink, Worklist,
};

#[derive(Parser)]
#[command(name = "friendlizer")]
#[command(version = "0.1.0")]
#[command(about = "Add a module to the friend list of NetBeans plugin JARs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Identifier to add to friend lists (overrides the configuration)
    #[arg(short, long, global = true)]
    target: Option<String>,

    /// Manifest attribute holding the friend list (overrides the configuration)
    #[arg(short, long, global = true)]
    attribute: Option<String>,

    /// Send progress to the log instead of stdout
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Patch specific archives
    Patch {
        /// Archives to patch
        #[arg(required = true, num_args = 1..)]
        archives: Vec<PathBuf>,
    },
    /// Patch the archives of a directory
    Dir {
        /// Directory to scan
        root: PathBuf,
        /// Filter pattern (e.g., *web*.jar)
        #[arg(short, long)]
        filter: Option<String>,
        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
    },
    /// Patch the dependencies of configured modules
    Modules {
        /// Installation root the dependency paths are relative to
        root: PathBuf,
        /// Properties file describing the modules
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the friend list of archives without changing them
    Inspect {
        /// Archives to inspect
        #[arg(required = true, num_args = 1..)]
        archives: Vec<PathBuf>,
    },
}

/// Prints log lines above a progress bar
///
/// Lines go to `out` even when the bar is hidden (stderr is not a terminal).
struct ConsoleSink<W: Write> {
    pb: ProgressBar,
    out: W,
}

impl ConsoleSink<io::Stdout> {
    fn new() -> Result<Self> {
        let pb = ProgressBar::new(0);
        pb.set_style(ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}",
        )?);
        Ok(Self::with_bar(pb, io::stdout()))
    }
}

impl<W: Write> ConsoleSink<W> {
    fn with_bar(pb: ProgressBar, out: W) -> Self {
        Self { pb, out }
    }
}

impl<W: Write> LogSink for ConsoleSink<W> {
    fn log(&mut self, line: &str) {
        let out = &mut self.out;
        self.pb.suspend(|| {
            if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
                tracing::warn!("Failed to write log line: {}", e);
            }
        });
    }

    fn progress(&mut self, done: usize, total: usize) {
        self.pb.set_length(total as u64);
        self.pb.set_position(done as u64);
    }

    fn finished(&mut self, _success: bool) {
        self.pb.finish_and_clear();
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let success = match cli.command {
        Commands::Patch { ref archives } => {
            let patcher = build_patcher(&cli, &FriendlizerConfig::default());
            run(&cli, patcher, Worklist::Paths(archives.clone()))?
        }
        Commands::Dir {
            ref root,
            ref filter,
            recursive,
        } => {
            let filter = filter.as_deref().map(create_glob_matcher).transpose()?;
            let patcher = build_patcher(&cli, &FriendlizerConfig::default());
            let worklist = Worklist::Directory {
                root: root.clone(),
                recursive,
                filter,
            };
            run(&cli, patcher, worklist)?
        }
        Commands::Modules {
            ref root,
            ref config,
        } => {
            let config = FriendlizerConfig::load(config)
                .with_context(|| format!("Failed to load {}", config.display()))?;
            let patcher = build_patcher(&cli, &config);
            let worklist = Worklist::Modules {
                root: root.clone(),
                modules: config.modules,
            };
            run(&cli, patcher, worklist)?
        }
        Commands::Inspect { ref archives } => {
            let patcher = build_patcher(&cli, &FriendlizerConfig::default());
            inspect(&patcher, archives)
        }
    };

    if !success {
        std::process::exit(1);
    }

    Ok(())
}

fn build_patcher(cli: &Cli, config: &FriendlizerConfig) -> FriendPatcher {
    let target = cli.target.clone().unwrap_or_else(|| config.target.clone());
    let attribute = cli
        .attribute
        .clone()
        .unwrap_or_else(|| config.attribute.clone());
    FriendPatcher::new(target).with_attribute(attribute)
}

fn run(cli: &Cli, patcher: FriendPatcher, worklist: Worklist) -> Result<bool> {
    let runner = BatchRunner::new(patcher);

    let report = if cli.quiet {
        runner.run(&worklist, &mut TracingSink)
    } else {
        let mut sink = ConsoleSink::new()?;
        runner.run(&worklist, &mut sink)
    };

    Ok(report.success())
}

fn inspect(patcher: &FriendPatcher, archives: &[PathBuf]) -> bool {
    let mut success = true;

    for archive in archives {
        match patcher.inspect(archive) {
            Ok(state) => println!("{}", describe_state(archive, patcher, &state)),
            Err(e) => {
                eprintln!("Error reading {}: {}", archive.display(), e);
                success = false;
            }
        }
    }

    success
}

fn describe_state(archive: &Path, patcher: &FriendPatcher, state: &FriendListState) -> String {
    match state {
        FriendListState::NoManifest => format!("{}: no manifest", archive.display()),
        FriendListState::Missing => {
            format!("{}: no {} attribute", archive.display(), patcher.attribute())
        }
        FriendListState::NotText => format!(
            "{}: {} is not a text value",
            archive.display(),
            patcher.attribute()
        ),
        FriendListState::Present { value, is_friend } => {
            let mark = if *is_friend { "friend" } else { "not a friend" };
            format!(
                "{}: {} ({})\n  {}: {}",
                archive.display(),
                patcher.target(),
                mark,
                patcher.attribute(),
                value
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use friendlizer::{DEFAULT_TARGET, FRIENDS_ATTRIBUTE};

    #[test]
    fn test_cli_parses() {
        let cli = Cli::parse_from(["friendlizer", "dir", "/opt/nb", "-r", "-t", "my.tool"]);
        assert_eq!(cli.target.as_deref(), Some("my.tool"));
        assert!(matches!(cli.command, Commands::Dir { recursive: true, .. }));

        let patcher = build_patcher(&cli, &FriendlizerConfig::default());
        assert_eq!(patcher.target(), "my.tool");
        assert_eq!(patcher.attribute(), FRIENDS_ATTRIBUTE);
    }

    #[test]
    fn test_console_sink_writes_with_hidden_bar() {
        let mut sink = ConsoleSink::with_bar(ProgressBar::hidden(), Vec::new());

        sink.log("Examining bad.jar");
        sink.progress(1, 1);
        sink.log("Done: 0 patched, 0 unchanged, 1 failed, 0 skipped");
        sink.finished(false);

        let output = String::from_utf8(sink.out).unwrap();
        assert_eq!(
            output,
            "Examining bad.jar\nDone: 0 patched, 0 unchanged, 1 failed, 0 skipped\n"
        );
    }

    #[test]
    fn test_config_supplies_defaults() {
        let cli = Cli::parse_from(["friendlizer", "patch", "a.jar"]);
        let patcher = build_patcher(&cli, &FriendlizerConfig::default());
        assert_eq!(patcher.target(), DEFAULT_TARGET);
    }
}
