//! Profile Forge CLI
//!
//! Usage:
//!   profile-forge build [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>          Build configuration (JSON or TOML)
//!   -r, --root <DIR>             Project root
//!   --templates-dir <DIR>        Template sources (default: <root>/templates)
//!   --static-dir <DIR>           Static assets (default: <root>/static)
//!   --build-version <VERSION>    Version reported by build_info
//!   --build-time <RFC3339>       Build timestamp
//!   -o, --output-folder <NAME>   Sub-folder of out/ and dist/
//!   -d, --debug                  Placeholder statistics, pretty output, no publishing
//!   --skip-pages                 Do not write the publishing tree
//!   --stats <FILE>               Statistics snapshot (username -> record)
//!   -q, --quiet                  Suppress build messages

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use futures::executor::block_on;

use profile_forge::{
    BuildConfig, Builder, JsonFileStats, LogConsole, ProjectLayout, SilentConsole, StatsProvider,
    DEFAULT_VERSION,
};

#[derive(Parser)]
#[command(name = "profile-forge")]
#[command(about = "Build profile artifacts from declarative templates")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build every template in the configuration
    Build(BuildArgs),
}

#[derive(clap::Args)]
struct BuildArgs {
    /// Build configuration, relative to the project root
    #[arg(short, long, default_value = "build-config.json")]
    config: PathBuf,

    /// Project root containing templates/ and static/
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Template sources, relative to the project root
    #[arg(long)]
    templates_dir: Option<PathBuf>,

    /// Static assets read by the file helpers, relative to the project root
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Version reported by build_info (overrides the configuration)
    #[arg(long)]
    build_version: Option<String>,

    /// Build timestamp in RFC 3339 format (defaults to now)
    #[arg(long)]
    build_time: Option<DateTime<Utc>>,

    /// Sub-folder of out/ and dist/ (overrides the configuration)
    #[arg(short, long)]
    output_folder: Option<String>,

    /// Debug mode: placeholder statistics, pretty output, no publishing
    #[arg(short, long)]
    debug: bool,

    /// Do not write the publishing tree
    #[arg(long)]
    skip_pages: bool,

    /// Statistics snapshot mapping usernames to records (JSON)
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Suppress build messages
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Build(args) => run_build(args),
    }
}

fn run_build(args: BuildArgs) {
    let config_path = args.root.join(&args.config);
    let config = match BuildConfig::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            let source = std::fs::read_to_string(&config_path).unwrap_or_default();
            eprintln!("{}", e.format(&source, &config_path.display().to_string()));
            std::process::exit(1);
        }
    };

    let stats = match &args.stats {
        Some(path) => match JsonFileStats::load(path) {
            Ok(snapshot) => StatsProvider::new(Arc::new(snapshot)),
            Err(e) => {
                eprintln!("Error loading statistics '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => StatsProvider::default(),
    };

    let version = args
        .build_version
        .or(config.version)
        .unwrap_or_else(|| DEFAULT_VERSION.to_string());
    let output_folder = args.output_folder.or(config.output_folder).unwrap_or_default();

    let mut layout = ProjectLayout::new(&args.root);
    if let Some(dir) = &args.templates_dir {
        layout = layout.with_templates_dir(args.root.join(dir));
    }
    if let Some(dir) = &args.static_dir {
        layout = layout.with_static_dir(args.root.join(dir));
    }

    let mut builder = Builder::new()
        .with_layout(layout)
        .with_templates(config.templates)
        .with_version(version)
        .with_output_folder(output_folder)
        .with_debug(args.debug)
        .with_stats(stats);
    if let Some(time) = args.build_time {
        builder = builder.with_build_time(time);
    }
    if args.skip_pages {
        builder = builder.skip_pages();
    }
    builder = if args.quiet {
        builder.with_console(SilentConsole)
    } else {
        builder.with_console(LogConsole)
    };

    match block_on(builder.build()) {
        Ok(templates) => {
            if !args.quiet {
                println!("Build successful: {} templates", templates.len());
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
