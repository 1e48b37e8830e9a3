use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tailor_ast::span::LineIndex;
use tailor_check::{Engine, Registry, Severity};
use tailor_cli::driver::{self, Summary, MAX_SOURCE_SIZE};
use tailor_cli::{discover, report, ColorChoice, Config, OutputFormat};

#[derive(Parser, Debug)]
#[command(name = "tailor")]
#[command(about = "Tailor: a style checker for Swift sources")]
struct Cli {
    /// Log progress and per-file timings
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check Swift files and directories (defaults to $SRCROOT)
    Check {
        paths: Vec<PathBuf>,

        /// Configuration file (defaults to ./.tailor.yml when present)
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, value_enum)]
        format: Option<OutputFormat>,

        #[arg(long, value_enum)]
        color: Option<ColorChoice>,

        /// Worker threads, 0 for one per core
        #[arg(long)]
        jobs: Option<usize>,

        /// Per-file analysis deadline, 0 for none
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Highest severity any rule may report (warning | error)
        #[arg(long)]
        max_severity: Option<Severity>,

        /// Run only these rules
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,

        /// Skip these rules
        #[arg(long, value_delimiter = ',')]
        except: Vec<String>,
    },

    /// List the available rules
    Rules,

    /// Parse a source file and dump the syntax tree
    Parse {
        /// Path to .swift source file
        file: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Pretty)]
        format: Format,
    },
}

#[derive(ValueEnum, Clone, Debug)]
enum Format {
    Pretty,
    Json,
}

struct CheckArgs {
    paths: Vec<PathBuf>,
    config: Option<PathBuf>,
    format: Option<OutputFormat>,
    color: Option<ColorChoice>,
    jobs: Option<usize>,
    timeout_ms: Option<u64>,
    max_severity: Option<Severity>,
    only: Vec<String>,
    except: Vec<String>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    tailor_check::engine::quiet_rule_panics();

    match cli.command {
        Commands::Check {
            paths,
            config,
            format,
            color,
            jobs,
            timeout_ms,
            max_severity,
            only,
            except,
        } => cmd_check(CheckArgs {
            paths,
            config,
            format,
            color,
            jobs,
            timeout_ms,
            max_severity,
            only,
            except,
        }),
        Commands::Rules => cmd_rules(),
        Commands::Parse { file, format } => cmd_parse(&file, format),
    }
}

/// Apply command-line overrides on top of the file configuration.
fn merge(mut config: Config, args: &CheckArgs) -> Config {
    if let Some(format) = args.format {
        config.format = format;
    }
    if let Some(color) = args.color {
        config.color = color;
    }
    if let Some(jobs) = args.jobs {
        config.jobs = jobs;
    }
    if let Some(ms) = args.timeout_ms {
        config.timeout_ms = ms;
    }
    if args.max_severity.is_some() {
        config.max_severity = args.max_severity;
    }
    if !args.only.is_empty() {
        config.only = args.only.clone();
    }
    config.except.extend(args.except.iter().cloned());
    config
}

fn use_color(choice: ColorChoice) -> bool {
    match choice {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => {
            std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
        }
    }
}

fn cmd_check(args: CheckArgs) -> Result<ExitCode> {
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let config = Config::discover(args.config.as_deref(), &cwd)
        .context("failed to load configuration")?;
    let config = merge(config, &args);

    let registry = Registry::builtin();
    let settings = config
        .settings(&registry)
        .context("invalid configuration")?;
    let excludes = discover::exclude_set(&config.exclude).context("invalid exclude pattern")?;

    let roots = if args.paths.is_empty() {
        match discover::default_roots() {
            Some(roots) => roots,
            None => bail!("no input paths given and ${} is not set", discover::SRCROOT),
        }
    } else {
        args.paths
    };
    let files = discover::collect_files(&roots, &excludes);
    if files.is_empty() {
        let roots: Vec<String> = roots.iter().map(|r| r.display().to_string()).collect();
        bail!("no Swift source files found in {}", roots.join(", "));
    }

    let engine = Engine::new(registry, settings);
    let reports = driver::check_files(&engine, &files, config.jobs)
        .context("failed to start worker pool")?;

    let color = use_color(config.color);
    colored::control::set_override(color);
    print!("{}", report::report(&reports, config.format, color));

    Ok(ExitCode::from(Summary::of(&reports).exit_code()))
}

fn cmd_rules() -> Result<ExitCode> {
    let registry = Registry::builtin();
    for info in registry.infos() {
        println!(
            "{:<28} {:<8} {}",
            info.id,
            info.default_severity.to_string(),
            info.description
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_parse(file: &Path, format: Format) -> Result<ExitCode> {
    let src = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    if src.len() as u64 > MAX_SOURCE_SIZE {
        bail!(
            "source file exceeds {}MB limit ({} bytes)",
            MAX_SOURCE_SIZE / 1_000_000,
            src.len()
        );
    }

    let parsed = match tailor_parse::parse_str(&src) {
        Ok(parsed) => parsed,
        Err(err) => {
            let pos = LineIndex::new(&src).position(&src, err.span().start);
            bail!("{}:{}: {}", file.display(), pos, err);
        }
    };

    match format {
        Format::Pretty => println!("{:#?}", parsed),
        Format::Json => println!("{}", serde_json::to_string_pretty(&parsed)?),
    }
    Ok(ExitCode::SUCCESS)
}
