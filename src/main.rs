use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use microscope::{
    config::Config,
    database::AdvisoryDatabase,
    detect::detect,
    docker::open_container,
    fs::{clean_path, ArchiveFs, DirFs},
    model::{FileVulnerability, PackageVulnerability, ScanReport},
    output::{format_report_to_string, print_report, OutputFormat},
    scanner::{scan_files, scan_npm_project, scan_packages, ScanOutcome},
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Exit codes for CI integration
mod exit_codes {
    pub const CLEAN: u8 = 0;
    pub const FOUND: u8 = 1;
}

#[derive(Parser)]
#[command(name = "microscope")]
#[command(
    author,
    version,
    about = "Scan filesystems, archives and containers against a local vulnerability database"
)]
struct Cli {
    /// Package advisory CSV (pattern,reason); may be repeated
    #[arg(long = "pkgdb", value_name = "FILE", global = true)]
    package_databases: Vec<PathBuf>,

    /// File hash advisory CSV (sha256,reason); may be repeated
    #[arg(long = "db", value_name = "FILE", global = true)]
    file_databases: Vec<PathBuf>,

    /// Output format (table, json, text)
    #[arg(short, long, global = true)]
    format: Option<String>,

    /// Write output to file
    #[arg(short, long, global = true)]
    output: Option<String>,

    /// Scan targets sequentially
    #[arg(long, global = true)]
    no_parallel: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash every file below each directory
    Files {
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
    },

    /// Scan the packages installed on a root filesystem
    Packages {
        #[arg(long, default_value = "/")]
        root: PathBuf,
    },

    /// Scan the package-lock.json of each NPM project
    Npm {
        #[arg(required = true)]
        projects: Vec<PathBuf>,
    },

    /// Hash every file below each path inside a tar archive
    ArchiveFiles {
        archive: PathBuf,
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Scan the packages installed in a tar archive of a root filesystem
    ArchivePackages { archive: PathBuf },

    /// Hash every file below each path inside a container
    DockerFiles {
        container: String,
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Scan the packages installed in a container
    DockerPackages { container: String },

    /// Scan NPM projects inside a container
    DockerNpm {
        container: String,
        #[arg(required = true)]
        projects: Vec<String>,
    },

    /// List the package managers detected on a root filesystem
    Managers {
        #[arg(long, default_value = "/")]
        root: PathBuf,
    },

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

/// What one scan target produced.
enum Finding {
    Files(ScanOutcome<FileVulnerability>),
    Packages(ScanOutcome<PackageVulnerability>),
    /// The scan task itself died
    Aborted(String),
}

/// One independent unit of scanning work.
struct Target {
    label: String,
    run: Box<dyn FnOnce(&AdvisoryDatabase) -> Finding + Send>,
}

impl Target {
    fn new<F>(label: impl Into<String>, run: F) -> Self
    where
        F: FnOnce(&AdvisoryDatabase) -> Finding + Send + 'static,
    {
        Self {
            label: label.into(),
            run: Box::new(run),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::FOUND)
        }
    }
}

async fn run() -> Result<u8> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Commands::Managers { root } => {
            let managers = detect(&DirFs::new(root));
            if managers.is_empty() {
                println!("No package managers detected.");
            }
            for manager in managers {
                println!("{}", manager.display_name());
            }
            return Ok(exit_codes::CLEAN);
        }
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            return Ok(exit_codes::CLEAN);
        }
        _ => {}
    }

    let config = Config::load()?;

    let format_str = cli.format.clone().unwrap_or(config.default_format.clone());
    let format = OutputFormat::from_str(&format_str).map_err(|e| anyhow::anyhow!(e))?;
    let is_interactive = format == OutputFormat::Table;
    let parallel = !cli.no_parallel && config.parallel;

    let database = Arc::new(load_database(&config, &cli)?);

    let mut report = ScanReport::new();
    let targets = build_targets(cli.command, &config, &mut report.errors);

    let findings = if parallel && targets.len() > 1 {
        scan_concurrent(targets, database, is_interactive).await
    } else {
        scan_sequential(targets, &database, is_interactive)
    };

    for (label, finding) in findings {
        let error = match finding {
            Finding::Files(outcome) => {
                let (found, error) = outcome.into_parts();
                report.files.extend(found);
                error.map(|e| e.to_string())
            }
            Finding::Packages(outcome) => {
                let (found, error) = outcome.into_parts();
                report.packages.extend(found);
                error.map(|e| e.to_string())
            }
            Finding::Aborted(reason) => Some(reason),
        };
        if let Some(error) = error {
            report.errors.push(format!("{}: {}", label, error));
        }
    }

    config.ignore.apply(&mut report);

    if let Some(path) = &cli.output {
        let content = format_report_to_string(&report, format)?;
        std::fs::write(path, content).with_context(|| format!("failed to write {}", path))?;
        if is_interactive {
            println!("Results written to: {}", path);
        }
    } else {
        print_report(&report, format)?;
    }

    Ok(if report.is_clean() {
        exit_codes::CLEAN
    } else {
        exit_codes::FOUND
    })
}

fn init_tracing(verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {}", e))
}

/// Loads the advisory CSVs named in the config file and on the command line.
fn load_database(config: &Config, cli: &Cli) -> Result<AdvisoryDatabase> {
    let mut database = AdvisoryDatabase::new();

    for path in config.package_databases.iter().chain(&cli.package_databases) {
        database
            .load_package_advisories_path(path)
            .with_context(|| format!("failed to load package advisories from {}", path.display()))?;
    }
    for path in config.file_databases.iter().chain(&cli.file_databases) {
        database
            .load_file_advisories_path(path)
            .with_context(|| format!("failed to load file advisories from {}", path.display()))?;
    }

    info!(
        files = database.file_count(),
        packages = database.package_count(),
        "advisory database loaded"
    );
    if database.is_empty() {
        warn!("advisory database is empty, nothing can match; pass --db/--pkgdb or set them in the config file");
    }
    Ok(database)
}

/// Turns a command into scan targets. Archives and containers are loaded
/// here; a failure to load one is recorded in `errors` and yields no target.
fn build_targets(command: Commands, config: &Config, errors: &mut Vec<String>) -> Vec<Target> {
    let mut targets = Vec::new();

    match command {
        Commands::Files { dirs } => {
            for dir in dirs {
                let fs = DirFs::new(&dir);
                targets.push(Target::new(format!("files {}", dir.display()), move |db| {
                    Finding::Files(scan_files(&fs, ".", db))
                }));
            }
        }
        Commands::Packages { root } => {
            let fs = DirFs::new(&root);
            targets.push(Target::new(
                format!("packages {}", root.display()),
                move |db| Finding::Packages(scan_packages(&fs, db)),
            ));
        }
        Commands::Npm { projects } => {
            for project in projects {
                let fs = DirFs::new(&project);
                targets.push(Target::new(format!("npm {}", project.display()), move |db| {
                    Finding::Packages(scan_npm_project(&fs, ".", db))
                }));
            }
        }
        Commands::ArchiveFiles { archive, paths } => {
            if let Some(fs) = load_archive(&archive, errors) {
                push_file_targets(&mut targets, fs, &archive.display().to_string(), paths);
            }
        }
        Commands::ArchivePackages { archive } => {
            if let Some(fs) = load_archive(&archive, errors) {
                targets.push(Target::new(
                    format!("packages {}", archive.display()),
                    move |db| Finding::Packages(scan_packages(fs.as_ref(), db)),
                ));
            }
        }
        Commands::DockerFiles { container, paths } => {
            if let Some(fs) = load_container(&config.docker_command, &container, errors) {
                push_file_targets(&mut targets, fs, &container, paths);
            }
        }
        Commands::DockerPackages { container } => {
            if let Some(fs) = load_container(&config.docker_command, &container, errors) {
                targets.push(Target::new(format!("packages {}", container), move |db| {
                    Finding::Packages(scan_packages(fs.as_ref(), db))
                }));
            }
        }
        Commands::DockerNpm {
            container,
            projects,
        } => {
            if let Some(fs) = load_container(&config.docker_command, &container, errors) {
                for project in projects {
                    let fs = Arc::clone(&fs);
                    targets.push(Target::new(
                        format!("npm {}:{}", container, project),
                        move |db| Finding::Packages(scan_npm_project(fs.as_ref(), &project, db)),
                    ));
                }
            }
        }
        Commands::Managers { .. } | Commands::Config { .. } => {}
    }

    targets
}

fn push_file_targets(
    targets: &mut Vec<Target>,
    fs: Arc<ArchiveFs>,
    origin: &str,
    paths: Vec<String>,
) {
    for path in paths {
        let fs = Arc::clone(&fs);
        let root = clean_path(&path);
        targets.push(Target::new(format!("files {}:{}", origin, path), move |db| {
            Finding::Files(scan_files(fs.as_ref(), &root, db))
        }));
    }
}

fn load_archive(path: &Path, errors: &mut Vec<String>) -> Option<Arc<ArchiveFs>> {
    match ArchiveFs::open_path(path) {
        Ok(fs) => Some(Arc::new(fs)),
        Err(e) => {
            errors.push(format!("archive {}: {}", path.display(), e));
            None
        }
    }
}

fn load_container(command: &str, container: &str, errors: &mut Vec<String>) -> Option<Arc<ArchiveFs>> {
    match open_container(command, container) {
        Ok(fs) => Some(Arc::new(fs)),
        Err(e) => {
            errors.push(format!("container {}: {}", container, e));
            None
        }
    }
}

fn spinner(len: usize, is_interactive: bool) -> Option<ProgressBar> {
    if !is_interactive {
        return None;
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

/// Scan all targets concurrently on the blocking thread pool
async fn scan_concurrent(
    targets: Vec<Target>,
    database: Arc<AdvisoryDatabase>,
    is_interactive: bool,
) -> Vec<(String, Finding)> {
    let progress = spinner(targets.len(), is_interactive).map(Arc::new);
    if let Some(ref pb) = progress {
        pb.set_message("Scanning targets...");
    }

    let futures: Vec<_> = targets
        .into_iter()
        .map(|target| {
            let db = Arc::clone(&database);
            let pb = progress.clone();
            async move {
                let Target { label, run } = target;
                debug!(scan = %label, "starting scan");
                let result = tokio::task::spawn_blocking(move || run(&db)).await;
                if let Some(ref pb) = pb {
                    pb.inc(1);
                }
                (label, result)
            }
        })
        .collect();

    // Joined in target order
    let results = join_all(futures).await;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    results
        .into_iter()
        .map(|(label, result)| {
            let finding = result.unwrap_or_else(|e| Finding::Aborted(e.to_string()));
            (label, finding)
        })
        .collect()
}

/// Scan targets one after another
fn scan_sequential(
    targets: Vec<Target>,
    database: &AdvisoryDatabase,
    is_interactive: bool,
) -> Vec<(String, Finding)> {
    let progress = spinner(targets.len(), is_interactive);
    let mut findings = Vec::new();

    for Target { label, run } in targets {
        if let Some(ref pb) = progress {
            pb.set_message(format!("Scanning {}...", label));
        }
        debug!(scan = %label, "starting scan");
        findings.push((label, run(database)));
        if let Some(ref pb) = progress {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    findings
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
        } else {
            let config = Config::default();
            config.save()?;
            println!("Created config file at: {}", config_path.display());
        }
        return Ok(());
    }

    // Show current config
    println!("Config file: {}", config_path.display());
    println!();
    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("{}", content);
    } else {
        println!("No config file found. Using defaults:");
        println!();
        println!("{}", Config::generate_default_config());
    }

    Ok(())
}
