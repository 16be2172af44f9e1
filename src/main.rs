use bridgelink_site::{config, generate, output, process, scan};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Shared flags for commands that process images.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Disable the processing cache and re-identify every image
    #[arg(long)]
    no_cache: bool,
}

#[derive(Parser)]
#[command(name = "bridgelink-site")]
#[command(about = "Static site generator for the Bridgelink Mineral Consultants website")]
#[command(long_about = "\
Static site generator for the Bridgelink Mineral Consultants website

Builds one English and one French page from a content directory. Sections
marked priority are part of the page itself; every other section is written
as a fragment that the page loads after it has painted, and images wait until
they come near the viewport.

Content structure:

  content/
  ├── config.toml                  # Site config (optional)
  ├── site.toml                    # Page-wide strings, [en] and [fr]
  ├── sections/
  │   ├── 010-header.toml          # NNN- prefix = document order
  │   ├── 020-hero.toml            # priority = true → rendered inline
  │   ├── 030-about.toml           # kind = \"about\", [en] and [fr] records
  │   └── notes.toml               # No number prefix = draft, skipped
  └── assets/images/               # Referenced as /assets/images/<name>

Run 'bridgelink-site gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Content directory
    #[arg(long, default_value = "content", global = true)]
    source: PathBuf,

    /// Output directory
    #[arg(long, default_value = "dist", global = true)]
    output: PathBuf,

    /// Directory for intermediate files (manifest, processed images)
    #[arg(long, default_value = ".bridgelink-temp", global = true)]
    temp_dir: PathBuf,

    /// Log loader and cache decisions (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the content directory into a manifest
    Scan,
    /// Identify and fingerprint images
    Process(CacheArgs),
    /// Produce the localized pages and section fragments
    Generate,
    /// Run the full pipeline: scan → process → generate
    Build(CacheArgs),
    /// Build into the temp directory and report unavailable sections and broken images
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Scan => {
            let manifest = scan::scan(&cli.source)?;
            write_scan_manifest(&manifest, &cli.temp_dir)?;
            output::print_scan_output(&manifest, &cli.source);
        }
        Command::Process(cache_args) => {
            let scan_manifest_path = cli.temp_dir.join("manifest.json");
            let manifest_content = std::fs::read_to_string(&scan_manifest_path)?;
            let input_manifest: serde_json::Value = serde_json::from_str(&manifest_content)?;
            let site_config: config::SiteConfig =
                serde_json::from_value(input_manifest.get("config").cloned().unwrap_or_default())?;
            init_thread_pool(&site_config.processing);
            run_process(
                &scan_manifest_path,
                &cli.source,
                &cli.temp_dir.join("processed"),
                !cache_args.no_cache,
            )?;
        }
        Command::Generate => {
            let processed_dir = cli.temp_dir.join("processed");
            let report = generate::generate(
                &processed_dir.join("manifest.json"),
                &processed_dir,
                &cli.output,
            )?;
            output::print_generate_output(&report);
        }
        Command::Build(cache_args) => {
            println!("==> Stage 1: Scanning {}", cli.source.display());
            let manifest = scan::scan(&cli.source)?;
            let scan_manifest_path = write_scan_manifest(&manifest, &cli.temp_dir)?;
            output::print_scan_output(&manifest, &cli.source);

            println!("==> Stage 2: Processing images");
            init_thread_pool(&manifest.config.processing);
            let processed_dir = cli.temp_dir.join("processed");
            run_process(
                &scan_manifest_path,
                &cli.source,
                &processed_dir,
                !cache_args.no_cache,
            )?;

            println!("==> Stage 3: Generating HTML → {}", cli.output.display());
            let report = generate::generate(
                &processed_dir.join("manifest.json"),
                &processed_dir,
                &cli.output,
            )?;
            output::print_generate_output(&report);

            println!("==> Build complete: {}", cli.output.display());
        }
        Command::Check => {
            println!("==> Checking {}", cli.source.display());
            let manifest = scan::scan(&cli.source)?;
            output::print_scan_output(&manifest, &cli.source);

            let work = cli.temp_dir.join("check");
            let scan_manifest_path = write_scan_manifest(&manifest, &work)?;
            init_thread_pool(&manifest.config.processing);
            let processed_dir = work.join("processed");
            let processed = run_process(&scan_manifest_path, &cli.source, &processed_dir, true)?;

            let dist = work.join("dist");
            let report = generate::generate(
                &processed_dir.join("manifest.json"),
                &processed_dir,
                &dist,
            )?;
            let broken = generate::verify_images(&dist, &processed)?;

            if !report.failures().is_empty() || !broken.is_empty() {
                output::print_check_output(&report, &broken);
                return Err("content check failed".into());
            }
            println!("==> Content is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr so progress output on stdout stays clean.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "bridgelink_site=debug"
    } else {
        "bridgelink_site=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn write_scan_manifest(
    manifest: &scan::Manifest,
    dir: &Path,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join("manifest.json");
    let json = serde_json::to_string_pretty(manifest)?;
    std::fs::write(&path, json)?;
    Ok(path)
}

/// Run the process stage with a printer thread and write its manifest.
fn run_process(
    scan_manifest_path: &Path,
    source: &Path,
    processed_dir: &Path,
    use_cache: bool,
) -> Result<process::ProcessedManifest, Box<dyn std::error::Error>> {
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_process_event(&event) {
                println!("{}", line);
            }
        }
    });
    let result = process::process(scan_manifest_path, source, processed_dir, use_cache, Some(tx));
    printer
        .join()
        .map_err(|_| "progress printer thread panicked")?;
    let result = result?;

    let json = serde_json::to_string_pretty(&result.manifest)?;
    std::fs::write(processed_dir.join("manifest.json"), &json)?;
    println!("Cache: {}", result.cache_stats);
    Ok(result.manifest)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
