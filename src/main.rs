use clap::{Parser, Subcommand};
use manual_pipeline::{
    assemble, config, manifest, naming, output, registry, site, translate, verify,
};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn version_string() -> &'static str {
    let hash = env!("MANUAL_PIPELINE_GIT_HASH");
    if hash.is_empty() {
        env!("CARGO_PKG_VERSION")
    } else {
        // Leaked once at startup
        Box::leak(format!("{}@{hash}", env!("CARGO_PKG_VERSION")).into_boxed_str())
    }
}

#[derive(Parser)]
#[command(name = "manual-pipeline")]
#[command(about = "Build pipeline and static viewer for bilingual product manuals")]
#[command(long_about = "\
Build pipeline and static viewer for bilingual product manuals

Turns extracted PDF text and rendered page images into the JSON data a
paginated English/Japanese manual viewer reads, and renders that viewer as a
static site.

Pipeline (each stage reads the previous stage's output):

  translate   data/extracted/part-NN.txt        → data/translations-draft/part-NN.json
  build       data/translations-draft/*.json     → data/translations/part-NN.json
  manifest    data/translations/part-NN.json     → data/translations/manifest.json
  verify      manifest + parts + page images     → report (exit 1 on errors)
              --drafts: drafts vs. their source text

Viewer:

  resolve     look up one page the way the viewer does
  site        render public/manuals/<id>/data/ into static HTML

Paths and settings come from pipeline.toml (all keys optional).
Run 'manual-pipeline gen-config' to print a documented stock file.")]
#[command(version = version_string())]
struct Cli {
    /// Pipeline config file (missing file = stock defaults)
    #[arg(long, default_value = "pipeline.toml", global = true)]
    config: PathBuf,

    /// Show debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Translate extracted part text into drafts via the model API
    Translate {
        /// Retranslate every part, even when its draft is up to date
        #[arg(long)]
        no_cache: bool,
    },
    /// Split drafts into per-page part files
    Build,
    /// Index part files into manifest.json
    Manifest,
    /// Check manifest, part files and page images for consistency
    Verify {
        /// Check translation drafts against their source text instead
        #[arg(long)]
        drafts: bool,
    },
    /// Resolve a viewer route to a page
    Resolve {
        /// Manual id (directory name under the manuals root)
        manual: String,
        /// Page number as it appears in the route
        page: String,
    },
    /// Render the static viewer site
    Site {
        /// Root holding <id>/data/manifest.json for each manual
        #[arg(long)]
        manuals: Option<PathBuf>,
        /// Output directory
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print a stock pipeline.toml with all options documented
    GenConfig,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&cli).and_then(|()| run(cli)) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let load_config = || config::load_config(&cli.config);

    match cli.command {
        Command::Translate { no_cache } => {
            let config = load_config()?;
            println!("==> Translating {}", config.paths.extracted.display());
            let summary = translate::translate(&config, !no_cache)?;
            output::print_translate_summary(&summary);
        }
        Command::Build => {
            let config = load_config()?;
            println!("==> Building parts from {}", config.paths.drafts.display());
            let summary = assemble::build(
                &config.paths.drafts,
                &config.paths.translations,
                &assemble::PartSettings::from_config(&config),
            )?;
            output::print_build_summary(&summary);
            if !summary.is_success() {
                std::process::exit(1);
            }
        }
        Command::Manifest => {
            let config = load_config()?;
            let dir = &config.paths.translations;
            let manifest = manifest::create_manifest(
                dir,
                &manifest::ManifestSettings::from_config(&config),
            )?;
            output::print_manifest(&manifest, &dir.join(naming::MANIFEST_FILE));
        }
        Command::Verify { drafts } => {
            let config = load_config()?;
            let report = if drafts {
                verify::verify_drafts(&config.paths.drafts)
            } else {
                verify::verify(&verify::VerifySettings::new(
                    &config.paths.translations,
                    &config.paths.images,
                    &config.images,
                ))
            };
            output::print_verify_report(&report);
            if !report.is_ok() {
                std::process::exit(1);
            }
        }
        Command::Resolve { manual, page } => {
            let config = load_config()?;
            let registry = registry::Registry::discover(&config.site.manuals_root)?;
            match registry.resolve(&manual, &page) {
                Ok(found) => output::print_resolved(&manual, found),
                Err(reason) => {
                    output::print_not_found(&reason);
                    std::process::exit(1);
                }
            }
        }
        Command::Site { manuals, output: out } => {
            let config = load_config()?;
            let root = manuals.unwrap_or_else(|| config.site.manuals_root.clone());
            let out = out.unwrap_or_else(|| config.site.output.clone());
            println!("==> Rendering {} → {}", root.display(), out.display());
            let registry = registry::Registry::discover(&root)?;
            let summary = site::generate(&registry, &out)?;
            output::print_site_summary(&summary, &out);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Diagnostics go to stderr so stage reports on stdout stay clean.
fn init_logging(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
