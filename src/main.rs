use clap::{Parser, Subcommand};
use plc_builder::cache::FileCacheStore;
use plc_builder::catalog::Catalog;
use plc_builder::client::OpenAiClient;
use plc_builder::config::{self, BuilderConfig};
use plc_builder::content::FileContentStore;
use plc_builder::orchestrator::{self, Orchestrator, RunSummary};
use plc_builder::{output, render, sitemap};
use std::error::Error;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "plc")]
#[command(about = "Builds the programming language comparison site")]
#[command(long_about = "\
Builds the programming language comparison site

Every page explains one concept in one language. The text is generated once
per (language, concept) pair from a prompt template and cached; a changed
template regenerates only that concept.

Project layout:

  .
  ├── plc.toml                          # Builder settings (optional)
  ├── data/
  │   ├── prog_langs.yaml               # Programming Languages: [Go, Rust 1.55, ...]
  │   └── prog_lang_concepts.yaml       # Category → Concept → prompt with {lang}
  ├── .cache/<lang>.json                # What was generated, from which prompt
  └── docs/
      ├── content-autogen/<model>/      # Generated markdown, one document per language
      ├── concepts/<lang>/<concept>.html
      ├── index.html
      └── sitemap.xml

The API key is read from OPENAI_API_KEY (see [generation] api_key_env).

Run 'plc gen-config' to generate a documented plc.toml.")]
#[command(version)]
struct Cli {
    /// Project root; relative paths in the settings resolve against it
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Settings file to use instead of <root>/plc.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Number of concurrent generation calls
    #[arg(long, global = true)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Generate missing or stale content through the text-generation service
    Generate,
    /// Render HTML pages from the generated content
    Render,
    /// Write sitemap.xml for the rendered site
    Sitemap,
    /// Run the full pipeline: generate → render → sitemap (default)
    Build,
    /// Validate the data documents and list pending work without calling the service
    Check,
    /// Print a stock plc.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command.as_ref().unwrap_or(&Command::Build) {
        Command::Generate => {
            let (config, catalog) = load(&cli)?;
            let summary = run_generate(&config, &catalog)?;
            fail_on_persistence(&summary)?;
        }
        Command::Render => {
            let (config, catalog) = load(&cli)?;
            run_render(&config, &catalog)?;
        }
        Command::Sitemap => {
            let (config, _) = load(&cli)?;
            run_sitemap(&config)?;
        }
        Command::Build => {
            let (config, catalog) = load(&cli)?;
            println!("==> Stage 1: Generating content ({})", config.generation.model);
            let summary = run_generate(&config, &catalog)?;

            println!(
                "==> Stage 2: Rendering pages → {}",
                config.paths.site_dir.display()
            );
            run_render(&config, &catalog)?;

            println!("==> Stage 3: Writing sitemap");
            run_sitemap(&config)?;

            fail_on_persistence(&summary)?;
            println!("==> Build complete: {}", config.paths.site_dir.display());
        }
        Command::Check => {
            println!("==> Checking {}", cli.root.display());
            let (config, catalog) = load(&cli)?;
            let cache_store = FileCacheStore::new(&config.paths.cache_dir);
            let content_store = content_store(&config);
            let plans = orchestrator::plan(&catalog, &cache_store, &content_store);
            let orphans = content_store.orphaned(&catalog.languages);
            output::print_check_output(&catalog, &plans, &orphans);

            let missing = sitemap::verify(&config.paths.site_dir, &config.site.base_url)?;
            output::print_missing_pages(&missing);
            if !missing.is_empty() {
                return Err(format!("{} sitemap URL(s) have no page", missing.len()).into());
            }
            println!("==> Data documents are valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load settings and the catalog, applying CLI overrides.
fn load(cli: &Cli) -> Result<(BuilderConfig, Catalog), Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => config::load_config_file(path)?,
        None => config::load_config(&cli.root)?,
    };
    if let Some(workers) = cli.workers {
        if workers == 0 {
            return Err("--workers must be at least 1".into());
        }
        config.processing.workers = workers;
    }
    config.paths = config.paths.resolve(&cli.root);
    let catalog = Catalog::load(&config.paths)?;
    Ok((config, catalog))
}

fn content_store(config: &BuilderConfig) -> FileContentStore {
    FileContentStore::for_model(&config.paths.content_dir, &config.generation.model)
}

fn run_generate(config: &BuilderConfig, catalog: &Catalog) -> Result<RunSummary, Box<dyn Error>> {
    let client = OpenAiClient::from_env(&config.generation)?;
    let cache_store = FileCacheStore::new(&config.paths.cache_dir);
    let content_store = content_store(config);

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_generate_event(&event) {
                println!("{}", line);
            }
        }
    });
    // The orchestrator owns the sender; dropping it closes the channel.
    let result = Orchestrator::new(&client, &cache_store, &content_store, config)
        .with_events(tx)
        .run(catalog);
    printer.join().map_err(|_| "output thread panicked")?;

    let summary = result?;
    output::print_run_summary(&summary);
    Ok(summary)
}

fn run_render(config: &BuilderConfig, catalog: &Catalog) -> Result<(), Box<dyn Error>> {
    let content_store = content_store(config);
    let summary = render::render(
        catalog,
        &content_store,
        &config.site,
        &config.paths.site_dir,
    )?;
    output::print_render_summary(&summary, &config.paths.site_dir);
    Ok(())
}

fn run_sitemap(config: &BuilderConfig) -> Result<(), Box<dyn Error>> {
    let site_dir: &Path = &config.paths.site_dir;
    let entries = sitemap::write(site_dir, &config.site.base_url)?;
    output::print_sitemap_output(&entries, &site_dir.join(sitemap::SITEMAP_FILENAME));
    Ok(())
}

fn fail_on_persistence(summary: &RunSummary) -> Result<(), Box<dyn Error>> {
    if summary.has_persistence_failures() {
        return Err("some languages could not be saved; see the summary above".into());
    }
    Ok(())
}
