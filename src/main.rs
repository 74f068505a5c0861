use ai_news_digest::browser::{BrowserRenderer, PageRenderer};
use ai_news_digest::config::{ConfigManager, FileConfigManager};
use ai_news_digest::crawlers::CrawlContext;
use ai_news_digest::fetcher::HttpFetcher;
use ai_news_digest::manifest::Manifest;
use ai_news_digest::nlp::Digester;
use ai_news_digest::sources::{parse_category_list, Catalog};
use ai_news_digest::{Config, DigestReport, ReportWriter, SiteProcessor};
use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use console::style;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Collects AI and Web3 articles and writes bilingual summaries")]
struct Cli {
    #[arg(short, long, env = "DIGEST_CONFIG", default_value = "config.toml", global = true,
        help = "Path to the TOML configuration, created with defaults if missing")]
    config: PathBuf,

    #[arg(short, long, default_value_t = false, global = true, help = "Debug logging")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl the selected categories and write a digest report
    Crawl {
        #[arg(long, value_delimiter = ',', help = "Comma-separated categories, e.g. ai,arxiv")]
        categories: Vec<String>,

        #[arg(short, long, help = "Output directory, overrides the config")]
        output: Option<PathBuf>,
    },
    /// List the available categories and their sites
    Categories,
    /// Check that every line of a requirements manifest is well formed
    CheckManifest {
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match cli.command {
        Command::Crawl { categories, output } => crawl(&cli.config, categories, output).await,
        Command::Categories => list_categories(&cli.config).await,
        Command::CheckManifest { path } => check_manifest(&path),
    }
}

async fn load_config(path: &Path) -> anyhow::Result<Config> {
    FileConfigManager::new(path.to_path_buf())
        .load_config()
        .await
        .map_err(|e| anyhow!(e))
        .with_context(|| format!("loading {}", path.display()))
}

fn catalog_for(config: &Config) -> anyhow::Result<Catalog> {
    Ok(Catalog::builtin()
        .map_err(|e| anyhow!(e))?
        .with_custom_sites(&config.sites))
}

async fn crawl(config_path: &Path, categories: Vec<String>, output: Option<PathBuf>) -> anyhow::Result<()> {
    let mut config = load_config(config_path).await?;
    if let Some(dir) = output {
        config.output.directory = dir;
    }
    let catalog = catalog_for(&config)?;

    let requested = if !categories.is_empty() {
        categories
    } else if !config.crawl.categories.is_empty() {
        config.crawl.categories.clone()
    } else {
        prompt_for_categories(&catalog)?
    };

    let selection = catalog.select(&requested);
    for unknown in &selection.unknown {
        println!("{} unknown category '{}'", style("warning:").yellow().bold(), unknown);
    }
    if selection.sites.is_empty() {
        bail!("no sites selected, available categories: {}", catalog.category_names().join(", "));
    }

    tracing::info!("Starting crawl of {} sites", selection.sites.len());

    let fetcher = HttpFetcher::new(&config).map_err(|e| anyhow!(e))?;
    let needs_browser = config.browser.enabled && selection.sites.iter().any(|(_, site)| site.needs_js);
    let browser = if needs_browser {
        match BrowserRenderer::launch(&config).await {
            Ok(browser) => Some(Arc::new(browser)),
            Err(e) => {
                tracing::warn!("Browser unavailable, JavaScript sites will be fetched over HTTP: {}", e);
                None
            }
        }
    } else {
        None
    };
    let renderer = browser.clone().map(|b| b as Arc<dyn PageRenderer>);

    let digester = Digester::from_config(&config, fetcher.client().clone()).map_err(|e| anyhow!(e))?;
    let context = Arc::new(CrawlContext::new(fetcher, renderer).map_err(|e| anyhow!(e))?);
    let processor = SiteProcessor::new(context, Arc::new(digester), &config.crawl);

    let articles = processor.process_all(&selection.sites).await;
    drop(processor);

    if let Some(browser) = browser {
        if let Err(e) = browser.shutdown_shared().await {
            tracing::warn!("Browser shutdown failed: {}", e);
        }
    }

    let report = DigestReport::new(articles);
    let writer = ReportWriter::new(&config.output).map_err(|e| anyhow!(e))?;
    let path = writer.write(&report).await.map_err(|e| anyhow!(e))?;

    println!();
    println!(
        "{} {} articles from {} sites",
        style("Done:").green().bold(),
        report.articles.len(),
        selection.sites.len()
    );
    for article in &report.articles {
        println!("  {} {}", style(format!("[{}]", article.site)).cyan(), article.title);
    }
    println!("Report written to {}", style(path.display()).bold());
    Ok(())
}

fn prompt_for_categories(catalog: &Catalog) -> anyhow::Result<Vec<String>> {
    println!("{}", style("Available categories:").bold());
    for name in catalog.category_names() {
        let count = catalog.sites(name).map_or(0, |sites| sites.len());
        println!("  {} ({} sites)", style(name).cyan(), count);
    }
    print!("Categories to crawl (comma separated): ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let categories = parse_category_list(&line);
    if categories.is_empty() {
        bail!("no categories entered");
    }
    Ok(categories)
}

async fn list_categories(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path).await?;
    let catalog = catalog_for(&config)?;

    for name in catalog.category_names() {
        println!("{}", style(name).cyan().bold());
        for (site_name, site) in catalog.sites(name).unwrap_or_default() {
            println!("  {:<28} {:?} {}", site_name, site.kind, style(&site.url).dim());
        }
    }
    Ok(())
}

fn check_manifest(path: &Path) -> anyhow::Result<()> {
    match Manifest::read(path).map_err(|e| anyhow!(e))? {
        Ok(manifest) => {
            for name in manifest.duplicates() {
                println!("{} '{}' is listed more than once", style("warning:").yellow().bold(), name);
            }
            println!(
                "{} {} requirements ({} pinned) in {}",
                style("ok:").green().bold(),
                manifest.requirements().count(),
                manifest.pinned().count(),
                path.display()
            );
            Ok(())
        }
        Err(errors) => {
            for error in &errors {
                println!("{} {}", style("error:").red().bold(), error);
            }
            bail!("{} invalid lines in {}", errors.len(), path.display())
        }
    }
}
