//! CLI entry point for the knowledge-base search engine.
//!
//! Provides commands for indexing a document corpus, querying it, and
//! maintaining the stored index.

use anyhow::{Context, Result, anyhow, bail};
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use kbsearch::retrieve::{KnowledgeBase, QueryOptions, RetrievedPassage};
use kbsearch::vector::{ClusterOptions, DistanceMetric};
use kbsearch::{Document, Settings};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::Level;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Knowledge-base search
#[derive(Parser)]
#[command(
    name = "kbsearch",
    version = env!("CARGO_PKG_VERSION"),
    about = "Knowledge-base search",
    long_about = "Index help-center articles and retrieve the passages most relevant to a question.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true, env = "KB_CONFIG")]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Initialize project
    #[command(about = "Set up .kbsearch directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Fit the vocabulary and index a corpus
    #[command(
        about = "Build the index from a JSON array of documents",
        after_help = "Each document needs: id, title, content, category (section is optional).\n\nExample:\n  kbsearch index articles.json"
    )]
    Index {
        /// JSON file containing an array of documents
        corpus: PathBuf,
    },

    /// Query the knowledge base
    #[command(after_help = "Examples:\n  kbsearch search \"download invoice\"\n  kbsearch search \"reset password\" --category account --limit 3")]
    Search {
        query: String,

        /// Maximum number of passages
        #[arg(short, long)]
        limit: Option<usize>,

        /// Minimum similarity score (0.0 to 1.0)
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Only search this category
        #[arg(long)]
        category: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Passages similar to a stored passage
    Similar {
        id: String,

        #[arg(short, long, default_value = "5")]
        limit: usize,

        #[arg(long)]
        json: bool,
    },

    /// Show store statistics
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Group stored passages with k-means
    Cluster {
        /// Number of clusters
        #[arg(short, default_value = "5")]
        k: usize,

        #[arg(long, default_value = "100")]
        max_iterations: usize,

        /// Distance used for assignment: cosine, euclidean or manhattan
        #[arg(long, default_value = "cosine")]
        metric: DistanceMetric,
    },

    /// Remove orphaned records and rebuild indexes
    Optimize,

    /// Show current configuration settings
    #[command(about = "Display active settings from .kbsearch/settings.toml")]
    Config,
}

#[derive(Debug, Serialize)]
struct ClusterSummary {
    cluster: usize,
    size: usize,
    members: Vec<String>,
}

fn init_tracing(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let settings = match path {
        Some(path) => Settings::load_from(path).map_err(|e| {
            anyhow!(
                "Configuration error loading from {}: {e}",
                path.display()
            )
        })?,
        None => Settings::load().map_err(|e| anyhow!("Configuration error: {e}"))?,
    };
    Ok(settings)
}

fn read_corpus(path: &Path) -> Result<Vec<Document>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read corpus {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Corpus {} is not a JSON array of documents", path.display()))
}

fn print_passages(passages: &[RetrievedPassage], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(passages)?);
        return Ok(());
    }

    if passages.is_empty() {
        println!("No matching passages.");
        return Ok(());
    }

    for (rank, passage) in passages.iter().enumerate() {
        let category = passage.category.as_deref().unwrap_or("-");
        println!(
            "{}. {} [{category}] (score {:.3}, id {})",
            rank + 1,
            passage.title,
            passage.similarity,
            passage.id
        );
        println!("   {}", passage.snippet);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings(cli.config.as_deref())?;
    init_tracing(cli.verbose || settings.debug);

    match cli.command {
        Commands::Init { force } => {
            let path = Settings::init_config_file(".", force)
                .map_err(|e| anyhow!("{e}"))
                .context("Cannot create configuration file")?;
            println!("Created configuration file at: {}", path.display());
            println!("Edit this file to customize your settings.");
        }

        Commands::Config => {
            println!("Current Configuration:");
            println!("{}", "=".repeat(50));
            println!("{}", toml::to_string_pretty(&settings)?);
        }

        Commands::Index { corpus } => {
            let documents = read_corpus(&corpus)?;
            let start = Instant::now();

            // The explicit save below covers the whole build
            settings.store.auto_save = false;
            let kb = KnowledgeBase::build(&documents, settings)
                .context("Failed to build knowledge base")?;
            kb.save().context("Failed to save knowledge base")?;

            let stats = kb.stats();
            println!(
                "Indexed {} documents in {:.2}s ({} vocabulary terms, {} categories)",
                stats.count,
                start.elapsed().as_secs_f64(),
                kb.encoder().vocabulary().len(),
                stats.categories
            );
        }

        Commands::Search {
            query,
            limit,
            threshold,
            category,
            json,
        } => {
            let kb = KnowledgeBase::open(settings).context("Failed to open knowledge base")?;
            let mut options = QueryOptions::from_settings(&kb.settings().search);
            if let Some(limit) = limit {
                options = options.with_max_results(limit);
            }
            if let Some(threshold) = threshold {
                if !(0.0..=1.0).contains(&threshold) {
                    bail!("--threshold must be between 0.0 and 1.0");
                }
                options = options.with_min_similarity(threshold);
            }
            if let Some(category) = category {
                options = options.with_category(category);
            }

            let passages = kb.search(&query, &options)?;
            print_passages(&passages, json)?;
        }

        Commands::Similar { id, limit, json } => {
            let kb = KnowledgeBase::open(settings).context("Failed to open knowledge base")?;
            let passages = kb.similar(&id, limit)?;
            print_passages(&passages, json)?;
        }

        Commands::Stats { json } => {
            let kb = KnowledgeBase::open(settings).context("Failed to open knowledge base")?;
            let stats = kb.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Passages:          {}", stats.count);
                println!("Dimension:         {}", stats.dimension);
                println!("Capacity:          {}", stats.max_vectors);
                println!("Vocabulary terms:  {}", kb.encoder().vocabulary().len());
                println!("Categories:        {}", stats.categories);
                println!("Keywords:          {}", stats.keywords);
                println!("Memory (approx):   {} bytes", stats.memory_bytes);
                println!("Average magnitude: {:.4}", stats.average_magnitude);
            }
        }

        Commands::Cluster {
            k,
            max_iterations,
            metric,
        } => {
            let kb = KnowledgeBase::open(settings).context("Failed to open knowledge base")?;
            let options = ClusterOptions::new(k)
                .with_max_iterations(max_iterations)
                .with_metric(metric);
            let clusters = kb.store().cluster(options)?;

            let summaries: Vec<ClusterSummary> = clusters
                .into_iter()
                .enumerate()
                .map(|(cluster, c)| ClusterSummary {
                    cluster,
                    size: c.members.len(),
                    members: c.members.into_iter().collect(),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }

        Commands::Optimize => {
            let kb = KnowledgeBase::open(settings).context("Failed to open knowledge base")?;
            let report = kb.store().optimize();
            kb.store().save().context("Failed to save optimized store")?;
            println!(
                "Optimized: {} -> {} records ({} orphans removed)",
                report.before, report.after, report.removed_orphans
            );
        }
    }

    Ok(())
}
