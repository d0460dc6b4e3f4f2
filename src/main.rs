//! # Astro Context CLI (`actx`)
//!
//! The `actx` binary drives the engine from the command line: it segments the
//! configured reference document, and answers rule-context, placement,
//! personality, and keyword queries against it.
//!
//! ## Usage
//!
//! ```bash
//! actx --config ./config/actx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `actx chunks` | List the segmented chunks, optionally for one section |
//! | `actx stats` | Summarize the knowledge base and rule store |
//! | `actx context <category>` | Context for a category question, optionally anchored on a rule reference |
//! | `actx placement <planet>` | Chunks interpreting one planet in a sign and house |
//! | `actx personality <planet:sign:house>...` | Bounded personality context for a chart |
//! | `actx questions [category]` | List rule questions |
//! | `actx search [keywords...]` | Keyword search over sections |
//! | `actx rule <id>` | A rule record and its best-ranked chunks |
//!
//! Logs go to stderr. Set `RUST_LOG` or pass `-v` for more detail.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use astro_context::commands;
use astro_context::config;
use astro_context::engine::Engine;
use astro_context::search::SearchRequest;
use astro_context::stats;

/// Astro Context CLI: compile a reference text into labeled chunks and
/// retrieve bounded context for rule questions and chart placements.
#[derive(Parser)]
#[command(
    name = "actx",
    about = "Astro Context - rule and placement context retrieval over a reference text",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/actx.toml`. Source paths can be overridden with
    /// the `ACTX_DOCUMENT` and `ACTX_RULES` environment variables.
    #[arg(long, global = true, default_value = "./config/actx.toml")]
    config: PathBuf,

    /// Log engine activity at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List segmented chunks in document order.
    Chunks {
        /// Only chunks of this section key (e.g. `planetary_rules`).
        #[arg(long)]
        section: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Show knowledge base and rule store statistics.
    Stats,

    /// Resolve the context for a category question.
    ///
    /// With `--rule-ref`, the matching rule record's planets, houses,
    /// transits and page hints are matched first.
    Context {
        category: String,

        #[arg(long)]
        rule_ref: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Chunks interpreting one planet placement.
    Placement {
        /// Planet name or synonym (e.g. `sun`, `surya`).
        planet: String,

        /// Sign name or synonym (e.g. `aries`, `mesha`).
        #[arg(long)]
        sign: Option<String>,

        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=12))]
        house: Option<u8>,

        #[arg(long)]
        json: bool,
    },

    /// Build a personality context from several placements.
    Personality {
        /// Placements as `planet[:sign[:house]]`.
        placements: Vec<String>,

        /// JSON chart: `{"planets": [{"planet": "sun", "sign": "aries", "house": 5}]}`.
        #[arg(long)]
        profile: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// List rule questions, optionally for one category.
    Questions {
        category: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Keyword search over the knowledge base.
    Search {
        keywords: Vec<String>,

        /// Section key, or a word matched against section labels, anchors and keywords.
        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        rule_ref: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Show a rule record and the chunks that best match its tags.
    Rule {
        id: String,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "astro_context=debug"
    } else {
        "astro_context=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;
    let engine = Engine::from_config(&cfg);

    match cli.command {
        Commands::Chunks { section, json } => {
            commands::run_chunks(&engine, section.as_deref(), json).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg, &engine).await?;
        }
        Commands::Context {
            category,
            rule_ref,
            json,
        } => {
            commands::run_context(&engine, &category, rule_ref.as_deref(), json).await?;
        }
        Commands::Placement {
            planet,
            sign,
            house,
            json,
        } => {
            commands::run_placement(&engine, &planet, sign.as_deref(), house, json).await?;
        }
        Commands::Personality {
            placements,
            profile,
            json,
        } => {
            commands::run_personality(&engine, &placements, profile.as_deref(), json).await?;
        }
        Commands::Questions { category, json } => {
            commands::run_questions(&engine, category.as_deref(), json).await?;
        }
        Commands::Search {
            keywords,
            category,
            rule_ref,
            json,
        } => {
            let request = SearchRequest {
                category,
                rule_ref,
                keywords,
            };
            commands::run_search(&engine, &request, json).await?;
        }
        Commands::Rule { id, limit, json } => {
            commands::run_rule(&engine, &id, limit, json).await?;
        }
    }

    Ok(())
}
