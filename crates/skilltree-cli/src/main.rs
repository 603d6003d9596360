//! Skilltree CLI - concept dependency graphs and learning progress

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use skilltree_core::config::Config;
use skilltree_core::domain::concept::Concept;
use skilltree_core::domain::graph::{DependencyGraphEngine, ValidationReport};
use skilltree_core::domain::progress::{ProgressSnapshot, UserProgressProjector};
use skilltree_core::domain::proposal::{
    ConceptIngestService, IngestReport, LlmConceptExtractor, NotCommittedReason,
    PrerequisiteRuleSet, RelationshipOutcome, RelationshipProposalResolver,
};
use skilltree_core::infrastructure::graph::{SqliteGraphStore, SqliteProgressStore};
use skilltree_core::llm::LlmClient;
use skilltree_core::storage::Database;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Parser)]
#[command(name = "skilltree")]
#[command(author, version, about = "Concept dependency graphs and learning progress", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database file (defaults to SKILLTREE_DB, then the configured path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage concepts
    Concept {
        #[command(subcommand)]
        action: ConceptAction,
    },

    /// Manage prerequisite edges
    Edge {
        #[command(subcommand)]
        action: EdgeAction,
    },

    /// Show every transitive prerequisite of a concept
    Chain {
        /// Concept ID
        concept_id: String,
    },

    /// Show the study order leading to a concept
    Path {
        /// Concept ID
        concept_id: String,
    },

    /// Show the study order for a whole category
    LearnPath {
        /// Category name
        category: String,
    },

    /// Check a category for cycles and missing prerequisites, repairing difficulties
    Validate {
        /// Category name
        category: String,
    },

    /// Extract concepts from text and merge them into the graph
    Ingest {
        /// Text to extract from (reads --file or stdin if omitted)
        text: Option<String>,
        /// Read the text from a file
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
        /// Category hint
        #[arg(short, long)]
        category: Option<String>,
        /// Prerequisite rule file (TOML); the built-in math rules are used otherwise
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Skip prerequisite rules entirely
        #[arg(long, conflicts_with = "rules")]
        no_rules: bool,
    },

    /// Track a learner's progress
    Progress {
        /// User ID
        #[arg(short, long, global = true, default_value = "default")]
        user: String,
        #[command(subcommand)]
        action: ProgressAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run health check
    Doctor,
}

#[derive(Subcommand)]
enum ConceptAction {
    /// Add a concept
    Add {
        /// Concept title
        title: String,
        #[arg(short, long)]
        category: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        difficulty: u32,
        /// Prerequisite concept IDs
        #[arg(short, long = "prereq")]
        prerequisites: Vec<String>,
    },
    /// Show concept details
    Show { id: String },
    /// Change a concept's title or description (the ID is kept)
    Update {
        id: String,
        #[arg(short, long, required_unless_present = "description")]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List concepts
    List {
        #[arg(short, long)]
        category: Option<String>,
        /// Lowest difficulty to include
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        min: Option<u32>,
        /// Highest difficulty to include
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        max: Option<u32>,
    },
    /// Find concepts whose title or description mentions QUERY
    Search {
        query: String,
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Users who have started or completed a concept
    Learners { id: String },
    /// Show a category with resolved prerequisite titles
    Tree { category: String },
}

#[derive(Subcommand)]
enum EdgeAction {
    /// Require PREREQUISITE before CONCEPT
    Add {
        concept: String,
        prerequisite: String,
        #[arg(short, long)]
        reason: Option<String>,
    },
    /// Remove a prerequisite edge
    Remove { concept: String, prerequisite: String },
}

#[derive(Subcommand)]
enum ProgressAction {
    /// Concepts the user can start now
    Available {
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Concepts still waiting on prerequisites
    Blocked {
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Mark a concept as in progress
    Start { concept_id: String },
    /// Mark a concept as completed
    Complete { concept_id: String },
    /// Record progress as a percentage (0 clears, 100 completes)
    Set {
        concept_id: String,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: u8,
    },
    /// Clear a concept from the user's progress
    Reset { concept_id: String },
    /// Show progress statistics
    Stats,
    /// Export progress as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace progress with a JSON snapshot (`-` for stdin)
    Import { file: PathBuf },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

type Engine = DependencyGraphEngine<SqliteGraphStore>;
type Projector = UserProgressProjector<SqliteGraphStore, SqliteProgressStore>;

/// Stores and services over one open database
struct Workspace {
    db: Database,
    config: Config,
    engine: Arc<Engine>,
    projector: Projector,
}

impl Workspace {
    async fn open(db_path: Option<&Path>) -> anyhow::Result<Self> {
        let config = Config::load()?;
        let path = match db_path {
            Some(path) => path.to_path_buf(),
            None => config.storage.resolved_database_path()?,
        };
        debug!(path = %path.display(), "Opening database");

        let db = Database::open(&path).await?;
        let graph = Arc::new(SqliteGraphStore::new(db.pool().clone()));
        let progress = Arc::new(SqliteProgressStore::new(db.pool().clone()));

        Ok(Self {
            engine: Arc::new(DependencyGraphEngine::new(graph.clone(), config.graph.clone())),
            projector: UserProgressProjector::new(graph, progress, config.graph.clone()),
            db,
            config,
        })
    }
}

/// Printer honouring `--format` and `--quiet`
#[derive(Clone, Copy)]
struct Output {
    format: OutputFormat,
    quiet: bool,
}

impl Output {
    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Print `value` as JSON, or run `text` for text output
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce()) -> anyhow::Result<()> {
        if self.json() {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            text();
        }
        Ok(())
    }

    /// Like [`Self::emit`], but text output is suppressed by `--quiet`
    fn status<T: Serialize>(&self, value: &T, text: impl FnOnce()) -> anyhow::Result<()> {
        if self.json() {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else if !self.quiet {
            text();
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_directive = if cli.quiet {
        "skilltree=warn"
    } else {
        "skilltree=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<skilltree_core::Error>() {
        Some(e) => {
            eprintln!("Error [{}]: {}", e.code(), e);
            if let Some(suggestion) = e.suggestion() {
                eprintln!("  Try: {}", suggestion);
            }
        }
        None => eprintln!("Error: {:#}", err),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let out = Output {
        format: cli.format,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Config { action } => cmd_config(action, out),
        Commands::Doctor => cmd_doctor(cli.db.as_deref(), out).await,
        command => {
            let ws = Workspace::open(cli.db.as_deref()).await?;
            let result = dispatch(&ws, command, out).await;
            ws.db.close().await;
            result
        }
    }
}

async fn dispatch(ws: &Workspace, command: Commands, out: Output) -> anyhow::Result<()> {
    match command {
        Commands::Concept { action } => cmd_concept(ws, action, out).await,
        Commands::Edge { action } => cmd_edge(ws, action, out).await,
        Commands::Chain { concept_id } => cmd_chain(ws, &concept_id, out).await,
        Commands::Path { concept_id } => cmd_path(ws, &concept_id, out).await,
        Commands::LearnPath { category } => cmd_learn_path(ws, &category, out).await,
        Commands::Validate { category } => cmd_validate(ws, &category, out).await,
        Commands::Ingest {
            text,
            file,
            category,
            rules,
            no_rules,
        } => {
            let text = read_input(text, file.as_deref())?;
            let rules = load_rules(rules.as_deref(), no_rules)?;
            cmd_ingest(ws, &text, category.as_deref(), rules, out).await
        }
        Commands::Progress { user, action } => cmd_progress(ws, &user, action, out).await,
        Commands::Config { .. } | Commands::Doctor => Ok(()),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_concept(ws: &Workspace, action: ConceptAction, out: Output) -> anyhow::Result<()> {
    match action {
        ConceptAction::Add {
            title,
            category,
            description,
            difficulty,
            prerequisites,
        } => {
            let concept = Concept::new(&title, &category)
                .with_description(description)
                .with_difficulty(difficulty)
                .with_prerequisites(prerequisites);

            let (stored, created) = ws.engine.create_or_get(concept).await?;
            out.status(&json!({ "created": created, "concept": stored }), || {
                if created {
                    println!(
                        "Created concept '{}' ({}, difficulty {})",
                        stored.id, stored.category, stored.difficulty
                    );
                } else {
                    println!("Concept '{}' already exists; left unchanged.", stored.id);
                }
            })
        }
        ConceptAction::Show { id } => {
            let concept = ws.engine.concept(&id).await?;
            out.emit(&concept, || print_concept(&concept))
        }
        ConceptAction::Update {
            id,
            title,
            description,
        } => {
            let concept = ws
                .engine
                .update_concept(&id, title.as_deref(), description.as_deref())
                .await?;
            out.status(&concept, || println!("Updated concept '{}'.", concept.id))
        }
        ConceptAction::List { category, min, max } => {
            let concepts = ws
                .engine
                .concepts_in_range(category.as_deref(), min, max)
                .await?;
            out.emit(&concepts, || {
                if concepts.is_empty() {
                    println!("No concepts found.");
                    println!("\nAdd one with: skilltree concept add <title> --category <category>");
                    return;
                }
                for c in &concepts {
                    println!("  {} - {} [{}] (difficulty {})", c.id, c.title, c.category, c.difficulty);
                }
            })
        }
        ConceptAction::Search { query, category } => {
            let concepts = ws.engine.search_concepts(&query, category.as_deref()).await?;
            out.emit(&concepts, || {
                print_concept_list(&concepts, &format!("No concepts match '{}'.", query))
            })
        }
        ConceptAction::Learners { id } => {
            let learners = ws.projector.learners(&id).await?;
            out.emit(&learners, || {
                if learners.is_empty() {
                    println!("Nobody has started '{}' yet.", id);
                }
                for user in &learners {
                    println!("  {}", user);
                }
            })
        }
        ConceptAction::Tree { category } => {
            let tree = ws.engine.category_tree(&category).await?;
            out.emit(&tree, || {
                println!("{}:", category);
                for node in &tree {
                    println!("  {} (difficulty {})", node.concept.title, node.concept.difficulty);
                    for prerequisite in &node.prerequisites {
                        let label = prerequisite.title.as_deref().unwrap_or("(missing)");
                        println!("    <- {} [{}]", label, prerequisite.id);
                    }
                }
            })
        }
    }
}

async fn cmd_edge(ws: &Workspace, action: EdgeAction, out: Output) -> anyhow::Result<()> {
    match action {
        EdgeAction::Add {
            concept,
            prerequisite,
            reason,
        } => {
            let outcome = ws
                .engine
                .add_prerequisite_edge(&concept, &prerequisite, reason.as_deref())
                .await?;
            out.status(&outcome, || {
                if outcome.applied {
                    println!("'{}' now requires '{}'.", concept, prerequisite);
                } else {
                    println!("'{}' already requires '{}'.", concept, prerequisite);
                }
            })
        }
        EdgeAction::Remove {
            concept,
            prerequisite,
        } => {
            let removed = ws
                .engine
                .remove_prerequisite_edge(&concept, &prerequisite)
                .await?;
            out.status(&json!({ "removed": removed }), || {
                if removed {
                    println!("Removed '{}' from the prerequisites of '{}'.", prerequisite, concept);
                } else {
                    println!("'{}' did not require '{}'.", concept, prerequisite);
                }
            })
        }
    }
}

async fn cmd_chain(ws: &Workspace, concept_id: &str, out: Output) -> anyhow::Result<()> {
    let chain = ws.engine.dependency_chain(concept_id).await?;
    out.emit(&chain, || {
        if chain.is_empty() {
            println!("'{}' has no prerequisites.", concept_id);
        }
        for id in &chain {
            println!("  {}", id);
        }
    })
}

async fn cmd_path(ws: &Workspace, concept_id: &str, out: Output) -> anyhow::Result<()> {
    let path = ws.engine.learning_path_for(concept_id).await?;
    out.emit(&path, || {
        for (step, concept) in path.iter().enumerate() {
            println!("  {}. {} (difficulty {})", step + 1, concept.title, concept.difficulty);
        }
    })
}

async fn cmd_learn_path(ws: &Workspace, category: &str, out: Output) -> anyhow::Result<()> {
    let path = ws.engine.topological_learning_path(category).await?;
    out.emit(&path, || {
        if path.is_empty() {
            println!("No concepts in '{}'.", category);
        }
        for (step, id) in path.iter().enumerate() {
            println!("  {}. {}", step + 1, id);
        }
    })
}

async fn cmd_validate(ws: &Workspace, category: &str, out: Output) -> anyhow::Result<()> {
    let report = ws.engine.validate_category(category).await?;
    out.emit(&report, || print_validation(&report))
}

async fn cmd_ingest(
    ws: &Workspace,
    text: &str,
    category: Option<&str>,
    rules: Option<PrerequisiteRuleSet>,
    out: Output,
) -> anyhow::Result<()> {
    let client = LlmClient::from_env(ws.config.extraction.clone())?;
    let extractor = Arc::new(LlmConceptExtractor::new(client));

    let mut resolver = RelationshipProposalResolver::new(ws.engine.clone());
    if let Some(rules) = rules {
        debug!(rules = %rules.label(), "Using prerequisite rules");
        resolver = resolver.with_rules(Arc::new(rules));
    }
    let service = ConceptIngestService::new(extractor, resolver);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping after the current item");
            on_interrupt.cancel();
        }
    });

    let report = service.ingest(text, category, &cancel).await?;
    out.emit(&report, || print_ingest(&report, out.quiet))
}

async fn cmd_progress(
    ws: &Workspace,
    user: &str,
    action: ProgressAction,
    out: Output,
) -> anyhow::Result<()> {
    let projector = &ws.projector;
    match action {
        ProgressAction::Available { category } => {
            let concepts = projector.available(user, category.as_deref()).await?;
            out.emit(&concepts, || print_concept_list(&concepts, "Nothing available right now."))
        }
        ProgressAction::Blocked { category } => {
            let concepts = projector.blocked(user, category.as_deref()).await?;
            out.emit(&concepts, || print_concept_list(&concepts, "Nothing blocked."))
        }
        ProgressAction::Start { concept_id } => {
            let progress = projector.mark_started(user, &concept_id).await?;
            out.status(&ProgressSnapshot::from(&progress), || {
                println!("{} started '{}'.", user, concept_id);
            })
        }
        ProgressAction::Complete { concept_id } => {
            let progress = projector.mark_completed(user, &concept_id).await?;
            out.status(&ProgressSnapshot::from(&progress), || {
                println!("{} completed '{}'.", user, concept_id);
            })
        }
        ProgressAction::Set {
            concept_id,
            percent,
        } => {
            let progress = projector.record_percent(user, &concept_id, percent).await?;
            out.status(&ProgressSnapshot::from(&progress), || {
                println!("{} is {}% through '{}'.", user, percent, concept_id);
            })
        }
        ProgressAction::Reset { concept_id } => {
            let cleared = projector.reset_concept(user, &concept_id).await?;
            out.status(&json!({ "reset": cleared }), || {
                if cleared {
                    println!("Cleared '{}' for {}.", concept_id, user);
                } else {
                    println!("{} had no progress on '{}'.", user, concept_id);
                }
            })
        }
        ProgressAction::Stats => {
            let stats = projector.statistics(user).await?;
            out.emit(&stats, || {
                println!("Progress for {}", stats.user_id);
                println!(
                    "  {}% complete ({} of {} concepts)",
                    stats.percent_complete, stats.completed, stats.total_concepts
                );
                println!("  In progress: {}", stats.in_progress);
                println!("  Not started: {}", stats.not_started);
                for (category, c) in &stats.categories {
                    println!(
                        "  {}: {}/{} completed, {} in progress",
                        category, c.completed, c.total, c.in_progress
                    );
                }
            })
        }
        ProgressAction::Export { output } => {
            let json = projector.export_snapshot(user).await?.to_json()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &json)
                        .with_context(|| format!("Failed to write snapshot: {}", path.display()))?;
                    if !out.quiet {
                        eprintln!("Exported progress for {} to {}", user, path.display());
                    }
                }
                None => println!("{}", json),
            }
            Ok(())
        }
        ProgressAction::Import { file } => {
            let contents = if file.as_os_str() == "-" {
                read_stdin()?
            } else {
                std::fs::read_to_string(&file)
                    .with_context(|| format!("Failed to read snapshot: {}", file.display()))?
            };
            let snapshot = ProgressSnapshot::from_json(&contents)?;
            let progress = projector.import_snapshot(user, snapshot).await?;
            out.status(&ProgressSnapshot::from(&progress), || {
                println!(
                    "Imported progress for {}: {} completed, {} in progress.",
                    user,
                    progress.completed.len(),
                    progress.in_progress.len()
                );
            })
        }
    }
}

fn cmd_config(action: ConfigAction, out: Output) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !out.quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            if out.json() {
                let map: serde_json::Map<String, serde_json::Value> = items
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::String(v)))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&map)?);
            } else {
                for (key, value) in items {
                    println!("{} = {}", key, value);
                }
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !out.quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

async fn cmd_doctor(db_path: Option<&Path>, out: Output) -> anyhow::Result<()> {
    if !out.quiet {
        println!("Skilltree Health Check");
        println!("======================");
        println!();
    }

    let mut all_ok = true;

    match Config::load() {
        Ok(config) => {
            if !out.quiet {
                println!("[OK] Configuration: Valid");
            }
            match config.extraction.resolved_api_key() {
                Ok(Some(_)) => {
                    if !out.quiet {
                        let redacted = config.extraction.redacted_api_key()?.unwrap_or_default();
                        println!("[OK] API Key: Configured ({})", redacted);
                    }
                }
                Ok(None) => {
                    if !out.quiet {
                        println!("[--] API Key: Not configured (only needed for `skilltree ingest`)");
                    }
                }
                Err(e) => {
                    all_ok = false;
                    if !out.quiet {
                        println!("[!!] API Key: Error - {}", e);
                    }
                }
            }
        }
        Err(e) => {
            all_ok = false;
            if !out.quiet {
                println!("[!!] Configuration: Error - {:#}", e);
            }
        }
    }

    match Workspace::open(db_path).await {
        Ok(ws) => {
            match ws.db.health_check().await {
                Ok(()) => {
                    if !out.quiet {
                        println!("[OK] Database: Connected");
                        println!("     Path: {}", ws.db.path().display());
                    }
                    match ws.db.migration_status().await {
                        Ok(status) if status.needs_migration => {
                            all_ok = false;
                            if !out.quiet {
                                println!(
                                    "[!!] Database: Migrations pending (v{} -> v{})",
                                    status.current_version, status.target_version
                                );
                            }
                        }
                        Ok(status) => {
                            if !out.quiet {
                                println!("[OK] Database: Schema v{}", status.current_version);
                            }
                        }
                        Err(e) => {
                            all_ok = false;
                            if !out.quiet {
                                println!("[!!] Database: Migration check failed - {}", e);
                            }
                        }
                    }
                    let concepts = ws.engine.concepts(None).await.map(|c| c.len()).unwrap_or(0);
                    let categories = ws.engine.categories().await.map(|c| c.len()).unwrap_or(0);
                    if !out.quiet {
                        println!("     Concepts: {} in {} categories", concepts, categories);
                    }
                }
                Err(e) => {
                    all_ok = false;
                    if !out.quiet {
                        println!("[!!] Database: Health check failed - {}", e);
                    }
                }
            }
            ws.db.close().await;
        }
        Err(e) => {
            all_ok = false;
            if !out.quiet {
                println!("[!!] Database: Failed to open - {:#}", e);
            }
        }
    }

    if !out.quiet {
        println!();
        if all_ok {
            println!("All checks passed!");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }

    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn read_input(text: Option<String>, file: Option<&Path>) -> anyhow::Result<String> {
    match (text, file) {
        (Some(text), _) => Ok(text),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {}", path.display())),
        (None, None) => read_stdin(),
    }
}

fn read_stdin() -> anyhow::Result<String> {
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read stdin")?;
    Ok(buffer)
}

fn load_rules(path: Option<&Path>, disabled: bool) -> anyhow::Result<Option<PrerequisiteRuleSet>> {
    if disabled {
        return Ok(None);
    }
    let rules = match path {
        Some(path) => PrerequisiteRuleSet::load(path)
            .with_context(|| format!("Failed to load rules: {}", path.display()))?,
        None => PrerequisiteRuleSet::builtin_math()?,
    };
    Ok(Some(rules))
}

fn print_concept(concept: &Concept) {
    println!("Concept: {}", concept.title);
    println!("  ID: {}", concept.id);
    println!("  Category: {}", concept.category);
    println!("  Difficulty: {}", concept.difficulty);
    if !concept.description.is_empty() {
        println!("  Description: {}", concept.description);
    }
    if !concept.prerequisite_ids.is_empty() {
        println!("  Prerequisites:");
        for edge in concept.edges() {
            match edge.reason {
                Some(reason) => println!("    - {} ({})", edge.prerequisite_id, reason),
                None => println!("    - {}", edge.prerequisite_id),
            }
        }
    }
    println!("  Created: {}", concept.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  Updated: {}", concept.updated_at.format("%Y-%m-%d %H:%M:%S"));
}

fn print_concept_list(concepts: &[Concept], empty: &str) {
    if concepts.is_empty() {
        println!("{}", empty);
    }
    for c in concepts {
        println!("  {} - {} (difficulty {})", c.id, c.title, c.difficulty);
    }
}

fn print_validation(report: &ValidationReport) {
    println!(
        "Validated '{}': {} concepts, {} issues, {} fixes",
        report.category, report.total_concepts, report.issues_found, report.fixes_applied
    );
    for issue in &report.issues {
        println!("  [{}] {}: {}", issue.kind.as_str(), issue.concept_id, issue.message);
    }
    for fix in &report.fixes {
        println!("  [fixed] {} difficulty -> {}", fix.concept_id, fix.new_difficulty);
    }
    if report.passed() {
        println!("Validation passed.");
    }
}

fn print_ingest(report: &IngestReport, quiet: bool) {
    let proposal = &report.proposal;
    println!(
        "Ingested into '{}': {} created, {} edges established",
        proposal.category,
        proposal.created.len(),
        proposal.established.len()
    );
    if quiet {
        return;
    }

    for created in &proposal.created {
        println!("  + {} (difficulty {})", created.concept_id, created.difficulty);
    }
    for skipped in &proposal.not_committed {
        let reason = match skipped.reason {
            NotCommittedReason::Exists => "already exists",
            NotCommittedReason::Duplicate => "duplicate in batch",
            NotCommittedReason::EmptyId => "no usable id",
            NotCommittedReason::Rejected => "rejected",
        };
        println!("  = {} ({})", skipped.title, reason);
    }
    for result in &proposal.relationship_results {
        if matches!(
            result.outcome,
            RelationshipOutcome::Applied | RelationshipOutcome::AlreadyPresent
        ) {
            continue;
        }
        println!(
            "  ! {} <- {}: {}",
            result.concept,
            result.prerequisite,
            result.detail.as_deref().unwrap_or("skipped")
        );
    }
    if !proposal.interpolated.is_empty() {
        println!("  Added by rules: {}", proposal.interpolated.join(", "));
    }
    if proposal.cancelled {
        println!("  Interrupted before the batch finished.");
    }
    if !report.summary.is_empty() {
        println!("\n{}", report.summary);
    }
    if !report.learning_path.is_empty() {
        println!("Suggested path: {}", report.learning_path);
    }
}
