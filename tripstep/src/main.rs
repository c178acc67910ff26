//! Guarded single-step decision engine for the trip-planner app.
//!
//! Reads one accessibility snapshot and prints exactly one validated action
//! as JSON on stdout. Diagnostics go to stderr.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use tripstep::exit_codes;
use tripstep::inspect::render_inspection;
use tripstep::io::chat::HttpChatModel;
use tripstep::io::config::{EngineConfig, load_config};
use tripstep::io::history::{HistoryStore, JsonlHistory, MemoryHistory};
use tripstep::io::plan_store::{load_or_init_plan, load_plan, validate_plan};
use tripstep::io::snapshot::load_snapshot;
use tripstep::logging;
use tripstep::plan::{DEFAULT_SERVICES, TripPlan};
use tripstep::step::{StepConfig, StepRequest, run_step};

#[derive(Parser)]
#[command(
    name = "tripstep",
    version,
    about = "Decide the next UI action for a trip-planner screen"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print one validated action for the given snapshot.
    Decide(DecideArgs),
    /// Print the phase, signature and surfaced candidates of a snapshot.
    Inspect(InspectArgs),
}

#[derive(Args)]
struct DecideArgs {
    /// Accessibility-tree dump (uiautomator XML).
    #[arg(long)]
    xml: PathBuf,

    /// Natural-language objective; derived from the plan when omitted.
    #[arg(long)]
    instruction: Option<String>,

    #[command(flatten)]
    plan: PlanArgs,

    /// JSONL history shared across invocations; in-memory when omitted.
    #[arg(long, env = "LLM_HISTORY_FILE")]
    history_file: Option<PathBuf>,

    /// History entries read back for loop detection and the prompt.
    #[arg(long, env = "LLM_HISTORY_LIMIT")]
    history_limit: Option<usize>,

    /// Surfaced candidate limit.
    #[arg(long)]
    limit: Option<usize>,

    /// Model name sent to the chat endpoint.
    #[arg(long, env = "LLM_MODEL")]
    model: Option<String>,

    /// Rules only; never call the model.
    #[arg(long)]
    no_llm: bool,

    /// Engine config (TOML). Missing file means defaults.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct InspectArgs {
    #[arg(long)]
    xml: PathBuf,

    #[command(flatten)]
    plan: PlanArgs,

    #[arg(long)]
    limit: Option<usize>,

    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
struct PlanArgs {
    /// Stored plan (JSON). Written from the inline fields on first use.
    #[arg(long)]
    plan: Option<PathBuf>,

    #[arg(long)]
    start: Option<String>,

    #[arg(long)]
    destination: Option<String>,

    /// `now` or `YYYY-MM-DDTHH:MM`.
    #[arg(long)]
    when: Option<String>,

    #[arg(long)]
    arrive_by: bool,

    #[arg(long)]
    via: Vec<String>,

    #[arg(long)]
    no_via: bool,

    #[arg(long)]
    rail_only: bool,

    #[arg(long = "exclude-mode")]
    exclude_modes: Vec<String>,

    #[arg(long = "allowed-service")]
    allowed_services: Vec<String>,
}

impl PlanArgs {
    /// Plan from inline flags, if a start or destination was given.
    fn inline_plan(&self) -> Option<TripPlan> {
        if self.start.is_none() && self.destination.is_none() {
            return None;
        }
        let allowed_services = if self.allowed_services.is_empty() {
            DEFAULT_SERVICES.iter().map(|s| s.to_string()).collect()
        } else {
            self.allowed_services.clone()
        };
        Some(TripPlan {
            start: self.start.clone().unwrap_or_default(),
            destination: self.destination.clone().unwrap_or_default(),
            when: self.when.clone().unwrap_or_else(|| "now".to_string()),
            arrive_by: self.arrive_by,
            via: self.via.clone(),
            no_via: self.no_via,
            rail_only: self.rail_only,
            exclude_modes: self.exclude_modes.clone(),
            allowed_services,
        })
    }

    /// Inline plan, checked against the stored-plan schema.
    fn validated_inline_plan(&self) -> Result<Option<TripPlan>> {
        let Some(plan) = self.inline_plan() else {
            return Ok(None);
        };
        validate_plan(&plan).context("invalid inline plan")?;
        Ok(Some(plan))
    }

    /// Stored plan wins; a missing store is initialized from the inline plan.
    fn resolve(&self) -> Result<TripPlan> {
        let inline = self.validated_inline_plan()?;
        match &self.plan {
            Some(path) => load_or_init_plan(path, inline.as_ref()),
            None => inline.ok_or_else(|| {
                anyhow!("a trip plan is required: pass --plan or --start/--destination")
            }),
        }
    }

    /// Like [`PlanArgs::resolve`] but never writes, and tolerates no plan at all.
    fn resolve_read_only(&self) -> Result<TripPlan> {
        match &self.plan {
            Some(path) if path.exists() => load_plan(path),
            _ => Ok(self.validated_inline_plan()?.unwrap_or_default()),
        }
    }
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(()) => exit_codes::OK,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Decide(args) => cmd_decide(&args),
        Command::Inspect(args) => cmd_inspect(&args),
    }
}

fn load_engine_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    let mut cfg = match path {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    cfg.apply_env(|name| std::env::var(name).ok())?;
    Ok(cfg)
}

fn cmd_decide(args: &DecideArgs) -> Result<()> {
    let mut cfg = load_engine_config(args.config.as_ref())?;
    if let Some(limit) = args.limit {
        cfg.surface_limit = limit;
    }
    if let Some(limit) = args.history_limit {
        cfg.history_limit = limit;
    }
    if let Some(model) = args.model.as_deref().filter(|m| !m.trim().is_empty()) {
        cfg.llm.model = model.trim().to_string();
    }
    if args.no_llm {
        cfg.use_llm = false;
    }
    cfg.validate().context("invalid engine configuration")?;

    let snapshot = load_snapshot(&args.xml)?;
    let plan = args.plan.resolve()?;
    let objective = args
        .instruction
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map_or_else(|| plan.objective(), str::to_string);

    let mut history: Box<dyn HistoryStore> = match &args.history_file {
        Some(path) => Box::new(JsonlHistory::new(path)),
        None => Box::new(MemoryHistory::new()),
    };
    let model = if cfg.use_llm {
        Some(HttpChatModel::from_config(&cfg.llm)?)
    } else {
        None
    };
    debug!(use_llm = cfg.use_llm, model = %cfg.llm.model, "engine configured");

    let outcome = run_step(
        &StepRequest {
            snapshot: &snapshot,
            plan: &plan,
            objective: &objective,
        },
        history.as_mut(),
        model.as_ref(),
        &StepConfig::from_engine(&cfg),
    );
    println!(
        "{}",
        serde_json::to_string(&outcome).context("serialize decision")?
    );
    Ok(())
}

fn cmd_inspect(args: &InspectArgs) -> Result<()> {
    let mut cfg = load_engine_config(args.config.as_ref())?;
    if let Some(limit) = args.limit {
        cfg.surface_limit = limit;
    }
    cfg.validate().context("invalid engine configuration")?;

    let snapshot = load_snapshot(&args.xml)?;
    let plan = args.plan.resolve_read_only()?;
    print!(
        "{}",
        render_inspection(&snapshot, &plan, &StepConfig::from_engine(&cfg))?
    );
    Ok(())
}
