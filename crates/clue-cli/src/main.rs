mod server;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use clue_core::{
    AnalysisConfig, Case, CaseFile, Catalog, EvidenceItem, LabStatus, Point, SampleOutcome, Tool,
    import_json,
};
use clue_store::{DB_FILE, PID_FILE, Store};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rmcp::{ServiceExt, transport::stdio};

#[derive(Parser)]
#[command(name = "clue", about = "Evidence micro-analysis lab: CLI and MCP server")]
struct Cli {
    /// Case catalog JSON (defaults to the built-in cases)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server on stdio transport
    Serve,

    /// List cases and evidence with discovery progress
    Cases,

    /// Load and validate a catalog file
    Validate {
        /// Catalog path (defaults to --catalog, then the built-in cases)
        path: Option<PathBuf>,
    },

    /// Submit pointer samples to one evidence item and persist what is found
    Probe {
        #[arg(long)]
        case: String,
        #[arg(long)]
        evidence: String,
        /// Analysis tool
        #[arg(long, default_value = "magnifier")]
        tool: Tool,
        /// Positions as X,Y in percent
        #[arg(required = true, allow_hyphen_values = true, value_parser = parse_point)]
        points: Vec<Point>,
    },

    /// Run a script of `tool T`, `move X Y` and `wait MS` lines
    Replay {
        #[arg(long)]
        case: String,
        #[arg(long)]
        evidence: String,
        script: PathBuf,
    },

    /// Random pointer sweep with every tool; reports which clues were found
    Sweep {
        #[arg(long)]
        case: String,
        #[arg(long)]
        evidence: String,
        /// Samples per tool
        #[arg(long, default_value_t = 2000)]
        samples: usize,
        /// RNG seed for a reproducible sweep
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show persisted progress for a case
    Progress {
        #[arg(long)]
        case: String,
    },

    /// Export a case's discoveries to a JSON file
    Export {
        #[arg(long)]
        case: String,
        /// Output file path
        path: PathBuf,
    },

    /// Import discoveries from a JSON file
    Import {
        /// Input file path
        path: PathBuf,
    },

    /// Forget every discovery of a case
    Reset {
        #[arg(long)]
        case: String,
    },
}

fn parse_point(s: &str) -> std::result::Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{s}'"))?;
    let x: f64 = x.trim().parse().map_err(|e| format!("bad x in '{s}': {e}"))?;
    let y: f64 = y.trim().parse().map_err(|e| format!("bad y in '{s}': {e}"))?;
    Ok(Point::new(x, y))
}

fn data_dir() -> PathBuf {
    clue_store::default_base_dir()
}

fn open_store() -> Result<Store> {
    let path = data_dir().join(DB_FILE);
    Store::open(&path).with_context(|| format!("failed to open store at {}", path.display()))
}

fn load_config() -> Result<AnalysisConfig> {
    clue_store::load_config(&data_dir()).context("failed to load config.toml")
}

fn load_catalog(path: Option<&Path>, config: &AnalysisConfig) -> Result<Catalog> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Catalog::from_json(&json, config)
                .with_context(|| format!("invalid catalog {}", path.display()))
        }
        None => Catalog::builtin(config).context("built-in catalog is invalid"),
    }
}

fn find_case<'a>(catalog: &'a Catalog, case_id: &str) -> Result<&'a Case> {
    catalog
        .case(case_id)
        .ok_or_else(|| anyhow!("unknown case '{case_id}'"))
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config()?;
    let catalog = || load_catalog(cli.catalog.as_deref(), &config);

    match &cli.command {
        Commands::Serve => cmd_serve(catalog()?, config.clone()).await,
        Commands::Cases => cmd_cases(&catalog()?, &config),
        Commands::Validate { path } => {
            cmd_validate(path.as_deref().or(cli.catalog.as_deref()), &config)
        }
        Commands::Probe {
            case,
            evidence,
            tool,
            points,
        } => cmd_probe(&catalog()?, &config, case, evidence, *tool, points),
        Commands::Replay {
            case,
            evidence,
            script,
        } => cmd_replay(&catalog()?, &config, case, evidence, script),
        Commands::Sweep {
            case,
            evidence,
            samples,
            seed,
        } => cmd_sweep(&catalog()?, &config, case, evidence, *samples, *seed),
        Commands::Progress { case } => cmd_progress(&catalog()?, &config, case),
        Commands::Export { case, path } => cmd_export(&catalog()?, case, path),
        Commands::Import { path } => cmd_import(&catalog()?, path),
        Commands::Reset { case } => cmd_reset(&catalog()?, case),
    }
}

// ---------------------------------------------------------------------------
// Advisory pidfile for observability
// ---------------------------------------------------------------------------

fn pidfile_path() -> PathBuf {
    data_dir().join(PID_FILE)
}

/// Check for an existing pidfile and log accordingly, then write our own.
fn acquire_pidfile() -> Option<PathBuf> {
    let path = pidfile_path();
    if let Ok(content) = std::fs::read_to_string(&path)
        && let Ok(pid) = content.trim().parse::<u32>()
    {
        if is_process_alive(pid) {
            tracing::warn!("another clue serve (PID {pid}) is running; sharing the store");
        } else {
            tracing::info!("cleaned up stale pidfile (PID {pid} is dead)");
            let _ = std::fs::remove_file(&path);
        }
    }

    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match std::fs::File::create(&path) {
        Ok(mut f) => {
            let _ = write!(f, "{}", std::process::id());
            tracing::info!("wrote pidfile: {}", path.display());
            Some(path)
        }
        Err(e) => {
            tracing::warn!("failed to write pidfile: {e}");
            None
        }
    }
}

fn release_pidfile(path: &Path) {
    let _ = std::fs::remove_file(path);
    tracing::info!("removed pidfile: {}", path.display());
}

#[cfg(unix)]
fn is_process_alive(pid: u32) -> bool {
    // kill(pid, 0) checks existence without sending a signal
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
fn is_process_alive(_pid: u32) -> bool {
    false
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_serve(catalog: Catalog, config: AnalysisConfig) -> Result<()> {
    let store = open_store()?;
    tracing::info!("starting MCP server with {} cases", catalog.cases.len());

    let pidfile = acquire_pidfile();

    let server = server::ClueServer::new(catalog, config, store);
    let service = server
        .clone()
        .serve(stdio())
        .await
        .context("failed to start MCP server")?;
    tokio::select! {
        quit = service.waiting() => {
            quit.context("MCP server stopped with an error")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, flushing discoveries");
        }
    }
    server.flush().await;

    if let Some(path) = pidfile {
        release_pidfile(&path);
    }
    Ok(())
}

fn cmd_cases(catalog: &Catalog, config: &AnalysisConfig) -> Result<()> {
    let store = open_store()?;
    for case in &catalog.cases {
        let file = CaseFile::load(case, config.clone(), &store)
            .with_context(|| format!("failed to load progress for {}", case.id))?;
        let progress = file.progress();
        let done = progress
            .iter()
            .filter(|p| p.status == LabStatus::Complete)
            .count();
        println!(
            "{}  {}  [{done}/{} evidence complete]",
            case.id,
            case.title,
            progress.len()
        );
        for p in &progress {
            println!(
                "  {:<10} {}/{}  {:<11}  {}",
                p.evidence_id, p.found, p.total, p.status, p.title
            );
        }
    }
    Ok(())
}

fn cmd_validate(path: Option<&Path>, config: &AnalysisConfig) -> Result<()> {
    let catalog = load_catalog(path, config)?;
    let evidence: usize = catalog.cases.iter().map(|c| c.evidence.len()).sum();
    println!(
        "ok: {} cases, {} evidence items, {} clues",
        catalog.cases.len(),
        evidence,
        catalog.clue_count()
    );
    Ok(())
}

/// Load a case from the store and open one evidence item.
fn open_case_file(
    catalog: &Catalog,
    config: &AnalysisConfig,
    store: &Store,
    case_id: &str,
    evidence_id: &str,
) -> Result<CaseFile> {
    let case = find_case(catalog, case_id)?;
    let mut file = CaseFile::load(case, config.clone(), store)
        .with_context(|| format!("failed to load progress for {case_id}"))?;
    if file.dropped_on_load() > 0 {
        tracing::warn!(
            "ignored {} stored discoveries that no longer match {case_id}",
            file.dropped_on_load()
        );
    }
    file.open_evidence(evidence_id)?;
    Ok(file)
}

fn print_outcome(position: Point, outcome: &SampleOutcome, item: Option<&EvidenceItem>) {
    let cue = outcome
        .feedback
        .cue_interval
        .map(|d| format!("{}ms", d.as_millis()))
        .unwrap_or_else(|| "-".to_string());
    print!(
        "({:.1}, {:.1}) proximity={:.3} cue={cue}",
        position.x, position.y, outcome.proximity
    );
    if outcome.feedback.near_miss {
        print!(" near-miss");
    }
    println!();
    if let Some(event) = &outcome.discovery {
        let text = item
            .and_then(|i| i.clue(&event.clue_id))
            .map(|c| c.revealed_text.as_str())
            .unwrap_or_default();
        println!("  FOUND {}: {text}", event.clue_id);
        tracing::info!("discovered clue {} on {}", event.clue_id, event.evidence_id);
    }
}

/// Close, persist, and print the item's status line.
fn finish(mut file: CaseFile, store: &Store, found: usize) -> Result<()> {
    let merged = file.close_evidence()?;
    if let Err(e) = file.persist(store) {
        tracing::error!("failed to persist discoveries: {e}");
        return Err(anyhow::Error::new(e).context("failed to persist discoveries"));
    }
    println!(
        "found {found} new clue(s); {} {}/{} {}",
        merged.id,
        merged.discovered_clue_ids.len(),
        merged.hidden_clues.len(),
        if merged.is_complete() {
            "COMPLETE"
        } else {
            "PENDING_LAB"
        }
    );
    Ok(())
}

fn cmd_probe(
    catalog: &Catalog,
    config: &AnalysisConfig,
    case_id: &str,
    evidence_id: &str,
    tool: Tool,
    points: &[Point],
) -> Result<()> {
    let store = open_store()?;
    let mut file = open_case_file(catalog, config, &store, case_id, evidence_id)?;
    file.set_active_tool(tool)?;

    let now = Instant::now();
    let mut found = 0;
    for &point in points {
        let outcome = file.submit_pointer_sample(point, now)?;
        found += usize::from(outcome.discovery.is_some());
        print_outcome(point, &outcome, file.item(evidence_id));
    }
    finish(file, &store, found)
}

enum ScriptStep {
    Tool(Tool),
    Move(Point),
    Wait(Duration),
}

fn parse_script(text: &str) -> Result<Vec<ScriptStep>> {
    let mut steps = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        let step = match words.as_slice() {
            ["tool", t] => ScriptStep::Tool(t.parse().map_err(|e: String| anyhow!(e))?),
            ["move", x, y] => ScriptStep::Move(Point::new(
                x.parse().with_context(|| format!("line {}: bad x", n + 1))?,
                y.parse().with_context(|| format!("line {}: bad y", n + 1))?,
            )),
            ["wait", ms] => ScriptStep::Wait(Duration::from_millis(
                ms.parse().with_context(|| format!("line {}: bad wait", n + 1))?,
            )),
            _ => bail!("line {}: expected `tool T`, `move X Y` or `wait MS`", n + 1),
        };
        steps.push(step);
    }
    Ok(steps)
}

fn cmd_replay(
    catalog: &Catalog,
    config: &AnalysisConfig,
    case_id: &str,
    evidence_id: &str,
    script: &Path,
) -> Result<()> {
    let text = std::fs::read_to_string(script)
        .with_context(|| format!("failed to read {}", script.display()))?;
    let steps = parse_script(&text)?;

    let store = open_store()?;
    let mut file = open_case_file(catalog, config, &store, case_id, evidence_id)?;

    // replay runs on a virtual clock so waits are instant
    let mut now = Instant::now();
    let mut found = 0;
    for step in steps {
        match step {
            ScriptStep::Tool(tool) => {
                if file.set_active_tool(tool)? {
                    println!("tool {tool}");
                }
            }
            ScriptStep::Move(point) => {
                let outcome = file.submit_pointer_sample(point, now)?;
                found += usize::from(outcome.discovery.is_some());
                print_outcome(point, &outcome, file.item(evidence_id));
            }
            ScriptStep::Wait(d) => {
                now += d;
                let tick = file.tick(now)?;
                if let Some(clue) = tick.banner_expired {
                    println!("  banner for {clue} cleared");
                }
            }
        }
    }
    finish(file, &store, found)
}

fn cmd_sweep(
    catalog: &Catalog,
    config: &AnalysisConfig,
    case_id: &str,
    evidence_id: &str,
    samples: usize,
    seed: Option<u64>,
) -> Result<()> {
    let case = find_case(catalog, case_id)?;
    // fresh state: a sweep checks content, it never touches saved progress
    let mut file = CaseFile::new(case, config.clone());
    file.open_evidence(evidence_id)?;
    let mut rng = match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_os_rng(),
    };

    let now = Instant::now();
    for tool in Tool::ALL {
        file.set_active_tool(tool)?;
        let mut found = Vec::new();
        for i in 0..samples {
            let point = Point::new(rng.random_range(0.0..=100.0), rng.random_range(0.0..=100.0));
            if let Some(event) = file.submit_pointer_sample(point, now)?.discovery {
                found.push(format!("{} (sample {})", event.clue_id, i + 1));
            }
        }
        if found.is_empty() {
            println!("{tool}: -");
        } else {
            println!("{tool}: {}", found.join(", "));
        }
    }

    let merged = file.close_evidence()?;
    let missed: Vec<&str> = merged
        .hidden_clues
        .iter()
        .filter(|c| !merged.is_discovered(&c.id))
        .map(|c| c.id.as_str())
        .collect();
    if missed.is_empty() {
        println!("all {} clue(s) found", merged.hidden_clues.len());
    } else {
        println!("missed: {}", missed.join(", "));
    }
    Ok(())
}

fn cmd_progress(catalog: &Catalog, config: &AnalysisConfig, case_id: &str) -> Result<()> {
    let case = find_case(catalog, case_id)?;
    let store = open_store()?;
    let file = CaseFile::load(case, config.clone(), &store)
        .with_context(|| format!("failed to load progress for {case_id}"))?;
    println!("{}  {}", case.id, case.title);
    for p in file.progress() {
        println!("  {:<10} {}/{}  {}", p.evidence_id, p.found, p.total, p.status);
        if let Ok(revealed) = file.revealed_clues(&p.evidence_id) {
            for clue in revealed {
                println!("    [{}] {}: {}", clue.tool, clue.id, clue.revealed_text);
            }
        }
    }
    println!(
        "status: {}",
        if file.is_complete() { "COMPLETE" } else { "IN PROGRESS" }
    );
    Ok(())
}

fn cmd_export(catalog: &Catalog, case_id: &str, path: &Path) -> Result<()> {
    find_case(catalog, case_id)?;
    let store = open_store()?;
    store
        .export_json_file(case_id, path)
        .context("failed to export progress")?;
    println!("exported {case_id} to {}", path.display());
    Ok(())
}

fn cmd_import(catalog: &Catalog, path: &Path) -> Result<()> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut export = import_json(&json).context("failed to parse progress JSON")?;
    let case = find_case(catalog, &export.case_id)?;

    // keep only ids that still name clues of this case
    let mut dropped = 0;
    export.discovered.retain(|evidence_id, ids| {
        let Some(item) = case.evidence(evidence_id) else {
            dropped += ids.len();
            return false;
        };
        let before = ids.len();
        ids.retain(|id| item.has_clue(id));
        dropped += before - ids.len();
        !ids.is_empty()
    });
    if dropped > 0 {
        tracing::warn!("skipped {dropped} unknown clue id(s) in {}", path.display());
    }

    let store = open_store()?;
    let added = store
        .import_export(&export)
        .context("failed to import progress")?;
    println!(
        "imported {added} new discoveries for {} from {}",
        export.case_id,
        path.display()
    );
    Ok(())
}

fn cmd_reset(catalog: &Catalog, case_id: &str) -> Result<()> {
    find_case(catalog, case_id)?;
    let store = open_store()?;
    let removed = store.reset_case(case_id).context("failed to reset case")?;
    println!("reset {case_id}: removed {removed} discoveries");
    Ok(())
}
