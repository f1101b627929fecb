use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::Parser;
use gridmerge::constants::{INTERACT_RADIUS, WIN_VALUE};
use gridmerge::engine::{GameConfig, GameEngine, WinBannerPolicy};
use gridmerge::movement::ManualLocation;
use gridmerge::save_store::MemoryKeyValueStore;
use gridmerge::types::{CellCoord, Direction, InteractionEvent, RuntimeEvent};
use gridmerge::world::default_value;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

const DIRECTIONS: [Direction; 4] = [
    Direction::North,
    Direction::South,
    Direction::East,
    Direction::West,
];

#[derive(Parser, Debug)]
#[command(author, version, about = "Run headless bot sessions")]
struct Cli {
    #[arg(long, default_value_t = 3)]
    runs: u32,
    #[arg(long, default_value_t = 5_000)]
    steps: u32,
    #[arg(long, default_value_t = 1)]
    seed: u64,
    #[arg(long, default_value_t = WIN_VALUE)]
    win_value: u32,
    #[arg(long)]
    match_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, Serialize)]
struct RunResultLine {
    seed: u64,
    steps: u32,
    moves: u32,
    #[serde(rename = "pickedUp")]
    picked_up: u32,
    dropped: u32,
    merged: u32,
    #[serde(rename = "noOps")]
    no_ops: u32,
    #[serde(rename = "tooFar")]
    too_far: u32,
    wins: u32,
    #[serde(rename = "firstWinStep")]
    first_win_step: Option<u32>,
    #[serde(rename = "bestValue")]
    best_value: u32,
    overrides: usize,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    step: u32,
    message: String,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(rename = "startedAtMs")]
    started_at_ms: i64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: i64,
    #[serde(rename = "runCount")]
    run_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "winningRuns")]
    winning_runs: usize,
    #[serde(rename = "bestValues")]
    best_values: BTreeMap<u32, usize>,
    runs: Vec<RunResultLine>,
}

#[derive(Clone, Debug, Serialize)]
struct StructuredLogLine {
    #[serde(rename = "timestampMs")]
    timestamp_ms: i64,
    level: String,
    event: String,
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    step: Option<u32>,
    details: Value,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let started_at_ms = Utc::now().timestamp_millis();
    let match_id = cli
        .match_id
        .clone()
        .unwrap_or_else(|| default_match_id(cli.seed, started_at_ms));
    let mut results = Vec::new();

    for offset in 0..cli.runs as u64 {
        let seed = cli.seed.wrapping_add(offset);
        emit_log(
            "info",
            "run_started",
            &match_id,
            Some(seed),
            None,
            json!({ "steps": cli.steps, "winValue": cli.win_value }),
        );
        let (result, anomaly_records) = run_bot(seed, cli.steps, cli.win_value);
        for anomaly in &anomaly_records {
            emit_log(
                "warn",
                "anomaly_detected",
                &match_id,
                Some(seed),
                Some(anomaly.step),
                json!({ "message": anomaly.message }),
            );
        }
        emit_log(
            "info",
            "run_finished",
            &match_id,
            Some(seed),
            Some(result.steps),
            json!({
                "bestValue": result.best_value,
                "wins": result.wins,
                "overrides": result.overrides,
            }),
        );
        match serde_json::to_string(&result) {
            Ok(line) => println!("{line}"),
            Err(error) => eprintln!("[simulate] failed to serialize run result: {error}"),
        }
        results.push(result);
    }

    let summary = build_run_summary(
        match_id.clone(),
        started_at_ms,
        Utc::now().timestamp_millis(),
        results,
    );

    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            emit_log(
                "error",
                "summary_write_failed",
                &match_id,
                None,
                None,
                json!({
                    "path": path.to_string_lossy(),
                    "error": error.to_string(),
                }),
            );
            std::process::exit(2);
        }
    }

    if summary.anomaly_count > 0 {
        std::process::exit(1);
    }
}

/// Greedy bot: merge when a matching token is in reach, otherwise pick up
/// the smallest token around, otherwise wander.
fn run_bot(seed: u64, steps: u32, win_value: u32) -> (RunResultLine, Vec<AnomalyRecord>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let config = GameConfig {
        win_value,
        win_banner: WinBannerPolicy::Sticky,
        ..GameConfig::default()
    };
    let mut engine = GameEngine::start(
        config,
        Box::new(MemoryKeyValueStore::new()),
        Box::new(ManualLocation::new()),
    );
    let mut result = RunResultLine {
        seed,
        steps,
        ..RunResultLine::default()
    };
    let mut anomaly_records = Vec::new();
    let mut seen = HashSet::new();

    for step in 0..steps {
        let player = engine.player();
        let reachable = reachable_cells(player.position);
        let target = match player.held {
            Some(held) => reachable
                .iter()
                .copied()
                .find(|coord| engine.cell_value(*coord) == held)
                .or_else(|| {
                    rng.random_bool(0.1).then(|| {
                        reachable
                            .iter()
                            .copied()
                            .find(|coord| engine.cell_value(*coord) == 0)
                    })?
                }),
            None => reachable
                .iter()
                .copied()
                .filter(|coord| engine.cell_value(*coord) > 0)
                .min_by_key(|coord| engine.cell_value(*coord)),
        };

        match target {
            Some(coord) => {
                let before_cell = engine.cell_value(coord);
                let before_held = player.held.unwrap_or(0);
                let event = engine.handle_interaction(coord);
                record_event(&mut result, event);
                let after_total = engine.cell_value(coord) as u64
                    + engine.player().held.unwrap_or(0) as u64;
                if before_cell as u64 + before_held as u64 != after_total {
                    push_anomaly(
                        &mut result.anomalies,
                        &mut anomaly_records,
                        &mut seen,
                        step,
                        format!("token total changed at {}", coord.key()),
                    );
                }
            }
            None => {
                let dir = DIRECTIONS[rng.random_range(0..DIRECTIONS.len())];
                if engine.press_direction(dir) {
                    result.moves += 1;
                }
            }
        }

        for event in engine.drain_events() {
            if let RuntimeEvent::Won { value } = event {
                result.wins += 1;
                result.first_win_step.get_or_insert(step);
                if value < win_value {
                    push_anomaly(
                        &mut result.anomalies,
                        &mut anomaly_records,
                        &mut seen,
                        step,
                        format!("won with {value} below {win_value}"),
                    );
                }
            }
        }
        engine.drain_render();
    }

    for (coord, value) in engine.world().serialize() {
        result.best_value = result.best_value.max(value);
        if value == default_value(coord) {
            push_anomaly(
                &mut result.anomalies,
                &mut anomaly_records,
                &mut seen,
                steps,
                format!("ledger keeps default value at {}", coord.key()),
            );
        }
    }
    result.best_value = result
        .best_value
        .max(engine.player().held.unwrap_or(0));
    result.overrides = engine.world().override_count();
    engine.shutdown();
    (result, anomaly_records)
}

fn reachable_cells(center: CellCoord) -> Vec<CellCoord> {
    let mut cells = Vec::new();
    for di in -INTERACT_RADIUS..=INTERACT_RADIUS {
        for dj in -INTERACT_RADIUS..=INTERACT_RADIUS {
            if let (Some(i), Some(j)) = (center.i.checked_add(di), center.j.checked_add(dj)) {
                cells.push(CellCoord::new(i, j));
            }
        }
    }
    cells
}

fn record_event(result: &mut RunResultLine, event: InteractionEvent) {
    match event {
        InteractionEvent::PickedUp(_) => result.picked_up += 1,
        InteractionEvent::Dropped(_) => result.dropped += 1,
        InteractionEvent::Merged(_) => result.merged += 1,
        InteractionEvent::NoOp => result.no_ops += 1,
        InteractionEvent::TooFar => result.too_far += 1,
    }
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    records: &mut Vec<AnomalyRecord>,
    seen: &mut HashSet<String>,
    step: u32,
    message: String,
) {
    records.push(AnomalyRecord {
        step,
        message: message.clone(),
    });
    if seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn build_run_summary(
    match_id: String,
    started_at_ms: i64,
    finished_at_ms: i64,
    runs: Vec<RunResultLine>,
) -> RunSummary {
    let mut best_values = BTreeMap::new();
    for run in &runs {
        *best_values.entry(run.best_value).or_insert(0) += 1;
    }
    RunSummary {
        match_id,
        started_at_ms,
        finished_at_ms,
        run_count: runs.len(),
        anomaly_count: runs.iter().map(|run| run.anomalies.len()).sum(),
        winning_runs: runs.iter().filter(|run| run.wins > 0).count(),
        best_values,
        runs,
    }
}

fn default_match_id(seed: u64, started_at_ms: i64) -> String {
    format!("sim-{seed}-{started_at_ms}")
}

fn emit_log(
    level: &str,
    event: &str,
    match_id: &str,
    seed: Option<u64>,
    step: Option<u32>,
    details: Value,
) {
    let log_line = StructuredLogLine {
        timestamp_ms: Utc::now().timestamp_millis(),
        level: level.to_string(),
        event: event.to_string(),
        match_id: match_id.to_string(),
        seed,
        step,
        details,
    };
    match serde_json::to_string(&log_line) {
        Ok(text) => eprintln!("{text}"),
        Err(error) => eprintln!("[simulate] failed to serialize log line: {error}"),
    }
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
    std::fs::write(path, summary_text)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}
