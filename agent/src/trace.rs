//! Recorded probe traces
//!
//! A trace is a JSON-lines file of probe firings and operator actions. Blank
//! lines and lines starting with `#` are skipped; malformed lines are counted
//! and skipped.

use std::path::{Path, PathBuf};

use hookwatch_shared::{Caller, CategoryMask};
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::engine::Engine;
use crate::host::replay::ReplayHost;
use crate::host::HostError;
use crate::probes::{EntryArgs, ExitArgs};
use crate::reporter::ReporterStats;

/// One line of a trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceRecord {
    Enter {
        symbol: String,
        caller: Caller,
        args: EntryArgs,
    },
    Exit {
        symbol: String,
        caller: Caller,
        retval: i64,
    },
    Control(ControlAction),
}

/// Operator action recorded between firings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ControlAction {
    SetMask { mask: String },
    SetRestart { enabled: bool },
    ArmExecute,
    DisarmExecute,
    ResetExecute,
}

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("failed to open trace {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read trace {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid mask in trace: {0}")]
    Mask(String),

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Outcome of a replay
#[derive(Debug, Default, Clone, Serialize)]
pub struct ReplaySummary {
    pub lines: u64,
    pub entries: u64,
    pub exits: u64,
    pub controls: u64,
    /// Lines that did not parse
    pub malformed: u64,
    /// Firings on symbols with no installed probe
    pub unprobed: u64,
    pub reporter: ReporterStats,
    pub correlation_evictions: u64,
}

/// Apply one record to `engine` through `host`
pub fn apply(engine: &Engine, host: &ReplayHost, record: &TraceRecord) -> Result<(), TraceError> {
    match record {
        TraceRecord::Enter {
            symbol,
            caller,
            args,
        } => host.fire_entry(engine, symbol, caller, args)?,
        TraceRecord::Exit {
            symbol,
            caller,
            retval,
        } => host.fire_exit(engine, symbol, caller, &ExitArgs { retval: *retval })?,
        TraceRecord::Control(action) => {
            let control = engine.control();
            match action {
                ControlAction::SetMask { mask } => {
                    let mask: CategoryMask = mask
                        .parse()
                        .map_err(|e| TraceError::Mask(format!("{}: {}", mask, e)))?;
                    control.set_mask(mask);
                }
                ControlAction::SetRestart { enabled } => control.set_restart_enabled(*enabled),
                ControlAction::ArmExecute => control.arm_execute(),
                ControlAction::DisarmExecute => control.disarm_execute(),
                ControlAction::ResetExecute => control.reset_execute_counter(),
            }
        }
    }
    Ok(())
}

/// Replay every line of `path`
pub async fn replay_file(
    engine: &Engine,
    host: &ReplayHost,
    path: &Path,
) -> Result<ReplaySummary, TraceError> {
    let file = File::open(path).await.map_err(|source| TraceError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut lines = BufReader::new(file).lines();
    let mut summary = ReplaySummary::default();

    while let Some(line) = lines.next_line().await.map_err(|source| TraceError::Read {
        path: path.to_path_buf(),
        source,
    })? {
        summary.lines += 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let record: TraceRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping malformed trace line {}: {}", summary.lines, e);
                summary.malformed += 1;
                continue;
            }
        };

        match apply(engine, host, &record) {
            Ok(()) => match record {
                TraceRecord::Enter { .. } => summary.entries += 1,
                TraceRecord::Exit { .. } => summary.exits += 1,
                TraceRecord::Control(_) => summary.controls += 1,
            },
            Err(TraceError::Host(HostError::NotInstalled(symbol))) => {
                debug!(line = summary.lines, symbol = %symbol, "no probe installed");
                summary.unprobed += 1;
            }
            Err(e) => {
                warn!("Skipping trace line {}: {}", summary.lines, e);
                summary.malformed += 1;
            }
        }
    }

    summary.reporter = engine.reporter().stats();
    summary.correlation_evictions = engine.bind_calls().evictions();
    Ok(summary)
}
