//! Per-run record of what every stage did

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ingest,
    IouFilter,
    Stability,
    Nms,
    EdgeRejection,
    Cleanup,
    NonOverlap,
    Ranking,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Ingest => "ingest",
            Stage::IouFilter => "iou_filter",
            Stage::Stability => "stability",
            Stage::Nms => "nms",
            Stage::EdgeRejection => "edge_rejection",
            Stage::Cleanup => "cleanup",
            Stage::NonOverlap => "non_overlap",
            Stage::Ranking => "ranking",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub candidates_in: usize,
    pub candidates_out: usize,
    pub elapsed_ms: f64,
    pub skipped: bool,
}

/// A recovered anomaly worth surfacing to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub stage: Stage,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub stages: Vec<StageRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Default for PipelineReport {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            stages: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn record(&mut self, stage: Stage, candidates_in: usize, candidates_out: usize, started: Instant) {
        self.stages.push(StageRecord {
            stage,
            candidates_in,
            candidates_out,
            elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
            skipped: false,
        });
    }

    pub fn skip(&mut self, stage: Stage, candidates: usize) {
        self.stages.push(StageRecord {
            stage,
            candidates_in: candidates,
            candidates_out: candidates,
            elapsed_ms: 0.0,
            skipped: true,
        });
    }

    pub fn diagnose(&mut self, stage: Stage, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            stage,
            message: message.into(),
        });
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageRecord> {
        self.stages.iter().find(|r| r.stage == stage)
    }

    pub fn was_skipped(&self, stage: Stage) -> bool {
        self.stage(stage).map(|r| r.skipped).unwrap_or(true)
    }

    /// Total time spent across stages
    pub fn total_ms(&self) -> f64 {
        self.stages.iter().map(|r| r.elapsed_ms).sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
