use serde::{Deserialize, Serialize};

/// The four tracked pipeline phases; each weighs 25% of the overall task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Parse,
    ReferenceWrite,
    Snapshot,
    Persist,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Parse,
        Stage::ReferenceWrite,
        Stage::Snapshot,
        Stage::Persist,
    ];
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Parse => write!(f, "parse"),
            Stage::ReferenceWrite => write!(f, "reference-write"),
            Stage::Snapshot => write!(f, "snapshot"),
            Stage::Persist => write!(f, "persist"),
        }
    }
}

/// Per-stage completion percentages
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageProgress {
    pub parse: f64,
    pub reference_write: f64,
    pub snapshot: f64,
    pub persist: f64,
}

impl StageProgress {
    pub fn get(&self, stage: Stage) -> f64 {
        match stage {
            Stage::Parse => self.parse,
            Stage::ReferenceWrite => self.reference_write,
            Stage::Snapshot => self.snapshot,
            Stage::Persist => self.persist,
        }
    }

    pub fn set(&mut self, stage: Stage, percent: f64) {
        let slot = match stage {
            Stage::Parse => &mut self.parse,
            Stage::ReferenceWrite => &mut self.reference_write,
            Stage::Snapshot => &mut self.snapshot,
            Stage::Persist => &mut self.persist,
        };
        *slot = percent;
    }

    /// Equal-weighted mean of the four stages
    pub fn mean(&self) -> f64 {
        Stage::ALL.iter().map(|s| self.get(*s)).sum::<f64>() / Stage::ALL.len() as f64
    }
}

/// Lifecycle of one playlist file inside a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Initializing,
    Parsing,
    WritingReferences,
    BuildingSnapshot,
    Persisting,
    Complete,
    Errored,
}

impl PipelineState {
    pub fn label(&self) -> &'static str {
        match self {
            PipelineState::Initializing => "Initializing",
            PipelineState::Parsing => "Parsing playlist",
            PipelineState::WritingReferences => "Writing reference files",
            PipelineState::BuildingSnapshot => "Building catalog snapshot",
            PipelineState::Persisting => "Saving to catalog",
            PipelineState::Complete => "Complete",
            PipelineState::Errored => "Failed",
        }
    }
}

/// Mutable progress record of one task
#[derive(Debug, Clone)]
pub struct TaskProgress {
    pub stage_label: String,
    pub stages: StageProgress,
    pub overall_percent: f64,
    pub is_complete: bool,
    pub error: Option<String>,
    pub started_at: i64,
    pub updated_at: i64,
}

impl TaskProgress {
    pub fn new() -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            stage_label: PipelineState::Initializing.label().to_string(),
            stages: StageProgress::default(),
            overall_percent: 0.0,
            is_complete: false,
            error: None,
            started_at: now,
            updated_at: now,
        }
    }
}

impl Default for TaskProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view returned to polling clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub task_id: String,
    pub stage_label: String,
    pub stages: StageProgress,
    pub overall_percent: f64,
    pub is_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: i64,
    pub updated_at: i64,
    pub elapsed_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_mean_is_equal_weighted() {
        let mut stages = StageProgress::default();
        stages.set(Stage::Parse, 100.0);
        assert_eq!(stages.mean(), 25.0);
        stages.set(Stage::ReferenceWrite, 50.0);
        assert_eq!(stages.mean(), 37.5);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let snapshot = ProgressSnapshot {
            task_id: "t".to_string(),
            stage_label: "Parsing playlist".to_string(),
            stages: StageProgress::default(),
            overall_percent: 0.0,
            is_complete: false,
            error: None,
            started_at: 0,
            updated_at: 0,
            elapsed_ms: 0,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["stageLabel"], "Parsing playlist");
        assert_eq!(json["stages"]["referenceWrite"], 0.0);
        assert!(json.get("error").is_none());
        assert_eq!(json["startedAt"], 0);
    }
}
