//! Stage log and terminal state of a deployment run.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::archive::ArchiveArtifact;
use crate::release::ReleaseInfo;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Setup,
    PreHooks,
    ArchiveBuild,
    Upload,
    RemoteTrigger,
    Cleanup,
}

impl Stage {
    /// Progress line printed when the stage starts.
    pub fn progress_line(&self) -> &'static str {
        match self {
            Stage::Setup => "Preparing deployment",
            Stage::PreHooks => "Running commands before deployment",
            Stage::ArchiveBuild => "Building release zip",
            Stage::Upload => "Uploading to server",
            Stage::RemoteTrigger => "Running deployment on server",
            Stage::Cleanup => "Cleaning up after deployment",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Setup => "setup",
            Stage::PreHooks => "pre-hooks",
            Stage::ArchiveBuild => "archive-build",
            Stage::Upload => "upload",
            Stage::RemoteTrigger => "remote-trigger",
            Stage::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Succeeded,
    /// Finished with non-fatal failures.
    Warning,
    /// Fatal; the run was aborted here.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub outcome: StageOutcome,
    /// Informational lines (command output, response bodies in debug mode).
    pub notes: Vec<String>,
    /// Non-fatal failures, or the fatal error for a failed stage.
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl StageRecord {
    pub(crate) fn begin(stage: Stage) -> Self {
        let now = Utc::now();
        Self {
            stage,
            outcome: StageOutcome::Succeeded,
            notes: Vec::new(),
            errors: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    pub(crate) fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub(crate) fn warn(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        if self.outcome != StageOutcome::Failed && !self.errors.is_empty() {
            self.outcome = StageOutcome::Warning;
        }
        self
    }

    pub(crate) fn fail(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self.outcome = StageOutcome::Failed;
        self.finish()
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Done,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub target: String,
    pub state: RunState,
    pub stages: Vec<StageRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArchiveArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<ReleaseInfo>,
    /// The fatal error of an aborted run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The bootstrap script was uploaded and its removal was not confirmed.
    pub bootstrap_exposed: bool,
}

impl PipelineReport {
    pub(crate) fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            state: RunState::Aborted,
            stages: Vec::new(),
            artifact: None,
            release: None,
            error: None,
            bootstrap_exposed: false,
        }
    }

    pub(crate) fn push(&mut self, record: StageRecord) {
        self.stages.push(record);
    }

    pub fn is_done(&self) -> bool {
        self.state == RunState::Done
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageRecord> {
        self.stages.iter().find(|r| r.stage == stage)
    }

    /// Stages in the order they ran.
    pub fn stage_order(&self) -> Vec<Stage> {
        self.stages.iter().map(|r| r.stage).collect()
    }

    /// Every non-fatal failure, tagged with its stage.
    pub fn warnings(&self) -> Vec<(Stage, &str)> {
        self.stages
            .iter()
            .filter(|r| r.outcome == StageOutcome::Warning)
            .flat_map(|r| r.errors.iter().map(move |e| (r.stage, e.as_str())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_marks_warnings() {
        let mut record = StageRecord::begin(Stage::PreHooks);
        record.warn("exit 1");
        let record = record.finish();
        assert_eq!(record.outcome, StageOutcome::Warning);
        assert!(record.finished_at >= record.started_at);
    }

    #[test]
    fn fail_overrides_warning() {
        let mut record = StageRecord::begin(Stage::Upload);
        record.warn("slow");
        let record = record.fail("connection lost");
        assert_eq!(record.outcome, StageOutcome::Failed);
        assert_eq!(record.errors.len(), 2);
    }

    #[test]
    fn warnings_are_tagged_with_stage() {
        let mut report = PipelineReport::new("staging");
        report.push(StageRecord::begin(Stage::Setup).finish());
        let mut trigger = StageRecord::begin(Stage::RemoteTrigger);
        trigger.warn("HTTP 500");
        report.push(trigger.finish());

        assert_eq!(report.warnings(), vec![(Stage::RemoteTrigger, "HTTP 500")]);
        assert_eq!(report.stage_order(), vec![Stage::Setup, Stage::RemoteTrigger]);
    }

    #[test]
    fn serializes_stage_names_in_snake_case() {
        let json = serde_json::to_value(Stage::RemoteTrigger).unwrap();
        assert_eq!(json, "remote_trigger");
        assert_eq!(Stage::ArchiveBuild.to_string(), "archive-build");
    }
}
