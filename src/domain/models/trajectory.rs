//! Trajectory metadata and the ordered chunks submitted for grading.

use serde::{Deserialize, Serialize};

use super::chunk::Chunk;

/// Quest descriptor for guided tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quest {
    pub title: String,
    /// Application the quest is expected to be completed in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_app: Option<String>,
    #[serde(default)]
    pub objectives: Vec<String>,
}

/// Read-only description of the session being graded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrajectoryMeta {
    pub session_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_description: Option<String>,

    /// Platform tag, e.g. `macos` or `windows`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    /// Programmatic requirements checked by a `ProgrammaticGrader`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quest: Option<Quest>,
}

impl TrajectoryMeta {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Self::default()
        }
    }

    pub fn with_task_description(mut self, description: impl Into<String>) -> Self {
        self.task_description = Some(description.into());
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_requirements(mut self, requirements: Vec<String>) -> Self {
        self.requirements = Some(requirements);
        self
    }

    pub fn with_quest(mut self, quest: Quest) -> Self {
        self.quest = Some(quest);
        self
    }

    pub fn target_app(&self) -> Option<&str> {
        self.quest
            .as_ref()
            .and_then(|quest| quest.target_app.as_deref())
    }

    pub fn requirements(&self) -> &[String] {
        self.requirements.as_deref().unwrap_or_default()
    }
}

/// A recorded trajectory: metadata plus chunks in recording order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub meta: TrajectoryMeta,
    pub chunks: Vec<Chunk>,
}

impl Trajectory {
    pub const fn new(meta: TrajectoryMeta, chunks: Vec<Chunk>) -> Self {
        Self { meta, chunks }
    }

    /// Group consecutive chunks into evaluation windows of `chunks_per_call`.
    ///
    /// The last window may be shorter. A size of zero is treated as one.
    pub fn windows(&self, chunks_per_call: usize) -> Vec<Chunk> {
        self.chunks
            .chunks(chunks_per_call.max(1))
            .map(Chunk::merge)
            .collect()
    }
}
