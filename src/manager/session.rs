//! Caller-owned pipeline session.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data::DataFrame;
use crate::datamodel::{Goal, Summary};
use crate::error::VizResult;

/// Where a session is in the summarize → goals → visualize sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Summarized,
    GoalsReady,
    Visualized,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Summarized => write!(f, "summarized"),
            SessionState::GoalsReady => write!(f, "goals_ready"),
            SessionState::Visualized => write!(f, "visualized"),
        }
    }
}

/// The active dataset and the results derived from it.
///
/// Sessions are passed to every [`Manager`](super::Manager) operation, so one
/// manager can serve several independent sessions.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    data: Option<Arc<DataFrame>>,
    file_name: String,
    summary: Option<Summary>,
    goals: Vec<Goal>,
    state: SessionState,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// An idle session with no dataset.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            data: None,
            file_name: String::new(),
            summary: None,
            goals: Vec::new(),
            state: SessionState::Idle,
        }
    }

    /// A session over an already loaded dataset.
    pub fn with_data(data: DataFrame, file_name: impl Into<String>) -> Self {
        let mut session = Self::new();
        session.set_data(data, file_name);
        session
    }

    /// Loads the dataset at `path` into a new session.
    pub fn load(path: impl AsRef<Path>) -> VizResult<Self> {
        let path = path.as_ref();
        let data = DataFrame::from_path(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::with_data(data, file_name))
    }

    /// Replaces the dataset and forgets everything derived from the old one.
    pub fn set_data(&mut self, data: DataFrame, file_name: impl Into<String>) {
        self.data = Some(Arc::new(data));
        self.file_name = file_name.into();
        self.summary = None;
        self.goals.clear();
        self.state = SessionState::Idle;
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn data(&self) -> Option<&Arc<DataFrame>> {
        self.data.as_ref()
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The most recent summary, once the session has been summarized.
    pub fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    /// The most recent goals, once goals have been generated.
    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub(crate) fn record_summary(&mut self, summary: Summary) {
        self.summary = Some(summary);
        self.goals.clear();
        self.state = SessionState::Summarized;
    }

    pub(crate) fn record_goals(&mut self, goals: Vec<Goal>) {
        self.goals = goals;
        self.state = SessionState::GoalsReady;
    }

    pub(crate) fn record_visualized(&mut self) {
        self.state = SessionState::Visualized;
    }
}
