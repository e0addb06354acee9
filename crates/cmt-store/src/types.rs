use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::error::StoreError;

/// The kind of work a session was launched for. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowType {
    General,
    Research,
    Plan,
    Implement,
    Fix,
}

impl WorkflowType {
    pub const ALL: [WorkflowType; 5] = [
        WorkflowType::General,
        WorkflowType::Research,
        WorkflowType::Plan,
        WorkflowType::Implement,
        WorkflowType::Fix,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowType::General => "general",
            WorkflowType::Research => "research",
            WorkflowType::Plan => "plan",
            WorkflowType::Implement => "implement",
            WorkflowType::Fix => "fix",
        }
    }
}

impl fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| StoreError::InvalidValue {
                field: "workflow_type",
                value: s.to_string(),
            })
    }
}

/// Lifecycle status of a session.
///
/// `waiting` and `working` alternate while the agent runs; `completed`,
/// `abandoned` and `killed` end a run; `deleted` and `restored` belong to
/// the trash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Waiting,
    Working,
    Completed,
    Abandoned,
    Killed,
    Deleted,
    Restored,
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 7] = [
        SessionStatus::Waiting,
        SessionStatus::Working,
        SessionStatus::Completed,
        SessionStatus::Abandoned,
        SessionStatus::Killed,
        SessionStatus::Deleted,
        SessionStatus::Restored,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Waiting => "waiting",
            SessionStatus::Working => "working",
            SessionStatus::Completed => "completed",
            SessionStatus::Abandoned => "abandoned",
            SessionStatus::Killed => "killed",
            SessionStatus::Deleted => "deleted",
            SessionStatus::Restored => "restored",
        }
    }

    /// The agent is still attached to a pane.
    pub fn is_running(self) -> bool {
        matches!(self, SessionStatus::Waiting | SessionStatus::Working)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| StoreError::InvalidValue {
                field: "status",
                value: s.to_string(),
            })
    }
}

/// tmux pane the session was launched from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TmuxLocation {
    pub session: String,
    pub window: u32,
    pub pane: u32,
}

impl fmt::Display for TmuxLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.session, self.window, self.pane)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub workflow_type: WorkflowType,
    pub status: SessionStatus,
    pub working_directory: PathBuf,
    pub task_description: String,
    pub prefix: String,
    pub agent_session_id: Option<String>,
    pub tmux: TmuxLocation,
    pub output_file: PathBuf,
    pub pid: Option<u32>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Session {
    /// A fresh `waiting` session. Timestamps are assigned by the store on insert.
    pub fn new(
        id: impl Into<String>,
        workflow_type: WorkflowType,
        working_directory: impl Into<PathBuf>,
        tmux: TmuxLocation,
        output_file: impl Into<PathBuf>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            updated_at: now,
            workflow_type,
            status: SessionStatus::Waiting,
            working_directory: working_directory.into(),
            task_description: String::new(),
            prefix: String::new(),
            agent_session_id: None,
            tmux,
            output_file: output_file.into(),
            pid: None,
            deleted_at: None,
        }
    }

    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task_description = task.into();
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_agent_session_id(mut self, agent_session_id: Option<String>) -> Self {
        self.agent_session_id = agent_session_id;
        self
    }
}
