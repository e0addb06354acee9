use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use clap::ValueHint;
use cmt_runner::CommandKind;
use cmt_runner::ResumeTarget;
use cmt_store::SessionStatus;

const AFTER_LONG_HELP: &str = r#"ENVIRONMENT:
    CMT_HOME          Config directory (default ~/.config/cmt)
    CMT_DB            Session database (default $CMT_HOME/sessions.db)
    CMT_AGENT_BIN     Agent executable (default claude)
    CMT_PREFIX        Tag recorded on every new session
    CMT_COMMENT_TAG   Default tag for look-and-fix (default CMT)
    CMT_AUTONOMOUS    Skip the agent's permission prompts
    CMT_LOG           Write logs to this file
    RUST_LOG          Log filter

EXAMPLES:
    cmt new "add a --json flag to the export command"
    cmt research "how sessions are persisted"
    cmt fix-test -f tests/cli_smoke.rs test_prune_reports_count
    cmt sessions --status working
    cmt jump last"#;

#[derive(Debug, Parser)]
#[command(name = "cmt")]
#[command(author, version, propagate_version = true)]
#[command(about = "Launch and track AI coding-agent sessions inside tmux")]
#[command(after_long_help = AFTER_LONG_HELP)]
#[command(subcommand_required = true, arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Session database path (overrides CMT_DB)
    #[arg(long, global = true, value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub db: Option<String>,

    /// Let the agent run without permission prompts
    #[arg(short, long, global = true)]
    pub autonomous: bool,

    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Paths prepended to the task, repeatable.
#[derive(Debug, Clone, Default, Args)]
pub struct FileArgs {
    #[arg(short = 'f', long = "file", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start a general agent session
    New {
        /// Initial task or prompt
        task: Option<String>,

        /// Resume a previous conversation from the agent's picker
        #[arg(short, long, conflicts_with = "resume_id")]
        resume: bool,

        /// Resume a specific agent conversation
        #[arg(long, value_name = "ID")]
        resume_id: Option<String>,

        #[command(flatten)]
        files: FileArgs,
    },

    /// Research the codebase
    Research {
        topic: String,

        #[command(flatten)]
        files: FileArgs,
    },

    /// Write an implementation plan
    Plan {
        task: String,

        #[command(flatten)]
        files: FileArgs,
    },

    /// Implement a plan
    Implement {
        plan: String,

        #[command(flatten)]
        files: FileArgs,
    },

    /// Fix a failing test
    FixTest {
        test: String,

        #[command(flatten)]
        files: FileArgs,
    },

    /// Find tagged comments and propose fixes
    LookAndFix {
        issue: String,

        /// Comment tag to search for (overrides CMT_COMMENT_TAG)
        #[arg(long, value_name = "TAG")]
        comment_tag: Option<String>,

        #[command(flatten)]
        files: FileArgs,
    },

    /// Single-response query on a small model; `-` reads the prompt from stdin
    Quick {
        prompt: String,

        #[command(flatten)]
        files: FileArgs,
    },

    /// List tracked sessions
    Sessions {
        #[arg(short, long, value_enum)]
        status: Option<StatusFilter>,

        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        /// Show the trash instead
        #[arg(long)]
        trash: bool,

        #[arg(long)]
        json: bool,
    },

    /// Switch tmux to the pane a session was started from
    Jump {
        /// Session id, or `last`
        session: String,
    },

    /// Kill a running session's agent
    Kill { session: String },

    /// Move a session to the trash
    Delete { session: String },

    /// Bring a session back from the trash
    Restore { session: String },

    /// Permanently remove sessions trashed more than 7 days ago
    Prune,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusFilter {
    Waiting,
    Working,
    Completed,
    Abandoned,
    Killed,
    Restored,
}

impl From<StatusFilter> for SessionStatus {
    fn from(filter: StatusFilter) -> Self {
        match filter {
            StatusFilter::Waiting => SessionStatus::Waiting,
            StatusFilter::Working => SessionStatus::Working,
            StatusFilter::Completed => SessionStatus::Completed,
            StatusFilter::Abandoned => SessionStatus::Abandoned,
            StatusFilter::Killed => SessionStatus::Killed,
            StatusFilter::Restored => SessionStatus::Restored,
        }
    }
}

/// Everything a launching command contributes to a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub kind: CommandKind,
    pub task: String,
    pub files: Vec<PathBuf>,
    pub resume: Option<ResumeTarget>,
    pub comment_tag: Option<String>,
}

impl LaunchRequest {
    fn new(kind: CommandKind, task: &str, files: &FileArgs) -> Self {
        Self {
            kind,
            task: task.to_string(),
            files: files.files.clone(),
            resume: None,
            comment_tag: None,
        }
    }
}

impl Commands {
    /// `None` for commands that only read or edit the session list.
    pub fn launch_request(&self) -> Option<LaunchRequest> {
        let request = match self {
            Commands::New {
                task,
                resume,
                resume_id,
                files,
            } => {
                let mut request =
                    LaunchRequest::new(CommandKind::New, task.as_deref().unwrap_or(""), files);
                request.resume = match resume_id {
                    Some(id) if !id.is_empty() => Some(ResumeTarget::Session(id.clone())),
                    _ if *resume => Some(ResumeTarget::Picker),
                    _ => None,
                };
                request
            }
            Commands::Research { topic, files } => {
                LaunchRequest::new(CommandKind::Research, topic, files)
            }
            Commands::Plan { task, files } => LaunchRequest::new(CommandKind::Plan, task, files),
            Commands::Implement { plan, files } => {
                LaunchRequest::new(CommandKind::Implement, plan, files)
            }
            Commands::FixTest { test, files } => {
                LaunchRequest::new(CommandKind::FixTest, test, files)
            }
            Commands::LookAndFix {
                issue,
                comment_tag,
                files,
            } => {
                let mut request = LaunchRequest::new(CommandKind::LookAndFix, issue, files);
                request.comment_tag = comment_tag.clone();
                request
            }
            Commands::Quick { prompt, files } => {
                LaunchRequest::new(CommandKind::Quick, prompt, files)
            }
            Commands::Sessions { .. }
            | Commands::Jump { .. }
            | Commands::Kill { .. }
            | Commands::Delete { .. }
            | Commands::Restore { .. }
            | Commands::Prune => return None,
        };
        Some(request)
    }
}
