#![expect(clippy::print_stdout, reason = "CLI output is emitted here")]
#![expect(clippy::print_stderr, reason = "CLI output is emitted here")]

use std::io::Read;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use chrono::Utc;
use cmt_common::CmtConfig;
use cmt_common::Colors;
use cmt_runner::CommandKind;
use cmt_runner::HostIo;
use cmt_runner::RunOptions;
use cmt_runner::Runner;
use cmt_runner::SessionControl;
use cmt_runner::attach_files;
use cmt_store::PRUNE_RETENTION_DAYS;
use cmt_store::SessionStatus;
use cmt_store::SessionStore;
use cmt_terminal::Location;
use cmt_terminal::Multiplexer;
use cmt_terminal::Tmux;
use tracing::info;

use crate::app::commands::LaunchRequest;
use crate::app::presenter;

const QUICK_MODEL: &str = "haiku";
const STDIN_PROMPT: &str = "-";

pub struct HandlerContext {
    pub config: CmtConfig,
    pub store: Arc<SessionStore>,
    pub autonomous: bool,
}

impl HandlerContext {
    pub fn new(config: CmtConfig, store: Arc<SessionStore>, autonomous: bool) -> Self {
        Self {
            config,
            store,
            autonomous,
        }
    }

    fn control(&self) -> SessionControl {
        SessionControl::new(Arc::clone(&self.store))
    }
}

/// Turns a parsed launching command into runner options.
pub fn run_options(request: LaunchRequest, autonomous: bool) -> Result<RunOptions> {
    let task = attach_files(&request.task, &request.files)?;
    let mut options = RunOptions::new(request.kind, task).autonomous(autonomous);
    if request.kind == CommandKind::Quick {
        options = options.model(QUICK_MODEL).print_mode(true);
    }
    if let Some(target) = request.resume {
        options = options.resume(target);
    }
    if let Some(tag) = request.comment_tag {
        options = options.comment_tag(tag);
    }
    Ok(options)
}

pub fn handle_launch(ctx: &HandlerContext, mut request: LaunchRequest) -> Result<()> {
    if request.kind == CommandKind::Quick && request.task == STDIN_PROMPT {
        let mut prompt = String::new();
        std::io::stdin()
            .read_to_string(&mut prompt)
            .context("failed to read prompt from stdin")?;
        request.task = prompt;
    }
    let options = run_options(request, ctx.autonomous)?;

    let runner = Runner::new(
        Arc::clone(&ctx.store),
        ctx.config.clone(),
        Arc::new(Tmux::new()),
    );
    let outcome = runner.run(&options, HostIo::stdio())?;
    info!(session_id = %outcome.session_id, "Run finished");
    eprintln!(
        "{} session {} completed",
        Colors::success("✓"),
        Colors::session_id(&outcome.session_id)
    );
    Ok(())
}

pub fn handle_sessions(
    ctx: &HandlerContext,
    status: Option<SessionStatus>,
    limit: usize,
    trash: bool,
    json: bool,
) -> Result<()> {
    let mut sessions = if trash {
        ctx.store.list_deleted()?
    } else {
        ctx.store.list(status)?
    };
    if limit > 0 {
        sessions.truncate(limit);
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&sessions).context("failed to encode sessions")?
        );
        return Ok(());
    }

    if sessions.is_empty() {
        let message = if trash {
            "Trash is empty."
        } else {
            "No sessions found."
        };
        println!("{}", Colors::dim(message));
        return Ok(());
    }

    let now = Utc::now();
    let table = if trash {
        presenter::render_trash(&sessions, now)
    } else {
        presenter::render_sessions(&sessions, now)
    };
    print!("{table}");
    Ok(())
}

pub fn handle_jump(ctx: &HandlerContext, id: &str) -> Result<()> {
    let session = ctx.control().resolve(id)?;
    let location = Location {
        session: session.tmux.session.clone(),
        window: session.tmux.window,
        pane: session.tmux.pane,
    };
    Tmux::new()
        .jump_to(&location)
        .with_context(|| format!("failed to jump to {location}"))?;
    println!(
        "Jumped to {} (session {})",
        location,
        Colors::session_id(&session.id)
    );
    Ok(())
}

pub fn handle_kill(ctx: &HandlerContext, id: &str) -> Result<()> {
    let session = ctx.control().stop(id)?;
    println!(
        "{} Killed session {}",
        Colors::success("✓"),
        Colors::session_id(&session.id)
    );
    Ok(())
}

pub fn handle_delete(ctx: &HandlerContext, id: &str) -> Result<()> {
    let session = ctx.control().trash(id)?;
    println!(
        "{} Moved session {} to trash",
        Colors::success("✓"),
        Colors::session_id(&session.id)
    );
    Ok(())
}

pub fn handle_restore(ctx: &HandlerContext, id: &str) -> Result<()> {
    let session = ctx.control().restore(id)?;
    println!(
        "{} Restored session {}",
        Colors::success("✓"),
        Colors::session_id(&session.id)
    );
    Ok(())
}

pub fn handle_prune(ctx: &HandlerContext) -> Result<()> {
    let pruned = ctx.control().prune()?;
    println!(
        "Pruned {} session(s) deleted more than {} days ago",
        pruned, PRUNE_RETENTION_DAYS
    );
    Ok(())
}
