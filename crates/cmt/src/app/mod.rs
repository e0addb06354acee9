#![expect(clippy::print_stderr, reason = "CLI output is emitted here")]

use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use cmt_common::CmtConfig;
use cmt_common::Colors;
use cmt_common::color_init;
use cmt_common::expand_home;
use cmt_common::telemetry;
use cmt_runner::ControlError;
use cmt_runner::RunError;
use cmt_store::SessionStore;
use cmt_store::StoreError;
use tracing::debug;

pub mod commands;
pub mod handlers;
pub mod presenter;

use crate::app::commands::Cli;
use crate::app::commands::Commands;
use crate::app::commands::LaunchRequest;
use crate::app::handlers::HandlerContext;

const PROGRAM_NAME: &str = "cmt";

mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
}

pub struct Application;

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Application {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&self) -> Result<i32> {
        let exit_code = match self.execute() {
            Ok(()) => exit_codes::SUCCESS,
            Err(e) => self.handle_error(e),
        };
        Ok(exit_code)
    }

    fn execute(&self) -> Result<()> {
        let cli = Cli::parse();
        let _telemetry = telemetry::init_tracing(if cli.verbose { "debug" } else { "warn" });
        color_init(cli.no_color);
        debug!(command = ?cli.command, db = ?cli.db, "CLI command parsed");

        let ctx = self.context(&cli)?;
        self.dispatch_command(&ctx, cli.command)
    }

    fn context(&self, cli: &Cli) -> Result<HandlerContext> {
        let mut config = CmtConfig::from_env().context("failed to load configuration")?;
        if let Some(db) = cli.db.as_deref().filter(|db| !db.is_empty()) {
            config = config.with_db_path(expand_home(db)?);
        }
        let store = SessionStore::open(config.db_path()).with_context(|| {
            format!(
                "failed to open session database {}",
                config.db_path().display()
            )
        })?;
        let autonomous = cli.autonomous || config.autonomous();
        Ok(HandlerContext::new(config, Arc::new(store), autonomous))
    }

    fn dispatch_command(&self, ctx: &HandlerContext, command: Commands) -> Result<()> {
        match command {
            launch @ (Commands::New { .. }
            | Commands::Research { .. }
            | Commands::Plan { .. }
            | Commands::Implement { .. }
            | Commands::FixTest { .. }
            | Commands::LookAndFix { .. }
            | Commands::Quick { .. }) => handlers::handle_launch(ctx, launch_request_for(&launch)?),
            Commands::Sessions {
                status,
                limit,
                trash,
                json,
            } => handlers::handle_sessions(ctx, status.map(Into::into), limit, trash, json),
            Commands::Jump { session } => handlers::handle_jump(ctx, &session),
            Commands::Kill { session } => handlers::handle_kill(ctx, &session),
            Commands::Delete { session } => handlers::handle_delete(ctx, &session),
            Commands::Restore { session } => handlers::handle_restore(ctx, &session),
            Commands::Prune => handlers::handle_prune(ctx),
        }
    }

    fn handle_error(&self, e: anyhow::Error) -> i32 {
        eprintln!(
            "{}: {} {}",
            PROGRAM_NAME,
            Colors::error("Error:"),
            error_chain(&e)
        );
        if let Some(suggestion) = suggestion_for(&e) {
            eprintln!("{} {}", Colors::dim("Suggestion:"), suggestion);
        }
        exit_codes::GENERAL_ERROR
    }
}

fn launch_request_for(command: &Commands) -> Result<LaunchRequest> {
    command
        .launch_request()
        .with_context(|| format!("{command:?} does not launch an agent"))
}

/// Joins the cause chain, skipping causes a wrapper already spelled out.
fn error_chain(err: &anyhow::Error) -> String {
    let mut message = String::new();
    for cause in err.chain() {
        let text = cause.to_string();
        if message.contains(&text) {
            continue;
        }
        if !message.is_empty() {
            message.push_str(": ");
        }
        message.push_str(&text);
    }
    message
}

fn find_error<T: std::error::Error + 'static>(err: &anyhow::Error) -> Option<&T> {
    err.chain().find_map(|cause| cause.downcast_ref::<T>())
}

fn suggestion_for(err: &anyhow::Error) -> Option<String> {
    if let Some(run_error) = find_error::<RunError>(err) {
        return run_error.suggestion();
    }
    if let Some(control_error) = find_error::<ControlError>(err) {
        return match control_error {
            ControlError::NotFound(_) | ControlError::NoSessions => {
                Some("Run 'cmt sessions' to see known session ids.".to_string())
            }
            ControlError::NotDeleted { .. } => {
                Some("Run 'cmt sessions --trash' to see deleted sessions.".to_string())
            }
            ControlError::NotRunning { .. } => None,
            ControlError::Store(store) => store.suggestion().map(str::to_string),
        };
    }
    find_error::<StoreError>(err)
        .and_then(StoreError::suggestion)
        .map(str::to_string)
}
