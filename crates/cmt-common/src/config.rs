//! Runtime configuration.
//!
//! Everything is read from the environment once at startup; the CLI then
//! applies flag overrides through the `with_*` builders.

use std::env;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;
use tracing::warn;

const DEFAULT_AGENT_PROGRAM: &str = "claude";
const DEFAULT_COMMENT_TAG: &str = "CMT";
const DB_FILE_NAME: &str = "sessions.db";
const OUTPUT_DIR_NAME: &str = "output";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot determine home directory")]
    NoHomeDir,
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct CmtConfig {
    home: PathBuf,
    db_path: PathBuf,
    agent_program: String,
    prefix: String,
    comment_tag: String,
    autonomous: bool,
}

impl CmtConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let home = match non_empty_env("CMT_HOME") {
            Some(dir) => expand_home(&dir)?,
            None => dirs::home_dir()
                .ok_or(ConfigError::NoHomeDir)?
                .join(".config")
                .join("cmt"),
        };
        let db_path = match non_empty_env("CMT_DB") {
            Some(path) => expand_home(&path)?,
            None => home.join(DB_FILE_NAME),
        };

        Ok(Self {
            db_path,
            agent_program: non_empty_env("CMT_AGENT_BIN")
                .unwrap_or_else(|| DEFAULT_AGENT_PROGRAM.to_string()),
            prefix: env::var("CMT_PREFIX").unwrap_or_default(),
            comment_tag: non_empty_env("CMT_COMMENT_TAG")
                .unwrap_or_else(|| DEFAULT_COMMENT_TAG.to_string()),
            autonomous: parse_env_bool("CMT_AUTONOMOUS", false),
            home,
        })
    }

    /// Configuration rooted at `home` with no environment lookups.
    pub fn rooted_at(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            db_path: home.join(DB_FILE_NAME),
            agent_program: DEFAULT_AGENT_PROGRAM.to_string(),
            prefix: String::new(),
            comment_tag: DEFAULT_COMMENT_TAG.to_string(),
            autonomous: false,
            home,
        }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn output_dir(&self) -> PathBuf {
        self.home.join(OUTPUT_DIR_NAME)
    }

    /// Transcript location for a session; fixed for the life of the session.
    pub fn transcript_path(&self, session_id: &str) -> PathBuf {
        self.output_dir().join(format!("{session_id}.log"))
    }

    pub fn agent_program(&self) -> &str {
        &self.agent_program
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn comment_tag(&self) -> &str {
        &self.comment_tag
    }

    pub fn autonomous(&self) -> bool {
        self.autonomous
    }

    pub fn ensure_output_dir(&self) -> Result<PathBuf, ConfigError> {
        let dir = self.output_dir();
        std::fs::create_dir_all(&dir).map_err(|source| ConfigError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    pub fn with_agent_program(mut self, program: impl Into<String>) -> Self {
        self.agent_program = program.into();
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_comment_tag(mut self, tag: impl Into<String>) -> Self {
        self.comment_tag = tag.into();
        self
    }

    pub fn with_autonomous(mut self, autonomous: bool) -> Self {
        self.autonomous = autonomous;
        self
    }
}

/// Expands a leading `~/` against the user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf, ConfigError> {
    match path.strip_prefix("~/") {
        Some(rest) => Ok(dirs::home_dir().ok_or(ConfigError::NoHomeDir)?.join(rest)),
        None => Ok(PathBuf::from(path)),
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env_bool(key: &str, default: bool) -> bool {
    let Some(value) = non_empty_env(key) else {
        return default;
    };
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            warn!(value = %value, key, "Invalid boolean config; using default");
            default
        }
    }
}
