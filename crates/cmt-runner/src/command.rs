//! Agent command-line construction.
//!
//! Everything here is a pure function of [`RunOptions`].

use std::path::Path;
use std::path::PathBuf;

use crate::error::RunError;
use crate::prompt::CommandKind;

/// Which prior agent conversation to resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeTarget {
    /// Let the agent show its own picker.
    Picker,
    Session(String),
}

impl ResumeTarget {
    pub fn agent_session_id(&self) -> Option<&str> {
        match self {
            ResumeTarget::Picker => None,
            ResumeTarget::Session(id) => Some(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub command: CommandKind,
    pub task: String,
    pub working_dir: Option<PathBuf>,
    pub model: Option<String>,
    pub print_mode: bool,
    pub autonomous: bool,
    /// Overrides the configured look-and-fix tag.
    pub comment_tag: Option<String>,
    pub resume: Option<ResumeTarget>,
}

impl RunOptions {
    pub fn new(command: CommandKind, task: impl Into<String>) -> Self {
        Self {
            command,
            task: task.into(),
            working_dir: None,
            model: None,
            print_mode: false,
            autonomous: false,
            comment_tag: None,
            resume: None,
        }
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn print_mode(mut self, enabled: bool) -> Self {
        self.print_mode = enabled;
        self
    }

    pub fn autonomous(mut self, enabled: bool) -> Self {
        self.autonomous = enabled;
        self
    }

    pub fn comment_tag(mut self, tag: impl Into<String>) -> Self {
        self.comment_tag = Some(tag.into());
        self
    }

    pub fn resume(mut self, target: ResumeTarget) -> Self {
        self.resume = Some(target);
        self
    }

    /// The positional prompt, or `None` when there is no task.
    pub fn prompt(&self, default_comment_tag: &str) -> Option<String> {
        if self.task.is_empty() {
            return None;
        }
        let tag = self.comment_tag.as_deref().unwrap_or(default_comment_tag);
        Some(match self.command.prompt_prefix(tag) {
            Some(prefix) => format!("{prefix} {}", self.task),
            None => self.task.clone(),
        })
    }
}

/// Arguments for the agent binary, in the order it expects them.
pub fn build_args(options: &RunOptions, default_comment_tag: &str) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(model) = options.model.as_deref().filter(|m| !m.is_empty()) {
        args.extend(["--model".to_string(), model.to_string()]);
    }
    if options.print_mode {
        args.push("-p".to_string());
    }
    if options.autonomous {
        args.push("--dangerously-skip-permissions".to_string());
    }
    match &options.resume {
        Some(ResumeTarget::Picker) => args.push("--resume".to_string()),
        Some(ResumeTarget::Session(id)) => {
            args.extend(["--resume".to_string(), id.clone()]);
        }
        None => {}
    }
    if let Some(prompt) = options.prompt(default_comment_tag) {
        args.push(prompt);
    }
    args
}

/// Prepends `files` to `task`, space separated. Every file must exist.
pub fn attach_files(task: &str, files: &[PathBuf]) -> Result<String, RunError> {
    if files.is_empty() {
        return Ok(task.to_string());
    }
    let mut parts = Vec::with_capacity(files.len() + 1);
    for file in files {
        if !Path::new(file).exists() {
            return Err(RunError::MissingFile(file.clone()));
        }
        parts.push(file.to_string_lossy().into_owned());
    }
    parts.push(task.to_string());
    Ok(parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn args(options: RunOptions) -> Vec<String> {
        build_args(&options, "CMT")
    }

    #[test]
    fn test_build_args_table() {
        let cases: Vec<(RunOptions, Vec<&str>)> = vec![
            (RunOptions::new(CommandKind::New, ""), vec![]),
            (RunOptions::new(CommandKind::New, "add a flag"), vec!["add a flag"]),
            (
                RunOptions::new(CommandKind::Research, "auth flow"),
                vec!["/research_codebase auth flow"],
            ),
            (RunOptions::new(CommandKind::Plan, ""), vec![]),
            (
                RunOptions::new(CommandKind::Quick, "what is 2+2")
                    .model("haiku")
                    .print_mode(true),
                vec!["--model", "haiku", "-p", "what is 2+2"],
            ),
            (
                RunOptions::new(CommandKind::FixTest, "tests/a.rs")
                    .autonomous(true)
                    .resume(ResumeTarget::Picker),
                vec![
                    "--dangerously-skip-permissions",
                    "--resume",
                    "Analyze and fix the failing test at: tests/a.rs",
                ],
            ),
            (
                RunOptions::new(CommandKind::New, "")
                    .model("opus")
                    .print_mode(true)
                    .autonomous(true)
                    .resume(ResumeTarget::Session("conv-1".into())),
                vec![
                    "--model",
                    "opus",
                    "-p",
                    "--dangerously-skip-permissions",
                    "--resume",
                    "conv-1",
                ],
            ),
            (
                RunOptions::new(CommandKind::New, "x").model(""),
                vec!["x"],
            ),
        ];

        for (options, expected) in cases {
            assert_eq!(args(options.clone()), expected, "{options:?}");
        }
    }

    #[test]
    fn test_look_and_fix_uses_override_then_default_tag() {
        let options = RunOptions::new(CommandKind::LookAndFix, "Parser");
        let prompt = options.prompt("TODO").unwrap();
        assert!(prompt.contains("tagged with TODO and"));
        assert!(prompt.ends_with("specific file or class. Parser"));

        let prompt = options.clone().comment_tag("HACK").prompt("TODO").unwrap();
        assert!(prompt.contains("tagged with HACK and"));

        let prompt = options.comment_tag("").prompt("").unwrap();
        assert!(prompt.contains("tagged with CMT and"));
    }

    #[test]
    fn test_resume_target_session_id() {
        assert_eq!(ResumeTarget::Picker.agent_session_id(), None);
        assert_eq!(
            ResumeTarget::Session("abc".into()).agent_session_id(),
            Some("abc")
        );
    }

    #[test]
    fn test_attach_files() {
        let dir = tempfile::tempdir().unwrap();
        let plan = dir.path().join("plan.md");
        std::fs::write(&plan, "# plan").unwrap();

        assert_eq!(attach_files("task", &[]).unwrap(), "task");
        assert_eq!(
            attach_files("do it", std::slice::from_ref(&plan)).unwrap(),
            format!("{} do it", plan.display())
        );

        let missing = dir.path().join("missing.md");
        assert!(matches!(
            attach_files("do it", &[plan, missing.clone()]),
            Err(RunError::MissingFile(path)) if path == missing
        ));
    }

    proptest! {
        #[test]
        fn prop_prompt_is_last_and_only_positional(task in "[a-z ]{0,20}", print in any::<bool>(), autonomous in any::<bool>()) {
            let options = RunOptions::new(CommandKind::Plan, task.clone())
                .print_mode(print)
                .autonomous(autonomous);
            let args = build_args(&options, "CMT");
            let flags = usize::from(print) + usize::from(autonomous);
            if task.is_empty() {
                prop_assert_eq!(args.len(), flags);
            } else {
                prop_assert_eq!(args.len(), flags + 1);
                prop_assert_eq!(args.last().cloned(), Some(format!("/create_plan {task}")));
            }
        }
    }
}
