//! Launch commands and the prompt text each one prepends.

use std::borrow::Cow;
use std::fmt;

use cmt_store::WorkflowType;

pub const DEFAULT_COMMENT_TAG: &str = "CMT";

const RESEARCH_PREFIX: &str = "/research_codebase";
const PLAN_PREFIX: &str = "/create_plan";
const IMPLEMENT_PREFIX: &str =
    "/implement_plan implement all phases ignoring any manual verification steps";
const FIX_TEST_PREFIX: &str = "Analyze and fix the failing test at:";

/// A cmt command that starts an agent session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    New,
    Research,
    Plan,
    Implement,
    FixTest,
    LookAndFix,
    Quick,
}

impl CommandKind {
    pub const ALL: [CommandKind; 7] = [
        CommandKind::New,
        CommandKind::Research,
        CommandKind::Plan,
        CommandKind::Implement,
        CommandKind::FixTest,
        CommandKind::LookAndFix,
        CommandKind::Quick,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::New => "new",
            CommandKind::Research => "research",
            CommandKind::Plan => "plan",
            CommandKind::Implement => "implement",
            CommandKind::FixTest => "fix-test",
            CommandKind::LookAndFix => "look-and-fix",
            CommandKind::Quick => "quick",
        }
    }

    pub fn workflow(self) -> WorkflowType {
        match self {
            CommandKind::New | CommandKind::Quick => WorkflowType::General,
            CommandKind::Research => WorkflowType::Research,
            CommandKind::Plan => WorkflowType::Plan,
            CommandKind::Implement => WorkflowType::Implement,
            CommandKind::FixTest | CommandKind::LookAndFix => WorkflowType::Fix,
        }
    }

    /// Text placed before the task. `comment_tag` only matters for
    /// look-and-fix and falls back to `CMT` when blank.
    pub fn prompt_prefix(self, comment_tag: &str) -> Option<Cow<'static, str>> {
        match self {
            CommandKind::New | CommandKind::Quick => None,
            CommandKind::Research => Some(Cow::Borrowed(RESEARCH_PREFIX)),
            CommandKind::Plan => Some(Cow::Borrowed(PLAN_PREFIX)),
            CommandKind::Implement => Some(Cow::Borrowed(IMPLEMENT_PREFIX)),
            CommandKind::FixTest => Some(Cow::Borrowed(FIX_TEST_PREFIX)),
            CommandKind::LookAndFix => {
                let tag = match comment_tag.trim() {
                    "" => DEFAULT_COMMENT_TAG,
                    tag => tag,
                };
                Some(Cow::Owned(format!(
                    "Take a look at this repo and search for comments tagged with {tag} \
                     and propose how to solve them. If a class name or filename is provided \
                     as a parameter, focus the search on that specific file or class."
                )))
            }
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
