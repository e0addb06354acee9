//! ANSI color helpers for human-facing CLI output.

use std::io::IsTerminal;
use std::sync::OnceLock;

static NO_COLOR: OnceLock<bool> = OnceLock::new();

/// Decides once per process whether color is emitted.
pub fn init(no_color_flag: bool) {
    let _ = NO_COLOR.set(
        no_color_flag || std::env::var("NO_COLOR").is_ok() || !std::io::stdout().is_terminal(),
    );
}

pub fn is_disabled() -> bool {
    *NO_COLOR.get().unwrap_or(&false)
}

const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy)]
enum Paint {
    Green,
    Red,
    Yellow,
    Cyan,
    Dim,
    Bold,
    BoldCyan,
}

impl Paint {
    fn prefix(self) -> &'static str {
        match self {
            Paint::Green => "\x1b[32m",
            Paint::Red => "\x1b[31m",
            Paint::Yellow => "\x1b[33m",
            Paint::Cyan => "\x1b[36m",
            Paint::Dim => "\x1b[90m",
            Paint::Bold => "\x1b[1m",
            Paint::BoldCyan => "\x1b[1m\x1b[36m",
        }
    }

    fn apply(self, text: &str) -> String {
        if is_disabled() {
            return text.to_string();
        }
        let prefix = self.prefix();
        let mut out = String::with_capacity(prefix.len() + text.len() + RESET.len());
        out.push_str(prefix);
        out.push_str(text);
        out.push_str(RESET);
        out
    }
}

pub struct Colors;

impl Colors {
    pub fn success(text: &str) -> String {
        Paint::Green.apply(text)
    }

    pub fn error(text: &str) -> String {
        Paint::Red.apply(text)
    }

    pub fn warning(text: &str) -> String {
        Paint::Yellow.apply(text)
    }

    pub fn info(text: &str) -> String {
        Paint::Cyan.apply(text)
    }

    pub fn dim(text: &str) -> String {
        Paint::Dim.apply(text)
    }

    pub fn bold(text: &str) -> String {
        Paint::Bold.apply(text)
    }

    pub fn session_id(text: &str) -> String {
        Paint::BoldCyan.apply(text)
    }
}
