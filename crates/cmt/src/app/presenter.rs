//! Text rendering for session listings.
//!
//! Everything here builds strings; the handlers decide where they go.

use chrono::DateTime;
use chrono::Utc;
use cmt_common::Colors;
use cmt_store::Session;
use cmt_store::SessionStatus;

const DIRECTORY_WIDTH: usize = 30;
const COLUMN_GAP: usize = 2;
const ELLIPSIS: &str = "...";

/// Coarse age: `just now`, `5m ago`, `2h ago`, `3d ago`.
pub fn format_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(at);
    if elapsed.num_minutes() < 1 {
        "just now".to_string()
    } else if elapsed.num_hours() < 1 {
        format!("{}m ago", elapsed.num_minutes())
    } else if elapsed.num_days() < 1 {
        format!("{}h ago", elapsed.num_hours())
    } else {
        format!("{}d ago", elapsed.num_days())
    }
}

/// Keeps the tail of `path` so it fits in `max` characters.
pub fn shorten_path(path: &str, max: usize) -> String {
    let len = path.chars().count();
    if len <= max {
        return path.to_string();
    }
    let keep = max.saturating_sub(ELLIPSIS.len());
    let tail: String = path.chars().skip(len - keep).collect();
    format!("{ELLIPSIS}{tail}")
}

fn paint_status(status: SessionStatus, padded: &str) -> String {
    match status {
        SessionStatus::Working => Colors::success(padded),
        SessionStatus::Waiting => Colors::warning(padded),
        SessionStatus::Completed => Colors::info(padded),
        SessionStatus::Abandoned | SessionStatus::Killed => Colors::error(padded),
        SessionStatus::Deleted | SessionStatus::Restored => Colors::dim(padded),
    }
}

/// A left-aligned table. Cells are padded before coloring so escape codes
/// never skew the column widths.
struct Table {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn new(headers: Vec<&'static str>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn widths(&self) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(i))
                    .map(|cell| cell.chars().count())
                    .chain(std::iter::once(header.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    fn render(&self, paint: impl Fn(usize, usize, &str) -> String) -> String {
        let widths = self.widths();
        let pad = |column: usize, cell: &str| -> String {
            if column + 1 == widths.len() {
                return cell.to_string();
            }
            let fill = widths[column] + COLUMN_GAP - cell.chars().count();
            format!("{cell}{}", " ".repeat(fill))
        };

        let header: String = self
            .headers
            .iter()
            .enumerate()
            .map(|(column, title)| pad(column, title))
            .collect();
        let mut out = Colors::bold(&header);
        out.push('\n');
        for (row, cells) in self.rows.iter().enumerate() {
            for (column, cell) in cells.iter().enumerate() {
                out.push_str(&paint(row, column, &pad(column, cell)));
            }
            out.push('\n');
        }
        out
    }
}

pub fn render_sessions(sessions: &[Session], now: DateTime<Utc>) -> String {
    let mut table = Table::new(vec!["ID", "STATUS", "WORKFLOW", "DIRECTORY", "TMUX", "AGE"]);
    for session in sessions {
        table.push(vec![
            session.id.clone(),
            session.status.to_string(),
            session.workflow_type.to_string(),
            shorten_path(
                &session.working_directory.to_string_lossy(),
                DIRECTORY_WIDTH,
            ),
            session.tmux.to_string(),
            format_age(session.created_at, now),
        ]);
    }
    table.render(|row, column, cell| match column {
        0 => Colors::session_id(cell),
        1 => paint_status(sessions[row].status, cell),
        _ => cell.to_string(),
    })
}

pub fn render_trash(sessions: &[Session], now: DateTime<Utc>) -> String {
    let mut table = Table::new(vec!["ID", "WORKFLOW", "DIRECTORY", "TASK", "DELETED"]);
    for session in sessions {
        table.push(vec![
            session.id.clone(),
            session.workflow_type.to_string(),
            shorten_path(
                &session.working_directory.to_string_lossy(),
                DIRECTORY_WIDTH,
            ),
            shorten_path(&session.task_description, DIRECTORY_WIDTH),
            session
                .deleted_at
                .map(|at| format_age(at, now))
                .unwrap_or_default(),
        ]);
    }
    table.render(|_, column, cell| match column {
        0 => Colors::session_id(cell),
        _ => cell.to_string(),
    })
}
