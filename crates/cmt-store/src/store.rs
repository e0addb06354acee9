use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;

use chrono::DateTime;
use chrono::NaiveDateTime;
use chrono::Utc;
use cmt_common::expand_home;
use cmt_common::mutex_lock_or_recover;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Params;
use rusqlite::Row;
use rusqlite::params;
use tracing::debug;
use tracing::info;

use crate::error::StoreError;
use crate::process::is_process_alive;
use crate::types::Session;
use crate::types::SessionStatus;
use crate::types::TmuxLocation;

/// Soft-deleted sessions older than this are removed by `prune_deleted`.
pub const PRUNE_RETENTION_DAYS: u32 = 7;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    workflow_type TEXT NOT NULL,
    status TEXT NOT NULL,
    working_directory TEXT NOT NULL,
    task_description TEXT,
    prefix TEXT,
    claude_session_id TEXT,
    tmux_session TEXT NOT NULL,
    tmux_window INTEGER NOT NULL,
    tmux_pane INTEGER NOT NULL,
    output_file TEXT,
    pid INTEGER,
    deleted_at DATETIME
);
CREATE INDEX IF NOT EXISTS idx_sessions_created ON sessions(created_at);
CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions(status);
";

/// Column list for session queries; must match `read_row`.
const SESSION_COLUMNS: &str = "id, created_at, updated_at, workflow_type, status, \
    working_directory, task_description, prefix, claude_session_id, tmux_session, \
    tmux_window, tmux_pane, output_file, pid, deleted_at";

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

/// SQLite-backed session store.
///
/// Shared between the executor, its activity monitor and the CLI behind an
/// `Arc`; the connection is serialised by an internal mutex.
pub struct SessionStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SessionStore {
    /// Opens or creates the database at `path`, migrates it and runs the
    /// stuck-session recovery scan.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = expand_home(&path.as_ref().to_string_lossy())?;
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| StoreError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(&path).map_err(StoreError::sqlite("open database"))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(StoreError::sqlite("enable WAL mode"))?;
        conn.execute_batch(SCHEMA)
            .map_err(StoreError::sqlite("create schema"))?;
        migrate(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            path,
        };
        store.recover()?;
        debug!(path = %store.path.display(), "Opened session store");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        mutex_lock_or_recover(&self.conn)
    }

    /// Marks every `working` session whose pid is no longer alive as
    /// `abandoned`. Returns the ids that were repaired.
    pub fn recover(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id, pid FROM sessions WHERE status = 'working' AND pid IS NOT NULL")
            .map_err(StoreError::sqlite("query stuck sessions"))?;
        let candidates = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(StoreError::sqlite("query stuck sessions"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::sqlite("read stuck sessions"))?;

        let stuck: Vec<String> = candidates
            .into_iter()
            .filter(|(_, pid)| !is_process_alive(*pid))
            .map(|(id, _)| id)
            .collect();
        for id in &stuck {
            conn.execute(
                "UPDATE sessions SET status = 'abandoned', updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
                params![id],
            )
            .map_err(StoreError::sqlite("mark session abandoned"))?;
        }
        if !stuck.is_empty() {
            info!(count = stuck.len(), ids = ?stuck, "Recovered stuck sessions");
        }
        Ok(stuck)
    }

    pub fn create(&self, session: &Session) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO sessions (
                    id, workflow_type, status, working_directory, task_description, prefix,
                    claude_session_id, tmux_session, tmux_window, tmux_pane, output_file, pid
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    session.id,
                    session.workflow_type.as_str(),
                    session.status.as_str(),
                    session.working_directory.to_string_lossy(),
                    session.task_description,
                    session.prefix,
                    session.agent_session_id,
                    session.tmux.session,
                    session.tmux.window,
                    session.tmux.pane,
                    session.output_file.to_string_lossy(),
                    session.pid,
                ],
            )
            .map_err(StoreError::sqlite("insert session"))?;
        info!(
            session_id = %session.id,
            workflow = %session.workflow_type,
            location = %session.tmux,
            "Session created"
        );
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let conn = self.conn();
        let raw = conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
                params![id],
                read_row,
            )
            .optional()
            .map_err(StoreError::sqlite("get session"))?;
        raw.map(Session::try_from).transpose()
    }

    /// Most recently created session, trash included.
    pub fn last(&self) -> Result<Option<Session>, StoreError> {
        let conn = self.conn();
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY created_at DESC, rowid DESC LIMIT 1"
                ),
                [],
                read_row,
            )
            .optional()
            .map_err(StoreError::sqlite("get last session"))?;
        raw.map(Session::try_from).transpose()
    }

    /// Sessions newest first. Without a filter, deleted sessions are left out.
    pub fn list(&self, status: Option<SessionStatus>) -> Result<Vec<Session>, StoreError> {
        match status {
            Some(status) => self.query(
                "list sessions",
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions WHERE status = ?1 \
                     ORDER BY created_at DESC, rowid DESC"
                ),
                params![status.as_str()],
            ),
            None => self.query(
                "list sessions",
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions WHERE status != 'deleted' \
                     ORDER BY created_at DESC, rowid DESC"
                ),
                [],
            ),
        }
    }

    /// The trash, most recently deleted first.
    pub fn list_deleted(&self) -> Result<Vec<Session>, StoreError> {
        self.query(
            "list deleted sessions",
            &format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE status = 'deleted' \
                 ORDER BY deleted_at DESC, rowid DESC"
            ),
            [],
        )
    }

    /// Rewrites every mutable column of an existing session.
    pub fn update(&self, session: &Session) -> Result<(), StoreError> {
        self.execute_one(
            "update session",
            &session.id,
            "UPDATE sessions SET
                updated_at = CURRENT_TIMESTAMP,
                workflow_type = ?1,
                status = ?2,
                working_directory = ?3,
                task_description = ?4,
                prefix = ?5,
                claude_session_id = ?6,
                tmux_session = ?7,
                tmux_window = ?8,
                tmux_pane = ?9,
                output_file = ?10,
                pid = ?11
             WHERE id = ?12",
            params![
                session.workflow_type.as_str(),
                session.status.as_str(),
                session.working_directory.to_string_lossy(),
                session.task_description,
                session.prefix,
                session.agent_session_id,
                session.tmux.session,
                session.tmux.window,
                session.tmux.pane,
                session.output_file.to_string_lossy(),
                session.pid,
                session.id,
            ],
        )
    }

    pub fn update_status(&self, id: &str, status: SessionStatus) -> Result<(), StoreError> {
        self.execute_one(
            "update session status",
            id,
            "UPDATE sessions SET updated_at = CURRENT_TIMESTAMP, status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        debug!(session_id = id, %status, "Session status updated");
        Ok(())
    }

    /// Sets the status of a session that is still `waiting` or `working`.
    ///
    /// Returns `Ok(false)` and leaves the row alone once something else has
    /// ended the session (killed, trashed, finished). Run-driven writes go
    /// through here so they never overwrite those outcomes.
    pub fn update_running_status(&self, id: &str, status: SessionStatus) -> Result<bool, StoreError> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE sessions SET updated_at = CURRENT_TIMESTAMP, status = ?1 \
                 WHERE id = ?2 AND status IN ('waiting', 'working')",
                params![status.as_str(), id],
            )
            .map_err(StoreError::sqlite("update running session status"))?;
        if changed > 0 {
            debug!(session_id = id, %status, "Session status updated");
            return Ok(true);
        }
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sessions WHERE id = ?1)",
                params![id],
                |row| row.get(0),
            )
            .map_err(StoreError::sqlite("check session exists"))?;
        if !exists {
            return Err(StoreError::NotFound(id.to_string()));
        }
        debug!(session_id = id, %status, "Session no longer running, status kept");
        Ok(false)
    }

    pub fn update_pid(&self, id: &str, pid: u32) -> Result<(), StoreError> {
        self.execute_one(
            "update session pid",
            id,
            "UPDATE sessions SET updated_at = CURRENT_TIMESTAMP, pid = ?1 WHERE id = ?2",
            params![pid, id],
        )
    }

    pub fn update_agent_session_id(&self, id: &str, agent_session_id: &str) -> Result<(), StoreError> {
        self.execute_one(
            "update agent session id",
            id,
            "UPDATE sessions SET updated_at = CURRENT_TIMESTAMP, claude_session_id = ?1 WHERE id = ?2",
            params![agent_session_id, id],
        )
    }

    /// Moves a session to the trash, stamping `deleted_at`.
    pub fn soft_delete(&self, id: &str) -> Result<(), StoreError> {
        self.execute_one(
            "soft delete session",
            id,
            "UPDATE sessions SET updated_at = CURRENT_TIMESTAMP, status = 'deleted', \
             deleted_at = CURRENT_TIMESTAMP WHERE id = ?1",
            params![id],
        )?;
        info!(session_id = id, "Session moved to trash");
        Ok(())
    }

    pub fn restore(&self, id: &str) -> Result<(), StoreError> {
        self.execute_one(
            "restore session",
            id,
            "UPDATE sessions SET updated_at = CURRENT_TIMESTAMP, status = 'restored', \
             deleted_at = NULL WHERE id = ?1",
            params![id],
        )?;
        info!(session_id = id, "Session restored");
        Ok(())
    }

    /// Removes the row outright.
    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.execute_one(
            "delete session",
            id,
            "DELETE FROM sessions WHERE id = ?1",
            params![id],
        )
    }

    /// Permanently removes trashed sessions past the retention window.
    pub fn prune_deleted(&self) -> Result<usize, StoreError> {
        let removed = self
            .conn()
            .execute(
                "DELETE FROM sessions WHERE status = 'deleted' AND deleted_at < datetime('now', ?1)",
                params![format!("-{PRUNE_RETENTION_DAYS} days")],
            )
            .map_err(StoreError::sqlite("prune deleted sessions"))?;
        info!(removed, "Pruned deleted sessions");
        Ok(removed)
    }

    fn query(
        &self,
        operation: &'static str,
        sql: &str,
        params: impl Params,
    ) -> Result<Vec<Session>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql).map_err(StoreError::sqlite(operation))?;
        let raw = stmt
            .query_map(params, read_row)
            .map_err(StoreError::sqlite(operation))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::sqlite(operation))?;
        raw.into_iter().map(Session::try_from).collect()
    }

    fn execute_one(
        &self,
        operation: &'static str,
        id: &str,
        sql: &str,
        params: impl Params,
    ) -> Result<(), StoreError> {
        let changed = self
            .conn()
            .execute(sql, params)
            .map_err(StoreError::sqlite(operation))?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

fn migrate(conn: &Connection) -> Result<(), StoreError> {
    conn.execute("UPDATE sessions SET status = 'waiting' WHERE status = 'active'", [])
        .map_err(StoreError::sqlite("migrate legacy status"))?;
    add_column(conn, "ALTER TABLE sessions ADD COLUMN prefix TEXT")?;
    add_column(conn, "ALTER TABLE sessions ADD COLUMN deleted_at DATETIME")?;
    conn.execute_batch("CREATE INDEX IF NOT EXISTS idx_sessions_deleted ON sessions(deleted_at)")
        .map_err(StoreError::sqlite("create deleted_at index"))
}

fn add_column(conn: &Connection, ddl: &str) -> Result<(), StoreError> {
    match conn.execute_batch(ddl) {
        Ok(()) => Ok(()),
        Err(e) if e.to_string().contains("duplicate column") => Ok(()),
        Err(source) => Err(StoreError::Sqlite {
            operation: "migrate schema",
            source,
        }),
    }
}

/// Row as stored, before enum and timestamp validation.
struct SessionRow {
    id: String,
    created_at: String,
    updated_at: String,
    workflow_type: String,
    status: String,
    working_directory: String,
    task_description: Option<String>,
    prefix: Option<String>,
    agent_session_id: Option<String>,
    tmux_session: String,
    tmux_window: i64,
    tmux_pane: i64,
    output_file: Option<String>,
    pid: Option<i64>,
    deleted_at: Option<String>,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        id: row.get(0)?,
        created_at: row.get(1)?,
        updated_at: row.get(2)?,
        workflow_type: row.get(3)?,
        status: row.get(4)?,
        working_directory: row.get(5)?,
        task_description: row.get(6)?,
        prefix: row.get(7)?,
        agent_session_id: row.get(8)?,
        tmux_session: row.get(9)?,
        tmux_window: row.get(10)?,
        tmux_pane: row.get(11)?,
        output_file: row.get(12)?,
        pid: row.get(13)?,
        deleted_at: row.get(14)?,
    })
}

impl TryFrom<SessionRow> for Session {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Session {
            created_at: parse_timestamp("created_at", &row.created_at)?,
            updated_at: parse_timestamp("updated_at", &row.updated_at)?,
            workflow_type: row.workflow_type.parse()?,
            status: row.status.parse()?,
            working_directory: PathBuf::from(row.working_directory),
            task_description: row.task_description.unwrap_or_default(),
            prefix: row.prefix.unwrap_or_default(),
            agent_session_id: row.agent_session_id.filter(|id| !id.is_empty()),
            tmux: TmuxLocation {
                session: row.tmux_session,
                window: to_u32("tmux_window", row.tmux_window)?,
                pane: to_u32("tmux_pane", row.tmux_pane)?,
            },
            output_file: PathBuf::from(row.output_file.unwrap_or_default()),
            // Legacy rows stored 0 for "no pid".
            pid: row
                .pid
                .filter(|pid| *pid > 0)
                .map(|pid| to_u32("pid", pid))
                .transpose()?,
            deleted_at: row
                .deleted_at
                .map(|at| parse_timestamp("deleted_at", &at))
                .transpose()?,
            id: row.id,
        })
    }
}

fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|at| at.with_timezone(&Utc))
        })
        .ok_or_else(|| StoreError::InvalidValue {
            field,
            value: value.to_string(),
        })
}

fn to_u32(field: &'static str, value: i64) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::InvalidValue {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WorkflowType;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path().join("sessions.db")).unwrap();
        (dir, store)
    }

    fn session(id: &str) -> Session {
        Session::new(
            id,
            WorkflowType::General,
            "/work/repo",
            TmuxLocation {
                session: "main".into(),
                window: 1,
                pane: 0,
            },
            format!("/tmp/output/{id}.log"),
        )
        .with_task("fix the flaky test")
    }

    fn age_deleted_at(store: &SessionStore, id: &str, modifier: &str) {
        store
            .conn()
            .execute(
                "UPDATE sessions SET deleted_at = datetime('now', ?1) WHERE id = ?2",
                params![modifier, id],
            )
            .unwrap();
    }

    #[test]
    fn test_create_and_get() {
        let (_dir, store) = open_temp();
        let created = session("abc12345")
            .with_prefix("ops")
            .with_agent_session_id(Some("prior-conv".into()));
        store.create(&created).unwrap();

        let loaded = store.get("abc12345").unwrap().unwrap();
        assert_eq!(loaded.status, SessionStatus::Waiting);
        assert_eq!(loaded.workflow_type, WorkflowType::General);
        assert_eq!(loaded.task_description, "fix the flaky test");
        assert_eq!(loaded.prefix, "ops");
        assert_eq!(loaded.agent_session_id.as_deref(), Some("prior-conv"));
        assert_eq!(loaded.tmux.to_string(), "main:1.0");
        assert_eq!(loaded.output_file, PathBuf::from("/tmp/output/abc12345.log"));
        assert_eq!(loaded.pid, None);
        assert_eq!(loaded.deleted_at, None);

        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/sessions.db");
        let store = SessionStore::open(&path).unwrap();
        assert_eq!(store.path(), path);
        assert!(path.exists());
    }

    #[test]
    fn test_updates_refresh_fields() {
        let (_dir, store) = open_temp();
        store.create(&session("s1")).unwrap();

        store.update_status("s1", SessionStatus::Working).unwrap();
        store.update_pid("s1", 4242).unwrap();
        store.update_agent_session_id("s1", "conv-9").unwrap();

        let mut loaded = store.get("s1").unwrap().unwrap();
        assert_eq!(loaded.status, SessionStatus::Working);
        assert_eq!(loaded.pid, Some(4242));
        assert_eq!(loaded.agent_session_id.as_deref(), Some("conv-9"));

        loaded.task_description = "rewritten".into();
        loaded.workflow_type = WorkflowType::Fix;
        loaded.status = SessionStatus::Completed;
        store.update(&loaded).unwrap();

        let reloaded = store.get("s1").unwrap().unwrap();
        assert_eq!(reloaded.task_description, "rewritten");
        assert_eq!(reloaded.workflow_type, WorkflowType::Fix);
        assert_eq!(reloaded.status, SessionStatus::Completed);
    }

    #[test]
    fn test_writes_to_unknown_session_fail() {
        let (_dir, store) = open_temp();
        assert!(matches!(
            store.update_status("nope", SessionStatus::Working),
            Err(StoreError::NotFound(id)) if id == "nope"
        ));
        assert!(matches!(store.soft_delete("nope"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete("nope"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_running_status_writes_leave_ended_sessions_alone() {
        let (_dir, store) = open_temp();
        for id in ["live", "killed", "trashed"] {
            store.create(&session(id)).unwrap();
        }
        store.update_status("killed", SessionStatus::Killed).unwrap();
        store.soft_delete("trashed").unwrap();

        assert!(store.update_running_status("live", SessionStatus::Working).unwrap());
        assert!(store.update_running_status("live", SessionStatus::Completed).unwrap());
        assert!(!store.update_running_status("live", SessionStatus::Waiting).unwrap());
        assert_eq!(store.get("live").unwrap().unwrap().status, SessionStatus::Completed);

        assert!(!store.update_running_status("killed", SessionStatus::Abandoned).unwrap());
        assert_eq!(store.get("killed").unwrap().unwrap().status, SessionStatus::Killed);

        assert!(!store.update_running_status("trashed", SessionStatus::Waiting).unwrap());
        let trashed = store.get("trashed").unwrap().unwrap();
        assert_eq!(trashed.status, SessionStatus::Deleted);
        assert!(trashed.deleted_at.is_some());

        assert!(matches!(
            store.update_running_status("nope", SessionStatus::Working),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_filters_and_order() {
        let (_dir, store) = open_temp();
        for id in ["a", "b", "c"] {
            store.create(&session(id)).unwrap();
        }
        store.update_status("b", SessionStatus::Working).unwrap();
        store.soft_delete("c").unwrap();

        let ids = |sessions: Vec<Session>| sessions.into_iter().map(|s| s.id).collect::<Vec<_>>();
        assert_eq!(ids(store.list(None).unwrap()), vec!["b", "a"]);
        assert_eq!(ids(store.list(Some(SessionStatus::Working)).unwrap()), vec!["b"]);
        assert_eq!(ids(store.list(Some(SessionStatus::Deleted)).unwrap()), vec!["c"]);
        assert_eq!(ids(store.list_deleted().unwrap()), vec!["c"]);
        assert_eq!(store.last().unwrap().unwrap().id, "c");
    }

    #[test]
    fn test_soft_delete_and_restore_track_deleted_at() {
        let (_dir, store) = open_temp();
        store.create(&session("s1")).unwrap();

        store.soft_delete("s1").unwrap();
        let deleted = store.get("s1").unwrap().unwrap();
        assert_eq!(deleted.status, SessionStatus::Deleted);
        assert!(deleted.deleted_at.is_some());

        store.restore("s1").unwrap();
        let restored = store.get("s1").unwrap().unwrap();
        assert_eq!(restored.status, SessionStatus::Restored);
        assert!(restored.deleted_at.is_none());
    }

    #[test]
    fn test_hard_delete_removes_row() {
        let (_dir, store) = open_temp();
        store.create(&session("s1")).unwrap();
        store.delete("s1").unwrap();
        assert!(store.get("s1").unwrap().is_none());
    }

    #[test]
    fn test_prune_respects_retention_and_is_idempotent() {
        let (_dir, store) = open_temp();
        for id in ["old", "recent", "waiting", "working", "completed"] {
            store.create(&session(id)).unwrap();
        }
        store.soft_delete("old").unwrap();
        store.soft_delete("recent").unwrap();
        age_deleted_at(&store, "old", "-8 days");
        age_deleted_at(&store, "recent", "-6 days");
        store.update_status("working", SessionStatus::Working).unwrap();
        store.update_status("completed", SessionStatus::Completed).unwrap();

        // Stale deleted_at on rows that are not in the trash must not matter.
        for id in ["waiting", "working", "completed"] {
            age_deleted_at(&store, id, "-30 days");
        }

        assert_eq!(store.prune_deleted().unwrap(), 1);
        assert_eq!(store.prune_deleted().unwrap(), 0);

        assert!(store.get("old").unwrap().is_none());
        for id in ["recent", "waiting", "working", "completed"] {
            assert!(store.get(id).unwrap().is_some(), "{id} was pruned");
        }
    }

    #[test]
    fn test_reopen_abandons_working_session_with_dead_pid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        {
            let store = SessionStore::open(&path).unwrap();
            store.create(&session("dead")).unwrap();
            store.update_pid("dead", 999_999).unwrap();
            store.update_status("dead", SessionStatus::Working).unwrap();
        }

        let store = SessionStore::open(&path).unwrap();
        assert_eq!(
            store.get("dead").unwrap().unwrap().status,
            SessionStatus::Abandoned
        );
    }

    #[test]
    fn test_recovery_leaves_live_and_idle_sessions_alone() {
        let (_dir, store) = open_temp();
        store.create(&session("live")).unwrap();
        store.update_pid("live", std::process::id()).unwrap();
        store.update_status("live", SessionStatus::Working).unwrap();

        store.create(&session("waiting-dead")).unwrap();
        store.update_pid("waiting-dead", 999_999).unwrap();

        store.create(&session("working-no-pid")).unwrap();
        store.update_status("working-no-pid", SessionStatus::Working).unwrap();

        assert!(store.recover().unwrap().is_empty());
        assert_eq!(store.get("live").unwrap().unwrap().status, SessionStatus::Working);
        assert_eq!(
            store.get("waiting-dead").unwrap().unwrap().status,
            SessionStatus::Waiting
        );
        assert_eq!(
            store.get("working-no-pid").unwrap().unwrap().status,
            SessionStatus::Working
        );
    }

    #[test]
    fn test_unknown_status_is_an_error() {
        let (_dir, store) = open_temp();
        store.create(&session("s1")).unwrap();
        store
            .conn()
            .execute("UPDATE sessions SET status = 'paused' WHERE id = 's1'", [])
            .unwrap();
        assert!(matches!(
            store.get("s1"),
            Err(StoreError::InvalidValue { field: "status", .. })
        ));
    }

    #[test]
    fn test_open_migrates_legacy_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE sessions (
                    id TEXT PRIMARY KEY,
                    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                    workflow_type TEXT NOT NULL,
                    status TEXT NOT NULL,
                    working_directory TEXT NOT NULL,
                    task_description TEXT,
                    claude_session_id TEXT,
                    tmux_session TEXT NOT NULL,
                    tmux_window INTEGER NOT NULL,
                    tmux_pane INTEGER NOT NULL,
                    output_file TEXT,
                    pid INTEGER
                );
                INSERT INTO sessions (id, workflow_type, status, working_directory,
                    tmux_session, tmux_window, tmux_pane, pid)
                VALUES ('old1', 'plan', 'active', '/w', 'main', 0, 0, 0);",
            )
            .unwrap();
        }

        let store = SessionStore::open(&path).unwrap();
        let migrated = store.get("old1").unwrap().unwrap();
        assert_eq!(migrated.status, SessionStatus::Waiting);
        assert_eq!(migrated.prefix, "");
        assert_eq!(migrated.pid, None);
        assert_eq!(migrated.deleted_at, None);

        // Reopening an already migrated database is a no-op.
        drop(store);
        assert!(SessionStore::open(&path).is_ok());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("created_at", "2026-01-02 03:04:05").is_ok());
        assert!(parse_timestamp("created_at", "2026-01-02 03:04:05.123").is_ok());
        assert!(parse_timestamp("created_at", "2026-01-02T03:04:05Z").is_ok());
        assert!(matches!(
            parse_timestamp("created_at", "yesterday"),
            Err(StoreError::InvalidValue { field: "created_at", .. })
        ));
    }
}
