//! Out-of-band session controls: kill, trash, restore, prune.

use std::sync::Arc;

use cmt_store::Session;
use cmt_store::SessionStatus;
use cmt_store::SessionStore;
use cmt_store::kill_process;
use tracing::info;
use tracing::warn;

use crate::error::ControlError;

const LAST_SESSION: &str = "last";

pub struct SessionControl {
    store: Arc<SessionStore>,
}

impl SessionControl {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    /// Looks up a session by id, or the newest one for `last`.
    pub fn resolve(&self, id: &str) -> Result<Session, ControlError> {
        if id == LAST_SESSION {
            return self.store.last()?.ok_or(ControlError::NoSessions);
        }
        self.store
            .get(id)?
            .ok_or_else(|| ControlError::NotFound(id.to_string()))
    }

    /// Kills a running agent and marks its session `killed`.
    pub fn stop(&self, id: &str) -> Result<Session, ControlError> {
        let session = self.resolve(id)?;
        if !session.status.is_running() {
            return Err(ControlError::NotRunning {
                id: session.id,
                status: session.status,
            });
        }
        kill_agent(&session);
        self.store
            .update_status(&session.id, SessionStatus::Killed)?;
        info!(session_id = %session.id, "Session killed");
        Ok(session)
    }

    /// Moves a session to the trash, killing its agent first if it still runs.
    pub fn trash(&self, id: &str) -> Result<Session, ControlError> {
        let session = self.resolve(id)?;
        if session.status.is_running() {
            kill_agent(&session);
        }
        self.store.soft_delete(&session.id)?;
        Ok(session)
    }

    pub fn restore(&self, id: &str) -> Result<Session, ControlError> {
        let session = self.resolve(id)?;
        if session.status != SessionStatus::Deleted {
            return Err(ControlError::NotDeleted {
                id: session.id,
                status: session.status,
            });
        }
        self.store.restore(&session.id)?;
        Ok(session)
    }

    pub fn prune(&self) -> Result<usize, ControlError> {
        Ok(self.store.prune_deleted()?)
    }
}

fn kill_agent(session: &Session) {
    let Some(pid) = session.pid else {
        return;
    };
    if let Err(err) = kill_process(pid) {
        warn!(session_id = %session.id, pid, error = %err, "Failed to kill agent");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmt_store::TmuxLocation;
    use cmt_store::WorkflowType;
    use std::process::Child;
    use std::process::Command;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<SessionStore>, SessionControl) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SessionStore::open(dir.path().join("sessions.db")).unwrap());
        let control = SessionControl::new(store.clone());
        (dir, store, control)
    }

    fn create(store: &SessionStore, id: &str, pid: Option<u32>) {
        let session = Session::new(
            id,
            WorkflowType::General,
            "/work",
            TmuxLocation::default(),
            format!("/tmp/{id}.log"),
        );
        store.create(&session).unwrap();
        if let Some(pid) = pid {
            store.update_pid(id, pid).unwrap();
        }
    }

    fn dummy_agent() -> Child {
        Command::new("sleep").arg("30").spawn().unwrap()
    }

    #[test]
    fn test_trash_kills_live_agent_and_restore_clears_deleted_at() {
        let (_dir, store, control) = setup();
        let mut agent = dummy_agent();
        create(&store, "s1", Some(agent.id()));

        control.trash("s1").unwrap();
        let status = agent.wait().unwrap();
        assert!(!status.success());

        let trashed = store.get("s1").unwrap().unwrap();
        assert_eq!(trashed.status, SessionStatus::Deleted);
        assert!(trashed.deleted_at.is_some());

        control.restore("s1").unwrap();
        let restored = store.get("s1").unwrap().unwrap();
        assert_eq!(restored.status, SessionStatus::Restored);
        assert!(restored.deleted_at.is_none());
    }

    #[test]
    fn test_stop_kills_and_marks_killed() {
        let (_dir, store, control) = setup();
        let mut agent = dummy_agent();
        create(&store, "s1", Some(agent.id()));
        store.update_status("s1", SessionStatus::Working).unwrap();

        control.stop("s1").unwrap();
        assert!(!agent.wait().unwrap().success());
        assert_eq!(
            store.get("s1").unwrap().unwrap().status,
            SessionStatus::Killed
        );
    }

    #[test]
    fn test_stop_rejects_finished_sessions() {
        let (_dir, store, control) = setup();
        create(&store, "s1", None);
        store.update_status("s1", SessionStatus::Completed).unwrap();

        assert!(matches!(
            control.stop("s1"),
            Err(ControlError::NotRunning {
                status: SessionStatus::Completed,
                ..
            })
        ));
        assert_eq!(
            store.get("s1").unwrap().unwrap().status,
            SessionStatus::Completed
        );
    }

    #[test]
    fn test_trash_finished_session_without_pid() {
        let (_dir, store, control) = setup();
        create(&store, "s1", None);
        store.update_status("s1", SessionStatus::Abandoned).unwrap();
        control.trash("s1").unwrap();
        assert_eq!(
            store.get("s1").unwrap().unwrap().status,
            SessionStatus::Deleted
        );
    }

    #[test]
    fn test_restore_requires_trash() {
        let (_dir, store, control) = setup();
        create(&store, "s1", None);
        assert!(matches!(
            control.restore("s1"),
            Err(ControlError::NotDeleted { .. })
        ));
    }

    #[test]
    fn test_resolve_last_and_missing() {
        let (_dir, store, control) = setup();
        assert!(matches!(control.resolve("last"), Err(ControlError::NoSessions)));
        assert!(matches!(
            control.resolve("nope"),
            Err(ControlError::NotFound(id)) if id == "nope"
        ));

        create(&store, "a", None);
        create(&store, "b", None);
        assert_eq!(control.resolve("last").unwrap().id, "b");
        assert_eq!(control.prune().unwrap(), 0);
    }
}
