//! Session registry: the process-wide table of matches
//!
//! Lock order is registry first, then session. The move path only ever takes
//! a session lock, so it never waits on the registry while holding one.

use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tictac_core::Player;

use crate::error::SessionError;
use crate::protocol::ServerMessage;
use crate::session::{ConnectionId, SeatHandle, Session};

/// Session identifier, allocated in increasing order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A session guarded by its own lock
pub type SharedSession = Arc<Mutex<Session>>;

/// Binding of one connection to one seat, fixed for the connection's lifetime
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeatAssignment {
    pub session_id: SessionId,
    /// Seat number and player value are the same thing
    pub player: Player,
    pub conn_id: ConnectionId,
}

#[derive(Default)]
struct RegistryInner {
    sessions: FxHashMap<SessionId, SharedSession>,
    /// Sessions with a seat a new client may take, oldest first
    open: BTreeSet<SessionId>,
    next_id: u64,
}

/// Process-wide session table and FIFO pairing
pub struct Registry {
    inner: Mutex<RegistryInner>,
    retire_empty_sessions: bool,
}

impl Registry {
    pub fn new(retire_empty_sessions: bool) -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
            retire_empty_sessions,
        }
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, RegistryInner>, SessionError> {
        self.inner
            .lock()
            .map_err(|_| SessionError::Poisoned("registry"))
    }

    /// Seat a connection in the oldest session with an open seat, or in
    /// seat 1 of a new session.
    ///
    /// The assignment and the current state are queued to the joiner before
    /// the session lock is released, so they precede any later broadcast.
    pub fn join(&self, handle: SeatHandle) -> Result<SeatAssignment, SessionError> {
        let mut inner = self.lock_inner()?;
        let conn_id = handle.conn_id;

        while let Some(&session_id) = inner.open.first() {
            let Some(shared) = inner.sessions.get(&session_id).cloned() else {
                inner.open.remove(&session_id);
                continue;
            };
            let mut session = lock_session(&shared)?;
            let Some(player) = session.open_seat().filter(|_| session.accepts_joiners()) else {
                inner.open.remove(&session_id);
                continue;
            };

            session.seat(player, handle);
            if !session.accepts_joiners() {
                inner.open.remove(&session_id);
            }
            greet(&session, player);
            tracing::info!(
                "Connection #{} joined session {} as player {}",
                conn_id,
                session_id,
                player
            );
            return Ok(SeatAssignment {
                session_id,
                player,
                conn_id,
            });
        }

        inner.next_id += 1;
        let session_id = SessionId(inner.next_id);
        let mut session = Session::new(session_id);
        session.seat(Player::One, handle);
        greet(&session, Player::One);

        inner.sessions.insert(session_id, Arc::new(Mutex::new(session)));
        inner.open.insert(session_id);
        tracing::info!(
            "Connection #{} created session {} as player 1",
            conn_id,
            session_id
        );

        Ok(SeatAssignment {
            session_id,
            player: Player::One,
            conn_id,
        })
    }

    /// Release a seat. The board is kept for whoever remains.
    pub fn leave(&self, seat: &SeatAssignment) -> Result<(), SessionError> {
        let mut inner = self.lock_inner()?;
        let shared = inner
            .sessions
            .get(&seat.session_id)
            .cloned()
            .ok_or(SessionError::NotFound(seat.session_id))?;
        let (empty, joinable) = {
            let mut session = lock_session(&shared)?;
            if !session.vacate(seat.player, seat.conn_id) {
                tracing::warn!(
                    "Connection #{} left session {} but did not hold seat {}",
                    seat.conn_id,
                    seat.session_id,
                    seat.player
                );
            }
            (session.is_empty(), session.accepts_joiners())
        };

        match (empty, joinable) {
            (true, _) if self.retire_empty_sessions => {
                inner.sessions.remove(&seat.session_id);
                inner.open.remove(&seat.session_id);
                tracing::info!("Session {} retired (no players left)", seat.session_id);
            }
            (_, true) => {
                inner.open.insert(seat.session_id);
                tracing::info!(
                    "Session {}: seat {} is open again",
                    seat.session_id,
                    seat.player
                );
            }
            (_, false) => {
                inner.open.remove(&seat.session_id);
            }
        }

        Ok(())
    }

    pub fn get_session(&self, id: SessionId) -> Result<SharedSession, SessionError> {
        self.lock_inner()?
            .sessions
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound(id))
    }

    pub fn session_count(&self) -> Result<usize, SessionError> {
        Ok(self.lock_inner()?.sessions.len())
    }

    pub fn open_session_count(&self) -> Result<usize, SessionError> {
        Ok(self.lock_inner()?.open.len())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Lock a session, mapping poisoning to an internal error
pub fn lock_session(shared: &SharedSession) -> Result<MutexGuard<'_, Session>, SessionError> {
    shared.lock().map_err(|_| SessionError::Poisoned("session"))
}

fn greet(session: &Session, player: Player) {
    session.send_to(player, ServerMessage::Assigned(player));
    session.send_to(player, ServerMessage::State(session.snapshot()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::OUTBOUND_QUEUE_CAPACITY;
    use tokio::sync::{mpsc, Notify};

    fn connect(
        registry: &Registry,
        conn_id: ConnectionId,
    ) -> (SeatAssignment, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let handle = SeatHandle::new(conn_id, tx, Arc::new(Notify::new()));
        let seat = registry.join(handle).unwrap();
        (seat, rx)
    }

    #[test]
    fn test_pairs_in_arrival_order() {
        let registry = Registry::default();
        let (a, _) = connect(&registry, 1);
        let (b, _) = connect(&registry, 2);
        let (c, _) = connect(&registry, 3);

        assert_eq!(a.player, Player::One);
        assert_eq!(b.player, Player::Two);
        assert_eq!(a.session_id, b.session_id);
        assert_eq!(c.player, Player::One);
        assert_ne!(c.session_id, a.session_id);
        assert_eq!(registry.session_count().unwrap(), 2);
        assert_eq!(registry.open_session_count().unwrap(), 1);
    }

    #[test]
    fn test_join_greets_with_seat_and_state() {
        let registry = Registry::default();
        let (_, mut rx) = connect(&registry, 1);
        assert_eq!(rx.try_recv().unwrap(), ServerMessage::Assigned(Player::One));
        assert!(matches!(rx.try_recv().unwrap(), ServerMessage::State(s) if s.moves_played == 0));
    }

    #[test]
    fn test_rejoin_fills_vacated_seat_without_reset() {
        let registry = Registry::default();
        let (a, _rxa) = connect(&registry, 1);
        let (b, _rxb) = connect(&registry, 2);

        let shared = registry.get_session(a.session_id).unwrap();
        lock_session(&shared).unwrap().apply_move(Player::One, 1, 1).unwrap();

        registry.leave(&a).unwrap();
        assert_eq!(registry.open_session_count().unwrap(), 1);

        let (c, mut rxc) = connect(&registry, 3);
        assert_eq!(c.session_id, a.session_id);
        assert_eq!(c.player, Player::One);

        let session = lock_session(&shared).unwrap();
        assert_eq!(session.occupant(Player::One), Some(3));
        assert_eq!(session.occupant(Player::Two), Some(b.conn_id));
        assert_eq!(session.snapshot().board[1][1], 1);

        assert_eq!(rxc.try_recv().unwrap(), ServerMessage::Assigned(Player::One));
        assert!(matches!(rxc.try_recv().unwrap(), ServerMessage::State(s) if s.board[1][1] == 1));
    }

    #[test]
    fn test_empty_session_is_retired() {
        let registry = Registry::default();
        let (a, _) = connect(&registry, 1);
        let (b, _) = connect(&registry, 2);
        registry.leave(&a).unwrap();
        registry.leave(&b).unwrap();

        assert_eq!(registry.session_count().unwrap(), 0);
        assert_eq!(registry.open_session_count().unwrap(), 0);
        assert_eq!(
            registry.get_session(a.session_id).err(),
            Some(SessionError::NotFound(a.session_id))
        );
        assert_eq!(registry.leave(&a), Err(SessionError::NotFound(a.session_id)));
    }

    #[test]
    fn test_empty_session_kept_when_not_retiring() {
        let registry = Registry::new(false);
        let (a, _) = connect(&registry, 1);
        registry.leave(&a).unwrap();
        assert_eq!(registry.session_count().unwrap(), 1);

        let (b, _) = connect(&registry, 2);
        assert_eq!(b.session_id, a.session_id);
        assert_eq!(b.player, Player::One);
    }

    #[test]
    fn test_finished_session_not_offered() {
        let registry = Registry::default();
        let (a, _rxa) = connect(&registry, 1);
        let (b, _rxb) = connect(&registry, 2);

        let shared = registry.get_session(a.session_id).unwrap();
        {
            let mut session = lock_session(&shared).unwrap();
            for (player, row, col) in [
                (Player::One, 0, 0),
                (Player::Two, 1, 1),
                (Player::One, 0, 1),
                (Player::Two, 2, 2),
                (Player::One, 0, 2),
            ] {
                session.apply_move(player, row, col).unwrap();
            }
        }

        registry.leave(&b).unwrap();
        assert_eq!(registry.open_session_count().unwrap(), 0);

        let (c, _) = connect(&registry, 3);
        assert_ne!(c.session_id, a.session_id);
    }

    #[test]
    fn test_stale_leave_keeps_new_occupant() {
        let registry = Registry::default();
        let (a, _rxa) = connect(&registry, 1);
        let (_b, _rxb) = connect(&registry, 2);
        registry.leave(&a).unwrap();
        let (c, _rxc) = connect(&registry, 3);

        // A second leave for the old connection must not evict the new one
        registry.leave(&a).unwrap();
        let shared = registry.get_session(c.session_id).unwrap();
        assert_eq!(lock_session(&shared).unwrap().occupant(Player::One), Some(3));
    }

    #[test]
    fn test_sessions_are_isolated() {
        let registry = Registry::default();
        let (a, mut rxa) = connect(&registry, 1);
        let (_b, _rxb) = connect(&registry, 2);
        let (c, mut rxc) = connect(&registry, 3);
        let (_d, _rxd) = connect(&registry, 4);
        while rxa.try_recv().is_ok() {}
        while rxc.try_recv().is_ok() {}

        let shared_a = registry.get_session(a.session_id).unwrap();
        lock_session(&shared_a).unwrap().apply_move(Player::One, 0, 0).unwrap();

        assert!(rxa.try_recv().is_ok());
        assert!(rxc.try_recv().is_err());
        let shared_c = registry.get_session(c.session_id).unwrap();
        assert_eq!(lock_session(&shared_c).unwrap().snapshot().moves_played, 0);
    }
}
