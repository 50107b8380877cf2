//! Scan-session table (spec.md §4.9, component C9): a bounded table of
//! in-progress cold scans, addressed by a cursor that stuffs the
//! session's slot into its low bits and a monotonic per-session
//! sequence number into the rest.
//!
//! Stuffing the session id into the cursor lets a client's opaque
//! cursor round-trip through `SCAN` without the server keeping any
//! per-client state beyond this table; the sequence number guards
//! against a stale or replayed cursor being applied to a session that
//! has since moved on or been reassigned.

use std::time::{Duration, Instant};
use swapcore_core::error::ScanSessionError;

const SESSION_BITS: u32 = 10;
const SESSION_MASK: u64 = (1 << SESSION_BITS) - 1;

/// Default capacity: up to 1024 concurrently open scans.
pub const DEFAULT_CAPACITY: usize = 1 << SESSION_BITS;

struct Session {
    seq: u64,
    in_progress: bool,
    seek: Vec<u8>,
    last_active: Instant,
}

/// A decoded scan cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanCursor {
    /// Slot in the session table.
    pub session: u32,
    /// Sequence number, checked against the session's own counter.
    pub seq: u64,
}

impl ScanCursor {
    /// Pack into the single `u64` handed to the client as an opaque
    /// cursor.
    pub fn encode(self) -> u64 {
        ((self.seq) << SESSION_BITS) | (self.session as u64 & SESSION_MASK)
    }

    /// Unpack a client-supplied cursor.
    pub fn decode(raw: u64) -> Self {
        ScanCursor { session: (raw & SESSION_MASK) as u32, seq: raw >> SESSION_BITS }
    }
}

/// Table of in-progress scan sessions.
pub struct ScanSessionTable {
    sessions: Vec<Option<Session>>,
    free: Vec<u32>,
}

impl ScanSessionTable {
    /// A table with room for `capacity` concurrent sessions.
    pub fn with_capacity(capacity: usize) -> Self {
        ScanSessionTable {
            sessions: (0..capacity).map(|_| None).collect(),
            free: (0..capacity as u32).rev().collect(),
        }
    }

    /// Open a fresh session and return the cursor a client should use
    /// to begin scanning. If every slot is in use, falls back to
    /// evicting the least-recently-touched session idle for at least
    /// `max_idle` (spec.md §4.9 "Assign"); returns `None` only if no
    /// slot is free and none qualifies for eviction.
    pub fn open(&mut self, max_idle: Duration) -> Option<ScanCursor> {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => self.evict_idle(max_idle)?,
        };
        self.sessions[slot as usize] =
            Some(Session { seq: 0, in_progress: true, seek: Vec::new(), last_active: Instant::now() });
        Some(ScanCursor { session: slot, seq: 0 })
    }

    /// Validate an incoming cursor and mark its session in-progress,
    /// returning the raw-key to resume iteration from.
    pub fn begin(&mut self, cursor: ScanCursor) -> Result<Vec<u8>, ScanSessionError> {
        let session = self
            .sessions
            .get_mut(cursor.session as usize)
            .and_then(Option::as_mut)
            .ok_or(ScanSessionError::Unassigned)?;
        if session.in_progress {
            return Err(ScanSessionError::InProgress);
        }
        if session.seq != cursor.seq {
            return Err(ScanSessionError::SeqUnmatch);
        }
        session.in_progress = true;
        session.last_active = Instant::now();
        Ok(std::mem::take(&mut session.seek))
    }

    /// Record a page's result and return the cursor the client should
    /// be given next. `next_seek = None` means the scan is exhausted;
    /// the session is freed immediately in that case.
    pub fn advance(&mut self, session_id: u32, next_seek: Option<Vec<u8>>) -> Option<ScanCursor> {
        match next_seek {
            Some(seek) => {
                let session = self.sessions[session_id as usize].as_mut().expect("advance on unknown session");
                session.seq += 1;
                session.in_progress = false;
                session.seek = seek;
                session.last_active = Instant::now();
                Some(ScanCursor { session: session_id, seq: session.seq })
            }
            None => {
                self.close(session_id);
                None
            }
        }
    }

    /// Free a session outright (e.g. client disconnect, or a completed
    /// scan per [`Self::advance`]).
    pub fn close(&mut self, session_id: u32) {
        if self.sessions[session_id as usize].take().is_some() {
            self.free.push(session_id);
        }
    }

    /// Find the least-recently-touched session idle for at least
    /// `max_idle` that isn't mid-page right now, evict it, and return
    /// its freed slot. A session with `in_progress == true` is actively
    /// being paged by some caller and is never a candidate.
    fn evict_idle(&mut self, max_idle: Duration) -> Option<u32> {
        let now = Instant::now();
        let victim = self
            .sessions
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| {
                let session = slot.as_ref()?;
                if session.in_progress || now.duration_since(session.last_active) < max_idle {
                    return None;
                }
                Some((idx as u32, session.last_active))
            })
            .min_by_key(|&(_, last_active)| last_active)
            .map(|(idx, _)| idx)?;
        self.sessions[victim as usize] = None;
        Some(victim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_round_trips_through_encode_decode() {
        let cursor = ScanCursor { session: 7, seq: 42 };
        assert_eq!(ScanCursor::decode(cursor.encode()), cursor);
    }

    #[test]
    fn begin_rejects_unassigned_in_progress_and_seq_mismatch() {
        let mut table = ScanSessionTable::with_capacity(4);
        assert_eq!(table.begin(ScanCursor { session: 0, seq: 0 }), Err(ScanSessionError::Unassigned));

        let cursor = table.open(Duration::from_secs(60)).unwrap();
        assert_eq!(table.begin(cursor), Err(ScanSessionError::InProgress));

        table.advance(cursor.session, Some(b"seek".to_vec()));
        let stale = ScanCursor { session: cursor.session, seq: cursor.seq + 5 };
        assert_eq!(table.begin(stale), Err(ScanSessionError::SeqUnmatch));
    }

    #[test]
    fn advance_with_no_more_pages_closes_the_session() {
        let mut table = ScanSessionTable::with_capacity(4);
        let cursor = table.open(Duration::from_secs(60)).unwrap();
        assert!(table.advance(cursor.session, None).is_none());
        assert_eq!(table.begin(cursor), Err(ScanSessionError::Unassigned));
    }

    #[test]
    fn exhausting_capacity_returns_none() {
        let mut table = ScanSessionTable::with_capacity(1);
        assert!(table.open(Duration::from_secs(60)).is_some());
        assert!(table.open(Duration::from_secs(60)).is_none());
    }

    #[test]
    fn a_full_table_evicts_the_idlest_non_in_progress_session() {
        let mut table = ScanSessionTable::with_capacity(1);
        let first = table.open(Duration::from_millis(0)).unwrap();
        // The lone session isn't in-progress once advance() pauses it
        // for the client to resume with its cursor.
        table.advance(first.session, Some(b"seek".to_vec()));
        std::thread::sleep(Duration::from_millis(5));
        let second = table.open(Duration::from_millis(1)).unwrap();
        assert_eq!(second.session, first.session, "the only slot should be reused via eviction");
        assert_eq!(table.begin(first), Err(ScanSessionError::Unassigned), "the evicted cursor is no longer valid");
    }

    #[test]
    fn an_in_progress_session_is_never_evicted() {
        let mut table = ScanSessionTable::with_capacity(1);
        table.open(Duration::from_millis(0)).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(table.open(Duration::from_millis(1)).is_none(), "in-progress session must not be evicted");
    }
}
