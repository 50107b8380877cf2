//! Arena-indexed lock nodes and the server/database/key dependency
//! lattice they form (spec.md §4.3, component C7).
//!
//! Each acquire creates exactly one [`LockNode`], linked from the
//! current tail of every ancestor container it touches (server, then
//! database, then — for key-level requests — the key itself) and
//! appended as the new tail of its own level's container only. A
//! server- or database-level request attaching to a container fans its
//! dependency out to every descendant container's current tail, so a
//! `FLUSHALL`-shaped request waits for every key- and database-level
//! request already in flight underneath it. This always re-scans the
//! descendants rather than incrementally migrating forward the edges of
//! the previous tail (the lock-free optimization the source engine
//! uses for the same fan-out) — simpler to model over an arena, and
//! server/database-level requests are rare enough that the extra scan
//! cost does not matter.
//!
//! Two kinds of signal propagate along the dependency edges: `proceed`,
//! fired once a node's synchronous command work has run, which only
//! wakes dependents sharing its txid (edges are pushed in
//! non-decreasing txid order, so the walk can stop at the first
//! mismatch); and `unlock`, fired once the owning request has fully
//! finished (including any background I/O), which wakes every
//! remaining dependent regardless of txid.

use std::collections::VecDeque;
use swapcore_core::{Level, TxId};

/// Opaque handle to a lock node, returned by [`LockManager::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockId(u32);

struct LockNode {
    txid: TxId,
    dependents: Vec<LockId>,
    signaled_upto: usize,
    incoming_total: u32,
    incoming_signaled: u32,
    proceeded: bool,
    callback: Option<Box<dyn FnOnce()>>,
    home: Home,
}

#[derive(Clone)]
enum Home {
    Server,
    Database { dbid: u32 },
    Key { dbid: u32, key: Vec<u8> },
}

#[derive(Default)]
struct KeyContainer {
    last: Option<LockId>,
    pending: usize,
}

#[derive(Default)]
struct DbContainer {
    last: Option<LockId>,
    pending: usize,
    keys: std::collections::HashMap<Vec<u8>, KeyContainer>,
}

/// The server/database/key lock lattice.
///
/// Owned exclusively by the single executor thread (spec.md §5); no
/// interior synchronization is needed or provided.
pub struct LockManager {
    arena: Vec<Option<LockNode>>,
    free: Vec<u32>,
    server_last: Option<LockId>,
    server_pending: usize,
    dbs: Vec<DbContainer>,
}

/// What a fresh acquire is asking to lock.
pub struct LockTarget<'a> {
    /// Transaction this request belongs to.
    pub txid: TxId,
    /// Level of the container the request ultimately attaches to.
    pub level: Level,
    /// Database index; ignored when `level == Level::Server`.
    pub dbid: u32,
    /// Key name; required when `level == Level::Key`.
    pub key: Option<&'a [u8]>,
}

impl LockManager {
    /// A manager with `num_dbs` database containers pre-allocated, the
    /// way the source engine eagerly creates one per-db container at
    /// startup (key containers, by contrast, are created lazily below).
    pub fn new(num_dbs: u32) -> Self {
        LockManager {
            arena: Vec::new(),
            free: Vec::new(),
            server_last: None,
            server_pending: 0,
            dbs: (0..num_dbs).map(|_| DbContainer::default()).collect(),
        }
    }

    fn alloc(&mut self, node: LockNode) -> LockId {
        if let Some(slot) = self.free.pop() {
            self.arena[slot as usize] = Some(node);
            LockId(slot)
        } else {
            self.arena.push(Some(node));
            LockId((self.arena.len() - 1) as u32)
        }
    }

    fn node(&self, id: LockId) -> &LockNode {
        self.arena[id.0 as usize].as_ref().expect("dangling LockId")
    }

    fn node_mut(&mut self, id: LockId) -> &mut LockNode {
        self.arena[id.0 as usize].as_mut().expect("dangling LockId")
    }

    fn link(&mut self, from: LockId, to: LockId) {
        self.node_mut(from).dependents.push(to);
        self.node_mut(to).incoming_total += 1;
    }

    /// Acquire a lock for `target`, invoking `on_ready` once every
    /// dependency has fired (synchronously, before returning, if the
    /// node has no unsatisfied dependencies at all — matching the
    /// source engine's immediate-proceed fast path).
    pub fn acquire(&mut self, target: &LockTarget<'_>, on_ready: impl FnOnce() + 'static) -> LockId {
        let home = match target.level {
            Level::Server => Home::Server,
            Level::Database => Home::Database { dbid: target.dbid },
            Level::Key => Home::Key {
                dbid: target.dbid,
                key: target.key.expect("key-level acquire without a key").to_vec(),
            },
        };
        let id = self.alloc(LockNode {
            txid: target.txid,
            dependents: Vec::new(),
            signaled_upto: 0,
            incoming_total: 0,
            incoming_signaled: 0,
            proceeded: false,
            callback: Some(Box::new(on_ready)),
            home: home.clone(),
        });

        if let Some(last) = self.server_last {
            self.link(last, id);
        }
        if !matches!(target.level, Level::Server) {
            if let Some(last) = self.dbs[target.dbid as usize].last {
                self.link(last, id);
            }
        }
        if matches!(target.level, Level::Key) {
            let key = target.key.expect("key-level acquire without a key").to_vec();
            let db = &mut self.dbs[target.dbid as usize];
            let container = db.keys.entry(key).or_default();
            if let Some(last) = container.last {
                self.link(last, id);
            }
        }

        match home {
            Home::Server => {
                if self.server_last.is_none() {
                    self.fan_out_from_server(id);
                }
                self.server_last = Some(id);
                self.server_pending += 1;
            }
            Home::Database { dbid } => {
                let was_empty = self.dbs[dbid as usize].last.is_none();
                if was_empty {
                    self.fan_out_from_database(dbid, id);
                }
                let db = &mut self.dbs[dbid as usize];
                db.last = Some(id);
                db.pending += 1;
            }
            Home::Key { dbid, key } => {
                let container = self.dbs[dbid as usize].keys.entry(key).or_default();
                container.last = Some(id);
                container.pending += 1;
            }
        }

        if self.node(id).incoming_total == self.node(id).incoming_signaled {
            self.invoke(id);
        }
        id
    }

    fn fan_out_from_server(&mut self, id: LockId) {
        let tails: Vec<LockId> = self
            .dbs
            .iter()
            .flat_map(|db| db.last.into_iter().chain(db.keys.values().filter_map(|k| k.last)))
            .collect();
        for tail in tails {
            self.link(tail, id);
        }
    }

    fn fan_out_from_database(&mut self, dbid: u32, id: LockId) {
        let tails: Vec<LockId> = self.dbs[dbid as usize].keys.values().filter_map(|k| k.last).collect();
        for tail in tails {
            self.link(tail, id);
        }
    }

    fn invoke(&mut self, id: LockId) {
        self.node_mut(id).proceeded = true;
        if let Some(cb) = self.node_mut(id).callback.take() {
            cb();
        }
    }

    /// Signal that `id`'s synchronous work has run. Wakes only
    /// dependents sharing its txid; use [`LockManager::unlock`] once
    /// the request (including any background I/O) has fully finished.
    pub fn mark_proceeded(&mut self, id: LockId) {
        let mut ready = Vec::new();
        self.signal(id, SignalKind::Proceed, &mut ready);
        for r in ready {
            self.invoke(r);
        }
    }

    /// Release `id`, waking every remaining dependent and detaching it
    /// from its container. Key containers that become empty are
    /// dropped, mirroring the source engine's lazy key-container
    /// lifetime.
    pub fn unlock(&mut self, id: LockId) {
        let mut ready = Vec::new();
        self.signal(id, SignalKind::Unlock, &mut ready);
        self.detach(id);
        self.arena[id.0 as usize] = None;
        self.free.push(id.0);
        for r in ready {
            self.invoke(r);
        }
    }

    fn detach(&mut self, id: LockId) {
        match &self.node(id).home {
            Home::Server => {
                self.server_pending -= 1;
                if self.server_pending == 0 {
                    self.server_last = None;
                }
            }
            Home::Database { dbid } => {
                let db = &mut self.dbs[*dbid as usize];
                db.pending -= 1;
                if db.pending == 0 {
                    db.last = None;
                }
            }
            Home::Key { dbid, key } => {
                let dbid = *dbid;
                let key = key.clone();
                let db = &mut self.dbs[dbid as usize];
                let container = db.keys.get_mut(&key).expect("lock node's container must exist");
                container.pending -= 1;
                if container.last == Some(id) {
                    container.last = None;
                }
                if container.pending == 0 {
                    db.keys.remove(&key);
                }
            }
        }
    }

    /// Fast admission check: would a fresh acquire at this target
    /// currently have to wait? Used to skip building the full request
    /// machinery for obviously-uncontended commands (spec.md §9
    /// supplemented features).
    pub fn would_block(&self, txid: TxId, dbid: Option<u32>, key: Option<&[u8]>) -> bool {
        if let Some(last) = self.server_last {
            if self.node_would_block(last, txid) {
                return true;
            }
        }
        let Some(dbid) = dbid else { return false };
        if let Some(last) = self.dbs[dbid as usize].last {
            if self.node_would_block(last, txid) {
                return true;
            }
        }
        let Some(key) = key else { return false };
        if let Some(container) = self.dbs[dbid as usize].keys.get(key) {
            if let Some(last) = container.last {
                return self.node_would_block(last, txid);
            }
        }
        false
    }

    fn node_would_block(&self, id: LockId, txid: TxId) -> bool {
        let node = self.node(id);
        !node.proceeded || node.txid != txid
    }

    fn signal(&mut self, from: LockId, kind: SignalKind, ready: &mut Vec<LockId>) {
        let from_txid = self.node(from).txid;
        loop {
            let idx = self.node(from).signaled_upto;
            let dependents_len = self.node(from).dependents.len();
            if idx >= dependents_len {
                break;
            }
            let target = self.node(from).dependents[idx];
            let target_txid = self.node(target).txid;
            if matches!(kind, SignalKind::Proceed) && from_txid < target_txid {
                break;
            }
            self.node_mut(from).signaled_upto += 1;
            let t = self.node_mut(target);
            t.incoming_signaled += 1;
            if t.incoming_signaled == t.incoming_total {
                ready.push(target);
            }
        }
    }
}

enum SignalKind {
    Proceed,
    Unlock,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn target(txid: u64, level: Level, dbid: u32, key: Option<&'static [u8]>) -> LockTarget<'static> {
        LockTarget { txid: TxId::from_raw(txid), level, dbid, key }
    }

    #[test]
    fn uncontended_key_locks_proceed_immediately() {
        let mut mgr = LockManager::new(1);
        let ran = Rc::new(RefCell::new(false));
        let ran2 = ran.clone();
        let id = mgr.acquire(&target(1, Level::Key, 0, Some(b"a")), move || *ran2.borrow_mut() = true);
        assert!(*ran.borrow());
        mgr.unlock(id);
    }

    #[test]
    fn same_key_different_txid_serializes() {
        let mut mgr = LockManager::new(1);
        let second_ran = Rc::new(RefCell::new(false));
        let first = mgr.acquire(&target(1, Level::Key, 0, Some(b"a")), || {});
        assert!(mgr.would_block(TxId::from_raw(2), Some(0), Some(b"a")));
        let second_ran2 = second_ran.clone();
        let second = mgr.acquire(&target(2, Level::Key, 0, Some(b"a")), move || {
            *second_ran2.borrow_mut() = true
        });
        assert!(!*second_ran.borrow(), "second must wait for first to unlock");
        mgr.unlock(first);
        assert!(*second_ran.borrow());
        mgr.unlock(second);
    }

    #[test]
    fn server_level_waits_for_in_flight_key_lock() {
        let mut mgr = LockManager::new(1);
        let key_lock = mgr.acquire(&target(1, Level::Key, 0, Some(b"a")), || {});
        let server_ran = Rc::new(RefCell::new(false));
        let server_ran2 = server_ran.clone();
        let server_lock =
            mgr.acquire(&target(2, Level::Server, 0, None), move || *server_ran2.borrow_mut() = true);
        assert!(!*server_ran.borrow(), "FLUSHALL-shaped request must wait for the in-flight key");
        mgr.unlock(key_lock);
        assert!(*server_ran.borrow());
        mgr.unlock(server_lock);
    }

    #[test]
    fn key_container_is_dropped_once_empty() {
        let mut mgr = LockManager::new(1);
        let id = mgr.acquire(&target(1, Level::Key, 0, Some(b"a")), || {});
        assert!(mgr.dbs[0].keys.contains_key(b"a".as_slice()));
        mgr.unlock(id);
        assert!(!mgr.dbs[0].keys.contains_key(b"a".as_slice()));
    }

    #[test]
    fn unlocking_a_non_tail_lock_still_detaches_its_container() {
        // Two locks on the same key, same txid: `first` is not the
        // container's tail once `second` is acquired. Unlocking `first`
        // first must still find and decrement its container rather than
        // only ever checking the tail.
        let mut mgr = LockManager::new(1);
        let first = mgr.acquire(&target(1, Level::Key, 0, Some(b"a")), || {});
        mgr.mark_proceeded(first);
        let second = mgr.acquire(&target(1, Level::Key, 0, Some(b"a")), || {});
        assert!(mgr.dbs[0].keys.contains_key(b"a".as_slice()));

        mgr.unlock(first);
        assert!(
            mgr.dbs[0].keys.contains_key(b"a".as_slice()),
            "container must survive while `second` is still outstanding"
        );

        mgr.unlock(second);
        assert!(
            !mgr.dbs[0].keys.contains_key(b"a".as_slice()),
            "container must be dropped once every lock on it has been released"
        );

        // The key must be freely re-lockable afterwards: a dangling
        // `last` would have pointed this acquire at a freed/reused slot.
        let third = mgr.acquire(&target(2, Level::Key, 0, Some(b"a")), || {});
        mgr.unlock(third);
    }

    #[test]
    fn proceed_does_not_wake_a_later_transaction() {
        let mut mgr = LockManager::new(1);
        let first = mgr.acquire(&target(1, Level::Key, 0, Some(b"a")), || {});
        let second_ran = Rc::new(RefCell::new(false));
        let second_ran2 = second_ran.clone();
        let second = mgr.acquire(&target(2, Level::Key, 0, Some(b"a")), move || {
            *second_ran2.borrow_mut() = true
        });
        mgr.mark_proceeded(first);
        assert!(!*second_ran.borrow(), "proceed must not cross a txid boundary");
        mgr.unlock(first);
        assert!(*second_ran.borrow());
        mgr.unlock(second);
    }
}
