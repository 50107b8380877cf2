//! The single-threaded command loop (spec.md §5 "one executor thread")
//! wiring the request extractor (C6), lock manager (C7), the vtable
//! registry (C2), the worker pool (C3), the completion queue (C4), and
//! `finishSwapRequest` (§4.8) together, plus the reference command set
//! the integration tests drive it through.
//!
//! Every public `Executor` method runs one command to completion before
//! returning: it extracts, locks, decides the swap intention, submits
//! any RIO to a worker, blocks on the completion queue if background
//! I/O was needed, folds the result into RAM state, and unlocks. This
//! matches spec.md §9's "no async/await runtime is required on the
//! executor side" — there is exactly one command in flight at a time,
//! so the wake-pipe suspension point below never has to interleave with
//! anything else, and `LockManager::acquire`'s `on_ready` callback
//! always fires synchronously.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use swapcore_concurrency::lock::LockTarget;
use swapcore_concurrency::{LockId, LockManager};
use swapcore_core::vtable::{MissingSubkeys, ObjectType, RioAction};
use swapcore_core::{
    ColumnFamily, Intention, IntentionFlags, KeyRequest, KeyRequestShape, MetaRecord, Residency, ScanSessionError,
    SwapError, SwapValue, TxId, TxIdAllocator,
};
use swapcore_core::vtable::SwapDataType;
use swapcore_engine::completion::CompletionPayload;
use swapcore_engine::{
    finish_del, finish_in, finish_out, registry, AbsentCache, BatchAccumulator, CompletionQueue, PerfStats,
    ScanCursor, ScanSessionTable, SlowSwapRing, SwapResultEnvelope, WorkerPool,
};
use swapcore_storage::{
    data_key, data_key_prefix_range, decode_meta, meta_key, parse_data_key, PersistentEngine, Rio, RioResult,
    WriteBatch,
};

use crate::config::SwapConfig;
use crate::database::Database;
use crate::error::{ExecError, ExecResult};
use crate::extract::{extract, Command};

/// What a command returns to its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// A single optional value, e.g. `GET`/`HGET`/`GETDEL`.
    Bulk(Option<Vec<u8>>),
    /// An integer reply, e.g. `DEL`/`HSET`/`HDEL`'s affected-count.
    Integer(i64),
    /// No reply payload, e.g. `SET`/`DEBUG RELOAD`.
    Ok,
    /// One optional value per requested key, in request order, e.g.
    /// `MGET`.
    MultiBulk(Vec<Option<Vec<u8>>>),
    /// A `SCAN` page: the next cursor (`0` means exhausted) plus the
    /// keys found on this page.
    ScanPage {
        /// Cursor the caller should pass back for the next page.
        cursor: u64,
        /// Keys found on this page.
        keys: Vec<Vec<u8>>,
    },
}

/// What [`Executor::plan_swap_in`] decided for one key.
enum SwapInStep {
    /// No I/O needed; this is the final answer.
    Resolved(Option<SwapValue>),
    /// A RIO must run before the answer is known.
    NeedsFetch(SwapInPlan),
}

/// Everything [`Executor::apply_swap_in_result`] needs to fold a
/// dispatched [`RioResult`] back into RAM, carried separately from the
/// `Rio` itself so a caller (e.g. [`Executor::mget`]) can dispatch many
/// plans' RIOs together before applying each one's result in turn.
struct SwapInPlan {
    key: Vec<u8>,
    shape: KeyRequestShape,
    rio: Rio,
    fetched_version: u64,
    vtable: &'static dyn SwapDataType,
}

/// One logical swap-core instance: one [`Database`], one
/// [`LockManager`], a worker pool + completion queue, the scan-session
/// table, absent-key cache, and perf counters.
pub struct Executor {
    dbid: u32,
    db: Database,
    locks: LockManager,
    engine: Arc<dyn PersistentEngine>,
    workers: Arc<WorkerPool>,
    completions: Arc<CompletionQueue>,
    scans: ScanSessionTable,
    absent: AbsentCache,
    perf: Arc<PerfStats>,
    slow_swaps: SlowSwapRing,
    txids: TxIdAllocator,
    config: SwapConfig,
}

impl Executor {
    /// Build a fresh executor over `engine`, serving database `dbid`
    /// only (the reference command set has no multi-database command
    /// like `SELECT`/`SWAPDB`, so one `Executor` owns one `Database`).
    pub fn new(dbid: u32, engine: Arc<dyn PersistentEngine>, config: SwapConfig) -> ExecResult<Self> {
        config.validate().map_err(ExecError::Config)?;
        Ok(Executor {
            dbid,
            db: Database::new(),
            locks: LockManager::new(1),
            workers: Arc::new(WorkerPool::new(config.worker_count, config.worker_queue_high_watermark)),
            completions: Arc::new(CompletionQueue::new()),
            scans: ScanSessionTable::with_capacity(config.scan_session_capacity),
            absent: AbsentCache::with_capacity(config.absent_cache_capacity),
            perf: Arc::new(PerfStats::new()),
            slow_swaps: SlowSwapRing::with_capacity_and_sample_rate(
                config.slow_swap_ring_capacity,
                config.slow_swap_sample_rate_pct,
            ),
            txids: TxIdAllocator::new(),
            engine,
            config,
        })
    }

    /// Read-only access to the perf counters, for an `INFO`-equivalent
    /// surface (spec.md §4.11).
    pub fn perf(&self) -> &PerfStats {
        &self.perf
    }

    /// Run one command to completion.
    pub fn execute(&mut self, command: Command) -> ExecResult<Output> {
        let txid = self.txids.next();
        let span = tracing::info_span!("execute", txid = %txid);
        let _enter = span.enter();

        match &command {
            Command::DebugReload => self.debug_reload(),
            Command::Scan { cursor, count } => self.scan(txid, *cursor, *count),
            Command::Get { key } => self.get(txid, key),
            Command::Set { key, value } => self.set(txid, key, value),
            Command::GetDel { key } => self.getdel(txid, key),
            Command::Del { key } => self.del(txid, key),
            Command::HSet { key, fields } => self.hset(txid, key, fields),
            Command::HGet { key, field } => self.hget(txid, key, field),
            Command::HDel { key, fields } => self.hdel(txid, key, fields),
            Command::MGet { keys } => self.mget(txid, keys),
        }
    }

    // -- lock helpers ----------------------------------------------------

    /// Acquire a lock for `req`, reporting whether its `on_ready`
    /// callback fired synchronously. This executor's `LockManager` is
    /// built with a single database slot (one `Executor` per logical
    /// database), so the lock lattice is always addressed at slot `0`
    /// regardless of `self.dbid`, which instead only drives the
    /// persistent rawkey encoding below.
    ///
    /// A request for a key some earlier request in the *same* command
    /// still holds (e.g. `MGET a a`) attaches behind it in the key
    /// container and defers: a lock's `proceed` signal only wakes
    /// dependents already linked at the moment it fires, so a dependent
    /// linked afterwards — which a same-command repeat always is, since
    /// it cannot be acquired before the earlier occurrence is processed
    /// — only wakes on that occurrence's full `unlock`. Callers with
    /// more than one key-request per command (currently only
    /// [`Executor::mget`]) must check the returned flag and, on `false`,
    /// fully finish and unlock every lock acquired so far in this
    /// command before proceeding.
    fn try_lock_key(&mut self, req: &KeyRequest) -> (LockId, std::rc::Rc<std::cell::Cell<bool>>) {
        use std::cell::Cell;
        use std::rc::Rc;
        let target = LockTarget { txid: req.txid, level: req.level, dbid: 0, key: req.key.as_deref() };
        let proceeded = Rc::new(Cell::new(false));
        let proceeded2 = proceeded.clone();
        let id = self.locks.acquire(&target, move || proceeded2.set(true));
        (id, proceeded)
    }

    /// [`Self::try_lock_key`] for the common case of a single-key-request
    /// command: such a command is never contended by an earlier request
    /// of its own, so the acquire is always expected to proceed
    /// synchronously.
    fn lock_key(&mut self, req: &KeyRequest) -> LockId {
        let (id, proceeded) = self.try_lock_key(req);
        debug_assert!(proceeded.get(), "a single-key command's only acquire must proceed immediately");
        id
    }

    fn unlock(&mut self, id: LockId) {
        self.locks.mark_proceeded(id);
        self.locks.unlock(id);
    }

    // -- GET / HGET --------------------------------------------------------

    fn get(&mut self, txid: TxId, key: &[u8]) -> ExecResult<Output> {
        // Admission-gate fast path (spec.md §4.3 "lockWouldBlock"): a
        // HOT key with an uncontended lock lattice answers straight out
        // of RAM with no lock node and no extractor call at all.
        if self.db.residency(key) == Residency::Hot && !self.locks.would_block(txid, Some(0), Some(key)) {
            return Ok(Output::Bulk(self.db.value(key).and_then(|v| v.as_whole_key().map(|b| b.to_vec()))));
        }

        let req = extract(txid, self.dbid, &Command::Get { key: key.to_vec() }).remove(0);
        let lock = self.lock_key(&req);

        if self.db.residency(key) == Residency::Missing && self.absent.contains(key) {
            self.perf.absent_cache_hits.fetch_add(1, Ordering::Relaxed);
            self.unlock(lock);
            return Ok(Output::Bulk(None));
        }

        let outcome = self.run_swap_in(key, &KeyRequestShape::WholeKey, IntentionFlags::empty());
        self.unlock(lock);
        match outcome? {
            Some(value) => Ok(Output::Bulk(value.as_whole_key().map(|b| b.to_vec()))),
            None => {
                self.absent.insert(key.to_vec());
                Ok(Output::Bulk(None))
            }
        }
    }

    fn hget(&mut self, txid: TxId, key: &[u8], field: &[u8]) -> ExecResult<Output> {
        // Same admission-gate fast path as `get`: a HOT hash already
        // holds every field in RAM, so an uncontended lookup needs
        // neither a lock node nor the extractor.
        if self.db.residency(key) == Residency::Hot && !self.locks.would_block(txid, Some(0), Some(key)) {
            let value = self.db.value(key).and_then(|v| v.as_hash().and_then(|m| m.get(field).cloned()));
            return Ok(Output::Bulk(value));
        }

        let req = extract(txid, self.dbid, &Command::HGet { key: key.to_vec(), field: field.to_vec() }).remove(0);
        let lock = self.lock_key(&req);

        let shape = KeyRequestShape::SubKeys(Arc::from(vec![field.to_vec()]));
        let outcome = self.run_swap_in(key, &shape, IntentionFlags::empty());
        self.unlock(lock);
        let value = outcome?.and_then(|v| v.as_hash().and_then(|m| m.get(field).cloned()));
        Ok(Output::Bulk(value))
    }

    /// Shared swap-in path for `GET`/`HGET`/`GETDEL`/`HDEL`'s read half:
    /// plan the fetch (or resolve immediately with no I/O), dispatch it
    /// if one was needed, and fold the result back into RAM. Returns
    /// the post-swap resident value, or `None` if the key is MISSING or
    /// the fetch found nothing.
    fn run_swap_in(
        &mut self,
        key: &[u8],
        shape: &KeyRequestShape,
        flags: IntentionFlags,
    ) -> ExecResult<Option<SwapValue>> {
        match self.plan_swap_in(key, shape, flags)? {
            SwapInStep::Resolved(value) => Ok(value),
            SwapInStep::NeedsFetch(plan) => {
                let result = self.dispatch_one(&plan.key, plan.rio.clone())?;
                self.apply_swap_in_result(plan, result)
            }
        }
    }

    /// Resolve `key`'s object type and vtable, then either answer
    /// immediately from RAM (the key is MISSING, HOT, or the request's
    /// shape is already fully resident) or build the [`Rio`] a swap-in
    /// needs, capturing the live meta version at plan time so the
    /// eventual [`finish_in`] call can detect a concurrent swap-out
    /// bumping it before the fetch completes (spec.md §3.1).
    fn plan_swap_in(
        &self,
        key: &[u8],
        shape: &KeyRequestShape,
        flags: IntentionFlags,
    ) -> ExecResult<SwapInStep> {
        let residency = self.db.residency(key);
        if residency == Residency::Missing {
            return Ok(SwapInStep::Resolved(None));
        }

        let Some(object_type) = self.db.object_type_hint(key) else {
            return Ok(SwapInStep::Resolved(None));
        };
        let vtable = registry(object_type).ok_or(SwapError::Setup(object_type))?;

        if vtable.missing_subkeys(self.db.value(key), shape) == MissingSubkeys::None {
            return Ok(SwapInStep::Resolved(self.db.value(key).cloned()));
        }

        let input = swapcore_core::SwapAnaInput {
            residency,
            cmd_intention: Intention::In,
            cmd_intention_flags: flags,
            value_dirty: false,
        };
        let (intention, _flags_out) = vtable.swap_ana(&input);
        if intention == Intention::Nop {
            return Ok(SwapInStep::Resolved(self.db.value(key).cloned()));
        }
        if intention != Intention::In {
            return Err(ExecError::Swap(SwapError::UnexpectedIntention(intention)));
        }

        let action = vtable.swap_ana_action(intention, shape);
        let meta = self.db.meta(key).expect("WARM/COLD key must have a meta record").clone();
        let rio = match action {
            RioAction::MultiGet => {
                let mut requests = vec![(ColumnFamily::Meta, meta_key(self.dbid, key))];
                match shape {
                    KeyRequestShape::SubKeys(fields) => {
                        for field in fields.iter() {
                            requests.push((ColumnFamily::Data, data_key(self.dbid, key, meta.version, field)));
                        }
                    }
                    _ => requests.push((ColumnFamily::Data, data_key(self.dbid, key, meta.version, &[]))),
                }
                Rio::MultiGet { requests }
            }
            RioAction::Iterate => {
                let (lo, hi) = data_key_prefix_range(self.dbid, key, meta.version);
                Rio::Iterate { cf: ColumnFamily::Data, lo, hi, limit: usize::MAX }
            }
            _ => return Err(ExecError::Swap(SwapError::UnexpectedAction { intention })),
        };

        Ok(SwapInStep::NeedsFetch(SwapInPlan {
            key: key.to_vec(),
            shape: shape.clone(),
            rio,
            fetched_version: meta.version,
            vtable,
        }))
    }

    /// Decode a dispatched [`RioResult`] against `plan`, fold it
    /// through [`finish_in`], and apply the outcome to RAM.
    fn apply_swap_in_result(&mut self, plan: SwapInPlan, result: RioResult) -> ExecResult<Option<SwapValue>> {
        let key = plan.key.as_slice();
        let (raw_pairs, meta) = match result {
            RioResult::MultiGet(mut values) => {
                let Some(meta_raw) = values[0].take() else {
                    return Ok(None);
                };
                let meta = decode_meta(&meta_raw)
                    .ok_or_else(|| SwapError::Decode { key: key.to_vec(), reason: "malformed meta record".into() })?;
                let mut pairs = Vec::new();
                match &plan.shape {
                    KeyRequestShape::SubKeys(fields) => {
                        for (field, raw) in fields.iter().zip(values.into_iter().skip(1)) {
                            if let Some(raw) = raw {
                                pairs.push((field.clone(), raw));
                            }
                        }
                    }
                    _ => {
                        if let Some(raw) = values.into_iter().nth(1).flatten() {
                            pairs.push((Vec::new(), raw));
                        }
                    }
                }
                (pairs, meta)
            }
            RioResult::Iterate { pairs, .. } => {
                let meta = self.db.meta(key).cloned().expect("WARM/COLD key must have a meta record");
                let decoded = pairs
                    .into_iter()
                    .map(|(raw_key, value)| {
                        let parsed = parse_data_key(&raw_key).expect("our own encoding");
                        (parsed.subkey, value)
                    })
                    .collect();
                (decoded, meta)
            }
            _ => return Err(ExecError::Swap(SwapError::UnexpectedAction { intention: Intention::In })),
        };

        let existing = self.db.value(key).cloned();
        let outcome = finish_in(plan.vtable, existing, &raw_pairs, &plan.shape, meta, plan.fetched_version)?;
        match outcome.residency {
            Residency::Hot => {
                self.db.apply_in_full(key, outcome.value.clone().expect("finish_in always returns a value on In"));
                self.perf.swap_in_count.fetch_add(1, Ordering::Relaxed);
            }
            Residency::Warm => {
                self.db.apply_in_partial(
                    key,
                    outcome.value.clone().expect("finish_in always returns a value on In"),
                    outcome.meta.clone().expect("WARM finish_in keeps its meta"),
                );
                self.perf.swap_in_count.fetch_add(1, Ordering::Relaxed);
            }
            Residency::Cold | Residency::Missing => {}
        }
        Ok(outcome.value)
    }

    /// Dispatch every pending swap-in plan as one batch and fold the
    /// results into `values`. Returns the first error encountered, if
    /// any, without unlocking anything — see [`Self::flush_mget_batch`].
    fn run_pending_mget_batch(
        &mut self,
        pending: &mut Vec<(usize, SwapInPlan)>,
        values: &mut [Option<SwapValue>],
    ) -> ExecResult<()> {
        if pending.is_empty() {
            return Ok(());
        }
        let items: Vec<_> = pending.iter().map(|(idx, plan)| (*idx, plan.key.clone(), plan.rio.clone())).collect();
        let results = self.dispatch_batch(items)?;
        let mut plans_by_token: rustc_hash::FxHashMap<usize, SwapInPlan> =
            std::mem::take(pending).into_iter().collect();
        for (token, result) in results {
            let plan = plans_by_token.remove(&token).expect("token is one of this batch's plan indices");
            values[token] = self.apply_swap_in_result(plan, result)?;
        }
        Ok(())
    }

    /// Dispatch every pending swap-in plan as one batch, fold the
    /// results into `values`, and unlock every lock collected so far —
    /// the locks are unlocked unconditionally, even if dispatching or
    /// applying the batch fails, so a duplicate-key collision's flush
    /// (see [`Executor::mget`]) always wakes the deferred acquire it was
    /// called for rather than leaking a stuck lock on the error path.
    fn flush_mget_batch(
        &mut self,
        locks: &mut Vec<LockId>,
        pending: &mut Vec<(usize, SwapInPlan)>,
        values: &mut [Option<SwapValue>],
    ) -> ExecResult<()> {
        let result = self.run_pending_mget_batch(pending, values);
        for lock in locks.drain(..) {
            self.locks.unlock(lock);
        }
        result
    }

    /// `MGET key [key ...]`: fan every key's swap-in plan out to the
    /// worker shard its key hashes to, so independent keys genuinely
    /// run across workers in parallel (spec.md §8 scenario 6) rather
    /// than serially through repeated `GET`s. Keys already resolvable
    /// from RAM skip the worker pool entirely.
    ///
    /// `MGET a a` is legal (spec.md §4.1: "duplicate keys inside one
    /// command generate independent requests; the lock manager
    /// serialises them"): a request for a repeated key attaches behind
    /// the earlier one in the same key container and defers, since a
    /// dependent linked after its predecessor already proceeded only
    /// wakes on that predecessor's full unlock (see
    /// [`Executor::try_lock_key`]). When that happens, every lock and
    /// swap-in plan collected so far in this command is flushed — the
    /// pending batch dispatched and applied, every lock unlocked — which
    /// is guaranteed to include the colliding predecessor and so wakes
    /// the deferred acquire before this loop iteration continues.
    fn mget(&mut self, txid: TxId, keys: &[Vec<u8>]) -> ExecResult<Output> {
        let reqs = extract(txid, self.dbid, &Command::MGet { keys: keys.to_vec() });

        let mut locks: Vec<LockId> = Vec::with_capacity(reqs.len());
        let mut values: Vec<Option<SwapValue>> = vec![None; keys.len()];
        let mut pending: Vec<(usize, SwapInPlan)> = Vec::new();
        for (idx, req) in reqs.iter().enumerate() {
            let (lock, proceeded) = self.try_lock_key(req);
            if !proceeded.get() {
                if let Err(e) = self.flush_mget_batch(&mut locks, &mut pending, &mut values) {
                    self.locks.unlock(lock);
                    return Err(e);
                }
                debug_assert!(
                    proceeded.get(),
                    "unlocking every outstanding lock must wake a same-command duplicate-key acquire"
                );
            }
            locks.push(lock);

            match self.plan_swap_in(&keys[idx], &KeyRequestShape::WholeKey, IntentionFlags::empty()) {
                Ok(SwapInStep::Resolved(value)) => values[idx] = value,
                Ok(SwapInStep::NeedsFetch(plan)) => pending.push((idx, plan)),
                Err(e) => {
                    if let Err(flush_err) = self.flush_mget_batch(&mut locks, &mut pending, &mut values) {
                        return Err(flush_err);
                    }
                    return Err(e);
                }
            }
        }

        self.flush_mget_batch(&mut locks, &mut pending, &mut values)?;
        let out = values.into_iter().map(|v| v.and_then(|v| v.as_whole_key().map(|b| b.to_vec()))).collect();
        Ok(Output::MultiBulk(out))
    }

    // -- SET / HSET (direct RAM writes) ------------------------------------

    fn set(&mut self, txid: TxId, key: &[u8], value: &[u8]) -> ExecResult<Output> {
        let req = extract(txid, self.dbid, &Command::Set { key: key.to_vec(), value: value.to_vec() }).remove(0);
        let lock = self.lock_key(&req);

        // SET always fully overwrites: no merge with whatever was
        // resident or persisted is needed (the vtables' swapAna table
        // only calls for a fetch when a command's intention is IN
        // without IN_OVERWRITE). Any stale on-disk meta/data rows left
        // from a previous cold generation of this key are cleaned up so
        // a later cold SCAN doesn't see a key that is actually HOT.
        if let Err(e) = self.drop_stale_persisted_rows(key) {
            self.unlock(lock);
            return Err(e);
        }
        self.db.install_hot(key.to_vec(), SwapValue::WholeKey(value.to_vec()), None);
        self.absent.remove(key);
        self.unlock(lock);
        Ok(Output::Ok)
    }

    fn hset(&mut self, txid: TxId, key: &[u8], fields: &[(Vec<u8>, Vec<u8>)]) -> ExecResult<Output> {
        let req = extract(txid, self.dbid, &Command::HSet { key: key.to_vec(), fields: fields.to_vec() }).remove(0);
        let lock = self.lock_key(&req);

        if self.db.object_type_hint(key).is_some_and(|t| t != ObjectType::Hash) {
            self.unlock(lock);
            return Err(ExecError::WrongType(key.to_vec()));
        }
        self.db.upsert_hash_fields(key, fields.to_vec());
        self.absent.remove(key);
        self.unlock(lock);
        Ok(Output::Integer(fields.len() as i64))
    }

    /// Delete any stale `META`/`DATA` rows a previous cold generation of
    /// `key` left on disk, so a fresh `SET` doesn't leave a phantom cold
    /// key visible to `SCAN`.
    fn drop_stale_persisted_rows(&mut self, key: &[u8]) -> ExecResult<()> {
        let Some(meta) = self.db.meta(key).cloned() else { return Ok(()) };
        let mut batch = WriteBatch::new();
        batch.del(ColumnFamily::Meta, meta_key(self.dbid, key));
        let (lo, hi) = data_key_prefix_range(self.dbid, key, meta.version);
        let (pairs, _) = self.engine.iterate(ColumnFamily::Data, &lo, &hi, usize::MAX).map_err(SwapError::from)?;
        for (raw_key, _) in pairs {
            batch.del(ColumnFamily::Data, raw_key);
        }
        self.engine.write(batch).map_err(SwapError::from)?;
        Ok(())
    }

    // -- GETDEL / DEL / HDEL -----------------------------------------------

    fn getdel(&mut self, txid: TxId, key: &[u8]) -> ExecResult<Output> {
        let req = extract(txid, self.dbid, &Command::GetDel { key: key.to_vec() }).remove(0);
        let lock = self.lock_key(&req);

        if self.db.residency(key) == Residency::Missing {
            self.unlock(lock);
            return Ok(Output::Bulk(None));
        }
        let value = match self.run_swap_in(key, &KeyRequestShape::WholeKey, IntentionFlags::IN_DEL) {
            Ok(v) => v,
            Err(e) => {
                self.unlock(lock);
                return Err(e);
            }
        };
        let deleted = self.delete_key(key);
        self.unlock(lock);
        deleted?;
        Ok(Output::Bulk(value.and_then(|v| v.as_whole_key().map(|b| b.to_vec()))))
    }

    fn del(&mut self, txid: TxId, key: &[u8]) -> ExecResult<Output> {
        let req = extract(txid, self.dbid, &Command::Del { key: key.to_vec() }).remove(0);
        let lock = self.lock_key(&req);

        let existed = self.db.residency(key) != Residency::Missing;
        let result = if existed { self.delete_key(key) } else { Ok(()) };
        self.unlock(lock);
        result?;
        Ok(Output::Integer(existed as i64))
    }

    fn hdel(&mut self, txid: TxId, key: &[u8], fields: &[Vec<u8>]) -> ExecResult<Output> {
        let req = extract(txid, self.dbid, &Command::HDel { key: key.to_vec(), fields: fields.to_vec() }).remove(0);
        let lock = self.lock_key(&req);

        if self.db.residency(key) == Residency::Missing {
            self.unlock(lock);
            return Ok(Output::Integer(0));
        }
        let shape = KeyRequestShape::SubKeys(Arc::from(fields.to_vec()));
        if let Err(e) = self.run_swap_in(key, &shape, IntentionFlags::IN_DEL) {
            self.unlock(lock);
            return Err(e);
        }
        let removed = self.db.remove_hash_fields(key, fields);
        if removed > 0 {
            self.absent.remove(key);
        }
        self.unlock(lock);
        Ok(Output::Integer(removed as i64))
    }

    /// Tombstone `key` entirely: delete its meta row and every sub-key
    /// row at the current version, then drop it from RAM.
    fn delete_key(&mut self, key: &[u8]) -> ExecResult<()> {
        if self.db.residency(key) == Residency::Missing {
            return Ok(());
        }
        if let Some(meta) = self.db.meta(key).cloned() {
            let outcome = finish_del(self.dbid, key, &meta);
            if let Some(mut write) = outcome.write {
                let (lo, hi) = data_key_prefix_range(self.dbid, key, meta.version);
                let (pairs, _) =
                    self.engine.iterate(ColumnFamily::Data, &lo, &hi, usize::MAX).map_err(SwapError::from)?;
                for (raw_key, _) in pairs {
                    write.del(ColumnFamily::Data, raw_key);
                }
                self.engine.write(write).map_err(SwapError::from)?;
            }
        }
        self.db.apply_del(key);
        self.absent.remove(key);
        self.perf.swap_del_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    // -- SCAN --------------------------------------------------------------

    fn scan(&mut self, txid: TxId, cursor: u64, count: usize) -> ExecResult<Output> {
        let req = extract(txid, self.dbid, &Command::Scan { cursor, count }).remove(0);
        let lock = self.lock_key(&req);

        let opened_fresh = cursor == 0;
        let (session_id, seek) = if opened_fresh {
            // A full table first tries to evict the idlest non-in-progress
            // session before giving up (spec.md §4.9 "Assign"); only once
            // that also fails is a full table reported the same way an
            // unknown cursor is.
            let max_idle = std::time::Duration::from_secs(self.config.scan_session_max_idle_secs);
            let session = match self.scans.open(max_idle) {
                Some(c) => c,
                None => {
                    self.unlock(lock);
                    return Err(ExecError::Swap(SwapError::ScanSession(ScanSessionError::Unassigned)));
                }
            };
            (session.session, Vec::new())
        } else {
            let decoded = ScanCursor::decode(cursor);
            match self.scans.begin(decoded) {
                Ok(seek) => (decoded.session, seek),
                Err(e) => {
                    self.unlock(lock);
                    return Err(ExecError::Swap(SwapError::from(e)));
                }
            }
        };

        let lo = if seek.is_empty() { meta_key(self.dbid, b"") } else { seek };
        let hi = meta_key(self.dbid + 1, b"");
        let paged = self.engine.iterate(ColumnFamily::Meta, &lo, &hi, count).map_err(SwapError::from);
        let (pairs, next_seek) = match paged {
            Ok(v) => v,
            Err(e) => {
                self.unlock(lock);
                return Err(ExecError::Swap(e));
            }
        };

        let mut keys: Vec<Vec<u8>> = Vec::with_capacity(pairs.len());
        for (raw_key, _) in &pairs {
            if let Some(key) = strip_meta_key_prefix(raw_key) {
                keys.push(key);
            }
        }
        if opened_fresh && next_seek.is_none() {
            // First (and, since the range is already exhausted, only)
            // page of a brand-new scan also surfaces keys that are HOT
            // right now — resident only in RAM with no meta record, so
            // invisible to a META column-family iterate. WARM keys are
            // excluded here since they already have a meta row and so
            // were already returned by the iterate above; counting them
            // twice would make a single SCAN page report the same key
            // under both pre-eviction and post-eviction generations. A
            // documented simplification rather than a single unified
            // cursor over both spaces; see DESIGN.md.
            for key in self.db.hot_key_names().filter(|k| self.db.meta(k).is_none()) {
                keys.push(key.to_vec());
            }
        }

        let next_cursor = self.scans.advance(session_id, next_seek).map(ScanCursor::encode).unwrap_or(0);
        self.unlock(lock);
        Ok(Output::ScanPage { cursor: next_cursor, keys })
    }

    // -- DEBUG RELOAD --------------------------------------------------------

    /// Swap out every currently-HOT key, simulating a full persist-and-
    /// restart cycle (spec.md §8 scenario 1). WARM keys are left alone:
    /// their resident value already reflects only a subset of persisted
    /// fields, and swapping it out wholesale would overwrite the
    /// persisted fields this session never fetched.
    ///
    /// Not part of the formal swap pipeline: there is no
    /// `KeyRequestShape` for "every key", so this sweeps `Database`
    /// directly rather than emitting one key-request per resident key.
    /// Runs synchronously on the executor thread, the same way a real
    /// shutdown/flush drains outstanding swap-outs inline rather than
    /// handing them to the worker pool.
    fn debug_reload(&mut self) -> ExecResult<Output> {
        let hot_keys: Vec<Vec<u8>> =
            self.db.hot_key_names().filter(|k| self.db.meta(k).is_none()).map(|k| k.to_vec()).collect();
        for key in hot_keys {
            let Some(value) = self.db.value(&key).cloned() else { continue };
            let object_type = self.db.object_type_hint(&key).expect("HOT key has a resident value");
            let vtable = registry(object_type).ok_or(SwapError::Setup(object_type))?;
            let meta = MetaRecord::new(object_type, None);
            let outcome = finish_out(self.dbid, &key, vtable, &value, meta);
            if let Some(write) = outcome.write {
                self.engine.write(write).map_err(SwapError::from)?;
            }
            self.db.apply_out(&key, outcome.meta.expect("finish_out always returns a meta"));
            self.perf.swap_out_count.fetch_add(1, Ordering::Relaxed);
        }
        Ok(Output::Ok)
    }

    // -- plumbing ------------------------------------------------------------

    /// Run one RIO synchronously through the worker pool + completion
    /// queue: submit a single-entry [`BatchAccumulator`] to the shard
    /// `key` hashes to, block on the wake pipe, drain, unwrap.
    fn dispatch_one(&mut self, key: &[u8], rio: Rio) -> ExecResult<RioResult> {
        let started = Instant::now();
        let mut results = self.dispatch_batch(vec![(0, key.to_vec(), rio)])?;
        let (_, result) = results.pop().expect("dispatch_batch returns one entry per item on success");
        let micros = started.elapsed().as_micros() as u64;
        if micros >= self.config.slow_swap_threshold_micros {
            self.slow_swaps.record(key.to_vec(), micros);
        }
        Ok(result)
    }

    /// Run a batch of independently-tokened RIOs through the worker
    /// pool: group them by the shard their key hashes to (so same-key
    /// RIOs stay ordered behind whatever else is already queued there),
    /// submit one job per shard that flushes its group through a
    /// [`BatchAccumulator`], then block until every token's result has
    /// been drained off the completion queue. Used directly by `MGET`
    /// (spec.md §8 scenario 6) and, for a single item, by
    /// [`Self::dispatch_one`].
    fn dispatch_batch(&mut self, items: Vec<(usize, Vec<u8>, Rio)>) -> ExecResult<Vec<(usize, RioResult)>> {
        if self.workers.backlog_pressure() {
            tracing::warn!(
                queue_depth = self.workers.queue_depth(),
                "worker backlog pressure: admitting {} more RIOs anyway",
                items.len()
            );
        }

        let expected = items.len();
        let mut by_shard: rustc_hash::FxHashMap<usize, Vec<(usize, Rio)>> = rustc_hash::FxHashMap::default();
        for (token, key, rio) in items {
            let shard = self.workers.shard_of(&key);
            by_shard.entry(shard).or_default().push((token, rio));
        }

        let shard_count = by_shard.len();
        for (shard, group) in by_shard {
            let engine = self.engine.clone();
            let completions = self.completions.clone();
            let tokens: Vec<usize> = group.iter().map(|(token, _)| *token).collect();
            self.workers.submit_to_shard(
                shard,
                Box::new(move || {
                    let mut acc = BatchAccumulator::new();
                    for (token, rio) in group {
                        acc.push(token, rio);
                    }
                    match acc.flush(engine.as_ref()) {
                        Ok(results) => {
                            for (token, result) in results {
                                completions.push(SwapResultEnvelope { token, payload: CompletionPayload::Rio(vec![result]) });
                            }
                        }
                        Err(e) => {
                            let error = SwapError::from(e);
                            for token in tokens {
                                completions.push(SwapResultEnvelope {
                                    token,
                                    payload: CompletionPayload::Failed(error.clone()),
                                });
                            }
                        }
                    }
                }),
            );
        }

        let mut collected = Vec::with_capacity(expected);
        let mut first_err = None;
        let mut seen = 0usize;
        while seen < expected {
            self.completions.wait();
            for envelope in self.completions.drain() {
                seen += 1;
                match envelope.payload {
                    CompletionPayload::Rio(mut results) => {
                        collected.push((envelope.token, results.pop().expect("exactly one Rio was queued")));
                    }
                    CompletionPayload::Failed(e) => {
                        first_err.get_or_insert(e);
                    }
                }
            }
        }
        self.perf.rio_batches.fetch_add(shard_count as u64, Ordering::Relaxed);
        if let Some(e) = first_err {
            return Err(ExecError::Swap(e));
        }
        Ok(collected)
    }
}

/// Recover the user-visible key from a `meta_key`-encoded rawkey
/// (`dbid(4) || keylen(4) || key`).
fn strip_meta_key_prefix(raw: &[u8]) -> Option<Vec<u8>> {
    if raw.len() < 8 {
        return None;
    }
    let keylen = u32::from_be_bytes(raw[4..8].try_into().ok()?) as usize;
    raw.get(8..8 + keylen).map(|s| s.to_vec())
}
