//! RIO / RIO-Batch proper: one abstract operation against the persistent
//! engine, and the aggregation of several into one physical call
//! (spec.md §4.2, §4.5 "exec batch").

use crate::engine::{PersistentEngine, WriteBatch};
use crate::error::StorageResult;
use swapcore_core::vtable::{ColumnFamily, RioAction};

/// One request against the persistent engine, pre-aggregation.
#[derive(Debug, Clone)]
pub enum Rio {
    /// A single-key fetch.
    Get { cf: ColumnFamily, key: Vec<u8> },
    /// A multi-key fetch.
    MultiGet { requests: Vec<(ColumnFamily, Vec<u8>)> },
    /// An atomic write batch.
    Write { batch: WriteBatch },
    /// A range scan.
    Iterate { cf: ColumnFamily, lo: Vec<u8>, hi: Vec<u8>, limit: usize },
}

impl Rio {
    /// The [`RioAction`] this request realizes, used to group RIOs
    /// sharing action + column family into one [`RioBatch`].
    pub fn action(&self) -> RioAction {
        match self {
            Rio::Get { .. } => RioAction::Get,
            Rio::MultiGet { .. } => RioAction::MultiGet,
            Rio::Write { .. } => RioAction::Write,
            Rio::Iterate { .. } => RioAction::Iterate,
        }
    }
}

/// The outcome of executing one [`Rio`].
#[derive(Debug, Clone)]
pub enum RioResult {
    /// Result of a [`Rio::Get`].
    Get(Option<Vec<u8>>),
    /// Result of a [`Rio::MultiGet`], in request order.
    MultiGet(Vec<Option<Vec<u8>>>),
    /// Result of a [`Rio::Write`].
    Write,
    /// Result of a [`Rio::Iterate`].
    Iterate { pairs: Vec<(Vec<u8>, Vec<u8>)>, next_seek: Option<Vec<u8>> },
}

/// A group of [`Rio`]s sharing `(action, column family)`, submitted as
/// few physical engine calls as possible.
///
/// `Get`s are folded into a single `MULTIGET`; `Write`s are folded into a
/// single atomic `WRITE`; `MultiGet`/`Iterate` requests are each executed
/// individually (they already address multiple keys / a range).
#[derive(Debug, Default)]
pub struct RioBatch {
    requests: Vec<Rio>,
}

impl RioBatch {
    /// An empty batch.
    pub fn new() -> Self {
        RioBatch { requests: Vec::new() }
    }

    /// Queue one request.
    pub fn push(&mut self, rio: Rio) {
        self.requests.push(rio);
    }

    /// Number of queued requests.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// `true` if no requests are queued.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Execute every queued request against `engine`, folding same-shape
    /// requests into as few physical calls as the engine vocabulary
    /// allows, and return one [`RioResult`] per queued [`Rio`] in
    /// submission order.
    pub fn execute(self, engine: &dyn PersistentEngine) -> StorageResult<Vec<RioResult>> {
        // Fold every individual Get into one MULTIGET call.
        let get_indices: Vec<usize> = self
            .requests
            .iter()
            .enumerate()
            .filter(|(_, r)| matches!(r, Rio::Get { .. }))
            .map(|(i, _)| i)
            .collect();
        let folded_gets = if !get_indices.is_empty() {
            let keys: Vec<(ColumnFamily, Vec<u8>)> = get_indices
                .iter()
                .map(|&i| match &self.requests[i] {
                    Rio::Get { cf, key } => (*cf, key.clone()),
                    _ => unreachable!(),
                })
                .collect();
            Some(engine.multi_get(&keys)?)
        } else {
            None
        };

        // Fold every individual Write into one atomic batch, applied
        // once so the whole RioBatch's writes are atomic together.
        let write_indices: Vec<usize> = self
            .requests
            .iter()
            .enumerate()
            .filter(|(_, r)| matches!(r, Rio::Write { .. }))
            .map(|(i, _)| i)
            .collect();
        if !write_indices.is_empty() {
            let mut combined = WriteBatch::new();
            for &i in &write_indices {
                if let Rio::Write { batch } = &self.requests[i] {
                    combined.extend(batch.clone());
                }
            }
            engine.write(combined)?;
        }

        let mut out = Vec::with_capacity(self.requests.len());
        let mut get_cursor = 0usize;
        for req in &self.requests {
            let result = match req {
                Rio::Get { .. } => {
                    let vals = folded_gets.as_ref().expect("folded above");
                    let v = vals[get_cursor].clone();
                    get_cursor += 1;
                    RioResult::Get(v)
                }
                Rio::MultiGet { requests } => RioResult::MultiGet(engine.multi_get(requests)?),
                Rio::Write { .. } => RioResult::Write,
                Rio::Iterate { cf, lo, hi, limit } => {
                    let (pairs, next_seek) = engine.iterate(*cf, lo, hi, *limit)?;
                    RioResult::Iterate { pairs, next_seek }
                }
            };
            out.push(result);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryEngine;

    #[test]
    fn folds_gets_into_one_multiget() {
        let engine = InMemoryEngine::new();
        let mut write = WriteBatch::new();
        write.put(ColumnFamily::Data, b"a".to_vec(), b"1".to_vec());
        write.put(ColumnFamily::Data, b"b".to_vec(), b"2".to_vec());
        engine.write(write).unwrap();

        let mut batch = RioBatch::new();
        batch.push(Rio::Get { cf: ColumnFamily::Data, key: b"a".to_vec() });
        batch.push(Rio::Get { cf: ColumnFamily::Data, key: b"b".to_vec() });
        batch.push(Rio::Get { cf: ColumnFamily::Data, key: b"missing".to_vec() });
        let results = batch.execute(&engine).unwrap();
        assert_eq!(results.len(), 3);
        assert!(matches!(&results[0], RioResult::Get(Some(v)) if v == b"1"));
        assert!(matches!(&results[1], RioResult::Get(Some(v)) if v == b"2"));
        assert!(matches!(&results[2], RioResult::Get(None)));
    }

    #[test]
    fn writes_are_applied_atomically_as_one_batch() {
        let engine = InMemoryEngine::new();
        let mut batch = RioBatch::new();
        let mut b1 = WriteBatch::new();
        b1.put(ColumnFamily::Meta, b"k1".to_vec(), b"v1".to_vec());
        let mut b2 = WriteBatch::new();
        b2.put(ColumnFamily::Meta, b"k2".to_vec(), b"v2".to_vec());
        batch.push(Rio::Write { batch: b1 });
        batch.push(Rio::Write { batch: b2 });
        batch.execute(&engine).unwrap();
        assert_eq!(engine.get(ColumnFamily::Meta, b"k1").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(engine.get(ColumnFamily::Meta, b"k2").unwrap(), Some(b"v2".to_vec()));
    }
}
