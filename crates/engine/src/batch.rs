//! Batch accumulator (spec.md §4.5, component C5): groups the RIOs
//! several in-flight requests produced in one exec cycle so they reach
//! the persistent engine as one [`RioBatch`] instead of one call per
//! request.

use swapcore_storage::{PersistentEngine, Rio, RioBatch, RioResult, StorageResult};

/// Accumulates [`Rio`]s tagged with a caller-chosen token (typically an
/// index into the caller's in-flight request table) across one exec
/// cycle, then executes them together.
#[derive(Default)]
pub struct BatchAccumulator {
    batch: RioBatch,
    tokens: Vec<usize>,
}

impl BatchAccumulator {
    /// An empty accumulator.
    pub fn new() -> Self {
        BatchAccumulator { batch: RioBatch::new(), tokens: Vec::new() }
    }

    /// Queue one RIO, tagged with `token` so its result can be routed
    /// back to the request that produced it.
    pub fn push(&mut self, token: usize, rio: Rio) {
        self.tokens.push(token);
        self.batch.push(rio);
    }

    /// Number of queued RIOs.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// `true` if nothing has been queued yet.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Execute every queued RIO against `engine` and return one
    /// `(token, result)` per queued RIO, in submission order.
    pub fn flush(self, engine: &dyn PersistentEngine) -> StorageResult<Vec<(usize, RioResult)>> {
        let results = self.batch.execute(engine)?;
        Ok(self.tokens.into_iter().zip(results).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swapcore_storage::{ColumnFamily, InMemoryEngine, WriteBatch};

    #[test]
    fn flush_routes_results_back_to_tokens() {
        let engine = InMemoryEngine::new();
        let mut write = WriteBatch::new();
        write.put(ColumnFamily::Data, b"k".to_vec(), b"v".to_vec());
        engine.write(write).unwrap();

        let mut acc = BatchAccumulator::new();
        acc.push(7, Rio::Get { cf: ColumnFamily::Data, key: b"k".to_vec() });
        acc.push(9, Rio::Get { cf: ColumnFamily::Data, key: b"missing".to_vec() });
        let routed = acc.flush(&engine).unwrap();
        assert_eq!(routed[0].0, 7);
        assert!(matches!(&routed[0].1, RioResult::Get(Some(v)) if v == b"v"));
        assert_eq!(routed[1].0, 9);
        assert!(matches!(&routed[1].1, RioResult::Get(None)));
    }
}
