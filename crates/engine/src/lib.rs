//! The swap engine: value-type vtables, the background worker pool, the
//! completion queue, the scan-session table, the absent-key cache, and
//! perf telemetry (spec.md components C2-C4, C9-C11).

#![warn(missing_docs)]

pub mod absent;
pub mod batch;
pub mod completion;
pub mod finish;
pub mod perf;
pub mod scan;
pub mod vtable;
pub mod worker;

pub use absent::AbsentCache;
pub use batch::BatchAccumulator;
pub use completion::{CompletionQueue, SwapResultEnvelope};
pub use finish::{finish_del, finish_in, finish_out, FinishOutcome};
pub use perf::{PerfStats, SlowSwapEntry, SlowSwapRing};
pub use scan::{ScanCursor, ScanSessionTable};
pub use vtable::registry;
pub use worker::WorkerPool;
