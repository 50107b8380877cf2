//! Request extractor (spec.md §4.1, component C6): turns a command into
//! the ordered sequence of key-requests it needs locked and swapped.
//!
//! The reference command set is deliberately small — just enough to
//! exercise every intention/flag combination the spec's end-to-end
//! scenarios name (§8). Dispatch is a plain `match` on [`Command`]
//! rather than the source's table-driven extractor registry, since
//! nine commands don't warrant one.

use std::sync::Arc;
use swapcore_core::{Intention, IntentionFlags, KeyRequest, KeyRequestShape, TxId};

/// The reference command set this workspace's executor understands.
/// Everything else named in spec.md §1 as a non-goal (the full command
/// table, replication, cluster bus, ...) has no representation here.
#[derive(Debug, Clone)]
pub enum Command {
    /// `GET key`.
    Get { key: Vec<u8> },
    /// `SET key value`.
    Set { key: Vec<u8>, value: Vec<u8> },
    /// `GETDEL key`.
    GetDel { key: Vec<u8> },
    /// `DEL key`.
    Del { key: Vec<u8> },
    /// `HSET key field value [field value ...]`.
    HSet { key: Vec<u8>, fields: Vec<(Vec<u8>, Vec<u8>)> },
    /// `HGET key field`.
    HGet { key: Vec<u8>, field: Vec<u8> },
    /// `HDEL key field [field ...]`.
    HDel { key: Vec<u8>, fields: Vec<Vec<u8>> },
    /// `SCAN cursor [COUNT count]`.
    Scan { cursor: u64, count: usize },
    /// `MGET key [key ...]` — the only multi-key reference command,
    /// added to exercise spec.md §8 scenario 6's cross-key worker race
    /// at the command layer rather than only at the worker/queue layer.
    MGet { keys: Vec<Vec<u8>> },
    /// `DEBUG RELOAD` — a test-harness-only maintenance command (not a
    /// real swap-core command): swaps out every HOT key, simulating a
    /// full persist-and-restart cycle with no RDB layer of its own.
    DebugReload,
}

/// Extract the key-requests `command` needs locked before it can run.
///
/// Every command but `MGet` emits exactly one key-request; `MGet` emits
/// one whole-key `In` request per key, the concatenated sequence spec.md
/// §4.1 describes for a multi-key command. `DebugReload` emits none — a
/// maintenance sweep handled directly by the executor rather than
/// through the per-key swap pipeline, since no single `KeyRequestShape`
/// describes "every key in the database".
pub fn extract(txid: TxId, dbid: u32, command: &Command) -> Vec<KeyRequest> {
    match command {
        Command::Get { key } => {
            vec![KeyRequest::whole_key(txid, dbid, key.clone(), Intention::In, IntentionFlags::empty())]
        }
        Command::Set { key, .. } => {
            vec![KeyRequest::whole_key(txid, dbid, key.clone(), Intention::In, IntentionFlags::IN_OVERWRITE)]
        }
        Command::GetDel { key } => {
            vec![KeyRequest::whole_key(txid, dbid, key.clone(), Intention::In, IntentionFlags::IN_DEL)]
        }
        Command::Del { key } => {
            vec![KeyRequest::whole_key(txid, dbid, key.clone(), Intention::Del, IntentionFlags::empty())]
        }
        Command::HSet { key, fields } => {
            let names: Arc<[Vec<u8>]> = Arc::from(fields.iter().map(|(f, _)| f.clone()).collect::<Vec<_>>());
            let mut req =
                KeyRequest::whole_key(txid, dbid, key.clone(), Intention::In, IntentionFlags::IN_OVERWRITE);
            req.shape = KeyRequestShape::SubKeys(names);
            vec![req]
        }
        Command::HGet { key, field } => {
            let mut req = KeyRequest::whole_key(txid, dbid, key.clone(), Intention::In, IntentionFlags::empty());
            req.shape = KeyRequestShape::SubKeys(Arc::from(vec![field.clone()]));
            vec![req]
        }
        Command::HDel { key, fields } => {
            let mut req = KeyRequest::whole_key(txid, dbid, key.clone(), Intention::In, IntentionFlags::IN_DEL);
            req.shape = KeyRequestShape::SubKeys(Arc::from(fields.clone()));
            vec![req]
        }
        Command::Scan { .. } => {
            vec![KeyRequest::database(txid, dbid, Intention::Util)]
                .into_iter()
                .map(|mut r| {
                    r.cmd_intention_flags = IntentionFlags::METASCAN_SCAN;
                    r
                })
                .collect()
        }
        Command::MGet { keys } => keys
            .iter()
            .map(|key| KeyRequest::whole_key(txid, dbid, key.clone(), Intention::In, IntentionFlags::empty()))
            .collect(),
        Command::DebugReload => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swapcore_core::Level;

    #[test]
    fn get_extracts_one_whole_key_in_request() {
        let reqs = extract(TxId::from_raw(1), 0, &Command::Get { key: b"foo".to_vec() });
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].cmd_intention, Intention::In);
        assert!(matches!(reqs[0].shape, KeyRequestShape::WholeKey));
    }

    #[test]
    fn getdel_sets_in_del_flag() {
        let reqs = extract(TxId::from_raw(1), 0, &Command::GetDel { key: b"foo".to_vec() });
        assert!(reqs[0].cmd_intention_flags.contains(IntentionFlags::IN_DEL));
    }

    #[test]
    fn hget_extracts_a_single_subkey_shape() {
        let reqs = extract(TxId::from_raw(1), 0, &Command::HGet { key: b"h".to_vec(), field: b"f2".to_vec() });
        match &reqs[0].shape {
            KeyRequestShape::SubKeys(fields) => assert_eq!(fields.as_ref(), &[b"f2".to_vec()]),
            other => panic!("expected SubKeys shape, got {other:?}"),
        }
    }

    #[test]
    fn scan_extracts_a_database_level_util_request() {
        let reqs = extract(TxId::from_raw(1), 0, &Command::Scan { cursor: 0, count: 100 });
        assert_eq!(reqs[0].level, Level::Database);
        assert_eq!(reqs[0].cmd_intention, Intention::Util);
        assert!(reqs[0].cmd_intention_flags.contains(IntentionFlags::METASCAN_SCAN));
    }

    #[test]
    fn mget_extracts_one_whole_key_request_per_key_in_order() {
        let reqs = extract(TxId::from_raw(1), 0, &Command::MGet { keys: vec![b"a".to_vec(), b"b".to_vec()] });
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].key.as_deref(), Some(b"a".as_slice()));
        assert_eq!(reqs[1].key.as_deref(), Some(b"b".as_slice()));
        assert!(reqs.iter().all(|r| r.cmd_intention == Intention::In));
    }

    #[test]
    fn debug_reload_extracts_nothing() {
        assert!(extract(TxId::from_raw(1), 0, &Command::DebugReload).is_empty());
    }
}
