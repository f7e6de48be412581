//! Property-based tests for the message store.
//!
//! Verifies that the de-duplication invariant holds under arbitrary
//! operation sequences: no two entries ever share an id, regardless of
//! how appends, optimistic inserts, reconciliations, and history seeds
//! interleave.

use std::collections::HashSet;

use palaver_core::{ChatMessage, DeliveryStatus, MessageId, MessageStore};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum StoreOp {
    Append(u64),
    AppendOptimistic(u64),
    Reconcile { local_id: u64, server_id: u64 },
    MarkFailed(u64),
    SeedHistory(Vec<u64>),
}

/// Small id ranges force collisions between operations.
fn op_strategy() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        3 => (0u64..16).prop_map(StoreOp::Append),
        3 => (0u64..16).prop_map(StoreOp::AppendOptimistic),
        3 => (0u64..16, 0u64..16)
            .prop_map(|(local_id, server_id)| StoreOp::Reconcile { local_id, server_id }),
        1 => (0u64..16).prop_map(StoreOp::MarkFailed),
        1 => prop::collection::vec(0u64..16, 0..8).prop_map(StoreOp::SeedHistory),
    ]
}

fn server_msg(id: u64) -> ChatMessage {
    ChatMessage {
        id: MessageId::Server(id),
        room_id: 1,
        sender_id: 2,
        sender_name: "peer".to_string(),
        body: format!("m{id}"),
        original_body: None,
        sent_at_ms: id * 10,
        status: DeliveryStatus::Confirmed,
    }
}

fn apply(store: &mut MessageStore, op: StoreOp) {
    match op {
        StoreOp::Append(id) => store.append(server_msg(id)),
        StoreOp::AppendOptimistic(id) => {
            store.append_optimistic(ChatMessage::optimistic(id, 1, 1, "me", format!("o{id}"), 0));
        },
        StoreOp::Reconcile { local_id, server_id } => {
            store.reconcile(local_id, server_msg(server_id));
        },
        StoreOp::MarkFailed(id) => {
            store.mark_failed(id);
        },
        StoreOp::SeedHistory(ids) => {
            store.seed_history(ids.into_iter().map(server_msg).collect());
        },
    }
}

proptest! {
    #[test]
    fn prop_ids_stay_unique(ops in prop::collection::vec(op_strategy(), 0..64)) {
        let mut store = MessageStore::new();

        for op in ops {
            apply(&mut store, op);

            let mut seen = HashSet::new();
            for message in store.messages() {
                prop_assert!(seen.insert(message.id), "duplicate id {}", message.id);
            }
        }
    }

    #[test]
    fn prop_snapshot_reverses_storage_order(ops in prop::collection::vec(op_strategy(), 0..32)) {
        let mut store = MessageStore::new();
        for op in ops {
            apply(&mut store, op);
        }

        let mut reversed = store.snapshot();
        reversed.reverse();
        prop_assert_eq!(reversed.as_slice(), store.messages());
    }

    #[test]
    fn prop_reconcile_never_loses_confirmed(
        prefix in prop::collection::vec(op_strategy(), 0..24),
        local_id in 0u64..16,
        server_id in 0u64..16,
    ) {
        let mut store = MessageStore::new();
        for op in prefix {
            apply(&mut store, op);
        }

        store.reconcile(local_id, server_msg(server_id));

        prop_assert!(store.contains(MessageId::Server(server_id)));
        prop_assert!(!store.contains(MessageId::Local(local_id)));
    }
}
