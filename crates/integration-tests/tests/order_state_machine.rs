//! Integration tests for the order state machine.
//!
//! These verify the transition table and terminal/archival rules through
//! the public API of the core crate; the service-level wiring (guarded
//! updates, notification edges) is covered by the server's own tests.

use almacen_core::OrderStatus;

const ALL_STATUSES: [OrderStatus; 4] = [
    OrderStatus::Pending,
    OrderStatus::InProgress,
    OrderStatus::Ready,
    OrderStatus::Cancelled,
];

// =============================================================================
// Transition Table
// =============================================================================

#[test]
fn pending_moves_forward_or_cancels() {
    assert!(OrderStatus::Pending.can_transition_to(OrderStatus::InProgress));
    assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
    assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Ready));
}

#[test]
fn in_progress_completes_or_cancels() {
    assert!(OrderStatus::InProgress.can_transition_to(OrderStatus::Ready));
    assert!(OrderStatus::InProgress.can_transition_to(OrderStatus::Cancelled));
    assert!(!OrderStatus::InProgress.can_transition_to(OrderStatus::Pending));
}

#[test]
fn terminal_states_admit_no_transitions() {
    for from in [OrderStatus::Ready, OrderStatus::Cancelled] {
        for to in ALL_STATUSES {
            assert!(
                !from.can_transition_to(to),
                "{from} -> {to} must be rejected"
            );
        }
    }
}

#[test]
fn no_status_transitions_to_itself() {
    // Re-applying the current status is handled as an idempotent no-op
    // upstream, not as a transition.
    for status in ALL_STATUSES {
        assert!(!status.can_transition_to(status));
    }
}

#[test]
fn ready_cannot_regress_to_in_progress() {
    // An order in `ready` asked to move back to `in_progress` must be
    // rejected with no state change.
    assert!(!OrderStatus::Ready.can_transition_to(OrderStatus::InProgress));
}

// =============================================================================
// Archival Rules
// =============================================================================

#[test]
fn only_terminal_orders_are_archivable() {
    assert!(OrderStatus::Ready.is_terminal());
    assert!(OrderStatus::Cancelled.is_terminal());
    assert!(!OrderStatus::Pending.is_terminal());
    assert!(!OrderStatus::InProgress.is_terminal());
}

// =============================================================================
// Wire Format
// =============================================================================

#[test]
fn statuses_serialize_as_snake_case() {
    let pairs = [
        (OrderStatus::Pending, "\"pending\""),
        (OrderStatus::InProgress, "\"in_progress\""),
        (OrderStatus::Ready, "\"ready\""),
        (OrderStatus::Cancelled, "\"cancelled\""),
    ];
    for (status, expected) in pairs {
        assert_eq!(serde_json::to_string(&status).expect("serialize"), expected);
    }
}

#[test]
fn default_status_is_pending() {
    assert_eq!(OrderStatus::default(), OrderStatus::Pending);
}
