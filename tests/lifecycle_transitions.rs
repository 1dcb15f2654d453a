//! Black-box coverage of the PaymentIntent state machine's transition table
//! (spec §4.3): every edge the monitor, the scheduled sweeps, and the
//! facilitator-standard HTTP surface rely on, and the terminal states that
//! must reject everything but the refund path.

use zcash_x402_facilitator::store::{is_valid_transition, PaymentState};

const NON_TERMINAL: [PaymentState; 3] = [
    PaymentState::Created,
    PaymentState::AwaitingConfirmation,
    PaymentState::Verified,
];

const TERMINAL: [PaymentState; 4] = [
    PaymentState::Settled,
    PaymentState::Expired,
    PaymentState::Refunded,
    PaymentState::Failed,
];

#[test]
fn happy_path_progresses_one_state_at_a_time() {
    assert!(is_valid_transition(
        PaymentState::Created,
        PaymentState::AwaitingConfirmation
    ));
    assert!(is_valid_transition(
        PaymentState::AwaitingConfirmation,
        PaymentState::Verified
    ));
    assert!(is_valid_transition(
        PaymentState::Verified,
        PaymentState::Settled
    ));
}

#[test]
fn reorg_reverts_bound_states_back_to_created() {
    assert!(is_valid_transition(
        PaymentState::AwaitingConfirmation,
        PaymentState::Created
    ));
    assert!(is_valid_transition(
        PaymentState::Verified,
        PaymentState::Created
    ));
}

#[test]
fn expiry_only_applies_to_unbound_non_terminal_states() {
    assert!(is_valid_transition(
        PaymentState::Created,
        PaymentState::Expired
    ));
    assert!(is_valid_transition(
        PaymentState::AwaitingConfirmation,
        PaymentState::Expired
    ));
    assert!(!is_valid_transition(
        PaymentState::Verified,
        PaymentState::Expired
    ));
}

#[test]
fn every_non_terminal_state_can_fail() {
    for state in NON_TERMINAL {
        assert!(
            is_valid_transition(state, PaymentState::Failed),
            "{state:?} should be able to transition to Failed"
        );
    }
}

#[test]
fn only_settled_can_be_refunded() {
    assert!(is_valid_transition(
        PaymentState::Settled,
        PaymentState::Refunded
    ));
    for state in NON_TERMINAL {
        assert!(!is_valid_transition(state, PaymentState::Refunded));
    }
}

#[test]
fn terminal_states_reject_every_transition_but_refund() {
    for &from in &TERMINAL {
        for &to in TERMINAL.iter().chain(NON_TERMINAL.iter()) {
            let allowed = from == PaymentState::Settled && to == PaymentState::Refunded;
            assert_eq!(
                is_valid_transition(from, to),
                allowed,
                "{from:?} -> {to:?} should be {allowed}"
            );
        }
    }
}

#[test]
fn no_state_ever_transitions_to_itself() {
    for state in NON_TERMINAL.iter().chain(TERMINAL.iter()) {
        assert!(!is_valid_transition(*state, *state));
    }
}
