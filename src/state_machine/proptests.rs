//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::event::{PAYLOAD_BACK, PAYLOAD_CART, PAYLOAD_PAY};
use super::transition::*;
use super::*;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_state() -> impl Strategy<Value = SessionState> {
    prop_oneof![
        Just(SessionState::Start),
        Just(SessionState::BrowsingCatalog),
        Just(SessionState::ViewingProduct),
        Just(SessionState::ViewingCart),
        Just(SessionState::AwaitingEmail),
    ]
}

fn arb_conversation() -> impl Strategy<Value = ConversationId> {
    any::<i64>().prop_map(ConversationId)
}

fn arb_payload() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(PAYLOAD_CART.to_string()),
        Just(PAYLOAD_BACK.to_string()),
        Just(PAYLOAD_PAY.to_string()),
        "[a-z0-9-]{1,12}",
        ("[a-z0-9-]{1,12}", 0u32..20).prop_map(|(id, q)| format!("{id}~{q}")),
        ".{0,16}",
    ]
}

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("/start".to_string()),
        "[a-z]{1,8}@[a-z]{1,8}\\.[a-z]{2,3}",
        ".{0,24}",
    ]
}

fn arb_update() -> impl Strategy<Value = Update> {
    prop_oneof![
        (arb_conversation(), arb_text()).prop_map(|(conversation_id, text)| Update::Message {
            conversation_id,
            text
        }),
        (arb_conversation(), arb_payload(), any::<i64>()).prop_map(
            |(conversation_id, payload, source_message_id)| Update::Callback {
                conversation_id,
                payload,
                source_message_id,
                callback_id: None,
            }
        ),
    ]
}

/// Legal (state, input) pairs from the transition table
fn is_recognized(state: SessionState, input: &Input) -> bool {
    match (state, input) {
        (SessionState::Start, _)
        | (SessionState::BrowsingCatalog, Input::Choice(_) | Input::OpenCart)
        | (
            SessionState::ViewingProduct,
            Input::AddToCart { .. } | Input::OpenCart | Input::GoBack,
        )
        | (SessionState::ViewingCart, Input::Choice(_) | Input::Pay | Input::GoBack) => true,
        (SessionState::AwaitingEmail, Input::Text(text)) => is_email(text),
        _ => false,
    }
}

proptest! {
    /// Unrecognized input never moves the conversation and only re-prompts
    #[test]
    fn prop_unrecognized_input_is_noop(state in arb_state(), update in arb_update()) {
        let input = update.input();
        prop_assume!(!is_recognized(state, &input));

        let result = transition(state, &update);
        prop_assert_eq!(result.next_state, state);
        prop_assert_eq!(result.actions, vec![OutboundAction::reprompt(state)]);
    }

    /// Same state and update always produce the same transition
    #[test]
    fn prop_transition_is_deterministic(
        state in arb_state(),
        update in arb_update(),
        history in proptest::collection::vec((arb_state(), arb_update()), 0..8),
    ) {
        let first = transition(state, &update);
        for (s, u) in &history {
            let _ = transition(*s, u);
        }
        let second = transition(state, &update);
        prop_assert_eq!(first, second);
    }

    /// Recognized input always emits at least one action that is not a re-prompt
    #[test]
    fn prop_recognized_input_does_work(state in arb_state(), update in arb_update()) {
        let input = update.input();
        prop_assume!(is_recognized(state, &input));

        let result = transition(state, &update);
        let does_work = result.actions.iter().any(|a| {
            !matches!(
                a,
                OutboundAction::Reprompt { .. } | OutboundAction::DismissMessage { .. }
            )
        });
        prop_assert!(does_work);
    }

    /// Dismissals only ever target the message the tapped button came from
    #[test]
    fn prop_dismiss_targets_source_message(state in arb_state(), update in arb_update()) {
        let result = transition(state, &update);
        for action in &result.actions {
            if let OutboundAction::DismissMessage { message_id } = action {
                prop_assert_eq!(Some(*message_id), update.source_message_id());
            }
        }
    }

    /// The tapped menu is only dismissed after every other action
    #[test]
    fn prop_dismiss_comes_last(state in arb_state(), update in arb_update()) {
        let result = transition(state, &update);
        let dismissal = result
            .actions
            .iter()
            .position(|a| matches!(a, OutboundAction::DismissMessage { .. }));
        if let Some(index) = dismissal {
            prop_assert_eq!(index, result.actions.len() - 1);
        }
    }

    /// The payload parser never panics and round-trips add-to-cart payloads
    #[test]
    fn prop_add_payload_roundtrip(id in "[a-z0-9-]{1,16}", quantity in 1u32..1000) {
        let payload = Input::add_to_cart_payload(&id, quantity);
        prop_assert_eq!(
            Input::from_payload(&payload),
            Input::AddToCart { product_id: id, quantity }
        );
    }

    /// Ids accepted from buttons never carry path or query syntax
    #[test]
    fn prop_accepted_ids_are_path_safe(payload in "[a-z./?#%~0-9-]{0,24}") {
        let id = match Input::from_payload(&payload) {
            Input::Choice(id) | Input::AddToCart { product_id: id, .. } => id,
            _ => return Ok(()),
        };
        prop_assert!(!id.contains(['/', '.', '?', '#', '%']));
    }
}
