//! Property-based tests for coach_core.
//!
//! Uses proptest to check the persuasion invariants over arbitrary sessions
//! and arbitrary success/failure histories.

use coach_core::motivation::{classify_motivation, phrase_lists, AGREES, NEUTRAL, REFUSES};
use coach_core::persuasion::{select_strategy, update_weights};
use coach_core::session::{Route, Session};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn arb_session() -> impl Strategy<Value = Session> {
    (
        0.0f64..=1.0,
        0.0f64..=1.0,
        prop::collection::vec(0.0f64..=1.0, 5),
        prop::collection::vec(0.0f64..=1.0, 6),
    )
        .prop_map(|(y_c, y_p, central, peripheral)| {
            let mut s = Session::new("prop", "Squats", 0.5);
            s.y_c = y_c;
            s.y_p = y_p;
            s.strategy_weights.central = central;
            s.strategy_weights.peripheral = peripheral;
            s
        })
}

/// Filler words that contain no phrase from either list.
fn arb_filler() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "the", "weather", "is", "warm", "what", "about", "stretching", "maybe", "later",
        "hmm", "legs", "walk",
    ])
    .prop_map(|s| s.to_string())
}

// ============================================================================
// Motivation classifier
// ============================================================================

proptest! {
    #[test]
    fn classifier_positive_phrase_agrees(
        prefix in arb_filler(),
        idx in 0usize..100,
    ) {
        let (positive, _) = phrase_lists();
        let phrase = positive[idx % positive.len()];
        let text = format!("{} {}", prefix, phrase.to_uppercase());
        prop_assert_eq!(classify_motivation(&text), AGREES);
    }

    #[test]
    fn classifier_negative_phrase_refuses(
        prefix in arb_filler(),
        idx in 0usize..100,
    ) {
        let (_, negative) = phrase_lists();
        let phrase = negative[idx % negative.len()];
        let text = format!("{} {}", prefix, phrase);
        prop_assert_eq!(classify_motivation(&text), REFUSES);
    }

    #[test]
    fn classifier_both_lists_agrees(
        p in 0usize..100,
        n in 0usize..100,
    ) {
        let (positive, negative) = phrase_lists();
        let text = format!("{}, {}", positive[p % positive.len()], negative[n % negative.len()]);
        prop_assert_eq!(classify_motivation(&text), AGREES);
    }

    #[test]
    fn classifier_filler_is_neutral(words in prop::collection::vec(arb_filler(), 0..8)) {
        let text = words.join(" ");
        prop_assert_eq!(classify_motivation(&text), NEUTRAL);
    }
}

// ============================================================================
// Weight updater
// ============================================================================

proptest! {
    /// Route commitments stay inside [0, 1] for any outcome history.
    #[test]
    fn commitments_always_clamped(
        session in arb_session(),
        outcomes in prop::collection::vec(any::<bool>(), 1..40),
    ) {
        let mut s = session;
        for ok in outcomes {
            select_strategy(&mut s);
            update_weights(&mut s, ok);
            prop_assert!(s.y_c >= 0.0 && s.y_c <= 1.0, "y_c out of range: {}", s.y_c);
            prop_assert!(s.y_p >= 0.0 && s.y_p <= 1.0, "y_p out of range: {}", s.y_p);
            prop_assert!(s.y_c.is_finite() && s.y_p.is_finite());
        }
    }

    /// The chosen index always lies in the active route's range.
    #[test]
    fn chosen_index_matches_route(session in arb_session()) {
        let mut s = session;
        let route = s.route();
        select_strategy(&mut s);
        let idx = s.strategy_index_chosen.unwrap();
        match route {
            Route::Central => prop_assert!(idx <= 4),
            Route::Peripheral => prop_assert!((5..=10).contains(&idx)),
        }
    }
}

// ============================================================================
// Strategy selector
// ============================================================================

proptest! {
    /// A just-used strategy is not picked again while another eligible one
    /// has positive weight.
    #[test]
    fn selector_does_not_repeat_used_strategy(
        session in arb_session(),
    ) {
        let mut s = session;
        prop_assume!(s.y_c.max(s.y_p) > 0.0);
        let route = s.route();
        let first = select_strategy(&mut s);
        let flags = s.selected_strategies.get(route).to_vec();
        prop_assert_eq!(flags[first.route_index()], 0);

        let others_positive = s
            .strategy_weights
            .get(route)
            .iter()
            .zip(&flags)
            .any(|(w, f)| *f == 1 && *w > 0.0);
        let second = select_strategy(&mut s);
        if others_positive {
            prop_assert_ne!(first, second);
        }
    }

    #[test]
    fn phrasing_variant_alternates(calls in 1usize..50) {
        let mut s = Session::new("prop", "Squats", 0.5);
        for i in 0..calls {
            prop_assert_eq!(s.advance_phrasing_variant() as usize, i % 2);
        }
    }
}
