//! Persuasion routing, strategy selection and weight adaptation.
//!
//! All three stages operate on a `Session` in place and never touch storage;
//! the orchestrator decides when to persist.

use crate::session::{Route, Session, Strategy};

/// Central/peripheral commitment shifts applied after scoring an attempt.
const CENTRAL_SUCCESS_SHIFT: f64 = 0.2;
const CENTRAL_FAILURE_SHIFT: f64 = 0.1;
const PERIPHERAL_SHIFT: f64 = 0.2;

// ============================================================================
// Router
// ============================================================================

/// Pick the route for this turn.
///
/// On the session's first persuasion decision the commitments are seeded from
/// the motivation score; afterwards they only move through
/// [`update_weights`].
pub fn route(session: &mut Session, motivation: f64, first_decision: bool) -> Route {
    if first_decision {
        if motivation >= 0.5 {
            session.y_c = 1.0;
            session.y_p = 0.0;
        } else {
            session.y_c = 0.0;
            session.y_p = 1.0;
        }
        tracing::debug!(
            user = %session.user_id,
            motivation,
            y_c = session.y_c,
            y_p = session.y_p,
            "Route commitments seeded"
        );
    }
    session.route()
}

// ============================================================================
// Selector
// ============================================================================

/// Activation score of every strategy on `route`:
/// `weight * max(y_c, y_p) * eligibility`.
pub fn activations(session: &Session, route: Route) -> Vec<f64> {
    let commitment = session.y_c.max(session.y_p);
    session
        .strategy_weights
        .get(route)
        .iter()
        .zip(session.selected_strategies.get(route))
        .map(|(w, flag)| w * commitment * f64::from(*flag))
        .collect()
}

/// Index of the largest activation; the first index wins ties.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

/// Choose a strategy on the session's current route and mark it used.
///
/// Used strategies are never replenished. Once every flag on a route is 0
/// all activations are 0 and index 0 of the route is returned again.
pub fn select_strategy(session: &mut Session) -> Strategy {
    let route = session.route();
    let scores = activations(session, route);
    let index = argmax(&scores);

    if let Some(flag) = session.selected_strategies.get_mut(route).get_mut(index) {
        *flag = 0;
    }
    session.strategy_index_chosen = Some(route.offset() + index);

    let strategy = route.strategies()[index];
    tracing::debug!(
        user = %session.user_id,
        %route,
        %strategy,
        activation = scores[index],
        "Strategy selected"
    );
    strategy
}

// ============================================================================
// Weight updater
// ============================================================================

/// Score the last chosen strategy and shift route commitments.
///
/// The strategy weight follows `w = 0.1 * (1 - w) * s - 0.9 * w` and is not
/// clamped; `y_c` and `y_p` are clamped to [0, 1]. Returns the strategy that
/// was scored, or `None` if nothing has been chosen yet.
pub fn update_weights(session: &mut Session, successful: bool) -> Option<Strategy> {
    let strategy = session.chosen_strategy()?;
    let route = strategy.route();
    let s = if successful { 1.0 } else { 0.0 };

    if let Some(w) = session
        .strategy_weights
        .get_mut(route)
        .get_mut(strategy.route_index())
    {
        *w = 0.1 * (1.0 - *w) * s - 0.9 * *w;
    }

    match (route, successful) {
        (Route::Central, true) => {
            session.y_c += CENTRAL_SUCCESS_SHIFT;
            session.y_p -= CENTRAL_SUCCESS_SHIFT;
        }
        (Route::Central, false) => {
            session.y_c -= CENTRAL_FAILURE_SHIFT;
            session.y_p += CENTRAL_FAILURE_SHIFT;
        }
        (Route::Peripheral, true) => {
            session.y_p += PERIPHERAL_SHIFT;
            session.y_c -= PERIPHERAL_SHIFT;
        }
        (Route::Peripheral, false) => {
            session.y_p -= PERIPHERAL_SHIFT;
            session.y_c += PERIPHERAL_SHIFT;
        }
    }
    session.y_c = session.y_c.clamp(0.0, 1.0);
    session.y_p = session.y_p.clamp(0.0, 1.0);

    tracing::debug!(
        user = %session.user_id,
        %strategy,
        successful,
        y_c = session.y_c,
        y_p = session.y_p,
        "Strategy weights updated"
    );
    Some(strategy)
}
