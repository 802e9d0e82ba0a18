use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CoachError;

/// Unified strategy indices for the peripheral route start here.
pub const PERIPHERAL_OFFSET: usize = 5;

pub const CENTRAL_STRATEGY_COUNT: usize = 5;
pub const PERIPHERAL_STRATEGY_COUNT: usize = 6;

// ============================================================================
// Route & strategies
// ============================================================================

/// Elaboration Likelihood Model route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Argument quality: logic, evidence, facts.
    Central,
    /// Social and affective cues.
    Peripheral,
}

impl Route {
    /// Offset of this route's strategies in the unified index space.
    pub fn offset(self) -> usize {
        match self {
            Route::Central => 0,
            Route::Peripheral => PERIPHERAL_OFFSET,
        }
    }

    pub fn strategies(self) -> &'static [Strategy] {
        match self {
            Route::Central => &CENTRAL,
            Route::Peripheral => &PERIPHERAL,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Central => write!(f, "central"),
            Route::Peripheral => write!(f, "peripheral"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    Logic,
    Reasoning,
    Example,
    Evidence,
    Facts,
    Reciprocity,
    Liking,
    SocialProof,
    Consistency,
    Authority,
    Scarcity,
}

const CENTRAL: [Strategy; CENTRAL_STRATEGY_COUNT] = [
    Strategy::Logic,
    Strategy::Reasoning,
    Strategy::Example,
    Strategy::Evidence,
    Strategy::Facts,
];

const PERIPHERAL: [Strategy; PERIPHERAL_STRATEGY_COUNT] = [
    Strategy::Reciprocity,
    Strategy::Liking,
    Strategy::SocialProof,
    Strategy::Consistency,
    Strategy::Authority,
    Strategy::Scarcity,
];

impl Strategy {
    /// Resolve an index in the unified (central then peripheral) space.
    pub fn from_unified_index(index: usize) -> Option<Self> {
        if index < PERIPHERAL_OFFSET {
            CENTRAL.get(index).copied()
        } else {
            PERIPHERAL.get(index - PERIPHERAL_OFFSET).copied()
        }
    }

    pub fn route(self) -> Route {
        if CENTRAL.contains(&self) {
            Route::Central
        } else {
            Route::Peripheral
        }
    }

    /// Position within the owning route's weight sequence.
    pub fn route_index(self) -> usize {
        self.route()
            .strategies()
            .iter()
            .position(|s| *s == self)
            .unwrap_or(0)
    }

    pub fn unified_index(self) -> usize {
        self.route().offset() + self.route_index()
    }

    pub fn label(self) -> &'static str {
        match self {
            Strategy::Logic => "Logic",
            Strategy::Reasoning => "Reasoning",
            Strategy::Example => "Example",
            Strategy::Evidence => "Evidence",
            Strategy::Facts => "Facts",
            Strategy::Reciprocity => "Reciprocity",
            Strategy::Liking => "Liking",
            Strategy::SocialProof => "Social Proof",
            Strategy::Consistency => "Consistency",
            Strategy::Authority => "Authority",
            Strategy::Scarcity => "Scarcity",
        }
    }

    /// Two alternative framings per strategy, picked by the session's
    /// phrasing variant.
    pub fn phrasing(self, variant: u8) -> &'static str {
        let [a, b] = match self {
            Strategy::Logic => [
                "walk through a clear cause-and-effect argument",
                "lay out the pros and cons step by step",
            ],
            Strategy::Reasoning => [
                "explain why the exercise fits their situation",
                "reason from their own goals to the exercise",
            ],
            Strategy::Example => [
                "describe a concrete person who benefited from it",
                "paint a short scenario of a typical day with the exercise",
            ],
            Strategy::Evidence => [
                "cite what research says about its benefits",
                "mention measurable outcomes people usually see",
            ],
            Strategy::Facts => [
                "share a few plain facts about the exercise",
                "state how little time and equipment it takes",
            ],
            Strategy::Reciprocity => [
                "offer something in return, like tracking their progress",
                "point out the effort you are putting in to help them",
            ],
            Strategy::Liking => [
                "be warm and find common ground with them",
                "compliment their effort so far",
            ],
            Strategy::SocialProof => [
                "mention how many people like them do it",
                "describe peers who enjoy the exercise",
            ],
            Strategy::Consistency => [
                "remind them of goals they already committed to",
                "tie the exercise to something they did before",
            ],
            Strategy::Authority => [
                "refer to what doctors and trainers recommend",
                "quote health guidelines",
            ],
            Strategy::Scarcity => [
                "stress that today's opportunity will not come back",
                "frame it as a short limited challenge",
            ],
        };
        if variant == 0 {
            a
        } else {
            b
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Per-route tables
// ============================================================================

/// One ordered sequence per route, central first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteTable<T> {
    pub central: Vec<T>,
    pub peripheral: Vec<T>,
}

impl<T: Clone> RouteTable<T> {
    pub fn filled(value: T) -> Self {
        Self {
            central: vec![value.clone(); CENTRAL_STRATEGY_COUNT],
            peripheral: vec![value; PERIPHERAL_STRATEGY_COUNT],
        }
    }
}

impl<T> RouteTable<T> {
    pub fn get(&self, route: Route) -> &[T] {
        match route {
            Route::Central => &self.central,
            Route::Peripheral => &self.peripheral,
        }
    }

    pub fn get_mut(&mut self, route: Route) -> &mut Vec<T> {
        match route {
            Route::Central => &mut self.central,
            Route::Peripheral => &mut self.peripheral,
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Persuasion state for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    /// Central route commitment, in [0, 1].
    pub y_c: f64,
    /// Peripheral route commitment, in [0, 1].
    pub y_p: f64,
    pub strategy_weights: RouteTable<f64>,
    /// 1 = eligible, 0 = already used.
    pub selected_strategies: RouteTable<u8>,
    /// Unified index of the last chosen strategy.
    pub strategy_index_chosen: Option<usize>,
    pub specific_strategy_index: u8,
    pub persuasion_attempt: u32,
    pub failed_persuasion_count: u32,
    pub current_exercise: String,
    /// A persuasion reply is waiting to be scored by the user's next message.
    pub awaiting_feedback: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Session {
    pub fn new(user_id: &str, exercise: &str, initial_weight: f64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            user_id: user_id.to_string(),
            y_c: 0.0,
            y_p: 1.0,
            strategy_weights: RouteTable::filled(initial_weight),
            selected_strategies: RouteTable::filled(1),
            strategy_index_chosen: None,
            specific_strategy_index: 0,
            persuasion_attempt: 0,
            failed_persuasion_count: 0,
            current_exercise: exercise.to_string(),
            awaiting_feedback: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Central iff `y_c >= 0.5`.
    pub fn route(&self) -> Route {
        if self.y_c >= 0.5 {
            Route::Central
        } else {
            Route::Peripheral
        }
    }

    /// The last chosen strategy. Never mutates.
    pub fn chosen_strategy(&self) -> Option<Strategy> {
        self.strategy_index_chosen
            .and_then(Strategy::from_unified_index)
    }

    /// Return the phrasing variant to use now and flip the toggle, so
    /// successive calls yield 0, 1, 0, 1, ...
    pub fn advance_phrasing_variant(&mut self) -> u8 {
        let current = self.specific_strategy_index;
        self.specific_strategy_index = 1 - current.min(1);
        current
    }

    /// Swap the promoted exercise. Only the failure count resets; the attempt
    /// counter keeps climbing.
    pub fn switch_exercise(&mut self, exercise: &str) {
        self.current_exercise = exercise.to_string();
        self.failed_persuasion_count = 0;
    }

    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().timestamp();
    }
}

// ============================================================================
// Chat history & catalog
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    System,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::System => "system",
            Role::Assistant => "assistant",
        }
    }
}

impl FromStr for Role {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "system" => Ok(Role::System),
            "assistant" => Ok(Role::Assistant),
            other => Err(CoachError::Validation(format!("unknown role '{}'", other))),
        }
    }
}

/// One immutable transcript entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub user_id: String,
    pub role: Role,
    pub content: String,
    /// Unix timestamp in milliseconds.
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: i64,
    pub name: String,
    pub description: String,
}
