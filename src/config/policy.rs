use crate::cli::Args;
use chrono::Duration;
use serde::{ Deserialize, Serialize };

pub const DEFAULT_QUESTION_LIMIT: usize = 20;
pub const DEFAULT_COOLDOWN_HOURS: u64 = 2;

/// Client-side cap on conversation size. Counted in messages, not in
/// round trips, so the default limit of 20 allows ten questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPolicy {
    pub max_turns_per_window: usize,
    pub cooldown_hours: u64,
    /// When false the cooldown is only displayed and the window never resets.
    pub enforce_cooldown: bool,
}

impl Default for RequestPolicy {
    fn default() -> Self {
        Self {
            max_turns_per_window: DEFAULT_QUESTION_LIMIT,
            cooldown_hours: DEFAULT_COOLDOWN_HOURS,
            enforce_cooldown: false,
        }
    }
}

impl RequestPolicy {
    /// A question limit of 0 means no policy at all.
    pub fn from_args(args: &Args) -> Option<Self> {
        if args.question_limit == 0 {
            return None;
        }
        Some(Self {
            max_turns_per_window: args.question_limit,
            cooldown_hours: args.cooldown_hours,
            enforce_cooldown: args.enforce_cooldown,
        })
    }

    /// Saturates at `Duration::MAX` for hour counts chrono cannot represent.
    pub fn cooldown(&self) -> Duration {
        i64::try_from(self.cooldown_hours)
            .ok()
            .and_then(Duration::try_hours)
            .unwrap_or(Duration::MAX)
    }
}
