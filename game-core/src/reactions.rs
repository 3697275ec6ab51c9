use chrono::{DateTime, Duration, Utc};
use game_types::EmojiReaction;

/// Reactions stay stored for the whole round but are only shown this long.
pub const REACTION_DISPLAY_SECONDS: i64 = 10;

/// Emoji offered on the reaction bar.
pub const QUICK_REACTIONS: &[&str] = &["👍", "👎", "😂", "😮", "🤔", "🔥", "👏", "🎉"];

#[derive(Debug, Clone, Copy)]
pub struct ReactionWindow {
    pub max_age: Duration,
}

impl Default for ReactionWindow {
    fn default() -> Self {
        Self {
            max_age: Duration::seconds(REACTION_DISPLAY_SECONDS),
        }
    }
}

impl ReactionWindow {
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }

    pub fn is_visible(&self, reaction: &EmojiReaction, now: DateTime<Utc>) -> bool {
        now - reaction.timestamp < self.max_age
    }

    /// Reactions young enough to display, oldest first.
    pub fn visible<'a>(&self, reactions: &'a [EmojiReaction], now: DateTime<Utc>) -> Vec<&'a EmojiReaction> {
        reactions
            .iter()
            .filter(|reaction| self.is_visible(reaction, now))
            .collect()
    }
}
