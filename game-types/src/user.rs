use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::PlayerId;
use crate::wire;

pub const DEFAULT_AVATAR: &str = "😀";

/// Avatar glyphs offered on first sign-in.
pub const AVATAR_CHOICES: &[&str] = &[
    "😀", "😃", "😄", "😁", "😆", "😅", "🤣", "😂", "🙂", "🙃", "😉", "😊", "😇", "🥰", "😍",
    "🤩", "😘", "😗", "😚", "😙", "🥲", "😋", "😛", "😜", "🤪", "😝", "🤑", "🤗", "🤭", "🤫",
    "🤔", "🤐", "🤨", "😐", "😑", "😶", "🙄", "😏", "😣", "😥", "😮", "😯", "😪", "😫", "😴",
    "😌", "😤", "😠", "😡", "🤬", "🤯", "😳", "🥵", "🥶", "😱", "😨", "😰", "😢", "😭", "😖",
    "😞", "😓", "😩", "🥱", "🤤", "🌛", "🌜", "🌚", "🌝", "🌞",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: PlayerId,
    pub display_name: String,
    #[serde(default, with = "wire::empty_string_as_none")]
    #[ts(type = "string")]
    pub email: Option<String>,
    pub avatar: String,
    #[serde(with = "wire::epoch_seconds")]
    #[ts(type = "number")]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: impl Into<PlayerId>, display_name: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            email: email.filter(|email| !email.is_empty()),
            avatar: DEFAULT_AVATAR.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Snapshot of this user as a session member joining at `joined_at`.
    pub fn to_player(&self, joined_at: DateTime<Utc>) -> GamePlayer {
        GamePlayer {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            avatar: self.avatar.clone(),
            joined_at,
        }
    }
}

/// Per-session projection of a [`User`], frozen at join time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct GamePlayer {
    pub id: PlayerId,
    pub display_name: String,
    pub avatar: String,
    #[serde(with = "wire::epoch_seconds")]
    #[ts(type = "number")]
    pub joined_at: DateTime<Utc>,
}
