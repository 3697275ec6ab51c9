pub mod errors;
pub mod game;
pub mod messages;
pub mod user;
pub mod wire;

// Re-export all types
pub use errors::*;
pub use game::*;
pub use messages::*;
pub use user::*;

pub type PlayerId = String;
pub type SessionCode = String;
