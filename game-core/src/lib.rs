pub mod game_codes;
pub mod game_events;
pub mod player_view;
pub mod reactions;
pub mod turn_engine;
pub mod turn_timer;
pub mod word_validation;

// Re-export main components
pub use game_codes::*;
pub use game_events::*;
pub use player_view::*;
pub use reactions::*;
pub use turn_engine::*;
pub use turn_timer::*;
pub use word_validation::*;
