use game_types::GameError;
use serde::Serialize;

pub const MAX_QUESTION_LENGTH: usize = 280;
pub const MAX_WORD_LENGTH: usize = 64;

/// Case-insensitive comparison ignoring leading and trailing whitespace.
/// Inner whitespace is significant.
pub fn is_correct_guess(guess: &str, secret_word: &str) -> bool {
    let secret = normalize_word(secret_word);
    !secret.is_empty() && normalize_word(guess) == secret
}

pub fn normalize_word(word: &str) -> String {
    word.trim().to_lowercase()
}

/// Validates the answerer's choice and returns the trimmed values to store.
pub fn validate_secret_word(category: &str, word: &str) -> Result<(String, String), GameError> {
    let category = category.trim();
    let word = word.trim();

    if category.is_empty() {
        return Err(GameError::invalid_input("category must not be empty"));
    }
    if word.is_empty() {
        return Err(GameError::invalid_input("secret word must not be empty"));
    }
    if word.chars().count() > MAX_WORD_LENGTH {
        return Err(GameError::invalid_input(format!(
            "secret word must be at most {} characters",
            MAX_WORD_LENGTH
        )));
    }

    Ok((category.to_string(), word.to_string()))
}

pub fn validate_question(text: &str) -> Result<String, GameError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(GameError::invalid_input("question must not be empty"));
    }
    if text.chars().count() > MAX_QUESTION_LENGTH {
        return Err(GameError::invalid_input(format!(
            "question must be at most {} characters",
            MAX_QUESTION_LENGTH
        )));
    }
    Ok(text.to_string())
}

pub fn validate_guess(guess: &str) -> Result<(), GameError> {
    if guess.trim().is_empty() {
        return Err(GameError::invalid_input("guess must not be empty"));
    }
    Ok(())
}

/// Emoji and avatars are a single short glyph sequence.
pub fn validate_glyph(glyph: &str) -> Result<(), GameError> {
    let glyph = glyph.trim();
    if glyph.is_empty() || glyph.chars().count() > 8 || glyph.chars().any(char::is_whitespace) {
        return Err(GameError::invalid_input("expected a single emoji"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameCategory {
    pub name: &'static str,
    pub icon: &'static str,
    pub suggested_words: &'static [&'static str],
}

pub const PREDEFINED_CATEGORIES: &[GameCategory] = &[
    GameCategory {
        name: "People",
        icon: "👤",
        suggested_words: &[
            "Albert Einstein", "Taylor Swift", "Leonardo da Vinci", "Oprah Winfrey",
            "Michael Jordan", "Marie Curie", "Steve Jobs", "Shakespeare",
        ],
    },
    GameCategory {
        name: "Places",
        icon: "🏛️",
        suggested_words: &[
            "Paris", "Tokyo", "New York", "London", "Sydney", "Cairo", "Rome", "Barcelona",
            "Amsterdam", "Dubai",
        ],
    },
    GameCategory {
        name: "Animals",
        icon: "🦁",
        suggested_words: &[
            "Elephant", "Penguin", "Tiger", "Dolphin", "Giraffe", "Octopus", "Kangaroo", "Eagle",
            "Butterfly", "Whale",
        ],
    },
    GameCategory {
        name: "Movies",
        icon: "🎬",
        suggested_words: &[
            "Titanic", "Avatar", "The Lion King", "Star Wars", "Harry Potter", "The Avengers",
            "Frozen", "Jurassic Park", "The Matrix", "Toy Story",
        ],
    },
    GameCategory {
        name: "Food",
        icon: "🍕",
        suggested_words: &[
            "Pizza", "Sushi", "Chocolate", "Ice Cream", "Hamburger", "Pasta", "Tacos",
            "Apple Pie", "Sandwich", "Pancakes",
        ],
    },
    GameCategory {
        name: "Objects",
        icon: "📱",
        suggested_words: &[
            "Smartphone", "Guitar", "Bicycle", "Camera", "Clock", "Umbrella", "Laptop", "Piano",
            "Telescope", "Backpack",
        ],
    },
];

pub fn find_category(name: &str) -> Option<&'static GameCategory> {
    PREDEFINED_CATEGORIES
        .iter()
        .find(|category| category.name.eq_ignore_ascii_case(name.trim()))
}

/// Icon for a category name, `❓` for custom categories.
pub fn category_icon(name: &str) -> &'static str {
    find_category(name).map(|category| category.icon).unwrap_or("❓")
}
