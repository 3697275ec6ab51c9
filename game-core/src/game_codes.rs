use game_types::GameError;
use rand::Rng;

pub const GAME_CODE_LENGTH: usize = 6;
pub const GAME_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub fn generate_game_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..GAME_CODE_LENGTH)
        .map(|_| GAME_CODE_ALPHABET[rng.gen_range(0..GAME_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Uppercases a user-entered code and checks it is exactly six of `[A-Z0-9]`.
pub fn normalize_game_code(input: &str) -> Result<String, GameError> {
    let code = input.trim().to_ascii_uppercase();
    let valid = code.len() == GAME_CODE_LENGTH
        && code.bytes().all(|byte| GAME_CODE_ALPHABET.contains(&byte));

    if valid {
        Ok(code)
    } else {
        Err(GameError::InvalidGameCode {
            code: input.to_string(),
        })
    }
}

/// Filters partial input the way the join screen does: uppercase ASCII
/// alphanumerics only, at most six of them.
pub fn sanitize_code_input(input: &str) -> String {
    input
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .take(GAME_CODE_LENGTH)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_generated_codes_are_valid() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let code = generate_game_code(&mut rng);
            assert_eq!(normalize_game_code(&code).unwrap(), code);
        }
    }

    #[test]
    fn test_lowercase_input_is_normalized() {
        assert_eq!(normalize_game_code(" ab12cd ").unwrap(), "AB12CD");
    }

    #[test]
    fn test_malformed_codes_are_rejected() {
        for input in ["", "ABC12", "ABC1234", "AB-12C", "ÄBC123"] {
            assert!(
                matches!(normalize_game_code(input), Err(GameError::InvalidGameCode { .. })),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_sanitize_partial_input() {
        assert_eq!(sanitize_code_input("ab-12"), "AB12");
        assert_eq!(sanitize_code_input("abc123xyz"), "ABC123");
        assert_eq!(sanitize_code_input("é!"), "");
    }
}
