//! Friendly token generation.

use rand::Rng;

/// Characters used in generated tokens. URL-safe, with the visually
/// ambiguous l, I, O and 0 left out.
const TOKEN_ALPHABET: &[u8] =
    b"abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ123456789";

/// Generates a random URL-safe token of `length` characters.
#[must_use]
pub fn friendly_token(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..TOKEN_ALPHABET.len());
            TOKEN_ALPHABET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::API_TOKEN_SIZE;

    #[test]
    fn token_has_requested_length() {
        assert_eq!(friendly_token(API_TOKEN_SIZE).len(), API_TOKEN_SIZE);
        assert_eq!(friendly_token(6).len(), 6);
    }

    #[test]
    fn token_avoids_ambiguous_characters() {
        let token = friendly_token(512);
        assert!(!token.contains(['l', 'I', 'O', '0', '_', '/', '+']));
    }

    #[test]
    fn tokens_differ() {
        assert_ne!(friendly_token(20), friendly_token(20));
    }
}
