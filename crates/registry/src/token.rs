use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

/// A player's 16-byte opaque wire credential.
pub type Token = [u8; 16];

/// Generates a fresh token from a thread-local, OS-seeded RNG. Never shared
/// across threads: each profile listener seeds its own at thread start.
pub fn generate() -> Token {
    let mut token = [0u8; 16];
    rand::rng().fill_bytes(&mut token);
    token
}

pub fn encode(token: &Token) -> String {
    URL_SAFE_NO_PAD.encode(token)
}

pub fn decode(s: &str) -> Option<Token> {
    let bytes = URL_SAFE_NO_PAD.decode(s).ok()?;
    bytes.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_is_always_22_chars() {
        let token = generate();
        assert_eq!(encode(&token).len(), 22);
    }

    #[test]
    fn round_trips_through_base64url() {
        let token = generate();
        let encoded = encode(&token);
        assert_eq!(decode(&encoded), Some(token));
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(decode("abc"), None);
    }
}
