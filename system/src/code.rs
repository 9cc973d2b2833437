use rand::Rng;

use crate::error::GameError;

/// Generated codes are fixed-length; validation additionally accepts
/// longer codes so clients may bring their own, up to 32 characters.
pub const GENERATED_CODE_LEN: usize = 6;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Draws a fresh lobby code from the same alphabet `validate_code`
/// accepts, so generated codes always validate.
pub fn generate_code<R: Rng>(rng: &mut R) -> String {
    (0..GENERATED_CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

pub fn validate_code(code: &str) -> Result<(), GameError> {
    if code.len() < GENERATED_CODE_LEN || code.len() > 32 {
        return Err(GameError::Validation(
            "lobby code must be 6 to 32 characters".into(),
        ));
    }
    if !code
        .bytes()
        .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    {
        return Err(GameError::Validation(
            "lobby code must be uppercase alphanumeric".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_generates_codes_that_validate() {
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let code = generate_code(&mut rng);
            assert_eq!(code.len(), GENERATED_CODE_LEN);
            validate_code(&code).expect("generated code must validate");
        }
    }

    #[test]
    fn it_rejects_malformed_codes() {
        assert!(validate_code("AB12").is_err());
        assert!(validate_code("abc123").is_err());
        assert!(validate_code("ABC 12").is_err());
        assert!(validate_code(&"A".repeat(33)).is_err());
        assert!(validate_code("ABC123").is_ok());
        assert!(validate_code(&"Z".repeat(32)).is_ok());
    }
}
