use rand::Rng;
use rand::rngs::OsRng;

use crate::error::{AppError, AppResult};

/// Generate a numeric one-time code of `length` digits from the OS CSPRNG.
/// Leading zeros are allowed, so every digit is uniform over 0-9.
pub fn generate_numeric_code(length: usize) -> AppResult<String> {
    if length == 0 {
        return Err(AppError::InternalError(
            "OTP length must be positive".to_string(),
        ));
    }

    let mut rng = OsRng;
    Ok((0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_numeric_code_lengths() {
        for length in [4, 6, 8] {
            let code = generate_numeric_code(length).unwrap();
            assert_eq!(code.len(), length);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_generate_numeric_code_rejects_zero_length() {
        assert!(generate_numeric_code(0).is_err());
    }
}
