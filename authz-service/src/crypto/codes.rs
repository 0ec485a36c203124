use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Generates a random numeric code of the given length, leading zeros
/// included.
pub fn generate_numeric_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length).map(|_| rng.gen_range(0..10).to_string()).collect()
}

/// Generates one backup code: 4 random bytes rendered as 8 hex characters.
pub fn generate_backup_code() -> String {
    let mut bytes = [0u8; 4];
    rand::thread_rng().fill(&mut bytes[..]);
    hex::encode(bytes)
}

/// SHA-256 hash of a code, hex encoded. Codes are stored and compared only
/// in this form.
pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time string comparison, so comparing submitted codes leaks no
/// timing information about the stored value.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_code_shape() {
        for _ in 0..50 {
            let code = generate_numeric_code(6);
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn test_backup_code_shape() {
        let code = generate_backup_code();
        assert_eq!(code.len(), 8);
        assert!(code.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_is_stable_and_hex() {
        let a = hash_code("483921");
        let b = hash_code("483921");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, hash_code("483922"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("287082", "287082"));
        assert!(!constant_time_eq("287082", "287083"));
        assert!(!constant_time_eq("287082", "28708"));
    }
}
