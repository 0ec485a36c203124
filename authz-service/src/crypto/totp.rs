//! RFC 6238 time-based one-time passwords over HMAC-SHA-1, the algorithm
//! understood by standard authenticator apps.

use hmac::{Hmac, Mac};
use service_core::error::AppError;
use sha1::Sha1;

use crate::crypto::codes::constant_time_eq;

type HmacSha1 = Hmac<Sha1>;

// ==================== Constants ====================

/// Time step length in seconds.
pub const STEP_SECONDS: i64 = 30;

/// Number of digits in a generated code.
pub const DIGITS: usize = 6;

/// Secret length in bytes before base32 encoding (160 bits).
const SECRET_BYTES: usize = 20;

// ==================== TOTP ====================

/// Generates a fresh shared secret, base32 encoded without padding as
/// authenticator apps expect.
pub fn generate_secret() -> String {
    use rand::Rng;

    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill(&mut bytes[..]);
    base32::encode(base32::Alphabet::Rfc4648 { padding: false }, &bytes)
}

/// The time step a given unix timestamp falls in.
pub fn current_step(unix_seconds: i64) -> i64 {
    unix_seconds / STEP_SECONDS
}

/// Computes the code for one time step.
pub fn code_for_step(secret_base32: &str, step: i64) -> Result<String, AppError> {
    let key = base32::decode(base32::Alphabet::Rfc4648 { padding: false }, secret_base32)
        .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("TOTP secret is not valid base32")))?;

    let counter = step.max(0) as u64;
    let mut mac = HmacSha1::new_from_slice(&key)
        .map_err(|_| AppError::InternalError(anyhow::anyhow!("TOTP secret rejected by HMAC")))?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // Dynamic truncation per RFC 4226 section 5.3.
    let offset = (digest[19] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);
    let code = binary % 10u32.pow(DIGITS as u32);
    Ok(format!("{:0width$}", code, width = DIGITS))
}

/// Checks a submitted code against the current step and `window` steps on
/// either side, tolerating clock drift between the server and the
/// authenticator device.
pub fn verify_with_window(
    secret_base32: &str,
    code: &str,
    now_unix: i64,
    window: i64,
) -> Result<bool, AppError> {
    if code.len() != DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(false);
    }

    let current = current_step(now_unix);
    for delta in -window..=window {
        let expected = code_for_step(secret_base32, current + delta)?;
        if constant_time_eq(&expected, code) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Builds the otpauth:// URI encoded into the enrollment QR code.
pub fn provisioning_uri(secret_base32: &str, account: &str, issuer: &str) -> String {
    format!(
        "otpauth://totp/{}:{}?secret={}&issuer={}&algorithm=SHA1&digits={}&period={}",
        urlencoding::encode(issuer),
        urlencoding::encode(account),
        secret_base32,
        urlencoding::encode(issuer),
        DIGITS,
        STEP_SECONDS,
    )
}

// ==================== Tests ====================
