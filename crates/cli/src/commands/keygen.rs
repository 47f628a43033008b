//! Secret generation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

use stockbot_core::FieldCipher;
use stockbot_server::config::validate_secret_strength;

const SESSION_SECRET_BYTES: usize = 48;

/// Random admin session secret, base64url without padding.
///
/// Draws again when the encoding happens to contain a placeholder pattern
/// (`xxx`, `todo`, ...) that the server would refuse at startup.
#[must_use]
pub fn session_secret() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; SESSION_SECRET_BYTES];
    loop {
        rng.fill_bytes(&mut bytes);
        let candidate = URL_SAFE_NO_PAD.encode(bytes);
        if validate_secret_strength(&candidate, "ADMIN_SESSION_SECRET").is_ok() {
            return candidate;
        }
    }
}

/// Print a fresh `.env` fragment.
#[allow(clippy::print_stdout)]
pub fn print_env() {
    println!("ENCRYPTION_KEY={}", FieldCipher::generate_key());
    println!("ADMIN_SESSION_SECRET={}", session_secret());
}
