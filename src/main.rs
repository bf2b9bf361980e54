// Picocrypt - a secure file encryption tool
//
// Encryption: XChaCha20 (+ Serpent-CTR in paranoid mode) with a detached
// BLAKE2b/HMAC-SHA3 stream MAC and Reed-Solomon error correction
// Key derivation: Argon2id, optionally combined with keyfiles
// File format: Reed-Solomon protected header + encrypted 1 MiB chunks

use std::process::ExitCode;

use picocrypt_rs::cli::App;

/// Entry point for the Picocrypt encryption tool.
///
/// # Exit codes
/// * 0 - success
/// * 1 - cancelled (or a usage/prompt failure)
/// * 2 - wrong password or keyfiles
/// * 3 - corrupt header, unsupported version, or not a volume
/// * 4 - corrupt body or failed authentication
/// * 5 - I/O error
/// * 6 - input larger than 256 GiB
fn main() -> ExitCode {
    match App::init() {
        Ok(app) => app.execute(),
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}
