//! Loads or creates the local identity's secret key.

use std::path::Path;

use ssb_crypto::identity::KeyPair;
use ssb_crypto::secret_file;

/// Loads the keypair at `path`, generating and saving a fresh one if it
/// doesn't exist yet (first run for this home/user directory).
///
/// Returns the seed rather than a [`KeyPair`] directly: several call sites
/// in one CLI invocation each need their own owned `KeyPair` (the log store
/// and the session node both take ownership of one), and a seed is cheap to
/// turn back into as many as needed via [`KeyPair::from_seed`].
pub fn load_or_create_seed(path: &Path) -> anyhow::Result<[u8; 32]> {
    if path.exists() {
        Ok(secret_file::load(path)?.to_secret_bytes())
    } else {
        let keypair = KeyPair::generate();
        let seed = keypair.to_secret_bytes();
        secret_file::save(path, &keypair)?;
        tracing::info!(target: "ssb_cli", identity = %keypair.identity(), "generated new identity");
        Ok(seed)
    }
}
