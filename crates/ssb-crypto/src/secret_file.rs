//! On-disk secret key file: a JSON object wrapped in human-readable comment
//! lines, matching the layout produced by the reference implementation so
//! home directories stay interchangeable between implementations.

use std::fs;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, Result};
use crate::identity::KeyPair;

const PREAMBLE: &str = "# this is your SECRET name.\n\
# this name gives you magical powers.\n\
# with it you can mark your messages so that your friends can verify\n\
# that they really did come from you.\n\
#\n\
# if any one learns this name, they can use it to destroy your identity\n\
# NEVER show this to anyone!!!\n\n";

const POSTAMBLE: &str = "\n# WARNING! It's vital that you DO NOT edit OR share your secret name\n\
# instead, share your public name\n\
# your public name: \n";

#[derive(Serialize, Deserialize)]
struct SecretFile {
    curve: String,
    public: String,
    private: String,
    id: String,
}

/// Writes `keypair`'s secret file to `path`, creating parent directories if
/// needed. Refuses to overwrite an existing file.
pub fn save(path: &Path, keypair: &KeyPair) -> Result<()> {
    if path.exists() {
        return Err(CryptoError::SecretFile(format!(
            "refusing to overwrite existing secret at {}",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let public_b64 = STANDARD.encode(keypair.public_bytes());
    let private_b64 = STANDARD.encode(keypair.to_secret_bytes());
    let doc = SecretFile {
        curve: "ed25519".to_string(),
        public: format!("{public_b64}.ed25519"),
        private: format!("{private_b64}.ed25519"),
        id: keypair.identity().as_str().to_string(),
    };
    let json = serde_json::to_string_pretty(&doc)
        .map_err(|e| CryptoError::SecretFile(e.to_string()))?;

    let contents = format!("{PREAMBLE}{json}{POSTAMBLE}{}\n", doc.id);
    fs::write(path, contents)?;
    Ok(())
}

/// Loads a keypair from a secret file written by [`save`], ignoring any
/// leading or trailing comment lines.
pub fn load(path: &Path) -> Result<KeyPair> {
    let raw = fs::read_to_string(path)?;
    let json_text: String = raw
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");
    let start = json_text
        .find('{')
        .ok_or_else(|| CryptoError::SecretFile("no JSON object found in secret file".into()))?;
    let end = json_text
        .rfind('}')
        .ok_or_else(|| CryptoError::SecretFile("no JSON object found in secret file".into()))?;
    let doc: SecretFile = serde_json::from_str(&json_text[start..=end])
        .map_err(|e| CryptoError::SecretFile(e.to_string()))?;

    let private_b64 = doc
        .private
        .strip_suffix(".ed25519")
        .ok_or_else(|| CryptoError::SecretFile("malformed private key suffix".into()))?;
    let bytes = STANDARD
        .decode(private_b64)
        .map_err(|e| CryptoError::SecretFile(e.to_string()))?;
    let seed: [u8; 32] = bytes
        .try_into()
        .map_err(|_| CryptoError::SecretFile("private key is not 32 bytes".into()))?;
    Ok(KeyPair::from_seed(&seed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_then_load_round_trips_identity() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("secret");
        let kp = KeyPair::generate();
        let id = kp.identity();

        save(&path, &kp).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.identity(), id);
    }

    #[test]
    fn save_refuses_to_clobber_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("secret");
        save(&path, &KeyPair::generate()).unwrap();
        assert!(save(&path, &KeyPair::generate()).is_err());
    }
}
