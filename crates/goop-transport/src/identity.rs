//! Persistent peer identity — a long-lived Ed25519 secret key stored on disk.
//!
//! Created on first node start, reloaded on restart. The key file is
//! written atomically with `0600` permissions inside a `0700` parent
//! directory; on load, both permissions are re-checked as a startup
//! invariant rather than only enforced at write time.

use std::fs;
use std::io;
use std::path::Path;

use crate::TransportError;

#[cfg(unix)]
fn check_perms(path: &Path, parent: &Path) -> Result<(), TransportError> {
    use std::os::unix::fs::PermissionsExt;

    let file_mode = fs::metadata(path)
        .map_err(|e| TransportError::KeyFile(e.to_string()))?
        .permissions()
        .mode()
        & 0o777;
    if file_mode != 0o600 {
        return Err(TransportError::KeyFile(format!(
            "identity key file {} has mode {:o}, expected 0600",
            path.display(),
            file_mode
        )));
    }

    let dir_mode = fs::metadata(parent)
        .map_err(|e| TransportError::KeyFile(e.to_string()))?
        .permissions()
        .mode()
        & 0o777;
    if dir_mode != 0o700 {
        return Err(TransportError::KeyFile(format!(
            "identity key directory {} has mode {:o}, expected 0700",
            parent.display(),
            dir_mode
        )));
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_perms(_path: &Path, _parent: &Path) -> Result<(), TransportError> {
    Ok(())
}

#[cfg(unix)]
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
    fs::rename(&tmp, path)
}

#[cfg(not(unix))]
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

/// Load the identity secret key from `path`, generating and persisting a
/// fresh one on first run.
pub fn load_or_create(path: &Path) -> Result<iroh::SecretKey, TransportError> {
    let parent = path
        .parent()
        .ok_or_else(|| TransportError::KeyFile("identity key path has no parent".into()))?;

    if !parent.exists() {
        fs::create_dir_all(parent).map_err(|e| TransportError::KeyFile(e.to_string()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| TransportError::KeyFile(e.to_string()))?;
        }
    }

    if path.exists() {
        check_perms(path, parent)?;
        let bytes = fs::read(path).map_err(|e| TransportError::KeyFile(e.to_string()))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TransportError::KeyFile("identity key file is not 32 bytes".into()))?;
        return Ok(iroh::SecretKey::from_bytes(&seed));
    }

    let mut rng = rand::rngs::OsRng;
    let secret = iroh::SecretKey::generate(&mut rng);
    write_atomic(path, &secret.to_bytes()).map_err(|e| TransportError::KeyFile(e.to_string()))?;
    check_perms(path, parent)?;
    Ok(secret)
}
