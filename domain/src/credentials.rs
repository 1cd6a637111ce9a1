//! Scoped staging of the service account key on disk.
//!
//! Google client conventions locate credentials through the
//! `GOOGLE_APPLICATION_CREDENTIALS` variable, which must name a file. The key
//! arrives as configuration, so it is written to a private temporary file for the
//! lifetime of a [`CredentialFile`] value. Dropping the value removes the file and
//! the variable, which makes cleanup part of every exit path, including startup
//! failures that return early.

use crate::error::{Error, InternalErrorKind};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::*;
use secrecy::{ExposeSecret, SecretString};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Environment variable pointing the backend client at the staged key file.
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

const FILE_PREFIX: &str = "key";

/// A service account key written to a temporary file, removed on drop.
pub struct CredentialFile {
    file: Option<NamedTempFile>,
    path: PathBuf,
}

impl CredentialFile {
    /// Writes the key payload to a new temporary file and exports its path
    /// through [`CREDENTIALS_ENV`].
    ///
    /// The payload may be the raw service account JSON or its base64 encoding.
    /// Anything that doesn't decode to a JSON object is rejected before touching
    /// the filesystem.
    pub fn create(payload: &SecretString) -> Result<Self, Error> {
        let contents = decode_key_payload(payload.expose_secret())?;

        // NamedTempFile is created with owner-only permissions on unix.
        let mut file = tempfile::Builder::new().prefix(FILE_PREFIX).tempfile()?;
        file.write_all(contents.as_bytes())?;
        file.flush()?;

        let path = file.path().to_path_buf();
        std::env::set_var(CREDENTIALS_ENV, &path);
        info!("Staged service account credentials at {}", path.display());

        Ok(Self {
            file: Some(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for CredentialFile {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("CredentialFile")
            .field("path", &self.path)
            .finish()
    }
}

impl Drop for CredentialFile {
    fn drop(&mut self) {
        if std::env::var_os(CREDENTIALS_ENV).as_deref() == Some(self.path.as_os_str()) {
            std::env::remove_var(CREDENTIALS_ENV);
        }
        if let Some(file) = self.file.take() {
            match file.close() {
                Ok(()) => debug!("Removed credential file {}", self.path.display()),
                Err(err) => error!(
                    "Failed to remove credential file {}: {err}",
                    self.path.display()
                ),
            }
        }
    }
}

/// Returns the service account JSON contained in `payload`.
fn decode_key_payload(payload: &str) -> Result<String, Error> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Err(Error::internal(
            InternalErrorKind::Credential,
            "credential payload is empty",
        ));
    }

    let json = if trimmed.starts_with('{') {
        trimmed.to_string()
    } else {
        let bytes = STANDARD.decode(trimmed).map_err(|_| {
            Error::internal(
                InternalErrorKind::Credential,
                "credential payload is neither JSON nor base64",
            )
        })?;
        String::from_utf8(bytes).map_err(|_| {
            Error::internal(
                InternalErrorKind::Credential,
                "decoded credential payload is not UTF-8",
            )
        })?
    };

    match serde_json::from_str::<serde_json::Value>(&json) {
        Ok(serde_json::Value::Object(_)) => Ok(json),
        _ => Err(Error::internal(
            InternalErrorKind::Credential,
            "credential payload is not a JSON object",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomainErrorKind;
    use base64::Engine as _;
    use serial_test::serial;

    const KEY_JSON: &str = r#"{"type":"service_account","client_email":"publisher@demo.iam.gserviceaccount.com"}"#;

    fn secret(value: &str) -> SecretString {
        SecretString::new(value.to_string())
    }

    #[test]
    fn test_decode_raw_json() {
        assert_eq!(decode_key_payload(KEY_JSON).unwrap(), KEY_JSON);
    }

    #[test]
    fn test_decode_base64_json() {
        let encoded = STANDARD.encode(KEY_JSON);
        assert_eq!(decode_key_payload(&encoded).unwrap(), KEY_JSON);
    }

    #[test]
    fn test_decode_rejects_malformed_payloads() {
        let encoded_array = STANDARD.encode("[1, 2]");
        for payload in ["", "   ", "not-a-key!", "{broken", encoded_array.as_str()] {
            let err = decode_key_payload(payload).unwrap_err();
            assert_eq!(
                err.error_kind,
                DomainErrorKind::Internal(InternalErrorKind::Credential),
                "payload {payload:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_malformed_payload_is_not_echoed_in_error() {
        let err = decode_key_payload("super-secret-but-broken").unwrap_err();
        assert!(!err.to_string().contains("super-secret-but-broken"));
    }

    #[test]
    #[serial]
    fn test_file_exists_while_held_and_is_removed_on_drop() {
        let credential_file = CredentialFile::create(&secret(KEY_JSON)).unwrap();
        let path = credential_file.path().to_path_buf();

        assert!(path.exists());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), KEY_JSON);
        assert_eq!(
            std::env::var_os(CREDENTIALS_ENV).as_deref(),
            Some(path.as_os_str())
        );

        drop(credential_file);

        assert!(!path.exists());
        assert!(std::env::var_os(CREDENTIALS_ENV).is_none());
    }

    #[test]
    #[serial]
    fn test_file_is_removed_when_a_later_startup_step_fails() {
        fn failing_startup(path_out: &mut Option<PathBuf>) -> Result<(), Error> {
            let credential_file = CredentialFile::create(&secret(KEY_JSON))?;
            *path_out = Some(credential_file.path().to_path_buf());
            Err(Error::internal(InternalErrorKind::Config, "later step failed"))
        }

        let mut path = None;
        assert!(failing_startup(&mut path).is_err());
        assert!(!path.unwrap().exists());
    }

    #[test]
    #[serial]
    fn test_debug_output_shows_only_the_path() {
        let credential_file = CredentialFile::create(&secret(KEY_JSON)).unwrap();
        let debug = format!("{credential_file:?}");

        assert!(debug.contains(&credential_file.path().display().to_string()));
        assert!(!debug.contains("publisher@demo.iam.gserviceaccount.com"));
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn test_file_is_private_to_owner() {
        use std::os::unix::fs::PermissionsExt;

        let credential_file = CredentialFile::create(&secret(KEY_JSON)).unwrap();
        let mode = std::fs::metadata(credential_file.path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o077, 0);
    }
}
