//! Share strings and anonymous access to share capsules.
//!
//! A share string carries everything a recipient needs:
//! `username:reference:share_password[:base64(filename)]`. The three-part
//! form is what older clients produced and is still accepted.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use crate::config::shared_object_path;
use gitvault_common::{Error, Password, Result, Username};
use gitvault_crypto::decrypt_with_password;
use gitvault_storage::ObjectFetcher;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareString {
    pub username: Username,
    pub reference: String,
    pub password: Password,
    /// Absent in the legacy three-part form.
    pub filename: Option<String>,
}

impl ShareString {
    /// Name to save the file under when the caller gave a directory.
    pub fn suggested_filename(&self) -> &str {
        self.filename.as_deref().unwrap_or(&self.reference)
    }
}

impl FromStr for ShareString {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() != 3 && parts.len() != 4 {
            return Err(Error::InvalidInput(
                "Share string must be username:reference:password[:filename]".to_string(),
            ));
        }

        let username = Username::new(parts[0])?;
        let reference = parts[1];
        if reference.is_empty() || !reference.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidInput(format!(
                "Invalid share reference '{}'",
                reference
            )));
        }
        let password = Password::new(parts[2])?;

        let filename = match parts.get(3) {
            Some(encoded) => {
                let bytes = STANDARD
                    .decode(encoded)
                    .map_err(|e| Error::Malformed(format!("Share filename is not base64: {}", e)))?;
                let name = String::from_utf8(bytes)
                    .map_err(|_| Error::Malformed("Share filename is not UTF-8".to_string()))?;
                Some(name)
            }
            None => None,
        };

        Ok(Self {
            username,
            reference: reference.to_string(),
            password,
            filename,
        })
    }
}

impl fmt::Display for ShareString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.username,
            self.reference,
            self.password.as_str()
        )?;
        if let Some(name) = &self.filename {
            write!(f, ":{}", STANDARD.encode(name.as_bytes()))?;
        }
        Ok(())
    }
}

/// Fetch and decrypt a share capsule. Needs no vault credentials.
///
/// # Errors
/// - `NotFound` if the capsule is gone (never shared, revoked or purged)
/// - `AuthFailed` if the share password does not open it
pub async fn read_shared<F>(fetcher: &F, share: &ShareString) -> Result<Vec<u8>>
where
    F: ObjectFetcher + ?Sized,
{
    debug!(user = %share.username, reference = %share.reference, "Fetching share capsule");
    let capsule = fetcher
        .fetch(&share.username, &shared_object_path(&share.reference))
        .await?;

    decrypt_with_password(&capsule, share.password.as_str()).map_err(Error::into_auth_failure)
}

/// Fetch, decrypt and write a share capsule to disk.
///
/// If `destination` is an existing directory the file is written inside it
/// under the share's file name. Returns the path written.
pub async fn download_shared<F>(
    fetcher: &F,
    share: &ShareString,
    destination: &Path,
) -> Result<PathBuf>
where
    F: ObjectFetcher + ?Sized,
{
    let plaintext = read_shared(fetcher, share).await?;

    let target = if tokio::fs::metadata(destination)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        let name = Path::new(share.suggested_filename())
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&share.reference));
        destination.join(name)
    } else {
        destination.to_path_buf()
    };

    tokio::fs::write(&target, &plaintext).await?;
    info!(reference = %share.reference, path = %target.display(), "Shared file downloaded");
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_current_form() {
        let share: ShareString = "alice:aB3xY9:S:Yi50eHQ=".parse().unwrap();
        assert_eq!(share.username.as_str(), "alice");
        assert_eq!(share.reference, "aB3xY9");
        assert_eq!(share.password.as_str(), "S");
        assert_eq!(share.filename.as_deref(), Some("b.txt"));
        assert_eq!(share.to_string(), "alice:aB3xY9:S:Yi50eHQ=");
    }

    #[test]
    fn test_parse_legacy_form() {
        let share: ShareString = "alice:aB3xY9:S".parse().unwrap();
        assert_eq!(share.filename, None);
        assert_eq!(share.suggested_filename(), "aB3xY9");
        assert_eq!(share.to_string(), "alice:aB3xY9:S");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        for bad in [
            "",
            "alice",
            "alice:ref",
            "alice:ref:pw:bmFtZQ==:extra",
            ":ref:pw",
            "alice::pw",
            "alice:re/f:pw",
            "alice:ref:",
        ] {
            assert!(bad.parse::<ShareString>().is_err(), "accepted {:?}", bad);
        }
        assert!(matches!(
            "alice:ref:pw:***".parse::<ShareString>(),
            Err(Error::Malformed(_))
        ));
    }
}
