//! Common types used throughout GitVault.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Owner of a vault; names the remote repository and appears in share strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Create a new Username from a string.
    ///
    /// # Errors
    /// - Returns error if the name is empty or contains `/`, `:` or whitespace
    pub fn new(name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(crate::Error::InvalidInput(
                "Username cannot be empty".to_string(),
            ));
        }
        if name.contains(['/', ':']) || name.chars().any(char::is_whitespace) {
            return Err(crate::Error::InvalidInput(format!(
                "Username '{}' contains invalid characters",
                name
            )));
        }
        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Username {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::new(value)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A logical path within a vault, independent of remote object names.
///
/// `"a/b.txt"`, `"/a/b.txt"` and `"a/b.txt/"` all parse to the same path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VaultPath {
    components: Vec<String>,
}

impl VaultPath {
    /// Create a root path.
    pub fn root() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Create a path from string components.
    ///
    /// # Errors
    /// - Returns error if any component is empty, `.`/`..`, or contains a separator
    pub fn from_components(components: Vec<String>) -> crate::Result<Self> {
        for comp in &components {
            validate_component(comp)?;
        }
        Ok(Self { components })
    }

    /// Parse a path string into VaultPath.
    ///
    /// Uses '/' as separator.
    pub fn parse(path: &str) -> crate::Result<Self> {
        let path = path.trim_matches('/');
        if path.is_empty() {
            return Ok(Self::root());
        }

        let components: Vec<String> = path.split('/').map(String::from).collect();
        Self::from_components(components)
    }

    /// Check if this is the root path.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Get the parent path, if any.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            None
        } else {
            let mut components = self.components.clone();
            components.pop();
            Some(Self { components })
        }
    }

    /// Get the file/folder name (last component).
    pub fn name(&self) -> Option<&str> {
        self.components.last().map(|s| s.as_str())
    }

    /// Join this path with a child component.
    pub fn join(&self, child: &str) -> crate::Result<Self> {
        validate_component(child)?;
        let mut components = self.components.clone();
        components.push(child.to_string());
        Ok(Self { components })
    }

    /// Get the path components.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Slash-joined form without a leading separator (`""` for root).
    pub fn to_string_path(&self) -> String {
        self.components.join("/")
    }
}

fn validate_component(comp: &str) -> crate::Result<()> {
    if comp.is_empty() {
        return Err(crate::Error::InvalidInput(
            "Path component cannot be empty".to_string(),
        ));
    }
    if comp == "." || comp == ".." {
        return Err(crate::Error::InvalidInput(format!(
            "Path component '{}' is not allowed",
            comp
        )));
    }
    if comp.contains('/') || comp.contains('\\') {
        return Err(crate::Error::InvalidInput(
            "Path component cannot contain separators".to_string(),
        ));
    }
    Ok(())
}

impl fmt::Display for VaultPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.to_string_path())
        }
    }
}

/// Sensitive data wrapper that zeroizes on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SensitiveBytes(Vec<u8>);

impl SensitiveBytes {
    /// Create new sensitive bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// Get a reference to the inner bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Get the length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SensitiveBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensitiveBytes([REDACTED; {} bytes])", self.0.len())
    }
}

/// A password held in memory for the life of a session; wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    /// Wrap a password.
    ///
    /// # Errors
    /// - Returns error if the password is empty
    pub fn new(password: impl Into<String>) -> crate::Result<Self> {
        let password = password.into();
        if password.is_empty() {
            return Err(crate::Error::InvalidInput(
                "Password cannot be empty".to_string(),
            ));
        }
        Ok(Self(password))
    }

    /// Borrow the password text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Borrow the password as bytes for key derivation.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Password([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_creation() {
        let user = Username::new("octocat").unwrap();
        assert_eq!(user.as_str(), "octocat");
    }

    #[test]
    fn test_username_rejects_separators() {
        assert!(Username::new("").is_err());
        assert!(Username::new("a:b").is_err());
        assert!(Username::new("a/b").is_err());
        assert!(Username::new("a b").is_err());
    }

    #[test]
    fn test_username_deserialize_validates() {
        let user: Username = serde_json::from_str("\"octocat\"").unwrap();
        assert_eq!(user.as_str(), "octocat");
        assert!(serde_json::from_str::<Username>("\"a:b\"").is_err());
    }

    #[test]
    fn test_vault_path_root() {
        let path = VaultPath::parse("/").unwrap();
        assert!(path.is_root());
        assert_eq!(path.to_string(), "/");
    }

    #[test]
    fn test_vault_path_parse_trims_separators() {
        let path = VaultPath::parse("/foo/bar/baz/").unwrap();
        assert_eq!(path.components(), &["foo", "bar", "baz"]);
        assert_eq!(path.to_string_path(), "foo/bar/baz");
    }

    #[test]
    fn test_vault_path_rejects_empty_and_dot_components() {
        assert!(VaultPath::parse("a//b").is_err());
        assert!(VaultPath::parse("a/../b").is_err());
        assert!(VaultPath::parse("./b").is_err());
    }

    #[test]
    fn test_vault_path_join_and_parent() {
        let path = VaultPath::root().join("foo").unwrap().join("bar").unwrap();
        assert_eq!(path.to_string_path(), "foo/bar");
        assert_eq!(path.parent().unwrap().to_string_path(), "foo");
        assert_eq!(path.name(), Some("bar"));
    }

    #[test]
    fn test_password_debug_is_redacted() {
        let password = Password::new("hunter2").unwrap();
        assert_eq!(format!("{:?}", password), "Password([REDACTED])");
        assert!(Password::new("").is_err());
    }
}
