//! Supervisor directory with password verification

use std::collections::BTreeMap;
use std::path::Path;

use countersign_domain::Supervisor;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::CredentialError;

fn default_active() -> bool {
    true
}

/// One supervisor entry as configured, secret included
#[derive(Debug, Clone, Deserialize)]
struct SupervisorEntry {
    name: String,

    #[serde(default)]
    email: String,

    #[serde(default = "default_active")]
    active: bool,

    /// SHA-256 hex digest of the password; preferred
    #[serde(default)]
    password_hash: Option<String>,

    /// Plaintext fallback for non-production configurations
    #[serde(default)]
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    supervisors: BTreeMap<String, SupervisorEntry>,
}

/// Read-only directory of supervisors and their verifiable secrets
///
/// Loaded once at process start from TOML configuration and passed by
/// handle into the services that need it. Secrets never leave this
/// type: lookups return display-safe [`Supervisor`] records.
pub struct SupervisorDirectory {
    entries: BTreeMap<String, SupervisorEntry>,
}

impl SupervisorDirectory {
    /// Parse a directory from TOML text
    ///
    /// ```toml
    /// [supervisors.maria]
    /// name = "Maria Jose"
    /// email = "maria@example.com"
    /// password_hash = "…sha-256 hex…"
    /// ```
    pub fn from_toml_str(raw: &str) -> Result<Self, CredentialError> {
        let file: DirectoryFile =
            toml::from_str(raw).map_err(|e| CredentialError::Config(e.to_string()))?;
        Ok(Self {
            entries: file.supervisors,
        })
    }

    /// Load a directory from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CredentialError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CredentialError::Config(e.to_string()))?;
        Self::from_toml_str(&raw)
    }

    /// List active supervisors, display-safe
    pub fn list(&self) -> Vec<Supervisor> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.active)
            .map(|(id, entry)| Supervisor {
                id: id.clone(),
                name: entry.name.clone(),
                email: entry.email.clone(),
                active: true,
            })
            .collect()
    }

    /// Look up an active supervisor by id, display-safe
    pub fn get(&self, supervisor_id: &str) -> Option<Supervisor> {
        self.entries
            .get(supervisor_id)
            .filter(|entry| entry.active)
            .map(|entry| Supervisor {
                id: supervisor_id.to_string(),
                name: entry.name.clone(),
                email: entry.email.clone(),
                active: true,
            })
    }

    /// Verify a supervisor's password
    ///
    /// The stored hash is checked first; the plaintext entry is a
    /// fallback for development setups. Unknown or inactive supervisors
    /// always fail.
    pub fn verify_password(&self, supervisor_id: &str, password: &str) -> bool {
        let Some(entry) = self.entries.get(supervisor_id) else {
            return false;
        };
        if !entry.active {
            return false;
        }

        if let Some(stored_hash) = &entry.password_hash {
            if sha256_hex(password) == *stored_hash {
                return true;
            }
        }

        if let Some(stored_password) = &entry.password {
            if password == stored_password {
                return true;
            }
        }

        false
    }
}

/// SHA-256 hex digest of a string
pub(crate) fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> SupervisorDirectory {
        let toml = format!(
            r#"
            [supervisors.maria]
            name = "Maria Jose"
            email = "maria@example.com"
            password_hash = "{}"

            [supervisors.admin]
            name = "Administrator"
            password = "dev-only"

            [supervisors.gone]
            name = "Former Partner"
            active = false
            password = "whatever"
            "#,
            sha256_hex("s3cret")
        );
        SupervisorDirectory::from_toml_str(&toml).unwrap()
    }

    #[test]
    fn test_list_excludes_inactive() {
        let dir = directory();
        let ids: Vec<_> = dir.list().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["admin", "maria"]);
    }

    #[test]
    fn test_get_inactive_is_none() {
        let dir = directory();
        assert!(dir.get("maria").is_some());
        assert!(dir.get("gone").is_none());
        assert!(dir.get("nobody").is_none());
    }

    #[test]
    fn test_verify_against_hash() {
        let dir = directory();
        assert!(dir.verify_password("maria", "s3cret"));
        assert!(!dir.verify_password("maria", "wrong"));
    }

    #[test]
    fn test_verify_plaintext_fallback() {
        let dir = directory();
        assert!(dir.verify_password("admin", "dev-only"));
        assert!(!dir.verify_password("admin", "dev"));
    }

    #[test]
    fn test_verify_inactive_and_unknown_fail() {
        let dir = directory();
        assert!(!dir.verify_password("gone", "whatever"));
        assert!(!dir.verify_password("nobody", "anything"));
    }

    #[test]
    fn test_no_password_configured_rejects_all() {
        let dir = SupervisorDirectory::from_toml_str(
            r#"
            [supervisors.bare]
            name = "No Secret"
            "#,
        )
        .unwrap();
        assert!(!dir.verify_password("bare", ""));
        assert!(!dir.verify_password("bare", "guess"));
    }
}
