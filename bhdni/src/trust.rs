// Copyright (C) 2020-2026  The Blockhouse Technology Limited (TBTL).
//
// This program is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// This program is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public
// License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! This module provides the [`CertificateStore`], the caller supplied set of trusted signer
//! certificates.

use std::collections::HashMap;

use serde::Deserialize;

/// Trusted signer certificates in the PEM format, keyed by their hex certificate reference.
///
/// References are case-insensitive; they are stored lowercase.
///
/// The store deserializes from a map of references to PEM certificates, e.g.
///
/// ```json
/// { "4d393eec9ad3289964d22fb9f744a884": "-----BEGIN CERTIFICATE-----\n..." }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "HashMap<String, String>")]
pub struct CertificateStore {
    certificates: HashMap<String, String>,
}

impl CertificateStore {
    /// Creates an empty [`CertificateStore`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a PEM `certificate` under the `reference`, returning the one it replaced.
    pub fn insert(&mut self, reference: &str, certificate: impl Into<String>) -> Option<String> {
        self.certificates
            .insert(reference.to_ascii_lowercase(), certificate.into())
    }

    /// Returns the PEM certificate for the `reference`, in any letter case.
    pub fn get(&self, reference: &str) -> Option<&str> {
        self.certificates
            .get(&reference.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Number of certificates in the store.
    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    /// Whether the store has no certificates.
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }
}

impl<R, C> FromIterator<(R, C)> for CertificateStore
where
    R: AsRef<str>,
    C: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (R, C)>>(iter: I) -> Self {
        let mut store = Self::new();
        for (reference, certificate) in iter {
            store.insert(reference.as_ref(), certificate);
        }
        store
    }
}

impl From<HashMap<String, String>> for CertificateStore {
    fn from(certificates: HashMap<String, String>) -> Self {
        certificates.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut store = CertificateStore::new();
        assert!(store.is_empty());

        store.insert("4D393EEC9AD3289964D22FB9F744A884", "pem");

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("4d393eec9ad3289964d22fb9f744a884"), Some("pem"));
        assert_eq!(store.get("4D393EEC9AD3289964D22FB9F744A884"), Some("pem"));
        assert_eq!(store.get("41b02f420c705d9a6662f8c1559c27c5"), None);
    }

    #[test]
    fn test_insert_replaces() {
        let mut store = CertificateStore::new();

        assert_eq!(store.insert("ab", "first"), None);
        assert_eq!(store.insert("AB", "second").as_deref(), Some("first"));
        assert_eq!(store.get("ab"), Some("second"));
    }

    #[test]
    fn test_from_iterator() {
        let store: CertificateStore = [("AA", "one"), ("bb", "two")].into_iter().collect();

        assert_eq!(store.get("aa"), Some("one"));
        assert_eq!(store.get("BB"), Some("two"));
    }

    #[test]
    fn test_deserialize() {
        let store: CertificateStore = serde_json::from_str(
            r#"{ "2274948240B9368F65E5C80FEBFE5CE4": "-----BEGIN CERTIFICATE-----" }"#,
        )
        .unwrap();

        assert_eq!(
            store.get("2274948240b9368f65e5c80febfe5ce4"),
            Some("-----BEGIN CERTIFICATE-----")
        );
    }
}
