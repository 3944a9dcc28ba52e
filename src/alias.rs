use crate::error::{Result, TallyError};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// Alias-file value: either a single username or a list of them. The original
/// configuration format allows both, so both are accepted here.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum AliasEntry {
    One(String),
    Many(Vec<String>),
}

impl AliasEntry {
    fn into_vec(self) -> Vec<String> {
        match self {
            AliasEntry::One(name) => vec![name],
            AliasEntry::Many(names) => names,
        }
    }
}

/// Maps raw source-control usernames to canonical author names.
///
/// Loaded once at startup from a JSON object of canonical name to username
/// list; immutable afterwards. Resolution is total: a username without a
/// mapping entry is its own canonical identity.
#[derive(Debug, Clone, Default)]
pub struct AliasResolver {
    aliases: BTreeMap<String, Vec<String>>,
    canonical_by_username: HashMap<String, String>,
}

impl AliasResolver {
    /// Build the resolver from an explicit mapping, validating that no
    /// username (case-insensitive) is claimed by two canonical authors.
    pub fn load(aliases: BTreeMap<String, Vec<String>>) -> Result<Self> {
        let mut canonical_by_username: HashMap<String, String> = HashMap::new();

        for (canonical, usernames) in &aliases {
            // The canonical name resolves to itself.
            for username in usernames.iter().map(String::as_str).chain([canonical.as_str()]) {
                let key = username.to_lowercase();
                if let Some(existing) = canonical_by_username.get(&key) {
                    if existing != canonical {
                        return Err(TallyError::Config(format!(
                            "username '{username}' is mapped to both '{existing}' and '{canonical}'"
                        )));
                    }
                    continue;
                }
                canonical_by_username.insert(key, canonical.clone());
            }
        }

        Ok(Self { aliases, canonical_by_username })
    }

    /// Load the mapping from a JSON file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let entries: BTreeMap<String, AliasEntry> =
            serde_json::from_str(&raw).map_err(|e| {
                TallyError::Config(format!("malformed alias file {}: {e}", path.display()))
            })?;
        Self::load(
            entries
                .into_iter()
                .map(|(canonical, entry)| (canonical, entry.into_vec()))
                .collect(),
        )
    }

    /// Canonical author for a raw username; the username itself when no
    /// mapping entry exists. Case-insensitive, never fails.
    pub fn resolve<'a>(&'a self, username: &'a str) -> &'a str {
        match self.canonical_by_username.get(&username.to_lowercase()) {
            Some(canonical) => canonical.as_str(),
            None => username,
        }
    }

    pub fn is_aliased(&self, username: &str) -> bool {
        self.canonical_by_username
            .contains_key(&username.to_lowercase())
    }

    /// All declared usernames of a canonical author, the canonical name
    /// included; just the name itself when it owns no aliases.
    pub fn usernames_of(&self, canonical: &str) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = match self.aliases.get(canonical) {
            Some(usernames) => usernames.iter().cloned().collect(),
            None => BTreeSet::new(),
        };
        names.insert(canonical.to_string());
        names
    }

    pub fn canonical_count(&self) -> usize {
        self.aliases.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(canonical, usernames)| {
                (
                    canonical.to_string(),
                    usernames.iter().map(|u| u.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn resolves_aliases_case_insensitively() {
        let resolver =
            AliasResolver::load(mapping(&[("alice", &["alice1", "Alice-Work"])])).unwrap();
        assert_eq!(resolver.resolve("alice1"), "alice");
        assert_eq!(resolver.resolve("ALICE-WORK"), "alice");
        assert_eq!(resolver.resolve("Alice"), "alice");
    }

    #[test]
    fn unknown_usernames_resolve_to_themselves() {
        let resolver = AliasResolver::load(mapping(&[("alice", &["alice1"])])).unwrap();
        assert_eq!(resolver.resolve("mallory"), "mallory");
        assert!(!resolver.is_aliased("mallory"));
    }

    #[test]
    fn duplicate_username_across_canonical_names_is_a_config_error() {
        let err = AliasResolver::load(mapping(&[
            ("alice", &["shared"]),
            ("bob", &["shared"]),
        ]))
        .unwrap_err();
        assert!(matches!(err, TallyError::Config(_)), "got {err:?}");
    }

    #[test]
    fn canonical_name_claimed_as_another_authors_alias_is_rejected() {
        let err = AliasResolver::load(mapping(&[
            ("alice", &["bob"]),
            ("bob", &["bob-work"]),
        ]))
        .unwrap_err();
        assert!(matches!(err, TallyError::Config(_)), "got {err:?}");
    }

    #[test]
    fn repeating_a_username_under_its_own_author_is_fine() {
        let resolver =
            AliasResolver::load(mapping(&[("alice", &["alice", "alice1", "alice1"])])).unwrap();
        assert_eq!(resolver.resolve("alice1"), "alice");
    }

    #[test]
    fn usernames_of_includes_the_canonical_name() {
        let resolver = AliasResolver::load(mapping(&[("alice", &["alice1"])])).unwrap();
        let names: Vec<_> = resolver.usernames_of("alice").into_iter().collect();
        assert_eq!(names, ["alice", "alice1"]);
        let solo: Vec<_> = resolver.usernames_of("mallory").into_iter().collect();
        assert_eq!(solo, ["mallory"]);
    }

    #[test]
    fn scalar_alias_values_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.json");
        std::fs::write(&path, r#"{"alice": "alice1", "bob": ["bob1", "bob2"]}"#).unwrap();
        let resolver = AliasResolver::from_path(&path).unwrap();
        assert_eq!(resolver.resolve("alice1"), "alice");
        assert_eq!(resolver.resolve("bob2"), "bob");
        assert_eq!(resolver.canonical_count(), 2);
    }

    #[test]
    fn malformed_alias_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = AliasResolver::from_path(&path).unwrap_err();
        assert!(matches!(err, TallyError::Config(_)), "got {err:?}");
    }
}
