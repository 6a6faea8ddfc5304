use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

use crate::types::CredentialPair;

pub const DEFAULT_USERNAME: &str = "admin";
pub const DEFAULT_PASSWORD: &str = "admin";

/// The credentials tried against every candidate endpoint.
///
/// Iteration order is fixed: usernames in the outer loop, passwords in the
/// inner loop, each in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSet {
    Single(CredentialPair),
    Users { usernames: Vec<String>, password: String },
    Passwords { username: String, passwords: Vec<String> },
    Product { usernames: Vec<String>, passwords: Vec<String> },
}

impl Default for CredentialSet {
    fn default() -> Self {
        CredentialSet::Single(CredentialPair::new(DEFAULT_USERNAME, DEFAULT_PASSWORD))
    }
}

impl CredentialSet {
    /// Pick the shape from whichever wordlists were supplied, falling back to
    /// the single `username`/`password` on the side without a list.
    pub fn from_sources(
        username: &str,
        password: &str,
        usernames: Option<Vec<String>>,
        passwords: Option<Vec<String>>,
    ) -> Self {
        match (usernames, passwords) {
            (Some(usernames), Some(passwords)) => CredentialSet::Product { usernames, passwords },
            (Some(usernames), None) => CredentialSet::Users {
                usernames,
                password: password.to_string(),
            },
            (None, Some(passwords)) => CredentialSet::Passwords {
                username: username.to_string(),
                passwords,
            },
            (None, None) => CredentialSet::Single(CredentialPair::new(username, password)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            CredentialSet::Single(_) => 1,
            CredentialSet::Users { usernames, .. } => usernames.len(),
            CredentialSet::Passwords { passwords, .. } => passwords.len(),
            CredentialSet::Product { usernames, passwords } => usernames.len() * passwords.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = CredentialPair> + Send + '_> {
        match self {
            CredentialSet::Single(pair) => Box::new(std::iter::once(pair.clone())),
            CredentialSet::Users { usernames, password } => Box::new(
                usernames
                    .iter()
                    .map(move |u| CredentialPair::new(u.as_str(), password.as_str())),
            ),
            CredentialSet::Passwords { username, passwords } => Box::new(
                passwords
                    .iter()
                    .map(move |p| CredentialPair::new(username.as_str(), p.as_str())),
            ),
            CredentialSet::Product { usernames, passwords } => Box::new(usernames.iter().flat_map(
                move |u| {
                    passwords
                        .iter()
                        .map(move |p| CredentialPair::new(u.as_str(), p.as_str()))
                },
            )),
        }
    }
}

/// Parse a wordlist, one entry per line. Blank lines are skipped; no comment
/// syntax since `#` is a legal password character.
pub fn parse_wordlist_str(s: &str) -> Vec<String> {
    s.lines()
        .map(|l| l.trim_end_matches(['\r', '\n']))
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Load a wordlist from disk. An empty list is an error: it would silently
/// turn the run into a no-op.
pub fn load_wordlist(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read wordlist: {}", path.display()))?;
    let words = parse_wordlist_str(&content);
    if words.is_empty() {
        bail!("wordlist is empty: {}", path.display());
    }
    Ok(words)
}
