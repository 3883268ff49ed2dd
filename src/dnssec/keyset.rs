use std::slice;

use tracing::{error, info};

use super::errors::{KeyLoadFailure, KeySetError};
use super::keyfile::KeyFiles;
use super::keypair::KeyPair;

/// The immutable set of signing keys, built once at startup and shared
/// read-only between query handlers
#[derive(Debug, Default)]
pub struct KeySet {
    keys: Vec<KeyPair>,
}

impl KeySet {
    pub fn new(keys: Vec<KeyPair>) -> Self {
        Self { keys }
    }

    /// Load every key, failing with the full list of keys that could not
    /// be loaded if any of them fails
    pub fn load(files: &[KeyFiles]) -> Result<Self, KeySetError> {
        let (set, failures) = Self::load_partial(files);
        if !failures.is_empty() {
            return Err(KeySetError { failures });
        }
        Ok(set)
    }

    /// Load every key that can be loaded and return the failures alongside
    pub fn load_partial(files: &[KeyFiles]) -> (Self, Vec<KeyLoadFailure>) {
        let mut keys = Vec::with_capacity(files.len());
        let mut failures = Vec::new();

        for key_files in files {
            match KeyPair::load(key_files) {
                Ok(pair) => keys.push(pair),
                Err(e) => {
                    error!("Failed to load DNSSEC key {}: {}", key_files.display_name(), e);
                    failures.push(KeyLoadFailure {
                        key: key_files.display_name(),
                        error: e,
                    });
                }
            }
        }

        info!(
            "Loaded {} DNSSEC key(s), {} failed",
            keys.len(),
            failures.len()
        );
        (Self { keys }, failures)
    }

    pub fn keys(&self) -> &[KeyPair] {
        &self.keys
    }

    pub fn iter(&self) -> slice::Iter<'_, KeyPair> {
        self.keys.iter()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<'a> IntoIterator for &'a KeySet {
    type Item = &'a KeyPair;
    type IntoIter = slice::Iter<'a, KeyPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
