//! A configured metadata repository entry, as carried through in the
//! persisted blob's `sorted_repositories` map (§6.1). Fetching against it
//! is out of scope here — the registry only stores and migrates the URI.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub uri: String,
}

impl Repository {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}
