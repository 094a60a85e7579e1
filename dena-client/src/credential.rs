/// Project key handling
use crate::error::{ClientError, Result};
use std::fmt;
use std::sync::Arc;

const PROJECT_ID_SEPARATOR: char = '_';

/// A project key of the form `<projectId>_<secret>`.
///
/// Immutable and cheap to clone. The secret never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    key: Arc<str>,
    project_id_len: usize,
}

impl Credential {
    /// Parse a project key. Fails when the key is empty.
    ///
    /// The project id is everything before the first `_`; a key without a
    /// separator is its own project id.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(ClientError::InvalidArgument("Project key is empty".to_string()));
        }

        let project_id_len = key.find(PROJECT_ID_SEPARATOR).unwrap_or(key.len());
        Ok(Self {
            key: Arc::from(key),
            project_id_len,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.key[..self.project_id_len]
    }

    /// The full key, as sent in the `X-API-Key` header
    pub(crate) fn expose(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("project_id", &self.project_id())
            .field("key", &"<redacted>")
            .finish()
    }
}
