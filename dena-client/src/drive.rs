/// Drive (object storage) handle
use crate::credential::Credential;
use reqwest::Url;

/// A Drive bound to the same project and key as the factory that built it.
///
/// Only the addressing is provided; file operations are not part of this
/// crate.
#[derive(Debug, Clone)]
pub struct Drive {
    name: String,
    base_url: Url,
    credential: Credential,
}

impl Drive {
    pub(crate) fn new(name: &str, base_url: Url, credential: Credential) -> Self {
        Self {
            name: name.to_string(),
            base_url,
            credential,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `<drive endpoint>/v1/<projectId>/<name>`
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn project_id(&self) -> &str {
        self.credential.project_id()
    }
}
