/// Client factory
use crate::base::Base;
use crate::config::ClientConfig;
use crate::credential::Credential;
use crate::drive::Drive;
use crate::error::Result;
use crate::executor::{join_segments, Executor};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use tracing::debug;

const API_VERSION: &str = "v1";

/// Entry point: holds the project key and hands out [`Base`] and [`Drive`]
/// handles rooted at the key's project.
///
/// All handles created by one `Dena` share a single HTTP connection pool.
#[derive(Clone)]
pub struct Dena {
    credential: Credential,
    http: reqwest::Client,
    base_endpoint: Url,
    drive_endpoint: Url,
}

impl Dena {
    /// Create a client for the hosted service
    ///
    /// # Arguments
    /// * `key` - Project key (`<projectId>_<secret>`); must not be empty
    ///
    /// # Example
    /// ```no_run
    /// # use dena_client::{Base, Dena};
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let dena = Dena::new("a0abcyxz_aSecretValue")?;
    /// assert_eq!(dena.project_id(), "a0abcyxz");
    ///
    /// let users: Base = dena.base("users")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(key: impl Into<String>) -> Result<Self> {
        Self::with_config(key, ClientConfig::default())
    }

    /// Create a client with explicit endpoints and transport settings
    pub fn with_config(key: impl Into<String>, config: ClientConfig) -> Result<Self> {
        let credential = Credential::new(key)?;
        config.validate()?;

        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.as_str());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        debug!(
            project_id = credential.project_id(),
            base_endpoint = %config.base_endpoint,
            "created client"
        );

        Ok(Self {
            credential,
            http,
            base_endpoint: config.base_url()?,
            drive_endpoint: config.drive_url()?,
        })
    }

    pub fn project_id(&self) -> &str {
        self.credential.project_id()
    }

    /// Handle for the Base collection `name`.
    ///
    /// `T` is the record type; use [`Base`] (schemaless records) when the
    /// shape is not known.
    pub fn base<T>(&self, name: &str) -> Result<Base<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        let url = self.collection_url(&self.base_endpoint, name)?;
        let executor = Executor::new(self.http.clone(), url, self.credential.clone());
        Ok(Base::new(name, executor))
    }

    /// Handle for the Drive `name`
    pub fn drive(&self, name: &str) -> Result<Drive> {
        let url = self.collection_url(&self.drive_endpoint, name)?;
        Ok(Drive::new(name, url, self.credential.clone()))
    }

    fn collection_url(&self, endpoint: &Url, name: &str) -> Result<Url> {
        join_segments(endpoint, &[API_VERSION, self.credential.project_id(), name])
    }
}

impl fmt::Debug for Dena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dena")
            .field("credential", &self.credential)
            .field("base_endpoint", &self.base_endpoint.as_str())
            .field("drive_endpoint", &self.drive_endpoint.as_str())
            .finish()
    }
}
