/// Request executor: one logical operation, one HTTP round trip
use crate::credential::Credential;
use crate::error::{ClientError, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

pub(crate) const API_KEY_HEADER: &str = "X-API-Key";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Logical operation descriptor.
///
/// Defaults to a `GET` on the collection root with no body.
#[derive(Debug, Clone)]
pub(crate) struct Operation {
    method: Method,
    segments: Vec<String>,
    body: Option<Vec<u8>>,
}

impl Default for Operation {
    fn default() -> Self {
        Self {
            method: Method::GET,
            segments: Vec::new(),
            body: None,
        }
    }
}

impl Operation {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    /// Append one path segment. The segment is percent-encoded as a unit,
    /// so a `/` inside it never splits it in two.
    pub fn segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    /// Attach a JSON body
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_vec(body)?);
        Ok(self)
    }
}

/// Sends operations against one collection URL
#[derive(Clone)]
pub(crate) struct Executor {
    http: reqwest::Client,
    base_url: Url,
    credential: Credential,
}

impl Executor {
    pub fn new(http: reqwest::Client, base_url: Url, credential: Credential) -> Self {
        Self {
            http,
            base_url,
            credential,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Send the operation and decode a 2xx body as `R`.
    ///
    /// The response body is parsed as JSON whatever the status. Any status
    /// outside `[200, 300)` fails with [`ClientError::Remote`] carrying that
    /// JSON unchanged.
    pub async fn execute<R: DeserializeOwned>(&self, operation: Operation) -> Result<R> {
        let url = join_segments(&self.base_url, &operation.segments)?;
        debug!(method = %operation.method, url = %url, "sending request");

        let mut request = self
            .http
            .request(operation.method.clone(), url)
            .header(API_KEY_HEADER, self.credential.expose())
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE);
        if let Some(body) = operation.body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        let data: Value = serde_json::from_slice(&bytes)?;

        if status.is_success() {
            debug!(method = %operation.method, status = status.as_u16(), "request succeeded");
            Ok(serde_json::from_value(data)?)
        } else {
            warn!(
                method = %operation.method,
                status = status.as_u16(),
                "request rejected by service"
            );
            Err(ClientError::Remote {
                status: status.as_u16(),
                body: data,
            })
        }
    }
}

/// Join path segments onto `base`, one encoded segment each.
///
/// A trailing empty segment on `base` (from a trailing `/`) is dropped first
/// so joins never produce `//`.
pub(crate) fn join_segments<S: AsRef<str>>(base: &Url, segments: &[S]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ClientError::InvalidArgument("endpoint cannot be used as a base URL".to_string()))?
        .pop_if_empty()
        .extend(segments.iter().map(AsRef::as_ref));
    Ok(url)
}
