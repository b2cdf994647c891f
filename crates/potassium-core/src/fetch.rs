#![forbid(unsafe_code)]

//! Remote loading: where a data object lives ([`Endpoint`]) and how JSON is
//! retrieved ([`Fetcher`]).
//!
//! The data layer never performs I/O on its own. [`DataObject::fetch`]
//! resolves the URL, asks the fetcher for JSON, runs `parse`, then `reset`,
//! and reports the outcome through `fetching` / `fetched` events.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::{DataError, FetchError};
use crate::object::{DataObject, DataRef, EventDetail, FETCHED, FETCHING};

/// Location and payload shape of a remote data object.
pub trait Endpoint {
    /// URL to fetch `target` from.
    ///
    /// # Errors
    ///
    /// Implementation-defined; typically [`DataError::NotImplemented`].
    fn url(&self, target: &DataRef) -> Result<String, DataError>;

    /// Transform fetched JSON before it is handed to `reset`.
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn parse(&self, data: Json) -> Result<Json, DataError> {
        Ok(data)
    }
}

/// Retrieves JSON for a URL.
pub trait Fetcher {
    /// Fetch and decode the JSON document at `url`.
    ///
    /// # Errors
    ///
    /// [`FetchError`] describing the transport, status or decode failure.
    fn fetch_json(&self, url: &str) -> Result<Json, FetchError>;
}

impl<F: Fetcher + ?Sized> Fetcher for &F {
    fn fetch_json(&self, url: &str) -> Result<Json, FetchError> {
        (**self).fetch_json(url)
    }
}

impl<F: Fetcher + ?Sized> Fetcher for Rc<F> {
    fn fetch_json(&self, url: &str) -> Result<Json, FetchError> {
        (**self).fetch_json(url)
    }
}

/// Ready-made [`Endpoint`] implementations.
pub mod endpoint {
    use super::*;

    type Parser = Rc<dyn Fn(Json) -> Result<Json, DataError>>;

    /// Endpoint at a constant URL.
    #[must_use]
    pub fn fixed(url: impl Into<String>) -> Fixed {
        Fixed {
            url: url.into(),
            parser: None,
        }
    }

    /// Endpoint whose URL is computed from the target (e.g. from its `id`).
    #[must_use]
    pub fn from_fn<F>(url: F) -> FromFn<F>
    where
        F: Fn(&DataRef) -> Result<String, DataError>,
    {
        FromFn { url, parser: None }
    }

    /// See [`fixed`].
    #[derive(Clone)]
    pub struct Fixed {
        url: String,
        parser: Option<Parser>,
    }

    impl Fixed {
        /// Run `parser` on every fetched payload.
        #[must_use]
        pub fn with_parser(
            mut self,
            parser: impl Fn(Json) -> Result<Json, DataError> + 'static,
        ) -> Self {
            self.parser = Some(Rc::new(parser));
            self
        }
    }

    impl Endpoint for Fixed {
        fn url(&self, _target: &DataRef) -> Result<String, DataError> {
            Ok(self.url.clone())
        }

        fn parse(&self, data: Json) -> Result<Json, DataError> {
            match &self.parser {
                Some(parser) => parser(data),
                None => Ok(data),
            }
        }
    }

    impl fmt::Debug for Fixed {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("Fixed")
                .field("url", &self.url)
                .field("has_parser", &self.parser.is_some())
                .finish()
        }
    }

    /// See [`from_fn`].
    #[derive(Clone)]
    pub struct FromFn<F> {
        url: F,
        parser: Option<Parser>,
    }

    impl<F> FromFn<F> {
        /// Run `parser` on every fetched payload.
        #[must_use]
        pub fn with_parser(
            mut self,
            parser: impl Fn(Json) -> Result<Json, DataError> + 'static,
        ) -> Self {
            self.parser = Some(Rc::new(parser));
            self
        }
    }

    impl<F> Endpoint for FromFn<F>
    where
        F: Fn(&DataRef) -> Result<String, DataError>,
    {
        fn url(&self, target: &DataRef) -> Result<String, DataError> {
            (self.url)(target)
        }

        fn parse(&self, data: Json) -> Result<Json, DataError> {
            match &self.parser {
                Some(parser) => parser(data),
                None => Ok(data),
            }
        }
    }
}

fn payload_error(url: &str, err: &DataError) -> FetchError {
    FetchError::Payload {
        url: url.to_owned(),
        message: err.to_string(),
    }
}

/// The fetch pipeline behind [`DataObject::fetch`].
pub(crate) fn run_fetch<T>(object: &T, fetcher: &dyn Fetcher) -> Result<(), DataError>
where
    T: DataObject + ?Sized,
{
    let url = object.url()?;
    tracing::debug!(%url, "fetch started");
    object.trigger(FETCHING, EventDetail::Fetching);

    let outcome = fetcher.fetch_json(&url).and_then(|raw| {
        let data = object.parse(raw).map_err(|err| payload_error(&url, &err))?;
        object
            .reset(data.clone())
            .map_err(|err| payload_error(&url, &err))?;
        Ok(data)
    });

    match outcome {
        Ok(data) => {
            tracing::debug!(%url, "fetch finished");
            object.trigger(
                FETCHED,
                EventDetail::Fetched {
                    data: Some(data),
                    error: None,
                },
            );
            Ok(())
        }
        Err(error) => {
            tracing::warn!(%url, %error, "fetch failed");
            object.trigger(
                FETCHED,
                EventDetail::Fetched {
                    data: None,
                    error: Some(error.clone()),
                },
            );
            Err(error.into())
        }
    }
}

/// Settings for [`HttpFetcher`].
///
/// ```
/// use potassium_core::HttpFetcherConfig;
///
/// let config = HttpFetcherConfig::from_json_str(
///     r#"{"base_url": "https://api.example.com/v1", "timeout_ms": 5000}"#,
/// )
/// .unwrap();
/// assert_eq!(config.timeout_ms, 5000);
/// assert_eq!(config.connect_timeout_ms, 8_000);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpFetcherConfig {
    /// Prefix for relative URLs. Absolute `http(s)://` URLs ignore it.
    pub base_url: Option<String>,
    /// Whole-request timeout.
    pub timeout_ms: u64,
    /// Connection timeout.
    pub connect_timeout_ms: u64,
    /// `User-Agent` header.
    pub user_agent: String,
}

const REQUEST_TIMEOUT_MS: u64 = 30_000;
const CONNECT_TIMEOUT_MS: u64 = 8_000;

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: REQUEST_TIMEOUT_MS,
            connect_timeout_ms: CONNECT_TIMEOUT_MS,
            user_agent: concat!("potassium/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl HttpFetcherConfig {
    /// Parse a JSON config document; missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns the decoder error for malformed documents.
    pub fn from_json_str(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }

    /// Resolve `url` against `base_url`.
    #[must_use]
    pub fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_owned();
        }
        match &self.base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                let path = url.trim_start_matches('/');
                format!("{base}/{path}")
            }
            None => url.to_owned(),
        }
    }
}

#[cfg(feature = "http")]
pub use http::HttpFetcher;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use reqwest::blocking::Client;
    use serde_json::Value as Json;

    use super::{Fetcher, HttpFetcherConfig};
    use crate::error::FetchError;

    /// Blocking HTTP [`Fetcher`].
    #[derive(Clone, Debug)]
    pub struct HttpFetcher {
        config: HttpFetcherConfig,
        http: Client,
    }

    impl HttpFetcher {
        /// Build a client from `config`.
        ///
        /// # Errors
        ///
        /// [`FetchError::Transport`] when the TLS backend or client cannot
        /// be initialised.
        pub fn new(config: HttpFetcherConfig) -> Result<Self, FetchError> {
            let http = Client::builder()
                .timeout(Duration::from_millis(config.timeout_ms))
                .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
                .user_agent(config.user_agent.clone())
                .build()
                .map_err(|err| FetchError::Transport {
                    url: config.base_url.clone().unwrap_or_default(),
                    message: err.to_string(),
                })?;
            Ok(Self { config, http })
        }

        /// Settings in use.
        #[must_use]
        pub fn config(&self) -> &HttpFetcherConfig {
            &self.config
        }
    }

    impl Fetcher for HttpFetcher {
        fn fetch_json(&self, url: &str) -> Result<Json, FetchError> {
            let url = self.config.resolve(url);
            let response = self
                .http
                .get(&url)
                .send()
                .map_err(|err| FetchError::Transport {
                    url: url.clone(),
                    message: err.to_string(),
                })?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    url,
                    status: status.as_u16(),
                });
            }
            response.json::<Json>().map_err(|err| FetchError::Decode {
                url,
                message: err.to_string(),
            })
        }
    }
}
