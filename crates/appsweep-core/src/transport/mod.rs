//! Remote store API access.
//!
//! The orchestrator only sees the [`Transport`] trait: one call per attempt,
//! returning a tagged [`FetchOutcome`]. "No such id" is a value, never an
//! error. [`CurlTransport`] implements it over libcurl for the store's
//! app-list and app-details endpoints.

mod http;
mod parse;

pub use parse::{parse_app_list, parse_details, parse_existence, CatalogEntry};

use std::time::Duration;

use url::Url;

use crate::retry::{FetchOutcome, TransportError};
use crate::types::AppId;

/// Per-attempt access to the remote catalog.
pub trait Transport {
    /// Cheap existence check. `Success` carries no meaningful payload.
    fn fetch_existence(&self, id: AppId) -> Result<FetchOutcome, TransportError>;

    /// Full detail payload for `id`.
    fn fetch_details(&self, id: AppId) -> Result<FetchOutcome, TransportError>;
}

/// Endpoints and timeouts for [`CurlTransport`].
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub app_list_url: String,
    /// Details endpoint; the id is appended as the `appids` query parameter.
    pub app_details_url: String,
    pub request_timeout: Duration,
    pub existence_timeout: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            app_list_url: "https://api.steampowered.com/ISteamApps/GetAppList/v2/".to_string(),
            app_details_url: "https://store.steampowered.com/api/appdetails".to_string(),
            request_timeout: Duration::from_secs(30),
            existence_timeout: Duration::from_secs(10),
        }
    }
}

/// Blocking libcurl client. Call from `spawn_blocking` when used from async code.
#[derive(Debug, Clone)]
pub struct CurlTransport {
    app_list_url: Url,
    app_details_url: Url,
    request_timeout: Duration,
    existence_timeout: Duration,
}

impl CurlTransport {
    pub fn new(settings: &TransportSettings) -> Result<Self, TransportError> {
        Ok(Self {
            app_list_url: Url::parse(&settings.app_list_url)?,
            app_details_url: Url::parse(&settings.app_details_url)?,
            request_timeout: settings.request_timeout,
            existence_timeout: settings.existence_timeout,
        })
    }

    /// Full catalog listing (`applist.apps`). Not retried; callers decide.
    pub fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>, TransportError> {
        let resp = http::get(self.app_list_url.as_str(), self.request_timeout)?;
        resp.ensure_success()?;
        parse_app_list(&resp.body)
    }

    fn details_url(&self, id: AppId) -> Url {
        let mut url = self.app_details_url.clone();
        url.query_pairs_mut().append_pair("appids", &id.to_string());
        url
    }
}

impl Transport for CurlTransport {
    fn fetch_existence(&self, id: AppId) -> Result<FetchOutcome, TransportError> {
        let resp = http::get(self.details_url(id).as_str(), self.existence_timeout)?;
        resp.ensure_success()?;
        parse_existence(id, &resp.body)
    }

    fn fetch_details(&self, id: AppId) -> Result<FetchOutcome, TransportError> {
        let resp = http::get(self.details_url(id).as_str(), self.request_timeout)?;
        resp.ensure_success()?;
        parse_details(id, &resp.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn details_url_appends_id() {
        let t = CurlTransport::new(&TransportSettings::default()).unwrap();
        assert_eq!(
            t.details_url(570).as_str(),
            "https://store.steampowered.com/api/appdetails?appids=570"
        );
    }

    #[test]
    fn details_url_keeps_existing_query() {
        let settings = TransportSettings {
            app_details_url: "http://127.0.0.1:9/api/appdetails?cc=us".to_string(),
            ..TransportSettings::default()
        };
        let t = CurlTransport::new(&settings).unwrap();
        assert_eq!(
            t.details_url(10).as_str(),
            "http://127.0.0.1:9/api/appdetails?cc=us&appids=10"
        );
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let settings = TransportSettings {
            app_list_url: "not a url".to_string(),
            ..TransportSettings::default()
        };
        assert!(matches!(
            CurlTransport::new(&settings),
            Err(TransportError::Url(_))
        ));
    }
}
