/// Forwarding tracked time to the third-party tool the popup was opened on
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{select, Either};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::error::{BridgeError, TrackError, TransportError};
use crate::ports::{ExtensionRuntime, HttpRequest, HttpTransport};

/// Values read from the active page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PageValue {
    /// `data-task-id` of the task currently shown
    ActiveTaskId,
    /// First team key of the `cuHandshake` localStorage entry
    TeamId,
    /// API base URL of that team's app environment
    ApiUrl,
    /// `id_token` from localStorage
    IdToken,
}

#[async_trait(?Send)]
pub trait PageScraper {
    async fn evaluate_in_tab(&self, tab_id: i32, value: PageValue) -> Result<Option<String>, BridgeError>;

    async fn cookie(&self, url: &str, name: &str) -> Result<Option<String>, BridgeError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub seconds: u64,
    pub billable: bool,
    pub description: String,
}

#[async_trait(?Send)]
pub trait ThirdPartyTimeClient {
    async fn track(&self, tab_id: i32, entry: &TimeEntry) -> Result<(), TrackError>;
}

/// Where time entries are posted
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEndpoint {
    /// The API URL the page itself talks to
    PageApiUrl,
    /// A fixed base such as `https://app.clickup.com/scheduling/v1`
    Fixed(String),
}

/// Where the bearer token comes from
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerAuth {
    Cookie { url: String, name: String },
    LocalStorageToken,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    pub endpoint: TrackerEndpoint,
    pub auth: TrackerAuth,
    pub timeout: Option<Duration>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            endpoint: TrackerEndpoint::PageApiUrl,
            auth: TrackerAuth::Cookie {
                url: "https://app.clickup.com".to_string(),
                name: "cu_jwt".to_string(),
            },
            timeout: None,
        }
    }
}

pub struct ClickupTracker {
    scraper: Rc<dyn PageScraper>,
    transport: Rc<dyn HttpTransport>,
    runtime: Rc<dyn ExtensionRuntime>,
    config: TrackerConfig,
}

impl ClickupTracker {
    pub fn new(
        scraper: Rc<dyn PageScraper>,
        transport: Rc<dyn HttpTransport>,
        runtime: Rc<dyn ExtensionRuntime>,
        config: TrackerConfig,
    ) -> Self {
        ClickupTracker {
            scraper,
            transport,
            runtime,
            config,
        }
    }

    async fn page_value(&self, tab_id: i32, value: PageValue) -> Result<String, TrackError> {
        self.scraper
            .evaluate_in_tab(tab_id, value)
            .await?
            .filter(|value| !value.is_empty())
            .ok_or(TrackError::MissingPageValue(value))
    }

    async fn authorization(&self, tab_id: i32) -> Result<HeaderValue, TrackError> {
        let token = match &self.config.auth {
            TrackerAuth::Cookie { url, name } => self
                .scraper
                .cookie(url, name)
                .await?
                .ok_or(TrackError::MissingPageValue(PageValue::IdToken))?,
            TrackerAuth::LocalStorageToken => self.page_value(tab_id, PageValue::IdToken).await?,
        };
        let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(TransportError::from)?;
        Ok(value)
    }

    async fn entries_url(&self, tab_id: i32, team_id: &str) -> Result<Url, TrackError> {
        let base = match &self.config.endpoint {
            TrackerEndpoint::PageApiUrl => self.page_value(tab_id, PageValue::ApiUrl).await?,
            TrackerEndpoint::Fixed(base) => base.clone(),
        };
        let url = format!("{}/team/{}/time_entries/", base.trim_end_matches('/'), team_id);
        Ok(Url::parse(&url)?)
    }
}

#[async_trait(?Send)]
impl ThirdPartyTimeClient for ClickupTracker {
    async fn track(&self, tab_id: i32, entry: &TimeEntry) -> Result<(), TrackError> {
        let task_id = self.page_value(tab_id, PageValue::ActiveTaskId).await?;
        let team_id = self.page_value(tab_id, PageValue::TeamId).await?;
        let url = self.entries_url(tab_id, &team_id).await?;
        let authorization = self.authorization(tab_id).await?;

        let now = self.runtime.now_millis();
        let duration = entry.seconds as i64 * 1000;
        let body = json!({
            "start": now - duration,
            "end": now,
            "duration": duration,
            "tid": task_id,
            "stop": now,
            "billable": entry.billable,
            "description": entry.description,
            "via": "manual",
        });

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, authorization);
        let request = HttpRequest {
            method: Method::POST,
            url,
            headers,
            body: Some(body),
        };

        log::debug!("forwarding {}s to {}", entry.seconds, request.url);
        let send = self.transport.send(request);
        let response = match self.config.timeout {
            None => send.await?,
            Some(limit) => match select(send, self.runtime.sleep(limit)).await {
                Either::Left((response, _)) => response?,
                Either::Right(_) => return Err(TrackError::Timeout(limit.as_millis())),
            },
        };

        if response.status.is_success() {
            Ok(())
        } else {
            Err(TrackError::Status(response.status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRuntime, FakeScraper, FakeTransport};
    use futures::executor::block_on;

    fn entry() -> TimeEntry {
        TimeEntry {
            seconds: 90,
            billable: true,
            description: "PROJ-1 review".to_string(),
        }
    }

    fn tracker(transport: Rc<FakeTransport>, config: TrackerConfig) -> ClickupTracker {
        let scraper = FakeScraper::new()
            .with(PageValue::ActiveTaskId, "86abc")
            .with(PageValue::TeamId, "9001")
            .with(PageValue::ApiUrl, "https://prod-eu.clickup.com/v1")
            .with(PageValue::IdToken, "page-token")
            .with_cookie("cu_jwt", "cookie-token");
        ClickupTracker::new(Rc::new(scraper), transport, Rc::new(FakeRuntime::new()), config)
    }

    #[test]
    fn test_track_with_page_api_url() {
        let transport = FakeTransport::responding(200, "{}");

        block_on(tracker(transport.clone(), TrackerConfig::default()).track(1, &entry())).unwrap();

        let requests = transport.requests.borrow();
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(requests[0].url.as_str(), "https://prod-eu.clickup.com/v1/team/9001/time_entries/");
        assert_eq!(requests[0].headers[AUTHORIZATION], "Bearer cookie-token");
        let body = requests[0].body.as_ref().unwrap();
        assert_eq!(body["duration"], 90_000);
        assert_eq!(body["tid"], "86abc");
        assert_eq!(body["via"], "manual");
        assert_eq!(body["end"].as_i64().unwrap() - body["start"].as_i64().unwrap(), 90_000);
    }

    #[test]
    fn test_track_with_fixed_endpoint_and_local_token() {
        let transport = FakeTransport::responding(200, "{}");
        let config = TrackerConfig {
            endpoint: TrackerEndpoint::Fixed("https://app.clickup.com/scheduling/v1/".to_string()),
            auth: TrackerAuth::LocalStorageToken,
            timeout: Some(Duration::from_millis(5000)),
        };

        block_on(tracker(transport.clone(), config).track(1, &entry())).unwrap();

        let requests = transport.requests.borrow();
        assert_eq!(
            requests[0].url.as_str(),
            "https://app.clickup.com/scheduling/v1/team/9001/time_entries/"
        );
        assert_eq!(requests[0].headers[AUTHORIZATION], "Bearer page-token");
    }

    #[test]
    fn test_track_times_out() {
        let transport = FakeTransport::hanging();
        let config = TrackerConfig {
            timeout: Some(Duration::from_millis(5000)),
            ..TrackerConfig::default()
        };

        let err = block_on(tracker(transport, config).track(1, &entry())).unwrap_err();

        assert!(matches!(err, TrackError::Timeout(5000)));
    }

    #[test]
    fn test_missing_task_id() {
        let scraper = FakeScraper::new().with(PageValue::TeamId, "9001");
        let tracker = ClickupTracker::new(
            Rc::new(scraper),
            FakeTransport::responding(200, "{}"),
            Rc::new(FakeRuntime::new()),
            TrackerConfig::default(),
        );

        let err = block_on(tracker.track(1, &entry())).unwrap_err();

        assert!(matches!(err, TrackError::MissingPageValue(PageValue::ActiveTaskId)));
    }

    #[test]
    fn test_error_status() {
        let transport = FakeTransport::responding(500, "");

        let err = block_on(tracker(transport, TrackerConfig::default()).track(1, &entry())).unwrap_err();

        assert!(matches!(err, TrackError::Status(500)));
    }

    #[test]
    fn test_transport_failure() {
        let transport = FakeTransport::failing();

        let err = block_on(tracker(transport, TrackerConfig::default()).track(1, &entry())).unwrap_err();

        assert!(matches!(err, TrackError::Transport(_)));
    }
}
