/// Collaborator interfaces of the background coordinator.
///
/// Everything runs on the single wasm thread, so none of these futures are `Send`.
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use url::Url;

use crate::error::{ApiError, BridgeError, TransportError};
use crate::messages::{ContentMessage, PopupMessage, ServiceReport};
use crate::model::{
    ActivitiesStatus, Activity, ProjectsResponse, RecordedActivity, Schedule, Service, TabInfo,
    TimedActivity,
};
use crate::settings::Settings;

/// The browser extension runtime: tabs, messaging and the clock
#[async_trait(?Send)]
pub trait ExtensionRuntime {
    async fn current_tab(&self) -> Result<Option<TabInfo>, BridgeError>;

    async fn all_tabs(&self) -> Result<Vec<TabInfo>, BridgeError>;

    /// Ask the content script what it knows; `None` when nothing answers
    async fn request_service(&self, tab_id: i32) -> Result<Option<ServiceReport>, BridgeError>;

    async fn send_to_content(&self, tab_id: i32, message: ContentMessage) -> Result<(), BridgeError>;

    async fn send_to_popup(&self, tab_id: i32, message: PopupMessage) -> Result<(), BridgeError>;

    async fn create_tab(&self, url: &str) -> Result<(), BridgeError>;

    fn is_chrome(&self) -> bool;

    fn runtime_id(&self) -> String;

    fn extension_url(&self, path: &str) -> String;

    fn now_millis(&self) -> i64;

    fn today(&self) -> NaiveDate;

    async fn sleep(&self, duration: Duration);
}

#[async_trait(?Send)]
pub trait SettingsProvider {
    async fn load(&self) -> Result<Settings, BridgeError>;
}

/// The MOCO REST API as seen by the extension
#[async_trait(?Send)]
pub trait ApiClient {
    async fn activities_status(&self, service: Option<&Service>) -> Result<ActivitiesStatus, ApiError>;

    async fn create_activity(&self, activity: &Activity) -> Result<(), ApiError>;

    async fn stop_timer(&self, timed_activity: &TimedActivity) -> Result<(), ApiError>;

    async fn projects(&self) -> Result<ProjectsResponse, ApiError>;

    async fn activities(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<RecordedActivity>, ApiError>;

    async fn schedules(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Schedule>, ApiError>;
}

/// Builds a client from the settings read for the current invocation
pub trait ApiClientFactory {
    fn connect(&self, settings: &Settings) -> Box<dyn ApiClient>;
}

impl<F> ApiClientFactory for F
where
    F: Fn(&Settings) -> Box<dyn ApiClient>,
{
    fn connect(&self, settings: &Settings) -> Box<dyn ApiClient> {
        self(settings)
    }
}

/// An outgoing HTTP call; the JSON body is encoded by the transport
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

#[async_trait(?Send)]
pub trait HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}
