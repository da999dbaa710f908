//! In-memory collaborators shared by the unit tests
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::HeaderValue;
use reqwest::StatusCode;

use crate::error::{ApiError, BridgeError, TrackError, TransportError};
use crate::messages::{ContentMessage, PopupMessage, ServiceReport};
use crate::model::{
    ActivitiesStatus, Activity, ProjectsResponse, RecordedActivity, Schedule, Service, TabInfo,
    TimedActivity,
};
use crate::ports::{
    ApiClient, ApiClientFactory, ExtensionRuntime, HttpRequest, HttpResponse, HttpTransport,
    SettingsProvider,
};
use crate::settings::Settings;
use crate::tracker::{PageValue, PageScraper, ThirdPartyTimeClient, TimeEntry};

pub const NOW_MILLIS: i64 = 1_730_110_000_000;

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 10, 28).unwrap()
}

pub struct FakeRuntime {
    pub current: RefCell<Option<TabInfo>>,
    pub tabs: RefCell<Vec<TabInfo>>,
    pub report: RefCell<Option<ServiceReport>>,
    pub content: RefCell<Vec<(i32, ContentMessage)>>,
    pub popup: RefCell<Vec<(i32, PopupMessage)>>,
    pub created_tabs: RefCell<Vec<String>>,
    pub chrome: Cell<bool>,
}

impl FakeRuntime {
    pub fn new() -> FakeRuntime {
        FakeRuntime {
            current: RefCell::new(None),
            tabs: RefCell::new(Vec::new()),
            report: RefCell::new(None),
            content: RefCell::new(Vec::new()),
            popup: RefCell::new(Vec::new()),
            created_tabs: RefCell::new(Vec::new()),
            chrome: Cell::new(true),
        }
    }

    pub fn with_current_tab(self, tab: TabInfo) -> FakeRuntime {
        *self.current.borrow_mut() = Some(tab.clone());
        self.tabs.borrow_mut().push(tab);
        self
    }

    pub fn content_names(&self) -> Vec<&'static str> {
        self.content.borrow().iter().map(|(_, m)| m.name()).collect()
    }
}

#[async_trait(?Send)]
impl ExtensionRuntime for FakeRuntime {
    async fn current_tab(&self) -> Result<Option<TabInfo>, BridgeError> {
        Ok(self.current.borrow().clone())
    }

    async fn all_tabs(&self) -> Result<Vec<TabInfo>, BridgeError> {
        Ok(self.tabs.borrow().clone())
    }

    async fn request_service(&self, _tab_id: i32) -> Result<Option<ServiceReport>, BridgeError> {
        Ok(self.report.borrow().clone())
    }

    async fn send_to_content(&self, tab_id: i32, message: ContentMessage) -> Result<(), BridgeError> {
        self.content.borrow_mut().push((tab_id, message));
        Ok(())
    }

    async fn send_to_popup(&self, tab_id: i32, message: PopupMessage) -> Result<(), BridgeError> {
        self.popup.borrow_mut().push((tab_id, message));
        Ok(())
    }

    async fn create_tab(&self, url: &str) -> Result<(), BridgeError> {
        self.created_tabs.borrow_mut().push(url.to_string());
        Ok(())
    }

    fn is_chrome(&self) -> bool {
        self.chrome.get()
    }

    fn runtime_id(&self) -> String {
        "abcdef".to_string()
    }

    fn extension_url(&self, path: &str) -> String {
        format!("moz-extension://abcdef/{}", path)
    }

    fn now_millis(&self) -> i64 {
        NOW_MILLIS
    }

    fn today(&self) -> NaiveDate {
        today()
    }

    async fn sleep(&self, _duration: Duration) {}
}

pub struct FakeSettings(pub RefCell<Settings>);

impl FakeSettings {
    pub fn configured() -> FakeSettings {
        FakeSettings(RefCell::new(Settings::new("secret", "acme")))
    }
}

#[async_trait(?Send)]
impl SettingsProvider for FakeSettings {
    async fn load(&self) -> Result<Settings, BridgeError> {
        Ok(self.0.borrow().clone())
    }
}

/// Scripted API responses plus a log of the calls made
pub struct FakeApi {
    pub status: RefCell<Result<ActivitiesStatus, ApiError>>,
    /// Answers for successive status calls, taken before `status`
    pub status_sequence: RefCell<VecDeque<ActivitiesStatus>>,
    pub create: RefCell<Result<(), ApiError>>,
    pub stop: RefCell<Result<(), ApiError>>,
    pub projects: RefCell<Result<ProjectsResponse, ApiError>>,
    pub calls: RefCell<Vec<String>>,
    /// How often each status call yields to the executor before answering
    pub status_yields: RefCell<VecDeque<usize>>,
}

impl FakeApi {
    pub fn new() -> Rc<FakeApi> {
        Rc::new(FakeApi {
            status: RefCell::new(Ok(ActivitiesStatus::default())),
            status_sequence: RefCell::new(VecDeque::new()),
            create: RefCell::new(Ok(())),
            stop: RefCell::new(Ok(())),
            projects: RefCell::new(Ok(ProjectsResponse::default())),
            calls: RefCell::new(Vec::new()),
            status_yields: RefCell::new(VecDeque::new()),
        })
    }

    pub fn called(&self, name: &str) -> bool {
        self.calls.borrow().iter().any(|c| c == name)
    }
}

pub struct FakeApiFactory(pub Rc<FakeApi>);

impl ApiClientFactory for FakeApiFactory {
    fn connect(&self, _settings: &Settings) -> Box<dyn ApiClient> {
        Box::new(FakeApiClient(self.0.clone()))
    }
}

struct FakeApiClient(Rc<FakeApi>);

impl FakeApiClient {
    fn record(&self, name: &str) {
        self.0.calls.borrow_mut().push(name.to_string());
    }
}

#[async_trait(?Send)]
impl ApiClient for FakeApiClient {
    async fn activities_status(&self, _service: Option<&Service>) -> Result<ActivitiesStatus, ApiError> {
        self.record("activities_status");
        let answer = self.0.status_sequence.borrow_mut().pop_front();
        let yields = self.0.status_yields.borrow_mut().pop_front().unwrap_or(0);
        for _ in 0..yields {
            YieldNow(false).await;
        }
        match answer {
            Some(status) => Ok(status),
            None => self.0.status.borrow().clone(),
        }
    }

    async fn create_activity(&self, _activity: &Activity) -> Result<(), ApiError> {
        self.record("create_activity");
        self.0.create.borrow().clone()
    }

    async fn stop_timer(&self, _timed_activity: &TimedActivity) -> Result<(), ApiError> {
        self.record("stop_timer");
        self.0.stop.borrow().clone()
    }

    async fn projects(&self) -> Result<ProjectsResponse, ApiError> {
        self.record("projects");
        self.0.projects.borrow().clone()
    }

    async fn activities(&self, _from: NaiveDate, _to: NaiveDate) -> Result<Vec<RecordedActivity>, ApiError> {
        self.record("activities");
        Ok(Vec::new())
    }

    async fn schedules(&self, _from: NaiveDate, _to: NaiveDate) -> Result<Vec<Schedule>, ApiError> {
        self.record("schedules");
        Ok(Vec::new())
    }
}

/// Returns `Pending` once, waking itself so the executor polls others first
struct YieldNow(bool);

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            Poll::Ready(())
        } else {
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

enum TransportMode {
    Reply(StatusCode, String),
    Hang,
    Fail,
}

pub struct FakeTransport {
    pub requests: RefCell<Vec<HttpRequest>>,
    mode: TransportMode,
}

impl FakeTransport {
    fn with_mode(mode: TransportMode) -> Rc<FakeTransport> {
        Rc::new(FakeTransport {
            requests: RefCell::new(Vec::new()),
            mode,
        })
    }

    pub fn responding(status: u16, body: &str) -> Rc<FakeTransport> {
        let status = StatusCode::from_u16(status).unwrap();
        FakeTransport::with_mode(TransportMode::Reply(status, body.to_string()))
    }

    /// A transport whose requests never complete
    pub fn hanging() -> Rc<FakeTransport> {
        FakeTransport::with_mode(TransportMode::Hang)
    }

    /// A transport whose requests fail before any response arrives
    pub fn failing() -> Rc<FakeTransport> {
        FakeTransport::with_mode(TransportMode::Fail)
    }
}

#[async_trait(?Send)]
impl HttpTransport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.borrow_mut().push(request);
        match &self.mode {
            TransportMode::Reply(status, body) => Ok(HttpResponse {
                status: *status,
                body: body.clone(),
            }),
            TransportMode::Hang => futures::future::pending().await,
            TransportMode::Fail => Err(HeaderValue::from_str("\n").unwrap_err().into()),
        }
    }
}

pub struct FakeScraper {
    values: HashMap<PageValue, String>,
    cookies: HashMap<String, String>,
}

impl FakeScraper {
    pub fn new() -> FakeScraper {
        FakeScraper {
            values: HashMap::new(),
            cookies: HashMap::new(),
        }
    }

    pub fn with(mut self, key: PageValue, value: &str) -> FakeScraper {
        self.values.insert(key, value.to_string());
        self
    }

    pub fn with_cookie(mut self, name: &str, value: &str) -> FakeScraper {
        self.cookies.insert(name.to_string(), value.to_string());
        self
    }
}

#[async_trait(?Send)]
impl PageScraper for FakeScraper {
    async fn evaluate_in_tab(&self, _tab_id: i32, value: PageValue) -> Result<Option<String>, BridgeError> {
        Ok(self.values.get(&value).cloned())
    }

    async fn cookie(&self, _url: &str, name: &str) -> Result<Option<String>, BridgeError> {
        Ok(self.cookies.get(name).cloned())
    }
}

/// Records forwarded entries instead of calling a third-party API
pub struct FakeTracker {
    pub entries: RefCell<Vec<(i32, TimeEntry)>>,
}

impl FakeTracker {
    pub fn new() -> FakeTracker {
        FakeTracker {
            entries: RefCell::new(Vec::new()),
        }
    }
}

#[async_trait(?Send)]
impl ThirdPartyTimeClient for FakeTracker {
    async fn track(&self, tab_id: i32, entry: &TimeEntry) -> Result<(), TrackError> {
        self.entries.borrow_mut().push((tab_id, entry.clone()));
        Ok(())
    }
}
