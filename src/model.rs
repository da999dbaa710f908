/// Data structures shared by the background coordinator, the popup and the API client
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::ErrorType;
use crate::projects::ProjectGroup;

/// Schemes of pages that belong to the browser or to an extension
const BROWSER_SCHEMES: &[&str] = &[
    "about",
    "brave",
    "chrome",
    "chrome-extension",
    "edge",
    "moz-extension",
    "opera",
    "safari-web-extension",
    "view-source",
    "vivaldi",
];

/// Information about a browser tab
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TabInfo {
    pub id: i32,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl TabInfo {
    pub fn new(id: i32, url: impl Into<String>) -> TabInfo {
        TabInfo {
            id,
            url: url.into(),
            title: String::new(),
            status: None,
        }
    }

    /// Internal browser pages and extension pages never get a popup.
    /// Unparseable URLs (e.g. a tab that is still blank) count as internal.
    pub fn is_browser_tab(&self) -> bool {
        match Url::parse(&self.url) {
            Ok(url) => BROWSER_SCHEMES.contains(&url.scheme()),
            Err(_) => true,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status.as_deref() == Some("complete")
    }
}

/// The third-party page a popup session was opened from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub project_label: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A timer currently running on the MOCO side
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TimedActivity {
    pub id: u64,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub seconds: u64,
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub remote_service: Option<String>,
    #[serde(default)]
    pub assignment_name: Option<String>,
    #[serde(default)]
    pub task_name: Option<String>,
    #[serde(default)]
    pub timer_started_at: Option<String>,
}

impl TimedActivity {
    pub fn belongs_to(&self, service: &Service) -> bool {
        self.service_id.as_deref() == Some(service.id.as_str())
    }
}

/// Response of the activities status endpoint for one service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ActivitiesStatus {
    #[serde(default)]
    pub seconds: u64,
    #[serde(default)]
    pub timed_activity: Option<TimedActivity>,
    /// Project and task last booked on this service
    #[serde(default)]
    pub last_project_id: Option<u64>,
    #[serde(default)]
    pub last_task_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub billable: bool,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub intern: bool,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// Projects endpoint payload, including the user's last selections
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProjectsResponse {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub last_project_id: Option<u64>,
    #[serde(default)]
    pub last_task_id: Option<u64>,
}

/// Project and task last used, per service and per user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RememberedSelection {
    pub service_last_project_id: Option<u64>,
    pub service_last_task_id: Option<u64>,
    pub user_last_project_id: Option<u64>,
    pub user_last_task_id: Option<u64>,
}

/// An already booked activity, shown in the calendar
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordedActivity {
    pub id: u64,
    pub date: String,
    #[serde(default)]
    pub seconds: u64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub billable: bool,
}

/// Absence or holiday entry, shown in the calendar
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schedule {
    pub date: String,
    #[serde(default)]
    pub am: bool,
    #[serde(default)]
    pub pm: bool,
    #[serde(default)]
    pub comment: Option<String>,
}

/// A fully defaulted activity, ready to be created
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Activity {
    pub assignment_id: Option<u64>,
    pub task_id: Option<u64>,
    pub billable: bool,
    pub hours: String,
    pub seconds: Option<u64>,
    pub description: String,
    pub date: String,
    pub tag: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub custom_type: String,
    pub remote_service: Option<String>,
    pub remote_id: Option<String>,
    pub remote_url: Option<String>,
}

/// Status shown in the page bubble
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BubbleState {
    pub booked_seconds: u64,
    pub timed_activity: Option<TimedActivity>,
    #[serde(rename = "settingTimeTrackingHHMM")]
    pub setting_time_tracking_hhmm: bool,
    pub service: Option<Service>,
}

/// Everything a popup renders during its lifetime
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PopupSnapshot {
    pub popup_id: Uuid,
    pub service: Option<Service>,
    pub subdomain: String,
    pub activities: Vec<RecordedActivity>,
    pub schedules: Vec<Schedule>,
    pub projects: Vec<ProjectGroup>,
    pub remembered: RememberedSelection,
    pub timed_activity: Option<TimedActivity>,
    pub from_date: String,
    pub to_date: String,
    #[serde(rename = "settingTimeTrackingHHMM")]
    pub setting_time_tracking_hhmm: bool,
    pub error_type: Option<ErrorType>,
    pub error_message: Option<String>,
}

impl PopupSnapshot {
    pub fn new(service: Option<Service>, subdomain: String, from_date: String, to_date: String) -> Self {
        PopupSnapshot {
            popup_id: Uuid::new_v4(),
            service,
            subdomain,
            activities: Vec::new(),
            schedules: Vec::new(),
            projects: Vec::new(),
            remembered: RememberedSelection::default(),
            timed_activity: None,
            from_date,
            to_date,
            setting_time_tracking_hhmm: true,
            error_type: None,
            error_message: None,
        }
    }
}
