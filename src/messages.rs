/// Cross-context message catalogue of the extension
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FormErrors;
use crate::model::{Activity, BubbleState, PopupSnapshot, Service, TabInfo, TimedActivity};
use crate::settings::{Settings, StorageChange};

/// Requests handled by the background coordinator (popup or icon → background)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum BackgroundMessage {
    TogglePopup,
    ClosePopup,
    #[serde(rename_all = "camelCase")]
    CreateActivity {
        activity: Activity,
        service: Option<Service>,
        popup_id: Option<Uuid>,
    },
    #[serde(rename_all = "camelCase")]
    StopTimer {
        timed_activity: TimedActivity,
        service: Option<Service>,
    },
    OpenOptions,
    OpenExtensions,
    Track {
        seconds: u64,
        billable: bool,
        description: String,
    },
}

/// Messages to a tab's content script
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ContentMessage {
    RequestService,
    ClosePopup,
    OpenPopup(PopupSnapshot),
    ShowBubble(BubbleState),
    TabUpdated { tab: TabInfo },
    SettingsChanged { settings: Settings },
}

impl ContentMessage {
    pub fn name(&self) -> &'static str {
        match self {
            ContentMessage::RequestService => "requestService",
            ContentMessage::ClosePopup => "closePopup",
            ContentMessage::OpenPopup(_) => "openPopup",
            ContentMessage::ShowBubble(_) => "showBubble",
            ContentMessage::TabUpdated { .. } => "tabUpdated",
            ContentMessage::SettingsChanged { .. } => "settingsChanged",
        }
    }
}

/// Answer of a content script to `requestService`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceReport {
    pub service: Option<Service>,
    pub timed_activity: Option<TimedActivity>,
    pub popup_open: bool,
}

/// Messages to the popup frame of a tab
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum PopupMessage {
    #[serde(rename_all = "camelCase")]
    SetFormErrors {
        popup_id: Option<Uuid>,
        errors: FormErrors,
    },
}

/// Browser events the background subscribes to once at startup
#[derive(Debug, Clone, PartialEq)]
pub enum BrowserEvent {
    TabUpdated(TabInfo),
    ActionClicked(TabInfo),
    StorageChanged(StorageChange),
}
