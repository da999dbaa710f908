/// Background coordinator: reacts to browser events and popup requests,
/// talks to the MOCO API and decides when a tab's popup is shown.
///
/// Nothing is cached between invocations; every handler reads the settings
/// and the remote state fresh.
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::{ApiError, BridgeError, ErrorType};
use crate::messages::{BackgroundMessage, BrowserEvent, ContentMessage, PopupMessage};
use crate::model::{
    Activity, BubbleState, PopupSnapshot, RememberedSelection, Service, TabInfo, TimedActivity,
};
use crate::ports::{ApiClient, ApiClientFactory, ExtensionRuntime, SettingsProvider};
use crate::projects::group_projects;
use crate::settings::{Settings, StorageChange};
use crate::time_format::{format_date, week_bounds};
use crate::tracker::{ThirdPartyTimeClient, TimeEntry};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoordinatorConfig {
    /// Discard bubble refreshes overtaken by a newer one for the same tab.
    /// Off means the last response to arrive wins.
    pub fence_resets: bool,
}

/// Latest bubble refresh issued per tab.
///
/// Sequence numbers are unique across tabs, and a tab's entry is dropped as
/// soon as its latest refresh finishes.
#[derive(Debug, Default)]
pub struct ResetFence {
    last: Cell<u64>,
    issued: RefCell<HashMap<i32, u64>>,
}

impl ResetFence {
    pub fn issue(&self, tab_id: i32) -> u64 {
        let seq = self.last.get() + 1;
        self.last.set(seq);
        self.issued.borrow_mut().insert(tab_id, seq);
        seq
    }

    pub fn is_current(&self, tab_id: i32, seq: u64) -> bool {
        self.issued.borrow().get(&tab_id).copied() == Some(seq)
    }

    /// Settle a refresh; true when no newer one was issued for the tab
    pub fn finish(&self, tab_id: i32, seq: u64) -> bool {
        let current = self.is_current(tab_id, seq);
        if current {
            self.issued.borrow_mut().remove(&tab_id);
        }
        current
    }

    /// Tabs with a refresh in flight
    pub fn pending(&self) -> usize {
        self.issued.borrow().len()
    }
}

/// Input of a bubble refresh after a create or stop succeeded
#[derive(Debug, Clone)]
pub struct ResetBubble {
    pub tab: TabInfo,
    pub settings: Settings,
    pub service: Option<Service>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// The timer of this service still runs; the popup shows it
    Opened,
    Closed,
    /// A newer refresh for the tab was issued meanwhile
    Stale,
    /// The status request failed; the popup was left as it was
    Failed,
}

#[derive(Clone)]
pub struct Coordinator {
    runtime: Rc<dyn ExtensionRuntime>,
    settings: Rc<dyn SettingsProvider>,
    api: Rc<dyn ApiClientFactory>,
    tracker: Rc<dyn ThirdPartyTimeClient>,
    config: CoordinatorConfig,
    fence: Rc<ResetFence>,
}

impl Coordinator {
    pub fn new(
        runtime: Rc<dyn ExtensionRuntime>,
        settings: Rc<dyn SettingsProvider>,
        api: Rc<dyn ApiClientFactory>,
        tracker: Rc<dyn ThirdPartyTimeClient>,
        config: CoordinatorConfig,
    ) -> Self {
        Coordinator {
            runtime,
            settings,
            api,
            tracker,
            config,
            fence: Rc::new(ResetFence::default()),
        }
    }

    pub async fn handle_event(&self, event: BrowserEvent) {
        let result = match event {
            BrowserEvent::TabUpdated(tab) => self.tab_updated(tab).await,
            BrowserEvent::ActionClicked(tab) => self.toggle_popup(Some(tab)).await,
            BrowserEvent::StorageChanged(change) => self.settings_changed(change).await,
        };
        if let Err(err) = result {
            log::error!("browser event failed: {}", err);
        }
    }

    pub async fn handle_message(&self, message: BackgroundMessage) {
        let result = match message {
            BackgroundMessage::TogglePopup => self.toggle_popup(None).await,
            BackgroundMessage::ClosePopup => self.close_popup().await,
            BackgroundMessage::CreateActivity {
                activity,
                service,
                popup_id,
            } => self.create_activity(activity, service, popup_id).await,
            BackgroundMessage::StopTimer {
                timed_activity,
                service,
            } => self.stop_timer(timed_activity, service).await,
            BackgroundMessage::OpenOptions => self.open_options().await,
            BackgroundMessage::OpenExtensions => self.open_extensions().await,
            BackgroundMessage::Track {
                seconds,
                billable,
                description,
            } => {
                let entry = TimeEntry {
                    seconds,
                    billable,
                    description,
                };
                self.track(entry).await
            }
        };
        if let Err(err) = result {
            log::error!("background message failed: {}", err);
        }
    }

    /// Tell the content script of a freshly loaded page about it
    pub async fn tab_updated(&self, tab: TabInfo) -> Result<(), BridgeError> {
        if tab.is_browser_tab() || !tab.is_complete() {
            return Ok(());
        }
        self.runtime
            .send_to_content(tab.id, ContentMessage::TabUpdated { tab: tab.clone() })
            .await
    }

    /// Icon clicks pass their tab; popup requests act on the current tab
    pub async fn toggle_popup(&self, tab: Option<TabInfo>) -> Result<(), BridgeError> {
        let tab = match tab {
            Some(tab) => Some(tab),
            None => self.runtime.current_tab().await?,
        };
        let Some(tab) = tab.filter(|tab| !tab.is_browser_tab()) else {
            return Ok(());
        };

        let Some(report) = self.runtime.request_service(tab.id).await? else {
            log::debug!("no content script answered in tab {}", tab.id);
            return Ok(());
        };

        if report.popup_open {
            self.runtime.send_to_content(tab.id, ContentMessage::ClosePopup).await
        } else {
            self.open_popup(&tab, report.service).await
        }
    }

    pub async fn open_popup(&self, tab: &TabInfo, service: Option<Service>) -> Result<(), BridgeError> {
        let settings = self.settings.load().await?;
        self.show_popup(tab, &settings, service).await
    }

    async fn show_popup(&self, tab: &TabInfo, settings: &Settings, service: Option<Service>) -> Result<(), BridgeError> {
        let snapshot = self.load_snapshot(settings, service).await;
        self.runtime
            .send_to_content(tab.id, ContentMessage::OpenPopup(snapshot))
            .await
    }

    /// Build the popup's snapshot; read failures turn into an error state
    pub async fn load_snapshot(&self, settings: &Settings, service: Option<Service>) -> PopupSnapshot {
        let (from, to) = week_bounds(self.runtime.today());
        let mut snapshot = PopupSnapshot::new(service, settings.subdomain.clone(), format_date(from), format_date(to));
        snapshot.setting_time_tracking_hhmm = settings.setting_time_tracking_hhmm;

        if !settings.is_configured() {
            snapshot.error_type = Some(ErrorType::Unauthorized);
            return snapshot;
        }

        let api = self.api.connect(settings);
        if let Err(err) = fill_snapshot(api.as_ref(), &mut snapshot, from, to).await {
            log::warn!("loading popup data failed: {}", err);
            snapshot.error_type = Some(ErrorType::from(&err));
            snapshot.error_message = Some(err.to_string());
        }
        snapshot
    }

    /// Closing an already closed popup is harmless
    pub async fn close_popup(&self) -> Result<(), BridgeError> {
        match self.runtime.current_tab().await? {
            Some(tab) => self.runtime.send_to_content(tab.id, ContentMessage::ClosePopup).await,
            None => Ok(()),
        }
    }

    pub async fn create_activity(
        &self,
        activity: Activity,
        service: Option<Service>,
        popup_id: Option<Uuid>,
    ) -> Result<(), BridgeError> {
        let Some(tab) = self.runtime.current_tab().await? else {
            return Ok(());
        };
        let settings = self.settings.load().await?;
        let api = self.api.connect(&settings);

        match api.create_activity(&activity).await {
            Ok(()) => {
                self.reset_bubble(ResetBubble { tab, settings, service }).await?;
            }
            Err(ApiError::ValidationFailed(errors)) => {
                self.runtime
                    .send_to_popup(tab.id, PopupMessage::SetFormErrors { popup_id, errors })
                    .await?;
            }
            // TODO: surface write failures in the popup instead of only logging them
            Err(err) => log::warn!("creating activity failed: {}", err),
        }
        Ok(())
    }

    pub async fn stop_timer(&self, timed_activity: TimedActivity, service: Option<Service>) -> Result<(), BridgeError> {
        let Some(tab) = self.runtime.current_tab().await? else {
            return Ok(());
        };
        let settings = self.settings.load().await?;
        let api = self.api.connect(&settings);

        match api.stop_timer(&timed_activity).await {
            Ok(()) => {
                self.reset_bubble(ResetBubble { tab, settings, service }).await?;
            }
            Err(err) => log::debug!("stopping timer {} failed: {}", timed_activity.id, err),
        }
        Ok(())
    }

    /// Refresh the bubble, then keep the popup open only while the timer
    /// of this very service is running.
    pub async fn reset_bubble(&self, reset: ResetBubble) -> Result<ResetOutcome, BridgeError> {
        let ResetBubble { tab, settings, service } = reset;
        let ticket = self.config.fence_resets.then(|| self.fence.issue(tab.id));

        let api = self.api.connect(&settings);
        let status = api.activities_status(service.as_ref()).await;
        let current = ticket.is_none_or(|seq| self.fence.finish(tab.id, seq));

        let status = match status {
            Ok(status) => status,
            Err(err) => {
                log::warn!("refreshing bubble in tab {} failed: {}", tab.id, err);
                return Ok(ResetOutcome::Failed);
            }
        };

        if !current {
            log::debug!("dropping stale bubble refresh for tab {}", tab.id);
            return Ok(ResetOutcome::Stale);
        }

        let keep_open = match (&status.timed_activity, &service) {
            (Some(timer), Some(service)) => timer.belongs_to(service),
            _ => false,
        };

        let bubble = BubbleState {
            booked_seconds: status.seconds,
            timed_activity: status.timed_activity,
            setting_time_tracking_hhmm: settings.setting_time_tracking_hhmm,
            service: service.clone(),
        };
        self.runtime
            .send_to_content(tab.id, ContentMessage::ShowBubble(bubble))
            .await?;

        if keep_open {
            self.show_popup(&tab, &settings, service).await?;
            Ok(ResetOutcome::Opened)
        } else {
            self.runtime.send_to_content(tab.id, ContentMessage::ClosePopup).await?;
            Ok(ResetOutcome::Closed)
        }
    }

    pub async fn open_options(&self) -> Result<(), BridgeError> {
        let url = if self.runtime.is_chrome() {
            format!("chrome://extensions/?options={}", self.runtime.runtime_id())
        } else {
            self.runtime.extension_url("options.html")
        };
        self.runtime.create_tab(&url).await
    }

    pub async fn open_extensions(&self) -> Result<(), BridgeError> {
        if self.runtime.is_chrome() {
            self.runtime.create_tab("chrome://extensions").await?;
        }
        Ok(())
    }

    /// Forward tracked time to the third-party tool of the current tab
    pub async fn track(&self, entry: TimeEntry) -> Result<(), BridgeError> {
        let Some(tab) = self.runtime.current_tab().await? else {
            return Ok(());
        };
        if let Err(err) = self.tracker.track(tab.id, &entry).await {
            log::warn!("forwarding tracked time failed: {}", err);
        }
        Ok(())
    }

    /// New credentials are pushed to every page with a content script
    pub async fn settings_changed(&self, change: StorageChange) -> Result<(), BridgeError> {
        if !change.affects_credentials() {
            return Ok(());
        }
        let settings = self.settings.load().await?;
        let tabs = self.runtime.all_tabs().await?;

        for tab in tabs.into_iter().filter(|tab| !tab.is_browser_tab()) {
            let message = ContentMessage::SettingsChanged {
                settings: settings.clone(),
            };
            if let Err(err) = self.runtime.send_to_content(tab.id, message).await {
                log::debug!("tab {} did not take the new settings: {}", tab.id, err);
            }
        }
        Ok(())
    }
}

async fn fill_snapshot(
    api: &dyn ApiClient,
    snapshot: &mut PopupSnapshot,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<(), ApiError> {
    let projects = api.projects().await?;
    let activities = api.activities(from, to).await?;
    let schedules = api.schedules(from, to).await?;
    let status = api.activities_status(snapshot.service.as_ref()).await?;

    snapshot.projects = group_projects(&projects.projects);
    snapshot.remembered = RememberedSelection {
        service_last_project_id: status.last_project_id,
        service_last_task_id: status.last_task_id,
        user_last_project_id: projects.last_project_id,
        user_last_task_id: projects.last_task_id,
    };
    snapshot.activities = activities;
    snapshot.schedules = schedules;
    snapshot.timed_activity = status.timed_activity;
    Ok(())
}
