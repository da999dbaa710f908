/// wasm-bindgen glue between the background coordinator and the browser APIs
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

use crate::api::MocoClient;
use crate::coordinator::{Coordinator, CoordinatorConfig};
use crate::error::BridgeError;
use crate::messages::{BackgroundMessage, BrowserEvent, ContentMessage, PopupMessage, ServiceReport};
use crate::model::TabInfo;
use crate::ports::{ApiClient, ExtensionRuntime, HttpTransport, SettingsProvider};
use crate::settings::Settings;
use crate::tracker::{ClickupTracker, PageScraper, PageValue, TrackerConfig};
use crate::transport::ReqwestTransport;

// Import JS bridge functions
#[wasm_bindgen(module = "/background.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn getCurrentTab() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn queryTabs() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn sendToContent(tab_id: i32, message: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn sendToPopup(tab_id: i32, message: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn createTab(url: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn getSettings() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn executeInTab(tab_id: i32, name: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn getCookie(url: &str, name: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn sleep(ms: f64) -> Result<(), JsValue>;

    fn isChrome() -> bool;

    fn runtimeId() -> String;

    fn runtimeUrl(path: &str) -> String;

    fn onTabUpdated(callback: &Closure<dyn FnMut(JsValue)>);

    fn onActionClicked(callback: &Closure<dyn FnMut(JsValue)>);

    fn onStorageChanged(callback: &Closure<dyn FnMut(JsValue)>);

    fn onBackgroundMessage(callback: &Closure<dyn FnMut(JsValue)>);
}

/// Plain JS objects, not `Map`s, so the other side can read them as JSON
pub fn to_js<T: Serialize>(value: &T) -> Result<JsValue, BridgeError> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| BridgeError::Serde(e.to_string()))
}

pub fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T, BridgeError> {
    serde_wasm_bindgen::from_value(value).map_err(|e| BridgeError::Serde(e.to_string()))
}

fn call_failed(err: JsValue) -> BridgeError {
    BridgeError::Call(format!("{:?}", err))
}

fn optional<T: DeserializeOwned>(value: JsValue) -> Result<Option<T>, BridgeError> {
    if value.is_null() || value.is_undefined() {
        Ok(None)
    } else {
        from_js(value).map(Some)
    }
}

/// The browser as seen from the background script
pub struct BrowserRuntime;

#[async_trait(?Send)]
impl ExtensionRuntime for BrowserRuntime {
    async fn current_tab(&self) -> Result<Option<TabInfo>, BridgeError> {
        optional(getCurrentTab().await.map_err(call_failed)?)
    }

    async fn all_tabs(&self) -> Result<Vec<TabInfo>, BridgeError> {
        from_js(queryTabs().await.map_err(call_failed)?)
    }

    async fn request_service(&self, tab_id: i32) -> Result<Option<ServiceReport>, BridgeError> {
        let message = to_js(&ContentMessage::RequestService)?;
        match sendToContent(tab_id, message).await {
            Ok(report) => optional(report),
            // No content script in this tab
            Err(err) => {
                log::debug!("requestService in tab {} failed: {:?}", tab_id, err);
                Ok(None)
            }
        }
    }

    async fn send_to_content(&self, tab_id: i32, message: ContentMessage) -> Result<(), BridgeError> {
        log::debug!("{} -> tab {}", message.name(), tab_id);
        sendToContent(tab_id, to_js(&message)?).await.map_err(call_failed)?;
        Ok(())
    }

    async fn send_to_popup(&self, tab_id: i32, message: PopupMessage) -> Result<(), BridgeError> {
        sendToPopup(tab_id, to_js(&message)?).await.map_err(call_failed)?;
        Ok(())
    }

    async fn create_tab(&self, url: &str) -> Result<(), BridgeError> {
        createTab(url).await.map_err(call_failed)
    }

    fn is_chrome(&self) -> bool {
        isChrome()
    }

    fn runtime_id(&self) -> String {
        runtimeId()
    }

    fn extension_url(&self, path: &str) -> String {
        runtimeUrl(path)
    }

    fn now_millis(&self) -> i64 {
        js_sys::Date::now() as i64
    }

    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }

    async fn sleep(&self, duration: Duration) {
        if let Err(err) = sleep(duration.as_millis() as f64).await {
            log::warn!("sleep failed: {:?}", err);
        }
    }
}

#[async_trait(?Send)]
impl SettingsProvider for BrowserRuntime {
    async fn load(&self) -> Result<Settings, BridgeError> {
        Ok(optional(getSettings().await.map_err(call_failed)?)?.unwrap_or_default())
    }
}

#[async_trait(?Send)]
impl PageScraper for BrowserRuntime {
    async fn evaluate_in_tab(&self, tab_id: i32, value: PageValue) -> Result<Option<String>, BridgeError> {
        let name = match value {
            PageValue::ActiveTaskId => "activeTaskId",
            PageValue::TeamId => "teamId",
            PageValue::ApiUrl => "apiUrl",
            PageValue::IdToken => "idToken",
        };
        optional(executeInTab(tab_id, name).await.map_err(call_failed)?)
    }

    async fn cookie(&self, url: &str, name: &str) -> Result<Option<String>, BridgeError> {
        optional(getCookie(url, name).await.map_err(call_failed)?)
    }
}

/// Register one listener that turns a JS payload into a browser event
fn subscribe(
    register: fn(&Closure<dyn FnMut(JsValue)>),
    coordinator: &Coordinator,
    to_event: fn(JsValue) -> Result<BrowserEvent, BridgeError>,
) {
    let coordinator = coordinator.clone();
    let callback = Closure::wrap(Box::new(move |payload: JsValue| match to_event(payload) {
        Ok(event) => {
            let coordinator = coordinator.clone();
            spawn_local(async move { coordinator.handle_event(event).await });
        }
        Err(err) => log::warn!("ignoring browser event: {}", err),
    }) as Box<dyn FnMut(JsValue)>);

    register(&callback);
    // Listeners live as long as the background script
    callback.forget();
}

fn subscribe_messages(coordinator: &Coordinator) {
    let coordinator = coordinator.clone();
    let callback = Closure::wrap(Box::new(move |payload: JsValue| {
        match from_js::<BackgroundMessage>(payload) {
            Ok(message) => {
                let coordinator = coordinator.clone();
                spawn_local(async move { coordinator.handle_message(message).await });
            }
            Err(err) => log::warn!("ignoring message: {}", err),
        }
    }) as Box<dyn FnMut(JsValue)>);

    onBackgroundMessage(&callback);
    callback.forget();
}

/// Wire the coordinator to the browser; called once when the background script loads
pub fn start_background(config: CoordinatorConfig, tracker_config: TrackerConfig) {
    let runtime = Rc::new(BrowserRuntime);
    let transport: Rc<dyn HttpTransport> = Rc::new(ReqwestTransport::new());

    let api = {
        let runtime = runtime.clone();
        let transport = transport.clone();
        move |settings: &Settings| -> Box<dyn ApiClient> {
            Box::new(MocoClient::new(settings, transport.clone(), runtime.today()))
        }
    };
    let tracker = ClickupTracker::new(runtime.clone(), transport, runtime.clone(), tracker_config);
    let coordinator = Coordinator::new(runtime.clone(), runtime, Rc::new(api), Rc::new(tracker), config);

    subscribe(onTabUpdated, &coordinator, |payload| from_js(payload).map(BrowserEvent::TabUpdated));
    subscribe(onActionClicked, &coordinator, |payload| {
        from_js(payload).map(BrowserEvent::ActionClicked)
    });
    subscribe(onStorageChanged, &coordinator, |payload| {
        from_js(payload).map(BrowserEvent::StorageChanged)
    });
    subscribe_messages(&coordinator);

    log::info!("background coordinator started");
}
