/// Popup UI shown in the content script's frame

use std::rc::Rc;

use chrono::NaiveDate;
use patternfly_yew::prelude::*;
use uuid::Uuid;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::KeyboardEvent;
use yew::prelude::*;

use crate::bridge::{from_js, to_js};
use crate::changeset::{extract_tag, Changeset, ChangesetField, ResolveContext};
use crate::error::{BridgeError, FormErrors};
use crate::messages::{BackgroundMessage, PopupMessage};
use crate::model::{Activity, PopupSnapshot};
use crate::ui::components::{ActivityForm, Calendar, ErrorView, TimerView};

// Import JS bridge functions
#[wasm_bindgen(module = "/popup.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn getPopupData() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn sendToBackground(message: JsValue) -> Result<JsValue, JsValue>;

    fn onPopupMessage(callback: &Closure<dyn FnMut(JsValue)>) -> js_sys::Function;
}

#[derive(Clone, PartialEq)]
enum AppState {
    Loading,
    Ready(Rc<PopupSnapshot>),
    Error(String),
}

/// Remote service whose own time tracking mirrors created activities
const MIRRORED_SERVICE: &str = "clickup";

/// Messages sent when the form is submitted, in order.
///
/// The mirrored entry keeps the description as typed, tag included; only the
/// MOCO activity gets its tag split off.
pub fn submission(activity: Activity, snapshot: &PopupSnapshot) -> Vec<BackgroundMessage> {
    let mut messages = Vec::new();

    let seconds = activity.seconds.unwrap_or(0);
    if activity.remote_service.as_deref() == Some(MIRRORED_SERVICE) && seconds > 0 {
        messages.push(BackgroundMessage::Track {
            seconds,
            billable: activity.billable,
            description: activity.description.clone(),
        });
    }
    let activity = extract_tag(activity);
    messages.push(BackgroundMessage::CreateActivity {
        activity,
        service: snapshot.service.clone(),
        popup_id: Some(snapshot.popup_id),
    });
    messages
}

/// Form errors addressed to this popup session
fn form_errors_for(message: PopupMessage, popup_id: Uuid) -> Option<FormErrors> {
    match message {
        PopupMessage::SetFormErrors {
            popup_id: Some(target),
            errors,
        } if target == popup_id => Some(errors),
        _ => None,
    }
}

async fn send(message: BackgroundMessage) -> Result<(), BridgeError> {
    sendToBackground(to_js(&message)?)
        .await
        .map_err(|e| BridgeError::Call(format!("{:?}", e)))?;
    Ok(())
}

fn dispatch(messages: Vec<BackgroundMessage>) {
    spawn_local(async move {
        for message in messages {
            if let Err(e) = send(message).await {
                log::error!("Failed to message background: {}", e);
            }
        }
    });
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

async fn load_popup_data() -> Result<PopupSnapshot, String> {
    let data = getPopupData()
        .await
        .map_err(|e| format!("Failed to read popup data: {:?}", e))?;
    if data.is_null() || data.is_undefined() {
        return Err("No popup data".to_string());
    }
    from_js(data).map_err(|e| format!("Failed to parse popup data: {}", e))
}

#[function_component(App)]
pub fn app() -> Html {
    let state = use_state(|| AppState::Loading);

    // Receive the snapshot once
    {
        let state = state.clone();
        use_effect_with((), move |_| {
            spawn_local(async move {
                match load_popup_data().await {
                    Ok(snapshot) => state.set(AppState::Ready(Rc::new(snapshot))),
                    Err(e) => state.set(AppState::Error(e)),
                }
            });
            || ()
        });
    }

    // Escape closes the popup
    use_effect_with((), move |_| {
        let listener = Closure::wrap(Box::new(move |event: KeyboardEvent| {
            if event.key() == "Escape" {
                dispatch(vec![BackgroundMessage::ClosePopup]);
            }
        }) as Box<dyn FnMut(KeyboardEvent)>);

        let window = web_sys::window();
        if let Some(window) = &window {
            let _ = window.add_event_listener_with_callback("keydown", listener.as_ref().unchecked_ref());
        }

        move || {
            if let Some(window) = window {
                let _ = window.remove_event_listener_with_callback("keydown", listener.as_ref().unchecked_ref());
            }
        }
    });

    html! {
        <div class="moco-popup">
            {match &*state {
                AppState::Loading => html! {
                    <div class="loading-text-center">
                        <Spinner />
                    </div>
                },
                AppState::Error(err) => html! {
                    <Alert r#type={AlertType::Danger} title={"Error"} inline={true}>
                        {err.clone()}
                    </Alert>
                },
                AppState::Ready(snapshot) => html! {
                    <Session snapshot={snapshot.clone()} />
                },
            }}
        </div>
    }
}

#[derive(Properties, PartialEq)]
struct SessionProps {
    snapshot: Rc<PopupSnapshot>,
}

/// One popup session rendering a single snapshot
#[function_component(Session)]
fn session(props: &SessionProps) -> Html {
    let snapshot = props.snapshot.clone();
    let today = *use_memo((), |_| today());
    let changeset = use_state(Changeset::default);
    let form_errors = use_state(FormErrors::new);
    let busy = use_state(|| false);

    // Validation errors for this session arrive from the background
    {
        let form_errors = form_errors.clone();
        let busy = busy.clone();
        use_effect_with(snapshot.popup_id, move |popup_id| {
            let popup_id = *popup_id;
            let listener = Closure::wrap(Box::new(move |payload: JsValue| {
                match from_js::<PopupMessage>(payload) {
                    Ok(message) => {
                        if let Some(errors) = form_errors_for(message, popup_id) {
                            form_errors.set(errors);
                            busy.set(false);
                        }
                    }
                    Err(e) => log::warn!("Ignoring popup message: {}", e),
                }
            }) as Box<dyn FnMut(JsValue)>);
            let unsubscribe = onPopupMessage(&listener);

            move || {
                let _ = unsubscribe.call0(&JsValue::NULL);
                drop(listener);
            }
        });
    }

    let on_options = Callback::from(|_: MouseEvent| dispatch(vec![BackgroundMessage::OpenOptions]));
    let on_extensions = Callback::from(|_: MouseEvent| dispatch(vec![BackgroundMessage::OpenExtensions]));

    if let Some(error_type) = snapshot.error_type {
        return html! {
            <ErrorView
                {error_type}
                message={snapshot.error_message.clone()}
                {on_options}
                {on_extensions}
            />
        };
    }

    let hhmm = snapshot.setting_time_tracking_hhmm;

    if let Some(timed_activity) = snapshot.timed_activity.clone() {
        let on_stop = {
            let busy = busy.clone();
            let snapshot = snapshot.clone();
            let timed_activity = timed_activity.clone();
            Callback::from(move |_: MouseEvent| {
                busy.set(true);
                dispatch(vec![BackgroundMessage::StopTimer {
                    timed_activity: timed_activity.clone(),
                    service: snapshot.service.clone(),
                }]);
            })
        };
        return html! {
            <TimerView {timed_activity} {hhmm} busy={*busy} {on_stop} />
        };
    }

    let on_change = {
        let changeset = changeset.clone();
        let snapshot = snapshot.clone();
        Callback::from(move |edit: ChangesetField| {
            let ctx = ResolveContext {
                service: snapshot.service.as_ref(),
                projects: &snapshot.projects,
                remembered: &snapshot.remembered,
                today,
            };
            let mut next = (*changeset).clone();
            next.apply(edit, &ctx);
            changeset.set(next);
        })
    };
    let on_select = {
        let on_change = on_change.clone();
        Callback::from(move |day: NaiveDate| on_change.emit(ChangesetField::Date(day)))
    };
    let on_submit = {
        let busy = busy.clone();
        let form_errors = form_errors.clone();
        let snapshot = snapshot.clone();
        Callback::from(move |activity: Activity| {
            busy.set(true);
            form_errors.set(FormErrors::new());
            dispatch(submission(activity, &snapshot));
        })
    };

    let selected = changeset
        .date
        .clone()
        .unwrap_or_else(|| crate::time_format::format_date(today));

    html! {
        <div class="flex-column-gap">
            <Calendar
                from_date={snapshot.from_date.clone()}
                to_date={snapshot.to_date.clone()}
                activities={snapshot.activities.clone()}
                schedules={snapshot.schedules.clone()}
                {selected}
                {hhmm}
                {on_select}
            />
            <ActivityForm
                snapshot={snapshot.clone()}
                changeset={(*changeset).clone()}
                errors={(*form_errors).clone()}
                {today}
                busy={*busy}
                {on_change}
                {on_submit}
            />
        </div>
    }
}
