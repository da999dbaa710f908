/// Reusable UI components

use std::rc::Rc;

use chrono::{Datelike, NaiveDate};
use patternfly_yew::prelude::*;
use web_sys::{HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement};
use yew::prelude::*;

use crate::changeset::{is_timer_startable, is_valid, Changeset, ChangesetField, ResolveContext, ACTIVITY_TYPES};
use crate::error::{ErrorType, FormErrors};
use crate::model::{Activity, PopupSnapshot, RecordedActivity, Schedule, TimedActivity};
use crate::time_format::{format_date, format_duration, FormatOptions};

const WEEKDAYS: [&str; 7] = ["Mo", "Di", "Mi", "Do", "Fr", "Sa", "So"];

/// Every day from `from` to `to`, both included
pub fn days_between(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    from.iter_days().take_while(|day| *day <= to).collect()
}

pub fn booked_seconds_on(activities: &[RecordedActivity], day: NaiveDate) -> u64 {
    let date = format_date(day);
    activities.iter().filter(|a| a.date == date).map(|a| a.seconds).sum()
}

/// Full-day absences only; half days still get bookings
pub fn is_absent(schedules: &[Schedule], day: NaiveDate) -> bool {
    let date = format_date(day);
    schedules.iter().any(|s| s.date == date && s.am && s.pm)
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

fn field_errors(errors: &FormErrors, field: &str) -> Html {
    match errors.get(field) {
        Some(messages) if !messages.is_empty() => html! {
            <div class="pf-v5-c-form__helper-text pf-m-error">{messages.join(", ")}</div>
        },
        _ => html! {},
    }
}

#[derive(Properties, PartialEq)]
pub struct CalendarProps {
    pub from_date: String,
    pub to_date: String,
    pub activities: Vec<RecordedActivity>,
    pub schedules: Vec<Schedule>,
    pub selected: String,
    pub hhmm: bool,
    pub on_select: Callback<NaiveDate>,
}

/// Booked hours per day of the displayed week
#[function_component(Calendar)]
pub fn calendar(props: &CalendarProps) -> Html {
    let (Some(from), Some(to)) = (parse_date(&props.from_date), parse_date(&props.to_date)) else {
        return html! {};
    };
    let options = FormatOptions {
        hhmm: props.hhmm,
        show_seconds: false,
    };

    html! {
        <div class="calendar">
            {for days_between(from, to).into_iter().map(|day| {
                let on_select = props.on_select.clone();
                let onclick = Callback::from(move |_: MouseEvent| on_select.emit(day));
                let mut class = classes!("calendar-day");
                if format_date(day) == props.selected {
                    class.push("selected");
                }
                if is_absent(&props.schedules, day) {
                    class.push("absent");
                }
                let weekday = WEEKDAYS[day.weekday().num_days_from_monday() as usize];

                html! {
                    <button {class} {onclick}>
                        <span class="calendar-weekday">{weekday}</span>
                        <span class="calendar-date">{day.day().to_string()}</span>
                        <span class="calendar-hours">
                            {format_duration(booked_seconds_on(&props.activities, day), options)}
                        </span>
                    </button>
                }
            })}
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct TimerViewProps {
    pub timed_activity: TimedActivity,
    pub hhmm: bool,
    #[prop_or(false)]
    pub busy: bool,
    pub on_stop: Callback<MouseEvent>,
}

#[function_component(TimerView)]
pub fn timer_view(props: &TimerViewProps) -> Html {
    let timer = &props.timed_activity;
    let elapsed = format_duration(
        timer.seconds,
        FormatOptions {
            hhmm: props.hhmm,
            show_seconds: true,
        },
    );

    html! {
        <div class="timer-view">
            if let Some(project) = &timer.assignment_name {
                <p class="timer-project">{project}</p>
            }
            if let Some(task) = &timer.task_name {
                <p class="timer-task">{task}</p>
            }
            <p class="timer-description">{&timer.description}</p>
            <h2 class="timer-elapsed">{elapsed}</h2>
            <Button onclick={props.on_stop.clone()} disabled={props.busy} variant={ButtonVariant::Danger} block={true}>
                {"Timer stoppen"}
            </Button>
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct ErrorViewProps {
    pub error_type: ErrorType,
    #[prop_or_default]
    pub message: Option<String>,
    pub on_options: Callback<MouseEvent>,
    pub on_extensions: Callback<MouseEvent>,
}

#[function_component(ErrorView)]
pub fn error_view(props: &ErrorViewProps) -> Html {
    match props.error_type {
        ErrorType::Unauthorized => html! {
            <div class="flex-column-gap">
                <Alert r#type={AlertType::Warning} title={"API-Schlüssel fehlt oder ist ungültig"} inline={true}>
                    {"Bitte Subdomain und API-Schlüssel in den Einstellungen prüfen."}
                </Alert>
                <Button onclick={props.on_options.clone()} variant={ButtonVariant::Primary} block={true}>
                    {"Einstellungen öffnen"}
                </Button>
            </div>
        },
        ErrorType::UpgradeRequired => html! {
            <div class="flex-column-gap">
                <Alert r#type={AlertType::Warning} title={"Neue Version verfügbar"} inline={true}>
                    {"Bitte die Erweiterung aktualisieren."}
                </Alert>
                <Button onclick={props.on_extensions.clone()} variant={ButtonVariant::Primary} block={true}>
                    {"Erweiterungen öffnen"}
                </Button>
            </div>
        },
        ErrorType::Unknown => html! {
            <Alert r#type={AlertType::Danger} title={"Error"} inline={true}>
                {props.message.clone().unwrap_or_default()}
            </Alert>
        },
    }
}

#[derive(Properties, PartialEq)]
pub struct ActivityFormProps {
    pub snapshot: Rc<PopupSnapshot>,
    pub changeset: Changeset,
    pub errors: FormErrors,
    pub today: NaiveDate,
    #[prop_or(false)]
    pub busy: bool,
    pub on_change: Callback<ChangesetField>,
    pub on_submit: Callback<Activity>,
}

#[function_component(ActivityForm)]
pub fn activity_form(props: &ActivityFormProps) -> Html {
    let snapshot = &props.snapshot;
    let ctx = ResolveContext {
        service: snapshot.service.as_ref(),
        projects: &snapshot.projects,
        remembered: &snapshot.remembered,
        today: props.today,
    };
    let activity = props.changeset.with_defaults(&ctx);
    let tasks = props.changeset.project(&ctx).map(|p| p.tasks.clone()).unwrap_or_default();
    let kind = activity.kind.clone();

    let on_project = {
        let on_change = props.on_change.clone();
        Callback::from(move |e: Event| {
            let select: HtmlSelectElement = e.target_unchecked_into();
            on_change.emit(ChangesetField::Project(select.value().parse().ok()));
        })
    };
    let on_task = {
        let on_change = props.on_change.clone();
        Callback::from(move |e: Event| {
            let select: HtmlSelectElement = e.target_unchecked_into();
            on_change.emit(ChangesetField::Task(select.value().parse().ok()));
        })
    };
    let on_date = {
        let on_change = props.on_change.clone();
        Callback::from(move |e: Event| {
            let input: HtmlInputElement = e.target_unchecked_into();
            if let Some(date) = parse_date(&input.value()) {
                on_change.emit(ChangesetField::Date(date));
            }
        })
    };
    let on_hours = {
        let on_change = props.on_change.clone();
        Callback::from(move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            on_change.emit(ChangesetField::Hours(input.value()));
        })
    };
    let on_type = {
        let on_change = props.on_change.clone();
        Callback::from(move |e: Event| {
            let select: HtmlSelectElement = e.target_unchecked_into();
            on_change.emit(ChangesetField::Type(select.value()));
        })
    };
    let on_custom_type = {
        let on_change = props.on_change.clone();
        Callback::from(move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            on_change.emit(ChangesetField::CustomType(input.value()));
        })
    };
    let on_description = {
        let on_change = props.on_change.clone();
        Callback::from(move |e: InputEvent| {
            let area: HtmlTextAreaElement = e.target_unchecked_into();
            on_change.emit(ChangesetField::Description(area.value()));
        })
    };

    let valid = is_valid(&activity, props.today);
    let label = if is_timer_startable(&activity, props.today) {
        "Timer starten"
    } else {
        "Speichern"
    };
    let on_click = {
        let on_submit = props.on_submit.clone();
        let activity = activity.clone();
        Callback::from(move |_: MouseEvent| on_submit.emit(activity.clone()))
    };

    html! {
        <div class="pf-v5-c-form activity-form">
            <div class="pf-v5-c-form__group">
                <select class="pf-v5-c-form-control" onchange={on_project}>
                    {for snapshot.projects.iter().map(|group| html! {
                        <optgroup label={group.label.clone()}>
                            {for group.options.iter().map(|option| html! {
                                <option
                                    value={option.value.to_string()}
                                    selected={activity.assignment_id == Some(option.value)}
                                >
                                    {&option.label}
                                </option>
                            })}
                        </optgroup>
                    })}
                </select>
                {field_errors(&props.errors, "assignment_id")}
            </div>

            <div class="pf-v5-c-form__group">
                <select class="pf-v5-c-form-control" onchange={on_task}>
                    {for tasks.iter().map(|task| html! {
                        <option value={task.value.to_string()} selected={activity.task_id == Some(task.value)}>
                            {&task.label}
                        </option>
                    })}
                </select>
                {field_errors(&props.errors, "task_id")}
            </div>

            <div class="pf-v5-c-form__group form-row">
                <input class="pf-v5-c-form-control" type="date" value={activity.date.clone()} onchange={on_date} />
                <input
                    class="pf-v5-c-form-control"
                    type="text"
                    placeholder="0:00"
                    value={activity.hours.clone()}
                    oninput={on_hours}
                />
            </div>
            {field_errors(&props.errors, "date")}
            {field_errors(&props.errors, "hours")}

            <div class="pf-v5-c-form__group form-row">
                <select class="pf-v5-c-form-control" onchange={on_type}>
                    {for ACTIVITY_TYPES.iter().map(|t| html! {
                        <option value={*t} selected={kind == *t}>{*t}</option>
                    })}
                </select>
                <input
                    class="pf-v5-c-form-control"
                    type="text"
                    value={activity.custom_type.clone()}
                    oninput={on_custom_type}
                />
            </div>

            <div class="pf-v5-c-form__group">
                <textarea
                    class="pf-v5-c-form-control"
                    rows="3"
                    value={activity.description.clone()}
                    oninput={on_description}
                />
                {field_errors(&props.errors, "description")}
            </div>
            {field_errors(&props.errors, "base")}

            <Button onclick={on_click} disabled={!valid || props.busy} variant={ButtonVariant::Primary} block={true}>
                {label}
            </Button>
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, d).unwrap()
    }

    fn recorded(id: u64, date: &str, seconds: u64) -> RecordedActivity {
        RecordedActivity {
            id,
            date: date.to_string(),
            seconds,
            description: String::new(),
            billable: true,
        }
    }

    #[test]
    fn test_days_between_week() {
        let days = days_between(day(28), day(28) + Duration::days(6));

        assert_eq!(days.len(), 7);
        assert_eq!(days[0], day(28));
        assert_eq!(format_date(days[6]), "2024-11-03");
    }

    #[test]
    fn test_days_between_inverted_range() {
        assert!(days_between(day(28), day(27)).is_empty());
    }

    #[test]
    fn test_booked_seconds_sum_per_day() {
        let activities = vec![
            recorded(1, "2024-10-28", 3600),
            recorded(2, "2024-10-28", 1800),
            recorded(3, "2024-10-29", 600),
        ];

        assert_eq!(booked_seconds_on(&activities, day(28)), 5400);
        assert_eq!(booked_seconds_on(&activities, day(29)), 600);
        assert_eq!(booked_seconds_on(&activities, day(30)), 0);
    }

    #[test]
    fn test_absence_needs_full_day() {
        let schedules = vec![
            Schedule {
                date: "2024-10-28".to_string(),
                am: true,
                pm: true,
                comment: None,
            },
            Schedule {
                date: "2024-10-29".to_string(),
                am: true,
                pm: false,
                comment: Some("Arzt".to_string()),
            },
        ];

        assert!(is_absent(&schedules, day(28)));
        assert!(!is_absent(&schedules, day(29)));
        assert!(!is_absent(&schedules, day(30)));
    }
}
