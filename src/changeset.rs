/// The popup's draft activity and the defaults derived for it
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::{Activity, RememberedSelection, Service};
use crate::projects::{
    all_projects, default_task, find_project_by_identifier, find_project_by_label,
    find_project_by_value, find_task, ProjectGroup, ProjectOption, TaskOption,
};
use crate::time_format::{format_date, parse_duration};

/// Catch-all activity type; it is not repeated in the description
pub const DEFAULT_TYPE: &str = "Sonstiges";

pub const ACTIVITY_TYPES: &[&str] = &[
    "Erstanalyse & Anforderungsaufnahme",
    "Entwicklung",
    "Bugfixing",
    "Testing",
    "Meeting & Abstimmung",
    "Deployment & Monitoring",
    DEFAULT_TYPE,
];

/// Everything the defaults are derived from
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub service: Option<&'a Service>,
    pub projects: &'a [ProjectGroup],
    pub remembered: &'a RememberedSelection,
    pub today: NaiveDate,
}

/// A single edit made in the form
#[derive(Debug, Clone, PartialEq)]
pub enum ChangesetField {
    Project(Option<u64>),
    Task(Option<u64>),
    Hours(String),
    Date(NaiveDate),
    Description(String),
    Type(String),
    CustomType(String),
}

/// User edits; unset fields fall back to derived defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Changeset {
    pub assignment_id: Option<u64>,
    pub task_id: Option<u64>,
    pub hours: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub kind: Option<String>,
    pub custom_type: Option<String>,
}

impl Changeset {
    pub fn apply(&mut self, edit: ChangesetField, ctx: &ResolveContext<'_>) {
        match edit {
            ChangesetField::Project(id) => {
                self.assignment_id = id;
                // A new project invalidates the chosen task
                self.task_id = id
                    .and_then(|id| find_project_by_value(ctx.projects, id))
                    .and_then(|project| default_task(&project.tasks))
                    .map(|task| task.value);
            }
            ChangesetField::Task(id) => self.task_id = id,
            ChangesetField::Hours(hours) => self.hours = Some(hours),
            ChangesetField::Date(date) => self.date = Some(format_date(date)),
            ChangesetField::Description(text) => self.description = Some(text),
            ChangesetField::Type(kind) => {
                self.kind = Some(kind);
                self.recompose_description(ctx);
            }
            ChangesetField::CustomType(text) => {
                self.custom_type = Some(text);
                self.recompose_description(ctx);
            }
        }
    }

    fn recompose_description(&mut self, ctx: &ResolveContext<'_>) {
        let service_description = ctx.service.and_then(|s| s.description.as_deref()).unwrap_or("");
        self.description = Some(compose_description(
            service_description,
            self.kind.as_deref().unwrap_or(DEFAULT_TYPE),
            self.custom_type.as_deref().unwrap_or(""),
        ));
    }

    /// Resolve the project: explicit choice, remembered for the service,
    /// remembered for the user, the service's identifier, its label as an
    /// external project, its label as an internal project, then the first one.
    pub fn project<'a>(&self, ctx: &ResolveContext<'a>) -> Option<&'a ProjectOption> {
        let remembered = ctx.remembered;
        let label = ctx.service.and_then(|s| s.project_label.as_deref()).unwrap_or("");
        let identifier = ctx.service.and_then(|s| s.project_id.as_deref()).unwrap_or("");

        [self.assignment_id, remembered.service_last_project_id, remembered.user_last_project_id]
            .into_iter()
            .flatten()
            .find_map(|id| find_project_by_value(ctx.projects, id))
            .or_else(|| find_project_by_identifier(ctx.projects, identifier))
            .or_else(|| find_project_by_label(ctx.projects, label))
            .or_else(|| {
                if label.is_empty() {
                    None
                } else {
                    find_project_by_label(ctx.projects, &format!("({})", label))
                }
            })
            .or_else(|| all_projects(ctx.projects).next())
    }

    /// Resolve the task within the resolved project; the first candidate id
    /// that exists in the project wins, otherwise the project's default task.
    pub fn task<'a>(&self, ctx: &ResolveContext<'a>) -> Option<&'a TaskOption> {
        let project = self.project(ctx)?;
        let service_task = ctx
            .service
            .and_then(|s| s.task_id.as_deref())
            .and_then(|id| id.parse::<u64>().ok());

        [
            self.task_id,
            ctx.remembered.service_last_task_id,
            service_task,
            ctx.remembered.user_last_task_id,
        ]
        .into_iter()
        .flatten()
        .find_map(|id| find_task(project, id))
        .or_else(|| default_task(&project.tasks))
    }

    /// Parenthesised hours book the time as non-billable
    pub fn billable(&self, ctx: &ResolveContext<'_>) -> bool {
        let hours = self.hours.as_deref().unwrap_or("");
        if non_billable_pattern().is_match(hours) {
            return false;
        }
        self.task(ctx).map(|t| t.billable).unwrap_or(false)
    }

    pub fn with_defaults(&self, ctx: &ResolveContext<'_>) -> Activity {
        let hours = self.hours.clone().unwrap_or_default();
        let service = ctx.service;

        Activity {
            assignment_id: self.assignment_id.or_else(|| self.project(ctx).map(|p| p.value)),
            task_id: self.task_id.or_else(|| self.task(ctx).map(|t| t.value)),
            billable: self.billable(ctx),
            seconds: parse_duration(&hours),
            hours,
            description: self
                .description
                .clone()
                .or_else(|| service.and_then(|s| s.description.clone()))
                .unwrap_or_default(),
            date: self.date.clone().unwrap_or_else(|| format_date(ctx.today)),
            tag: String::new(),
            kind: self.kind.clone().unwrap_or_else(|| DEFAULT_TYPE.to_string()),
            custom_type: self.custom_type.clone().unwrap_or_default(),
            remote_service: service.map(|s| s.name.clone()),
            remote_id: service.map(|s| s.id.clone()),
            remote_url: service.map(|s| s.url.clone()),
        }
    }
}

fn non_billable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\(.+\)").expect("valid regex"))
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^#(\S+)").expect("valid regex"))
}

fn tag_prefix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^#\S+\s").expect("valid regex"))
}

/// Move a leading `#tag` of the description into the tag field
pub fn extract_tag(activity: Activity) -> Activity {
    let Some(tag) = tag_pattern()
        .captures(&activity.description)
        .map(|caps| caps[1].to_string())
    else {
        return activity;
    };

    let description = tag_prefix_pattern().replace(&activity.description, "").into_owned();
    Activity {
        description,
        tag,
        ..activity
    }
}

pub fn compose_description(service_description: &str, kind: &str, custom_type: &str) -> String {
    let typed = kind != DEFAULT_TYPE;
    let mut description = service_description.to_string();
    if typed {
        description.push('\n');
        description.push_str(kind);
    }
    description.push_str(if typed && !custom_type.is_empty() { ": " } else { "\n" });
    description.push_str(custom_type);
    description
}

/// Project and task chosen, and either today or some duration entered
pub fn is_valid(activity: &Activity, today: NaiveDate) -> bool {
    activity.assignment_id.is_some()
        && activity.task_id.is_some()
        && (activity.date == format_date(today) || activity.seconds.unwrap_or(0) > 0)
}

/// Submitting today's entry without a duration starts a timer
pub fn is_timer_startable(activity: &Activity, today: NaiveDate) -> bool {
    activity.date == format_date(today) && activity.seconds == Some(0)
}
