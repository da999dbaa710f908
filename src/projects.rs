/// Project and task options as presented in the popup selects
use serde::{Deserialize, Serialize};

use crate::model::{Project, Task};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskOption {
    pub value: u64,
    pub label: String,
    pub billable: bool,
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectOption {
    pub value: u64,
    pub label: String,
    pub identifier: Option<String>,
    pub customer_name: String,
    pub tasks: Vec<TaskOption>,
}

/// Projects of one customer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectGroup {
    pub label: String,
    pub options: Vec<ProjectOption>,
}

/// Non-billable tasks and internal projects are shown in parentheses
fn bracketed(name: &str, plain: bool) -> String {
    if plain {
        name.to_string()
    } else {
        format!("({})", name)
    }
}

fn task_option(task: &Task) -> TaskOption {
    TaskOption {
        value: task.id,
        label: bracketed(&task.name, task.billable),
        billable: task.billable,
        is_default: task.default,
    }
}

pub fn project_option(project: &Project) -> ProjectOption {
    ProjectOption {
        value: project.id,
        label: bracketed(&project.name, !project.intern),
        identifier: project.identifier.clone(),
        customer_name: project.customer_name.clone(),
        tasks: project.tasks.iter().map(task_option).collect(),
    }
}

/// Group projects by customer, keeping the order in which customers first appear
pub fn group_projects(projects: &[Project]) -> Vec<ProjectGroup> {
    projects.iter().fold(Vec::new(), |mut groups: Vec<ProjectGroup>, project| {
        let option = project_option(project);
        match groups.iter_mut().find(|g| g.label == project.customer_name) {
            Some(group) => group.options.push(option),
            None => groups.push(ProjectGroup {
                label: project.customer_name.clone(),
                options: vec![option],
            }),
        }
        groups
    })
}

pub fn all_projects(groups: &[ProjectGroup]) -> impl Iterator<Item = &ProjectOption> {
    groups.iter().flat_map(|group| group.options.iter())
}

pub fn find_project_by_value(groups: &[ProjectGroup], value: u64) -> Option<&ProjectOption> {
    all_projects(groups).find(|p| p.value == value)
}

pub fn find_project_by_identifier<'a>(groups: &'a [ProjectGroup], identifier: &str) -> Option<&'a ProjectOption> {
    if identifier.is_empty() {
        return None;
    }
    all_projects(groups).find(|p| p.identifier.as_deref() == Some(identifier))
}

pub fn find_project_by_label<'a>(groups: &'a [ProjectGroup], label: &str) -> Option<&'a ProjectOption> {
    if label.is_empty() {
        return None;
    }
    all_projects(groups).find(|p| p.label == label)
}

pub fn find_task(project: &ProjectOption, id: u64) -> Option<&TaskOption> {
    project.tasks.iter().find(|t| t.value == id)
}

/// The task flagged as default, else the first one
pub fn default_task(tasks: &[TaskOption]) -> Option<&TaskOption> {
    tasks.iter().find(|t| t.is_default).or_else(|| tasks.first())
}
