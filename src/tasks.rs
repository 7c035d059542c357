use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

pub const COMPLETED: &str = "completed";

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Counts {
    total: usize,
    completed: usize,
}

impl Counts {
    fn add(&mut self, other: Counts) {
        self.total += other.total;
        self.completed += other.completed;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectStatistics {
    pub id: Value,
    pub name: String,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub progress_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskStatistics {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub progress_percentage: f64,
    pub by_status: BTreeMap<String, usize>,
    pub projects: Vec<ProjectStatistics>,
}

/// completed / total × 100 to one decimal; 0 for an empty set.
pub fn progress(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round1(completed as f64 / total as f64 * 100.0)
}

/// One decimal, ties to even.
pub fn round1(x: f64) -> f64 {
    (x * 10.0).round_ties_even() / 10.0
}

/// Walks a task list; `null` or missing lists count as empty, non-object
/// entries are skipped and a non-string status reads as `unknown`.
fn count(tasks: Option<&Value>, by_status: &mut BTreeMap<String, usize>) -> Counts {
    let mut counts = Counts::default();
    let Some(tasks) = tasks.and_then(Value::as_array) else {
        return counts;
    };
    for task in tasks.iter().filter(|t| t.is_object()) {
        counts.total += 1;
        let status = task.get("status").and_then(Value::as_str).unwrap_or("unknown");
        if status == COMPLETED {
            counts.completed += 1;
        }
        *by_status.entry(status.to_string()).or_default() += 1;
        counts.add(count(task.get("subtasks"), by_status));
    }
    counts
}

fn empty_document() -> Map<String, Value> {
    let mut doc = Map::new();
    doc.insert("members".into(), json!({}));
    doc.insert("projects".into(), json!([]));
    doc
}

pub fn load_document(path: &Path) -> Map<String, Value> {
    match try_load(path) {
        Ok(doc) => doc,
        Err(err) => {
            warn!(path = %path.display(), error = %format!("{err:#}"), "tasks.load_failed");
            empty_document()
        }
    }
}

fn try_load(path: &Path) -> Result<Map<String, Value>> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    match serde_json::from_str::<Value>(&raw)? {
        Value::Object(doc) => Ok(doc),
        _ => Err(anyhow!("task document is not an object")),
    }
}

pub fn compute_statistics(doc: &Map<String, Value>) -> TaskStatistics {
    let projects: &[Value] = match doc.get("projects") {
        Some(Value::Array(list)) => list,
        Some(Value::Null) | None => &[],
        Some(_) => {
            warn!("tasks.projects_not_a_list");
            &[]
        }
    };

    let mut by_status = BTreeMap::new();
    let mut overall = Counts::default();
    let mut per_project = Vec::with_capacity(projects.len());
    for (idx, project) in projects.iter().enumerate() {
        if !project.is_object() {
            warn!(index = idx, "tasks.project_skipped");
            continue;
        }
        let c = count(project.get("tasks"), &mut by_status);
        overall.add(c);
        per_project.push(ProjectStatistics {
            id: project.get("id").cloned().unwrap_or(Value::Null),
            name: project
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            total_tasks: c.total,
            completed_tasks: c.completed,
            progress_percentage: progress(c.completed, c.total),
        });
    }

    TaskStatistics {
        total_tasks: overall.total,
        completed_tasks: overall.completed,
        progress_percentage: progress(overall.completed, overall.total),
        by_status,
        projects: per_project,
    }
}

/// Loads the task document and overwrites its `statistics` block.
pub fn aggregate(path: &Path) -> Result<(Map<String, Value>, TaskStatistics)> {
    let mut doc = load_document(path);
    let stats = compute_statistics(&doc);
    doc.insert("statistics".into(), serde_json::to_value(&stats)?);
    info!(
        total = stats.total_tasks,
        completed = stats.completed_tasks,
        progress = stats.progress_percentage,
        "tasks.statistics"
    );
    Ok((doc, stats))
}
