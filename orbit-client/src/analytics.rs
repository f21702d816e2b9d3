//! Derived statistics over the active task list

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use orbit_core::models::Task;

/// Headline counters for the active list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    /// Completed share of the list, rounded to a whole percent.
    pub completion_rate: u32,
}

pub fn task_stats(active: &[Task]) -> TaskStats {
    let total = active.len();
    let completed = active.iter().filter(|t| t.completed).count();
    let completion_rate = if total > 0 {
        ((completed as f64 / total as f64) * 100.0).round() as u32
    } else {
        0
    };
    TaskStats {
        total,
        completed,
        in_progress: total - completed,
        completion_rate,
    }
}

pub fn motivation_message(stats: TaskStats) -> &'static str {
    if stats.completion_rate == 100 && stats.total > 0 {
        "🔥 On fire!"
    } else if stats.completion_rate >= 70 {
        "✨ Small steps matter."
    } else if stats.completion_rate >= 40 {
        "🌱 Growing consistency."
    } else if stats.completion_rate > 0 {
        "💪 Keep going!"
    } else {
        "🌱 Start your journey!"
    }
}

/// Completions per day over the trailing week, oldest day first.
pub fn completions_by_day(active: &[Task], now: DateTime<Utc>) -> Vec<u32> {
    (0..7)
        .rev()
        .map(|days_back| {
            let day = (now - Duration::days(days_back)).date_naive();
            active
                .iter()
                .filter(|t| t.completed)
                .filter(|t| t.completed_at.map(|at| at.date_naive()) == Some(day))
                .count() as u32
        })
        .collect()
}

/// Task count per category, sorted by category name.
pub fn category_breakdown(active: &[Task]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for task in active {
        *counts.entry(task.category.clone()).or_insert(0) += 1;
    }
    counts
}

/// Completion rate per day over the trailing week, computed against the
/// tasks created that day. Days with no created tasks report zero.
pub fn productivity_trend(active: &[Task], now: DateTime<Utc>) -> Vec<u32> {
    (0..7)
        .rev()
        .map(|days_back| {
            let day = (now - Duration::days(days_back)).date_naive();
            let created: Vec<&Task> = active
                .iter()
                .filter(|t| t.created_at.date_naive() == day)
                .collect();
            if created.is_empty() {
                return 0;
            }
            let completed = created.iter().filter(|t| t.completed).count();
            ((completed as f64 / created.len() as f64) * 100.0).round() as u32
        })
        .collect()
}
