use std::collections::HashMap;

use chrono::Month;

/// Per-school limits: an exceptions table with a default for everyone else.
#[derive(Debug, Clone, Default)]
pub struct SchoolExceptions {
    limits: HashMap<String, u32>,
}

impl SchoolExceptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, school: impl Into<String>, limit: u32) {
        self.limits.insert(school.into(), limit);
    }

    pub fn get(&self, school: &str) -> Option<u32> {
        self.limits.get(school).copied()
    }

    pub fn len(&self) -> usize {
        self.limits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }
}

impl FromIterator<(String, u32)> for SchoolExceptions {
    fn from_iter<I: IntoIterator<Item = (String, u32)>>(iter: I) -> Self {
        Self {
            limits: iter.into_iter().collect(),
        }
    }
}

/// Counts assignments per (month, school) for one run.
#[derive(Debug, Clone)]
pub struct SchoolQuotaTracker {
    default_limit: u32,
    exceptions: SchoolExceptions,
    counts: HashMap<Month, HashMap<String, u32>>,
}

impl SchoolQuotaTracker {
    pub fn new(default_limit: u32, exceptions: SchoolExceptions) -> Self {
        Self {
            default_limit,
            exceptions,
            counts: HashMap::new(),
        }
    }

    pub fn limit_for(&self, school: &str) -> u32 {
        self.exceptions.get(school).unwrap_or(self.default_limit)
    }

    pub fn count(&self, month: Month, school: &str) -> u32 {
        self.counts
            .get(&month)
            .and_then(|schools| schools.get(school))
            .copied()
            .unwrap_or(0)
    }

    pub fn within_limit(&self, month: Month, school: &str) -> bool {
        self.count(month, school) < self.limit_for(school)
    }

    /// Records one assignment. Callers check [`within_limit`](Self::within_limit) first.
    pub fn record(&mut self, month: Month, school: &str) {
        *self
            .counts
            .entry(month)
            .or_default()
            .entry(school.to_string())
            .or_insert(0) += 1;
    }
}
