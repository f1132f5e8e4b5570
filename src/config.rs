use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::str::FromStr;

use chrono::{Datelike, Month};
use serde::Deserialize;

use crate::error::{AssignError, Result};

/// Raw shape of the optional JSON config file. Every key is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CycleFile {
    planned_months: Vec<String>,
    time_budget: u32,
    slot_quotas: BTreeMap<u32, u32>,
    school_limit: u32,
    ineligibility_code: String,
    no_request: String,
    cycle_year: Option<i32>,
}

impl Default for CycleFile {
    fn default() -> Self {
        let config = CycleConfig::default();
        Self {
            planned_months: config
                .planned_months
                .iter()
                .map(|m| m.name().to_string())
                .collect(),
            time_budget: config.time_budget,
            slot_quotas: config.slot_quotas,
            school_limit: config.school_limit,
            ineligibility_code: config.ineligibility_code,
            no_request: config.no_request,
            cycle_year: None,
        }
    }
}

/// Fixed parameters of one assignment cycle.
#[derive(Debug, Clone)]
pub struct CycleConfig {
    pub planned_months: Vec<Month>,
    /// Minutes available in each planned month.
    pub time_budget: u32,
    /// Duration bucket (minutes) -> slots per month.
    pub slot_quotas: BTreeMap<u32, u32>,
    pub school_limit: u32,
    pub ineligibility_code: String,
    pub no_request: String,
    pub cycle_year: i32,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            planned_months: vec![
                Month::February,
                Month::March,
                Month::April,
                Month::May,
                Month::June,
            ],
            time_budget: 155,
            slot_quotas: BTreeMap::from([(5, 3), (10, 3), (15, 3), (20, 3), (25, 2), (30, 1)]),
            school_limit: 1,
            ineligibility_code: "NS".to_string(),
            no_request: "None".to_string(),
            cycle_year: chrono::Local::now().year(),
        }
    }
}

impl CycleFile {
    fn validate(self) -> Result<CycleConfig> {
        if self.planned_months.is_empty() {
            return Err(AssignError::InvalidConfig("no planned months".to_string()));
        }
        if self.time_budget == 0 {
            return Err(AssignError::InvalidConfig("time budget must be positive".to_string()));
        }

        let mut seen = HashSet::new();
        let mut planned_months = Vec::with_capacity(self.planned_months.len());
        for name in &self.planned_months {
            let month = Month::from_str(name.trim())
                .map_err(|_| AssignError::InvalidConfig(format!("unknown month '{}'", name)))?;
            if !seen.insert(month) {
                return Err(AssignError::InvalidConfig(format!("month '{}' listed twice", name)));
            }
            planned_months.push(month);
        }

        let cycle_year = self
            .cycle_year
            .unwrap_or_else(|| chrono::Local::now().year());

        Ok(CycleConfig {
            planned_months,
            time_budget: self.time_budget,
            slot_quotas: self.slot_quotas,
            school_limit: self.school_limit,
            ineligibility_code: self.ineligibility_code.trim().to_string(),
            no_request: self.no_request.trim().to_string(),
            cycle_year,
        })
    }
}

impl CycleConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let file: CycleFile = serde_json::from_str(text)?;
        file.validate()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Reads the file named by `RECITAL_CONFIG`, or falls back to the defaults.
    pub fn from_env() -> Result<Self> {
        match std::env::var("RECITAL_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::load(path.trim()),
            _ => Ok(Self::default()),
        }
    }

    pub fn is_planned(&self, month: Month) -> bool {
        self.planned_months.contains(&month)
    }

    /// Label used for a month's own report, e.g. "March 2021".
    pub fn month_label(&self, month: Month) -> String {
        format!("{} {}", month.name(), self.cycle_year)
    }
}
