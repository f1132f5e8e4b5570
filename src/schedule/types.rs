use std::fmt;

use chrono::Month;

const MONTHS: [Month; 12] = [
    Month::January,
    Month::February,
    Month::March,
    Month::April,
    Month::May,
    Month::June,
    Month::July,
    Month::August,
    Month::September,
    Month::October,
    Month::November,
    Month::December,
];

/// One of a performer's two month preferences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonthChoice {
    /// The "no request" sentinel, as written in the input.
    NoRequest(String),
    /// A full month name, matched exactly.
    Month(Month),
    /// Anything else, kept verbatim.
    Unrecognized(String),
}

impl MonthChoice {
    pub fn parse(raw: &str, no_request: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed == no_request {
            return MonthChoice::NoRequest(trimmed.to_string());
        }
        match MONTHS.iter().find(|m| m.name() == trimmed) {
            Some(&month) => MonthChoice::Month(month),
            None => MonthChoice::Unrecognized(trimmed.to_string()),
        }
    }
}

impl fmt::Display for MonthChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonthChoice::Month(month) => write!(f, "{}", month.name()),
            MonthChoice::NoRequest(raw) | MonthChoice::Unrecognized(raw) if raw.is_empty() => write!(f, "(blank)"),
            MonthChoice::NoRequest(raw) | MonthChoice::Unrecognized(raw) => write!(f, "{}", raw),
        }
    }
}

/// Requested slot length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestedTime {
    Minutes(u32),
    /// Could not be read as a whole number of minutes.
    Unreadable(String),
}

impl RequestedTime {
    pub fn parse(raw: &str) -> Self {
        match parse_whole(raw) {
            Some(minutes) => RequestedTime::Minutes(minutes),
            None => RequestedTime::Unreadable(raw.trim().to_string()),
        }
    }

    pub fn minutes(&self) -> Option<u32> {
        match self {
            RequestedTime::Minutes(minutes) => Some(*minutes),
            RequestedTime::Unreadable(_) => None,
        }
    }
}

impl fmt::Display for RequestedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestedTime::Minutes(minutes) => write!(f, "{}", minutes),
            RequestedTime::Unreadable(raw) if raw.is_empty() => write!(f, "(blank)"),
            RequestedTime::Unreadable(raw) => write!(f, "{}", raw),
        }
    }
}

/// Reads a non-negative whole number, accepting spreadsheet-style "15.0".
pub fn parse_whole(raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<u32>() {
        return Some(value);
    }
    let value = trimmed.parse::<f64>().ok()?;
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 {
        Some(value as u32)
    } else {
        None
    }
}

/// A candidate performer as read from one input row.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformerRecord {
    pub name: String,
    pub school: String,
    pub attendance: f64,
    pub eligibility: String,
    pub first_choice: MonthChoice,
    pub second_choice: MonthChoice,
    pub requested: RequestedTime,
}

/// Why a single month attempt (or the whole performer) was turned down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclineReason {
    Ineligible,
    NoRequest,
    InvalidMonth(MonthChoice),
    SchoolLimit { school: String, month: Month },
    SlotUnavailable { requested: RequestedTime, month: Month },
}

impl fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclineReason::Ineligible => write!(f, "ability to perform in this half is uncertain"),
            DeclineReason::NoRequest => write!(f, "no request, deferring to manual assignment"),
            DeclineReason::InvalidMonth(choice) => write!(f, "{} is not a valid request", choice),
            DeclineReason::SchoolLimit { school, month } => {
                write!(f, "school limit for {} reached for {}", school, month.name())
            }
            DeclineReason::SlotUnavailable { requested, month } => {
                write!(f, "{}-minute slot unavailable for {}", requested, month.name())
            }
        }
    }
}

/// Terminal result of evaluating one performer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The granted duration always equals the requested one.
    Assigned { month: Month, minutes: u32 },
    Declined { reasons: Vec<DeclineReason> },
}

impl Outcome {
    pub fn is_assigned(&self) -> bool {
        matches!(self, Outcome::Assigned { .. })
    }
}

/// A performer paired with the outcome of its single evaluation.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub performer: PerformerRecord,
    pub outcome: Outcome,
}
