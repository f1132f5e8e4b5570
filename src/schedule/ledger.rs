use std::collections::{BTreeMap, HashMap};

use chrono::Month;
use serde::Serialize;

/// Remaining time and slot counts for one planned month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthCapacity {
    pub remaining_time: u32,
    pub remaining_slots: BTreeMap<u32, u32>, // duration bucket -> slots left
}

/// Capacity of every planned month for a single run.
///
/// Entries are created up front and never added or removed afterwards; only
/// [`CapacityLedger::commit`] changes them.
#[derive(Debug, Clone)]
pub struct CapacityLedger {
    months: HashMap<Month, MonthCapacity>,
}

impl CapacityLedger {
    pub fn new(months: &[Month], time_budget: u32, slot_quotas: &BTreeMap<u32, u32>) -> Self {
        let months = months
            .iter()
            .map(|&month| {
                (
                    month,
                    MonthCapacity {
                        remaining_time: time_budget,
                        remaining_slots: slot_quotas.clone(),
                    },
                )
            })
            .collect();
        Self { months }
    }

    /// Whether `month` can still fit a `minutes`-long slot.
    ///
    /// Unknown months and unrecognized duration buckets are never available.
    pub fn available(&self, month: Month, minutes: u32) -> bool {
        match self.months.get(&month) {
            Some(capacity) => {
                capacity.remaining_time >= minutes
                    && capacity.remaining_slots.get(&minutes).copied().unwrap_or(0) > 0
            }
            None => false,
        }
    }

    /// Books a slot. Callers check [`available`](Self::available) first.
    pub fn commit(&mut self, month: Month, minutes: u32) {
        if let Some(capacity) = self.months.get_mut(&month) {
            capacity.remaining_time = capacity.remaining_time.saturating_sub(minutes);
            if let Some(slots) = capacity.remaining_slots.get_mut(&minutes) {
                *slots = slots.saturating_sub(1);
            }
        }
    }

    pub fn remaining(&self, month: Month) -> Option<&MonthCapacity> {
        self.months.get(&month)
    }
}
