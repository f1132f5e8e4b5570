use chrono::Month;
use tracing::{debug, info};

use crate::config::CycleConfig;
use super::ledger::CapacityLedger;
use super::quota::{SchoolExceptions, SchoolQuotaTracker};
use super::types::{DeclineReason, Evaluation, MonthChoice, Outcome, PerformerRecord};

/// Mutable state shared by every performer of one run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub ledger: CapacityLedger,
    pub quotas: SchoolQuotaTracker,
}

impl RunContext {
    pub fn new(config: &CycleConfig, exceptions: SchoolExceptions) -> Self {
        Self {
            ledger: CapacityLedger::new(&config.planned_months, config.time_budget, &config.slot_quotas),
            quotas: SchoolQuotaTracker::new(config.school_limit, exceptions),
        }
    }
}

/// Where a performer's evaluation currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
enum EvalState {
    TryFirst,
    TrySecond,
    Assigned { month: Month, minutes: u32 },
    Declined,
}

/// Greedy two-choice assignment over a [`RunContext`].
pub struct AssignmentEngine<'a> {
    config: &'a CycleConfig,
}

impl<'a> AssignmentEngine<'a> {
    pub fn new(config: &'a CycleConfig) -> Self {
        Self { config }
    }

    /// Evaluates one performer, committing to `ctx` on success.
    pub fn evaluate(&self, ctx: &mut RunContext, performer: &PerformerRecord) -> Outcome {
        if performer.eligibility.trim() == self.config.ineligibility_code {
            return Outcome::Declined {
                reasons: vec![DeclineReason::Ineligible],
            };
        }

        let mut reasons = Vec::with_capacity(2);
        let mut state = EvalState::TryFirst;
        loop {
            state = match state {
                EvalState::TryFirst => match self.attempt(ctx, performer, &performer.first_choice) {
                    Ok((month, minutes)) => EvalState::Assigned { month, minutes },
                    Err(reason) => {
                        reasons.push(reason);
                        EvalState::TrySecond
                    }
                },
                EvalState::TrySecond => match self.attempt(ctx, performer, &performer.second_choice) {
                    Ok((month, minutes)) => EvalState::Assigned { month, minutes },
                    Err(reason) => {
                        reasons.push(reason);
                        EvalState::Declined
                    }
                },
                EvalState::Assigned { month, minutes } => return Outcome::Assigned { month, minutes },
                EvalState::Declined => return Outcome::Declined { reasons },
            };
        }
    }

    /// Runs the ordered checks for one month; books the slot if they all pass.
    fn attempt(
        &self,
        ctx: &mut RunContext,
        performer: &PerformerRecord,
        choice: &MonthChoice,
    ) -> Result<(Month, u32), DeclineReason> {
        let month = match choice {
            MonthChoice::NoRequest(_) => return Err(DeclineReason::NoRequest),
            MonthChoice::Month(month) if self.config.is_planned(*month) => *month,
            other => return Err(DeclineReason::InvalidMonth(other.clone())),
        };

        if !ctx.quotas.within_limit(month, &performer.school) {
            return Err(DeclineReason::SchoolLimit {
                school: performer.school.clone(),
                month,
            });
        }

        let minutes = match performer.requested.minutes() {
            Some(minutes) if ctx.ledger.available(month, minutes) => minutes,
            _ => {
                return Err(DeclineReason::SlotUnavailable {
                    requested: performer.requested.clone(),
                    month,
                })
            }
        };

        ctx.ledger.commit(month, minutes);
        ctx.quotas.record(month, &performer.school);
        Ok((month, minutes))
    }

    /// Sorts by attendance (highest first, ties in input order) and evaluates
    /// every performer exactly once.
    pub fn run(&self, ctx: &mut RunContext, mut performers: Vec<PerformerRecord>) -> Vec<Evaluation> {
        performers.sort_by(|a, b| b.attendance.total_cmp(&a.attendance));

        performers
            .into_iter()
            .map(|performer| {
                let outcome = self.evaluate(ctx, &performer);
                debug!(performer = %performer.name, ?outcome, "evaluated performer");
                Evaluation { performer, outcome }
            })
            .collect()
    }
}

/// Everything one assignment pass produced.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// In evaluation (priority) order.
    pub evaluations: Vec<Evaluation>,
    pub context: RunContext,
}

impl RunResult {
    pub fn assigned(&self) -> impl Iterator<Item = &Evaluation> {
        self.evaluations.iter().filter(|e| e.outcome.is_assigned())
    }

    pub fn declined(&self) -> impl Iterator<Item = &Evaluation> {
        self.evaluations.iter().filter(|e| !e.outcome.is_assigned())
    }

    pub fn assigned_count(&self) -> usize {
        self.assigned().count()
    }

    pub fn declined_count(&self) -> usize {
        self.declined().count()
    }
}

/// Runs a complete assignment pass with fresh capacity.
pub fn assign(
    config: &CycleConfig,
    exceptions: SchoolExceptions,
    performers: Vec<PerformerRecord>,
) -> RunResult {
    let mut context = RunContext::new(config, exceptions);
    let engine = AssignmentEngine::new(config);
    let total = performers.len();
    let evaluations = engine.run(&mut context, performers);

    let result = RunResult { evaluations, context };
    info!(
        total,
        assigned = result.assigned_count(),
        declined = result.declined_count(),
        "assignment run finished"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::types::RequestedTime;

    fn performer(name: &str, school: &str, attendance: f64, first: &str, second: &str, minutes: u32) -> PerformerRecord {
        PerformerRecord {
            name: name.to_string(),
            school: school.to_string(),
            attendance,
            eligibility: "Y".to_string(),
            first_choice: MonthChoice::parse(first, "None"),
            second_choice: MonthChoice::parse(second, "None"),
            requested: RequestedTime::Minutes(minutes),
        }
    }

    fn config() -> CycleConfig {
        CycleConfig::default()
    }

    #[test]
    fn first_choice_granted_when_open() {
        let config = config();
        let result = assign(&config, SchoolExceptions::new(), vec![performer("Ada", "North", 10.0, "March", "April", 15)]);

        assert_eq!(result.evaluations[0].outcome, Outcome::Assigned { month: Month::March, minutes: 15 });
        let march = result.context.ledger.remaining(Month::March).unwrap();
        assert_eq!(march.remaining_time, 140);
        assert_eq!(march.remaining_slots.get(&15), Some(&2));
        // Second choice is untouched.
        assert_eq!(result.context.ledger.remaining(Month::April).unwrap().remaining_time, 155);
    }

    #[test]
    fn falls_back_to_second_choice_when_bucket_exhausted() {
        let config = config();
        let mut ctx = RunContext::new(&config, SchoolExceptions::new());
        for _ in 0..3 {
            ctx.ledger.commit(Month::March, 15);
        }
        let engine = AssignmentEngine::new(&config);

        let outcome = engine.evaluate(&mut ctx, &performer("Ben", "North", 5.0, "March", "April", 15));
        assert_eq!(outcome, Outcome::Assigned { month: Month::April, minutes: 15 });
    }

    #[test]
    fn school_limit_pushes_lower_priority_to_second_choice() {
        let config = config();
        let performers = vec![
            performer("Low", "West", 3.0, "March", "May", 10),
            performer("High", "West", 9.0, "March", "April", 10),
        ];
        let result = assign(&config, SchoolExceptions::new(), performers);

        assert_eq!(result.evaluations[0].performer.name, "High");
        assert_eq!(result.evaluations[0].outcome, Outcome::Assigned { month: Month::March, minutes: 10 });
        assert_eq!(result.evaluations[1].performer.name, "Low");
        assert_eq!(result.evaluations[1].outcome, Outcome::Assigned { month: Month::May, minutes: 10 });
    }

    #[test]
    fn school_limit_reason_recorded_before_decline() {
        let config = config();
        let performers = vec![
            performer("High", "West", 9.0, "March", "None", 10),
            performer("Low", "West", 3.0, "March", "None", 10),
        ];
        let result = assign(&config, SchoolExceptions::new(), performers);

        assert_eq!(
            result.evaluations[1].outcome,
            Outcome::Declined {
                reasons: vec![
                    DeclineReason::SchoolLimit { school: "West".to_string(), month: Month::March },
                    DeclineReason::NoRequest,
                ]
            }
        );
    }

    #[test]
    fn exception_table_raises_school_limit() {
        let config = config();
        let mut exceptions = SchoolExceptions::new();
        exceptions.insert("West", 2);
        let performers = vec![
            performer("A", "West", 9.0, "March", "None", 10),
            performer("B", "West", 8.0, "March", "None", 10),
            performer("C", "West", 7.0, "March", "None", 10),
        ];
        let result = assign(&config, exceptions, performers);

        assert!(result.evaluations[0].outcome.is_assigned());
        assert!(result.evaluations[1].outcome.is_assigned());
        assert!(!result.evaluations[2].outcome.is_assigned());
        assert_eq!(result.context.quotas.count(Month::March, "West"), 2);
    }

    #[test]
    fn ineligible_declines_with_single_reason() {
        let config = config();
        let mut p = performer("Cy", "East", 99.0, "March", "Smarch", 15);
        p.eligibility = "NS".to_string();
        let result = assign(&config, SchoolExceptions::new(), vec![p]);

        assert_eq!(
            result.evaluations[0].outcome,
            Outcome::Declined { reasons: vec![DeclineReason::Ineligible] }
        );
        assert_eq!(result.context.ledger.remaining(Month::March).unwrap().remaining_time, 155);
    }

    #[test]
    fn both_choices_none_declines_with_two_no_request_reasons() {
        let config = config();
        let result = assign(&config, SchoolExceptions::new(), vec![performer("Di", "East", 1.0, "None", "None", 5)]);

        assert_eq!(
            result.evaluations[0].outcome,
            Outcome::Declined { reasons: vec![DeclineReason::NoRequest, DeclineReason::NoRequest] }
        );
    }

    #[test]
    fn no_request_first_still_allows_second_choice() {
        let config = config();
        let result = assign(&config, SchoolExceptions::new(), vec![performer("Ed", "East", 1.0, "None", "June", 5)]);
        assert_eq!(result.evaluations[0].outcome, Outcome::Assigned { month: Month::June, minutes: 5 });
    }

    #[test]
    fn invalid_month_and_duration_are_declined_not_fatal() {
        let config = config();
        let mut odd = performer("Flo", "East", 4.0, "January", "Smarch", 15);
        odd.school = "South".to_string();
        let mut bad_time = performer("Gus", "East", 3.0, "March", "April", 0);
        bad_time.requested = RequestedTime::Unreadable("long".to_string());
        let unknown_bucket = performer("Hal", "North", 2.0, "March", "None", 7);

        let result = assign(&config, SchoolExceptions::new(), vec![odd, bad_time, unknown_bucket]);

        let reasons: Vec<Vec<String>> = result
            .evaluations
            .iter()
            .map(|e| match &e.outcome {
                Outcome::Declined { reasons } => reasons.iter().map(|r| r.to_string()).collect(),
                Outcome::Assigned { .. } => panic!("{} should be declined", e.performer.name),
            })
            .collect();

        assert_eq!(reasons[0], vec!["January is not a valid request", "Smarch is not a valid request"]);
        assert_eq!(
            reasons[1],
            vec!["long-minute slot unavailable for March", "long-minute slot unavailable for April"]
        );
        assert_eq!(
            reasons[2],
            vec!["7-minute slot unavailable for March", "no request, deferring to manual assignment"]
        );
    }

    #[test]
    fn abbreviated_or_lowercase_months_are_not_valid_requests() {
        let config = config();
        let performers = vec![
            performer("Ada", "North", 9.0, "mar", "None", 15),
            performer("Bo", "South", 8.0, "jan", "apr", 15),
        ];
        let result = assign(&config, SchoolExceptions::new(), performers);

        assert_eq!(
            result.evaluations[0].outcome,
            Outcome::Declined {
                reasons: vec![
                    DeclineReason::InvalidMonth(MonthChoice::Unrecognized("mar".to_string())),
                    DeclineReason::NoRequest,
                ]
            }
        );
        match &result.evaluations[1].outcome {
            Outcome::Declined { reasons } => {
                let text: Vec<String> = reasons.iter().map(|r| r.to_string()).collect();
                assert_eq!(text, vec!["jan is not a valid request", "apr is not a valid request"]);
            }
            other => panic!("expected decline, got {:?}", other),
        }
        assert_eq!(result.context.ledger.remaining(Month::March).unwrap().remaining_time, 155);
    }

    #[test]
    fn ties_keep_input_order() {
        let config = config();
        let performers = vec![
            performer("First", "A", 5.0, "March", "None", 30),
            performer("Second", "B", 5.0, "March", "None", 30),
        ];
        let result = assign(&config, SchoolExceptions::new(), performers);

        assert_eq!(result.evaluations[0].performer.name, "First");
        assert!(result.evaluations[0].outcome.is_assigned());
        assert!(!result.evaluations[1].outcome.is_assigned());
    }

    #[test]
    fn declined_performer_is_not_retried() {
        let config = config();
        let mut ctx = RunContext::new(&config, SchoolExceptions::new());
        let engine = AssignmentEngine::new(&config);
        let performers = vec![
            performer("Top", "A", 10.0, "March", "None", 30),
            performer("Mid", "B", 8.0, "March", "None", 30),
        ];
        let evaluations = engine.run(&mut ctx, performers);

        assert!(!evaluations[1].outcome.is_assigned());
        assert_eq!(ctx.ledger.remaining(Month::March).unwrap().remaining_slots.get(&30), Some(&0));
        assert_eq!(evaluations.len(), 2);
    }
}
