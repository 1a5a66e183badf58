// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Timer-start job construction from timer event definitions.
//!
//! Supported expressions:
//!
//! | Field | Format | Due date |
//! |-------|--------|----------|
//! | `time_date` | RFC 3339, or `YYYY-MM-DDTHH:MM:SS` read as UTC | the date itself |
//! | `time_duration` | ISO-8601 duration (`P1DT2H`) | now + duration |
//! | `time_cycle` | `R[n]/[start/]duration` | next occurrence at or after now |
//! | `time_cycle` | cron, seconds field optional (`0 0/5 * * * ?`) | next occurrence after now |
//!
//! When several fields are set the date wins over the cycle, and the cycle
//! wins over the duration. Anything that does not parse produces no job.

use chrono::{DateTime, Months, NaiveDateTime, TimeDelta, Utc};
use croner::Cron;
use tracing::debug;

use crate::entities::{NO_TENANT_ID, TIMER_START_EVENT_HANDLER, TimerJob};
use crate::process_model::TimerEventDefinition;

/// Upper bound on steps taken when advancing a cycle whose start lies in the past.
const MAX_CYCLE_STEPS: u32 = 100_000;

/// Build the handler configuration of a timer-start job.
///
/// The configuration identifies the start event to trigger and, when set, the
/// date after which the timer stops firing.
pub fn handler_configuration(activity_id: &str, end_date: Option<&str>) -> String {
    let mut config = serde_json::json!({ "activityId": activity_id });
    if let Some(end_date) = end_date {
        config["timerEndDate"] = serde_json::Value::String(end_date.to_string());
    }
    config.to_string()
}

/// Build an unscheduled timer-start job for `start_event_id` from its timer
/// definition.
///
/// The job is not bound to a process definition or tenant yet. Returns `None`
/// when the definition yields no usable timer.
pub fn timer_start_job(
    definition: &TimerEventDefinition,
    start_event_id: &str,
    now: DateTime<Utc>,
) -> Option<TimerJob> {
    let end_date = match definition.end_date.as_deref() {
        Some(raw) => match parse_date(raw) {
            Some(date) => Some(date),
            None => {
                debug!(start_event_id, end_date = raw, "Unparseable timer end date");
                return None;
            }
        },
        None => None,
    };

    let schedule = if let Some(date) = definition.time_date.as_deref() {
        parse_date(date).map(|due| (due, None, None))
    } else if let Some(cycle) = definition.time_cycle.as_deref() {
        next_cycle_occurrence(cycle, now)
            .map(|(due, iterations)| (due, Some(cycle.to_string()), iterations))
    } else if let Some(duration) = definition.time_duration.as_deref() {
        IsoDuration::parse(duration)
            .and_then(|d| d.add_to(now))
            .map(|due| (due, None, None))
    } else {
        None
    };

    let Some((due_date, repeat, max_iterations)) = schedule else {
        debug!(start_event_id, ?definition, "Timer definition yields no due date");
        return None;
    };

    if let Some(end) = end_date
        && due_date > end
    {
        debug!(start_event_id, %due_date, %end, "Timer is due after its end date");
        return None;
    }

    Some(TimerJob {
        handler_type: TIMER_START_EVENT_HANDLER.to_string(),
        handler_configuration: Some(handler_configuration(
            start_event_id,
            definition.end_date.as_deref(),
        )),
        process_definition_id: None,
        process_instance_id: None,
        tenant_id: NO_TENANT_ID.to_string(),
        due_date,
        repeat,
        max_iterations,
        end_date,
    })
}

/// Parse an absolute date: RFC 3339, or a naive timestamp interpreted as UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Resolve a cycle to the next due date and the repeat count.
///
/// `R[n]/[start/]duration` repeats a duration; anything else is read as a
/// cron expression that repeats without limit.
fn next_cycle_occurrence(
    cycle: &str,
    now: DateTime<Utc>,
) -> Option<(DateTime<Utc>, Option<i32>)> {
    let cycle = cycle.trim();
    if !cycle.starts_with('R') {
        return next_cron_occurrence(cycle, now).map(|due| (due, None));
    }

    let parts: Vec<&str> = cycle.split('/').collect();
    let repeat = parts.first()?.strip_prefix('R')?;
    let iterations = if repeat.is_empty() {
        None
    } else {
        Some(repeat.parse::<i32>().ok().filter(|n| *n > 0)?)
    };

    match parts.as_slice() {
        [_, duration] => {
            let due = IsoDuration::parse(duration)?.add_to(now)?;
            Some((due, iterations))
        }
        [_, start, duration] => {
            let start = parse_date(start)?;
            let duration = IsoDuration::parse(duration)?;
            let mut due = start;
            let mut fired: u32 = 0;
            while due < now {
                fired += 1;
                if fired > MAX_CYCLE_STEPS {
                    return None;
                }
                if let Some(limit) = iterations
                    && fired >= limit as u32
                {
                    return None;
                }
                due = duration.add_to(due)?;
            }
            Some((due, iterations))
        }
        _ => None,
    }
}

/// Next occurrence of a cron expression strictly after `now`.
fn next_cron_occurrence(expression: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let cron = match Cron::new(expression).with_seconds_optional().parse() {
        Ok(cron) => cron,
        Err(e) => {
            debug!(expression, error = %e, "Unparseable cron cycle");
            return None;
        }
    };

    cron.find_next_occurrence(&now, false).ok()
}

/// An ISO-8601 duration (`PnYnMnWnDTnHnMnS`).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IsoDuration {
    /// Calendar years.
    pub years: u32,
    /// Calendar months.
    pub months: u32,
    /// Weeks.
    pub weeks: u32,
    /// Days.
    pub days: u32,
    /// Hours.
    pub hours: u32,
    /// Minutes.
    pub minutes: u32,
    /// Seconds, possibly fractional.
    pub seconds: f64,
}

impl IsoDuration {
    /// Parse an ISO-8601 duration. Only the seconds component may be fractional.
    pub fn parse(raw: &str) -> Option<Self> {
        let rest = raw.trim().strip_prefix('P')?;
        let (date_part, time_part) = match rest.split_once('T') {
            Some((date, time)) => {
                if time.is_empty() {
                    return None;
                }
                (date, Some(time))
            }
            None => (rest, None),
        };

        let mut duration = IsoDuration::default();
        let mut any = false;

        for (designator, value) in components(date_part, &['Y', 'M', 'W', 'D'])? {
            let whole = whole(value)?;
            match designator {
                'Y' => duration.years = whole,
                'M' => duration.months = whole,
                'W' => duration.weeks = whole,
                _ => duration.days = whole,
            }
            any = true;
        }

        if let Some(time_part) = time_part {
            for (designator, value) in components(time_part, &['H', 'M', 'S'])? {
                match designator {
                    'H' => duration.hours = whole(value)?,
                    'M' => duration.minutes = whole(value)?,
                    _ => duration.seconds = value,
                }
                any = true;
            }
        }

        any.then_some(duration)
    }

    /// Add this duration to `date`, applying calendar units first.
    pub fn add_to(&self, date: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let months = self.years.checked_mul(12)?.checked_add(self.months)?;
        let date = date.checked_add_months(Months::new(months))?;

        let days = i64::from(self.weeks) * 7 + i64::from(self.days);
        let millis = (self.seconds * 1000.0).round() as i64;
        let delta = TimeDelta::try_days(days)?
            .checked_add(&TimeDelta::try_hours(i64::from(self.hours))?)?
            .checked_add(&TimeDelta::try_minutes(i64::from(self.minutes))?)?
            .checked_add(&TimeDelta::try_milliseconds(millis)?)?;

        date.checked_add_signed(delta)
    }
}

/// Split `part` into (designator, value) pairs, requiring designators in the
/// order given by `allowed` with no repeats.
fn components(part: &str, allowed: &[char]) -> Option<Vec<(char, f64)>> {
    let mut result = Vec::new();
    let mut number = String::new();
    let mut next_allowed = 0;

    for c in part.chars() {
        if c.is_ascii_digit() || c == '.' || c == ',' {
            number.push(if c == ',' { '.' } else { c });
            continue;
        }
        let position = allowed[next_allowed..].iter().position(|a| *a == c)?;
        if number.is_empty() {
            return None;
        }
        let value: f64 = number.parse().ok()?;
        result.push((c, value));
        number.clear();
        next_allowed += position + 1;
    }

    if !number.is_empty() {
        return None;
    }
    Some(result)
}

fn whole(value: f64) -> Option<u32> {
    if value.fract() != 0.0 || value < 0.0 || value > f64::from(u32::MAX) {
        return None;
    }
    Some(value as u32)
}
