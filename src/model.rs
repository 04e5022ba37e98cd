use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::limits::MAX_DURATION_MINUTES;

/// Minutes since local midnight of the board date. The engine works only in these.
pub type Minute = i64;

pub const MINUTES_PER_HOUR: Minute = 60;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Minute,
    pub end: Minute,
}

impl Span {
    pub fn new(start: Minute, end: Minute) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration(&self) -> Minute {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_minute(&self, t: Minute) -> bool {
        self.start <= t && t < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Normalize a stored or requested duration.
///
/// Missing and non-positive values fall back to `default`; anything longer
/// than a day is cut to a day.
pub fn clamp_duration(value: Option<i64>, default: i64) -> i64 {
    match value {
        Some(v) if v > 0 => v.min(MAX_DURATION_MINUTES),
        _ => default.clamp(1, MAX_DURATION_MINUTES),
    }
}

/// Render an offset as `HH:MM`. Offsets past midnight keep counting hours (`24:00`).
pub fn format_minute(m: Minute) -> String {
    format!("{:02}:{:02}", m.div_euclid(60), m.rem_euclid(60))
}

/// Progress of an appointment on the day. Irrelevant to scheduling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Upcoming,
    InProgress,
    Done,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Upcoming => "upcoming",
            Phase::InProgress => "in_progress",
            Phase::Done => "done",
        }
    }
}

/// A booking as the record store keeps it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Ulid,
    pub client_name: String,
    /// `None` = unassigned; exempt from conflict checks.
    pub resource_name: Option<String>,
    pub resource_color: Option<String>,
    pub start: NaiveDateTime,
    /// Raw stored value; use [`Appointment::duration`] for scheduling.
    pub duration_minutes: Option<i64>,
    pub phase: Phase,
}

impl Appointment {
    pub fn duration(&self, default: i64) -> i64 {
        clamp_duration(self.duration_minutes, default)
    }

    pub fn end(&self, default: i64) -> NaiveDateTime {
        self.start + Duration::minutes(self.duration(default))
    }

    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }
}

/// The bookable `[dayStart, dayEnd)` window of one calendar date, plus the grid step.
///
/// This is the only place where wall-clock values become [`Minute`] offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub span: Span,
    pub step: Minute,
}

impl DayWindow {
    pub fn new(date: NaiveDate, start_hour: u32, end_hour: u32, step_minutes: u32) -> Self {
        Self {
            date,
            span: Span::new(
                start_hour as Minute * MINUTES_PER_HOUR,
                end_hour as Minute * MINUTES_PER_HOUR,
            ),
            step: step_minutes.max(1) as Minute,
        }
    }

    pub fn start(&self) -> Minute {
        self.span.start
    }

    pub fn end(&self) -> Minute {
        self.span.end
    }

    pub fn midnight(&self) -> NaiveDateTime {
        self.date.and_time(NaiveTime::MIN)
    }

    /// Offset of `at` from this date's midnight, seconds floored.
    /// Instants on other dates map outside `[0, 1440)`.
    pub fn offset_of(&self, at: NaiveDateTime) -> Minute {
        at.signed_duration_since(self.midnight())
            .num_seconds()
            .div_euclid(60)
    }

    pub fn instant_at(&self, offset: Minute) -> NaiveDateTime {
        self.midnight() + Duration::minutes(offset)
    }

    /// Offset of a wall-clock time on this date.
    pub fn offset_of_time(&self, time: NaiveTime) -> Minute {
        time.hour() as Minute * MINUTES_PER_HOUR + time.minute() as Minute
    }

    pub fn contains(&self, candidate: &Span) -> bool {
        self.span.contains_span(candidate)
    }
}

/// WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    AppointmentCreated { appointment: Appointment },
    AppointmentUpdated { appointment: Appointment },
    AppointmentDeleted { id: Ulid },
}

impl Event {
    pub fn appointment_id(&self) -> Ulid {
        match self {
            Event::AppointmentCreated { appointment } | Event::AppointmentUpdated { appointment } => {
                appointment.id
            }
            Event::AppointmentDeleted { id } => *id,
        }
    }
}
