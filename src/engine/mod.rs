mod conflict;
mod error;
pub mod grid;
mod index;
mod search;
#[cfg(test)]
mod tests;

pub use conflict::{exclusivity_violations, find_overlap};
pub use error::{Placement, Rejection};
pub use grid::{generate_slots, slot_starts};
pub use index::{BookedInterval, IntervalIndex};
pub use search::{
    find_next_free_start, find_next_free_start_in_gaps, free_spans, merge_overlapping,
    subtract_intervals,
};

use std::time::Instant;

use chrono::NaiveDate;
use ulid::Ulid;

use crate::config::SchedulerConfig;
use crate::directory::Resource;
use crate::model::*;
use crate::observability;

/// Stateless placement policy for one calendar day.
///
/// Every call reads only the [`IntervalIndex`] it is given; nothing is cached
/// between calls.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    config: SchedulerConfig,
    window: DayWindow,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, date: NaiveDate) -> Self {
        Self {
            config,
            window: DayWindow::new(
                date,
                config.day_start_hour,
                config.day_end_hour,
                config.step_minutes,
            ),
        }
    }

    pub fn window(&self) -> &DayWindow {
        &self.window
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn date(&self) -> NaiveDate {
        self.window.date
    }

    pub fn build_index(&self, appointments: &[Appointment], resources: &[Resource]) -> IntervalIndex {
        IntervalIndex::build(
            self.window.date,
            appointments,
            resources,
            self.config.default_duration,
        )
    }

    pub fn clamp(&self, duration: Option<i64>) -> Minute {
        clamp_duration(duration, self.config.default_duration)
    }

    /// Slot boundaries of the configured grid, as offsets.
    pub fn slot_starts(&self) -> Vec<Minute> {
        slot_starts(
            self.config.day_start_hour,
            self.config.day_end_hour,
            self.config.step_minutes,
        )
    }

    pub fn validate_placement(
        &self,
        index: &IntervalIndex,
        resource: Option<&str>,
        start: Minute,
        duration: Option<i64>,
        exclude: Option<Ulid>,
    ) -> Placement {
        let started = Instant::now();
        let placement = self.decide(index, resource, start, self.clamp(duration), exclude);
        metrics::histogram!(observability::VALIDATION_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        metrics::counter!(
            observability::PLACEMENTS_TOTAL,
            "outcome" => observability::placement_label(&placement)
        )
        .increment(1);
        placement
    }

    fn decide(
        &self,
        index: &IntervalIndex,
        resource: Option<&str>,
        start: Minute,
        duration: Minute,
        exclude: Option<Ulid>,
    ) -> Placement {
        let candidate = Span::new(start, start + duration);
        if !self.window.contains(&candidate) {
            return Placement::Rejected(Rejection::OutOfWindow {
                candidate,
                window: self.window.span,
            });
        }

        if let Some(hit) = find_overlap(index, resource, &candidate, exclude) {
            let suggestion =
                find_next_free_start(index, &self.window, resource, start, duration, exclude);
            return Placement::Rejected(Rejection::Overlap {
                conflict: hit.clone(),
                suggestion,
            });
        }

        Placement::Accepted(candidate)
    }

    /// Whether a fresh booking of `duration` would be accepted at `start`.
    pub fn can_fit(
        &self,
        index: &IntervalIndex,
        resource: Option<&str>,
        start: Minute,
        duration: Option<i64>,
    ) -> bool {
        self.decide(index, resource, start, self.clamp(duration), None)
            .is_accepted()
    }

    pub fn find_next_free_start(
        &self,
        index: &IntervalIndex,
        resource: Option<&str>,
        from: Minute,
        duration: Option<i64>,
        exclude: Option<Ulid>,
    ) -> Option<Minute> {
        find_next_free_start(index, &self.window, resource, from, self.clamp(duration), exclude)
    }

    /// Free gaps of `resource` no shorter than `min_duration`.
    pub fn free_spans(
        &self,
        index: &IntervalIndex,
        resource: Option<&str>,
        min_duration: Option<Minute>,
    ) -> Vec<Span> {
        let mut free = free_spans(index, &self.window, resource, None);
        if let Some(min) = min_duration {
            free.retain(|span| span.duration() >= min);
        }
        free
    }
}
