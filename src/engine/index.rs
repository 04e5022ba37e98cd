use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::directory::Resource;
use crate::model::*;

/// One appointment's occupancy of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedInterval {
    pub appointment_id: Ulid,
    pub span: Span,
    /// Client name, for conflict messages.
    pub label: String,
}

/// Per-resource booked intervals for one calendar day, sorted by `span.start`.
///
/// A read-only view rebuilt from the day's appointments; the caller's
/// collection stays the source of truth.
#[derive(Debug, Clone, Default)]
pub struct IntervalIndex {
    by_resource: HashMap<String, Vec<BookedInterval>>,
    unindexed: Vec<Ulid>,
}

impl IntervalIndex {
    pub fn build(
        date: NaiveDate,
        appointments: &[Appointment],
        resources: &[Resource],
        default_duration: i64,
    ) -> Self {
        let mut by_resource: HashMap<String, Vec<BookedInterval>> = resources
            .iter()
            .map(|r| (r.name.clone(), Vec::new()))
            .collect();
        let mut unindexed = Vec::new();
        let window = DayWindow::new(date, 0, 24, 1);

        for ap in appointments {
            let Some(list) = ap
                .resource_name
                .as_deref()
                .filter(|_| ap.date() == date)
                .and_then(|name| by_resource.get_mut(name))
            else {
                unindexed.push(ap.id);
                continue;
            };
            let start = window.offset_of(ap.start);
            list.push(BookedInterval {
                appointment_id: ap.id,
                span: Span::new(start, start + ap.duration(default_duration)),
                label: ap.client_name.clone(),
            });
        }

        for list in by_resource.values_mut() {
            list.sort_by_key(|i| (i.span.start, i.appointment_id));
        }

        if !unindexed.is_empty() {
            tracing::debug!(count = unindexed.len(), %date, "appointments left out of interval index");
        }

        Self { by_resource, unindexed }
    }

    /// Booked intervals for `resource`; empty for unknown names.
    pub fn intervals(&self, resource: &str) -> &[BookedInterval] {
        self.by_resource
            .get(resource)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains_resource(&self, resource: &str) -> bool {
        self.by_resource.contains_key(resource)
    }

    /// Appointments that are unassigned, on an unknown resource, or on another date.
    pub fn unindexed(&self) -> &[Ulid] {
        &self.unindexed
    }

    /// Intervals whose span overlaps `query`.
    /// Uses binary search to skip intervals starting at or after `query.end`.
    pub fn overlapping<'a>(
        &'a self,
        resource: &str,
        query: &Span,
    ) -> impl Iterator<Item = &'a BookedInterval> + use<'a> {
        let list = self.intervals(resource);
        let query = *query;
        // Everything at index >= right_bound starts at or after query.end → can't overlap.
        let right_bound = list.partition_point(|i| i.span.start < query.end);
        list[..right_bound]
            .iter()
            .filter(move |i| i.span.end > query.start)
    }
}
