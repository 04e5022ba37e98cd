use ulid::Ulid;

use crate::model::*;

use super::index::{BookedInterval, IntervalIndex};

/// First booked interval on `resource` that overlaps `candidate`, skipping `exclude`.
///
/// Half-open: an interval ending exactly at `candidate.start` does not conflict.
/// Unassigned (`None`) and unknown resources never conflict.
pub fn find_overlap<'a>(
    index: &'a IntervalIndex,
    resource: Option<&str>,
    candidate: &Span,
    exclude: Option<Ulid>,
) -> Option<&'a BookedInterval> {
    let resource = resource?;
    index
        .overlapping(resource, candidate)
        .filter(|i| Some(i.appointment_id) != exclude)
        .find(|i| i.span.overlaps(candidate))
}

/// Pairs of intervals on the same resource that violate exclusivity.
/// Empty whenever the index was built from a consistent day.
pub fn exclusivity_violations(index: &IntervalIndex, resource: &str) -> Vec<(Ulid, Ulid)> {
    let list = index.intervals(resource);
    let mut out = Vec::new();
    for (i, a) in list.iter().enumerate() {
        for b in &list[i + 1..] {
            if b.span.start >= a.span.end {
                break;
            }
            out.push((a.appointment_id, b.appointment_id));
        }
    }
    out
}
