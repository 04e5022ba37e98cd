use ulid::Ulid;

use crate::model::*;

use super::conflict::find_overlap;
use super::index::IntervalIndex;

// ── Free-slot search ──────────────────────────────────────────────

/// Earliest grid-aligned start at or after `from` (snapped back to the grid)
/// where `duration` minutes fit on `resource` before the day ends.
///
/// A non-positive `duration` finds nothing.
///
/// `from` is snapped *backward* to the grid relative to the day start, so a
/// search from 10:07 on a 15-minute grid may answer 10:00.
pub fn find_next_free_start(
    index: &IntervalIndex,
    window: &DayWindow,
    resource: Option<&str>,
    from: Minute,
    duration: Minute,
    exclude: Option<Ulid>,
) -> Option<Minute> {
    let latest_start = window.end() - duration;
    if duration < 1 || from > latest_start {
        return None;
    }

    let mut cur = snap_to_grid(window, from).max(window.start());
    while cur <= latest_start {
        let candidate = Span::new(cur, cur + duration);
        if find_overlap(index, resource, &candidate, exclude).is_none() {
            return Some(cur);
        }
        cur += window.step;
    }
    None
}

/// Same answer as [`find_next_free_start`], computed by walking the free gaps
/// instead of every grid slot: O(booked) rather than O(slots).
pub fn find_next_free_start_in_gaps(
    index: &IntervalIndex,
    window: &DayWindow,
    resource: Option<&str>,
    from: Minute,
    duration: Minute,
    exclude: Option<Ulid>,
) -> Option<Minute> {
    let latest_start = window.end() - duration;
    if duration < 1 || from > latest_start {
        return None;
    }
    let begin = snap_to_grid(window, from).max(window.start());

    for gap in free_spans(index, window, resource, exclude) {
        if gap.end <= begin {
            continue;
        }
        let first = ceil_to_grid(window, gap.start.max(begin));
        if first <= latest_start && first + duration <= gap.end {
            return Some(first);
        }
    }
    None
}

/// Free gaps of `resource` inside the day window: the window minus every
/// booked interval (except `exclude`). Unassigned resources are free all day.
pub fn free_spans(
    index: &IntervalIndex,
    window: &DayWindow,
    resource: Option<&str>,
    exclude: Option<Ulid>,
) -> Vec<Span> {
    let booked: Vec<Span> = match resource {
        Some(name) => index
            .intervals(name)
            .iter()
            .filter(|i| Some(i.appointment_id) != exclude)
            .map(|i| i.span)
            .collect(),
        None => Vec::new(),
    };
    // intervals() is sorted by start; merging keeps subtract_intervals linear
    subtract_intervals(&[window.span], &merge_overlapping(&booked))
}

/// Round `t` down to the grid anchored at the window start.
fn snap_to_grid(window: &DayWindow, t: Minute) -> Minute {
    t - (t - window.start()).rem_euclid(window.step)
}

fn ceil_to_grid(window: &DayWindow, t: Minute) -> Minute {
    let snapped = snap_to_grid(window, t);
    if snapped == t { t } else { snapped + window.step }
}

// ── Interval arithmetic ───────────────────────────────────────────

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end {
                last.end = last.end.max(span.end);
                continue;
            }
        merged.push(span);
    }
    merged
}

/// `base` minus `to_remove`; both sorted by start, `to_remove` disjoint.
pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(Span::new(current_start, current_end));
        }
    }

    result
}
