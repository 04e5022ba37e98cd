use crate::model::{format_minute, Minute, MINUTES_PER_HOUR};

/// Slot boundaries from `start_hour:00` through `end_hour:00` inclusive.
///
/// Minutes inside an hour run `0, step, 2*step, ...` while below 60, so a
/// step that does not divide the hour drops the remainder rather than
/// spilling into the next hour. Nothing is emitted after `end_hour:00`.
pub fn slot_starts(start_hour: u32, end_hour: u32, step_minutes: u32) -> Vec<Minute> {
    if step_minutes == 0 || start_hour > end_hour {
        return Vec::new();
    }
    let step = step_minutes as Minute;
    let mut out = Vec::new();
    for h in start_hour..=end_hour {
        let base = h as Minute * MINUTES_PER_HOUR;
        if h == end_hour {
            out.push(base);
            break;
        }
        let mut m = 0;
        while m < MINUTES_PER_HOUR {
            out.push(base + m);
            m += step;
        }
    }
    out
}

/// `HH:MM` labels for [`slot_starts`].
pub fn generate_slots(start_hour: u32, end_hour: u32, step_minutes: u32) -> Vec<String> {
    slot_starts(start_hour, end_hour, step_minutes)
        .into_iter()
        .map(format_minute)
        .collect()
}
