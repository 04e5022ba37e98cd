/// Longest bookable appointment: one full day.
pub const MAX_DURATION_MINUTES: i64 = 24 * 60;

pub const MAX_CLIENT_NAME_LEN: usize = 120;
pub const MAX_RESOURCE_NAME_LEN: usize = 64;
pub const MAX_RESOURCES: usize = 64;

/// Appointments loaded for a single day before the board refuses to index them.
pub const MAX_APPOINTMENTS_PER_DAY: usize = 4096;

pub const MAX_STEP_MINUTES: u32 = 60;
pub const MAX_DAY_END_HOUR: u32 = 24;
