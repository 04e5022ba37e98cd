use std::fmt;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use ulid::Ulid;

use crate::config::{ConfigError, SchedulerConfig};
use crate::directory::{Resource, ResourceDirectory};
use crate::engine::{
    exclusivity_violations, BookedInterval, IntervalIndex, Placement, Rejection, Scheduler,
};
use crate::limits::*;
use crate::model::*;
use crate::observability;
use crate::store::{RecordStore, StoreError};

pub const DEFAULT_UNDO_WINDOW_MS: i64 = 10_000;

pub(crate) fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Request to book a client on a stylist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppointment {
    pub client_name: String,
    /// `None` books the client without a stylist; only the working window applies.
    pub resource_name: Option<String>,
    pub start: NaiveDateTime,
    /// `None` uses the configured default.
    pub duration_minutes: Option<i64>,
}

/// The appointments of one calendar date, ascending by start.
#[derive(Debug, Clone)]
pub struct DaySnapshot {
    pub date: NaiveDate,
    pub appointments: Vec<Appointment>,
}

/// Handle for re-inserting a just-deleted appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UndoToken(pub Ulid);

#[derive(Debug, Clone)]
struct UndoEntry {
    appointment: Appointment,
    expires_at: i64,
}

/// A rejection pinned to the date it was computed for, so offsets can be
/// turned back into wall-clock instants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedPlacement {
    pub date: NaiveDate,
    pub rejection: Rejection,
}

impl RejectedPlacement {
    fn at(&self, offset: Minute) -> NaiveDateTime {
        DayWindow::new(self.date, 0, 24, 1).instant_at(offset)
    }

    /// `(start, end, client)` of the colliding booking, for overlaps.
    pub fn conflict(&self) -> Option<(NaiveDateTime, NaiveDateTime, &str)> {
        match &self.rejection {
            Rejection::Overlap { conflict, .. } => Some((
                self.at(conflict.span.start),
                self.at(conflict.span.end),
                conflict.label.as_str(),
            )),
            Rejection::OutOfWindow { .. } => None,
        }
    }

    pub fn suggested_start(&self) -> Option<NaiveDateTime> {
        self.rejection.suggestion().map(|m| self.at(m))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    Rejected(RejectedPlacement),
    NotFound(Ulid),
    UnknownResource(String),
    InvalidClientName(&'static str),
    InvalidDate(String),
    UndoExpired(Ulid),
    LimitExceeded(&'static str),
    Store(StoreError),
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardError::Rejected(r) => write!(f, "placement rejected on {}: {}", r.date, r.rejection),
            BoardError::NotFound(id) => write!(f, "appointment not found: {id}"),
            BoardError::UnknownResource(name) => write!(f, "unknown resource: {name}"),
            BoardError::InvalidClientName(msg) => write!(f, "invalid client name: {msg}"),
            BoardError::InvalidDate(msg) => write!(f, "invalid date: {msg}"),
            BoardError::UndoExpired(id) => write!(f, "undo window closed: {id}"),
            BoardError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            BoardError::Store(e) => write!(f, "record store: {e}"),
        }
    }
}

impl std::error::Error for BoardError {}

impl From<StoreError> for BoardError {
    fn from(e: StoreError) -> Self {
        BoardError::Store(e)
    }
}

/// The salon board: validates every placement through the [`Scheduler`]
/// before writing to the record store.
///
/// Mutations go through `write_gate`, and each one re-reads the day from the
/// store inside the gate, so validation never runs against a stale snapshot.
pub struct Board<S: RecordStore> {
    store: Arc<S>,
    directory: RwLock<ResourceDirectory>,
    config: SchedulerConfig,
    write_gate: Mutex<()>,
    undo: DashMap<Ulid, UndoEntry>,
    undo_window_ms: i64,
}

impl<S: RecordStore> Board<S> {
    /// Fails on a config `SchedulerConfig::validate` rejects, before any
    /// day window is built from it.
    pub fn new(
        store: Arc<S>,
        directory: ResourceDirectory,
        config: SchedulerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            store,
            directory: RwLock::new(directory),
            config,
            write_gate: Mutex::new(()),
            undo: DashMap::new(),
            undo_window_ms: DEFAULT_UNDO_WINDOW_MS,
        })
    }

    pub fn with_undo_window(mut self, ms: i64) -> Self {
        self.undo_window_ms = ms;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn scheduler(&self, date: NaiveDate) -> Scheduler {
        Scheduler::new(self.config, date)
    }

    /// Current resource list (a copy; the directory may change afterwards).
    pub async fn resources(&self) -> Vec<Resource> {
        self.directory.read().await.resources().to_vec()
    }

    pub async fn replace_directory(&self, directory: ResourceDirectory) {
        *self.directory.write().await = directory;
    }

    // ── Reads ────────────────────────────────────────────────

    pub async fn load_day(&self, date: NaiveDate) -> Result<DaySnapshot, BoardError> {
        let from = date.and_time(NaiveTime::MIN);
        let appointments = self.store.list_range(from, from + Duration::days(1)).await?;
        if appointments.len() > MAX_APPOINTMENTS_PER_DAY {
            return Err(BoardError::LimitExceeded("too many appointments on one day"));
        }
        metrics::histogram!(observability::DAY_SNAPSHOT_SIZE).record(appointments.len() as f64);
        Ok(DaySnapshot { date, appointments })
    }

    /// Scheduler, snapshot and freshly built index for `date`.
    async fn day_view(
        &self,
        date: NaiveDate,
    ) -> Result<(Scheduler, DaySnapshot, IntervalIndex, Vec<Resource>), BoardError> {
        let scheduler = self.scheduler(date);
        let snapshot = self.load_day(date).await?;
        let resources = self.resources().await;
        let index = scheduler.build_index(&snapshot.appointments, &resources);
        Ok((scheduler, snapshot, index, resources))
    }

    pub async fn check_placement(
        &self,
        resource: Option<&str>,
        start: NaiveDateTime,
        duration_minutes: Option<i64>,
        exclude: Option<Ulid>,
    ) -> Result<Placement, BoardError> {
        let (scheduler, _, index, _) = self.day_view(start.date()).await?;
        let offset = scheduler.window().offset_of(start);
        Ok(scheduler.validate_placement(&index, resource, offset, duration_minutes, exclude))
    }

    pub async fn next_free_start(
        &self,
        resource: &str,
        from: NaiveDateTime,
        duration_minutes: Option<i64>,
        exclude: Option<Ulid>,
    ) -> Result<Option<NaiveDateTime>, BoardError> {
        let (scheduler, _, index, _) = self.day_view(from.date()).await?;
        let window = *scheduler.window();
        Ok(scheduler
            .find_next_free_start(
                &index,
                Some(resource),
                window.offset_of(from),
                duration_minutes,
                exclude,
            )
            .map(|m| window.instant_at(m)))
    }

    // ── Mutations ────────────────────────────────────────────

    /// Validate against a fresh snapshot of `start`'s day. Caller holds the write gate.
    ///
    /// Returns the accepted start (seconds dropped) and duration; those, not
    /// the raw request, are what gets stored.
    async fn validate_fresh(
        &self,
        resource: Option<&str>,
        start: NaiveDateTime,
        duration: i64,
        exclude: Option<Ulid>,
    ) -> Result<(NaiveDateTime, i64), BoardError> {
        let date = start.date();
        let (scheduler, _, index, _) = self.day_view(date).await?;
        let window = *scheduler.window();
        let offset = window.offset_of(start);
        match scheduler.validate_placement(&index, resource, offset, Some(duration), exclude) {
            Placement::Accepted(span) => Ok((window.instant_at(span.start), span.duration())),
            Placement::Rejected(rejection) => {
                debug!(resource = resource.unwrap_or("-"), %start, "placement rejected: {rejection}");
                Err(BoardError::Rejected(RejectedPlacement { date, rejection }))
            }
        }
    }

    pub async fn create_appointment(&self, req: NewAppointment) -> Result<Appointment, BoardError> {
        let client_name = validate_client_name(&req.client_name)?;
        let resource = match req.resource_name.as_deref() {
            Some(name) => Some(
                self.directory
                    .read()
                    .await
                    .get(name)
                    .cloned()
                    .ok_or_else(|| BoardError::UnknownResource(name.trim().to_string()))?,
            ),
            None => None,
        };
        let duration = clamp_duration(req.duration_minutes, self.config.default_duration);

        let _gate = self.write_gate.lock().await;
        let (start, duration) = self
            .validate_fresh(resource.as_ref().map(|r| r.name.as_str()), req.start, duration, None)
            .await?;

        let (resource_name, resource_color) = match resource {
            Some(r) => (Some(r.name), Some(r.color)),
            None => (None, None),
        };
        let appointment = Appointment {
            id: Ulid::new(),
            client_name,
            resource_name,
            resource_color,
            start,
            duration_minutes: Some(duration),
            phase: Phase::Upcoming,
        };
        self.store.insert(appointment.clone()).await?;
        metrics::counter!(observability::STORE_WRITES_TOTAL, "op" => "create").increment(1);
        info!(id = %appointment.id, start = %appointment.start, duration, "appointment created");
        Ok(appointment)
    }

    /// Move and/or resize. `duration_minutes: None` keeps the current duration.
    pub async fn reschedule_appointment(
        &self,
        id: Ulid,
        start: NaiveDateTime,
        duration_minutes: Option<i64>,
    ) -> Result<Appointment, BoardError> {
        let _gate = self.write_gate.lock().await;
        let mut appointment = self.store.get(id).await?.ok_or(BoardError::NotFound(id))?;
        let duration = clamp_duration(
            duration_minutes.or(appointment.duration_minutes),
            self.config.default_duration,
        );

        let (start, duration) = self
            .validate_fresh(appointment.resource_name.as_deref(), start, duration, Some(id))
            .await?;

        appointment.start = start;
        appointment.duration_minutes = Some(duration);
        self.store.update(appointment.clone()).await?;
        metrics::counter!(observability::STORE_WRITES_TOTAL, "op" => "reschedule").increment(1);
        info!(%id, %start, duration, "appointment rescheduled");
        Ok(appointment)
    }

    pub async fn rename_client(&self, id: Ulid, client_name: &str) -> Result<Appointment, BoardError> {
        let client_name = validate_client_name(client_name)?;
        self.modify(id, "rename", |ap| ap.client_name = client_name)
            .await
    }

    /// Phase transitions never touch time or resource, so they skip validation.
    pub async fn set_phase(&self, id: Ulid, phase: Phase) -> Result<Appointment, BoardError> {
        self.modify(id, "phase", |ap| ap.phase = phase).await
    }

    async fn modify(
        &self,
        id: Ulid,
        op: &'static str,
        change: impl FnOnce(&mut Appointment),
    ) -> Result<Appointment, BoardError> {
        let _gate = self.write_gate.lock().await;
        let mut appointment = self.store.get(id).await?.ok_or(BoardError::NotFound(id))?;
        change(&mut appointment);
        self.store.update(appointment.clone()).await?;
        metrics::counter!(observability::STORE_WRITES_TOTAL, "op" => op).increment(1);
        Ok(appointment)
    }

    pub async fn delete_appointment(&self, id: Ulid) -> Result<UndoToken, BoardError> {
        let _gate = self.write_gate.lock().await;
        let appointment = self.store.delete(id).await?.ok_or(BoardError::NotFound(id))?;
        metrics::counter!(observability::STORE_WRITES_TOTAL, "op" => "delete").increment(1);

        let token = UndoToken(Ulid::new());
        self.undo.insert(
            token.0,
            UndoEntry {
                appointment,
                expires_at: now_ms() + self.undo_window_ms,
            },
        );
        info!(%id, "appointment deleted");
        Ok(token)
    }

    /// Put a deleted appointment back under its old id, provided its slot is
    /// still free and the undo window is open.
    pub async fn undo_delete(&self, token: UndoToken) -> Result<Appointment, BoardError> {
        let _gate = self.write_gate.lock().await;
        let (_, entry) = self
            .undo
            .remove(&token.0)
            .ok_or(BoardError::UndoExpired(token.0))?;
        if entry.expires_at <= now_ms() {
            return Err(BoardError::UndoExpired(token.0));
        }
        let mut appointment = entry.appointment;
        let duration = appointment.duration(self.config.default_duration);

        let validated = self
            .validate_fresh(
                appointment.resource_name.as_deref(),
                appointment.start,
                duration,
                Some(appointment.id),
            )
            .await;
        let (start, duration) = match validated {
            Ok(accepted) => accepted,
            Err(e) => {
                // keep the token usable in case the blocking booking goes away
                self.undo.insert(
                    token.0,
                    UndoEntry {
                        appointment,
                        expires_at: entry.expires_at,
                    },
                );
                return Err(e);
            }
        };
        appointment.start = start;
        appointment.duration_minutes = Some(duration);

        self.store.insert(appointment.clone()).await?;
        metrics::counter!(observability::STORE_WRITES_TOTAL, "op" => "undo").increment(1);
        info!(id = %appointment.id, "appointment restored");
        Ok(appointment)
    }

    /// Drop undo entries whose window closed at or before `now`.
    pub fn purge_expired_undo(&self, now: i64) -> usize {
        let before = self.undo.len();
        self.undo.retain(|_, entry| entry.expires_at > now);
        let purged = before.saturating_sub(self.undo.len());
        if purged > 0 {
            metrics::counter!(observability::UNDO_PURGED_TOTAL).increment(purged as u64);
        }
        purged
    }

    pub fn pending_undo(&self) -> usize {
        self.undo.len()
    }

    // ── Views ────────────────────────────────────────────────

    /// Grid of the day: one column per resource with a free marker per slot
    /// for a booking of `probe_duration` (default duration when `None`).
    pub async fn day_board(
        &self,
        date: NaiveDate,
        probe_duration: Option<i64>,
    ) -> Result<DayBoard, BoardError> {
        let (scheduler, snapshot, index, resources) = self.day_view(date).await?;
        let starts = scheduler.slot_starts();

        let columns = resources
            .into_iter()
            .map(|resource| {
                let name = Some(resource.name.as_str());
                let free_at_slot = starts
                    .iter()
                    .map(|&s| scheduler.can_fit(&index, name, s, probe_duration))
                    .collect();
                ResourceColumn {
                    bookings: index.intervals(&resource.name).to_vec(),
                    free_spans: scheduler.free_spans(&index, name, None),
                    double_bookings: exclusivity_violations(&index, &resource.name),
                    free_at_slot,
                    resource,
                }
            })
            .collect();

        let unindexed = index.unindexed();
        let unassigned = snapshot
            .appointments
            .into_iter()
            .filter(|a| unindexed.contains(&a.id))
            .collect();

        Ok(DayBoard {
            date,
            slots: starts.into_iter().map(format_minute).collect(),
            columns,
            unassigned,
        })
    }

    /// Appointment counts over the 42-day, Monday-first grid covering `month`.
    pub async fn month_overview(&self, year: i32, month: u32) -> Result<MonthOverview, BoardError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| BoardError::InvalidDate(format!("{year}-{month:02}")))?;
        let grid_start = first - Duration::days(first.weekday().num_days_from_monday() as i64);
        let grid_end = grid_start + Duration::days(MONTH_GRID_DAYS as i64);

        let appointments = self
            .store
            .list_range(grid_start.and_time(NaiveTime::MIN), grid_end.and_time(NaiveTime::MIN))
            .await?;

        let mut counts = vec![0usize; MONTH_GRID_DAYS];
        for ap in &appointments {
            let i = (ap.date() - grid_start).num_days() as usize;
            if let Some(c) = counts.get_mut(i) {
                *c += 1;
            }
        }

        let days = counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| {
                let date = grid_start + Duration::days(i as i64);
                DayCount {
                    date,
                    count,
                    in_month: date.month() == month,
                    level: LoadLevel::for_count(count),
                }
            })
            .collect();

        Ok(MonthOverview { first, days })
    }
}

fn validate_client_name(raw: &str) -> Result<String, BoardError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(BoardError::InvalidClientName("empty"));
    }
    if name.len() > MAX_CLIENT_NAME_LEN {
        return Err(BoardError::InvalidClientName("too long"));
    }
    Ok(name.to_string())
}

// ── View types ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ResourceColumn {
    pub resource: Resource,
    pub bookings: Vec<BookedInterval>,
    /// Parallel to [`DayBoard::slots`].
    pub free_at_slot: Vec<bool>,
    pub free_spans: Vec<Span>,
    /// Overlapping pairs already in the store (e.g. from concurrent writers).
    pub double_bookings: Vec<(Ulid, Ulid)>,
}

#[derive(Debug, Clone)]
pub struct DayBoard {
    pub date: NaiveDate,
    pub slots: Vec<String>,
    pub columns: Vec<ResourceColumn>,
    /// Appointments with no resource, or one missing from the directory.
    pub unassigned: Vec<Appointment>,
}

impl DayBoard {
    pub fn column(&self, resource: &str) -> Option<&ResourceColumn> {
        self.columns.iter().find(|c| c.resource.name == resource)
    }
}

impl fmt::Display for DayBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.date.format("%A %d %B %Y"))?;
        for column in &self.columns {
            writeln!(f, "\n{} ({})", column.resource.name, column.resource.color)?;
            if column.bookings.is_empty() {
                writeln!(f, "  no bookings")?;
            }
            for b in &column.bookings {
                writeln!(
                    f,
                    "  {}–{}  {}",
                    format_minute(b.span.start),
                    format_minute(b.span.end),
                    b.label
                )?;
            }
            let free: Vec<String> = column
                .free_spans
                .iter()
                .map(|s| format!("{}–{}", format_minute(s.start), format_minute(s.end)))
                .collect();
            writeln!(f, "  free: {}", if free.is_empty() { "none".to_string() } else { free.join(", ") })?;
            for (a, b) in &column.double_bookings {
                writeln!(f, "  ! double booking: {a} / {b}")?;
            }
        }
        if !self.unassigned.is_empty() {
            writeln!(f, "\nunassigned")?;
            for ap in &self.unassigned {
                writeln!(f, "  {}  {}", ap.start.format("%H:%M"), ap.client_name)?;
            }
        }
        Ok(())
    }
}

pub const MONTH_GRID_DAYS: usize = 42;

/// How full a day looks on the month grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoadLevel {
    Quiet,
    Light,
    Busy,
    Packed,
}

impl LoadLevel {
    pub fn for_count(n: usize) -> Self {
        match n {
            12.. => LoadLevel::Packed,
            7.. => LoadLevel::Busy,
            3.. => LoadLevel::Light,
            _ => LoadLevel::Quiet,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayCount {
    pub date: NaiveDate,
    pub count: usize,
    pub in_month: bool,
    pub level: LoadLevel,
}

#[derive(Debug, Clone)]
pub struct MonthOverview {
    pub first: NaiveDate,
    pub days: Vec<DayCount>,
}

impl MonthOverview {
    pub fn count_on(&self, date: NaiveDate) -> Option<usize> {
        self.days.iter().find(|d| d.date == date).map(|d| d.count)
    }
}
