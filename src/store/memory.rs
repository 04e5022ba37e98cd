use async_trait::async_trait;
use chrono::NaiveDateTime;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;

use super::{RecordStore, StoreError};

/// Appointments keyed by id, held only in memory.
pub struct InMemoryStore {
    records: DashMap<Ulid, Appointment>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    pub fn contains(&self, id: &Ulid) -> bool {
        self.records.contains_key(id)
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Every record, sorted by start then id.
    pub fn snapshot(&self) -> Vec<Appointment> {
        let mut all: Vec<Appointment> = self.records.iter().map(|e| e.value().clone()).collect();
        sort_by_start(&mut all);
        all
    }

    // ── Event application ────────────────────────────────────

    /// Apply one logged event. Replay tolerates events that no longer match
    /// (e.g. a delete of an id that was never created).
    pub fn apply_event(&self, event: &Event) {
        match event {
            Event::AppointmentCreated { appointment } | Event::AppointmentUpdated { appointment } => {
                self.records.insert(appointment.id, appointment.clone());
            }
            Event::AppointmentDeleted { id } => {
                self.records.remove(id);
            }
        }
    }

    pub(super) fn check_insert(&self, id: &Ulid) -> Result<(), StoreError> {
        if self.records.contains_key(id) {
            return Err(StoreError::AlreadyExists(*id));
        }
        Ok(())
    }

    pub(super) fn check_exists(&self, id: &Ulid) -> Result<(), StoreError> {
        if !self.records.contains_key(id) {
            return Err(StoreError::NotFound(*id));
        }
        Ok(())
    }
}

pub(super) fn sort_by_start(list: &mut [Appointment]) {
    list.sort_by_key(|a| (a.start, a.id));
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn insert(&self, appointment: Appointment) -> Result<(), StoreError> {
        match self.records.entry(appointment.id) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(appointment.id)),
            Entry::Vacant(slot) => {
                slot.insert(appointment);
                Ok(())
            }
        }
    }

    async fn get(&self, id: Ulid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.records.get(&id).map(|e| e.value().clone()))
    }

    async fn update(&self, appointment: Appointment) -> Result<(), StoreError> {
        match self.records.get_mut(&appointment.id) {
            Some(mut existing) => {
                *existing = appointment;
                Ok(())
            }
            None => Err(StoreError::NotFound(appointment.id)),
        }
    }

    async fn delete(&self, id: Ulid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.records.remove(&id).map(|(_, ap)| ap))
    }

    async fn list_range(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut hits: Vec<Appointment> = self
            .records
            .iter()
            .filter(|e| from <= e.start && e.start < to)
            .map(|e| e.value().clone())
            .collect();
        sort_by_start(&mut hits);
        Ok(hits)
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.records.len())
    }
}
