mod memory;
mod wal_store;

pub use memory::InMemoryStore;
pub use wal_store::WalStore;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use ulid::Ulid;

use crate::model::Appointment;

/// The appointment record store the board writes through.
///
/// Implementations only persist; they never validate scheduling.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert(&self, appointment: Appointment) -> Result<(), StoreError>;

    async fn get(&self, id: Ulid) -> Result<Option<Appointment>, StoreError>;

    /// Replace an existing record; `NotFound` if `appointment.id` is unknown.
    async fn update(&self, appointment: Appointment) -> Result<(), StoreError>;

    /// Remove and return the record, if it existed.
    async fn delete(&self, id: Ulid) -> Result<Option<Appointment>, StoreError>;

    /// Records with `from <= start < to`, ascending by start then id.
    async fn list_range(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn len(&self) -> Result<usize, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    WalError(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "appointment not found: {id}"),
            StoreError::AlreadyExists(id) => write!(f, "appointment already exists: {id}"),
            StoreError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}
