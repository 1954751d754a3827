pub mod store;
pub mod sled_store;
pub mod factory;

pub use store::*;
pub use sled_store::SledStore;
pub use factory::{create_in_memory_stores, create_stores, Stores};

use crate::error::Result;
use crate::models::{Incident, User};
use crate::search::IncidentFilter;
use async_trait::async_trait;
use uuid::Uuid;

/// Trait for incident storage operations
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Insert a new incident; a duplicate `human_id` is a `Conflict`
    async fn insert_incident(&self, incident: &Incident) -> Result<()>;

    /// Get an incident by ID
    async fn get_incident(&self, id: &Uuid) -> Result<Option<Incident>>;

    /// Find incidents matching a filter, newest first
    async fn find_incidents(
        &self,
        filter: &IncidentFilter,
        skip: u64,
        limit: u32,
    ) -> Result<Vec<Incident>>;

    /// Count incidents matching filter
    async fn count_incidents(&self, filter: &IncidentFilter) -> Result<u64>;

    /// Atomically edit an existing incident and return the stored result.
    ///
    /// `mutate` sees the latest stored version and may run more than once
    /// under contention. If it fails, nothing is written. `NotFound` if the
    /// incident does not exist.
    async fn modify_incident(
        &self,
        id: &Uuid,
        mutate: &mut (dyn for<'m> FnMut(&'m mut Incident) -> Result<()> + Send),
    ) -> Result<Incident>;

    /// Remove an incident, returning it if it existed
    async fn delete_incident(&self, id: &Uuid) -> Result<Option<Incident>>;

    /// Atomically increment and return the sequence for a `human_id` prefix.
    ///
    /// The first call for a prefix seeds the counter from the number of
    /// incidents whose `human_id` already starts with it.
    async fn next_daily_sequence(&self, prefix: &str) -> Result<u64>;
}

/// Trait for user account storage operations
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user; duplicate username or email is a `Conflict`
    async fn insert_user(&self, user: &User) -> Result<()>;

    async fn get_user(&self, id: &Uuid) -> Result<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// List users, oldest first
    async fn list_users(&self, active_only: bool, skip: u64, limit: u32) -> Result<Vec<User>>;

    async fn count_users(&self, active_only: bool) -> Result<u64>;

    /// Atomically edit an existing user, keeping the username and email
    /// indexes in step. Same contract as `IncidentStore::modify_incident`;
    /// `Conflict` if the new username or email belongs to someone else.
    async fn modify_user(
        &self,
        id: &Uuid,
        mutate: &mut (dyn for<'m> FnMut(&'m mut User) -> Result<()> + Send),
    ) -> Result<User>;
}

