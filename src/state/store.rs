use crate::error::{AppError, Result};
use crate::models::{Incident, User};
use crate::search::IncidentFilter;
use crate::state::{IncidentStore, UserStore};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// In-memory store (for development and testing)
#[derive(Clone, Default)]
pub struct InMemoryStore {
    incidents: Arc<DashMap<Uuid, Incident>>,
    human_id_index: Arc<DashMap<String, Uuid>>,
    counters: Arc<DashMap<String, u64>>,
    users: Arc<DashMap<Uuid, User>>,
    username_index: Arc<DashMap<String, Uuid>>,
    email_index: Arc<DashMap<String, Uuid>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matching(&self, filter: &IncidentFilter) -> Vec<Incident> {
        self.incidents
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Claim `key` for `id` in a uniqueness index
    fn reserve(index: &DashMap<String, Uuid>, key: &str, id: Uuid, conflict: &str) -> Result<()> {
        match index.entry(key.to_string()) {
            Entry::Occupied(existing) if *existing.get() != id => {
                Err(AppError::Conflict(conflict.to_string()))
            }
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(id);
                Ok(())
            }
        }
    }

    /// Point the username and email indexes at `user`, releasing the keys
    /// `previous` held; on conflict both indexes are left untouched
    fn move_indexes(&self, previous: &User, user: &User) -> Result<()> {
        let email_changed = previous.email != user.email;
        let username_changed = previous.username != user.username;

        if email_changed {
            Self::reserve(&self.email_index, &user.email, user.id, "User already exists")?;
        }
        if username_changed {
            if let Err(e) = Self::reserve(&self.username_index, &user.username, user.id, "Username already taken") {
                if email_changed {
                    self.email_index.remove(&user.email);
                }
                return Err(e);
            }
        }

        if email_changed {
            self.email_index.remove(&previous.email);
        }
        if username_changed {
            self.username_index.remove(&previous.username);
        }
        Ok(())
    }
}

#[async_trait]
impl IncidentStore for InMemoryStore {
    async fn insert_incident(&self, incident: &Incident) -> Result<()> {
        if self.incidents.contains_key(&incident.id) {
            return Err(AppError::Conflict(format!(
                "Incident {} already exists",
                incident.id
            )));
        }

        match self.human_id_index.entry(incident.human_id.clone()) {
            Entry::Occupied(_) => {
                return Err(AppError::Conflict(format!(
                    "Incident {} already exists",
                    incident.human_id
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(incident.id);
            }
        }

        self.incidents.insert(incident.id, incident.clone());
        tracing::debug!(incident_id = %incident.id, human_id = %incident.human_id, "Incident saved");
        Ok(())
    }

    async fn get_incident(&self, id: &Uuid) -> Result<Option<Incident>> {
        Ok(self.incidents.get(id).map(|entry| entry.clone()))
    }

    async fn find_incidents(
        &self,
        filter: &IncidentFilter,
        skip: u64,
        limit: u32,
    ) -> Result<Vec<Incident>> {
        let mut incidents = self.matching(filter);

        // Sort by creation time (newest first)
        incidents.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(incidents
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_incidents(&self, filter: &IncidentFilter) -> Result<u64> {
        let count = self
            .incidents
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .count();
        Ok(count as u64)
    }

    async fn modify_incident(
        &self,
        id: &Uuid,
        mutate: &mut (dyn for<'m> FnMut(&'m mut Incident) -> Result<()> + Send),
    ) -> Result<Incident> {
        // The shard stays write-locked until the edit is committed
        let mut entry = self
            .incidents
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound("Incident not found.".to_string()))?;

        let mut incident = entry.clone();
        mutate(&mut incident)?;
        *entry = incident.clone();

        tracing::debug!(incident_id = %id, "Incident updated");
        Ok(incident)
    }

    async fn delete_incident(&self, id: &Uuid) -> Result<Option<Incident>> {
        let removed = self.incidents.remove(id).map(|(_, incident)| incident);
        if let Some(ref incident) = removed {
            self.human_id_index.remove(&incident.human_id);
            tracing::debug!(incident_id = %id, "Incident deleted");
        }
        Ok(removed)
    }

    async fn next_daily_sequence(&self, prefix: &str) -> Result<u64> {
        if let Some(mut counter) = self.counters.get_mut(prefix) {
            *counter += 1;
            return Ok(*counter);
        }

        let seed = self
            .count_incidents(&IncidentFilter::human_id_prefix(prefix))
            .await?;

        let mut counter = self.counters.entry(prefix.to_string()).or_insert(seed);
        *counter += 1;
        Ok(*counter)
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        Self::reserve(&self.email_index, &user.email, user.id, "User already exists")?;
        if let Err(e) = Self::reserve(&self.username_index, &user.username, user.id, "Username already taken") {
            self.email_index.remove(&user.email);
            return Err(e);
        }

        self.users.insert(user.id, user.clone());
        tracing::debug!(user_id = %user.id, "User saved");
        Ok(())
    }

    async fn get_user(&self, id: &Uuid) -> Result<Option<User>> {
        Ok(self.users.get(id).map(|entry| entry.clone()))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let id = self.username_index.get(username).map(|entry| *entry.value());
        Ok(id.and_then(|id| self.users.get(&id).map(|entry| entry.clone())))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let id = self.email_index.get(email).map(|entry| *entry.value());
        Ok(id.and_then(|id| self.users.get(&id).map(|entry| entry.clone())))
    }

    async fn list_users(&self, active_only: bool, skip: u64, limit: u32) -> Result<Vec<User>> {
        let mut users: Vec<User> = self
            .users
            .iter()
            .filter(|entry| !active_only || entry.is_active)
            .map(|entry| entry.value().clone())
            .collect();

        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        Ok(users
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_users(&self, active_only: bool) -> Result<u64> {
        let count = self
            .users
            .iter()
            .filter(|entry| !active_only || entry.is_active)
            .count();
        Ok(count as u64)
    }

    async fn modify_user(
        &self,
        id: &Uuid,
        mutate: &mut (dyn for<'m> FnMut(&'m mut User) -> Result<()> + Send),
    ) -> Result<User> {
        let mut entry = self
            .users
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

        let previous = entry.clone();
        let mut user = previous.clone();
        mutate(&mut user)?;
        self.move_indexes(&previous, &user)?;
        *entry = user.clone();

        tracing::debug!(user_id = %id, "User updated");
        Ok(user)
    }
}
