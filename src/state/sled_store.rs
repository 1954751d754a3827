use crate::error::{AppError, Result};
use crate::models::{Incident, User};
use crate::search::IncidentFilter;
use crate::state::{IncidentStore, UserStore};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use sled::{Db, Tree};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Persistent store using the Sled embedded database
#[derive(Clone)]
pub struct SledStore {
    db: Arc<Db>,
    incidents_tree: Tree,
    human_id_tree: Tree,
    counters_tree: Tree,
    users_tree: Tree,
    usernames_tree: Tree,
    emails_tree: Tree,
}

impl SledStore {
    /// Create a new Sled store at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path.as_ref()).map_err(|e| {
            AppError::Database(format!("Failed to open Sled database: {}", e))
        })?;

        let open = |name: &str| {
            db.open_tree(name).map_err(|e| {
                AppError::Database(format!("Failed to open {} tree: {}", name, e))
            })
        };

        let store = Self {
            incidents_tree: open("incidents")?,
            human_id_tree: open("incident_human_ids")?,
            counters_tree: open("incident_counters")?,
            users_tree: open("users")?,
            usernames_tree: open("user_usernames")?,
            emails_tree: open("user_emails")?,
            db: Arc::new(db),
        };

        tracing::info!(path = ?path.as_ref(), "Initialized Sled store");
        Ok(store)
    }

    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(bincode::serialize(value)?)
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(bincode::deserialize(bytes)?)
    }

    fn decode_id(bytes: &[u8]) -> Result<Uuid> {
        Uuid::from_slice(bytes)
            .map_err(|e| AppError::Serialization(format!("Corrupt id in index: {}", e)))
    }

    fn decode_counter(bytes: &[u8]) -> Option<u64> {
        <[u8; 8]>::try_from(bytes).ok().map(u64::from_be_bytes)
    }

    /// Claim `key` in a uniqueness index; false if someone already holds it
    fn claim(tree: &Tree, key: &str, id: &Uuid) -> Result<bool> {
        let outcome = tree.compare_and_swap(
            key.as_bytes(),
            None as Option<&[u8]>,
            Some(id.as_bytes().to_vec()),
        )?;
        Ok(outcome.is_ok())
    }

    fn scan_incidents(&self, filter: &IncidentFilter) -> Result<Vec<Incident>> {
        let mut incidents = Vec::new();
        for result in self.incidents_tree.iter() {
            let (_, value) = result?;
            let incident: Incident = Self::decode(&value)?;
            if filter.matches(&incident) {
                incidents.push(incident);
            }
        }
        Ok(incidents)
    }

    fn scan_users(&self, active_only: bool) -> Result<Vec<User>> {
        let mut users = Vec::new();
        for result in self.users_tree.iter() {
            let (_, value) = result?;
            let user: User = Self::decode(&value)?;
            if !active_only || user.is_active {
                users.push(user);
            }
        }
        Ok(users)
    }

    fn user_by_index(&self, index: &Tree, key: &str) -> Result<Option<User>> {
        match index.get(key.as_bytes())? {
            Some(id_bytes) => {
                let id = Self::decode_id(&id_bytes)?;
                match self.users_tree.get(id.as_bytes())? {
                    Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
                    None => Ok(None),
                }
            }
            None => Ok(None),
        }
    }

    /// Flush pending writes to disk
    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}

#[async_trait]
impl IncidentStore for SledStore {
    async fn insert_incident(&self, incident: &Incident) -> Result<()> {
        let value = Self::encode(incident)?;

        if !Self::claim(&self.human_id_tree, &incident.human_id, &incident.id)? {
            return Err(AppError::Conflict(format!(
                "Incident {} already exists",
                incident.human_id
            )));
        }

        self.incidents_tree.insert(incident.id.as_bytes(), value)?;
        self.incidents_tree.flush()?;

        tracing::debug!(incident_id = %incident.id, human_id = %incident.human_id, "Incident saved to Sled");
        Ok(())
    }

    async fn get_incident(&self, id: &Uuid) -> Result<Option<Incident>> {
        match self.incidents_tree.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn find_incidents(
        &self,
        filter: &IncidentFilter,
        skip: u64,
        limit: u32,
    ) -> Result<Vec<Incident>> {
        let mut incidents = self.scan_incidents(filter)?;

        // Sort by creation time (newest first)
        incidents.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(incidents
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_incidents(&self, filter: &IncidentFilter) -> Result<u64> {
        if filter.is_empty() {
            return Ok(self.incidents_tree.len() as u64);
        }
        Ok(self.scan_incidents(filter)?.len() as u64)
    }

    async fn modify_incident(
        &self,
        id: &Uuid,
        mutate: &mut (dyn for<'m> FnMut(&'m mut Incident) -> Result<()> + Send),
    ) -> Result<Incident> {
        let key = id.as_bytes();

        // Optimistic loop: a concurrent writer makes the swap fail and the
        // edit is replayed on the fresh value
        loop {
            let current = self
                .incidents_tree
                .get(key)?
                .ok_or_else(|| AppError::NotFound("Incident not found.".to_string()))?;

            let mut incident: Incident = Self::decode(&current)?;
            mutate(&mut incident)?;
            let value = Self::encode(&incident)?;

            if self
                .incidents_tree
                .compare_and_swap(key, Some(current), Some(value))?
                .is_ok()
            {
                self.incidents_tree.flush()?;
                tracing::debug!(incident_id = %id, "Incident updated in Sled");
                return Ok(incident);
            }

            tracing::trace!(incident_id = %id, "Incident changed concurrently, retrying");
        }
    }

    async fn delete_incident(&self, id: &Uuid) -> Result<Option<Incident>> {
        let removed = match self.incidents_tree.remove(id.as_bytes())? {
            Some(bytes) => Self::decode::<Incident>(&bytes)?,
            None => return Ok(None),
        };

        self.human_id_tree.remove(removed.human_id.as_bytes())?;
        self.incidents_tree.flush()?;

        tracing::debug!(incident_id = %id, "Incident deleted from Sled");
        Ok(Some(removed))
    }

    async fn next_daily_sequence(&self, prefix: &str) -> Result<u64> {
        let seed = if self.counters_tree.contains_key(prefix.as_bytes())? {
            0
        } else {
            let mut existing = 0u64;
            for entry in self.human_id_tree.scan_prefix(prefix.as_bytes()) {
                entry?;
                existing += 1;
            }
            existing
        };

        // update_and_fetch re-runs the closure on contention, so concurrent
        // callers each observe a distinct value
        let updated = self
            .counters_tree
            .update_and_fetch(prefix.as_bytes(), |old| {
                let current = old.and_then(Self::decode_counter).unwrap_or(seed);
                Some((current + 1).to_be_bytes().to_vec())
            })?
            .and_then(|bytes| Self::decode_counter(&bytes))
            .ok_or_else(|| AppError::Internal("Counter update produced no value".to_string()))?;

        self.counters_tree.flush()?;
        Ok(updated)
    }
}

#[async_trait]
impl UserStore for SledStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        let value = Self::encode(user)?;

        if !Self::claim(&self.emails_tree, &user.email, &user.id)? {
            return Err(AppError::Conflict("User already exists".to_string()));
        }
        if !Self::claim(&self.usernames_tree, &user.username, &user.id)? {
            self.emails_tree.remove(user.email.as_bytes())?;
            return Err(AppError::Conflict("Username already taken".to_string()));
        }

        self.users_tree.insert(user.id.as_bytes(), value)?;
        self.users_tree.flush()?;

        tracing::debug!(user_id = %user.id, "User saved to Sled");
        Ok(())
    }

    async fn get_user(&self, id: &Uuid) -> Result<Option<User>> {
        match self.users_tree.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_by_index(&self.usernames_tree, username)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_by_index(&self.emails_tree, email)
    }

    async fn list_users(&self, active_only: bool, skip: u64, limit: u32) -> Result<Vec<User>> {
        let mut users = self.scan_users(active_only)?;
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        Ok(users
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_users(&self, active_only: bool) -> Result<u64> {
        Ok(self.scan_users(active_only)?.len() as u64)
    }

    async fn modify_user(
        &self,
        id: &Uuid,
        mutate: &mut (dyn for<'m> FnMut(&'m mut User) -> Result<()> + Send),
    ) -> Result<User> {
        let key = id.as_bytes();

        loop {
            let current = self
                .users_tree
                .get(key)?
                .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

            let previous: User = Self::decode(&current)?;
            let mut user = previous.clone();
            mutate(&mut user)?;
            let value = Self::encode(&user)?;

            let email_changed = previous.email != user.email;
            let username_changed = previous.username != user.username;

            if email_changed && !Self::claim(&self.emails_tree, &user.email, &user.id)? {
                return Err(AppError::Conflict("User already exists".to_string()));
            }
            if username_changed && !Self::claim(&self.usernames_tree, &user.username, &user.id)? {
                if email_changed {
                    self.emails_tree.remove(user.email.as_bytes())?;
                }
                return Err(AppError::Conflict("Username already taken".to_string()));
            }

            if self
                .users_tree
                .compare_and_swap(key, Some(current), Some(value))?
                .is_ok()
            {
                if email_changed {
                    self.emails_tree.remove(previous.email.as_bytes())?;
                }
                if username_changed {
                    self.usernames_tree.remove(previous.username.as_bytes())?;
                }
                self.users_tree.flush()?;

                tracing::debug!(user_id = %id, "User updated in Sled");
                return Ok(user);
            }

            // Lost the race; give back the keys claimed for this attempt
            if email_changed {
                self.emails_tree.remove(user.email.as_bytes())?;
            }
            if username_changed {
                self.usernames_tree.remove(user.username.as_bytes())?;
            }
        }
    }
}
