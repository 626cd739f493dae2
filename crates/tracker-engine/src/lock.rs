//! Lock arbiter: acquires, holds, and releases mutual-exclusion tokens
//! keyed on `(service, environment, resource)`.
//!
//! The arbiter pre-checks the key so a contested acquisition reports the
//! current holder, but correctness does not depend on the pre-check: the
//! repository's unique key index serializes concurrent creates, and the
//! losing side translates the duplicate-key conflict into the same
//! holder-naming error from a follow-up get.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use tracker_core::{ChangeType, Error, Lock, Result, UnlockReceipt};
use tracker_store::{EventLookup, EventRepository, LockLookup, LockRepository};

/// Request to acquire a lock.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreateLockRequest {
    /// Service to lock.
    pub service: String,
    /// Who is acquiring the lock.
    pub who: String,
    /// Environment the lock applies to.
    pub environment: String,
    /// Resource kind being serialized.
    pub resource: String,
    /// Owning event, when already known.
    pub event_id: String,
}

/// Request to update lock fields. Empty strings mean "not provided".
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct UpdateLockRequest {
    /// New service.
    pub service: String,
    /// New holder.
    pub who: String,
    /// New environment.
    pub environment: String,
    /// New resource.
    pub resource: String,
    /// New owning event.
    pub event_id: String,
}

/// The lock arbiter.
#[derive(Clone)]
pub struct LockArbiter {
    locks: Arc<dyn LockRepository>,
    events: Arc<dyn EventRepository>,
}

impl LockArbiter {
    /// Creates an arbiter over the given repositories.
    ///
    /// The event repository is only used to cross-post `locked`/`unlocked`
    /// changelog entries onto the owning event.
    #[must_use]
    pub fn new(locks: Arc<dyn LockRepository>, events: Arc<dyn EventRepository>) -> Self {
        Self { locks, events }
    }

    /// Acquires a lock on `(service, environment, resource)`.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` naming the current holder, its lock id, and its
    /// event id when the key is already held.
    pub async fn create_lock(&self, req: CreateLockRequest) -> Result<Lock> {
        let key = LockLookup::Key {
            service: req.service.clone(),
            environment: req.environment.clone(),
            resource: req.resource.clone(),
        };

        if let Some(holder) = self.locks.get(&key).await? {
            return Err(self.already_locked(&holder));
        }

        let lock = Lock {
            service: req.service,
            who: req.who,
            environment: req.environment,
            resource: req.resource,
            event_id: req.event_id,
            ..Lock::default()
        };

        let created = match self.locks.create(lock).await {
            Ok(created) => created,
            Err(err) if err.is_conflict() => {
                // Lost the race between the pre-check and the insert; the
                // unique key index picked the winner. Surface the holder.
                return match self.locks.get(&key).await? {
                    Some(holder) => Err(self.already_locked(&holder)),
                    None => Err(err),
                };
            }
            Err(err) => return Err(err),
        };

        if !created.event_id.is_empty() {
            self.cross_post_changelog(&created, ChangeType::Locked).await;
        }

        tracing::info!(
            service = %created.service,
            environment = %created.environment,
            resource = %created.resource,
            who = %created.who,
            id = %created.id,
            event_id = %created.event_id,
            created_at = %created.created_at.to_rfc3339(),
            "lock created"
        );
        Ok(created)
    }

    /// Gets a lock by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` naming the id when no lock matches.
    pub async fn get_lock(&self, id: &str) -> Result<Lock> {
        self.locks
            .get(&LockLookup::Id(id.to_string()))
            .await?
            .ok_or_else(|| Error::not_found(format!("no lock found in tracker for id {id}")))
    }

    /// Lists every held lock.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub async fn list_locks(&self) -> Result<Vec<Lock>> {
        self.locks.list().await
    }

    /// Updates the provided (non-empty) fields of a lock.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` naming the id when no lock matches.
    pub async fn update_lock(&self, id: &str, req: UpdateLockRequest) -> Result<Lock> {
        let lookup = LockLookup::Id(id.to_string());
        let mut lock = self
            .locks
            .get(&lookup)
            .await?
            .ok_or_else(|| Error::not_found(format!("no lock found in tracker for id {id}")))?;

        if !req.service.is_empty() {
            lock.service = req.service;
        }
        if !req.who.is_empty() {
            lock.who = req.who;
        }
        if !req.environment.is_empty() {
            lock.environment = req.environment;
        }
        if !req.resource.is_empty() {
            lock.resource = req.resource;
        }
        if !req.event_id.is_empty() {
            lock.event_id = req.event_id;
        }

        let updated = self.locks.update(&lookup, lock).await?;
        tracing::info!(
            id = %updated.id,
            service = %updated.service,
            environment = %updated.environment,
            resource = %updated.resource,
            who = %updated.who,
            event_id = %updated.event_id,
            "lock updated"
        );
        Ok(updated)
    }

    /// Releases a lock by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` naming the id when no lock matches.
    pub async fn unlock(&self, id: &str) -> Result<UnlockReceipt> {
        let lookup = LockLookup::Id(id.to_string());
        let lock = self
            .locks
            .get(&lookup)
            .await?
            .ok_or_else(|| Error::not_found(format!("no lock found in tracker for id {id}")))?;

        if !lock.event_id.is_empty() {
            self.cross_post_changelog(&lock, ChangeType::Unlocked).await;
        }

        let deleted_count = self.locks.unlock(&lookup).await?;
        tracing::info!(
            service = %lock.service,
            who = %lock.who,
            id = %lock.id,
            "lock deleted"
        );
        Ok(UnlockReceipt {
            message: "lock deleted".to_string(),
            id: id.to_string(),
            deleted_count,
        })
    }

    /// Releases the lock associated with an event, if any.
    ///
    /// Idempotent: an absent lock (or empty event id) is a success, so the
    /// coordinator can retry releases without tracking state.
    ///
    /// # Errors
    ///
    /// Propagates repository failures from the delete itself.
    pub async fn unlock_by_event_id(&self, event_id: &str) -> Result<()> {
        if event_id.is_empty() {
            return Ok(());
        }

        let Some(lock) = self
            .locks
            .get(&LockLookup::EventId(event_id.to_string()))
            .await?
        else {
            return Ok(());
        };

        if let Err(err) = self.locks.unlock(&LockLookup::Id(lock.id.clone())).await {
            tracing::error!(
                event_id,
                lock_id = %lock.id,
                error = %err,
                "failed to unlock by event_id"
            );
            return Err(err);
        }

        tracing::info!(
            event_id,
            lock_id = %lock.id,
            service = %lock.service,
            environment = %lock.environment,
            resource = %lock.resource,
            "lock released by event_id"
        );
        Ok(())
    }

    fn already_locked(&self, holder: &Lock) -> Error {
        tracing::error!(
            service = %holder.service,
            environment = %holder.environment,
            resource = %holder.resource,
            who = %holder.who,
            id = %holder.id,
            event_id = %holder.event_id,
            created_at = %holder.created_at.to_rfc3339(),
            "service locking"
        );
        Error::conflict(format!(
            "service {} is already locked for {} in {} by {} (lock_id: {}, event_id: {})",
            holder.service,
            holder.resource,
            holder.environment,
            holder.who,
            holder.id,
            holder.event_id,
        ))
    }

    /// Appends a `locked`/`unlocked` entry to the owning event's changelog.
    /// Failures are logged, never fatal to the lock operation.
    async fn cross_post_changelog(&self, lock: &Lock, change_type: ChangeType) {
        let lookup = EventLookup::Id(lock.event_id.clone());
        let event = match self.events.get(&lookup).await {
            Ok(Some(event)) => event,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(
                    event_id = %lock.event_id,
                    error = %err,
                    "failed to load event for lock changelog"
                );
                return;
            }
        };

        let comment = match change_type {
            ChangeType::Unlocked => format!("Service unlocked in {}", lock.environment),
            _ => format!("Service locked in {}", lock.environment),
        };
        let mut event = event;
        event.append_changelog(change_type, lock.who.clone(), "", "", "", comment);

        if let Err(err) = self.events.update(&lookup, event).await {
            tracing::warn!(
                event_id = %lock.event_id,
                error = %err,
                "failed to update event changelog for lock"
            );
        }
    }
}
