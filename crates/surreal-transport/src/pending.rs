//! Pending-request registry: correlation id → one-shot delivery slot.
//!
//! A slot is removed at the moment it is delivered, discarded or released,
//! so each slot sees at most one delivery and a reply that arrives after
//! its slot is gone is simply ignored.

use bytes::Bytes;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rand::Rng;
use rand::distr::Alphanumeric;
use tokio::sync::oneshot;

use crate::error::TransportError;

/// Length of generated correlation ids.
pub const ID_LENGTH: usize = 16;

/// What a pending slot eventually receives.
pub type Delivery = Result<Bytes, TransportError>;

pub type Slot = oneshot::Receiver<Delivery>;

/// Random alphanumeric correlation id.
pub fn generate_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LENGTH)
        .map(char::from)
        .collect()
}

#[derive(Default)]
pub struct PendingRegistry {
    slots: DashMap<String, oneshot::Sender<Delivery>>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a slot for `id`. Fails if `id` is already outstanding.
    pub fn register(&self, id: &str) -> Result<Slot, TransportError> {
        match self.slots.entry(id.to_string()) {
            Entry::Occupied(_) => Err(TransportError::DuplicateId(id.to_string())),
            Entry::Vacant(vacant) => {
                let (tx, rx) = oneshot::channel();
                vacant.insert(tx);
                Ok(rx)
            }
        }
    }

    /// Register a slot under a fresh id, regenerating on collision.
    pub fn open(&self) -> (String, Slot) {
        loop {
            let id = generate_id();
            if let Ok(slot) = self.register(&id) {
                return (id, slot);
            }
        }
    }

    /// Hand `delivery` to the slot for `id`, removing it.
    ///
    /// Returns false when no slot exists (late or duplicate reply).
    pub fn deliver(&self, id: &str, delivery: Delivery) -> bool {
        match self.slots.remove(id) {
            Some((_, tx)) => {
                // The waiter may have given up already; the slot is gone either way.
                let _ = tx.send(delivery);
                true
            }
            None => false,
        }
    }

    /// Remove the slot for `id` without delivering.
    pub fn discard(&self, id: &str) -> bool {
        self.slots.remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Fail every outstanding slot with `error`. Returns how many were released.
    pub fn release_all(&self, error: &TransportError) -> usize {
        let ids: Vec<String> = self.slots.iter().map(|entry| entry.key().clone()).collect();
        ids.iter()
            .filter(|id| self.deliver(id, Err(error.clone())))
            .count()
    }
}
