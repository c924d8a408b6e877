//! Subscription registry
//!
//! Maps each subscribed topic (standard scheme) to its "engaged" flag:
//! - present and `true`: the topic's receive loop is delivering
//! - present and `false`: unsubscribe was requested, the loop is shutting down
//! - absent: not subscribed
//!
//! The registry is shared by every receive loop and by the callers of
//! subscribe/unsubscribe. Each operation is one short critical section
//! under a single mutex that never spans I/O. Disengaging also fires a
//! notification so loops waiting on the backend can re-check their flag.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio::sync::futures::Notified;

use crate::utils::{MessagingError, Result};

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    topics: Mutex<HashMap<String, bool>>,
    changed: Notify,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn topics(&self) -> MutexGuard<'_, HashMap<String, bool>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers every topic as engaged, or none of them.
    ///
    /// Fails with `DuplicateSubscription` naming the first topic that is
    /// already present (whatever its flag) or repeated within `topics`.
    pub fn try_register_all<S: AsRef<str>>(&self, topics: &[S]) -> Result<()> {
        let mut registered = self.topics();

        let mut seen = HashSet::new();
        for topic in topics.iter().map(AsRef::as_ref) {
            if registered.contains_key(topic) || !seen.insert(topic) {
                return Err(MessagingError::duplicate_subscription(topic));
            }
        }

        for topic in seen {
            registered.insert(topic.to_string(), true);
        }
        Ok(())
    }

    /// Flips the flag of every present topic to disengaged and wakes the
    /// waiting loops. Returns the topics that were present.
    pub fn disengage<S: AsRef<str>>(&self, topics: &[S]) -> Vec<String> {
        let disengaged: Vec<String> = {
            let mut registered = self.topics();
            topics
                .iter()
                .map(AsRef::as_ref)
                .filter_map(|topic| {
                    registered.get_mut(topic).map(|engaged| {
                        *engaged = false;
                        topic.to_string()
                    })
                })
                .collect()
        };
        self.changed.notify_waiters();
        disengaged
    }

    /// Disengages every registered topic.
    pub fn disengage_all(&self) -> Vec<String> {
        let disengaged: Vec<String> = {
            let mut registered = self.topics();
            registered.values_mut().for_each(|engaged| *engaged = false);
            registered.keys().cloned().collect()
        };
        self.changed.notify_waiters();
        disengaged
    }

    pub fn is_engaged(&self, topic: &str) -> bool {
        self.topics().get(topic).copied().unwrap_or(false)
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.topics().contains_key(topic)
    }

    pub fn remove(&self, topic: &str) {
        self.topics().remove(topic);
    }

    pub fn len(&self) -> usize {
        self.topics().len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics().is_empty()
    }

    /// Resolves on the next disengage. Must be created (and enabled) before
    /// the flag check it guards.
    pub fn changed(&self) -> Notified<'_> {
        self.changed.notified()
    }
}
