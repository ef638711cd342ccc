//! Message counters.
//!
//! Two counters are kept per process, both labelled by adapter, channel and
//! user: messages received from adapters and messages sent through response
//! writers. Exporting them is left to the embedding application; see
//! [`LabeledCounter::snapshot`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;

/// Label set attached to every counter increment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MessageLabels {
    pub adapter: String,
    pub channel: String,
    pub user: String,
}

/// A monotonically increasing counter partitioned by [`MessageLabels`].
#[derive(Debug, Default)]
pub struct LabeledCounter {
    values: RwLock<HashMap<MessageLabels, AtomicU64>>,
}

impl LabeledCounter {
    /// Increments the counter for the given labels.
    pub fn inc(&self, adapter: &str, channel: &str, user: &str) {
        let labels = MessageLabels {
            adapter: adapter.to_string(),
            channel: channel.to_string(),
            user: user.to_string(),
        };

        if let Some(counter) = self.values.read().get(&labels) {
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }

        self.values
            .write()
            .entry(labels)
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Current value for one label set.
    pub fn get(&self, adapter: &str, channel: &str, user: &str) -> u64 {
        let labels = MessageLabels {
            adapter: adapter.to_string(),
            channel: channel.to_string(),
            user: user.to_string(),
        };
        self.values
            .read()
            .get(&labels)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// Sum over all label sets.
    pub fn total(&self) -> u64 {
        self.values
            .read()
            .values()
            .map(|c| c.load(Ordering::Relaxed))
            .sum()
    }

    /// All label sets with their values, sorted by label.
    pub fn snapshot(&self) -> Vec<(MessageLabels, u64)> {
        let mut out: Vec<_> = self
            .values
            .read()
            .iter()
            .map(|(labels, c)| (labels.clone(), c.load(Ordering::Relaxed)))
            .collect();
        out.sort();
        out
    }
}

/// Process-wide message counters.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Messages received from adapters.
    pub messages_received: LabeledCounter,
    /// Messages sent through response writers.
    pub messages_sent: LabeledCounter,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_counts_are_partitioned_by_labels() {
        let counter = LabeledCounter::default();
        counter.inc("slack", "#ops", "alice");
        counter.inc("slack", "#ops", "alice");
        counter.inc("slack", "#dev", "bob");

        assert_eq!(counter.get("slack", "#ops", "alice"), 2);
        assert_eq!(counter.get("slack", "#dev", "bob"), 1);
        assert_eq!(counter.get("irc", "#ops", "alice"), 0);
        assert_eq!(counter.total(), 3);
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let counter = LabeledCounter::default();
        counter.inc("b", "", "");
        counter.inc("a", "", "");

        let adapters: Vec<_> = counter
            .snapshot()
            .into_iter()
            .map(|(l, _)| l.adapter)
            .collect();

        assert_eq!(adapters, ["a", "b"]);
    }

    #[tokio::test]
    async fn test_concurrent_increments() {
        let metrics = Arc::new(Metrics::default());
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let metrics = Arc::clone(&metrics);
            tasks.push(tokio::spawn(async move {
                for _ in 0..100 {
                    metrics.messages_received.inc("shell", "tty", "me");
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(metrics.messages_received.get("shell", "tty", "me"), 800);
    }
}
