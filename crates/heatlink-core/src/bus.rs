// ── Publish/subscribe bus ──
//
// Topic-keyed fan-out built on `broadcast` channels. One sender per topic,
// created lazily; publishing never blocks and is safe from any number of
// concurrent pollers.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use dashmap::DashMap;
use strum::{Display, EnumIter, EnumString};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};
use tracing::{trace, warn};

use crate::model::{Parameter, ParameterId, SystemId};

const DEFAULT_CAPACITY: usize = 256;

/// Topics the integration publishes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum Topic {
    StatusesUpdated,
    ParametersUpdated,
}

/// Payload published on the bus.
///
/// Payloads are shared behind `Arc` so fan-out to many subscribers
/// doesn't clone the underlying maps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    StatusesUpdated {
        system_id: SystemId,
        statuses: Arc<BTreeSet<String>>,
    },
    ParametersUpdated {
        system_id: SystemId,
        parameters: Arc<HashMap<ParameterId, Parameter>>,
    },
}

impl Signal {
    pub fn topic(&self) -> Topic {
        match self {
            Self::StatusesUpdated { .. } => Topic::StatusesUpdated,
            Self::ParametersUpdated { .. } => Topic::ParametersUpdated,
        }
    }

    pub fn system_id(&self) -> SystemId {
        match self {
            Self::StatusesUpdated { system_id, .. } | Self::ParametersUpdated { system_id, .. } => {
                *system_id
            }
        }
    }
}

// ── EventBus ────────────────────────────────────────────────────────

/// Process-wide signal bus shared by every access point.
#[derive(Debug)]
pub struct EventBus {
    channels: DashMap<Topic, broadcast::Sender<Signal>>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus whose per-topic channels buffer `capacity` signals before slow
    /// subscribers start lagging.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    fn sender(&self, topic: Topic) -> broadcast::Sender<Signal> {
        self.channels
            .entry(topic)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Publish a signal on its topic. Returns how many subscribers saw it;
    /// zero subscribers is not an error.
    pub fn publish(&self, signal: Signal) -> usize {
        let topic = signal.topic();
        let delivered = self.sender(topic).send(signal).unwrap_or(0);
        trace!(%topic, delivered, "published signal");
        delivered
    }

    /// Attach a raw receiver to a topic.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Signal> {
        self.sender(topic).subscribe()
    }

    /// Attach to a topic as a stream. Lagged signals are logged and skipped.
    pub fn stream(&self, topic: Topic) -> impl Stream<Item = Signal> + Send + 'static {
        BroadcastStream::new(self.subscribe(topic)).filter_map(move |item| match item {
            Ok(signal) => Some(signal),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(%topic, skipped, "bus subscriber lagged");
                None
            }
        })
    }

    /// Number of live subscribers on a topic.
    pub fn receiver_count(&self, topic: Topic) -> usize {
        self.channels
            .get(&topic)
            .map_or(0, |sender| sender.receiver_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn statuses(system_id: SystemId, titles: &[&str]) -> Signal {
        Signal::StatusesUpdated {
            system_id,
            statuses: Arc::new(titles.iter().map(|t| (*t).to_owned()).collect()),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_only_their_topic() {
        let bus = EventBus::new();
        let mut status_rx = bus.subscribe(Topic::StatusesUpdated);
        let mut param_rx = bus.subscribe(Topic::ParametersUpdated);

        assert_eq!(bus.publish(statuses(7, &["Compressor"])), 1);

        assert_eq!(status_rx.recv().await.ok(), Some(statuses(7, &["Compressor"])));
        assert!(param_rx.try_recv().is_err());
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(statuses(1, &[])), 0);
        assert_eq!(bus.receiver_count(Topic::StatusesUpdated), 0);
    }

    #[tokio::test]
    async fn stream_skips_lagged_signals() {
        let bus = EventBus::with_capacity(1);
        let mut stream = Box::pin(bus.stream(Topic::StatusesUpdated));

        bus.publish(statuses(1, &["a"]));
        bus.publish(statuses(2, &["b"]));

        let next = stream.next().await.map(|s| s.system_id());
        assert_eq!(next, Some(2));
    }

    #[test]
    fn topic_names_are_kebab_case() {
        assert_eq!(Topic::ParametersUpdated.to_string(), "parameters-updated");
    }
}
