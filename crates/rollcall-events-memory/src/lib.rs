//! In-process [`EventBus`] backed by tokio broadcast channels.
//!
//! Each company gets its own channel, created lazily on the first publish
//! or subscribe touching it. Membership churn is low-volume, so a small
//! bounded channel per company is plenty; events never leave the process,
//! which is all a single-server rollcall deployment needs.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use rollcall_events::{EventBus, EventBusError, EventStream, MembershipEvent};
use rollcall_storage::CompanyId;

const CHANNEL_CAPACITY: usize = 100;

/// Broadcast-channel bus keyed by company.
///
/// A subscriber that falls more than `CHANNEL_CAPACITY` events behind has
/// the gap dropped from its stream; such a watcher should re-read the
/// member list from the store rather than trust its replica of it.
pub struct MemoryEventBus {
    channels: DashMap<CompanyId, broadcast::Sender<MembershipEvent>>,
}

impl MemoryEventBus {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    fn channel(&self, company_id: &CompanyId) -> broadcast::Sender<MembershipEvent> {
        self.channels
            .entry(company_id.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(
        &self,
        company_id: &CompanyId,
        event: MembershipEvent,
    ) -> Result<(), EventBusError> {
        // send only fails when nobody is subscribed, which is not an error
        // for a fire-and-forget announcement
        let _ = self.channel(company_id).send(event);
        Ok(())
    }

    async fn subscribe(&self, company_id: &CompanyId) -> Result<EventStream, EventBusError> {
        let rx = self.channel(company_id).subscribe();

        // Lagged receivers yield an error item per gap; drop those so the
        // stream stays infallible for consumers.
        let stream = BroadcastStream::new(rx).filter_map(|result| result.ok());

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use uuid::Uuid;
    use rollcall_events::MembershipEventKind;

    fn event(kind: MembershipEventKind, company: &CompanyId, ts: i64) -> MembershipEvent {
        MembershipEvent {
            kind,
            company_id: company.0,
            user_id: Some(Uuid::new_v4()),
            role: Some("editor".to_string()),
            timestamp: ts,
        }
    }

    #[tokio::test]
    async fn publish_and_subscribe() {
        let bus = MemoryEventBus::new();
        let company = CompanyId(Uuid::new_v4());

        // Subscribe first
        let mut stream = bus.subscribe(&company).await.unwrap();

        bus.publish(&company, event(MembershipEventKind::MemberAdded, &company, 12345))
            .await
            .unwrap();

        let received = tokio::time::timeout(std::time::Duration::from_millis(100), stream.next())
            .await
            .expect("timeout")
            .expect("stream ended");

        assert_eq!(received.kind, MembershipEventKind::MemberAdded);
        assert_eq!(received.company_id, company.0);
        assert_eq!(received.timestamp, 12345);
    }

    #[tokio::test]
    async fn multiple_subscribers() {
        let bus = MemoryEventBus::new();
        let company = CompanyId(Uuid::new_v4());

        let mut stream1 = bus.subscribe(&company).await.unwrap();
        let mut stream2 = bus.subscribe(&company).await.unwrap();

        bus.publish(&company, event(MembershipEventKind::MemberUpdated, &company, 67890))
            .await
            .unwrap();

        let recv1 = stream1.next().await.unwrap();
        let recv2 = stream2.next().await.unwrap();

        assert_eq!(recv1.kind, MembershipEventKind::MemberUpdated);
        assert_eq!(recv2.kind, MembershipEventKind::MemberUpdated);
    }

    #[tokio::test]
    async fn publish_before_subscribe_is_lost() {
        let bus = MemoryEventBus::new();
        let company = CompanyId(Uuid::new_v4());

        bus.publish(&company, event(MembershipEventKind::MemberRemoved, &company, 99999))
            .await
            .unwrap();

        // Subscribe after - should not receive the old event
        let mut stream = bus.subscribe(&company).await.unwrap();

        let result =
            tokio::time::timeout(std::time::Duration::from_millis(50), stream.next()).await;

        assert!(
            result.is_err(),
            "Should not receive event published before subscription"
        );
    }

    #[tokio::test]
    async fn cross_company_isolation() {
        let bus = MemoryEventBus::new();
        let company_a = CompanyId(Uuid::new_v4());
        let company_b = CompanyId(Uuid::new_v4());

        // Subscribe to company_a only
        let mut stream_a = bus.subscribe(&company_a).await.unwrap();

        // Publish to company_b (should NOT be received by stream_a)
        bus.publish(&company_b, event(MembershipEventKind::MemberAdded, &company_b, 11111))
            .await
            .unwrap();

        // Publish to company_a (should be received)
        bus.publish(&company_a, event(MembershipEventKind::MemberAdded, &company_a, 22222))
            .await
            .unwrap();

        let received = tokio::time::timeout(std::time::Duration::from_millis(100), stream_a.next())
            .await
            .expect("timeout")
            .expect("stream ended");

        assert_eq!(received.company_id, company_a.0);
        assert_eq!(received.timestamp, 22222);
    }

    #[test]
    fn memory_event_bus_default() {
        let bus = MemoryEventBus::default();
        assert!(bus.channels.is_empty());
    }

    #[tokio::test]
    async fn multiple_events_ordering() {
        let bus = MemoryEventBus::new();
        let company = CompanyId(Uuid::new_v4());

        let mut stream = bus.subscribe(&company).await.unwrap();

        for i in 1i64..=3 {
            bus.publish(&company, event(MembershipEventKind::MemberUpdated, &company, i))
                .await
                .unwrap();
        }

        // Receive in order
        let recv1 = stream.next().await.unwrap();
        let recv2 = stream.next().await.unwrap();
        let recv3 = stream.next().await.unwrap();

        assert_eq!(recv1.timestamp, 1);
        assert_eq!(recv2.timestamp, 2);
        assert_eq!(recv3.timestamp, 3);
    }

    #[tokio::test]
    async fn subscribe_after_channel_exists() {
        let bus = MemoryEventBus::new();
        let company = CompanyId(Uuid::new_v4());

        // First subscriber creates the channel
        let _stream1 = bus.subscribe(&company).await.unwrap();

        // Second subscriber reuses existing channel
        let mut stream2 = bus.subscribe(&company).await.unwrap();

        bus.publish(&company, event(MembershipEventKind::MemberAdded, &company, 1))
            .await
            .unwrap();

        let received = tokio::time::timeout(std::time::Duration::from_millis(100), stream2.next())
            .await
            .expect("timeout")
            .expect("stream ended");

        assert_eq!(received.kind, MembershipEventKind::MemberAdded);
    }
}
