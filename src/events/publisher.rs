use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::activity::{ActivityRecord, ActivitySink};
use crate::config::EventsConfig;

/// Activity record together with the topic it was published on
#[derive(Debug, Clone)]
pub struct PublishedActivity {
    pub topic: String,
    pub record: ActivityRecord,
}

/// In-process activity publisher backed by a broadcast channel
#[derive(Debug, Clone)]
pub struct ActivityPublisher {
    topic: String,
    sender: broadcast::Sender<PublishedActivity>,
}

impl ActivityPublisher {
    pub fn new(topic: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            topic: topic.into(),
            sender,
        }
    }

    pub fn from_config(config: &EventsConfig) -> Self {
        Self::new(config.topic.clone(), config.channel_capacity)
    }

    /// Subscribe to activity records
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedActivity> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Subscribe and hand every record to `on_activity` until the publisher
    /// is dropped. Lagged records are skipped with a warning.
    pub fn spawn_consumer<F>(&self, on_activity: F) -> JoinHandle<()>
    where
        F: Fn(PublishedActivity) + Send + 'static,
    {
        let mut receiver = self.subscribe();
        let topic = self.topic.clone();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => on_activity(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(topic = %topic, skipped = skipped, "Activity consumer lagged, records dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!(topic = %topic, "Activity consumer stopped");
        })
    }
}

/// Log sink for published activity records
pub fn log_activity(event: PublishedActivity) {
    let PublishedActivity { topic, record } = event;
    info!(
        topic = %topic,
        activity_type = %record.activity_type,
        container_code = %record.container_code,
        user = %record.user,
        target_name = ?record.target_name,
        activity_time = %record.activity_time,
        "Dataset activity"
    );
}

#[async_trait]
impl ActivitySink for ActivityPublisher {
    async fn publish(&self, record: ActivityRecord) {
        let activity_type = record.activity_type;
        let event = PublishedActivity {
            topic: self.topic.clone(),
            record,
        };

        // The server always runs a consumer; no receiver means shutdown or a test
        if self.sender.send(event).is_err() {
            debug!(topic = %self.topic, activity_type = %activity_type, "No activity subscribers");
        }
    }
}

impl Default for ActivityPublisher {
    fn default() -> Self {
        Self::from_config(&EventsConfig::default())
    }
}
