use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde::Serialize;
use tracing::{error, info};

use crate::StoreResult;

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!(
                    topic = %topic,
                    key = %key,
                    partition = delivery.partition,
                    offset = delivery.offset,
                    "Event published"
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!(topic = %topic, error = %e, "Failed to publish event");
                Err(e)
            }
        }
    }

    pub async fn publish_json<T: Serialize>(&self, topic: &str, key: &str, event: &T) -> StoreResult<()> {
        let payload = serde_json::to_string(event)?;
        self.publish(topic, key, &payload).await?;
        Ok(())
    }
}
