use rumqttc::{AsyncClient, ClientError, QoS};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("payload serialization failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("mqtt client rejected publish: {0}")]
    Client(#[from] ClientError),
}

/// Where device commands go. Publishing is fire-and-forget: an `Ok` only
/// means the message was queued, never that a device saw it.
pub trait CommandSink: Send + Sync {
    fn send(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError>;
}

/// One persistent MQTT client shared by the whole process. Messages are
/// queued in program order onto the client's event loop.
#[derive(Clone)]
pub struct MqttSink {
    client: AsyncClient,
}

impl MqttSink {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

impl CommandSink for MqttSink {
    fn send(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload)?;
        Ok(())
    }
}

/// Serializes and publishes, logging instead of returning failures. The
/// caller carries on either way since devices never acknowledge.
pub fn publish_json<T: Serialize>(sink: &dyn CommandSink, topic: &str, message: &T) {
    let result = serde_json::to_vec(message)
        .map_err(PublishError::from)
        .and_then(|payload| sink.send(topic, payload));

    match result {
        Ok(()) => debug!(topic, "command queued"),
        Err(err) => warn!(topic, "command publish failed: {err}"),
    }
}
