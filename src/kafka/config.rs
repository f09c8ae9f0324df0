//! Kafka configuration module

use envconfig::Envconfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Kafka configuration settings
#[derive(Debug, Clone, Deserialize, Serialize, Envconfig)]
pub struct KafkaConfig {
    /// Kafka broker addresses (comma-separated)
    #[serde(default = "default_brokers")]
    #[envconfig(from = "KAFKA_BROKERS", default = "localhost:9092")]
    pub brokers: String,

    /// Consumer group ID
    #[serde(default = "default_consumer_group")]
    #[envconfig(from = "KAFKA_CONSUMER_GROUP", default = "kioskflow-consumer")]
    pub consumer_group: String,

    /// Topic the kiosks publish to
    #[serde(default = "default_topic")]
    #[envconfig(from = "KAFKA_TOPIC", default = "lmnh")]
    pub topic: String,

    /// Security protocol (PLAINTEXT, SASL_SSL, ...)
    #[serde(default)]
    #[envconfig(from = "KAFKA_SECURITY_PROTOCOL")]
    pub security_protocol: Option<String>,

    /// SASL mechanism (PLAIN, SCRAM-SHA-512, ...)
    #[serde(default)]
    #[envconfig(from = "KAFKA_SASL_MECHANISM")]
    pub sasl_mechanism: Option<String>,

    /// SASL username
    #[serde(default)]
    #[envconfig(from = "KAFKA_SASL_USERNAME")]
    pub sasl_username: Option<String>,

    /// SASL password
    #[serde(default, skip_serializing)]
    #[envconfig(from = "KAFKA_SASL_PASSWORD")]
    pub sasl_password: Option<String>,

    /// Where a new consumer group starts reading
    #[serde(default = "default_auto_offset_reset")]
    #[envconfig(from = "KAFKA_AUTO_OFFSET_RESET", default = "earliest")]
    pub auto_offset_reset: String,

    /// Session timeout in milliseconds
    #[serde(default = "default_session_timeout")]
    #[envconfig(from = "KAFKA_SESSION_TIMEOUT_MS", default = "30000")]
    pub session_timeout_ms: u32,

    /// How long a single poll waits for a message, in milliseconds
    #[serde(default = "default_poll_timeout")]
    #[envconfig(from = "KAFKA_POLL_TIMEOUT_MS", default = "1000")]
    pub poll_timeout_ms: u64,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            consumer_group: default_consumer_group(),
            topic: default_topic(),
            security_protocol: None,
            sasl_mechanism: None,
            sasl_username: None,
            sasl_password: None,
            auto_offset_reset: default_auto_offset_reset(),
            session_timeout_ms: default_session_timeout(),
            poll_timeout_ms: default_poll_timeout(),
        }
    }
}

impl KafkaConfig {
    /// Get session timeout as Duration
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms as u64)
    }

    /// Get poll timeout as Duration
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Whether SASL credentials were supplied
    pub fn uses_sasl(&self) -> bool {
        self.sasl_mechanism.is_some()
    }

    /// Build rdkafka consumer configuration
    ///
    /// Offsets are committed by the event source after each message has
    /// been handled, so auto-commit stays off.
    pub fn build_consumer_config(&self) -> rdkafka::ClientConfig {
        let mut config = rdkafka::ClientConfig::new();

        config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.consumer_group)
            .set("enable.auto.commit", "false")
            .set("session.timeout.ms", self.session_timeout().as_millis().to_string())
            .set("enable.partition.eof", "false")
            .set("auto.offset.reset", &self.auto_offset_reset);

        if let Some(protocol) = &self.security_protocol {
            config.set("security.protocol", protocol);
        }
        if let Some(mechanism) = &self.sasl_mechanism {
            config.set("sasl.mechanisms", mechanism);
        }
        if let Some(username) = &self.sasl_username {
            config.set("sasl.username", username);
        }
        if let Some(password) = &self.sasl_password {
            config.set("sasl.password", password);
        }

        config
    }
}

// Default value functions
fn default_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_consumer_group() -> String {
    "kioskflow-consumer".to_string()
}

fn default_topic() -> String {
    "lmnh".to_string()
}

fn default_auto_offset_reset() -> String {
    "earliest".to_string()
}

fn default_session_timeout() -> u32 {
    30000 // 30 seconds
}

fn default_poll_timeout() -> u64 {
    1000
}
