//! Connection constants.

use std::time::Duration;

pub const BROKER_HOST: &str = "192.168.1.103";
pub const BROKER_PORT: u16 = 1883;
pub const KEEP_ALIVE: Duration = Duration::from_secs(60);

/// The topic the heart rate readings are published to.
pub const TOPIC: &str = "sw/bpm";
pub const QOS: i32 = 0;

/// Bounds of the client's automatic reconnect delay after the connection drops.
pub const RECONNECT_MIN_DELAY: Duration = Duration::from_secs(1);
pub const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(120);

/// How often to check whether the client has reconnected.
pub const RECONNECT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Where to connect and what to listen to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerConfig {
    pub host: String,
    pub port: u16,
    pub keep_alive: Duration,
    pub topic: String,
    pub qos: i32,
}

impl ListenerConfig {
    pub fn server_uri(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        ListenerConfig {
            host: BROKER_HOST.to_string(),
            port: BROKER_PORT,
            keep_alive: KEEP_ALIVE,
            topic: TOPIC.to_string(),
            qos: QOS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ListenerConfig::default();

        assert_eq!(config.server_uri(), "tcp://192.168.1.103:1883");
        assert_eq!(config.keep_alive, Duration::from_secs(60));
        assert_eq!(config.topic, "sw/bpm");
        assert_eq!(config.qos, 0);
    }
}
