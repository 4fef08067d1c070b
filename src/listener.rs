//! Handling of the broker connection events.

use std::io::{self, Stdout, Write};

use paho_mqtt::Message as MqttMessage;

use crate::config::ListenerConfig;
use crate::zone::{Reading, Zone};

/// What the listener learns when the connection is (re-)established.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectInfo {
    pub server_uri: String,
    /// Whether the broker resumed a previous session.
    pub session_present: bool,
}

/// A topic to subscribe to once connected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscription {
    pub topic: String,
    pub qos: i32,
}

/// Receives the events raised by the listen loop.
pub trait EventHandler {
    /// Called after every successful connect, including reconnects.
    ///
    /// Returns the subscription to request from the broker.
    fn on_connect(&mut self, info: &ConnectInfo) -> Subscription;

    /// Called for every message received on the subscription.
    ///
    /// Malformed payloads are not errors here; an `Err` means the
    /// handler itself is broken and the loop should stop.
    fn on_message(&mut self, message: &MqttMessage) -> Result<Option<Zone>, Error>;
}

/// Classifies every heart rate reading and writes its zone to `out`.
#[derive(Debug)]
pub struct ZoneListener<W> {
    out: W,
    subscription: Subscription,
}

impl ZoneListener<Stdout> {
    pub fn stdout(config: &ListenerConfig) -> Self {
        ZoneListener::new(config, io::stdout())
    }
}

impl<W: Write> ZoneListener<W> {
    pub fn new(config: &ListenerConfig, out: W) -> Self {
        ZoneListener {
            out,
            subscription: Subscription {
                topic: config.topic.clone(),
                qos: config.qos,
            },
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn report(&mut self, reading: &Reading, zone: Zone) -> io::Result<()> {
        writeln!(self.out, "Heart rate: {:?} BPM, Zone: {}", reading.bpm(), zone)
    }
}

impl<W: Write> EventHandler for ZoneListener<W> {
    fn on_connect(&mut self, info: &ConnectInfo) -> Subscription {
        tracing::info!(
            server_uri = info.server_uri,
            session_present = info.session_present,
            topic = self.subscription.topic,
            "connected to the broker"
        );

        self.subscription.clone()
    }

    fn on_message(&mut self, message: &MqttMessage) -> Result<Option<Zone>, Error> {
        let received_at = chrono::Utc::now()
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let emitted_at = message.properties().find_user_property("emitted_at");
        tracing::debug!(topic = message.topic(), ?emitted_at, received_at, "message received");

        let reading = match Reading::from_payload(message.payload()) {
            Ok(reading) => reading,
            Err(e) => {
                tracing::warn!(error = %e, "error processing the received data, reading discarded");
                return Ok(None);
            }
        };

        let zone = reading.zone();
        self.report(&reading, zone)?;

        Ok(Some(zone))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("write zone report: {0}")]
    WriteReport(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;

    fn listener() -> ZoneListener<Vec<u8>> {
        ZoneListener::new(&ListenerConfig::default(), Vec::new())
    }

    fn message(payload: &str) -> MqttMessage {
        MqttMessage::new("sw/bpm", payload, 0)
    }

    fn output(listener: ZoneListener<Vec<u8>>) -> String {
        String::from_utf8(listener.into_inner()).unwrap()
    }

    #[test]
    fn test_on_connect_subscribes_to_configured_topic() {
        let mut listener = listener();
        let info = ConnectInfo {
            server_uri: "tcp://192.168.1.103:1883".to_string(),
            session_present: false,
        };

        let subscription = listener.on_connect(&info);
        assert_eq!(
            subscription,
            Subscription {
                topic: "sw/bpm".to_string(),
                qos: 0,
            }
        );

        // reconnects ask for the same subscription again
        assert_eq!(listener.on_connect(&info), subscription);
    }

    #[test]
    fn test_warm_up_reading() {
        let mut listener = listener();

        let zone = listener.on_message(&message("85")).unwrap();
        assert_eq!(zone, Some(Zone::WarmUp));
        assert_eq!(output(listener), "Heart rate: 85.0 BPM, Zone: Warm-up\n");
    }

    #[test]
    fn test_cardiovascular_reading() {
        let mut listener = listener();

        let zone = listener.on_message(&message("150")).unwrap();
        assert_eq!(zone, Some(Zone::Cardiovascular));
        assert_eq!(output(listener), "Heart rate: 150.0 BPM, Zone: Cardiovascular\n");
    }

    #[test]
    #[traced_test]
    fn test_malformed_reading_is_discarded() {
        let mut listener = listener();

        assert_eq!(listener.on_message(&message("abc")).unwrap(), None);
        assert!(logs_contain("reading discarded"));
        assert!(logs_contain("\"abc\" is not a number"));
        assert_eq!(
            listener.on_message(&message("125.5")).unwrap(),
            Some(Zone::FatBurning)
        );
        assert_eq!(listener.on_message(&message("170")).unwrap(), Some(Zone::Anaerobic));

        assert_eq!(
            output(listener),
            "Heart rate: 125.5 BPM, Zone: Fat-burning\nHeart rate: 170.0 BPM, Zone: Anaerobic\n"
        );
    }

    #[test]
    fn test_write_failure_is_an_error() {
        struct BrokenPipe;

        impl Write for BrokenPipe {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::ErrorKind::BrokenPipe.into())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut listener = ZoneListener::new(&ListenerConfig::default(), BrokenPipe);
        let err = listener.on_message(&message("99")).unwrap_err();
        assert!(matches!(err, Error::WriteReport(_)));

        // a malformed payload never reaches the output
        assert_eq!(listener.on_message(&message("x")).unwrap(), None);
    }
}
