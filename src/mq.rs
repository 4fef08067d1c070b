//! Message queue.

use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};

use opentelemetry::global::get_text_map_propagator;
use opentelemetry::trace::TraceContextExt;
use paho_mqtt::{
    Client as MqttClient, ConnectOptionsBuilder, CreateOptionsBuilder,
    Message as MqttMessage, Properties as MqttProps, ServerResponse,
};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::config::{ListenerConfig, RECONNECT_MAX_DELAY, RECONNECT_MIN_DELAY, RECONNECT_POLL_INTERVAL};
use crate::listener::{self, ConnectInfo, EventHandler, Subscription};

/// The subscriber that receives the heart rate readings from the broker.
pub struct HeartRateSubscriber {
    client: MqttClient,
    config: ListenerConfig,
    client_id: String,
}

impl HeartRateSubscriber {
    pub fn new(config: ListenerConfig) -> Result<HeartRateSubscriber, Error> {
        let client_id = format!("heart-rate-zones-{}", uuid::Uuid::now_v7());

        let client = MqttClient::new(
            CreateOptionsBuilder::new()
                .server_uri(config.server_uri())
                .client_id(&client_id)
                .mqtt_version(paho_mqtt::MQTT_VERSION_5)
                .finalize(),
        )
        .map_err(Error::CreateMqttClient)?;

        Ok(HeartRateSubscriber {
            client,
            config,
            client_id,
        })
    }

    /// Connect, subscribe, and dispatch every received message to `handler`.
    ///
    /// Blocks for as long as the process lives. A failed connect or
    /// subscribe, or a failing handler, returns early. A dropped connection
    /// is re-established by the client and the handler asked to subscribe
    /// again.
    #[tracing::instrument(skip(handler), err)]
    pub fn run<H: EventHandler>(&self, handler: &mut H) -> Result<(), Error> {
        // consume before connecting so no message slips through
        let receiver = self.client.start_consuming();

        let info = self.connect()?;
        let subscription = handler.on_connect(&info);
        self.subscribe(&subscription)?;

        for event in receiver.iter() {
            handle_event(self, handler, event)?;
        }

        tracing::info!("message stream closed");
        Ok(())
    }

    #[tracing::instrument(err)]
    fn connect(&self) -> Result<ConnectInfo, Error> {
        tracing::info!("connect to the MQTT broker");

        let options = ConnectOptionsBuilder::new_v5()
            .keep_alive_interval(self.config.keep_alive)
            .clean_start(true)
            .automatic_reconnect(RECONNECT_MIN_DELAY, RECONNECT_MAX_DELAY)
            .finalize();

        let response = match self.client.connect(options) {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = ?e, "failed to connect to the MQTT broker");
                return Err(Error::Connect(e));
            }
        };

        tracing::info!(info = ?response, "connected to the MQTT broker");
        Ok(self.connect_info_from(&response))
    }

    fn connect_info_from(&self, response: &ServerResponse) -> ConnectInfo {
        match response.connect_response() {
            Some(connected) => ConnectInfo {
                server_uri: connected.server_uri,
                session_present: connected.session_present,
            },
            None => Session::connect_info(self),
        }
    }
}

impl Debug for HeartRateSubscriber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeartRateSubscriber")
            .field("client_id", &self.client_id)
            .field("server_uri", &self.config.server_uri())
            .finish()
    }
}

/// The parts of a broker connection the listen loop relies on.
pub(crate) trait Session {
    fn is_connected(&self) -> bool;

    fn subscribe(&self, subscription: &Subscription) -> Result<(), Error>;

    /// What to tell the handler after the client reconnected by itself.
    fn connect_info(&self) -> ConnectInfo;
}

impl Session for HeartRateSubscriber {
    fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    #[tracing::instrument(err)]
    fn subscribe(&self, subscription: &Subscription) -> Result<(), Error> {
        self.client
            .subscribe(&subscription.topic, subscription.qos)
            .map_err(|source| Error::Subscribe {
                topic: subscription.topic.clone(),
                source,
            })?;

        tracing::info!("subscribed");
        Ok(())
    }

    fn connect_info(&self) -> ConnectInfo {
        ConnectInfo {
            server_uri: self.config.server_uri(),
            session_present: false,
        }
    }
}

/// Handle one item from the consumer channel.
///
/// `None` is how the client signals a lost connection. The client
/// reconnects on its own; once it has, the subscription is requested
/// again since the session starts clean.
pub(crate) fn handle_event<S: Session, H: EventHandler>(
    session: &S,
    handler: &mut H,
    event: Option<MqttMessage>,
) -> Result<(), Error> {
    match event {
        Some(message) => {
            let span = message_span(&message);
            let _entered = span.enter();
            handler.on_message(&message)?;
        }
        None if !session.is_connected() => {
            tracing::warn!("lost the connection to the MQTT broker, waiting for the client to reconnect");
            while !session.is_connected() {
                std::thread::sleep(RECONNECT_POLL_INTERVAL);
            }

            tracing::info!("reconnected to the MQTT broker");
            let subscription = handler.on_connect(&session.connect_info());
            session.subscribe(&subscription)?;
        }
        None => {}
    }

    Ok(())
}

/// The span a message is handled in, continuing the publisher's trace.
pub(crate) fn message_span(message: &MqttMessage) -> tracing::Span {
    let span = tracing::info_span!(
        "message",
        topic = message.topic(),
        trace_id = tracing::field::Empty,
    );

    // tracing information
    let carrier = MqttCarrierExtractor::new(message.properties());
    let parent = get_text_map_propagator(|propagator| propagator.extract(&carrier));

    let parent_span_context = parent.span().span_context().clone();
    if parent_span_context.is_valid() {
        span.record("trace_id", tracing::field::display(parent_span_context.trace_id()));
    }

    span.set_parent(parent);
    span
}

/// Reads the trace context the publisher put into the MQTT user properties.
pub struct MqttCarrierExtractor(HashMap<String, String>);

impl MqttCarrierExtractor {
    pub fn new(props: &MqttProps) -> Self {
        MqttCarrierExtractor(props.user_iter().collect())
    }
}

impl opentelemetry::propagation::Extractor for MqttCarrierExtractor {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("create MQTT client: {0}")]
    CreateMqttClient(#[source] paho_mqtt::Error),

    #[error("connect to the MQTT broker: {0}")]
    Connect(#[source] paho_mqtt::Error),

    #[error("subscribe to {topic}: {source}")]
    Subscribe {
        topic: String,
        source: paho_mqtt::Error,
    },

    #[error("handle message: {0}")]
    Listener(#[from] listener::Error),
}
