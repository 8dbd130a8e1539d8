/// Blocking MQTT round-trip to the Thingstream CloudLocate service.
use std::time::{Duration, Instant};

use rumqttc::{Client, Connection, Event, MqttOptions, Outgoing, Packet, QoS, RecvTimeoutError};
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use super::{PositionResolver, Topics};
use crate::{protocol::cloudlocate::MAX_MESSAGE_BYTES, TransportError};

pub const DEFAULT_MQTT_HOST: &str = "mqtt.thingstream.io";
pub const DEFAULT_MQTT_PORT: u16 = 1883;

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);
const MAX_INCOMING_PACKET: usize = 10 * 1024;

/// Broker account used for CloudLocate. A new connection is made for every request and
/// dropped once the answer is in.
pub struct CloudLocateClient {
    host: String,
    port: u16,
    device_id: String,
    username: String,
    password: String,
}

impl CloudLocateClient {
    pub fn new(host: &str, port: u16, device_id: &str, username: &str, password: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            device_id: device_id.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    pub fn topics(&self) -> Topics {
        Topics::for_device(&self.device_id)
    }

    fn options(&self, topics: &Topics) -> MqttOptions {
        let mut options = MqttOptions::new(&self.device_id, &self.host, self.port);
        options.set_credentials(&self.username, &self.password);
        options.set_keep_alive(KEEP_ALIVE);
        options.set_max_packet_size(MAX_INCOMING_PACKET, outgoing_packet_limit(topics));
        options
    }
}

/// Largest PUBLISH we send: a full-size envelope on the request topic, plus the fixed header
/// (1 byte and up to 4 bytes of remaining length) and the 2-byte topic length.
fn outgoing_packet_limit(topics: &Topics) -> usize {
    MAX_MESSAGE_BYTES + topics.request.len() + 7
}

impl PositionResolver for CloudLocateClient {
    fn publish_and_await(
        &mut self,
        envelope: &str,
        topics: &Topics,
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        info!("connecting to {}:{} as {}", self.host, self.port, self.device_id);
        let (client, mut connection) = Client::new(self.options(topics), 10);

        let result = round_trip(&client, &mut connection, envelope, topics, timeout);
        hang_up(&client, &mut connection);
        result
    }
}

fn round_trip(
    client: &Client,
    connection: &mut Connection,
    envelope: &str,
    topics: &Topics,
    timeout: Duration,
) -> Result<Value, TransportError> {
    client
        .subscribe(topics.response.as_str(), QoS::AtMostOnce)
        .map_err(|e| TransportError::Mqtt(format!("subscribe: {e}")))?;
    client
        .publish(
            topics.request.as_str(),
            QoS::AtMostOnce,
            false,
            envelope.as_bytes().to_vec(),
        )
        .map_err(|e| TransportError::Mqtt(format!("publish: {e}")))?;
    debug!("request queued on {}", topics.request);

    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(TransportError::Timeout(timeout));
        }
        match connection.recv_timeout(remaining) {
            Ok(Ok(Event::Incoming(Packet::Publish(msg)))) if msg.topic == topics.response => {
                debug!(
                    "received {} bytes on {}: {}",
                    msg.payload.len(),
                    msg.topic,
                    String::from_utf8_lossy(&msg.payload)
                );
                return serde_json::from_slice(&msg.payload)
                    .map_err(|e| TransportError::Protocol(format!("CloudLocate answer: {e}")));
            }
            Ok(Ok(Event::Incoming(Packet::Publish(msg)))) => {
                warn!("ignoring message on unexpected topic {}", msg.topic);
            }
            Ok(Ok(event)) => trace!("mqtt event: {:?}", event),
            Ok(Err(e)) => return Err(TransportError::Mqtt(e.to_string())),
            Err(RecvTimeoutError::Timeout) => return Err(TransportError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(TransportError::Mqtt("connection closed".to_string()))
            }
        }
    }
}

/// Send DISCONNECT and drive the event loop until it has gone out.
fn hang_up(client: &Client, connection: &mut Connection) {
    if let Err(e) = client.disconnect() {
        debug!("disconnect request failed: {}", e);
        return;
    }
    let deadline = Instant::now() + DISCONNECT_GRACE;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return;
        }
        match connection.recv_timeout(remaining) {
            Ok(Ok(Event::Outgoing(Outgoing::Disconnect))) => {
                debug!("disconnected");
                return;
            }
            Ok(Ok(_)) => {}
            Ok(Err(_)) | Err(_) => return,
        }
    }
}
