use core::fmt::Write;

use heapless::String;

use crate::config::Config;
use crate::constants::{PRESENCE_PAYLOAD_CAPACITY, PRESENCE_TOPIC_CAPACITY, VERSION};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    TopicTooLong,
    PayloadTooLong,
}

/// Node availability, published retained on the presence topic.
/// `Offline` is registered as the MQTT last will.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Online,
    Offline,
}

impl Presence {
    pub fn as_str(self) -> &'static str {
        match self {
            Presence::Online => "online",
            Presence::Offline => "offline",
        }
    }
}

/// `<mqtt_topic>/status/<device_id>`
pub fn presence_topic(config: &Config) -> Result<String<PRESENCE_TOPIC_CAPACITY>, Error> {
    let mut topic: String<PRESENCE_TOPIC_CAPACITY> = String::new();
    write!(topic, "{}/status/{}", config.mqtt_topic, config.device_id)
        .map_err(|_| Error::TopicTooLong)?;
    Ok(topic)
}

// The device ID charset (alphanumerics, '-', '_') needs no JSON escaping.
pub fn presence_payload(
    device_id: &str,
    presence: Presence,
) -> Result<String<PRESENCE_PAYLOAD_CAPACITY>, Error> {
    let mut payload: String<PRESENCE_PAYLOAD_CAPACITY> = String::new();
    write!(
        payload,
        "{{\"device_id\":\"{}\",\"status\":\"{}\",\"version\":\"{}\"}}",
        device_id,
        presence.as_str(),
        VERSION
    )
    .map_err(|_| Error::PayloadTooLong)?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{DEVICE_ID_MAX_LEN, TOPIC_MAX_LEN};

    const NODE: Config = Config {
        device_id: "ESP32_Node_01",
        mqtt_broker: "10.0.0.5",
        mqtt_password: "",
        mqtt_port: 1883,
        mqtt_topic: "flowguard",
        mqtt_username: "",
        wifi_password: "password1",
        wifi_ssid: "FieldLab",
    };

    #[test]
    fn test_presence_topic() {
        let topic = presence_topic(&NODE).unwrap();
        assert_eq!(topic.as_str(), "flowguard/status/ESP32_Node_01");
    }

    #[test]
    fn test_presence_topic_fits_longest_valid_fields() {
        let topic = "t".repeat(TOPIC_MAX_LEN);
        let device_id = "d".repeat(DEVICE_ID_MAX_LEN);
        let config = Config {
            mqtt_topic: Box::leak(topic.into_boxed_str()),
            device_id: Box::leak(device_id.into_boxed_str()),
            ..NODE
        };
        assert_eq!(config.validate(), Ok(()));
        let topic = presence_topic(&config).unwrap();
        assert_eq!(topic.len(), PRESENCE_TOPIC_CAPACITY);
    }

    #[test]
    fn test_presence_topic_overflow() {
        let topic = "t".repeat(PRESENCE_TOPIC_CAPACITY);
        let config = Config {
            mqtt_topic: Box::leak(topic.into_boxed_str()),
            ..NODE
        };
        assert_eq!(presence_topic(&config), Err(Error::TopicTooLong));
    }

    #[test]
    fn test_presence_payload() {
        let online = presence_payload("ESP32_Node_01", Presence::Online).unwrap();
        assert_eq!(
            online.as_str(),
            format!(
                "{{\"device_id\":\"ESP32_Node_01\",\"status\":\"online\",\"version\":\"{}\"}}",
                VERSION
            )
        );

        let offline = presence_payload("ESP32_Node_01", Presence::Offline).unwrap();
        assert!(offline.contains("\"status\":\"offline\""));
    }

    #[test]
    fn test_presence_payload_overflow() {
        let device_id = "d".repeat(PRESENCE_PAYLOAD_CAPACITY);
        assert_eq!(
            presence_payload(&device_id, Presence::Online),
            Err(Error::PayloadTooLong)
        );
    }
}
