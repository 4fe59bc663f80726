use core::fmt;

use crate::rules::{self, Field, Violation};

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Config {
    // Device ID (DHCP hostname and MQTT client identifier)
    pub device_id: &'static str,

    // MQTT broker hostname or IPv4 address
    pub mqtt_broker: &'static str,

    // MQTT password, empty for anonymous brokers
    pub mqtt_password: &'static str,

    // MQTT port (usually 1883, or 8883 for TLS)
    pub mqtt_port: u16,

    // Base MQTT topic
    pub mqtt_topic: &'static str,

    // MQTT username, empty for anonymous brokers
    pub mqtt_username: &'static str,

    // Wi-Fi pre-shared key (password)
    pub wifi_password: &'static str,

    // Wi-Fi SSID to connect to
    pub wifi_ssid: &'static str,
}

// config values are generated at compile time
include!(concat!(env!("OUT_DIR"), "/config.rs"));

pub const SECRET_SSID: &str = CONFIG.wifi_ssid;
pub const SECRET_WIFI_PASS: &str = CONFIG.wifi_password;
pub const SECRET_MQTT_BROKER: &str = CONFIG.mqtt_broker;
pub const SECRET_MQTT_PORT: u16 = CONFIG.mqtt_port;
pub const SECRET_MQTT_USER: &str = CONFIG.mqtt_username;
pub const SECRET_MQTT_PASS: &str = CONFIG.mqtt_password;
pub const SECRET_MQTT_TOPIC: &str = CONFIG.mqtt_topic;
pub const SECRET_DEVICE_ID: &str = CONFIG.device_id;

impl Config {
    /// String value of `field`, `None` for the port
    pub fn text(&self, field: Field) -> Option<&'static str> {
        match field {
            Field::WifiSsid => Some(self.wifi_ssid),
            Field::WifiPassword => Some(self.wifi_password),
            Field::MqttBroker => Some(self.mqtt_broker),
            Field::MqttPort => None,
            Field::MqttUsername => Some(self.mqtt_username),
            Field::MqttPassword => Some(self.mqtt_password),
            Field::MqttTopic => Some(self.mqtt_topic),
            Field::DeviceId => Some(self.device_id),
        }
    }

    /// Every rule this record breaks. The generated `CONFIG` never yields
    /// any since the build script runs the same rules.
    pub fn violations(&self) -> impl Iterator<Item = Violation> + '_ {
        Field::ALL
            .into_iter()
            .filter_map(move |field| match self.text(field) {
                Some(value) => rules::check_text(field, value).err(),
                None => rules::check_port(i64::from(self.mqtt_port)).err(),
            })
            .chain(rules::check_auth(self.mqtt_username, self.mqtt_password).err())
    }

    pub fn validate(&self) -> Result<(), Violation> {
        match self.violations().next() {
            Some(violation) => Err(violation),
            None => Ok(()),
        }
    }

    /// Fields still holding a value from `cfg.toml.example`
    pub fn placeholders(&self) -> impl Iterator<Item = (Field, &'static str)> + '_ {
        Field::ALL.into_iter().filter_map(move |field| {
            self.text(field)
                .and_then(rules::find_placeholder)
                .map(|placeholder| (field, placeholder))
        })
    }

    /// Credentials are only sent when both halves are configured
    pub fn has_auth(&self) -> bool {
        !self.mqtt_username.is_empty() && !self.mqtt_password.is_empty()
    }
}

struct Redacted(&'static str);

impl fmt::Debug for Redacted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("\"\"")
        } else {
            f.write_str("<redacted>")
        }
    }
}

// Safe to log: sensitive fields are never printed
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Config");
        for field in Field::ALL {
            match self.text(field) {
                Some(value) if field.is_sensitive() => out.field(field.key(), &Redacted(value)),
                Some(value) => out.field(field.key(), &value),
                None => out.field(field.key(), &self.mqtt_port),
            };
        }
        out.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODE: Config = Config {
        device_id: "node-07",
        mqtt_broker: "34.118.7.201",
        mqtt_password: "s3cr3t-pass",
        mqtt_port: 1883,
        mqtt_topic: "flowguard",
        mqtt_username: "node07",
        wifi_password: "correct horse battery",
        wifi_ssid: "FieldLab",
    };

    #[test]
    fn test_secret_constants_alias_config() {
        let port: u16 = SECRET_MQTT_PORT;
        assert_eq!(port, CONFIG.mqtt_port);
        assert_eq!(SECRET_SSID, CONFIG.wifi_ssid);
        assert_eq!(SECRET_WIFI_PASS, CONFIG.wifi_password);
        assert_eq!(SECRET_MQTT_BROKER, CONFIG.mqtt_broker);
        assert_eq!(SECRET_MQTT_USER, CONFIG.mqtt_username);
        assert_eq!(SECRET_MQTT_PASS, CONFIG.mqtt_password);
        assert_eq!(SECRET_MQTT_TOPIC, CONFIG.mqtt_topic);
        assert_eq!(SECRET_DEVICE_ID, CONFIG.device_id);
    }

    #[test]
    fn test_generated_config_is_valid() {
        assert_eq!(CONFIG.validate(), Ok(()));
        assert!(CONFIG.mqtt_port >= 1);
    }

    #[test]
    fn test_generated_config_matches_source_file() {
        if env!("FLOWGUARD_CFG_OVERRIDDEN") == "1" {
            return;
        }

        let source = std::fs::read_to_string(env!("FLOWGUARD_CFG_SOURCE")).unwrap();
        let table: toml::Table = toml::from_str(&source).unwrap();

        for field in Field::ALL {
            match CONFIG.text(field) {
                Some(value) => {
                    let expected = table[field.key()].as_str().unwrap();
                    assert_eq!(value.as_bytes(), expected.as_bytes(), "{field}");
                }
                None => assert_eq!(
                    table[field.key()].as_integer(),
                    Some(i64::from(CONFIG.mqtt_port))
                ),
            }
        }
    }

    #[test]
    fn test_port_1883_is_an_integer() {
        let config = Config {
            mqtt_port: 1883,
            ..NODE
        };
        assert_eq!(config.mqtt_port, 1883u16);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_zero_port_is_rejected() {
        let config = Config {
            mqtt_port: 0,
            ..NODE
        };
        assert_eq!(config.validate(), Err(Violation::PortOutOfRange(0)));
    }

    #[test]
    fn test_violations_lists_every_problem() {
        let config = Config {
            wifi_ssid: "",
            mqtt_topic: "flowguard/#",
            mqtt_username: "",
            ..NODE
        };
        let violations: Vec<_> = config.violations().collect();
        assert_eq!(
            violations,
            [
                Violation::Empty(Field::WifiSsid),
                Violation::Wildcard(Field::MqttTopic),
                Violation::IncompleteAuth,
            ]
        );
    }

    #[test]
    fn test_placeholders_found_in_template() {
        let template = Config {
            device_id: "ESP32_Node_01",
            mqtt_broker: "YOUR_GCP_EXTERNAL_IP",
            mqtt_password: "YOUR_SECURE_PASSWORD",
            mqtt_port: 1883,
            mqtt_topic: "flowguard",
            mqtt_username: "YOUR_MQTT_USERNAME",
            wifi_password: "Your_WiFi_Password",
            wifi_ssid: "Your_WiFi_Name",
        };
        let fields: Vec<_> = template.placeholders().map(|(field, _)| field).collect();
        assert_eq!(
            fields,
            [
                Field::WifiSsid,
                Field::WifiPassword,
                Field::MqttBroker,
                Field::MqttUsername,
                Field::MqttPassword,
            ]
        );
        assert_eq!(NODE.placeholders().count(), 0);
    }

    #[test]
    fn test_anonymous_broker() {
        let config = Config {
            mqtt_username: "",
            mqtt_password: "",
            ..NODE
        };
        assert!(!config.has_auth());
        assert!(NODE.has_auth());
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_username_alone_is_not_auth() {
        let config = Config {
            mqtt_password: "",
            ..NODE
        };
        assert!(!config.has_auth());
        assert_eq!(config.validate(), Err(Violation::IncompleteAuth));
    }

    #[test]
    fn test_debug_redacts_sensitive_fields() {
        let printed = format!("{:?}", NODE);
        for field in Field::ALL {
            assert!(printed.contains(field.key()), "{field}");
            match NODE.text(field) {
                Some(value) if field.is_sensitive() => {
                    assert!(!printed.contains(value), "{field} leaked")
                }
                Some(value) => assert!(printed.contains(value), "{field} missing"),
                None => assert!(printed.contains("mqtt_port: 1883")),
            }
        }
        assert_eq!(printed.matches("<redacted>").count(), 3);
    }

    #[test]
    fn test_debug_shows_empty_credentials() {
        let config = Config {
            mqtt_username: "",
            mqtt_password: "",
            ..NODE
        };
        let printed = format!("{:?}", config);
        assert!(printed.contains("mqtt_username: \"\""));
        assert_eq!(printed.matches("<redacted>").count(), 1);
    }
}
