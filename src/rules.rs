//! Credential field rules.
//!
//! Only depends on `core`: `build.rs` compiles this file too, so a bad value
//! is rejected before any firmware image is produced.

use core::fmt;

/// Longest SSID allowed by 802.11
pub const SSID_MAX_LEN: usize = 32;
/// WPA2 passphrase is 8..=63 characters, a raw PSK is 64 hex digits
pub const WIFI_PASSWORD_MIN_LEN: usize = 8;
pub const WIFI_PASSWORD_MAX_LEN: usize = 64;
/// Longest DNS name
pub const BROKER_MAX_LEN: usize = 253;
pub const MQTT_CREDENTIAL_MAX_LEN: usize = 128;
pub const TOPIC_MAX_LEN: usize = 64;
/// Device ID doubles as DHCP hostname, which embassy-net caps at 32 bytes
pub const DEVICE_ID_MAX_LEN: usize = 32;

/// Values shipped in `cfg.toml.example`. None of them may reach a release build.
pub const PLACEHOLDERS: &[&str] = &[
    "Your_WiFi_Name",
    "Your_WiFi_Password",
    "YOUR_GCP_EXTERNAL_IP",
    "YOUR_MQTT_USERNAME",
    "YOUR_SECURE_PASSWORD",
];

/// One of the eight credential fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    WifiSsid,
    WifiPassword,
    MqttBroker,
    MqttPort,
    MqttUsername,
    MqttPassword,
    MqttTopic,
    DeviceId,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::WifiSsid,
        Field::WifiPassword,
        Field::MqttBroker,
        Field::MqttPort,
        Field::MqttUsername,
        Field::MqttPassword,
        Field::MqttTopic,
        Field::DeviceId,
    ];

    /// Key in `cfg.toml`
    pub const fn key(self) -> &'static str {
        match self {
            Field::WifiSsid => "wifi_ssid",
            Field::WifiPassword => "wifi_password",
            Field::MqttBroker => "mqtt_broker",
            Field::MqttPort => "mqtt_port",
            Field::MqttUsername => "mqtt_username",
            Field::MqttPassword => "mqtt_password",
            Field::MqttTopic => "mqtt_topic",
            Field::DeviceId => "device_id",
        }
    }

    /// Environment variable overriding the file value at build time
    pub const fn env_var(self) -> &'static str {
        match self {
            Field::WifiSsid => "SECRET_SSID",
            Field::WifiPassword => "SECRET_WIFI_PASS",
            Field::MqttBroker => "SECRET_MQTT_BROKER",
            Field::MqttPort => "SECRET_MQTT_PORT",
            Field::MqttUsername => "SECRET_MQTT_USER",
            Field::MqttPassword => "SECRET_MQTT_PASS",
            Field::MqttTopic => "SECRET_MQTT_TOPIC",
            Field::DeviceId => "SECRET_DEVICE_ID",
        }
    }

    /// Sensitive values must never be logged or echoed in build errors
    pub const fn is_sensitive(self) -> bool {
        matches!(
            self,
            Field::WifiPassword | Field::MqttUsername | Field::MqttPassword
        )
    }

    // (min, max) byte length of string fields
    const fn length(self) -> (usize, usize) {
        match self {
            Field::WifiSsid => (1, SSID_MAX_LEN),
            Field::WifiPassword => (WIFI_PASSWORD_MIN_LEN, WIFI_PASSWORD_MAX_LEN),
            Field::MqttBroker => (1, BROKER_MAX_LEN),
            Field::MqttPort => (1, 5),
            Field::MqttUsername | Field::MqttPassword => (0, MQTT_CREDENTIAL_MAX_LEN),
            Field::MqttTopic => (1, TOPIC_MAX_LEN),
            Field::DeviceId => (1, DEVICE_ID_MAX_LEN),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Set of fields, e.g. those still holding a placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldSet(u8);

impl FieldSet {
    pub fn insert(&mut self, field: Field) {
        self.0 |= 1 << field as u8;
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0 & (1 << field as u8) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Field> {
        Field::ALL.into_iter().filter(move |field| self.contains(*field))
    }
}

impl fmt::Display for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{field}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    Empty(Field),
    TooShort { field: Field, min: usize },
    TooLong { field: Field, max: usize },
    InvalidCharacter { field: Field, position: usize },
    Wildcard(Field),
    PortOutOfRange(i64),
    IncompleteAuth,
    NotUnicode(Field),
    PlaceholderInRelease(FieldSet),
}

// Values are never part of the message, only positions and limits.
impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Empty(field) => write!(f, "{field} must not be empty"),
            Violation::TooShort { field, min } => {
                write!(f, "{field} must be at least {min} bytes")
            }
            Violation::TooLong { field, max } => write!(f, "{field} must be at most {max} bytes"),
            Violation::InvalidCharacter { field, position } => {
                write!(f, "{field} contains an invalid character at byte {position}")
            }
            Violation::Wildcard(field) => {
                write!(f, "{field} must not contain MQTT wildcards ('+' or '#')")
            }
            Violation::PortOutOfRange(port) => write!(f, "mqtt_port {port} is outside 1-65535"),
            Violation::IncompleteAuth => {
                f.write_str("mqtt_username and mqtt_password must be set together")
            }
            Violation::NotUnicode(field) => write!(f, "{} is not valid UTF-8", field.env_var()),
            Violation::PlaceholderInRelease(fields) => {
                write!(f, "placeholder values left in release build: {fields}")
            }
        }
    }
}

/// Value of a `SECRET_*` variable, parsed for the field it overrides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Override<'a> {
    Text(&'a str),
    Port(u16),
}

/// Text fields take the variable verbatim and are checked with the rest of
/// the record afterwards. `SECRET_MQTT_PORT` must parse as an integer.
pub fn parse_override(field: Field, value: &str) -> Result<Override<'_>, Violation> {
    match field {
        Field::MqttPort => parse_port(value).map(Override::Port),
        _ => Ok(Override::Text(value)),
    }
}

/// Fields whose value contains one of the template values
pub fn scan_placeholders<'a>(values: impl IntoIterator<Item = (Field, &'a str)>) -> FieldSet {
    let mut found = FieldSet::default();
    for (field, value) in values {
        if find_placeholder(value).is_some() {
            found.insert(field);
        }
    }
    found
}

/// Release builds must not carry any placeholder, other profiles only warn
pub fn placeholder_gate(release: bool, found: FieldSet) -> Result<(), Violation> {
    if release && !found.is_empty() {
        return Err(Violation::PlaceholderInRelease(found));
    }
    Ok(())
}

/// Check a field given as text. The port is parsed as a decimal integer.
pub fn check_text(field: Field, value: &str) -> Result<(), Violation> {
    if field == Field::MqttPort {
        return parse_port(value).map(|_| ());
    }

    let (min, max) = field.length();
    let len = value.len();
    if len == 0 && min > 0 {
        return Err(Violation::Empty(field));
    }
    if len < min {
        return Err(Violation::TooShort { field, min });
    }
    if len > max {
        return Err(Violation::TooLong { field, max });
    }

    match field {
        Field::MqttBroker => check_charset(field, value, |b| {
            b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_')
        }),
        Field::DeviceId => check_charset(field, value, |b| {
            b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_')
        }),
        Field::MqttTopic => check_topic(value),
        // 64 bytes is a raw PSK, not a passphrase
        Field::WifiPassword if len == WIFI_PASSWORD_MAX_LEN => {
            check_charset(field, value, |b| b.is_ascii_hexdigit())
        }
        // MQTT strings may not carry U+0000, and neither may C-side Wi-Fi config
        _ => check_charset(field, value, |b| b != 0),
    }
}

/// Parse a port given as text, e.g. from `SECRET_MQTT_PORT`
pub fn parse_port(value: &str) -> Result<u16, Violation> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Violation::Empty(Field::MqttPort));
    }
    match value.parse::<i64>() {
        Ok(port) => check_port(port),
        Err(_) => {
            let position = value
                .bytes()
                .enumerate()
                .position(|(i, b)| !(b.is_ascii_digit() || (i == 0 && b == b'-')))
                .unwrap_or(0);
            Err(Violation::InvalidCharacter {
                field: Field::MqttPort,
                position,
            })
        }
    }
}

pub fn check_port(port: i64) -> Result<u16, Violation> {
    match u16::try_from(port) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(Violation::PortOutOfRange(port)),
    }
}

/// Anonymous brokers are fine, half a credential pair is not
pub fn check_auth(username: &str, password: &str) -> Result<(), Violation> {
    if username.is_empty() != password.is_empty() {
        return Err(Violation::IncompleteAuth);
    }
    Ok(())
}

/// Returns the first template value contained in `value`, ignoring ASCII case
pub fn find_placeholder(value: &str) -> Option<&'static str> {
    PLACEHOLDERS
        .iter()
        .copied()
        .find(|placeholder| contains_ignore_ascii_case(value, placeholder))
}

fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    let (haystack, needle) = (haystack.as_bytes(), needle.as_bytes());
    !needle.is_empty()
        && needle.len() <= haystack.len()
        && haystack
            .windows(needle.len())
            .any(|window| window.eq_ignore_ascii_case(needle))
}

fn check_charset(field: Field, value: &str, allowed: impl Fn(u8) -> bool) -> Result<(), Violation> {
    match value.bytes().position(|b| !allowed(b)) {
        Some(position) => Err(Violation::InvalidCharacter { field, position }),
        None => Ok(()),
    }
}

fn check_topic(value: &str) -> Result<(), Violation> {
    let field = Field::MqttTopic;
    if value.bytes().any(|b| b == b'+' || b == b'#') {
        return Err(Violation::Wildcard(field));
    }
    if value.starts_with('/') {
        return Err(Violation::InvalidCharacter { field, position: 0 });
    }
    if value.ends_with('/') {
        return Err(Violation::InvalidCharacter {
            field,
            position: value.len() - 1,
        });
    }
    check_charset(field, value, |b| b != 0)
}
