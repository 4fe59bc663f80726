use crate::rules::{DEVICE_ID_MAX_LEN, TOPIC_MAX_LEN};

/// Current firmware version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Size of the heap in DRAM (Wi-Fi driver buffers live here)
pub const HEAP_SIZE: usize = 72 * 1024;

/// Size of the TCP socket receive buffer
pub const RX_BUFFER_SIZE: usize = 4096;
/// Size of the TCP socket transmit buffer
pub const TX_BUFFER_SIZE: usize = 4096;

/// Size of the MQTT client receive buffer for application data
pub const MQTT_RX_BUFFER_SIZE: usize = 1024;
/// Size of the MQTT client transmit buffer for application data
pub const MQTT_TX_BUFFER_SIZE: usize = 1024;
/// Maximum number of MQTT v5 properties per packet
pub const MQTT_MAX_PROPERTIES: usize = 5;

/// Delay before retrying after the Wi-Fi link dropped or failed to come up
pub const WIFI_RECONNECT_DELAY_MS: u64 = 5000;
/// Upper bound for a single association attempt
pub const WIFI_CONNECT_TIMEOUT_SECS: u64 = 30;

/// TCP socket inactivity timeout
pub const SOCKET_TIMEOUT_SECS: u64 = 30;
/// MQTT keep-alive announced to the broker
pub const MQTT_KEEP_ALIVE_SECS: u16 = 60;
/// Interval between pings, kept below the keep-alive
pub const MQTT_PING_INTERVAL_SECS: u64 = 45;
/// Delay before reconnecting to the broker after any error
pub const MQTT_RECONNECT_DELAY_SECS: u64 = 10;

/// Capacity of `<topic>/status/<device_id>`
pub const PRESENCE_TOPIC_CAPACITY: usize = TOPIC_MAX_LEN + "/status/".len() + DEVICE_ID_MAX_LEN;
/// Capacity of the JSON presence payload
pub const PRESENCE_PAYLOAD_CAPACITY: usize = 128;
