#![no_std]
#![no_main]

use static_cell::StaticCell;

use embassy_executor::Spawner;
use embassy_net::{
    dns::DnsQueryType,
    tcp::TcpSocket,
    Stack,
};
use embassy_time::{Duration, Timer};

use esp_alloc as _;
use esp_backtrace as _;
use esp_hal::{rng::Rng, timer::timg::TimerGroup};
use esp_println::logger::init_logger;
use esp_wifi::EspWifiController;

extern crate alloc;

mod mqtt;
mod wifi;

use flowguard_node::config::CONFIG;
use flowguard_node::constants::*;
use flowguard_node::presence::{presence_payload, presence_topic, Presence};
use mqtt::{Mqtt, Will};
use wifi::Wifi;

esp_bootloader_esp_idf::esp_app_desc!();

static WIFI_CONTROLLER: StaticCell<EspWifiController<'static>> = StaticCell::new();

#[derive(Debug)]
enum Error {
    Presence,
    Dns,
    Socket,
    Mqtt,
}

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    init_logger(log::LevelFilter::Info);

    log::info!("flowguard node v{} starting: {:?}", VERSION, CONFIG);
    for (field, placeholder) in CONFIG.placeholders() {
        log::warn!("{} still holds template value {:?}", field, placeholder);
    }

    let peripherals = esp_hal::init(esp_hal::Config::default());

    esp_alloc::heap_allocator!(size: HEAP_SIZE);

    let rng = Rng::new(peripherals.RNG);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let timg1 = TimerGroup::new(peripherals.TIMG1);

    esp_hal_embassy::init(timg0.timer0);

    let controller = match esp_wifi::init(timg1.timer0, rng.clone()) {
        Ok(controller) => WIFI_CONTROLLER.init(controller),
        Err(e) => {
            log::error!("Radio init failed: {:?}", e);
            return;
        }
    };

    let wifi = match Wifi::new(controller, peripherals.WIFI, rng, spawner).await {
        Ok(wifi) => wifi,
        Err(e) => {
            log::error!("Wifi setup failed: {:?}", e);
            return;
        }
    };

    if let Err(e) = wifi.connect().await {
        log::error!("Wifi connect failed: {:?}", e);
        return;
    }

    if let Err(e) = spawner.spawn(main_task(wifi.stack)) {
        log::error!("Failed to spawn main task: {:?}", e);
    }
}

#[embassy_executor::task]
async fn main_task(stack: Stack<'static>) {
    let mut rx_buffer = [0u8; RX_BUFFER_SIZE];
    let mut tx_buffer = [0u8; TX_BUFFER_SIZE];
    let mut mqtt_rx_buffer = [0u8; MQTT_RX_BUFFER_SIZE];
    let mut mqtt_tx_buffer = [0u8; MQTT_TX_BUFFER_SIZE];

    loop {
        if let Err(e) = session(
            stack,
            &mut rx_buffer,
            &mut tx_buffer,
            &mut mqtt_rx_buffer,
            &mut mqtt_tx_buffer,
        )
        .await
        {
            log::error!("Broker session error: {:?}", e);
        }

        Timer::after(Duration::from_secs(MQTT_RECONNECT_DELAY_SECS)).await;
    }
}

// One broker session: announce presence, then keep the connection alive
// until something fails.
async fn session(
    stack: Stack<'static>,
    rx_buffer: &mut [u8; RX_BUFFER_SIZE],
    tx_buffer: &mut [u8; TX_BUFFER_SIZE],
    mqtt_rx_buffer: &mut [u8; MQTT_RX_BUFFER_SIZE],
    mqtt_tx_buffer: &mut [u8; MQTT_TX_BUFFER_SIZE],
) -> Result<(), Error> {
    let topic = presence_topic(&CONFIG).map_err(|_| Error::Presence)?;
    let online = presence_payload(CONFIG.device_id, Presence::Online).map_err(|_| Error::Presence)?;
    let offline =
        presence_payload(CONFIG.device_id, Presence::Offline).map_err(|_| Error::Presence)?;

    let addr = stack
        .dns_query(CONFIG.mqtt_broker, DnsQueryType::A)
        .await
        .map_err(|e| {
            log::error!("DNS query for {} failed: {:?}", CONFIG.mqtt_broker, e);
            Error::Dns
        })?
        .first()
        .copied()
        .ok_or(Error::Dns)?;

    let mut socket = TcpSocket::new(stack, rx_buffer, tx_buffer);
    socket.set_timeout(Some(Duration::from_secs(SOCKET_TIMEOUT_SECS)));

    log::info!(
        "Connecting TCP socket to {}:{}",
        CONFIG.mqtt_broker,
        CONFIG.mqtt_port
    );
    socket
        .connect((addr, CONFIG.mqtt_port))
        .await
        .map_err(|e| {
            log::error!("TCP connect failed: {:?}", e);
            Error::Socket
        })?;
    log::info!("TCP connected");

    let will = Will {
        topic: topic.as_str(),
        payload: offline.as_bytes(),
    };
    let mut mqtt = Mqtt::new(socket, &CONFIG, will, mqtt_tx_buffer, mqtt_rx_buffer)
        .await
        .map_err(|_| Error::Mqtt)?;

    mqtt.send_message(topic.as_str(), online.as_bytes(), true)
        .await
        .map_err(|_| Error::Mqtt)?;
    log::info!("Presence published on {}", topic);

    loop {
        Timer::after(Duration::from_secs(MQTT_PING_INTERVAL_SECS)).await;
        if mqtt.ping().await.is_err() {
            mqtt.disconnect().await;
            return Err(Error::Mqtt);
        }
    }
}
