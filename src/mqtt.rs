use embedded_io_async::{Read, Write};
use rust_mqtt::{
    client::{
        client::MqttClient,
        client_config::{ClientConfig, MqttVersion},
    },
    packet::v5::publish_packet::QualityOfService,
    utils::rng_generator::CountingRng,
};

use flowguard_node::config::Config;
use flowguard_node::constants::{
    MQTT_KEEP_ALIVE_SECS, MQTT_MAX_PROPERTIES, MQTT_RX_BUFFER_SIZE, MQTT_TX_BUFFER_SIZE,
};

#[derive(Debug)]
pub enum Error {
    ConnectionFailed,
    PublishMessageFailed,
    PingFailed,
}

/// Last will registered with the broker on connect
pub struct Will<'a> {
    pub topic: &'a str,
    pub payload: &'a [u8],
}

pub struct Mqtt<'a, T>
where
    T: Read + Write,
{
    client: MqttClient<'a, T, MQTT_MAX_PROPERTIES, CountingRng>,
}

impl<'a, T> Mqtt<'a, T>
where
    T: Read + Write,
{
    pub async fn new(
        transport: T,
        config: &'a Config,
        will: Will<'a>,
        tx_buffer: &'a mut [u8; MQTT_TX_BUFFER_SIZE],
        rx_buffer: &'a mut [u8; MQTT_RX_BUFFER_SIZE],
    ) -> Result<Self, Error> {
        let mut client_config: ClientConfig<'a, MQTT_MAX_PROPERTIES, CountingRng> =
            ClientConfig::new(MqttVersion::MQTTv5, CountingRng(20000));
        client_config.add_max_subscribe_qos(QualityOfService::QoS1);
        client_config.add_client_id(config.device_id);
        client_config.keep_alive = MQTT_KEEP_ALIVE_SECS;
        client_config.max_packet_size = MQTT_TX_BUFFER_SIZE as u32;
        client_config.add_will(will.topic, will.payload, true);

        if config.has_auth() {
            client_config.add_username(config.mqtt_username);
            client_config.add_password(config.mqtt_password);
        }

        let mut client = MqttClient::<_, MQTT_MAX_PROPERTIES, _>::new(
            transport,
            tx_buffer,
            MQTT_TX_BUFFER_SIZE,
            rx_buffer,
            MQTT_RX_BUFFER_SIZE,
            client_config,
        );

        match client.connect_to_broker().await {
            Ok(()) => {
                log::info!("MQTT connected to broker successfully");
            }
            Err(e) => {
                log::error!("MQTT connect_to_broker failed: {:?}", e);
                return Err(Error::ConnectionFailed);
            }
        }

        Ok(Self { client })
    }

    pub async fn send_message(
        &mut self,
        topic: &str,
        message: &[u8],
        retain: bool,
    ) -> Result<(), Error> {
        match self
            .client
            .send_message(topic, message, QualityOfService::QoS1, retain)
            .await
        {
            Ok(()) => {
                log::debug!("Message published and acknowledged");
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to publish message: {:?}", e);
                Err(Error::PublishMessageFailed)
            }
        }
    }

    pub async fn ping(&mut self) -> Result<(), Error> {
        self.client.send_ping().await.map_err(|e| {
            log::warn!("MQTT ping failed: {:?}", e);
            Error::PingFailed
        })
    }

    pub async fn disconnect(mut self) {
        let _ = self.client.disconnect().await;
    }
}
