//! Construção de frames de uplink: leituras → JSON → payload selado → frame.

use chrono::Utc;
use lora_core::payload;
use lora_core::types::{GatewayReport, SensorReading, UplinkFrame};
use rand::Rng;

/// Monta frames de uplink para um end-device, mantendo o contador.
pub struct UplinkBuilder {
    device_id: String,
    gateway_id: String,
    app_key: Vec<u8>,
    counter: u32,
}

impl UplinkBuilder {
    pub fn new(device_id: &str, gateway_id: &str, app_key: Vec<u8>) -> Self {
        Self {
            device_id: device_id.into(),
            gateway_id: gateway_id.into(),
            app_key,
            counter: 0,
        }
    }

    /// Monta o próximo frame com as leituras dadas e incrementa o contador.
    ///
    /// O RSSI reportado oscila em torno de -100 dBm, como um nó fixo a uma
    /// distância constante do gateway.
    pub fn next_frame(&mut self, readings: &[SensorReading]) -> UplinkFrame {
        let data = serde_json::to_vec(readings).expect("leituras serializam sempre");
        let sealed = payload::seal(&data, &self.app_key);

        let mut rng = rand::thread_rng();
        let frame = UplinkFrame {
            device_id: self.device_id.clone(),
            counter: self.counter,
            port: 1,
            payload: sealed,
            gateways: vec![GatewayReport {
                gateway_id: self.gateway_id.clone(),
                rssi: -100.0 + rng.gen_range(-2.0..=2.0),
                snr: 10.0 + rng.gen_range(-1.0..=1.0),
            }],
            time: Utc::now().to_rfc3339(),
            frequency: 868.1,
            modulation: "LORA".into(),
            data_rate: "SF7BW125".into(),
        };

        self.counter += 1;
        frame
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
