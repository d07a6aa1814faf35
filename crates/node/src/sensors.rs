//! Sensores virtuais – leituras sintéticas com passeio aleatório.
//!
//! Cada sensor parte de um valor aleatório dentro da faixa e deriva
//! suavemente a cada leitura, imitando grandezas físicas reais.

use chrono::Utc;
use lora_core::types::SensorReading;
use rand::Rng;

/// Um sensor simulado com faixa e unidade próprias.
pub struct VirtualSensor {
    sensor_id: String,
    kind: String,
    min: f32,
    max: f32,
    units: String,
    last: Option<f32>,
}

impl VirtualSensor {
    pub fn new(sensor_id: &str, kind: &str, min: f32, max: f32, units: &str) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            kind: kind.into(),
            min,
            max,
            units: units.into(),
            last: None,
        }
    }

    /// Produz a próxima leitura: variação de até ±10% da faixa em relação à
    /// leitura anterior, sempre dentro dos limites.
    pub fn read(&mut self) -> SensorReading {
        let mut rng = rand::thread_rng();
        let value = match self.last {
            None => rng.gen_range(self.min..=self.max),
            Some(last) => {
                let variation = rng.gen_range(-0.1..=0.1) * (self.max - self.min);
                (last + variation).clamp(self.min, self.max)
            }
        };
        self.last = Some(value);

        SensorReading {
            sensor_id: self.sensor_id.clone(),
            kind: self.kind.clone(),
            value: (value * 100.0).round() / 100.0,
            units: self.units.clone(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// O conjunto de sensores do nó agrícola simulado.
pub fn default_sensors() -> Vec<VirtualSensor> {
    vec![
        VirtualSensor::new("temp_001", "temperature", 10.0, 40.0, "°C"),
        VirtualSensor::new("humidity_001", "soil_moisture", 20.0, 80.0, "%"),
        VirtualSensor::new("light_001", "light_intensity", 0.0, 1000.0, "lux"),
        VirtualSensor::new("pest_001", "pest_detection", 0.0, 10.0, "count"),
    ]
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
