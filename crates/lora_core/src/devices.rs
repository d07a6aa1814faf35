//! Registro de end-devices e seu estado por dispositivo.
//!
//! Cada dispositivo tem um `Arc<Mutex<DeviceRecord>>` próprio: frames de
//! dispositivos diferentes são analisados em paralelo, enquanto todo
//! read-modify-write do mesmo dispositivo (contador, histórico de RSSI,
//! alertas) é serializado pelo mutex do registro.

use crate::alerts::Alert;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::info;

/// Estado de um end-device conhecido.
#[derive(Debug)]
pub struct DeviceRecord {
    /// Primeiro frame atribuído a este dispositivo
    pub first_seen: DateTime<Utc>,
    /// Frame mais recente
    pub last_seen: DateTime<Utc>,
    /// Último contador observado; `None` até o primeiro frame processado
    pub last_counter: Option<u32>,
    /// Leituras de RSSI mais recentes, limitadas pela configuração
    pub rssi_history: VecDeque<f32>,
    /// Alertas vivos, podados por janela de tempo a cada registro
    pub alerts: Vec<Alert>,
}

impl DeviceRecord {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            first_seen: now,
            last_seen: now,
            last_counter: None,
            rssi_history: VecDeque::new(),
            alerts: Vec::new(),
        }
    }

    /// Anexa uma leitura de RSSI ao histórico limitado, descartando a mais
    /// antiga quando o limite é excedido.
    pub fn push_rssi(&mut self, rssi: f32, cap: usize) {
        self.rssi_history.push_back(rssi);
        while self.rssi_history.len() > cap {
            self.rssi_history.pop_front();
        }
    }

    /// Avança o contador incondicionalmente. A decisão de anomalia sobre o
    /// valor é tomada pelo detector *antes* desta chamada, com o valor
    /// anterior; a linha de base sempre acompanha o último frame observado
    /// para que frames antigos reinjetados não a congelem.
    pub fn set_counter(&mut self, counter: u32) {
        self.last_counter = Some(counter);
    }
}

/// Registro de todos os dispositivos já vistos pelo motor.
///
/// Registros nunca são removidos durante a vida do processo.
pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, Arc<Mutex<DeviceRecord>>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
        }
    }

    /// Retorna o registro do dispositivo, criando-o na primeira referência
    /// com `first_seen = last_seen = now`, sem histórico nem contador.
    pub fn get_or_create(&self, device_id: &str, now: DateTime<Utc>) -> Arc<Mutex<DeviceRecord>> {
        if let Some(record) = self.devices.read().get(device_id) {
            return record.clone();
        }

        let mut devices = self.devices.write();
        devices
            .entry(device_id.to_string())
            .or_insert_with(|| {
                info!("Novo dispositivo registrado: {device_id}");
                Arc::new(Mutex::new(DeviceRecord::new(now)))
            })
            .clone()
    }

    /// Registro existente, sem criar.
    pub fn get(&self, device_id: &str) -> Option<Arc<Mutex<DeviceRecord>>> {
        self.devices.read().get(device_id).cloned()
    }

    /// Quantidade de dispositivos conhecidos.
    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_initializes_record() {
        let registry = DeviceRegistry::new();
        let now = Utc::now();

        let device = registry.get_or_create("node_a", now);
        let record = device.lock();
        assert_eq!(record.first_seen, now);
        assert_eq!(record.last_seen, now);
        assert!(record.last_counter.is_none());
        assert!(record.rssi_history.is_empty());
        assert!(record.alerts.is_empty());
    }

    #[test]
    fn get_or_create_returns_same_record() {
        let registry = DeviceRegistry::new();
        let now = Utc::now();

        let a = registry.get_or_create("node_a", now);
        a.lock().set_counter(7);

        let b = registry.get_or_create("node_a", now);
        assert_eq!(b.lock().last_counter, Some(7));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn rssi_history_is_bounded() {
        let registry = DeviceRegistry::new();
        let device = registry.get_or_create("node_a", Utc::now());
        let mut record = device.lock();

        for i in 0..12 {
            record.push_rssi(-100.0 - i as f32, 10);
        }

        assert_eq!(record.rssi_history.len(), 10);
        // As duas leituras mais antigas foram descartadas
        assert_eq!(record.rssi_history.front().copied(), Some(-102.0));
        assert_eq!(record.rssi_history.back().copied(), Some(-111.0));
    }

    #[test]
    fn set_counter_always_advances() {
        let registry = DeviceRegistry::new();
        let device = registry.get_or_create("node_a", Utc::now());
        let mut record = device.lock();

        record.set_counter(10);
        assert_eq!(record.last_counter, Some(10));
        // Mesmo um valor menor substitui a linha de base
        record.set_counter(3);
        assert_eq!(record.last_counter, Some(3));
    }
}
