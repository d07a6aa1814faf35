//! Registro de gateways autorizados.
//!
//! A presença no registro é o único sinal de autorização: um gateway só entra
//! via [`GatewayRegistry::register`], nunca implicitamente a partir de
//! tráfego observado.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::info;

/// Estado operacional de um gateway.
///
/// O motor nunca transiciona para `Inactive` sozinho; gateways obsoletos são
/// responsabilidade de tooling administrativo externo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayStatus {
    Active,
    Inactive,
}

/// Registro de um gateway autorizado.
#[derive(Debug, Clone)]
pub struct GatewayRecord {
    /// Rótulo descritivo da localização
    pub location: String,
    /// Última vez que um frame nomeou este gateway (ou o registro)
    pub last_seen: DateTime<Utc>,
    pub status: GatewayStatus,
}

/// Conjunto autoritativo de gateways com permissão de encaminhar frames.
pub struct GatewayRegistry {
    gateways: RwLock<HashMap<String, GatewayRecord>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self {
            gateways: RwLock::new(HashMap::new()),
        }
    }

    /// Registra um gateway autorizado. Idempotente: chamadas repetidas com o
    /// mesmo id não alteram o registro existente.
    pub fn register(&self, gateway_id: &str, location: &str) {
        let mut gateways = self.gateways.write();
        if gateways.contains_key(gateway_id) {
            return;
        }
        info!("Novo gateway registrado: {gateway_id} em {location}");
        gateways.insert(
            gateway_id.to_string(),
            GatewayRecord {
                location: location.to_string(),
                last_seen: Utc::now(),
                status: GatewayStatus::Active,
            },
        );
    }

    /// Verifica se um gateway está autorizado.
    pub fn is_authorized(&self, gateway_id: &str) -> bool {
        self.gateways.read().contains_key(gateway_id)
    }

    /// Atualiza `last_seen`/status de um gateway já autorizado. O chamador
    /// deve ter confirmado a autorização antes.
    pub fn touch(&self, gateway_id: &str, now: DateTime<Utc>) {
        if let Some(record) = self.gateways.write().get_mut(gateway_id) {
            record.last_seen = now;
            record.status = GatewayStatus::Active;
        }
    }

    /// Cópia do registro de um gateway, se existir.
    pub fn get(&self, gateway_id: &str) -> Option<GatewayRecord> {
        self.gateways.read().get(gateway_id).cloned()
    }

    /// Quantidade de gateways autorizados.
    pub fn len(&self) -> usize {
        self.gateways.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.gateways.read().is_empty()
    }
}

impl Default for GatewayRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
