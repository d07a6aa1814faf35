//! Histórico de alertas por dispositivo e escalonamento por janela de tempo.
//!
//! Anomalias viram [`Alert`]s no registro do dispositivo; a cada registro a
//! lista é podada pela janela deslizante e, se a contagem viva atingir o
//! threshold, um sinal [`Escalation`] é emitido num canal limitado. O envio é
//! `try_send`: um consumidor lento descarta sinais, nunca bloqueia a análise.

use crate::devices::DeviceRecord;
use crate::types::{Anomaly, AnomalyKind};
use chrono::{DateTime, Duration, Utc};
use crossbeam_channel::{Receiver, Sender, bounded};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, warn};

/// Capacidade do canal de escalonamento.
const ESCALATION_QUEUE: usize = 64;

/// Um alerta registrado para um dispositivo. Imutável após criado; só sai da
/// lista pela poda por janela de tempo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub timestamp: DateTime<Utc>,
    pub kind: AnomalyKind,
    pub details: String,
}

/// Sinal crítico emitido quando um dispositivo acumula alertas demais dentro
/// da janela. Consumido por um notificador externo (log, e-mail, paging).
#[derive(Debug, Clone, PartialEq)]
pub struct Escalation {
    pub device_id: String,
    /// Alertas vivos na janela no momento do disparo
    pub alert_count: usize,
    pub window: Duration,
    pub at: DateTime<Utc>,
}

/// Gerencia o histórico de alertas dos dispositivos e o canal de
/// escalonamento.
pub struct AlertManager {
    window: Duration,
    threshold: usize,
    tx: Sender<Escalation>,
    rx: Receiver<Escalation>,
    dropped: AtomicU64,
}

impl AlertManager {
    pub fn new(window_secs: u64, threshold: usize) -> Self {
        let (tx, rx) = bounded(ESCALATION_QUEUE);
        Self {
            window: Duration::seconds(window_secs as i64),
            threshold,
            tx,
            rx,
            dropped: AtomicU64::new(0),
        }
    }

    /// Receiver do canal de escalonamento. Pode ser clonado à vontade;
    /// consumidores competem pelos sinais.
    pub fn subscribe(&self) -> Receiver<Escalation> {
        self.rx.clone()
    }

    /// Registra as anomalias de um frame no dispositivo, poda alertas fora
    /// da janela e escalona se a contagem viva atingir o threshold.
    ///
    /// A poda acontece em toda chamada (não em timer separado), então a
    /// contagem é sempre avaliada contra o tempo atual.
    pub fn record(
        &self,
        device_id: &str,
        record: &mut DeviceRecord,
        anomalies: &[Anomaly],
        now: DateTime<Utc>,
    ) {
        for anomaly in anomalies {
            record.alerts.push(Alert {
                timestamp: now,
                kind: anomaly.kind,
                details: anomaly.details.clone(),
            });
        }

        // Poda: mantém apenas alertas cuja janela ainda não expirou
        record.alerts.retain(|alert| alert.timestamp + self.window >= now);

        let live = record.alerts.len();
        if live >= self.threshold {
            error!(
                device = %device_id,
                alerts = live,
                window_secs = self.window.num_seconds(),
                "ALERTA CRÍTICO: threshold de alertas atingido"
            );
            let escalation = Escalation {
                device_id: device_id.to_string(),
                alert_count: live,
                window: self.window,
                at: now,
            };
            if self.tx.try_send(escalation).is_err() {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!("Fila de escalonamento cheia, sinal descartado ({total} no total)");
            }
        }
    }

    /// Sinais de escalonamento descartados por fila cheia.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::DeviceRegistry;
    use crate::types::Anomaly;

    fn anomaly() -> Anomaly {
        Anomaly::new(AnomalyKind::UnauthorizedGateway, "Gateway não autorizado: rogue_gw")
    }

    #[test]
    fn alerts_accumulate_and_escalate() {
        let manager = AlertManager::new(300, 3);
        let rx = manager.subscribe();
        let registry = DeviceRegistry::new();
        let t0 = Utc::now();
        let device = registry.get_or_create("node_a", t0);
        let mut record = device.lock();

        manager.record("node_a", &mut record, &[anomaly()], t0);
        manager.record("node_a", &mut record, &[anomaly()], t0 + Duration::seconds(10));
        assert_eq!(record.alerts.len(), 2);
        assert!(rx.try_recv().is_err());

        manager.record("node_a", &mut record, &[anomaly()], t0 + Duration::seconds(20));
        assert_eq!(record.alerts.len(), 3);

        let escalation = rx.try_recv().unwrap();
        assert_eq!(escalation.device_id, "node_a");
        assert_eq!(escalation.alert_count, 3);
        assert_eq!(escalation.window, Duration::seconds(300));
    }

    #[test]
    fn pruning_expires_old_alerts() {
        // Alertas em t, t+150 e t+400 com janela de 300s: na terceira
        // chamada o alerta de t já expirou, sobram 2 vivos e não há
        // escalonamento; um quarto em t+410 chega a 3 vivos e dispara.
        let manager = AlertManager::new(300, 3);
        let rx = manager.subscribe();
        let registry = DeviceRegistry::new();
        let t0 = Utc::now();
        let device = registry.get_or_create("node_a", t0);
        let mut record = device.lock();

        manager.record("node_a", &mut record, &[anomaly()], t0);
        manager.record("node_a", &mut record, &[anomaly()], t0 + Duration::seconds(150));
        manager.record("node_a", &mut record, &[anomaly()], t0 + Duration::seconds(400));

        assert_eq!(record.alerts.len(), 2);
        assert!(rx.try_recv().is_err());

        manager.record("node_a", &mut record, &[anomaly()], t0 + Duration::seconds(410));
        assert_eq!(record.alerts.len(), 3);
        assert_eq!(rx.try_recv().unwrap().alert_count, 3);
    }

    #[test]
    fn multiple_anomalies_in_one_call() {
        let manager = AlertManager::new(300, 3);
        let rx = manager.subscribe();
        let registry = DeviceRegistry::new();
        let t0 = Utc::now();
        let device = registry.get_or_create("node_a", t0);
        let mut record = device.lock();

        let batch = [
            anomaly(),
            Anomaly::new(AnomalyKind::ReplayAttack, "Contador não incrementado"),
            Anomaly::new(AnomalyKind::InvalidMic, "Falha na verificação do MIC"),
        ];
        manager.record("node_a", &mut record, &batch, t0);

        assert_eq!(record.alerts.len(), 3);
        assert_eq!(rx.try_recv().unwrap().alert_count, 3);
    }

    #[test]
    fn full_queue_drops_and_counts() {
        let manager = AlertManager::new(300, 1);
        // Ninguém consome o canal: a partir da capacidade os sinais caem
        let registry = DeviceRegistry::new();
        let t0 = Utc::now();
        let device = registry.get_or_create("node_a", t0);
        let mut record = device.lock();

        for i in 0..80 {
            manager.record("node_a", &mut record, &[anomaly()], t0 + Duration::seconds(i));
        }

        assert_eq!(manager.dropped(), 80 - 64);
    }

    #[test]
    fn alert_at_window_edge_is_kept() {
        // timestamp + janela == now: ainda vivo (só expira quando < now)
        let manager = AlertManager::new(300, 10);
        let registry = DeviceRegistry::new();
        let t0 = Utc::now();
        let device = registry.get_or_create("node_a", t0);
        let mut record = device.lock();

        manager.record("node_a", &mut record, &[anomaly()], t0);
        manager.record("node_a", &mut record, &[], t0 + Duration::seconds(300));
        assert_eq!(record.alerts.len(), 1);

        manager.record("node_a", &mut record, &[], t0 + Duration::seconds(301));
        assert!(record.alerts.is_empty());
    }
}
