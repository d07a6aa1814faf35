//! Motor de detecção de intrusão para uplinks LoRaWAN.
//!
//! Avalia cada frame contra os registros de gateways e dispositivos e produz
//! um [`Verdict`] com a lista completa de anomalias encontradas. Ordem das
//! verificações:
//!
//! 1. Validação estrutural (rejeita sem mutar estado)
//! 2. Autorização de gateways (acumula achados, não para no primeiro)
//! 3. Lookup/registro do dispositivo
//! 4. Contador: replay e salto implausível
//! 5. Integridade do payload (MIC)
//! 6. Desvio de RSSI contra o histórico do dispositivo
//! 7. Registro de alertas + escalonamento por janela
//!
//! Anomalias nunca abortam a análise: o estado avança conforme as regras
//! acima e todas as constatações são devolvidas juntas.

use crate::alerts::{AlertManager, Escalation};
use crate::config::DetectorConfig;
use crate::devices::DeviceRegistry;
use crate::gateways::GatewayRegistry;
use crate::payload::{self, PayloadError};
use crate::types::{Anomaly, AnomalyKind, RejectReason, UplinkFrame, Verdict};
use chrono::{DateTime, Utc};
use crossbeam_channel::Receiver;
use tracing::{debug, warn};

/// Leituras mínimas de RSSI antes do teste de desvio rodar.
pub const RSSI_MIN_SAMPLES: usize = 5;

/// Motor de detecção. Dono dos dois registros, do gerenciador de alertas e
/// da chave compartilhada; uma instância por processo de servidor.
pub struct IntrusionDetector {
    config: DetectorConfig,
    app_key: Vec<u8>,
    gateways: GatewayRegistry,
    devices: DeviceRegistry,
    alerts: AlertManager,
}

impl IntrusionDetector {
    pub fn new(config: DetectorConfig, app_key: Vec<u8>) -> Self {
        let alerts = AlertManager::new(config.alert_window_secs, config.alert_threshold);
        Self {
            config,
            app_key,
            gateways: GatewayRegistry::new(),
            devices: DeviceRegistry::new(),
            alerts,
        }
    }

    /// Registra um gateway autorizado (operação administrativa, idempotente).
    pub fn register_gateway(&self, gateway_id: &str, location: &str) {
        self.gateways.register(gateway_id, location);
    }

    /// Canal de sinais de escalonamento crítico.
    pub fn escalations(&self) -> Receiver<Escalation> {
        self.alerts.subscribe()
    }

    /// Analisa um frame contra o relógio de parede.
    pub fn analyze(&self, frame: &UplinkFrame) -> Verdict {
        self.analyze_at(frame, Utc::now())
    }

    /// Analisa um frame num instante explícito.
    pub fn analyze_at(&self, frame: &UplinkFrame, now: DateTime<Utc>) -> Verdict {
        // ── 1. Validação estrutural ──
        // Um frame incompleto não carrega identidade confiável; nada é
        // atribuído a dispositivo algum.
        if frame.device_id.is_empty() {
            return Verdict::Rejected {
                reason: RejectReason::MissingDeviceId,
            };
        }
        if frame.payload.is_empty() {
            return Verdict::Rejected {
                reason: RejectReason::MissingPayload,
            };
        }
        if frame.gateways.is_empty() {
            return Verdict::Rejected {
                reason: RejectReason::NoGateways,
            };
        }

        // Lista de achados inicializada antes de qualquer verificação
        let mut anomalies: Vec<Anomaly> = Vec::new();

        // ── 2. Autorização de gateways ──
        for gateway in &frame.gateways {
            if gateway.gateway_id.is_empty() {
                continue;
            }
            if self.gateways.is_authorized(&gateway.gateway_id) {
                self.gateways.touch(&gateway.gateway_id, now);
            } else {
                anomalies.push(Anomaly::new(
                    AnomalyKind::UnauthorizedGateway,
                    format!("Gateway não autorizado: {}", gateway.gateway_id),
                ));
            }
        }

        // ── 3. Lookup/registro do dispositivo ──
        let device = self.devices.get_or_create(&frame.device_id, now);
        let mut record = device.lock();
        record.last_seen = now;

        // ── 4. Contador: replay e salto ──
        if let Some(last) = record.last_counter {
            if frame.counter <= last {
                anomalies.push(Anomaly::new(
                    AnomalyKind::ReplayAttack,
                    format!(
                        "Contador não incrementado: atual={}, anterior={last}",
                        frame.counter
                    ),
                ));
            } else if frame.counter > last.saturating_add(self.config.counter_jump_threshold) {
                anomalies.push(Anomaly::new(
                    AnomalyKind::CounterJump,
                    format!(
                        "Salto de contador suspeito: atual={}, anterior={last}",
                        frame.counter
                    ),
                ));
            }
        }
        // A linha de base sempre avança para o último valor observado, mesmo
        // em frame anômalo: reinjetar frames antigos não a mantém presa.
        record.set_counter(frame.counter);

        // ── 5. Integridade do payload ──
        match payload::open(&frame.payload, &self.app_key) {
            Ok(_) => {}
            Err(PayloadError::MicMismatch) => {
                anomalies.push(Anomaly::new(
                    AnomalyKind::InvalidMic,
                    "Falha na verificação do código de integridade",
                ));
            }
            Err(e) => {
                anomalies.push(Anomaly::new(
                    AnomalyKind::PayloadError,
                    format!("Erro ao decodificar payload: {e}"),
                ));
            }
        }

        // ── 6. Desvio de RSSI ──
        // O primeiro relatório de gateway dá o RSSI observado do frame.
        let current_rssi = frame.gateways[0].rssi;
        record.push_rssi(current_rssi, self.config.rssi_history_size);

        let n = record.rssi_history.len();
        if n >= RSSI_MIN_SAMPLES {
            let mean =
                record.rssi_history.iter().take(n - 1).sum::<f32>() / (n - 1) as f32;
            if (current_rssi - mean).abs() > self.config.rssi_deviation_threshold {
                anomalies.push(Anomaly::new(
                    AnomalyKind::RssiAnomaly,
                    format!("Variação de RSSI suspeita: atual={current_rssi}, média={mean:.2}"),
                ));
            }
        }

        // ── 7. Alertas + escalonamento ──
        if anomalies.is_empty() {
            debug!(device = %frame.device_id, counter = frame.counter, "Frame válido");
        } else {
            for anomaly in &anomalies {
                warn!(
                    device = %frame.device_id,
                    kind = %anomaly.kind,
                    "{}",
                    anomaly.details
                );
            }
            self.alerts
                .record(&frame.device_id, &mut record, &anomalies, now);
        }
        drop(record);

        Verdict::Analyzed {
            device_id: frame.device_id.clone(),
            anomalies,
        }
    }

    /// Chave compartilhada em uso (para abrir payloads de frames válidos).
    pub fn app_key(&self) -> &[u8] {
        &self.app_key
    }

    /// Quantidade de dispositivos conhecidos.
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Quantidade de gateways autorizados.
    pub fn gateway_count(&self) -> usize {
        self.gateways.len()
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_app_key;
    use crate::types::GatewayReport;
    use chrono::Duration;

    const GATEWAY: &str = "farm_gateway_001";

    fn test_key() -> Vec<u8> {
        parse_app_key("a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4").unwrap()
    }

    fn detector() -> IntrusionDetector {
        let det = IntrusionDetector::new(DetectorConfig::default(), test_key());
        det.register_gateway(GATEWAY, "Fazenda principal");
        det
    }

    fn frame(device_id: &str, counter: u32, rssi: f32) -> UplinkFrame {
        UplinkFrame {
            device_id: device_id.into(),
            counter,
            port: 1,
            payload: payload::seal(br#"[{"type":"temperature","value":21.5}]"#, &test_key()),
            gateways: vec![GatewayReport {
                gateway_id: GATEWAY.into(),
                rssi,
                snr: 10.0,
            }],
            time: "2025-06-01T12:00:00Z".into(),
            frequency: 868.1,
            modulation: "LORA".into(),
            data_rate: "SF7BW125".into(),
        }
    }

    fn kinds(verdict: &Verdict) -> Vec<AnomalyKind> {
        verdict.anomalies().iter().map(|a| a.kind).collect()
    }

    // ── Estrutural ──

    #[test]
    fn rejects_frame_without_device_id() {
        let det = detector();
        let mut f = frame("", 1, -100.0);
        f.device_id.clear();

        let verdict = det.analyze(&f);
        assert_eq!(
            verdict,
            Verdict::Rejected {
                reason: RejectReason::MissingDeviceId
            }
        );
        // Nenhum estado foi mutado
        assert_eq!(det.device_count(), 0);
    }

    #[test]
    fn rejects_frame_without_payload() {
        let det = detector();
        let mut f = frame("node_a", 1, -100.0);
        f.payload.clear();

        assert_eq!(
            det.analyze(&f),
            Verdict::Rejected {
                reason: RejectReason::MissingPayload
            }
        );
        assert_eq!(det.device_count(), 0);
    }

    #[test]
    fn rejects_frame_without_gateways() {
        let det = detector();
        let mut f = frame("node_a", 1, -100.0);
        f.gateways.clear();

        assert_eq!(
            det.analyze(&f),
            Verdict::Rejected {
                reason: RejectReason::NoGateways
            }
        );
        assert_eq!(det.device_count(), 0);
    }

    // ── Contador ──

    #[test]
    fn first_frame_is_accepted_without_counter_baseline() {
        let det = detector();
        let verdict = det.analyze(&frame("node_a", 5, -100.0));
        assert!(verdict.is_valid(), "anomalias: {:?}", verdict.anomalies());
    }

    #[test]
    fn monotonic_counters_are_accepted() {
        let det = detector();
        assert!(det.analyze(&frame("node_a", 5, -100.0)).is_valid());
        for c in [6, 9, 15, 25] {
            let verdict = det.analyze(&frame("node_a", c, -100.0));
            assert!(verdict.is_valid(), "contador {c}: {:?}", verdict.anomalies());
        }

        let device = det.devices.get("node_a").unwrap();
        assert_eq!(device.lock().last_counter, Some(25));
    }

    #[test]
    fn repeated_counter_is_replay() {
        let det = detector();
        det.analyze(&frame("node_a", 5, -100.0));
        let verdict = det.analyze(&frame("node_a", 5, -100.0));
        assert_eq!(kinds(&verdict), vec![AnomalyKind::ReplayAttack]);
    }

    #[test]
    fn decreasing_counter_is_replay() {
        let det = detector();
        det.analyze(&frame("node_a", 5, -100.0));
        let verdict = det.analyze(&frame("node_a", 3, -100.0));
        assert_eq!(kinds(&verdict), vec![AnomalyKind::ReplayAttack]);
    }

    #[test]
    fn large_jump_is_flagged() {
        let det = detector();
        det.analyze(&frame("node_a", 5, -100.0));
        // Gap de 15 > threshold 10
        let verdict = det.analyze(&frame("node_a", 20, -100.0));
        assert_eq!(kinds(&verdict), vec![AnomalyKind::CounterJump]);
    }

    #[test]
    fn jump_at_threshold_is_accepted() {
        let det = detector();
        det.analyze(&frame("node_a", 5, -100.0));
        // Gap de exatamente 10
        assert!(det.analyze(&frame("node_a", 15, -100.0)).is_valid());
    }

    #[test]
    fn baseline_advances_even_on_anomalous_frames() {
        let det = detector();
        det.analyze(&frame("node_a", 5, -100.0));
        // Frame rejeitado como replay ainda rebaixa a linha de base...
        det.analyze(&frame("node_a", 3, -100.0));
        // ...então 4 agora é um incremento válido
        assert!(det.analyze(&frame("node_a", 4, -100.0)).is_valid());
    }

    // ── Gateways ──

    #[test]
    fn unauthorized_gateway_is_flagged_until_registered() {
        let det = detector();
        let mut f = frame("node_a", 1, -100.0);
        f.gateways[0].gateway_id = "rogue_gw".into();

        let verdict = det.analyze(&f);
        assert_eq!(kinds(&verdict), vec![AnomalyKind::UnauthorizedGateway]);
        assert!(verdict.anomalies()[0].details.contains("rogue_gw"));

        det.register_gateway("rogue_gw", "x");
        let mut f = frame("node_a", 2, -100.0);
        f.gateways[0].gateway_id = "rogue_gw".into();
        assert!(det.analyze(&f).is_valid());
    }

    #[test]
    fn all_gateways_are_checked_not_just_the_first() {
        let det = detector();
        let mut f = frame("node_a", 1, -100.0);
        f.gateways.push(GatewayReport {
            gateway_id: "rogue_1".into(),
            rssi: -90.0,
            snr: 8.0,
        });
        f.gateways.push(GatewayReport {
            gateway_id: "rogue_2".into(),
            rssi: -95.0,
            snr: 7.0,
        });

        let verdict = det.analyze(&f);
        assert_eq!(
            kinds(&verdict),
            vec![
                AnomalyKind::UnauthorizedGateway,
                AnomalyKind::UnauthorizedGateway
            ]
        );
    }

    #[test]
    fn empty_gateway_ids_are_skipped() {
        let det = detector();
        let mut f = frame("node_a", 1, -100.0);
        f.gateways.push(GatewayReport::default());
        assert!(det.analyze(&f).is_valid());
    }

    // ── Integridade ──

    #[test]
    fn tampered_payload_is_invalid_mic() {
        let det = detector();
        let mut f = frame("node_a", 1, -100.0);
        // Payload selado com outra chave
        f.payload = payload::seal(b"dados", b"0123456789abcdef");

        let verdict = det.analyze(&f);
        assert_eq!(kinds(&verdict), vec![AnomalyKind::InvalidMic]);
    }

    #[test]
    fn undecodable_payload_is_payload_error() {
        let det = detector();
        let mut f = frame("node_a", 1, -100.0);
        f.payload = "is%o n@o é base64".into();

        let verdict = det.analyze(&f);
        assert_eq!(kinds(&verdict), vec![AnomalyKind::PayloadError]);
    }

    // ── RSSI ──

    #[test]
    fn sudden_rssi_deviation_is_flagged() {
        let det = detector();
        for (i, rssi) in [-100.0, -101.0, -99.0, -100.0, -102.0].iter().enumerate() {
            let verdict = det.analyze(&frame("node_a", i as u32 + 1, *rssi));
            assert!(verdict.is_valid(), "frame {i}: {:?}", verdict.anomalies());
        }

        // Média dos 5 anteriores ≈ -100.4; desvio de ~30 dBm
        let verdict = det.analyze(&frame("node_a", 6, -70.0));
        assert_eq!(kinds(&verdict), vec![AnomalyKind::RssiAnomaly]);
        assert!(verdict.anomalies()[0].details.contains("-70"));
    }

    #[test]
    fn small_rssi_drift_is_accepted() {
        let det = detector();
        for (i, rssi) in [-100.0, -101.0, -99.0, -100.0, -102.0].iter().enumerate() {
            det.analyze(&frame("node_a", i as u32 + 1, *rssi));
        }

        // Desvio de ~5 dBm fica abaixo do threshold de 20
        assert!(det.analyze(&frame("node_a", 6, -95.0)).is_valid());
    }

    #[test]
    fn rssi_check_needs_minimum_history() {
        let det = detector();
        det.analyze(&frame("node_a", 1, -100.0));
        // Só 2 leituras no histórico: desvio enorme mas sem base estatística
        assert!(det.analyze(&frame("node_a", 2, -40.0)).is_valid());
    }

    // ── Acumulação e escalonamento ──

    #[test]
    fn multiple_anomalies_are_all_reported() {
        let det = detector();
        det.analyze(&frame("node_a", 5, -100.0));

        let mut f = frame("node_a", 5, -100.0); // replay
        f.gateways[0].gateway_id = "rogue_gw".into(); // não autorizado
        f.payload = "###".into(); // não decodificável

        let verdict = det.analyze(&f);
        assert_eq!(
            kinds(&verdict),
            vec![
                AnomalyKind::UnauthorizedGateway,
                AnomalyKind::ReplayAttack,
                AnomalyKind::PayloadError
            ]
        );
        assert!(!verdict.is_valid());
    }

    #[test]
    fn escalation_fires_after_threshold_within_window() {
        let det = detector();
        let rx = det.escalations();
        let t0 = Utc::now();

        // 3 replays do mesmo contador dentro da janela
        det.analyze_at(&frame("node_a", 5, -100.0), t0);
        for i in 1..=3 {
            det.analyze_at(
                &frame("node_a", 5, -100.0),
                t0 + Duration::seconds(i * 10),
            );
        }

        let escalation = rx.try_recv().unwrap();
        assert_eq!(escalation.device_id, "node_a");
        assert_eq!(escalation.alert_count, 3);
    }

    #[test]
    fn expired_alerts_do_not_escalate() {
        let det = detector();
        let rx = det.escalations();
        let t0 = Utc::now();

        let rogue = |counter: u32, at| {
            let mut f = frame("node_a", counter, -100.0);
            f.gateways[0].gateway_id = "rogue_gw".into();
            det.analyze_at(&f, at)
        };

        rogue(1, t0);
        rogue(2, t0 + Duration::seconds(150));
        rogue(3, t0 + Duration::seconds(400));
        // O alerta de t0 expirou: 2 vivos, sem escalonamento
        assert!(rx.try_recv().is_err());

        rogue(4, t0 + Duration::seconds(410));
        assert_eq!(rx.try_recv().unwrap().alert_count, 3);
    }

    #[test]
    fn devices_are_registered_on_first_frame() {
        let det = detector();
        assert_eq!(det.device_count(), 0);
        det.analyze(&frame("node_a", 1, -100.0));
        det.analyze(&frame("node_b", 1, -100.0));
        assert_eq!(det.device_count(), 2);
    }
}
