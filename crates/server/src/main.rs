//! # Sentinela Server
//!
//! Servidor de ingestão de uplinks LoRaWAN: escuta frames via UDP, passa
//! cada um pelo motor de detecção de intrusão e apresenta no console as
//! leituras dos frames válidos e as anomalias dos demais.
//!
//! Sinais de escalonamento crítico saem num canal dedicado e são logados por
//! uma thread própria, sem bloquear a ingestão.

mod net_thread;

use lora_core::IntrusionDetector;
use lora_core::config::{AppConfig, parse_app_key};
use lora_core::payload;
use lora_core::types::{SensorReading, UplinkFrame, Verdict};
use tracing::{debug, error, info, warn};

fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Config ──
    let config_path = AppConfig::default_path();
    let config = AppConfig::load(&config_path);

    if !config_path.exists() {
        let _ = config.save(&config_path);
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("Configuração inválida: {e}");
        }
        return;
    }

    let server_cfg = &config.server;
    let app_key = parse_app_key(&server_cfg.app_key).expect("validada acima");

    // ── Detector + gateways autorizados ──
    let detector = IntrusionDetector::new(server_cfg.detector.clone(), app_key);
    for gw in &server_cfg.gateways {
        detector.register_gateway(&gw.id, &gw.location);
    }
    info!("{} gateways autorizados", detector.gateway_count());

    // ── Thread de escalonamento ──
    let escalations = detector.escalations();
    std::thread::Builder::new()
        .name("escalation-logger".into())
        .spawn(move || {
            for esc in escalations.iter() {
                error!(
                    device = %esc.device_id,
                    alerts = esc.alert_count,
                    window_secs = esc.window.num_seconds(),
                    "🚨 ESCALONAMENTO CRÍTICO – acionar operador"
                );
            }
        })
        .expect("Falha ao criar thread de escalonamento");

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   🛡  SENTINELA SERVER – IDS ATIVO");
    println!("══════════════════════════════════════════════");
    println!("  Porta UDP:  {}", server_cfg.port);
    println!("  Gateways:   {}", detector.gateway_count());
    println!(
        "  Janela:     {}s / {} alertas",
        server_cfg.detector.alert_window_secs, server_cfg.detector.alert_threshold
    );
    println!("  Protocolo:  bincode v{}", lora_core::PROTOCOL_VERSION);
    println!("══════════════════════════════════════════════");
    println!();

    // ── Loop principal ──
    let rx = net_thread::spawn_listener(server_cfg.port);
    for msg in rx.iter() {
        debug!("Frame de {} ({} bytes)", msg.source_addr, msg.raw_size);
        let verdict = detector.analyze(&msg.frame);
        match &verdict {
            Verdict::Rejected { reason } => {
                warn!("Frame de {} rejeitado: {reason}", msg.source_addr);
            }
            Verdict::Analyzed { device_id, anomalies } => {
                if anomalies.is_empty() {
                    show_readings(device_id, &msg.frame, detector.app_key());
                } else {
                    // Cada anomalia já foi logada pelo detector
                    warn!(
                        "Frame #{} de {device_id}: {} anomalia(s)",
                        msg.frame.counter,
                        anomalies.len()
                    );
                }
            }
        }
    }
}

/// Apresenta as leituras de um frame válido (o MIC já foi verificado).
fn show_readings(device_id: &str, frame: &UplinkFrame, app_key: &[u8]) {
    let data = match payload::open(&frame.payload, app_key) {
        Ok(data) => data,
        Err(e) => {
            warn!("Payload de {device_id} não abriu na apresentação: {e}");
            return;
        }
    };

    match serde_json::from_slice::<Vec<SensorReading>>(&data) {
        Ok(readings) => {
            info!("Dados de sensores do dispositivo {device_id}:");
            for r in &readings {
                info!("  - {}: {} {}", r.kind, r.value, r.units);
            }
            if let Some(gw) = frame.gateways.first() {
                info!(
                    "  Gateway: {} (RSSI: {} dBm, SNR: {} dB)",
                    gw.gateway_id, gw.rssi, gw.snr
                );
            }
        }
        Err(_) => {
            // Formato não-JSON: mostra bruto
            info!(
                "Dados de {device_id} ({} bytes): {:?}",
                data.len(),
                String::from_utf8_lossy(&data)
            );
        }
    }
}
