//! # Sentinela Node
//!
//! Simula um nó sensor LoRaWAN: coleta leituras sintéticas, sela o payload
//! com a chave compartilhada e publica frames de uplink via UDP.
//!
//! ## Uso
//! ```bash
//! lora_node             # Transmissão periódica normal
//! lora_node --replay    # Exercício de replay (frame legítimo + reinjeções)
//! lora_node --jam       # Exercício de jamming (inundação de frames lixo)
//! ```

mod attack;
mod sensors;
mod uplink;

use lora_core::config::{AppConfig, parse_app_key};
use lora_core::protocol::encode_frame;
use std::net::UdpSocket;
use std::time::{Duration, Instant};
use tracing::{error, info};
use uplink::UplinkBuilder;

fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Carregar config ──
    let config_path = AppConfig::default_path();
    let config = AppConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            tracing::warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    let node_cfg = &config.node;
    let app_key = match parse_app_key(&node_cfg.app_key) {
        Ok(key) => key,
        Err(e) => {
            error!("AppKey inválida na configuração: {e}");
            return;
        }
    };

    let dest_addr = format!("{}:{}", node_cfg.dest_ip, node_cfg.port);
    let interval = Duration::from_secs_f64(node_cfg.interval_secs);

    // ── Socket UDP ──
    let sock = UdpSocket::bind("0.0.0.0:0").expect("Falha ao criar socket UDP");

    // ── Modos de exercício ──
    let replay_mode = std::env::args().any(|a| a == "--replay");
    let jam_mode = std::env::args().any(|a| a == "--jam");

    let mut builder = UplinkBuilder::new(&node_cfg.device_id, &node_cfg.gateway_id, app_key);
    let mut sensors = sensors::default_sensors();

    if replay_mode {
        info!("Modo REPLAY: exercício de reinjeção contra {dest_addr}");
        let readings: Vec<_> = sensors.iter_mut().map(|s| s.read()).collect();
        let frame = builder.next_frame(&readings);
        if let Err(e) = attack::replay_exercise(&sock, &dest_addr, &frame, interval) {
            error!("Erro no exercício de replay: {e}");
        }
        return;
    }

    if jam_mode {
        info!("Modo JAM: inundação contra {dest_addr}");
        if let Err(e) =
            attack::jamming_exercise(&sock, &dest_addr, Duration::from_secs(30), 10)
        {
            error!("Erro no exercício de jamming: {e}");
        }
        return;
    }

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   📡 SENTINELA NODE – ATIVO");
    println!("══════════════════════════════════════════════");
    println!("  Dispositivo: {}", node_cfg.device_id);
    println!("  Gateway:     {}", node_cfg.gateway_id);
    println!("  Destino:     {dest_addr}");
    println!("  Intervalo:   {:.1}s", node_cfg.interval_secs);
    println!("  Protocolo:   bincode v{}", lora_core::PROTOCOL_VERSION);
    println!("══════════════════════════════════════════════");
    println!();

    // ── Loop principal ──
    loop {
        let cycle_start = Instant::now();

        let readings: Vec<_> = sensors.iter_mut().map(|s| s.read()).collect();
        let frame = builder.next_frame(&readings);

        match encode_frame(&frame) {
            Ok(packet) => match sock.send_to(&packet, &dest_addr) {
                Ok(sent) => {
                    info!(
                        "→ frame #{} | {} leituras | {sent} bytes para {dest_addr}",
                        frame.counter,
                        readings.len()
                    );
                }
                Err(e) => error!("Erro ao enviar UDP: {e}"),
            },
            Err(e) => error!("Erro ao serializar frame: {e}"),
        }

        // Dormir pelo tempo restante do intervalo
        let elapsed = cycle_start.elapsed();
        if elapsed < interval {
            std::thread::sleep(interval - elapsed);
        }
    }
}
