//! Exercícios de ataque contra o servidor IDS.
//!
//! Reproduz os cenários clássicos contra redes LPWAN: reinjeção de frames
//! capturados (com e sem manipulação do contador) e inundação com tráfego
//! lixo. Útil para validar a detecção de ponta a ponta.

use lora_core::protocol::encode_frame;
use lora_core::types::UplinkFrame;
use std::io;
use std::net::UdpSocket;
use std::time::{Duration, Instant};
use tracing::info;

/// Exercício de replay: envia um frame legítimo e depois o reinjeta duas
/// vezes — primeiro byte a byte, depois com o contador inflado em +100 para
/// tentar contornar a verificação de monotonia.
pub fn replay_exercise(
    sock: &UdpSocket,
    dest: &str,
    frame: &UplinkFrame,
    delay: Duration,
) -> io::Result<()> {
    let packet = encode_frame(frame).map_err(io::Error::other)?;

    info!("Transmissão legítima do frame #{}", frame.counter);
    sock.send_to(&packet, dest)?;
    std::thread::sleep(delay);

    info!("Reinjetando o mesmo frame byte a byte (replay simples)");
    sock.send_to(&packet, dest)?;
    std::thread::sleep(delay);

    let mut bumped = frame.clone();
    bumped.counter += 100;
    info!("Replay com contador manipulado: #{}", bumped.counter);
    let packet = encode_frame(&bumped).map_err(io::Error::other)?;
    sock.send_to(&packet, dest)?;

    Ok(())
}

/// Exercício de jamming: inunda o canal com frames lixo de dispositivos
/// falsos rotativos, na taxa pedida. Retorna quantos frames foram enviados.
pub fn jamming_exercise(
    sock: &UdpSocket,
    dest: &str,
    duration: Duration,
    rate: u32,
) -> io::Result<u64> {
    info!(
        "Iniciando jamming por {:.0}s a {rate} frames/s",
        duration.as_secs_f64()
    );

    let pause = Duration::from_secs_f64(1.0 / rate.max(1) as f64);
    let start = Instant::now();
    let mut count: u64 = 0;

    while start.elapsed() < duration {
        let junk = junk_frame(count);
        let packet = encode_frame(&junk).map_err(io::Error::other)?;
        sock.send_to(&packet, dest)?;
        count += 1;

        if count % 10 == 0 {
            info!("{count} frames de jamming enviados...");
        }
        std::thread::sleep(pause);
    }

    info!("Jamming encerrado: {count} frames enviados");
    Ok(count)
}

/// Frame lixo: identidade falsa rotativa, payload sem MIC plausível e nenhum
/// relatório de gateway.
fn junk_frame(seq: u64) -> UplinkFrame {
    UplinkFrame {
        device_id: format!("fake_node_{:03}", seq % 100),
        counter: seq as u32,
        port: 1,
        payload: "SGVsbG8gV29ybGQ=".into(),
        gateways: Vec::new(),
        time: chrono::Utc::now().to_rfc3339(),
        frequency: 868.1,
        modulation: "LORA".into(),
        data_rate: "SF7BW125".into(),
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn junk_frames_rotate_fake_identities() {
        assert_eq!(junk_frame(0).device_id, "fake_node_000");
        assert_eq!(junk_frame(42).device_id, "fake_node_042");
        assert_eq!(junk_frame(142).device_id, "fake_node_042");
    }

    #[test]
    fn junk_frames_are_structurally_invalid() {
        // Sem gateways: o servidor rejeita sem atribuir a dispositivo algum
        assert!(junk_frame(1).gateways.is_empty());
    }
}
