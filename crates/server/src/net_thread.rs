//! Thread de rede que escuta UDP e entrega frames decodificados via channel.

use crossbeam_channel::{Receiver, Sender, bounded};
use lora_core::protocol::decode_frame;
use lora_core::types::UplinkFrame;
use std::net::UdpSocket;
use tracing::{debug, error, info, warn};

/// Mensagem enviada da thread de rede para o loop de análise.
#[derive(Debug, Clone)]
pub struct NetMessage {
    pub frame: UplinkFrame,
    pub source_addr: String,
    pub raw_size: usize,
}

/// Inicia a thread de rede. Retorna o receiver do channel.
pub fn spawn_listener(port: u16) -> Receiver<NetMessage> {
    let (tx, rx) = bounded::<NetMessage>(64); // Buffer de 64 frames

    std::thread::Builder::new()
        .name("udp-listener".into())
        .spawn(move || {
            listener_loop(&tx, port);
        })
        .expect("Falha ao criar thread de rede");

    rx
}

fn listener_loop(tx: &Sender<NetMessage>, port: u16) {
    loop {
        match UdpSocket::bind(format!("0.0.0.0:{port}")) {
            Ok(sock) => {
                sock.set_read_timeout(Some(std::time::Duration::from_secs(1)))
                    .ok();

                info!("Servidor escutando em 0.0.0.0:{port}");

                let mut buf = [0u8; 65536];
                loop {
                    match sock.recv_from(&mut buf) {
                        Ok((size, addr)) => {
                            let source = addr.ip().to_string();

                            match decode_frame(&buf[..size]) {
                                Ok(frame) => {
                                    let msg = NetMessage {
                                        frame,
                                        source_addr: source,
                                        raw_size: size,
                                    };
                                    // Non-blocking send: se a análise está
                                    // lenta, descarta frames excedentes
                                    if tx.try_send(msg).is_err() {
                                        debug!("Channel cheio, descartando frame");
                                    }
                                }
                                Err(e) => {
                                    debug!("Pacote inválido de {source}: {e}");
                                }
                            }
                        }
                        Err(ref e)
                            if e.kind() == std::io::ErrorKind::TimedOut
                                || e.kind() == std::io::ErrorKind::WouldBlock =>
                        {
                            // Timeout normal, continua
                        }
                        Err(e) => {
                            warn!("Erro ao receber UDP: {e}");
                        }
                    }
                }
            }
            Err(e) => {
                error!("Falha ao bind porta {port}: {e}. Tentando novamente em 2s...");
                std::thread::sleep(std::time::Duration::from_secs(2));
            }
        }
    }
}
