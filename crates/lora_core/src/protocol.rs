//! Protocolo de transporte dos frames de uplink.
//!
//! Envelope binário enxuto sobre UDP:
//!
//! ```text
//! ┌──────────┬─────────┬─────────────────────────┐
//! │ Magic(1) │ Ver.(1) │ UplinkFrame (bincode)   │
//! └──────────┴─────────┴─────────────────────────┘
//! ```
//!
//! - Magic byte `0x4C` ('L') identifica pacote de uplink LoRa
//! - Versão do protocolo (1 byte)
//! - Frame serializado com bincode

use crate::types::UplinkFrame;

/// Magic byte que identifica pacotes de uplink.
pub const MAGIC_BYTE: u8 = 0x4C; // 'L'

/// Versão atual do protocolo.
pub const PROTOCOL_VERSION: u8 = 1;

/// Tamanho do header (magic + version).
const HEADER_SIZE: usize = 2;

/// Tamanho máximo de pacote UDP seguro (sem fragmentação).
pub const MAX_UDP_PAYLOAD: usize = 65507;

/// Erros do protocolo.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Pacote muito curto ({0} bytes, mínimo {HEADER_SIZE})")]
    TooShort(usize),

    #[error("Magic byte inválido: 0x{0:02X} (esperado 0x{MAGIC_BYTE:02X})")]
    InvalidMagic(u8),

    #[error("Versão incompatível: {0} (suportada: {PROTOCOL_VERSION})")]
    VersionMismatch(u8),

    #[error("Frame excede o limite UDP: {0} bytes (máximo {MAX_UDP_PAYLOAD})")]
    TooLarge(usize),

    #[error("Erro de serialização: {0}")]
    Serialize(String),

    #[error("Erro de deserialização: {0}")]
    Deserialize(String),
}

/// Codifica um [`UplinkFrame`] para transmissão UDP.
///
/// Retorna bytes no formato: `[MAGIC][VERSION][bincode_frame...]`
pub fn encode_frame(frame: &UplinkFrame) -> Result<Vec<u8>, ProtocolError> {
    let body = bincode::serialize(frame).map_err(|e| ProtocolError::Serialize(e.to_string()))?;

    let total = HEADER_SIZE + body.len();
    if total > MAX_UDP_PAYLOAD {
        return Err(ProtocolError::TooLarge(total));
    }

    let mut packet = Vec::with_capacity(total);
    packet.push(MAGIC_BYTE);
    packet.push(PROTOCOL_VERSION);
    packet.extend_from_slice(&body);

    Ok(packet)
}

/// Decodifica bytes recebidos via UDP em [`UplinkFrame`].
///
/// Valida magic byte e versão antes de deserializar.
pub fn decode_frame(data: &[u8]) -> Result<UplinkFrame, ProtocolError> {
    if data.len() < HEADER_SIZE {
        return Err(ProtocolError::TooShort(data.len()));
    }

    let magic = data[0];
    if magic != MAGIC_BYTE {
        return Err(ProtocolError::InvalidMagic(magic));
    }

    let version = data[1];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::VersionMismatch(version));
    }

    bincode::deserialize(&data[HEADER_SIZE..])
        .map_err(|e| ProtocolError::Deserialize(e.to_string()))
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GatewayReport;

    fn sample_frame() -> UplinkFrame {
        UplinkFrame {
            device_id: "agriculture_node_001".into(),
            counter: 7,
            port: 1,
            payload: "eyJ0ZW1wIjoyMS41fQ==".into(),
            gateways: vec![GatewayReport {
                gateway_id: "farm_gateway_001".into(),
                rssi: -101.5,
                snr: 9.8,
            }],
            time: "2025-06-01T12:00:00Z".into(),
            frequency: 868.1,
            modulation: "LORA".into(),
            data_rate: "SF7BW125".into(),
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let original = sample_frame();
        let encoded = encode_frame(&original).unwrap();
        let decoded = decode_frame(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn header_is_correct() {
        let encoded = encode_frame(&UplinkFrame::default()).unwrap();
        assert_eq!(encoded[0], MAGIC_BYTE);
        assert_eq!(encoded[1], PROTOCOL_VERSION);
    }

    #[test]
    fn rejects_invalid_magic() {
        let mut encoded = encode_frame(&UplinkFrame::default()).unwrap();
        encoded[0] = 0xFF;
        assert!(matches!(
            decode_frame(&encoded),
            Err(ProtocolError::InvalidMagic(0xFF))
        ));
    }

    #[test]
    fn rejects_short_packet() {
        assert!(matches!(
            decode_frame(&[0x4C]),
            Err(ProtocolError::TooShort(1))
        ));
    }

    #[test]
    fn rejects_wrong_version() {
        let mut encoded = encode_frame(&UplinkFrame::default()).unwrap();
        encoded[1] = 99;
        assert!(matches!(
            decode_frame(&encoded),
            Err(ProtocolError::VersionMismatch(99))
        ));
    }

    #[test]
    fn rejects_truncated_body() {
        let encoded = encode_frame(&sample_frame()).unwrap();
        assert!(matches!(
            decode_frame(&encoded[..HEADER_SIZE + 3]),
            Err(ProtocolError::Deserialize(_))
        ));
    }
}
