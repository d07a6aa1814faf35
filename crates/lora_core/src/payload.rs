//! Selagem e verificação de integridade do payload de aplicação.
//!
//! O payload transportado num [`UplinkFrame`](crate::types::UplinkFrame) é
//! `base64(dados ‖ MIC)`, onde o MIC são os 4 primeiros bytes de
//! HMAC-SHA256(chave, dados). A comparação do MIC é em tempo constante.
//!
//! Não há cifragem dos dados: a chave compartilhada garante apenas
//! integridade e origem, não confidencialidade.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Tamanho do MIC anexado ao final dos dados.
pub const MIC_LEN: usize = 4;

type HmacSha256 = Hmac<Sha256>;

/// Erros de abertura de payload.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("Erro de decodificação base64: {0}")]
    Decode(String),

    #[error("Payload muito curto ({0} bytes, mínimo {MIC_LEN})")]
    TooShort(usize),

    #[error("Falha na verificação do código de integridade (MIC)")]
    MicMismatch,
}

/// Calcula o MIC dos dados com a chave compartilhada.
pub fn compute_mic(data: &[u8], key: &[u8]) -> [u8; MIC_LEN] {
    let mut mac =
        HmacSha256::new_from_slice(key).expect("HMAC-SHA256 aceita chave de qualquer tamanho");
    mac.update(data);
    let digest = mac.finalize().into_bytes();

    let mut mic = [0u8; MIC_LEN];
    mic.copy_from_slice(&digest[..MIC_LEN]);
    mic
}

/// Sela dados de aplicação: retorna `base64(dados ‖ MIC)`.
pub fn seal(data: &[u8], key: &[u8]) -> String {
    let mic = compute_mic(data, key);

    let mut combined = Vec::with_capacity(data.len() + MIC_LEN);
    combined.extend_from_slice(data);
    combined.extend_from_slice(&mic);

    BASE64.encode(combined)
}

/// Abre um payload selado, verificando o MIC em tempo constante.
///
/// Retorna os dados de aplicação (sem o MIC) em caso de sucesso.
pub fn open(payload: &str, key: &[u8]) -> Result<Vec<u8>, PayloadError> {
    let decoded = BASE64
        .decode(payload)
        .map_err(|e| PayloadError::Decode(e.to_string()))?;

    if decoded.len() < MIC_LEN {
        return Err(PayloadError::TooShort(decoded.len()));
    }

    let (data, tag) = decoded.split_at(decoded.len() - MIC_LEN);
    let expected = compute_mic(data, key);

    if bool::from(expected.ct_eq(tag)) {
        Ok(data.to_vec())
    } else {
        Err(PayloadError::MicMismatch)
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
