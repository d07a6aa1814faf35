//! Definição de tipos/structs do tráfego LoRaWAN e dos resultados de análise.
//!
//! O frame de uplink segue o formato publicado pelos gateways: identidade do
//! dispositivo, contador de frames, payload selado em base64 e relatórios de
//! rádio por gateway.

use serde::{Deserialize, Serialize};

// ──────────────────────────────────────────────
// Frame de uplink
// ──────────────────────────────────────────────

/// Relatório de recepção de um gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GatewayReport {
    /// Identificador do gateway que encaminhou o frame
    pub gateway_id: String,
    /// Potência do sinal recebido (dBm)
    pub rssi: f32,
    /// Relação sinal-ruído (dB)
    pub snr: f32,
}

/// Frame de uplink de um end-device.
///
/// Campos ausentes na origem deserializam com valor vazio/zero e são
/// rejeitados pela validação estrutural do detector, nunca aqui.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UplinkFrame {
    /// Identificador estável do dispositivo
    pub device_id: String,
    /// Contador de frames, estritamente crescente por dispositivo
    pub counter: u32,
    /// Porta de aplicação LoRaWAN
    pub port: u8,
    /// Payload em base64: dados ‖ MIC (4 bytes finais)
    pub payload: String,
    /// Gateways que receberam este frame (não pode ser vazio)
    pub gateways: Vec<GatewayReport>,
    /// Instante de recepção reportado (ISO-8601, opaco para a detecção)
    pub time: String,
    /// Frequência central (MHz)
    pub frequency: f32,
    /// Modulação (ex: "LORA")
    pub modulation: String,
    /// Data rate (ex: "SF7BW125")
    pub data_rate: String,
}

// ──────────────────────────────────────────────
// Leituras de sensores (corpo do payload)
// ──────────────────────────────────────────────

/// Uma leitura de sensor transportada (em JSON) dentro do payload selado.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SensorReading {
    /// Identificador do sensor (ex: "temp_001")
    pub sensor_id: String,
    /// Tipo da grandeza (ex: "temperature", "soil_moisture")
    pub kind: String,
    /// Valor medido
    pub value: f32,
    /// Unidade (ex: "°C", "%", "lux")
    pub units: String,
    /// Instante da leitura (ISO-8601)
    pub timestamp: String,
}

// ──────────────────────────────────────────────
// Anomalias
// ──────────────────────────────────────────────

/// Taxonomia de anomalias detectáveis. Os identificadores serializados são
/// estáveis e usados em logs e roteamento de alertas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyKind {
    /// Frame encaminhado por gateway fora do registro autorizado
    UnauthorizedGateway,
    /// Contador repetido ou decrescente (reinjeção de frame)
    ReplayAttack,
    /// Salto de contador implausível (forja ou clone de dispositivo)
    CounterJump,
    /// Payload não decodificável
    PayloadError,
    /// MIC recalculado não confere com o MIC do frame
    InvalidMic,
    /// Desvio abrupto de RSSI (possível troca de origem física)
    RssiAnomaly,
}

impl AnomalyKind {
    /// Identificador estável da anomalia.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::UnauthorizedGateway => "UNAUTHORIZED_GATEWAY",
            AnomalyKind::ReplayAttack => "REPLAY_ATTACK",
            AnomalyKind::CounterJump => "COUNTER_JUMP",
            AnomalyKind::PayloadError => "PAYLOAD_ERROR",
            AnomalyKind::InvalidMic => "INVALID_MIC",
            AnomalyKind::RssiAnomaly => "RSSI_ANOMALY",
        }
    }
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uma constatação da análise: tipo + diagnóstico legível.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub details: String,
}

impl Anomaly {
    pub fn new(kind: AnomalyKind, details: impl Into<String>) -> Self {
        Self {
            kind,
            details: details.into(),
        }
    }
}

// ──────────────────────────────────────────────
// Resultado da análise
// ──────────────────────────────────────────────

/// Motivo de rejeição estrutural de um frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("frame sem identificador de dispositivo")]
    MissingDeviceId,
    #[error("frame sem payload")]
    MissingPayload,
    #[error("nenhum gateway nos metadados")]
    NoGateways,
}

/// Resultado de [`analyze`](crate::detector::IntrusionDetector::analyze).
///
/// Um frame estruturalmente incompleto não carrega identidade confiável e é
/// rejeitado sem tocar nos registros; um frame analisado é atribuído ao
/// dispositivo e carrega a lista completa de anomalias encontradas.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Rejeitado na validação estrutural; nenhum estado foi mutado.
    Rejected { reason: RejectReason },
    /// Analisado contra os registros.
    Analyzed {
        device_id: String,
        anomalies: Vec<Anomaly>,
    },
}

impl Verdict {
    /// Um frame é válido quando foi analisado e nenhuma anomalia foi
    /// encontrada.
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Analyzed { anomalies, .. } if anomalies.is_empty())
    }

    /// Anomalias encontradas (vazio para frames rejeitados ou limpos).
    pub fn anomalies(&self) -> &[Anomaly] {
        match self {
            Verdict::Analyzed { anomalies, .. } => anomalies,
            Verdict::Rejected { .. } => &[],
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
