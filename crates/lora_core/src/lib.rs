//! # LoRa Core
//!
//! Crate compartilhada do sistema Sentinela LoRa: estruturas dos frames de
//! uplink, protocolo de transporte binário (bincode), configuração TOML e o
//! motor de detecção de intrusão.
//!
//! ## Módulos
//! - [`types`] – Frames de uplink, leituras de sensores, anomalias e veredito
//! - [`protocol`] – Encode/decode binário com magic byte
//! - [`config`] – Configuração unificada via TOML
//! - [`payload`] – Selagem e verificação de integridade (MIC)
//! - [`gateways`] – Registro de gateways autorizados
//! - [`devices`] – Registro e estado por end-device
//! - [`alerts`] – Histórico de alertas e escalonamento por janela
//! - [`detector`] – Orquestração das verificações por frame

pub mod alerts;
pub mod config;
pub mod detector;
pub mod devices;
pub mod gateways;
pub mod payload;
pub mod protocol;
pub mod types;

// Re-exports convenientes
pub use alerts::Escalation;
pub use config::{AppConfig, NodeConfig, ServerConfig};
pub use detector::IntrusionDetector;
pub use protocol::{PROTOCOL_VERSION, decode_frame, encode_frame};
pub use types::{AnomalyKind, SensorReading, UplinkFrame, Verdict};
