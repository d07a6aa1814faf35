//! Configuração unificada via TOML.
//!
//! Um único `config.toml` com as seções `[node]` (simulador de nó) e
//! `[server]` (servidor de ingestão + detector). Campos ausentes recebem o
//! valor padrão, então arquivos parciais funcionam.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Tamanho esperado da chave compartilhada (AppKey), em bytes.
pub const APP_KEY_LEN: usize = 16;

/// Chave compartilhada padrão das simulações.
const DEFAULT_APP_KEY: &str = "a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4";

/// Configuração do Node (simulador de sensor).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Identificador do end-device simulado
    pub device_id: String,
    /// Gateway que "encaminha" os frames simulados
    pub gateway_id: String,
    /// IP do servidor de ingestão
    pub dest_ip: String,
    /// Porta UDP do servidor
    pub port: u16,
    /// Intervalo entre transmissões (segundos)
    pub interval_secs: f64,
    /// Chave compartilhada em hex (16 bytes)
    pub app_key: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            device_id: "agriculture_node_001".into(),
            gateway_id: "farm_gateway_001".into(),
            dest_ip: "127.0.0.1".into(),
            port: 1700,
            interval_secs: 5.0,
            app_key: DEFAULT_APP_KEY.into(),
        }
    }
}

/// Thresholds do motor de detecção.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Salto máximo de contador aceito sem anomalia
    pub counter_jump_threshold: u32,
    /// Desvio de RSSI (dBm) acima do qual o frame é suspeito
    pub rssi_deviation_threshold: f32,
    /// Quantidade de leituras de RSSI mantidas por dispositivo
    pub rssi_history_size: usize,
    /// Janela deslizante de alertas (segundos)
    pub alert_window_secs: u64,
    /// Alertas vivos na janela que disparam escalonamento
    pub alert_threshold: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            counter_jump_threshold: 10,
            rssi_deviation_threshold: 20.0,
            rssi_history_size: 10,
            alert_window_secs: 300,
            alert_threshold: 3,
        }
    }
}

/// Um gateway autorizado, registrado na partida do servidor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayEntry {
    pub id: String,
    pub location: String,
}

/// Configuração do Server (ingestão + IDS).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Porta UDP para escutar
    pub port: u16,
    /// Chave compartilhada em hex (16 bytes)
    pub app_key: String,
    /// Gateways autorizados a encaminhar frames
    pub gateways: Vec<GatewayEntry>,
    /// Thresholds do detector
    pub detector: DetectorConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 1700,
            app_key: DEFAULT_APP_KEY.into(),
            gateways: vec![GatewayEntry {
                id: "farm_gateway_001".into(),
                location: "Fazenda principal".into(),
            }],
            detector: DetectorConfig::default(),
        }
    }
}

/// Configuração raiz do aplicativo (unifica node e server).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub node: NodeConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        std::fs::write(path, content).map_err(|e| e.to_string())?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.node.port == 0 {
            errors.push("Porta do node não pode ser 0".into());
        }
        if self.node.interval_secs < 0.1 || self.node.interval_secs > 3600.0 {
            errors.push(format!(
                "Intervalo do node inválido: {} (0.1–3600.0)",
                self.node.interval_secs
            ));
        }
        if let Err(e) = parse_app_key(&self.node.app_key) {
            errors.push(format!("AppKey do node inválida: {e}"));
        }

        if self.server.port == 0 {
            errors.push("Porta do server não pode ser 0".into());
        }
        if let Err(e) = parse_app_key(&self.server.app_key) {
            errors.push(format!("AppKey do server inválida: {e}"));
        }
        for gw in &self.server.gateways {
            if gw.id.is_empty() {
                errors.push("Gateway autorizado com id vazio".into());
            }
        }

        let det = &self.server.detector;
        if det.alert_threshold == 0 {
            errors.push("alert_threshold deve ser >= 1".into());
        }
        if det.rssi_history_size < crate::detector::RSSI_MIN_SAMPLES {
            errors.push(format!(
                "rssi_history_size deve ser >= {}",
                crate::detector::RSSI_MIN_SAMPLES
            ));
        }

        errors
    }
}

/// Decodifica a chave compartilhada em hex, exigindo [`APP_KEY_LEN`] bytes.
pub fn parse_app_key(key: &str) -> Result<Vec<u8>, String> {
    let bytes = hex::decode(key).map_err(|e| format!("hex inválido: {e}"))?;
    if bytes.len() != APP_KEY_LEN {
        return Err(format!(
            "tamanho incorreto: {} bytes (esperado {APP_KEY_LEN})",
            bytes.len()
        ));
    }
    Ok(bytes)
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
