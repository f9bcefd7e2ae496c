//! Shared application state.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, anyhow};
use dashmap::DashMap;
use tracing::info;

use crate::config::ServerConfig;
use crate::core::bot::{BotProvider, DirectLineProvider};
use crate::core::capture::DtmfCollectorFactory;
use crate::core::session::SessionServices;
use crate::core::stt::OpenAISTTFactory;
use crate::core::tts::{OpenAISynthesizer, Synthesizer};

/// Why a WebSocket connection slot was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionLimitError {
    #[error("global WebSocket connection limit reached")]
    GlobalLimitReached,
    #[error("per-IP connection limit reached")]
    PerIpLimitReached,
}

pub struct AppState {
    pub config: ServerConfig,
    /// Collaborators handed to every new session
    pub services: SessionServices,

    ws_connections: AtomicUsize,
    ip_connections: DashMap<IpAddr, u32>,
}

impl AppState {
    /// Build the state and the shared backends from the configuration
    ///
    /// # Errors
    /// Fails when a backend rejects its settings (missing keys, bad HTTP client setup)
    pub fn new(config: ServerConfig) -> anyhow::Result<Arc<Self>> {
        let speech = OpenAISTTFactory::new(config.stt_config())
            .map_err(|e| anyhow!("Transcription backend: {e}"))?;

        let synthesizer: Option<Arc<dyn Synthesizer>> = match config.tts_config() {
            Some(tts_config) => Some(Arc::new(
                OpenAISynthesizer::new(tts_config).context("Synthesis backend")?,
            )),
            None => {
                info!("No TTS API key configured, bot replies are sent without audio");
                None
            }
        };

        let bot: Arc<dyn BotProvider> = Arc::new(
            DirectLineProvider::new(config.direct_line_config(), synthesizer)
                .context("Direct Line bot")?,
        );

        let services = SessionServices {
            speech: Arc::new(speech),
            digits: Arc::new(DtmfCollectorFactory::new(config.dtmf_config())),
            bot,
        };

        Ok(Self::with_services(config, services))
    }

    /// State around already-built backends
    pub fn with_services(config: ServerConfig, services: SessionServices) -> Arc<Self> {
        Arc::new(Self {
            config,
            services,
            ws_connections: AtomicUsize::new(0),
            ip_connections: DashMap::new(),
        })
    }

    /// Reserve a WebSocket slot for `ip`
    pub fn try_acquire_connection(&self, ip: IpAddr) -> Result<(), ConnectionLimitError> {
        let per_ip_limit = self.config.max_connections_per_ip;
        let mut per_ip = self.ip_connections.entry(ip).or_insert(0);
        if *per_ip >= per_ip_limit {
            return Err(ConnectionLimitError::PerIpLimitReached);
        }

        if let Some(max) = self.config.max_websocket_connections {
            let reserved = self
                .ws_connections
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                    (current < max).then_some(current + 1)
                });
            if reserved.is_err() {
                drop(per_ip);
                self.ip_connections.remove_if(&ip, |_, count| *count == 0);
                return Err(ConnectionLimitError::GlobalLimitReached);
            }
        } else {
            self.ws_connections.fetch_add(1, Ordering::AcqRel);
        }

        *per_ip += 1;
        Ok(())
    }

    /// Give back a slot taken by [`Self::try_acquire_connection`]
    pub fn release_connection(&self, ip: IpAddr) {
        let _ = self
            .ws_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(1)
            });
        self.ip_connections.remove_if_mut(&ip, |_, count| {
            *count = count.saturating_sub(1);
            *count == 0
        });
    }

    pub fn ws_connection_count(&self) -> usize {
        self.ws_connections.load(Ordering::Acquire)
    }

    pub fn ip_connection_count(&self, ip: &IpAddr) -> u32 {
        self.ip_connections.get(ip).map(|count| *count).unwrap_or(0)
    }
}
