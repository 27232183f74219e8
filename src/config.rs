use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;

use fastembed::EmbeddingModel;

/// Best match scores strictly above this count as a near-duplicate.
pub const SIMILARITY_THRESHOLD: f32 = 0.70;

pub const DEFAULT_PORT: u16 = 8001;
pub const DEFAULT_CACHE_DIR: &str = "./.fastembed_cache";

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    /// Prefix for every route, empty to serve at the root.
    pub api_base_url: String,
    pub model: EmbeddingModel,
    pub cache_dir: PathBuf,
    pub show_download_progress: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            api_base_url: String::new(),
            model: EmbeddingModel::AllMiniLML6V2,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            show_download_progress: true,
        }
    }
}
