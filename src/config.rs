//! Process configuration (spec §1.1): environment-first, with a thin CLI
//! overlay sharing the same variable names (teacher's `clap(env = true)`
//! convention).

use std::path::{Path, PathBuf};

use clap::Parser;

const DEFAULT_ADMIN_SECRET: &str = "dev-admin-secret-change-me";

#[derive(Parser, Debug, Clone)]
#[command(name = "tollgate", about = "Multi-tenant reverse proxy for a local inference backend")]
pub struct Config {
    /// Base URL of the inference backend.
    #[arg(long, env = "TOLLGATE_BACKEND_URL", default_value = "http://127.0.0.1:11434")]
    pub backend_url: String,

    /// Maximum number of concurrent in-flight backend calls.
    #[arg(long, env = "TOLLGATE_BACKEND_MAX_CONCURRENT", default_value_t = 1)]
    pub backend_max_concurrent: usize,

    /// Shared secret for the `/admin/...` surface.
    #[arg(long, env = "TOLLGATE_ADMIN_SECRET")]
    pub admin_secret: Option<String>,

    #[arg(long, env = "TOLLGATE_LISTEN_HOST", default_value = "0.0.0.0")]
    pub listen_host: String,

    #[arg(long, env = "TOLLGATE_LISTEN_PORT", default_value_t = 8080)]
    pub listen_port: u16,

    #[arg(long, env = "TOLLGATE_STORE_PATH", default_value = "tollgate.db")]
    pub store_path: String,

    #[arg(long, env = "TOLLGATE_POOL_SIZE", default_value_t = 20)]
    pub pool_size: u32,

    #[arg(long, env = "TOLLGATE_MAX_UPLOAD_BYTES", default_value_t = 25 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    #[arg(
        long,
        env = "TOLLGATE_ALLOWED_IMAGE_MIME",
        default_value = "image/png,image/jpeg,image/webp,image/gif"
    )]
    pub allowed_image_mime: String,
}

impl Config {
    /// Loads `.env` (cwd and parents, missing file ignored) then parses
    /// CLI args, falling back to environment variables per-field.
    pub fn load() -> Self {
        load_env();
        let mut config = Config::parse();
        if config.admin_secret.is_none() {
            tracing::warn!("TOLLGATE_ADMIN_SECRET not set; using an insecure development default");
            config.admin_secret = Some(DEFAULT_ADMIN_SECRET.to_string());
        }
        config
    }

    pub fn admin_secret(&self) -> &str {
        self.admin_secret.as_deref().unwrap_or(DEFAULT_ADMIN_SECRET)
    }

    pub fn store_path(&self) -> &Path {
        Path::new(&self.store_path)
    }

    pub fn allowed_image_mime_types(&self) -> Vec<String> {
        self.allowed_image_mime
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }
}

fn load_env() {
    let _ = dotenv::dotenv();

    if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
        let manifest_dir = PathBuf::from(manifest_dir);
        for candidate in [manifest_dir.join(".env"), manifest_dir.join("../.env")] {
            if candidate.exists() {
                let _ = dotenv::from_path(&candidate);
            }
        }
    }
}
