use std::{env, error::Error};

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Upstream base URL; the original path and query are appended verbatim.
    pub forward_url: String,
    pub redis_url: String,
    pub bind_addr: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, Box<dyn Error>> {
        let forward_url = env::var("FORWARD_URL")?;
        let redis_url = env::var("REDIS_URL")?;
        let bind_addr = env::var("BIND_ADDR")?;

        Ok(Self {
            forward_url,
            redis_url,
            bind_addr,
        })
    }
}
