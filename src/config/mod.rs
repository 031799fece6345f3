use std::env;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub session_ttl_secs: u64,
    pub store_timeout_ms: u64,
    pub auth_rate_limit_window_secs: u64,
    pub auth_rate_limit_requests: u32,
    pub api_rate_limit_window_secs: u64,
    pub api_rate_limit_requests: u32,
    pub rate_limit_sweep_secs: u64,
    /// 部署在反向代理之后时打开，限流才会按转发头识别客户端
    pub trust_proxy: bool,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/tenant_gate".into(),
            redis_url: "redis://127.0.0.1/".into(),
            jwt_secret: "development-secret".into(),
            jwt_expiration_secs: 3600,
            session_ttl_secs: 24 * 3600,
            store_timeout_ms: 3000,
            auth_rate_limit_window_secs: 15 * 60,
            auth_rate_limit_requests: 5,
            api_rate_limit_window_secs: 15 * 60,
            api_rate_limit_requests: 1000,
            rate_limit_sweep_secs: 60,
            trust_proxy: false,
            server_host: "::".into(),
            server_port: 3000,
            api_base_uri: "/api".into(),
        }
    }
}

fn var_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn hours_or(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().trim_end_matches('h').parse::<u64>().ok())
        .unwrap_or(default)
        * 3600
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let defaults = Config::default();
        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            jwt_expiration_secs: hours_or("JWT_EXPIRATION", 1),
            session_ttl_secs: hours_or("SESSION_TTL", 24),
            store_timeout_ms: var_or("STORE_TIMEOUT_MS", defaults.store_timeout_ms),
            auth_rate_limit_window_secs: var_or(
                "AUTH_RATE_LIMIT_WINDOW",
                defaults.auth_rate_limit_window_secs,
            ),
            auth_rate_limit_requests: var_or(
                "AUTH_RATE_LIMIT_REQUESTS",
                defaults.auth_rate_limit_requests,
            ),
            api_rate_limit_window_secs: var_or(
                "API_RATE_LIMIT_WINDOW",
                defaults.api_rate_limit_window_secs,
            ),
            api_rate_limit_requests: var_or(
                "API_RATE_LIMIT_REQUESTS",
                defaults.api_rate_limit_requests,
            ),
            rate_limit_sweep_secs: var_or(
                "RATE_LIMIT_SWEEP_INTERVAL",
                defaults.rate_limit_sweep_secs,
            ),
            trust_proxy: var_or("TRUST_PROXY", defaults.trust_proxy),
            server_host: env::var("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: var_or("SERVER_PORT", defaults.server_port),
            api_base_uri: env::var("API_BASE_URI").unwrap_or(defaults.api_base_uri),
        })
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn auth_rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.auth_rate_limit_window_secs)
    }

    pub fn api_rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.api_rate_limit_window_secs)
    }

    pub fn rate_limit_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.rate_limit_sweep_secs)
    }
}
