use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;

fn harden_secret_file_permissions(path: &str) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".into(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/huddle.db".into(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_jwt_expiry")]
    pub jwt_expiry_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: generate_random_hex(64),
            jwt_expiry_seconds: default_jwt_expiry(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Public URL of the web client, used to build shareable room links.
    pub url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:5173".into(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CleanupConfig {
    /// How long an empty room stays live before being reclaimed.
    #[serde(default = "default_empty_room_delay")]
    pub empty_room_delay_seconds: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            empty_room_delay_seconds: default_empty_room_delay(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_jwt_expiry() -> u64 {
    24 * 3600
}

fn default_empty_room_delay() -> u64 {
    5 * 60
}

/// Generate a cryptographically random hex string of the given length.
fn generate_random_hex(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..16u8);
            char::from(if idx < 10 {
                b'0' + idx
            } else {
                b'a' + idx - 10
            })
        })
        .collect()
}

fn looks_like_placeholder_secret(raw: &str) -> bool {
    let normalized = raw.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        return true;
    }
    normalized.contains("change_me")
        || normalized.contains("replace_me")
        || normalized.starts_with("example")
        || normalized == "devkey"
        || normalized == "devsecret"
        || normalized == "secret"
}

fn validate_secret_configuration(config: &Config) -> Result<()> {
    let jwt_secret = config.auth.jwt_secret.trim();
    if jwt_secret.len() < 32 || looks_like_placeholder_secret(jwt_secret) {
        anyhow::bail!(
            "Invalid auth.jwt_secret: use a strong random secret (at least 32 characters) and never leave placeholder values"
        );
    }
    Ok(())
}

fn generate_config_template(config: &Config) -> String {
    format!(
        r#"# Huddle Server Configuration
# Generated automatically on first run. Edit as needed.

[server]
# Address and port the server listens on.
bind_address = "{bind_address}"

[database]
# SQLite database location. The file is created on first start.
url = "{database_url}"
max_connections = {max_connections}

[auth]
# Secret used to sign access tokens. Generated randomly on first run.
jwt_secret = "{jwt_secret}"
jwt_expiry_seconds = {jwt_expiry}

[client]
# Public URL of the web client, used to build shareable room links.
url = "{client_url}"

[cleanup]
# Seconds an empty room stays live before being reclaimed.
empty_room_delay_seconds = {empty_room_delay}
"#,
        bind_address = config.server.bind_address,
        database_url = config.database.url,
        max_connections = config.database.max_connections,
        jwt_secret = config.auth.jwt_secret,
        jwt_expiry = config.auth.jwt_expiry_seconds,
        client_url = config.client.url,
        empty_room_delay = config.cleanup.empty_room_delay_seconds,
    )
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let mut config = if std::path::Path::new(path).exists() {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            tracing::info!("Config file not found at '{}', generating defaults...", path);
            let config = Config::default();
            if let Some(parent) = std::path::Path::new(path).parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, generate_config_template(&config))?;
            tracing::info!("Generated default config at '{}'", path);
            config
        };
        let _ = harden_secret_file_permissions(path);

        if let Ok(value) = std::env::var("HUDDLE_BIND_ADDRESS") {
            config.server.bind_address = value;
        }
        if let Ok(value) = std::env::var("HUDDLE_DATABASE_URL") {
            config.database.url = value;
        }
        if let Ok(value) = std::env::var("HUDDLE_DATABASE_MAX_CONNECTIONS") {
            if let Ok(parsed) = value.parse::<u32>() {
                config.database.max_connections = parsed;
            }
        }
        if let Ok(value) = std::env::var("HUDDLE_JWT_SECRET") {
            config.auth.jwt_secret = value;
        }
        if let Ok(value) = std::env::var("HUDDLE_JWT_EXPIRY_SECONDS") {
            if let Ok(parsed) = value.parse::<u64>() {
                config.auth.jwt_expiry_seconds = parsed;
            }
        }
        if let Ok(value) = std::env::var("HUDDLE_CLIENT_URL") {
            config.client.url = value;
        }
        if let Ok(value) = std::env::var("HUDDLE_CLEANUP_DELAY_SECONDS") {
            if let Ok(parsed) = value.parse::<u64>() {
                config.cleanup.empty_room_delay_seconds = parsed;
            }
        }

        validate_secret_configuration(&config)?;
        Ok(config)
    }
}
