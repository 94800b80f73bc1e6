use std::path::PathBuf;
use std::time::Duration;

/// Where the customer collection is read from.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomerSourceConfig {
    /// PostgreSQL table `crm.customers` holding JSONB documents.
    Postgres { database_url: String },
    /// Remote CRM API exposing `GET /api/customers`.
    Remote { base_url: String, token: String },
    /// JSON export read once at startup.
    File { path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub source: CustomerSourceConfig,
    /// Allowed CORS origin; permissive when unset.
    pub cors_origin: Option<String>,
    /// Lifetime of a cached customer snapshot.
    pub snapshot_ttl: Duration,
    /// Granularity of the implicit `as_of` when callers omit it.
    pub as_of_resolution: Duration,
    /// Artificial latency of the insight stub.
    pub insight_delay: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let source_kind = std::env::var("CUSTOMER_SOURCE")
            .unwrap_or_else(|_| "postgres".to_string())
            .trim()
            .to_ascii_lowercase();

        let source = match source_kind.as_str() {
            "postgres" => CustomerSourceConfig::Postgres {
                database_url: std::env::var("DB_URL")
                    .or_else(|_| std::env::var("DATABASE_URL"))
                    .map_err(|_| {
                        anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                    })
                    .and_then(|url| {
                        if url.trim().is_empty() {
                            anyhow::bail!("DB_URL cannot be empty");
                        }
                        if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                            anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                        }
                        Ok(url)
                    })?,
            },
            "remote" => CustomerSourceConfig::Remote {
                base_url: std::env::var("CUSTOMERS_API_URL")
                    .map_err(|_| anyhow::anyhow!("CUSTOMERS_API_URL environment variable required"))
                    .and_then(|url| validate_http_url("CUSTOMERS_API_URL", url))?,
                token: std::env::var("CUSTOMERS_API_TOKEN")
                    .map_err(|_| {
                        anyhow::anyhow!("CUSTOMERS_API_TOKEN environment variable required")
                    })
                    .and_then(|token| {
                        if token.trim().is_empty() {
                            anyhow::bail!("CUSTOMERS_API_TOKEN cannot be empty");
                        }
                        Ok(token)
                    })?,
            },
            "file" => CustomerSourceConfig::File {
                path: std::env::var("CUSTOMERS_FILE")
                    .map_err(|_| anyhow::anyhow!("CUSTOMERS_FILE environment variable required"))
                    .and_then(|path| {
                        if path.trim().is_empty() {
                            anyhow::bail!("CUSTOMERS_FILE cannot be empty");
                        }
                        Ok(PathBuf::from(path))
                    })?,
            },
            other => anyhow::bail!(
                "CUSTOMER_SOURCE must be one of postgres, remote, file (got '{}')",
                other
            ),
        };

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            source,
            cors_origin: std::env::var("CORS_ORIGIN")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            snapshot_ttl: Duration::from_secs(env_u64("SNAPSHOT_TTL_SECS", 30)?),
            as_of_resolution: Duration::from_secs(env_u64("AS_OF_RESOLUTION_SECS", 60)?),
            insight_delay: Duration::from_millis(env_u64("INSIGHT_DELAY_MS", 2000)?),
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        match &config.source {
            CustomerSourceConfig::Postgres { .. } => tracing::debug!("Customer source: postgres"),
            CustomerSourceConfig::Remote { base_url, .. } => {
                tracing::debug!("Customer source: remote {}", base_url)
            }
            CustomerSourceConfig::File { path } => {
                tracing::debug!("Customer source: file {}", path.display())
            }
        }
        if let Some(ref origin) = config.cors_origin {
            tracing::info!("CORS origin configured: {}", origin);
        }
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

fn validate_http_url(name: &str, raw: String) -> anyhow::Result<String> {
    if raw.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    let parsed = url::Url::parse(raw.trim())
        .map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", name, e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(raw.trim().trim_end_matches('/').to_string())
}

fn env_u64(name: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a non-negative integer", name)),
        _ => Ok(default),
    }
}
