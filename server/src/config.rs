use anyhow::{Context, Result, anyhow};
use platform_authn::AuthConfig;
use platform_authz::ApiAuthorization;

const DEV_SECRET: &str = "dev-secret";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub auth: AuthConfig,
    pub cors_allowed_origins: Vec<String>,
    pub api_authorization: ApiAuthorization,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let secret = match std::env::var("AUTH_SECRET") {
            Ok(secret) => secret,
            Err(_) => {
                tracing::warn!("AUTH_SECRET not set; using the development secret");
                DEV_SECRET.to_string()
            }
        };
        let session_ttl_minutes = match std::env::var("SESSION_TTL_MINUTES") {
            Ok(raw) => raw
                .trim()
                .parse::<i64>()
                .with_context(|| format!("invalid SESSION_TTL_MINUTES {raw}"))?,
            Err(_) => 60 * 8,
        };
        let auth = AuthConfig::new(secret, session_ttl_minutes)?;

        let cors_allowed_origins = parse_origins(
            &std::env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
        );

        let api_authorization = match std::env::var("API_AUTHZ") {
            Ok(raw) => raw
                .parse::<ApiAuthorization>()
                .map_err(|err| anyhow!("API_AUTHZ: {err}"))?,
            Err(_) => ApiAuthorization::default(),
        };

        Ok(Self {
            auth,
            cors_allowed_origins,
            api_authorization,
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}
