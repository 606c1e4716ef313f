use std::path::PathBuf;

use yachtsync_core::language::{parse_codes, LanguageCode};

use crate::translation::BackendKind;

/// Importer service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ImporterConfig {
    pub host: String,
    pub port: u16,
    /// Shared secret the sending side authenticates with. Unset means the
    /// importer rejects every import.
    pub api_key: Option<String>,
    /// Externally reachable base URL, reported by `GET /sync/status`.
    pub public_url: String,
    /// PostgreSQL storage; the in-memory store is used when unset.
    pub database_url: Option<String>,
    pub translation_backend: BackendKind,
    /// Whether custom fields are written as post meta (default: `true`).
    pub custom_fields_enabled: bool,
    /// Languages recognised as suffixes by the legacy payload adapter.
    pub languages: Vec<LanguageCode>,
    /// Directory downloaded media is written to.
    pub media_dir: PathBuf,
    /// Timeout for a single media download in seconds (default: `30`).
    pub media_timeout_secs: u64,
    /// Request timeout in seconds (default: `300`).
    pub request_timeout_secs: u64,
}

impl ImporterConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default                  |
    /// |---------------------------------|--------------------------|
    /// | `HOST`                          | `0.0.0.0`                |
    /// | `PORT`                          | `8090`                   |
    /// | `IMPORTER_API_KEY`              | unset                    |
    /// | `IMPORTER_PUBLIC_URL`           | `http://localhost:8090`  |
    /// | `DATABASE_URL`                  | unset (in-memory store)  |
    /// | `IMPORTER_TRANSLATION_BACKEND`  | `polylang`               |
    /// | `IMPORTER_CUSTOM_FIELDS`        | `true`                   |
    /// | `IMPORTER_LANGUAGES`            | `en`                     |
    /// | `IMPORTER_MEDIA_DIR`            | `./media`                |
    /// | `IMPORTER_MEDIA_TIMEOUT_SECS`   | `30`                     |
    /// | `REQUEST_TIMEOUT_SECS`          | `300`                    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8090".into())
            .parse()
            .expect("PORT must be a valid u16");

        let api_key = std::env::var("IMPORTER_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        let public_url = std::env::var("IMPORTER_PUBLIC_URL")
            .unwrap_or_else(|_| "http://localhost:8090".into())
            .trim_end_matches('/')
            .to_string();
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|u| !u.trim().is_empty());

        let translation_backend = std::env::var("IMPORTER_TRANSLATION_BACKEND")
            .unwrap_or_else(|_| "polylang".into())
            .parse()
            .expect("IMPORTER_TRANSLATION_BACKEND must be polylang, falang or none");

        let custom_fields_enabled: bool = std::env::var("IMPORTER_CUSTOM_FIELDS")
            .unwrap_or_else(|_| "true".into())
            .parse()
            .expect("IMPORTER_CUSTOM_FIELDS must be true or false");

        let raw_languages: Vec<String> = std::env::var("IMPORTER_LANGUAGES")
            .unwrap_or_else(|_| "en".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let languages =
            parse_codes(&raw_languages).expect("IMPORTER_LANGUAGES must list valid language codes");

        let media_dir = PathBuf::from(
            std::env::var("IMPORTER_MEDIA_DIR").unwrap_or_else(|_| "./media".into()),
        );
        let media_timeout_secs: u64 = std::env::var("IMPORTER_MEDIA_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("IMPORTER_MEDIA_TIMEOUT_SECS must be a valid u64");
        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            api_key,
            public_url,
            database_url,
            translation_backend,
            custom_fields_enabled,
            languages,
            media_dir,
            media_timeout_secs,
            request_timeout_secs,
        }
    }

    /// Endpoint the sending side posts to.
    pub fn import_url(&self) -> String {
        format!("{}/sync/import", self.public_url)
    }
}
