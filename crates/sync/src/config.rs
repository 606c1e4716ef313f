use std::time::Duration;

use yachtsync_dispatch::DispatchConfig;

/// Sync engine configuration loaded from environment variables.
///
/// Injected into the [`Orchestrator`](crate::Orchestrator); nothing in the
/// engine reads the environment directly.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Sites processed at the same time by a multi-site run (default: `4`).
    pub site_concurrency: usize,
    /// Records in flight per site (default: `1`, strictly serial).
    pub record_concurrency: usize,
    /// Ask targets to download media inside the import request (default: `true`).
    pub import_media: bool,
    /// Age after which another run may take over a claim (default: `900`).
    pub claim_stale_secs: i64,
    /// Public base URL of the media store.
    pub media_base_url: String,
    /// Fill missing multilingual text through the translator (default: `false`).
    pub translate_gaps: bool,
    pub dispatch: DispatchConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            site_concurrency: 4,
            record_concurrency: 1,
            import_media: true,
            claim_stale_secs: 900,
            media_base_url: "http://localhost:8000/media".into(),
            translate_gaps: false,
            dispatch: DispatchConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                        |
    /// |-----------------------------|--------------------------------|
    /// | `SYNC_SITE_CONCURRENCY`     | `4`                            |
    /// | `SYNC_RECORD_CONCURRENCY`   | `1`                            |
    /// | `SYNC_IMPORT_MEDIA`         | `true`                         |
    /// | `SYNC_CLAIM_STALE_SECS`     | `900`                          |
    /// | `SYNC_MEDIA_BASE_URL`       | `http://localhost:8000/media`  |
    /// | `SYNC_TRANSLATE_GAPS`       | `false`                        |
    /// | `SYNC_RETRY_DELAYS_MS`      | `1000,2000,4000`               |
    /// | `SYNC_REQUEST_TIMEOUT_SECS` | `60`                           |
    /// | `SYNC_MEDIA_TIMEOUT_SECS`   | `300`                          |
    /// | `SYNC_DEFAULT_API_KEY`      | unset                          |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let site_concurrency = parse_env::<usize>("SYNC_SITE_CONCURRENCY", "4").max(1);
        let record_concurrency = parse_env::<usize>("SYNC_RECORD_CONCURRENCY", "1").max(1);
        let import_media: bool = parse_env("SYNC_IMPORT_MEDIA", "true");
        let claim_stale_secs: i64 = parse_env("SYNC_CLAIM_STALE_SECS", "900");
        let media_base_url =
            std::env::var("SYNC_MEDIA_BASE_URL").unwrap_or(defaults.media_base_url);
        let translate_gaps: bool = parse_env("SYNC_TRANSLATE_GAPS", "false");

        let retry_delays = std::env::var("SYNC_RETRY_DELAYS_MS")
            .unwrap_or_else(|_| "1000,2000,4000".into())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<u64>()
                    .map(Duration::from_millis)
                    .expect("SYNC_RETRY_DELAYS_MS must be a comma-separated list of u64")
            })
            .collect();

        let dispatch = DispatchConfig {
            retry_delays,
            request_timeout: Duration::from_secs(parse_env::<u64>("SYNC_REQUEST_TIMEOUT_SECS", "60")),
            media_timeout: Duration::from_secs(parse_env::<u64>("SYNC_MEDIA_TIMEOUT_SECS", "300")),
            default_api_key: std::env::var("SYNC_DEFAULT_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            ..DispatchConfig::default()
        };

        Self {
            site_concurrency,
            record_concurrency,
            import_media,
            claim_stale_secs,
            media_base_url,
            translate_gaps,
            dispatch,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: &str) -> T {
    std::env::var(name)
        .unwrap_or_else(|_| default.into())
        .parse()
        .unwrap_or_else(|_| panic!("{name} has an invalid value"))
}
