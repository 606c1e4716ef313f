#![allow(dead_code)]

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use yachtsync_core::language::LanguageCode;

use yachtsync_importer::config::ImporterConfig;
use yachtsync_importer::media::{FetchedMedia, MediaError, MediaFetcher};
use yachtsync_importer::payload::{self, ImportJob};
use yachtsync_importer::state::ImporterState;
use yachtsync_importer::store::{ImportStore, MemoryImportStore};
use yachtsync_importer::translation::{backend_for, BackendKind};
use yachtsync_importer::Importer;

pub const API_KEY: &str = "importer-secret";

/// Fetcher that records every URL it is asked for and fails the ones in
/// `failing`.
#[derive(Default)]
pub struct FakeFetcher {
    calls: Mutex<Vec<String>>,
    failing: HashSet<String>,
}

impl FakeFetcher {
    pub fn failing(urls: &[&str]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: urls.iter().map(|u| u.to_string()).collect(),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedMedia, MediaError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(url.to_string());
        if self.failing.contains(url) {
            return Err(MediaError::Status(404));
        }
        Ok(FetchedMedia {
            file_path: format!("file-{}.jpg", calls.len()),
            mime_type: Some("image/jpeg".into()),
            size_bytes: 10,
        })
    }
}

pub struct Harness {
    pub store: Arc<MemoryImportStore>,
    pub fetcher: Arc<FakeFetcher>,
    pub importer: Importer,
}

pub fn harness(backend: BackendKind) -> Harness {
    harness_with(backend, FakeFetcher::default())
}

pub fn harness_with(backend: BackendKind, fetcher: FakeFetcher) -> Harness {
    let store = Arc::new(MemoryImportStore::new());
    let fetcher = Arc::new(fetcher);
    let importer = Importer::new(
        Arc::clone(&store) as Arc<dyn ImportStore>,
        Arc::clone(&fetcher) as Arc<dyn MediaFetcher>,
    )
    .with_translation_backend(backend_for(backend));
    Harness {
        store,
        fetcher,
        importer,
    }
}

pub fn lang(code: &str) -> LanguageCode {
    LanguageCode::parse(code).unwrap()
}

/// A sync envelope for a new yacht in `en` (default) and `sl`.
pub fn yacht_envelope(source_id: &str) -> Value {
    json!({
        "type": "new",
        "import_media": true,
        "data": {
            "source_id": source_id,
            "slug": "galeon-500-fly",
            "type": "new",
            "default_language": "en",
            "defaultData": {"title": "Galeon 500 Fly", "content": "Description"},
            "translations": {
                "en": {
                    "title": "Galeon 500 Fly",
                    "content": "Description",
                    "custom_fields": {"sub_title": "Fast cruiser"}
                },
                "sl": {
                    "title": "Galeon 500 Fly SL",
                    "content": "Opis",
                    "custom_fields": {"sub_title": "Hitra jahta"}
                }
            },
            "custom_fields": {"length": 15.2, "cabins": 3},
            "media": {
                "brochure": "https://cdn.example.com/brochure.pdf",
                "gallery": [
                    "https://cdn.example.com/g1.jpg",
                    "https://cdn.example.com/g2.jpg",
                    "https://cdn.example.com/cover.jpg"
                ]
            },
            "taxonomies": [],
            "featured_image": "https://cdn.example.com/cover.jpg"
        }
    })
}

pub fn job(envelope: &Value) -> ImportJob {
    payload::parse(&serde_json::to_vec(envelope).unwrap(), None).unwrap()
}

pub fn test_config(api_key: Option<&str>) -> ImporterConfig {
    ImporterConfig {
        host: "127.0.0.1".into(),
        port: 0,
        api_key: api_key.map(str::to_string),
        public_url: "https://shop.example.com".into(),
        database_url: None,
        translation_backend: BackendKind::Polylang,
        custom_fields_enabled: true,
        languages: vec![lang("en"), lang("sl")],
        media_dir: PathBuf::from("media"),
        media_timeout_secs: 5,
        request_timeout_secs: 30,
    }
}

pub fn test_state(api_key: Option<&str>) -> (ImporterState, Arc<MemoryImportStore>) {
    let harness = harness(BackendKind::Polylang);
    let state = ImporterState {
        importer: harness.importer,
        config: Arc::new(test_config(api_key)),
        pool: None,
    };
    (state, harness.store)
}
