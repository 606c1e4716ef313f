//! Machine-translation collaborator.
//!
//! The translator is a black box. A `None` result means "leave the value
//! untranslated" and is never an error for the caller.

use async_trait::async_trait;

use crate::language::LanguageCode;

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        target: &LanguageCode,
        source: &LanguageCode,
    ) -> Option<String>;
}

/// Translator that never translates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTranslator;

#[async_trait]
impl Translator for NoopTranslator {
    async fn translate(&self, _: &str, _: &LanguageCode, _: &LanguageCode) -> Option<String> {
        None
    }
}
