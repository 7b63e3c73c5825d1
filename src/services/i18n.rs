//! Display-name localization.
//!
//! Translation only ever touches display text on the way out. Slugs, codes and
//! filter semantics stay in the source language.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tracing::{debug, instrument, warn};

use crate::cache::CacheBackend;
use crate::entities::{
    attribute, item_attribute_value, item_variant, variant_attribute_value, Attribute,
    AttributeType, Item, ItemAttributeValue, ItemVariant, VariantAttributeValue,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventHandler};

/// External translation collaborator.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, ServiceError>;
}

/// Returns text unchanged. Used when no translation backend is configured.
#[derive(Debug, Clone, Default)]
pub struct IdentityTranslator;

#[async_trait]
impl Translator for IdentityTranslator {
    async fn translate(&self, text: &str, _source: &str, _target: &str) -> Result<String, ServiceError> {
        Ok(text.to_string())
    }
}

/// Memoizes another translator's results in a cache backend.
pub struct CachingTranslator {
    inner: Arc<dyn Translator>,
    cache: Arc<dyn CacheBackend>,
    ttl: Option<Duration>,
}

impl CachingTranslator {
    pub fn new(inner: Arc<dyn Translator>, cache: Arc<dyn CacheBackend>, ttl: Option<Duration>) -> Self {
        Self { inner, cache, ttl }
    }

    fn key(text: &str, source: &str, target: &str) -> String {
        format!("i18n:{source}:{target}:{text}")
    }
}

#[async_trait]
impl Translator for CachingTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, ServiceError> {
        let key = Self::key(text, source, target);
        if let Some(hit) = self.cache.get(&key).await? {
            metrics::counter!("catalog.i18n.cache_hit", 1);
            return Ok(hit);
        }
        metrics::counter!("catalog.i18n.cache_miss", 1);
        let translated = self.inner.translate(text, source, target).await?;
        self.cache.set(&key, &translated, self.ttl).await?;
        Ok(translated)
    }
}

/// Language policy plus the translator, shared by the query services.
pub struct Localizer {
    translator: Arc<dyn Translator>,
    source_language: String,
    supported_languages: Vec<String>,
}

impl Localizer {
    pub fn new(
        translator: Arc<dyn Translator>,
        source_language: impl Into<String>,
        supported_languages: Vec<String>,
    ) -> Self {
        let source_language = source_language.into().to_lowercase();
        let mut supported: Vec<String> = supported_languages
            .into_iter()
            .map(|l| l.to_lowercase())
            .collect();
        if !supported.contains(&source_language) {
            supported.push(source_language.clone());
        }
        Self {
            translator,
            source_language,
            supported_languages: supported,
        }
    }

    pub fn source_language(&self) -> &str {
        &self.source_language
    }

    pub fn supported_languages(&self) -> &[String] {
        &self.supported_languages
    }

    /// `fr-FR` -> `fr`; unsupported or missing languages fall back to the source.
    pub fn normalize(&self, lang: Option<&str>) -> String {
        lang.and_then(|l| l.split(['-', '_']).next())
            .map(|l| l.trim().to_lowercase())
            .filter(|l| self.supported_languages.contains(l))
            .unwrap_or_else(|| self.source_language.clone())
    }

    /// Translates display text into `lang`. Translation failures keep the source text.
    pub async fn text(&self, text: &str, lang: &str) -> String {
        if lang == self.source_language || text.trim().is_empty() {
            return text.to_string();
        }
        match self
            .translator
            .translate(text, &self.source_language, lang)
            .await
        {
            Ok(translated) => translated,
            Err(e) => {
                warn!(lang, error = %e, "Translation failed, using source text");
                text.to_string()
            }
        }
    }

    pub async fn opt_text(&self, text: Option<&str>, lang: &str) -> Option<String> {
        match text {
            Some(t) => Some(self.text(t, lang).await),
            None => None,
        }
    }
}

/// Pre-computes translations of changed text fields so later reads hit the cache.
pub struct TranslationWarmer {
    db: Arc<DatabaseConnection>,
    localizer: Arc<Localizer>,
}

impl TranslationWarmer {
    pub fn new(db: Arc<DatabaseConnection>, localizer: Arc<Localizer>) -> Self {
        Self { db, localizer }
    }

    async fn texts_for(&self, item_id: i64, field: &str) -> Result<Vec<String>, ServiceError> {
        let Some(item) = Item::find_by_id(item_id).one(&*self.db).await? else {
            return Ok(Vec::new());
        };

        match field {
            "name" => return Ok(vec![item.name]),
            "short_description" => return Ok(item.short_description.into_iter().collect()),
            _ => {}
        }

        let Some(attr) = Attribute::find()
            .filter(attribute::Column::Code.eq(field))
            .one(&*self.db)
            .await?
        else {
            return Ok(Vec::new());
        };
        if attr.attribute_type != AttributeType::Text {
            return Ok(Vec::new());
        }

        let mut texts: Vec<String> = ItemAttributeValue::find()
            .filter(item_attribute_value::Column::ItemId.eq(item_id))
            .filter(item_attribute_value::Column::AttributeId.eq(attr.id))
            .all(&*self.db)
            .await?
            .into_iter()
            .filter_map(|row| row.value_text)
            .collect();

        let variant_ids: Vec<i64> = ItemVariant::find()
            .filter(item_variant::Column::ItemId.eq(item_id))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|v| v.id)
            .collect();
        if !variant_ids.is_empty() {
            texts.extend(
                VariantAttributeValue::find()
                    .filter(variant_attribute_value::Column::VariantId.is_in(variant_ids))
                    .filter(variant_attribute_value::Column::AttributeId.eq(attr.id))
                    .all(&*self.db)
                    .await?
                    .into_iter()
                    .filter_map(|row| row.value_text),
            );
        }
        Ok(texts)
    }

    #[instrument(skip(self))]
    async fn warm(&self, item_id: i64, fields: &[&str]) -> Result<usize, ServiceError> {
        let mut warmed = 0;
        for field in fields {
            for text in self.texts_for(item_id, field).await? {
                for lang in self.localizer.supported_languages() {
                    if lang != self.localizer.source_language() {
                        self.localizer.text(&text, lang).await;
                        warmed += 1;
                    }
                }
            }
        }
        debug!(item_id, warmed, "Warmed translations");
        Ok(warmed)
    }
}

#[async_trait]
impl EventHandler for TranslationWarmer {
    async fn handle_event(&self, event: Event) -> Result<(), String> {
        let result = match &event {
            Event::ItemCreated(item_id) => self.warm(*item_id, &["name", "short_description"]).await,
            Event::ItemAttributeChanged { item_id, field } => self.warm(*item_id, &[field.as_str()]).await,
            Event::VariantPromotionChanged { .. } | Event::AttributeChoiceCreated { .. } => Ok(0),
        };
        result.map(|_| ()).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Upper(AtomicUsize);

    #[async_trait]
    impl Translator for Upper {
        async fn translate(&self, text: &str, _source: &str, target: &str) -> Result<String, ServiceError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            if target == "de" {
                return Err(ServiceError::InternalError("no german".into()));
            }
            Ok(text.to_uppercase())
        }
    }

    fn localizer(translator: Arc<dyn Translator>) -> Localizer {
        Localizer::new(translator, "fr", vec!["fr".into(), "en".into(), "de".into()])
    }

    #[test]
    fn normalizes_region_tags_and_falls_back() {
        let l = localizer(Arc::new(IdentityTranslator));
        assert_eq!(l.normalize(Some("en-US")), "en");
        assert_eq!(l.normalize(Some("EN")), "en");
        assert_eq!(l.normalize(Some("es")), "fr");
        assert_eq!(l.normalize(None), "fr");
    }

    #[tokio::test]
    async fn source_language_skips_translator() {
        let upper = Arc::new(Upper(AtomicUsize::new(0)));
        let l = localizer(upper.clone());
        assert_eq!(l.text("écran", "fr").await, "écran");
        assert_eq!(l.text("screen", "en").await, "SCREEN");
        assert_eq!(upper.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_keep_source_text() {
        let l = localizer(Arc::new(Upper(AtomicUsize::new(0))));
        assert_eq!(l.text("Bildschirm", "de").await, "Bildschirm");
    }

    #[tokio::test]
    async fn caching_translator_memoizes() {
        let upper = Arc::new(Upper(AtomicUsize::new(0)));
        let caching = CachingTranslator::new(upper.clone(), Arc::new(InMemoryCache::new()), None);
        assert_eq!(caching.translate("a", "fr", "en").await.unwrap(), "A");
        assert_eq!(caching.translate("a", "fr", "en").await.unwrap(), "A");
        assert_eq!(upper.0.load(Ordering::SeqCst), 1);
    }
}
