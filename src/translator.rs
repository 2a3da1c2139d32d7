use futures_util::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::error::LocalizeError;
use crate::providers::retry::{self, RETRY_BASE_DELAY};
use crate::providers::{Provider, ProviderError, TranslationRequest};
use crate::specifiers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FailureKind {
    /// Language support for the target locale is not installed.
    UnsupportedLocale,
    /// The translation dropped or altered a format specifier.
    SpecifierMismatch,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationFailure {
    pub kind: FailureKind,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationOutcome {
    Translated(String),
    Failed(TranslationFailure),
}

impl TranslationOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            TranslationOutcome::Translated(text) => Some(text),
            TranslationOutcome::Failed(_) => None,
        }
    }

    fn failed(kind: FailureKind, reason: impl Into<String>) -> Self {
        TranslationOutcome::Failed(TranslationFailure {
            kind,
            reason: reason.into(),
        })
    }
}

/// Result for one (key, locale) pair of a bulk request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairOutcome {
    pub key: String,
    pub locale: String,
    pub outcome: TranslationOutcome,
}

/// Wraps a [`Provider`] for one run: fixed source locale, retries, bounded
/// concurrency, specifier protection, and a memory of locales whose language
/// support turned out to be missing.
#[derive(Debug)]
pub struct TranslationService<P: Provider> {
    provider: P,
    source_locale: String,
    concurrency: usize,
    max_retries: usize,
    unsupported: Mutex<BTreeSet<String>>,
}

impl<P: Provider> TranslationService<P> {
    pub fn new(provider: P, source_locale: impl Into<String>) -> Self {
        Self {
            provider,
            source_locale: source_locale.into(),
            concurrency: 1,
            max_retries: 0,
            unsupported: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn source_locale(&self) -> &str {
        &self.source_locale
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub async fn is_available(&self) -> bool {
        self.provider.check_available().await.is_ok()
    }

    pub async fn ensure_available(&self) -> Result<(), LocalizeError> {
        self.provider.check_available().await.map_err(|err| {
            LocalizeError::TranslationCapabilityUnavailable {
                reason: format!("{}: {}", self.provider.name(), err),
            }
        })
    }

    /// Locales found to be unsupported so far in this run.
    pub fn unsupported_locales(&self) -> BTreeSet<String> {
        self.unsupported
            .lock()
            .map(|set| set.clone())
            .unwrap_or_default()
    }

    /// Translates `source_text` (the key itself) from the catalog's source locale.
    /// Failures are logged and returned as values.
    pub async fn translate(&self, source_text: &str, target_locale: &str) -> TranslationOutcome {
        if target_locale == self.source_locale {
            return TranslationOutcome::Translated(source_text.to_string());
        }
        if self.is_known_unsupported(target_locale) {
            return TranslationOutcome::failed(
                FailureKind::UnsupportedLocale,
                format!("language support for '{}' is not installed", target_locale),
            );
        }

        let request = TranslationRequest {
            source_locale: self.source_locale.clone(),
            target_locale: target_locale.to_string(),
            text: source_text.to_string(),
        };
        let outcome = match self.request_with_retry(request).await {
            Ok(translated) => match specifiers::verify(source_text, &translated) {
                Ok(()) => TranslationOutcome::Translated(translated),
                Err(mismatch) => {
                    TranslationOutcome::failed(FailureKind::SpecifierMismatch, mismatch.to_string())
                }
            },
            Err(ProviderError::UnsupportedLocale { locale }) => {
                self.mark_unsupported(&locale);
                TranslationOutcome::failed(
                    FailureKind::UnsupportedLocale,
                    format!("language support for '{}' is not installed", locale),
                )
            }
            Err(err) => TranslationOutcome::failed(FailureKind::Failed, err.to_string()),
        };

        if let TranslationOutcome::Failed(failure) = &outcome {
            warn!(
                "translation of '{}' into {} rejected: {}",
                source_text, target_locale, failure.reason
            );
        }
        outcome
    }

    /// One source text into many locales.
    pub async fn translate_batch(
        &self,
        source_text: &str,
        target_locales: &[String],
    ) -> BTreeMap<String, TranslationOutcome> {
        let pairs = target_locales
            .iter()
            .map(|locale| (source_text.to_string(), locale.clone()))
            .collect();
        self.translate_pairs(pairs)
            .await
            .into_iter()
            .map(|pair| (pair.locale, pair.outcome))
            .collect()
    }

    /// Many source texts into one locale.
    pub async fn translate_texts(
        &self,
        source_texts: &[String],
        target_locale: &str,
    ) -> BTreeMap<String, TranslationOutcome> {
        let pairs = source_texts
            .iter()
            .map(|text| (text.clone(), target_locale.to_string()))
            .collect();
        self.translate_pairs(pairs)
            .await
            .into_iter()
            .map(|pair| (pair.key, pair.outcome))
            .collect()
    }

    /// Translates every (key, locale) pair through the bounded pool. Results come
    /// back in completion order; callers insert them afterwards.
    pub async fn translate_pairs(&self, pairs: Vec<(String, String)>) -> Vec<PairOutcome> {
        stream::iter(pairs)
            .map(|(key, locale)| async move {
                let outcome = self.translate(&key, &locale).await;
                PairOutcome {
                    key,
                    locale,
                    outcome,
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }

    async fn request_with_retry(
        &self,
        request: TranslationRequest,
    ) -> Result<String, ProviderError> {
        let max_attempts = self.max_retries + 1;
        let mut delay = RETRY_BASE_DELAY;
        let mut attempt = 1;
        loop {
            debug!(
                "requesting {} -> {} for '{}'",
                request.source_locale, request.target_locale, request.text
            );
            match self.provider.translate(request.clone()).await {
                Ok(text) => return Ok(text),
                Err(err) if attempt < max_attempts && retry::is_transient(&err) => {
                    delay =
                        retry::wait_with_backoff(self.provider.name(), attempt, max_attempts, delay)
                            .await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn is_known_unsupported(&self, locale: &str) -> bool {
        self.unsupported
            .lock()
            .map(|set| set.contains(locale))
            .unwrap_or(false)
    }

    fn mark_unsupported(&self, locale: &str) {
        if let Ok(mut set) = self.unsupported.lock() {
            set.insert(locale.to_string());
        }
    }
}
