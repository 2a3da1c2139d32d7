use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use crate::providers::{Provider, ProviderError, ProviderFuture, TranslationRequest};

/// Deterministic in-process provider: `"<text> [<locale>]"`, which keeps every
/// format specifier of the source intact.
#[derive(Debug, Clone, Default)]
pub(crate) struct StubProvider {
    available: bool,
    unsupported: BTreeSet<String>,
    responses: BTreeMap<(String, String), Result<String, String>>,
    requests: Arc<Mutex<Vec<TranslationRequest>>>,
}

impl StubProvider {
    pub(crate) fn new() -> Self {
        Self {
            available: true,
            ..Self::default()
        }
    }

    pub(crate) fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub(crate) fn with_unsupported(mut self, locale: &str) -> Self {
        self.unsupported.insert(locale.to_string());
        self
    }

    pub(crate) fn with_response(mut self, text: &str, locale: &str, response: &str) -> Self {
        self.responses.insert(
            (text.to_string(), locale.to_string()),
            Ok(response.to_string()),
        );
        self
    }

    pub(crate) fn with_failure(mut self, text: &str, locale: &str) -> Self {
        self.responses.insert(
            (text.to_string(), locale.to_string()),
            Err("bridge crashed".to_string()),
        );
        self
    }

    pub(crate) fn requests(&self) -> Vec<TranslationRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl Provider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    fn check_available(&self) -> ProviderFuture<()> {
        let available = self.available;
        Box::pin(async move {
            if available {
                Ok(())
            } else {
                Err(ProviderError::Failed("translation framework missing".to_string()))
            }
        })
    }

    fn translate(&self, request: TranslationRequest) -> ProviderFuture<String> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        let result = if self.unsupported.contains(&request.target_locale) {
            Err(ProviderError::UnsupportedLocale {
                locale: request.target_locale.clone(),
            })
        } else {
            match self
                .responses
                .get(&(request.text.clone(), request.target_locale.clone()))
            {
                Some(Ok(response)) => Ok(response.clone()),
                Some(Err(message)) => Err(ProviderError::Failed(message.clone())),
                None => Ok(format!("{} [{}]", request.text, request.target_locale)),
            }
        };
        Box::pin(async move { result })
    }
}
