use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

mod command;
pub(crate) mod retry;

pub use command::CommandProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub source_locale: String,
    pub target_locale: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("language support for '{locale}' is not installed")]
    UnsupportedLocale { locale: String },
    #[error("translation timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("{0}")]
    Failed(String),
}

pub type ProviderFuture<T> = Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send>>;

/// A local translation capability. Implementations only have to honour the
/// success/failure contract; classification and specifier checks happen in
/// [`crate::TranslationService`].
pub trait Provider: Clone + Send + Sync + 'static {
    fn name(&self) -> &str;
    fn check_available(&self) -> ProviderFuture<()>;
    fn translate(&self, request: TranslationRequest) -> ProviderFuture<String>;
}
