//! Parse-time configuration.

use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::error::{ErrorResolver, RawIssue};
use crate::locale::{English, MessageCatalog};

/// Message-resolution configuration.
///
/// The process keeps an application-lifetime default ([`Config::global`]);
/// callers that need another catalog pass one explicitly through
/// [`ParseContext::with_config`].
#[derive(Clone)]
pub struct Config {
    catalog: Arc<dyn MessageCatalog>,
}

impl Config {
    pub fn new(catalog: impl MessageCatalog + 'static) -> Self {
        Self {
            catalog: Arc::new(catalog),
        }
    }

    /// The default configuration (English messages).
    pub fn global() -> &'static Config {
        static GLOBAL: LazyLock<Config> = LazyLock::new(Config::default);
        &GLOBAL
    }

    pub fn catalog(&self) -> &dyn MessageCatalog {
        self.catalog.as_ref()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(English)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("catalog", &self.catalog.name())
            .finish()
    }
}

/// Options for a single parse call.
#[derive(Clone, Default)]
pub struct ParseContext {
    error_resolver: Option<ErrorResolver>,
    report_input: bool,
    config: Option<Arc<Config>>,
}

impl ParseContext {
    /// Create a context with no resolver, input reporting off and the global
    /// configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve messages with `resolver` before schema-level resolvers.
    pub fn with_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&RawIssue) -> Option<String> + Send + Sync + 'static,
    {
        self.error_resolver = Some(Arc::new(resolver));
        self
    }

    /// Echo the offending input in each issue.
    pub fn report_input(mut self, report: bool) -> Self {
        self.report_input = report;
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(Arc::new(config));
        self
    }

    pub fn error_resolver(&self) -> Option<&ErrorResolver> {
        self.error_resolver.as_ref()
    }

    pub fn reports_input(&self) -> bool {
        self.report_input
    }

    pub fn config(&self) -> &Config {
        self.config.as_deref().unwrap_or_else(|| Config::global())
    }
}

impl fmt::Debug for ParseContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseContext")
            .field("error_resolver", &self.error_resolver.is_some())
            .field("report_input", &self.report_input)
            .field("config", &self.config)
            .finish()
    }
}
