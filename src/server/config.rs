use super::RequestsLoggingLevel;
use crate::config::AppConfig;
use crate::library::PageLimit;

#[derive(Clone)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    pub frontend_dir_path: Option<String>,
    /// Marks session cookies `Secure`. Disable only for plain-HTTP development.
    pub secure_cookies: bool,
    pub currency: String,
    /// Default limit of the streamed appraisal when the client sends none.
    pub stream_page_limit: PageLimit,
    /// Default limit of the saved-albums listing when the client sends none.
    pub list_page_limit: PageLimit,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 8888,
            frontend_dir_path: None,
            secure_cookies: true,
            currency: "EUR".to_string(),
            stream_page_limit: PageLimit::Unbounded,
            list_page_limit: PageLimit::Limited(50),
        }
    }
}

impl From<&AppConfig> for ServerConfig {
    fn from(config: &AppConfig) -> Self {
        ServerConfig {
            requests_logging_level: config.logging_level.clone(),
            port: config.port,
            frontend_dir_path: config.frontend_dir_path.clone(),
            secure_cookies: config.secure_cookies,
            currency: config.appraisal.currency.clone(),
            stream_page_limit: config.appraisal.stream_page_limit,
            list_page_limit: config.appraisal.list_page_limit,
        }
    }
}
