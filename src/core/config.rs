use std::env;

pub const DEFAULT_GEMINI_API_HOST: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_MODEL_CATALOG_URL: &str = "http://localhost:8000/api/models";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_api_hostname: String,
    pub default_model: String,
    pub model_catalog_url: String,
}

// Blank values are treated the same as unset ones
fn non_blank(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Default for AppConfig {
    fn default() -> Self {
        // The credential is optional at startup. Requests are rejected
        // until it is set.
        let gemini_api_key =
            non_blank("GOOGLE_GEMINI_API_KEY").or_else(|| non_blank("GEMINI_API_KEY"));
        let gemini_api_hostname =
            non_blank("ARIA_GEMINI_API_HOST").unwrap_or_else(|| DEFAULT_GEMINI_API_HOST.to_string());
        let default_model =
            non_blank("ARIA_DEFAULT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let model_catalog_url = non_blank("ARIA_MODEL_CATALOG_URL")
            .unwrap_or_else(|| DEFAULT_MODEL_CATALOG_URL.to_string());

        Self {
            gemini_api_key,
            gemini_api_hostname,
            default_model,
            model_catalog_url,
        }
    }
}
