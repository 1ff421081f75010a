use crate::core::AppConfig;
use crate::relay::Relay;

pub struct AppState {
    pub relay: Relay,
    // Reused for proxying the model catalog
    pub http: reqwest::Client,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(relay: Relay, config: AppConfig) -> Self {
        Self {
            relay,
            http: reqwest::Client::new(),
            config,
        }
    }
}
