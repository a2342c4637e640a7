use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_env: String,
    pub log_level: String,
    /// `memory` for local runs and tests, `fcm` for the real transport.
    pub push_backend: String,
    pub fcm_endpoint: String,
    pub fcm_project_id: String,
    pub fcm_access_token: String,
    /// Local hour at which the daily legacy-token sweep runs.
    pub sweep_hour: u8,
    pub sweep_utc_offset_hours: i8,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let cfg = config::Config::builder()
            .set_default("app_env", "development")?
            .set_default("log_level", "info")?
            .set_default("push_backend", "memory")?
            .set_default("fcm_endpoint", "https://fcm.googleapis.com")?
            .set_default("fcm_project_id", "")?
            .set_default("fcm_access_token", "")?
            .set_default("sweep_hour", 2)?
            .set_default("sweep_utc_offset_hours", 6)?
            .add_source(config::Environment::default().separator("__"))
            .build()?;
        cfg.try_deserialize()
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }
}
