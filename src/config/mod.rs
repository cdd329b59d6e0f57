// Configuration modules for the auth core service

pub mod rate_limit;

pub use rate_limit::{
    EmergencySettings, GlobalRateLimitSettings, MonitoringSettings, RateLimitingConfig,
};
