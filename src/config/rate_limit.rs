// Centralized rate limiting configuration: per-endpoint token-bucket rules
// for the auth core's own HTTP surface (auth + session management).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::services::rate_limit::RateLimitConfig;

/// Global rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Default configuration for unspecified endpoints
    pub default: RateLimitConfig,

    /// Endpoint-specific configurations, keyed by `"METHOD /canonical/path"`
    /// (see `services::rate_limit::endpoint_key`)
    pub endpoints: HashMap<String, RateLimitConfig>,

    /// Global settings
    pub global: GlobalRateLimitSettings,
}

/// Global rate limiting settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalRateLimitSettings {
    /// Enable distributed rate limiting across instances
    pub distributed: bool,

    /// Default block duration when no specific duration is set
    pub default_block_duration: u32,

    /// Performance monitoring settings
    pub monitoring: MonitoringSettings,

    /// Emergency settings
    pub emergency: EmergencySettings,
}

/// Monitoring configuration for rate limiting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringSettings {
    /// Enable performance metrics collection
    pub enable_metrics: bool,

    /// Latency warning threshold in milliseconds
    pub latency_warning_threshold_ms: u64,

    /// Enable analytics event collection
    pub enable_analytics: bool,

    /// Sample rate for analytics (0.0 to 1.0)
    pub analytics_sample_rate: f64,
}

/// Emergency rate limiting settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencySettings {
    /// Emergency rate limit (overrides all other limits)
    pub emergency_limit: Option<u32>,

    /// Emergency limit window in seconds
    pub emergency_window: u32,

    /// Whitelist of IP addresses that bypass rate limits
    pub whitelist_ips: Vec<String>,

    /// Blacklist of IP addresses with permanent blocks
    pub blacklist_ips: Vec<String>,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        let mut endpoints = HashMap::new();

        // Authentication endpoints
        endpoints.insert(
            "POST /v1/auth/login".to_string(),
            RateLimitConfig::auth_endpoint(),
        );
        endpoints.insert(
            "POST /v1/auth/register".to_string(),
            RateLimitConfig {
                max_requests: 3,
                window_seconds: 3600, // 1 hour
                burst_limit: None,
                block_duration: 3600,
                distributed: true,
            },
        );
        endpoints.insert(
            "POST /v1/auth/refresh".to_string(),
            RateLimitConfig {
                max_requests: 10,
                window_seconds: 300, // 5 minutes
                burst_limit: Some(3),
                block_duration: 300,
                distributed: true,
            },
        );
        endpoints.insert(
            "POST /v1/auth/forgot-password".to_string(),
            RateLimitConfig {
                max_requests: 3,
                window_seconds: 3600,
                burst_limit: None,
                block_duration: 3600,
                distributed: true,
            },
        );

        // Session management endpoints (§4.8): list 10/min, revoke 20/min,
        // revoke_others 5/h, revoke_all 3/h.
        endpoints.insert(
            "GET /v1/sessions/".to_string(),
            crate::services::session_api::SessionManagementService::list_rate_limit(),
        );
        endpoints.insert(
            "DELETE /v1/sessions/{id}".to_string(),
            crate::services::session_api::SessionManagementService::revoke_rate_limit(),
        );
        endpoints.insert(
            "POST /v1/sessions/revoke-others".to_string(),
            crate::services::session_api::SessionManagementService::revoke_others_rate_limit(),
        );
        endpoints.insert(
            "POST /v1/sessions/revoke-all".to_string(),
            crate::services::session_api::SessionManagementService::revoke_all_rate_limit(),
        );

        // Health check endpoint - effectively unlimited, never gated per §6
        endpoints.insert(
            "GET /v1/health".to_string(),
            RateLimitConfig {
                max_requests: 1_000_000,
                window_seconds: 60,
                burst_limit: None,
                block_duration: 0,
                distributed: false,
            },
        );

        let default = RateLimitConfig::default_api();

        let global = GlobalRateLimitSettings {
            distributed: true,
            default_block_duration: 300,
            monitoring: MonitoringSettings {
                enable_metrics: true,
                latency_warning_threshold_ms: 5,
                enable_analytics: true,
                analytics_sample_rate: 1.0,
            },
            emergency: EmergencySettings {
                emergency_limit: None,
                emergency_window: 60,
                whitelist_ips: vec!["127.0.0.1".to_string(), "::1".to_string()],
                blacklist_ips: vec![],
            },
        };

        Self {
            default,
            endpoints,
            global,
        }
    }
}

impl RateLimitingConfig {
    /// Load configuration. No per-deployment overrides are read from the
    /// environment yet; the defaults encode the spec's literal per-endpoint
    /// figures directly.
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Get configuration for a specific endpoint key (see
    /// `services::rate_limit::endpoint_key`), falling back to the default
    /// rule for endpoints with no configured entry.
    pub fn get_endpoint_config(&self, endpoint: &str) -> &RateLimitConfig {
        self.endpoints.get(endpoint).unwrap_or(&self.default)
    }

    /// Check if an IP address is whitelisted (bypasses rate limiting entirely)
    pub fn is_whitelisted_ip(&self, ip: &str) -> bool {
        self.global
            .emergency
            .whitelist_ips
            .contains(&ip.to_string())
    }

    /// Check if an IP address is blacklisted (permanently blocked)
    pub fn is_blacklisted_ip(&self, ip: &str) -> bool {
        self.global
            .emergency
            .blacklist_ips
            .contains(&ip.to_string())
    }

    /// Get emergency rate limit if active
    pub fn get_emergency_limit(&self) -> Option<u32> {
        self.global.emergency.emergency_limit
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.default.max_requests == 0 {
            return Err("Default max_requests cannot be zero".to_string());
        }

        if self.default.window_seconds == 0 {
            return Err("Default window_seconds cannot be zero".to_string());
        }

        for (endpoint, config) in &self.endpoints {
            if config.max_requests == 0 && config.burst_limit.is_none() {
                return Err(format!("Endpoint {} max_requests cannot be zero", endpoint));
            }

            if config.window_seconds == 0 {
                return Err(format!(
                    "Endpoint {} window_seconds cannot be zero",
                    endpoint
                ));
            }

            if let Some(burst) = config.burst_limit {
                if burst == 0 {
                    return Err(format!("Endpoint {} burst_limit cannot be zero", endpoint));
                }
            }
        }

        if self.global.monitoring.analytics_sample_rate < 0.0
            || self.global.monitoring.analytics_sample_rate > 1.0
        {
            return Err("Analytics sample rate must be between 0.0 and 1.0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration() {
        let config = RateLimitingConfig::default();

        assert!(config.endpoints.contains_key("POST /v1/auth/login"));
        assert!(config.endpoints.contains_key("GET /v1/sessions/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoint_config_lookup() {
        let config = RateLimitingConfig::default();

        let login_config = config.get_endpoint_config("POST /v1/auth/login");
        assert_eq!(login_config.max_requests, 5);

        let revoke_all_config = config.get_endpoint_config("POST /v1/sessions/revoke-all");
        assert_eq!(revoke_all_config.max_requests, 3);
        assert_eq!(revoke_all_config.window_seconds, 3600);

        let unknown_config = config.get_endpoint_config("GET /v1/unknown");
        assert_eq!(unknown_config.max_requests, 1000);
    }

    #[test]
    fn test_ip_whitelist_blacklist() {
        let config = RateLimitingConfig::default();

        assert!(config.is_whitelisted_ip("127.0.0.1"));
        assert!(config.is_whitelisted_ip("::1"));
        assert!(!config.is_whitelisted_ip("192.168.1.1"));
        assert!(!config.is_blacklisted_ip("127.0.0.1"));
    }

    #[test]
    fn test_configuration_validation() {
        let mut config = RateLimitingConfig::default();
        assert!(config.validate().is_ok());

        config.global.monitoring.analytics_sample_rate = 1.5;
        assert!(config.validate().is_err());

        config.global.monitoring.analytics_sample_rate = 0.5;
        assert!(config.validate().is_ok());

        config.endpoints.insert(
            "GET /test".to_string(),
            RateLimitConfig {
                max_requests: 0,
                window_seconds: 60,
                burst_limit: None,
                block_duration: 30,
                distributed: true,
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn session_endpoint_rules_match_spec_tiers() {
        let config = RateLimitingConfig::default();

        assert_eq!(config.get_endpoint_config("GET /v1/sessions/").max_requests, 10);
        assert_eq!(
            config.get_endpoint_config("DELETE /v1/sessions/{id}").max_requests,
            20
        );
        assert_eq!(
            config
                .get_endpoint_config("POST /v1/sessions/revoke-others")
                .max_requests,
            5
        );
    }
}
