//! Environment-driven configuration for the HTTP collaborators.

use std::env;
use std::time::Duration;

use chrono_tz::Tz;
use tracing::warn;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Endpoint of the slot-availability query service.
    pub availability_api_url: String,
    /// Base URL of the declarations/appointments service.
    pub schedule_api_url: String,
    pub api_key: Option<String>,
    /// Clinic timezone used for local day boundaries and wall-clock ranges.
    pub timezone: Tz,
    /// Transport timeout; the engine enforces none of its own.
    pub request_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            availability_api_url: String::new(),
            schedule_api_url: String::new(),
            api_key: None,
            timezone: Tz::UTC,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let availability_api_url = env::var("AVAILABILITY_API_URL").unwrap_or_else(|_| {
            warn!("AVAILABILITY_API_URL not set, using empty value");
            String::new()
        });
        let schedule_api_url = env::var("SCHEDULE_API_URL").unwrap_or_else(|_| {
            warn!("SCHEDULE_API_URL not set, using empty value");
            String::new()
        });
        let api_key = env::var("AVAILABILITY_API_KEY").ok().filter(|k| !k.is_empty());

        let timezone = match env::var("CLINIC_TIMEZONE") {
            Ok(name) => name.parse::<Tz>().unwrap_or_else(|_| {
                warn!("CLINIC_TIMEZONE '{}' is not an IANA timezone, using UTC", name);
                Tz::UTC
            }),
            Err(_) => Tz::UTC,
        };

        let request_timeout = env::var("AVAILABILITY_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| match raw.parse::<u64>() {
                Ok(secs) => Some(secs),
                Err(_) => {
                    warn!("AVAILABILITY_REQUEST_TIMEOUT_SECS '{}' is not a number, using default", raw);
                    None
                }
            })
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        let config = Self {
            availability_api_url,
            schedule_api_url,
            api_key,
            timezone,
            request_timeout,
        };

        if !config.is_configured() {
            warn!("Availability engine not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.availability_api_url.is_empty() && !self.schedule_api_url.is_empty()
    }
}
