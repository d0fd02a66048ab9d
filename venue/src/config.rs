//! Configuration for the venue engine and the sweeper binary.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::deadline::DeadlinePolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Largest accepted day count for any window or threshold (ten years)
pub const MAX_DAYS: u32 = 3650;

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Option length when none is given (default: 7 days)
    pub option_window_days: u32,
    /// Look-ahead for "expiring soon" listings (default: 3 days)
    pub expiring_soon_days: u32,
    /// Days before the event that payment is due (default: 7)
    pub payment_deadline_days: u32,
    /// Urgent when the deadline is this close (default: 3 days)
    pub urgent_within_days: u32,
    /// Reminder when the deadline is this close (default: 7 days)
    pub reminder_within_days: u32,
    /// Seconds between sweeps in the binary (default: 3600)
    pub sweep_interval_secs: u64,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Prometheus listener; metrics are off when unset
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            option_window_days: 7,
            expiring_soon_days: 3,
            payment_deadline_days: 7,
            urgent_within_days: 3,
            reminder_within_days: 7,
            sweep_interval_secs: 3600,
            log_level: "info".to_string(),
            metrics_addr: None,
        }
    }
}

impl VenueConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    ///
    /// Values that fail to parse are logged and replaced by the default.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            option_window_days: parse_days(&lookup, "VENUE_OPTION_WINDOW_DAYS", defaults.option_window_days),
            expiring_soon_days: parse_days(&lookup, "VENUE_EXPIRING_SOON_DAYS", defaults.expiring_soon_days),
            payment_deadline_days: parse_days(
                &lookup,
                "VENUE_PAYMENT_DEADLINE_DAYS",
                defaults.payment_deadline_days,
            ),
            urgent_within_days: parse_days(&lookup, "VENUE_URGENT_WITHIN_DAYS", defaults.urgent_within_days),
            reminder_within_days: parse_days(
                &lookup,
                "VENUE_REMINDER_WITHIN_DAYS",
                defaults.reminder_within_days,
            ),
            sweep_interval_secs: match parse_or(&lookup, "VENUE_SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs) {
                0 => {
                    tracing::warn!(
                        key = "VENUE_SWEEP_INTERVAL_SECS",
                        default = defaults.sweep_interval_secs,
                        "Sweep interval must be positive, using default"
                    );
                    defaults.sweep_interval_secs
                },
                secs => secs,
            },
            log_level: lookup("VENUE_LOG_LEVEL").unwrap_or(defaults.log_level),
            metrics_addr: lookup("VENUE_METRICS_ADDR").and_then(|raw| match raw.parse() {
                Ok(addr) => Some(addr),
                Err(error) => {
                    tracing::warn!(key = "VENUE_METRICS_ADDR", value = %raw, %error, "Invalid value, metrics disabled");
                    None
                },
            }),
        }
    }

    /// Payment deadline thresholds as a policy
    #[must_use]
    pub const fn deadline_policy(&self) -> DeadlinePolicy {
        DeadlinePolicy {
            deadline_days: self.payment_deadline_days,
            urgent_within_days: self.urgent_within_days,
            reminder_within_days: self.reminder_within_days,
        }
    }

    /// Interval between sweeps
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|error| {
            tracing::warn!(key, value = %raw, %error, %default, "Invalid value, using default");
            default
        }),
    }
}

fn parse_days(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u32) -> u32 {
    let days = parse_or(lookup, key, default);
    if days > MAX_DAYS {
        tracing::warn!(key, days, max = MAX_DAYS, %default, "Day count out of range, using default");
        return default;
    }
    days
}
