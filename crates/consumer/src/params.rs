//! Consumer module parameters

use ccv_types::CONSUMER_PORT_ID;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Four weeks
pub const DEFAULT_CCV_TIMEOUT_PERIOD_SECS: u64 = 4 * 7 * 24 * 60 * 60;

/// One hour
pub const DEFAULT_RETRY_DELAY_PERIOD_SECS: u64 = 60 * 60;

/// Three weeks
pub const DEFAULT_UNBONDING_PERIOD_SECS: u64 = 21 * 24 * 60 * 60;

/// Longest period any parameter may hold (one hundred years)
pub const MAX_PERIOD_SECS: u64 = 100 * 365 * 24 * 60 * 60;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamsError {
    #[error("{name} must be at most {max} seconds, got {value}")]
    PeriodOutOfRange {
        name: &'static str,
        value: u64,
        max: u64,
    },

    #[error("ccv_timeout_period_secs must be positive")]
    ZeroTimeout,

    #[error("consumer_port must not be empty")]
    EmptyConsumerPort,
}

/// Consumer parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerParams {
    /// Timeout applied to every packet sent to the provider
    pub ccv_timeout_period_secs: u64,
    /// Wait after a bounced slash packet before it is resent
    pub retry_delay_period_secs: u64,
    /// Time after which a received VSC is considered matured
    pub unbonding_period_secs: u64,
    /// Local port for the provider channel
    pub consumer_port: String,
}

impl ConsumerParams {
    /// Check every field is usable before handing the params to a keeper
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.ccv_timeout_period_secs == 0 {
            return Err(ParamsError::ZeroTimeout);
        }
        self.ccv_timeout_period()?;
        self.retry_delay_period()?;
        self.unbonding_period()?;
        if self.consumer_port.is_empty() {
            return Err(ParamsError::EmptyConsumerPort);
        }
        Ok(())
    }

    pub fn ccv_timeout_period(&self) -> Result<Duration, ParamsError> {
        period("ccv_timeout_period_secs", self.ccv_timeout_period_secs)
    }

    pub fn retry_delay_period(&self) -> Result<Duration, ParamsError> {
        period("retry_delay_period_secs", self.retry_delay_period_secs)
    }

    pub fn unbonding_period(&self) -> Result<Duration, ParamsError> {
        period("unbonding_period_secs", self.unbonding_period_secs)
    }
}

fn period(name: &'static str, secs: u64) -> Result<Duration, ParamsError> {
    let out_of_range = ParamsError::PeriodOutOfRange {
        name,
        value: secs,
        max: MAX_PERIOD_SECS,
    };
    if secs > MAX_PERIOD_SECS {
        return Err(out_of_range);
    }
    Duration::try_seconds(secs as i64).ok_or(out_of_range)
}

impl Default for ConsumerParams {
    fn default() -> Self {
        Self {
            ccv_timeout_period_secs: DEFAULT_CCV_TIMEOUT_PERIOD_SECS,
            retry_delay_period_secs: DEFAULT_RETRY_DELAY_PERIOD_SECS,
            unbonding_period_secs: DEFAULT_UNBONDING_PERIOD_SECS,
            consumer_port: CONSUMER_PORT_ID.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = ConsumerParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.retry_delay_period().unwrap(), Duration::hours(1));
    }

    #[test]
    fn test_huge_period_rejected() {
        let params = ConsumerParams {
            ccv_timeout_period_secs: 10_000_000_000_000_000,
            ..ConsumerParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ParamsError::PeriodOutOfRange {
                name: "ccv_timeout_period_secs",
                ..
            })
        ));
        assert!(params.ccv_timeout_period().is_err());

        let params = ConsumerParams {
            unbonding_period_secs: u64::MAX,
            ..ConsumerParams::default()
        };
        assert!(params.unbonding_period().is_err());
    }

    #[test]
    fn test_zero_timeout_and_empty_port_rejected() {
        let params = ConsumerParams {
            ccv_timeout_period_secs: 0,
            ..ConsumerParams::default()
        };
        assert_eq!(params.validate(), Err(ParamsError::ZeroTimeout));

        let params = ConsumerParams {
            consumer_port: String::new(),
            ..ConsumerParams::default()
        };
        assert_eq!(params.validate(), Err(ParamsError::EmptyConsumerPort));
    }
}
