//! Configuration validation.
//!
//! Checks every section up front so a bad file fails before any store is opened.

use crate::domain::clock::IntradayClock;
use crate::domain::error::FetchError;
use crate::domain::universe::parse_sids;
use crate::ports::config_port::ConfigPort;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), FetchError> {
    validate_delay(config)?;
    validate_pool_size(config)?;
    validate_slots(config)?;
    validate_universe(config)?;
    Ok(())
}

fn validate_delay(config: &dyn ConfigPort) -> Result<(), FetchError> {
    let value = config.get_int("fetch", "delay", 1);
    if value < 0 {
        return Err(FetchError::ConfigInvalid {
            section: "fetch".to_string(),
            key: "delay".to_string(),
            reason: "delay must be non-negative".to_string(),
        });
    }
    Ok(())
}

fn validate_pool_size(config: &dyn ConfigPort) -> Result<(), FetchError> {
    let value = config.get_int("sqlite", "pool_size", 4);
    if value <= 0 {
        return Err(FetchError::ConfigInvalid {
            section: "sqlite".to_string(),
            key: "pool_size".to_string(),
            reason: "pool_size must be positive".to_string(),
        });
    }
    Ok(())
}

fn validate_slots(config: &dyn ConfigPort) -> Result<(), FetchError> {
    let Some(slots) = config.get_string("intraday", "slots") else {
        return Ok(());
    };
    IntradayClock::parse(&slots).map_err(|e| FetchError::ConfigInvalid {
        section: "intraday".to_string(),
        key: "slots".to_string(),
        reason: e.to_string(),
    })?;
    Ok(())
}

/// Either an inline `sids` list or a stored universe named by
/// `collection`, `dname` and `date`.
fn validate_universe(config: &dyn ConfigPort) -> Result<(), FetchError> {
    if let Some(sids) = config.get_string("universe", "sids") {
        parse_sids(&sids)?;
        return Ok(());
    }
    if config.get_string("universe", "collection").is_some() {
        for key in ["dname", "date"] {
            if config.get_string("universe", key).is_none() {
                return Err(FetchError::ConfigMissing {
                    section: "universe".to_string(),
                    key: key.to_string(),
                });
            }
        }
    }
    Ok(())
}
