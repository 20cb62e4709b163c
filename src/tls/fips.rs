//! Process-wide FIPS mode
//!
//! FIPS mode is global OpenSSL state. [`ensure_fips_mode`] is idempotent:
//! asking for the mode already in effect does nothing. Requesting different
//! modes from concurrent connectors in the same process is a caller error;
//! the last applied request wins.

use super::error::TlsError;
use std::sync::Mutex;

/// Last applied mode. OpenSSL starts with FIPS disabled.
static FIPS_MODE: Mutex<bool> = Mutex::new(false);

/// Make sure OpenSSL's FIPS mode is `enabled`
pub fn ensure_fips_mode(enabled: bool) -> Result<(), TlsError> {
    let mut current = FIPS_MODE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if *current == enabled {
        return Ok(());
    }

    set_fips_mode(enabled)?;
    tracing::debug!(enabled, "FIPS mode changed");
    *current = enabled;
    Ok(())
}

/// FIPS mode as last applied through [`ensure_fips_mode`]
pub fn fips_mode() -> bool {
    *FIPS_MODE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(feature = "fips")]
fn set_fips_mode(enabled: bool) -> Result<(), TlsError> {
    openssl::fips::enable(enabled).map_err(|e| TlsError::FipsConfig {
        requested: enabled,
        reason: e.to_string(),
    })
}

#[cfg(not(feature = "fips"))]
fn set_fips_mode(enabled: bool) -> Result<(), TlsError> {
    Err(TlsError::FipsConfig {
        requested: enabled,
        reason: "FIPS mode is not supported by this build".to_string(),
    })
}
