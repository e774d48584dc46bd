//! Custom macros for reducing code repetition in the player shim

/// Log an error and continue execution (non-fatal error handling)
///
/// # Example
/// ```
/// # use player::log_and_continue;
/// # fn stop() -> Result<(), String> { Ok(()) }
/// log_and_continue!(stop(), "stop pipeline");
/// ```
#[macro_export]
macro_rules! log_and_continue {
    ($expr:expr, $context:expr) => {
        if let Err(e) = $expr {
            log::error!("Failed to {}: {}", $context, e);
        }
    };
}

/// Validate an enum-like string value
///
/// # Example
/// ```
/// # use player::validate_enum;
/// # fn check(level: &str) -> anyhow::Result<()> {
/// validate_enum!(level, "trace", "debug", "info", "warn", "error")
/// # }
/// assert!(check("info").is_ok());
/// assert!(check("loud").is_err());
/// ```
#[macro_export]
macro_rules! validate_enum {
    ($value:expr, $($variant:expr),+) => {
        match $value {
            $($variant)|+ => Ok(()),
            _ => anyhow::bail!("Invalid value: {} (expected one of: {})", $value, [$($variant),+].join(", ")),
        }
    };
}
