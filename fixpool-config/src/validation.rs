//! Custom validation functions for configuration.

use validator::ValidationError;

use crate::pools::PoolLayoutConfig;

/// Pools must be listed in non-decreasing element size so that the first
/// pool that fits a request is also the smallest one.
pub fn validate_pool_order(pools: &[PoolLayoutConfig]) -> Result<(), ValidationError> {
    if pools
        .windows(2)
        .all(|pair| pair[0].element_size <= pair[1].element_size)
    {
        Ok(())
    } else {
        Err(ValidationError::new("pools_not_ordered_by_size"))
    }
}

/// Validate a `tracing` level or `EnvFilter` directive head.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let head = level.split(',').next().unwrap_or_default();
    let valid = ["trace", "debug", "info", "warn", "error", "off"]
        .contains(&head.to_lowercase().as_str())
        || head.contains('=');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}

/// Validate that a given value is a power of two.
pub fn validate_power_of_two(value: &usize) -> Result<(), ValidationError> {
    if value.is_power_of_two() {
        Ok(())
    } else {
        Err(ValidationError::new("must_be_power_of_two"))
    }
}

/// By-value adapter for the `Validate` derive, which passes `Copy` fields by value.
pub(crate) fn validate_power_of_two_value(value: usize) -> Result<(), ValidationError> {
    validate_power_of_two(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_order() {
        let pools = |sizes: &[usize]| -> Vec<PoolLayoutConfig> {
            sizes
                .iter()
                .map(|&element_size| PoolLayoutConfig {
                    element_size,
                    element_count: 1,
                })
                .collect()
        };
        assert!(validate_pool_order(&pools(&[16, 16, 64])).is_ok());
        assert!(validate_pool_order(&pools(&[])).is_ok());
        assert!(validate_pool_order(&pools(&[64, 16])).is_err());
    }

    #[test]
    fn log_levels() {
        assert!(validate_log_level("info").is_ok());
        assert!(validate_log_level("DEBUG").is_ok());
        assert!(validate_log_level("fixpool_core=trace,info").is_ok());
        assert!(validate_log_level("loud").is_err());
    }

    #[test]
    fn power_of_two() {
        assert!(validate_power_of_two(&16).is_ok());
        assert!(validate_power_of_two(&24).is_err());
    }
}
