use crate::ConfigResult;

/// Trait for configuration validation
pub trait ConfigValidator {
    fn validate(&self) -> ConfigResult<()>;
}

/// General validation utilities
pub struct ValidationUtils;

impl ValidationUtils {
    /// Validate that a string is not empty
    pub fn validate_not_empty(value: &str, field_name: &str) -> ConfigResult<()> {
        if value.trim().is_empty() {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} cannot be empty"
            )));
        }
        Ok(())
    }

    /// Validate that a duration in milliseconds is strictly positive
    pub fn validate_positive_ms(value_ms: u64, field_name: &str) -> ConfigResult<()> {
        if value_ms == 0 {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be greater than 0"
            )));
        }
        Ok(())
    }

    /// Validate that a count is strictly positive
    pub fn validate_count(count: usize, field_name: &str) -> ConfigResult<()> {
        if count == 0 {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be greater than 0"
            )));
        }
        Ok(())
    }

    /// Validate that a probability lies in [0.0, 1.0]; NaN is rejected
    pub fn validate_ratio(ratio: f64, field_name: &str) -> ConfigResult<()> {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be within [0.0, 1.0], got {ratio}"
            )));
        }
        Ok(())
    }

    /// Validate a `host:port` collector address
    pub fn validate_host_port(address: &str, field_name: &str) -> ConfigResult<()> {
        Self::validate_not_empty(address, field_name)?;

        if address.contains("://") {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} must be host:port without a scheme, got {address}"
            )));
        }

        let (host, port) = address.rsplit_once(':').ok_or_else(|| {
            crate::ConfigError::Validation(format!(
                "{field_name} must be host:port, got {address}"
            ))
        })?;

        if host.is_empty() {
            return Err(crate::ConfigError::Validation(format!(
                "{field_name} host cannot be empty"
            )));
        }

        match port.parse::<u16>() {
            Ok(0) | Err(_) => Err(crate::ConfigError::Validation(format!(
                "{field_name} has an invalid port: {port}"
            ))),
            Ok(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_not_empty() {
        assert!(ValidationUtils::validate_not_empty("svc", "service.name").is_ok());
        assert!(ValidationUtils::validate_not_empty("   ", "service.name").is_err());
    }

    #[test]
    fn test_validate_ratio_bounds() {
        for ratio in [0.0, 0.25, 0.5, 1.0] {
            assert!(ValidationUtils::validate_ratio(ratio, "ratio").is_ok());
        }
        for ratio in [-0.01, 1.01, f64::NAN, f64::INFINITY] {
            assert!(ValidationUtils::validate_ratio(ratio, "ratio").is_err());
        }
    }

    #[test]
    fn test_validate_host_port() {
        assert!(ValidationUtils::validate_host_port("collector:4317", "endpoint").is_ok());
        assert!(ValidationUtils::validate_host_port("[::1]:4317", "endpoint").is_ok());
        assert!(ValidationUtils::validate_host_port("collector", "endpoint").is_err());
        assert!(ValidationUtils::validate_host_port(":4317", "endpoint").is_err());
        assert!(ValidationUtils::validate_host_port("collector:0", "endpoint").is_err());
        assert!(ValidationUtils::validate_host_port("collector:99999", "endpoint").is_err());
        assert!(
            ValidationUtils::validate_host_port("http://collector:4317", "endpoint").is_err()
        );
    }
}
