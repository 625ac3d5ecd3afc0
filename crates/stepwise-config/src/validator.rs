//! Configuration validation.

use crate::schema::{Config, EvictionMode};

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_runner(config, &mut result);
        Self::validate_retry(config, &mut result);
        Self::validate_breaker(config, &mut result);
        Self::validate_compaction(config, &mut result);
        Self::validate_provider(config, &mut result);

        result
    }

    fn validate_runner(config: &Config, result: &mut ValidationResult) {
        let runner = &config.runner;
        if runner.max_attempts == 0 {
            result.add_error(ValidationError::new(
                "runner.max_attempts",
                "max_attempts must be greater than 0",
            ));
        }
        if runner.step_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "runner.step_timeout_secs",
                "step_timeout_secs must be greater than 0",
            ));
        }
        if runner.sentinel.trim().is_empty() {
            result.add_error(ValidationError::new(
                "runner.sentinel",
                "Sentinel marker cannot be empty",
            ));
        }
        if runner.compaction_interval < 1 {
            result.add_error(ValidationError::new(
                "runner.compaction_interval",
                "compaction_interval must be at least 1",
            ));
        }
    }

    fn validate_retry(config: &Config, result: &mut ValidationResult) {
        let retry = &config.retry;
        if retry.backoff_multiplier < 1.0 {
            result.add_error(ValidationError::new(
                "retry.backoff_multiplier",
                "backoff_multiplier must be at least 1.0",
            ));
        }
        if retry.max_delay_ms < retry.base_delay_ms {
            result.add_warning(ValidationWarning::new(
                "retry.max_delay_ms",
                "max_delay_ms is below base_delay_ms, every delay will be capped",
            ));
        }
    }

    fn validate_breaker(config: &Config, result: &mut ValidationResult) {
        if config.breaker.failure_threshold == 0 {
            result.add_error(ValidationError::new(
                "breaker.failure_threshold",
                "failure_threshold must be greater than 0",
            ));
        }
        if config.breaker.recovery_timeout_secs == 0 {
            result.add_warning(ValidationWarning::new(
                "breaker.recovery_timeout_secs",
                "recovery_timeout_secs is 0, an open breaker recovers immediately",
            ));
        }
    }

    fn validate_compaction(config: &Config, result: &mut ValidationResult) {
        let compaction = &config.compaction;
        if compaction.window == 0 {
            result.add_error(ValidationError::new(
                "compaction.window",
                "window must be greater than 0",
            ));
        }
        if compaction.eviction == EvictionMode::Summarize && compaction.summary_max_chars == 0 {
            result.add_error(ValidationError::new(
                "compaction.summary_max_chars",
                "summary_max_chars must be greater than 0 when summarizing",
            ));
        }
    }

    fn validate_provider(config: &Config, result: &mut ValidationResult) {
        match &config.provider.endpoint {
            None => {
                result.add_warning(ValidationWarning::new(
                    "provider.endpoint",
                    "No inference endpoint configured, `run` will fail",
                ));
            }
            Some(url) => {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    result.add_error(ValidationError::new(
                        "provider.endpoint",
                        "endpoint must start with http:// or https://",
                    ));
                }
            }
        }
        if config.provider.timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "provider.timeout_secs",
                "timeout_secs must be greater than 0",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
