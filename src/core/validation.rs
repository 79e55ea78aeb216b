//! Whole-value validation for live settings.

use crate::error::ValidationError;

/// Rules that span several settings fields.
///
/// Field setters only check that a single value parses. An update cycle whose
/// result fails [`validate`](Self::validate) is rejected and the previous
/// settings stay in place.
///
/// ```rust
/// use hotswap_settings::core::Validate;
/// use hotswap_settings::error::ValidationError;
///
/// #[derive(Debug, Clone)]
/// struct RetrySettings {
///     base_delay_ms: u64,
///     max_delay_ms: u64,
/// }
///
/// impl Validate for RetrySettings {
///     fn validate(&self) -> Result<(), ValidationError> {
///         if self.base_delay_ms > self.max_delay_ms {
///             return Err(ValidationError::custom(
///                 "base_delay_ms must not exceed max_delay_ms",
///             ));
///         }
///         Ok(())
///     }
/// }
///
/// let retry = RetrySettings { base_delay_ms: 500, max_delay_ms: 100 };
/// assert!(retry.validate().is_err());
/// ```
pub trait Validate {
    /// Check the settings as a whole.
    ///
    /// # Errors
    ///
    /// Returns the rule that the settings break.
    fn validate(&self) -> Result<(), ValidationError>;
}
