//! Error types for the RIPE Atlas provider.

use thiserror::Error;

use crate::atlas::AtlasError;
use crate::schema::Diagnostic;

/// Errors that terminate a provider operation.
///
/// Every variant is reported to the host as a single error diagnostic, see
/// [`ProviderError::to_diagnostic`].
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider is missing configuration it needs.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The operation or input is not supported by this provider.
    #[error("{summary}: {detail}")]
    Unsupported {
        /// Short summary shown to the user.
        summary: String,
        /// Longer explanation.
        detail: String,
    },

    /// A call to the RIPE Atlas API failed.
    #[error("{context}: {source}")]
    Upstream {
        /// What the provider was trying to do.
        context: String,
        /// The API error, passed through verbatim.
        #[source]
        source: AtlasError,
    },

    /// The state lacks the measurement identifier the operation needs.
    #[error("No ID Retrieved: {0}")]
    MissingIdentifier(String),

    /// The state handed to an operation has no measurement id.
    #[error("Missing measurement id: {0}")]
    MissingMeasurementId(String),

    /// An import identifier could not be parsed.
    #[error("Error importing item: {0}")]
    InvalidImportId(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A state or configuration document did not match its model.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProviderError {
    /// Build an [`ProviderError::Unsupported`] error.
    pub fn unsupported(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Unsupported {
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    /// Wrap an API error with what the provider was doing when it happened.
    pub fn upstream(context: impl Into<String>, source: AtlasError) -> Self {
        Self::Upstream {
            context: context.into(),
            source,
        }
    }

    /// Get the error message without its category prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Configuration(msg)
            | Self::MissingIdentifier(msg)
            | Self::MissingMeasurementId(msg)
            | Self::InvalidImportId(msg)
            | Self::UnknownResource(msg)
            | Self::Validation(msg) => msg.clone(),
            Self::Unsupported { detail, .. } => detail.clone(),
            Self::Upstream { source, .. } => source.to_string(),
            Self::Serialization(err) => err.to_string(),
        }
    }

    /// The host-visible diagnostic for this error.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let summary = match self {
            Self::Configuration(_) => "Provider configuration error",
            Self::Unsupported { summary, .. } => summary.as_str(),
            Self::Upstream { context, .. } => context.as_str(),
            Self::MissingIdentifier(_) => "No ID Retrieved",
            Self::MissingMeasurementId(_) => "Missing measurement id",
            Self::InvalidImportId(_) => "Error importing item",
            Self::UnknownResource(_) => "Unknown resource type",
            Self::Validation(_) => "Invalid configuration",
            Self::Serialization(_) => "Invalid state document",
        };
        Diagnostic::error(summary).with_detail(self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DiagnosticSeverity;

    fn api_error(status: u16) -> AtlasError {
        AtlasError::Api {
            status,
            detail: "boom".to_string(),
        }
    }

    #[test]
    fn test_error_display() {
        let err = ProviderError::Configuration("provider is not configured".to_string());
        assert_eq!(
            format!("{}", err),
            "Configuration error: provider is not configured"
        );

        let err = ProviderError::unsupported(
            "Update not supported!",
            "Update is currently not supported!",
        );
        assert_eq!(
            format!("{}", err),
            "Update not supported!: Update is currently not supported!"
        );

        let err = ProviderError::upstream("Unable to get credits from RIPE Atlas", api_error(500));
        assert_eq!(
            format!("{}", err),
            "Unable to get credits from RIPE Atlas: RIPE Atlas API returned 500: boom"
        );
    }

    #[test]
    fn test_upstream_diagnostic_passes_error_through() {
        let err =
            ProviderError::upstream("Unable to get measurement from RIPE Atlas", api_error(502));
        let diag = err.to_diagnostic();

        assert_eq!(diag.severity, DiagnosticSeverity::Error);
        assert_eq!(diag.summary, "Unable to get measurement from RIPE Atlas");
        assert_eq!(
            diag.detail,
            Some("RIPE Atlas API returned 502: boom".to_string())
        );
    }

    #[test]
    fn test_import_diagnostic() {
        let err = ProviderError::InvalidImportId("ID should be an integer".to_string());
        let diag = err.to_diagnostic();
        assert_eq!(diag.summary, "Error importing item");
        assert_eq!(diag.detail, Some("ID should be an integer".to_string()));
    }

    #[test]
    fn test_missing_id_summaries() {
        let created = ProviderError::MissingIdentifier("none returned".to_string());
        assert_eq!(created.to_diagnostic().summary, "No ID Retrieved");

        let deleted = ProviderError::MissingMeasurementId("state has no id".to_string());
        let diag = deleted.to_diagnostic();
        assert_eq!(diag.summary, "Missing measurement id");
        assert_eq!(diag.detail.as_deref(), Some("state has no id"));
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::MissingIdentifier("no id".to_string());
        assert_eq!(err.message(), "no id");

        let err = ProviderError::unsupported("Type Error", "Measurement type dns not supported!");
        assert_eq!(err.message(), "Measurement type dns not supported!");
    }
}
