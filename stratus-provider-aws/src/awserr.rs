//! Matching AWS service errors by code and message

use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use stratus_core::provider::ProviderError;
use stratus_core::resource::ResourceId;

/// Error code of a modeled service error, if the call reached the service
pub fn error_code<E, R>(err: &SdkError<E, R>) -> Option<&str>
where
    E: ProvideErrorMetadata,
{
    err.as_service_error().and_then(|e| e.code())
}

/// Whether the error has the given code and its message contains `message`
///
/// An empty `message` matches any message.
pub fn is_aws_err<E, R>(err: &SdkError<E, R>, code: &str, message: &str) -> bool
where
    E: ProvideErrorMetadata,
{
    let Some(service_err) = err.as_service_error() else {
        return false;
    };
    service_err.code() == Some(code)
        && (message.is_empty() || service_err.message().unwrap_or_default().contains(message))
}

/// Whether the error is one of the "resource is gone" codes
pub fn is_not_found<E, R>(err: &SdkError<E, R>, codes: &[&str]) -> bool
where
    E: ProvideErrorMetadata,
{
    error_code(err).is_some_and(|code| codes.contains(&code))
}

/// Wrap an SDK error under `context` ("Failed to read EFS mount targets"),
/// keeping the full error chain
pub fn sdk_error<E, R>(context: &str, id: &ResourceId, err: SdkError<E, R>) -> ProviderError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    ProviderError::new(format!("{}: {}", context, DisplayErrorContext(&err)))
        .for_resource(id.clone())
        .with_cause(err)
}
