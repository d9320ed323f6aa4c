//! Error types shared by the VK platform client.

use thiserror::Error;

use crate::platform::PlatformError;

/// Convenient result alias returning [`VkApiError`] failures.
pub type VkResult<T> = Result<T, VkApiError>;

/// Failures that can occur while talking to the VK API.
#[derive(Debug, Error)]
pub enum VkApiError {
    /// Required environment variable is missing.
    #[error("missing VK environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Environment variable is present but unusable.
    #[error("invalid value `{value}` for VK environment variable `{var}`")]
    InvalidEnvVar { var: &'static str, value: String },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build VK HTTP client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// A request could not be sent or timed out.
    #[error("failed to send VK request `{method}`")]
    RequestSend {
        method: String,
        #[source]
        source: reqwest::Error,
    },
    /// Response body could not be parsed into JSON.
    #[error("failed to decode VK response for `{method}`")]
    DecodeResponse {
        method: String,
        #[source]
        source: reqwest::Error,
    },
    /// JSON arrived but did not match the expected model.
    #[error("unexpected VK response shape for `{method}`")]
    UnexpectedShape {
        method: String,
        #[source]
        source: serde_json::Error,
    },
    /// Keyboard payload could not be encoded.
    #[error("failed to encode keyboard for `{method}`")]
    EncodeKeyboard {
        method: String,
        #[source]
        source: serde_json::Error,
    },
    /// VK answered with an error object.
    #[error("VK error {code} on `{method}`: {message}")]
    Api {
        method: String,
        code: i64,
        message: String,
    },
    /// The long-poll server reported an unrecoverable `failed` code.
    #[error("long-poll server reported failure code {code}")]
    LongPollFailed { code: i64 },
}

impl From<VkApiError> for PlatformError {
    fn from(err: VkApiError) -> Self {
        match err {
            VkApiError::Api {
                method,
                code,
                message,
            } => PlatformError::Api {
                method,
                code,
                message,
            },
            VkApiError::UnexpectedShape { ref method, .. }
            | VkApiError::DecodeResponse { ref method, .. } => {
                PlatformError::decode(method.clone(), err.to_string())
            }
            other => PlatformError::transport("vk", other),
        }
    }
}
