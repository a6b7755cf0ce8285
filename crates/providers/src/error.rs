use mediagen_core::channels::Channel;

/// Errors from talking to, or interpreting, an external provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-2xx response the error-code mapping did not recognise.
    #[error("{channel} API error ({status}): {body}")]
    Api {
        channel: Channel,
        status: u16,
        body: String,
    },

    #[error("{channel} rejected our credentials: {message}")]
    Unauthorized { channel: Channel, message: String },

    /// The provider refused the request itself (bad parameters, content policy).
    #[error("{channel} rejected the request ({code}): {message}")]
    Rejected {
        channel: Channel,
        code: String,
        message: String,
    },

    #[error("{channel} rate limit exceeded: {message}")]
    RateLimited { channel: Channel, message: String },

    #[error("{channel} account quota exhausted: {message}")]
    QuotaExhausted { channel: Channel, message: String },

    #[error("{channel} is unavailable: {message}")]
    Unavailable { channel: Channel, message: String },

    /// A response or webhook body did not have the expected shape.
    #[error("Invalid {channel} payload: {message}")]
    InvalidResponse { channel: Channel, message: String },

    /// The canonical request cannot be expressed for this provider.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A webhook failed the authenticity check.
    #[error("Webhook authentication failed for {channel}")]
    WebhookAuth { channel: Channel },

    /// Building provider credentials failed.
    #[error("Failed to sign {channel} request: {message}")]
    Signing { channel: Channel, message: String },
}

impl ProviderError {
    pub(crate) fn invalid_response(channel: Channel, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            channel,
            message: message.into(),
        }
    }

    /// Map a non-2xx HTTP status to an error when the body carried no
    /// recognisable provider code.
    pub(crate) fn from_status(channel: Channel, status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Unauthorized {
                channel,
                message: body,
            },
            429 => Self::RateLimited {
                channel,
                message: body,
            },
            500..=599 => Self::Unavailable {
                channel,
                message: body,
            },
            _ => Self::Api {
                channel,
                status,
                body,
            },
        }
    }
}
