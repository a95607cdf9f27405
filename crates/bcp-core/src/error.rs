// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Coarse error classes used when translating failures at an outer boundary.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Data,
    ModelConfig,
    SamplingDivergence,
    EventAssociation,
    InvalidConfig,
}

impl ErrorKind {
    /// Stable name for logs and wire payloads.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::ModelConfig => "model_config",
            Self::SamplingDivergence => "sampling_divergence",
            Self::EventAssociation => "event_association",
            Self::InvalidConfig => "invalid_config",
        }
    }

    /// True for failures caused by caller input rather than by inference.
    pub const fn is_client_error(self) -> bool {
        matches!(self, Self::Data | Self::ModelConfig | Self::InvalidConfig)
    }
}

/// Error type shared by every crate in the workspace.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum BcpError {
    #[error("data error: {0}")]
    Data(String),
    #[error("model config error: {0}")]
    ModelConfig(String),
    #[error("sampling divergence: {0}")]
    SamplingDivergence(String),
    #[error("cancelled")]
    Cancelled,
    #[error("event association error: {0}")]
    EventAssociation(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl BcpError {
    pub fn data(message: impl Into<String>) -> Self {
        Self::Data(message.into())
    }

    pub fn model_config(message: impl Into<String>) -> Self {
        Self::ModelConfig(message.into())
    }

    pub fn sampling_divergence(message: impl Into<String>) -> Self {
        Self::SamplingDivergence(message.into())
    }

    pub fn cancelled() -> Self {
        Self::Cancelled
    }

    pub fn event_association(message: impl Into<String>) -> Self {
        Self::EventAssociation(message.into())
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Maps the error onto its boundary class. Cancellation is reported as a
    /// sampling failure because it aborts the sampler.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Data(_) => ErrorKind::Data,
            Self::ModelConfig(_) => ErrorKind::ModelConfig,
            Self::SamplingDivergence(_) | Self::Cancelled => ErrorKind::SamplingDivergence,
            Self::EventAssociation(_) => ErrorKind::EventAssociation,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }

    /// True when a single retry with more conservative sampler settings may help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SamplingDivergence(_))
    }
}
