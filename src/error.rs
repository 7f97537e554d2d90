use crate::data::student::FieldErrors;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use maud::html;
use snafu::Snafu;
use std::{num::ParseIntError, sync::Arc, time::Duration};

pub type RosterResult<T> = Result<T, RosterError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RosterError {
    #[snafu(display("Unable to retrieve env var `{}`", name))]
    BadEnvVar {
        source: dotenvy::Error,
        name: &'static str,
    },
    #[snafu(display("Unable to parse env var `{}` as a number", name))]
    ParseNumber {
        source: ParseIntError,
        name: &'static str,
    },
    #[snafu(display("Unable to parse API url {:?}", original))]
    ParseApiUrl {
        source: url::ParseError,
        original: String,
    },
    #[snafu(display("Unable to build HTTP client"))]
    BuildHttpClient { source: reqwest::Error },
    #[snafu(display("Error talking to the students API"))]
    Transport { source: reqwest::Error },
    #[snafu(display("Request to {} timed out after {:?}", path, after))]
    TimedOut { path: String, after: Duration },
    #[snafu(display("Request for page {} was cancelled", page))]
    Cancelled { page: u32 },
    #[snafu(display("Unable to find anything at {}", path))]
    NotFound { path: String },
    #[snafu(display("The students API rejected the submitted form"))]
    Validation { errors: FieldErrors },
    #[snafu(display("The students API answered {} with HTTP {}: {}", path, status, body))]
    UnexpectedStatus {
        path: String,
        status: u16,
        body: String,
    },
    #[snafu(display("Unable to decode response body from {}", path))]
    DecodeBody {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Invalid `x-total-count` header {:?}", original))]
    InvalidTotalCount { original: String },
    #[snafu(display("{}", source))]
    Shared { source: Arc<RosterError> },
}

impl RosterError {
    /// Whether the synchronizer may try the same request again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::TimedOut { .. } | Self::Transport { .. } => true,
            Self::UnexpectedStatus { status, .. } => *status >= 500,
            Self::Shared { source } => source.is_retryable(),
            _ => false,
        }
    }

    /// Unwraps errors that came back out of the cache's shared loader.
    pub fn from_shared(shared: Arc<Self>) -> Self {
        Arc::try_unwrap(shared).unwrap_or_else(|source| Self::Shared { source })
    }

    /// The error itself, looking through any sharing between cache waiters.
    pub fn root(&self) -> &Self {
        match self {
            Self::Shared { source } => source.root(),
            other => other,
        }
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation { errors } => Some(errors),
            Self::Shared { source } => source.field_errors(),
            _ => None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        const ISE: StatusCode = StatusCode::INTERNAL_SERVER_ERROR; //internal server error
        const NF: StatusCode = StatusCode::NOT_FOUND; //not found
        const BG: StatusCode = StatusCode::BAD_GATEWAY; //upstream misbehaved

        match self {
            Self::BadEnvVar { .. } | Self::ParseNumber { .. } | Self::ParseApiUrl { .. } => ISE,
            Self::BuildHttpClient { .. } => ISE,
            Self::Transport { .. } => BG,
            Self::TimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Cancelled { .. } => StatusCode::CONFLICT,
            Self::NotFound { .. } => NF,
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::UnexpectedStatus { .. } | Self::DecodeBody { .. } => BG,
            Self::InvalidTotalCount { .. } => BG,
            Self::Shared { source } => source.status_code(),
        }
    }
}

impl IntoResponse for RosterError {
    fn into_response(self) -> Response {
        let basic_error = |desc| {
            html! {
                div class="bg-red-100 border border-red-400 text-red-700 px-4 py-3 rounded relative mb-4" role="alert" {
                    strong class="font-bold" {"Roster Error "}
                    span {(desc)}
                }
            }
        };

        let status_code = self.status_code();

        error!(?self, "Error!");
        (status_code, Html(basic_error(self.to_string()))).into_response()
    }
}
