//! Talking to the students API: timeouts, retries and status mapping.
//!
//! Nothing outside this module looks at HTTP status codes.

use crate::{
    config::SyncConfig,
    data::{
        StudentId,
        student::{Student, StudentForm, ValidationBody},
    },
    error::{
        BuildHttpClientSnafu, CancelledSnafu, DecodeBodySnafu, InvalidTotalCountSnafu,
        RosterError, RosterResult, TransportSnafu,
    },
};
use futures::future::{AbortRegistration, Abortable};
use rand::{Rng, rng};
use reqwest::{
    Method, StatusCode,
    header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT},
};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use snafu::{OptionExt, ResultExt};
use std::time::Duration;

const USER_AGENT_VALUE: &str = concat!("roster/", env!("CARGO_PKG_VERSION"));
pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// One page of students plus how many exist in total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentPage {
    pub items: Vec<Student>,
    pub total_count: u64,
}

#[derive(Debug)]
struct Fetched {
    headers: HeaderMap,
    body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct StudentsClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<SecretString>,
    request_timeout: Duration,
    max_retries: u32,
}

impl StudentsClient {
    pub fn new(config: &SyncConfig) -> RosterResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .build()
            .context(BuildHttpClientSnafu)?;

        Ok(Self {
            client,
            base_url: config.api_url.as_str().trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
            request_timeout: config.request_timeout,
            max_retries: config.max_retries,
        })
    }

    /// `GET /students?page&limit`. The total only ever comes from the `x-total-count` header.
    pub async fn list_students(
        &self,
        page: u32,
        limit: u32,
        cancel: Option<AbortRegistration>,
    ) -> RosterResult<StudentPage> {
        let fetch = async {
            let query = [("page", page.to_string()), ("limit", limit.to_string())];
            let fetched = self
                .request(Method::GET, "/students", &query, None)
                .await?;
            let total_count = total_count(&fetched.headers)?;
            let items = decode("/students", &fetched.body)?;
            Ok::<_, RosterError>(StudentPage { items, total_count })
        };

        match cancel {
            Some(registration) => Abortable::new(fetch, registration)
                .await
                .unwrap_or_else(|_aborted| CancelledSnafu { page }.fail()),
            None => fetch.await,
        }
    }

    pub async fn get_student(&self, id: StudentId) -> RosterResult<Student> {
        let path = format!("/students/{id}");
        let fetched = self.request(Method::GET, &path, &[], None).await?;
        decode(&path, &fetched.body)
    }

    pub async fn add_student(&self, form: &StudentForm) -> RosterResult<Student> {
        let fetched = self
            .request(Method::POST, "/students", &[], Some(form))
            .await?;
        decode("/students", &fetched.body)
    }

    pub async fn update_student(
        &self,
        id: StudentId,
        form: &StudentForm,
    ) -> RosterResult<Student> {
        let path = format!("/students/{id}");
        let fetched = self.request(Method::PUT, &path, &[], Some(form)).await?;
        decode(&path, &fetched.body)
    }

    pub async fn delete_student(&self, id: StudentId) -> RosterResult<()> {
        self.request(Method::DELETE, &format!("/students/{id}"), &[], None)
            .await?;
        Ok(())
    }

    /// Only reads are retried, a repeated POST could add the same student twice.
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&StudentForm>,
    ) -> RosterResult<Fetched> {
        let max_retries = if method == Method::GET {
            self.max_retries
        } else {
            0
        };
        let mut retries = 0;

        loop {
            match self.request_once(method.clone(), path, query, body).await {
                Ok(fetched) => return Ok(fetched),
                Err(e) if e.is_retryable() && retries < max_retries => {
                    retries += 1;
                    let backoff = Duration::from_millis(rng().random_range(25..=100));

                    warn!(
                        error = %e,
                        %path,
                        retry = retries,
                        max_retries,
                        backoff_ms = backoff.as_millis(),
                        "retrying request"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn request_once(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&StudentForm>,
    ) -> RosterResult<Fetched> {
        let url = format!("{}{path}", self.base_url);
        debug!(%method, %url, "sending request");

        let mut request = self.client.request(method, &url).query(query);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let exchange = async {
            let response = request.send().await.context(TransportSnafu)?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await.context(TransportSnafu)?.to_vec();
            Ok::<_, RosterError>((status, headers, body))
        };

        let Ok(exchanged) = tokio::time::timeout(self.request_timeout, exchange).await else {
            return Err(RosterError::TimedOut {
                path: path.to_string(),
                after: self.request_timeout,
            });
        };
        let (status, headers, body) = exchanged?;

        match status.as_u16() {
            200..=299 => Ok(Fetched { headers, body }),
            404 => Err(RosterError::NotFound {
                path: path.to_string(),
            }),
            422 => match serde_json::from_slice::<ValidationBody>(&body) {
                Ok(ValidationBody { error }) => Err(RosterError::Validation { errors: error }),
                Err(_) => Err(unexpected(path, status, &body)),
            },
            _ => Err(unexpected(path, status, &body)),
        }
    }
}

fn unexpected(path: &str, status: StatusCode, body: &[u8]) -> RosterError {
    RosterError::UnexpectedStatus {
        path: path.to_string(),
        status: status.as_u16(),
        body: String::from_utf8_lossy(body).into_owned(),
    }
}

fn decode<T: DeserializeOwned>(path: &str, body: &[u8]) -> RosterResult<T> {
    serde_json::from_slice(body).context(DecodeBodySnafu { path })
}

/// A missing header counts as nobody, a mangled one is an error.
fn total_count(headers: &HeaderMap) -> RosterResult<u64> {
    let Some(raw) = headers.get(TOTAL_COUNT_HEADER) else {
        return Ok(0);
    };

    raw.to_str()
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .context(InvalidTotalCountSnafu {
            original: String::from_utf8_lossy(raw.as_bytes()),
        })
}
