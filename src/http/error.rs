// This file is part of pvp-rank. Copyright © 2025 pvp-rank contributors.
// pvp-rank is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

use bytes::Bytes;
use reqwest::{Response, StatusCode};
use std::fmt::{Display, Formatter};

pub type FetchResult<T> = Result<T, FetchError>;

/// Longest error body we keep around for debug printing.
const MAX_ERROR_BODY_BYTES: usize = 512;

#[derive(Debug)]
pub enum FetchError {
    /// We got an HTTP response, but its status code was not a success.
    HttpResponse(HttpResponse),
    /// We did not get an HTTP response at all. Happens if we fail during the initial request `.send()`.
    HttpRequest(ReqwestError),
    /// An error occurred reading a successful response body.
    HttpRead(ReqwestError),
    /// We received a successful response which we could not deserialize
    JsonDeserialize(serde_json::Error),
}

impl std::error::Error for FetchError {}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::HttpResponse(e) => write!(f, "{} returned status code {}", e.endpoint, e.status_code.as_u16()),
            FetchError::HttpRequest(e) => write!(f, "HTTP request to {} failed: {}", e.endpoint, e.error),
            FetchError::HttpRead(e) => write!(f, "HTTP body read from {} failed: {}", e.endpoint, e.error),
            FetchError::JsonDeserialize(e) => write!(f, "JSON deserialization failed: {e}"),
        }
    }
}

impl FetchError {
    /// Create a FetchError from a non-success response. The body is captured (truncated) for debugging.
    pub async fn from_response(endpoint: &'static str, response: Response) -> Self {
        let status_code = response.status();
        let headers = format!("{:?}", response.headers());
        let body = match response.bytes().await {
            Ok(mut bytes) => {
                bytes.truncate(MAX_ERROR_BODY_BYTES);
                HttpBody::Bytes(bytes)
            }
            Err(read_error) => HttpBody::ReadError(read_error),
        };
        Self::HttpResponse(HttpResponse {
            endpoint,
            status_code,
            headers,
            body,
        })
    }

    /// Create a FetchError for a bare status code, with no headers or body.
    pub fn from_status(endpoint: &'static str, status_code: StatusCode) -> Self {
        Self::HttpResponse(HttpResponse {
            endpoint,
            status_code,
            headers: String::new(),
            body: HttpBody::Bytes(Bytes::new()),
        })
    }

    /// Create a FetchError from a reqwest error (use this after `.send()`)
    pub fn from_request(endpoint: &'static str, error: reqwest::Error) -> Self {
        Self::HttpRequest(ReqwestError { endpoint, error })
    }

    /// Create a FetchError from a reqwest error attempting to read response body (use this after `.bytes()`)
    pub fn from_read(endpoint: &'static str, error: reqwest::Error) -> Self {
        Self::HttpRead(ReqwestError { endpoint, error })
    }

    /// Create a FetchError from a serde_json Error
    pub fn from_json(json_error: serde_json::Error) -> Self {
        Self::JsonDeserialize(json_error)
    }

    /// Status code of the response, if we got that far.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::HttpResponse(response) => Some(response.status_code),
            Self::HttpRequest(e) | Self::HttpRead(e) => e.error.status(),
            Self::JsonDeserialize(_) => None,
        }
    }

    /// Captured body of a non-success response, truncated to the first 512 bytes
    pub fn response_body(&self) -> Option<&[u8]> {
        match self {
            Self::HttpResponse(HttpResponse {
                body: HttpBody::Bytes(bytes),
                ..
            }) => Some(bytes),
            _ => None,
        }
    }

    pub fn is_404(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// Check if retrying the same request later could plausibly give a different answer.
    pub fn is_transient(&self) -> bool {
        match self {
            // 4xx won't fix itself, except for rate limiting
            Self::HttpResponse(e) => !e.status_code.is_client_error() || e.status_code == StatusCode::TOO_MANY_REQUESTS,
            Self::HttpRequest(_) => true,
            Self::HttpRead(_) => true,
            Self::JsonDeserialize(_) => true, // object stores love to serve an HTML error page with a 200
        }
    }
}

/// Generic wrapper for a reqwest error.
#[derive(Debug)]
#[allow(dead_code)] // these are debug printed frequently
pub struct ReqwestError {
    endpoint: &'static str,
    error: reqwest::Error,
}

#[derive(Debug)]
#[allow(dead_code)] // these are debug printed frequently
pub struct HttpResponse {
    endpoint: &'static str,
    status_code: StatusCode,
    headers: String,
    body: HttpBody,
}

#[derive(Debug)]
#[allow(dead_code)] // these are debug printed frequently
pub enum HttpBody {
    /// Raw error body, truncated
    Bytes(Bytes),
    /// An error occurred reading the error body. We expected an error, so we captured headers already.
    ReadError(reqwest::Error),
}
