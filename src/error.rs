// This file is part of pvp-rank. Copyright © 2025 pvp-rank contributors.
// pvp-rank is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

use crate::http::FetchError;
use std::fmt::{Display, Formatter};

/// Errors from building the service or fetching profile data. Rank lookups never fail: they degrade to "no rank" instead.
#[derive(Debug)]
pub enum Error {
    Message(String),
    Fetch(FetchError),
    /// The HTTP client could not be built
    Client(reqwest::Error),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Message(message) => f.write_str(message.as_str()),
            Error::Fetch(e) => write!(f, "{e}"),
            Error::Client(e) => write!(f, "failed to build HTTP client: {e}"),
        }
    }
}

impl From<FetchError> for Error {
    fn from(e: FetchError) -> Self {
        Self::Fetch(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Client(e)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Message(_) => None,
            Error::Fetch(e) => Some(e),
            Error::Client(e) => Some(e),
        }
    }
}

impl Error {
    pub fn new<T: Into<String>>(message: T) -> Self {
        Self::Message(message.into())
    }
}
