/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Error returned by a [`ProvideToken`](crate::provider::ProvideToken) implementation.
///
/// A failed refresh is delivered to every request waiting on it, so this error
/// is cheaply cloneable and shares its source across clones.
#[derive(Clone, Debug)]
pub struct TokenError {
    message: Arc<str>,
    source: Option<Arc<dyn Error + Send + Sync>>,
}

impl TokenError {
    /// Creates an error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into().into(),
            source: None,
        }
    }

    /// Creates an error from a message and an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into().into(),
            source: Some(source.into().into()),
        }
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for TokenError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.source {
            Some(source) => Some(source.as_ref()),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TokenError;
    use std::error::Error;

    #[test]
    fn clones_share_the_source() {
        let err = TokenError::with_source("refresh rejected", std::io::Error::other("boom"));
        let clone = err.clone();
        assert_eq!("refresh rejected", format!("{}", clone));
        assert_eq!("boom", format!("{}", clone.source().unwrap()));
    }
}
