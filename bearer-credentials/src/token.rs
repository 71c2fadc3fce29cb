/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;
use zeroize::Zeroizing;

/// An opaque bearer token and the wall-clock instant at which it expires.
///
/// `Token` uses an interior `Arc` so that clones share a single allocation, and
/// the token text is zeroed in memory when the last clone is dropped. The text
/// is redacted from `Debug` output.
#[derive(Clone, Eq, PartialEq)]
pub struct Token(Arc<Inner>);

#[derive(Eq, PartialEq)]
struct Inner {
    token: Zeroizing<String>,

    /// A `SystemTime` at which the token should no longer be attached to
    /// requests. `None` means the token never expires.
    expires_after: Option<SystemTime>,
}

impl Token {
    /// Creates a new token.
    ///
    /// This is intended to be used from a [`ProvideToken`](crate::provider::ProvideToken)
    /// implementation. An `expires_after` of `None` creates a token that never expires.
    pub fn new(token: impl Into<String>, expires_after: Option<SystemTime>) -> Self {
        Self(Arc::new(Inner {
            token: Zeroizing::new(token.into()),
            expires_after,
        }))
    }

    /// Returns the token text.
    pub fn token(&self) -> &str {
        &self.0.token
    }

    /// Returns the time at which the token expires.
    pub fn expires_after(&self) -> Option<SystemTime> {
        self.0.expires_after
    }

    /// Returns `true` if the token may still be attached to requests at `now`.
    ///
    /// A token whose expiry is exactly `now` is already expired.
    pub fn is_valid_at(&self, now: SystemTime) -> bool {
        match self.0.expires_after {
            Some(expires_after) => expires_after > now,
            None => true,
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("Token");
        dbg.field("token", &"** redacted **");
        match self.0.expires_after {
            Some(expires_after) => dbg.field("expires_after", &expires_after),
            None => dbg.field("expires_after", &"never"),
        };
        dbg.finish()
    }
}

impl From<&str> for Token {
    fn from(token: &str) -> Self {
        Self::from(token.to_owned())
    }
}

impl From<String> for Token {
    fn from(token: String) -> Self {
        Self::new(token, None)
    }
}
