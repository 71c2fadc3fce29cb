/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The token provider capability.
//!
//! Applications implement [`ProvideToken`] to tell the interceptor how tokens
//! are obtained. The interceptor guarantees that `provide_initial_token` is
//! invoked at most once per successful initialization and that `refresh_token`
//! is invoked at most once per token generation, no matter how many requests
//! are in flight.

use std::sync::Arc;

#[cfg(test)]
use crate::Token;

/// Future types returned by [`ProvideToken`] implementations.
pub mod future {
    use crate::{Token, TokenError};
    use std::future::Future;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

    /// Future returned by [`ProvideToken::provide_initial_token`](super::ProvideToken::provide_initial_token).
    pub struct ProvideInitialToken<'a>(BoxFuture<'a, Result<Option<Token>, TokenError>>);

    impl<'a> ProvideInitialToken<'a> {
        /// Creates a `ProvideInitialToken` from a future.
        pub fn new(
            future: impl Future<Output = Result<Option<Token>, TokenError>> + Send + 'a,
        ) -> Self {
            Self(Box::pin(future))
        }

        /// Creates a `ProvideInitialToken` that is immediately ready with the given result.
        pub fn ready(result: Result<Option<Token>, TokenError>) -> Self {
            Self(Box::pin(std::future::ready(result)))
        }
    }

    impl Future for ProvideInitialToken<'_> {
        type Output = Result<Option<Token>, TokenError>;

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
            self.0.as_mut().poll(cx)
        }
    }

    /// Future returned by [`ProvideToken::refresh_token`](super::ProvideToken::refresh_token).
    pub struct RefreshToken<'a>(BoxFuture<'a, Result<Token, TokenError>>);

    impl<'a> RefreshToken<'a> {
        /// Creates a `RefreshToken` from a future.
        pub fn new(future: impl Future<Output = Result<Token, TokenError>> + Send + 'a) -> Self {
            Self(Box::pin(future))
        }

        /// Creates a `RefreshToken` that is immediately ready with the given result.
        pub fn ready(result: Result<Token, TokenError>) -> Self {
            Self(Box::pin(std::future::ready(result)))
        }
    }

    impl Future for RefreshToken<'_> {
        type Output = Result<Token, TokenError>;

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
            self.0.as_mut().poll(cx)
        }
    }
}

/// Loads the initial bearer token and produces replacements for rejected ones.
///
/// Neither operation is required to be idempotent; the caller is responsible
/// for invoking each at most once per generation.
pub trait ProvideToken: Send + Sync + std::fmt::Debug {
    /// Returns the token available before any refresh has happened.
    ///
    /// Resolving to `Ok(None)` is valid and means requests go out without an
    /// `Authorization` header until the first refresh.
    fn provide_initial_token<'a>(&'a self) -> future::ProvideInitialToken<'a>
    where
        Self: 'a;

    /// Produces the token that supersedes the one whose text is `previous`.
    ///
    /// `previous` is `None` when no token was ever set.
    fn refresh_token<'a>(&'a self, previous: Option<&'a str>) -> future::RefreshToken<'a>
    where
        Self: 'a;
}

/// Token provider wrapper that may be shared.
///
/// Newtype wrapper around [`ProvideToken`] that implements `Clone` using an
/// internal `Arc`.
#[derive(Clone, Debug)]
pub struct SharedTokenProvider(Arc<dyn ProvideToken>);

impl SharedTokenProvider {
    /// Creates a new [`SharedTokenProvider`] from [`ProvideToken`].
    ///
    /// The given provider will be wrapped in an internal `Arc`. If your
    /// provider is already in an `Arc`, use `SharedTokenProvider::from(provider)` instead.
    pub fn new(provider: impl ProvideToken + 'static) -> Self {
        Self(Arc::new(provider))
    }
}

impl AsRef<dyn ProvideToken> for SharedTokenProvider {
    fn as_ref(&self) -> &(dyn ProvideToken + 'static) {
        self.0.as_ref()
    }
}

impl From<Arc<dyn ProvideToken>> for SharedTokenProvider {
    fn from(provider: Arc<dyn ProvideToken>) -> Self {
        SharedTokenProvider(provider)
    }
}

impl ProvideToken for SharedTokenProvider {
    fn provide_initial_token<'a>(&'a self) -> future::ProvideInitialToken<'a>
    where
        Self: 'a,
    {
        self.0.provide_initial_token()
    }

    fn refresh_token<'a>(&'a self, previous: Option<&'a str>) -> future::RefreshToken<'a>
    where
        Self: 'a,
    {
        self.0.refresh_token(previous)
    }
}
