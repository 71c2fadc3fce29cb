/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::chain::BoxError;
use bearer_credentials::TokenError;

/// Error returned by [`BearerAuthInterceptor::intercept`](crate::BearerAuthInterceptor::intercept).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum InterceptError {
    /// Loading the initial token failed.
    ///
    /// The interceptor stays uninitialized, so the next request attempts the
    /// load again.
    #[error("failed to load the initial bearer token")]
    InitialLoad(#[source] TokenError),

    /// Refreshing the token failed.
    ///
    /// Delivered to every request that was waiting on the failed refresh. The
    /// current token and generation are left unchanged.
    #[error("failed to refresh the bearer token")]
    Refresh(#[source] TokenError),

    /// Too many requests were already waiting on the in-flight refresh.
    #[error("the bearer token refresh queue is full")]
    QueueFull,

    /// The token text cannot be carried in an `Authorization` header.
    #[error("bearer token is not a valid header value")]
    InvalidToken,

    /// The underlying transport failed.
    ///
    /// Passed through unchanged; transport failures never trigger a refresh.
    #[error("transport error")]
    Transport(#[source] BoxError),
}
