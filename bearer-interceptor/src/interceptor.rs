/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::chain::{HttpChain, HttpRequest, HttpResponse};
use crate::error::InterceptError;
use crate::refresh::TokenStore;
use bearer_credentials::{ProvideToken, SharedTimeSource, SharedTokenProvider, TimeSource, Token};
use http::header::AUTHORIZATION;
use http::{HeaderValue, StatusCode};

const DEFAULT_QUEUE_SIZE: usize = 1;

/// Selects which response statuses count as the server rejecting the token.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum RejectionPolicy {
    /// Any response outside the 2xx range. This is the default.
    #[default]
    NonSuccess,
    /// Only `401 Unauthorized`.
    Unauthorized,
}

impl RejectionPolicy {
    fn is_rejection(self, status: StatusCode) -> bool {
        match self {
            RejectionPolicy::NonSuccess => !status.is_success(),
            RejectionPolicy::Unauthorized => status == StatusCode::UNAUTHORIZED,
        }
    }
}

/// Interceptor stage that attaches `Authorization: Bearer <token>` to outbound
/// requests and coordinates token refresh across concurrent requests.
///
/// The token is loaded lazily on the first request. When a response indicates
/// the token was rejected, exactly one refresh runs per token generation;
/// every request observing the same stale generation shares its outcome and
/// re-forwards once with the replacement token. A request that finds the
/// generation already advanced reuses the newer token without refreshing
/// again.
#[derive(Debug)]
pub struct BearerAuthInterceptor {
    store: TokenStore,
    time_source: SharedTimeSource,
    rejection_policy: RejectionPolicy,
}

impl BearerAuthInterceptor {
    /// Creates an interceptor with default configuration for the given provider.
    pub fn new(provider: impl ProvideToken + 'static) -> Self {
        Self::builder().build(provider)
    }

    /// Returns a builder for `BearerAuthInterceptor`.
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Decorates `request` with the current token, forwards it through
    /// `chain`, and retries once with a refreshed token if the response
    /// status indicates the token was rejected.
    ///
    /// The retried response is returned regardless of its status. Transport
    /// errors pass through unchanged and never trigger a refresh.
    pub async fn intercept(
        &self,
        request: HttpRequest,
        chain: &dyn HttpChain,
    ) -> Result<HttpResponse, InterceptError> {
        self.store.ensure_initialized().await?;
        let (mut token, mut generation) = self.store.snapshot();

        // An expired token is refreshed before the request goes out at all.
        if let Some(current) = &token {
            if !current.is_valid_at(self.time_source.now()) {
                let refreshed = self.store.refresh(generation).await?;
                token = Some(refreshed.token);
                generation = refreshed.generation;
            }
        }

        let response = self.forward(&request, token.as_ref(), chain).await?;
        if !self.rejection_policy.is_rejection(response.status()) {
            return Ok(response);
        }

        let refreshed = self.store.refresh(generation).await?;
        // A single retry; its response is final whatever the status.
        self.forward(&request, Some(&refreshed.token), chain).await
    }

    async fn forward(
        &self,
        request: &HttpRequest,
        token: Option<&Token>,
        chain: &dyn HttpChain,
    ) -> Result<HttpResponse, InterceptError> {
        let decorated = decorate(request, token)?;
        chain
            .proceed(decorated)
            .await
            .map_err(InterceptError::Transport)
    }
}

/// Rebuilds `request` with the `Authorization` header for `token` attached.
///
/// `http::Request` cannot be cloned directly, so the request is recreated
/// from its parts for every forward. Decorating the caller's original request
/// each time means the retry carries the fresh token instead of stacking a
/// second `Authorization` header on the stale one.
fn decorate(request: &HttpRequest, token: Option<&Token>) -> Result<HttpRequest, InterceptError> {
    let mut decorated = http::Request::builder()
        .method(request.method().clone())
        .uri(request.uri().clone())
        .version(request.version())
        .body(request.body().clone())
        .expect("all parts came from a valid request");
    *decorated.headers_mut() = request.headers().clone();
    if let Some(token) = token {
        let mut value = HeaderValue::try_from(format!("Bearer {}", token.token()))
            .map_err(|_| InterceptError::InvalidToken)?;
        value.set_sensitive(true);
        decorated.headers_mut().insert(AUTHORIZATION, value);
    }
    Ok(decorated)
}

/// Builder for [`BearerAuthInterceptor`].
#[derive(Debug, Default)]
pub struct Builder {
    queue_size: Option<usize>,
    time_source: Option<SharedTimeSource>,
    rejection_policy: RejectionPolicy,
}

impl Builder {
    /// Sets the maximum number of requests that may wait on one in-flight
    /// refresh in addition to the request that started it. Defaults to 1.
    /// Requests beyond the bound fail with [`InterceptError::QueueFull`]
    /// instead of waiting.
    ///
    /// # Panics
    ///
    /// Panics if `queue_size` is zero.
    pub fn queue_size(mut self, queue_size: usize) -> Self {
        assert!(queue_size > 0, "queue_size must be positive");
        self.queue_size = Some(queue_size);
        self
    }

    /// Sets the time source used to decide whether the current token has
    /// expired. Defaults to the system clock.
    pub fn time_source(mut self, time_source: impl TimeSource + 'static) -> Self {
        self.time_source = Some(SharedTimeSource::new(time_source));
        self
    }

    /// Sets which response statuses count as a token rejection. Defaults to
    /// [`RejectionPolicy::NonSuccess`].
    pub fn rejection_policy(mut self, rejection_policy: RejectionPolicy) -> Self {
        self.rejection_policy = rejection_policy;
        self
    }

    /// Builds a [`BearerAuthInterceptor`] over `provider`.
    pub fn build(self, provider: impl ProvideToken + 'static) -> BearerAuthInterceptor {
        BearerAuthInterceptor {
            store: TokenStore::new(
                SharedTokenProvider::new(provider),
                self.queue_size.unwrap_or(DEFAULT_QUEUE_SIZE),
            ),
            time_source: self.time_source.unwrap_or_default(),
            rejection_policy: self.rejection_policy,
        }
    }
}
