/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Interface to the surrounding interceptor pipeline.
//!
//! The pipeline itself is an external collaborator; the interceptor only
//! consumes [`HttpChain::proceed`] to hand a decorated request to the next
//! stage and await its response.

use bytes::Bytes;
use std::error::Error;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Unmodeled error type for transport failures raised by the pipeline.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Request type flowing through the pipeline.
pub type HttpRequest = http::Request<Bytes>;

/// Response type flowing through the pipeline.
pub type HttpResponse = http::Response<Bytes>;

/// Future returned by [`HttpChain::proceed`].
pub struct Proceed<'a>(Pin<Box<dyn Future<Output = Result<HttpResponse, BoxError>> + Send + 'a>>);

impl<'a> Proceed<'a> {
    /// Creates a `Proceed` from a future.
    pub fn new(future: impl Future<Output = Result<HttpResponse, BoxError>> + Send + 'a) -> Self {
        Self(Box::pin(future))
    }

    /// Creates a `Proceed` that is immediately ready with the given result.
    pub fn ready(result: Result<HttpResponse, BoxError>) -> Self {
        Self(Box::pin(std::future::ready(result)))
    }
}

impl Future for Proceed<'_> {
    type Output = Result<HttpResponse, BoxError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.0.as_mut().poll(cx)
    }
}

/// The next stage of the interceptor pipeline.
pub trait HttpChain: Send + Sync {
    /// Forwards `request` to the next stage and resolves to its response.
    ///
    /// Transport failures resolve to `Err` and pass through the interceptor
    /// unchanged.
    fn proceed(&self, request: HttpRequest) -> Proceed<'_>;
}
