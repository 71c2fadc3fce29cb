/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

#![warn(
    missing_docs,
    rustdoc::missing_crate_level_docs,
    unreachable_pub,
    rust_2018_idioms
)]

//! Bearer authorization middleware for an HTTP interceptor pipeline.
//!
//! [`BearerAuthInterceptor`] decorates outbound requests with an
//! `Authorization: Bearer <token>` header and coordinates token refresh
//! across concurrent requests. When the server rejects a token, exactly one
//! refresh runs per token generation: the request that observes the rejection
//! first starts it, requests observing the same stale token share its
//! outcome, and requests arriving after the refresh completed reuse the newer
//! token without refreshing again. Each request re-forwards at most once with
//! the replacement token.
//!
//! Tokens are produced by an application-supplied
//! [`ProvideToken`](bearer_credentials::provider::ProvideToken)
//! implementation:
//!
//! ```no_run
//! use bearer_credentials::provider::{future, ProvideToken};
//! use bearer_credentials::{Token, TokenError};
//! use bearer_interceptor::BearerAuthInterceptor;
//!
//! #[derive(Debug)]
//! struct EnvTokenProvider;
//!
//! impl ProvideToken for EnvTokenProvider {
//!     fn provide_initial_token<'a>(&'a self) -> future::ProvideInitialToken<'a>
//!     where
//!         Self: 'a,
//!     {
//!         future::ProvideInitialToken::ready(Ok(std::env::var("API_TOKEN")
//!             .ok()
//!             .map(Token::from)))
//!     }
//!
//!     fn refresh_token<'a>(&'a self, previous: Option<&'a str>) -> future::RefreshToken<'a>
//!     where
//!         Self: 'a,
//!     {
//!         future::RefreshToken::new(async move {
//!             // Exchange `previous` for a replacement with the token service.
//!             # let _ = previous;
//!             Err(TokenError::new("token service unreachable"))
//!         })
//!     }
//! }
//!
//! let interceptor = BearerAuthInterceptor::builder()
//!     .queue_size(4)
//!     .build(EnvTokenProvider);
//! # let _ = interceptor;
//! ```

pub mod chain;
mod error;
mod interceptor;
mod refresh;

pub use chain::{HttpChain, HttpRequest, HttpResponse};
pub use error::InterceptError;
pub use interceptor::{BearerAuthInterceptor, Builder, RejectionPolicy};
