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

//! Bearer token types for HTTP authorization.
//!
//! This crate provides the [`Token`] value type, the [`ProvideToken`] capability
//! implemented by applications to load and refresh tokens, and a [`TimeSource`]
//! abstraction so that token expiry can be tested without the wall clock.

mod error;
pub mod provider;
pub mod time_source;
mod token;

pub use error::TokenError;
pub use provider::{ProvideToken, SharedTokenProvider};
pub use time_source::{SharedTimeSource, SystemTimeSource, TimeSource};
pub use token::Token;
