/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Time source abstraction to support testing.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::SystemTime;

/// Trait with a `now()` function returning the current time.
pub trait TimeSource: Debug + Send + Sync {
    /// Returns the current time.
    fn now(&self) -> SystemTime;
}

/// Time source delegating to [`SystemTime::now`].
#[non_exhaustive]
#[derive(Debug, Default)]
pub struct SystemTimeSource;

impl SystemTimeSource {
    /// Creates a new `SystemTimeSource`.
    pub fn new() -> Self {
        SystemTimeSource
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Wrapper type for sharable `TimeSource`.
#[derive(Clone, Debug)]
pub struct SharedTimeSource(Arc<dyn TimeSource>);

impl Default for SharedTimeSource {
    fn default() -> Self {
        Self(Arc::new(SystemTimeSource))
    }
}

impl SharedTimeSource {
    /// Creates a new `SharedTimeSource` from `TimeSource`.
    pub fn new(source: impl TimeSource + 'static) -> Self {
        Self(Arc::new(source))
    }

    /// Returns the current time.
    pub fn now(&self) -> SystemTime {
        self.0.now()
    }
}

impl AsRef<dyn TimeSource> for SharedTimeSource {
    fn as_ref(&self) -> &(dyn TimeSource + 'static) {
        self.0.as_ref()
    }
}

impl From<Arc<dyn TimeSource>> for SharedTimeSource {
    fn from(source: Arc<dyn TimeSource>) -> Self {
        SharedTimeSource(source)
    }
}

impl TimeSource for SharedTimeSource {
    fn now(&self) -> SystemTime {
        self.0.now()
    }
}

/// Time source that can be manually moved for tests.
///
/// # Examples
///
/// ```
/// # use bearer_credentials::time_source::{TestingTimeSource, TimeSource};
/// # use std::time::{Duration, UNIX_EPOCH};
/// let time = TestingTimeSource::new(UNIX_EPOCH);
/// assert_eq!(UNIX_EPOCH, time.now());
/// time.advance(Duration::from_secs(100));
/// assert_eq!(UNIX_EPOCH + Duration::from_secs(100), time.now());
/// ```
#[cfg(feature = "test-util")]
#[derive(Clone, Debug)]
pub struct TestingTimeSource {
    now: Arc<std::sync::Mutex<SystemTime>>,
}

#[cfg(feature = "test-util")]
impl TestingTimeSource {
    /// Creates a `TestingTimeSource` with `start_time`.
    pub fn new(start_time: SystemTime) -> Self {
        Self {
            now: Arc::new(std::sync::Mutex::new(start_time)),
        }
    }

    /// Sets time to the specified `time`.
    pub fn set_time(&self, time: SystemTime) {
        *self.now.lock().unwrap() = time;
    }

    /// Advances time by `delta`.
    pub fn advance(&self, delta: std::time::Duration) {
        *self.now.lock().unwrap() += delta;
    }
}

#[cfg(feature = "test-util")]
impl TimeSource for TestingTimeSource {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap()
    }
}

#[cfg(all(test, feature = "test-util"))]
mod tests {
    use super::{TestingTimeSource, TimeSource};
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn testing_time_source_should_behave_as_expected() {
        let time_source = TestingTimeSource::new(UNIX_EPOCH);
        assert_eq!(UNIX_EPOCH, time_source.now());
        time_source.advance(Duration::from_secs(10));
        assert_eq!(UNIX_EPOCH + Duration::from_secs(10), time_source.now());
    }
}
