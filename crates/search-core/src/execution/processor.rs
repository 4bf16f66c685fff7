//! Post-processing of backend responses and failures.

use parking_lot::Mutex;

use crate::error::StorageError;

/// Metadata of one successful backend response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseMetadata<'a> {
    pub activity_id: &'a str,
    pub request_charge: f64,
    pub count: usize,
}

/// Inspects driver responses and turns driver errors into [`StorageError`]s.
///
/// `E` is the native error type of the driver.
pub trait ResponseProcessor<E>: Send + Sync {
    /// Observes a successful response.
    fn process_response(&self, response: &ResponseMetadata<'_>);

    /// Classifies a driver failure.
    fn process_error(&self, error: E) -> StorageError;
}

/// Totals accumulated over the responses of one request scope.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RequestMetrics {
    /// Number of pages fetched.
    pub pages: u64,
    /// Number of rows returned.
    pub items: u64,
    /// Sum of the request charges.
    pub request_charge: f64,
}

/// Thread-safe accumulator of [`RequestMetrics`].
#[derive(Debug, Default)]
pub struct RequestMetricsRecorder {
    totals: Mutex<RequestMetrics>,
}

impl RequestMetricsRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one response to the totals.
    pub fn record(&self, response: &ResponseMetadata<'_>) {
        let mut totals = self.totals.lock();
        totals.pages += 1;
        totals.items += response.count as u64;
        totals.request_charge += response.request_charge;
    }

    /// Returns the current totals.
    pub fn snapshot(&self) -> RequestMetrics {
        *self.totals.lock()
    }
}
