//! Shared constants for end-to-end tests
//!
//! This module contains all constants used across the test suite.
//! When the test model set changes, update only this file.

// ============================================================================
// Test Models
// ============================================================================

/// HTTP model without audio conditioning, backed by a mock service
pub const HTTP_MODEL_ID: &str = "mock-gen";

/// HTTP model that accepts source audio on its remix endpoint
pub const REMIX_MODEL_ID: &str = "mock-remix";

/// Model served by the built-in tone generator
pub const STUB_MODEL_ID: &str = "tone";

/// A model id that is not configured
pub const UNKNOWN_MODEL_ID: &str = "not-a-model";

/// Duration every mock service reports for produced audio (seconds)
pub const MOCK_DURATION_SECS: f64 = 1.0;

// ============================================================================
// Test Prompts
// ============================================================================

pub const TEST_PROMPT: &str = "slow piano over rain";

pub const TEST_STYLE: &str = "lofi";

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;

/// Sample rate of the WAV files the mock services write
pub const MOCK_SAMPLE_RATE: u32 = 8_000;
