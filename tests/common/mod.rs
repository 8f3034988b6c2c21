//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use input_ingress::types::TICKS_PER_SECOND;
use input_ingress::{IngressConfig, InputRuntime};

/// Timestamp of `ms` milliseconds
pub fn ms(ms: u64) -> u64 {
    ms * TICKS_PER_SECOND / 1000
}

/// Runtime with the built-in formats and default config
pub fn runtime() -> InputRuntime {
    InputRuntime::new(IngressConfig::default()).expect("default runtime")
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}
