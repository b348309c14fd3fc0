// ⚙️ Ledger Configuration - One tolerance for everything
// Numeric tolerance and currency defaults threaded through validation,
// cross-entity analysis, and balancing.

use serde::{Deserialize, Serialize};

// ============================================================================
// LEDGER CONFIG
// ============================================================================

/// Global configuration for validation and reporting.
///
/// A single `numeric_tolerance` is used everywhere a "close enough to zero"
/// decision is made: transaction balance checks, significant-imbalance
/// detection, inter-entity flow cutoffs, and the balancing preconditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Maximum absolute difference for considering numeric values equal
    /// (default: 0.01, one cent in most currencies)
    pub numeric_tolerance: f64,

    /// Primary currency symbol for reporting (ISO 4217 code)
    pub default_currency: String,
}

impl LedgerConfig {
    pub fn new() -> Self {
        LedgerConfig {
            numeric_tolerance: 0.01,
            default_currency: "USD".to_string(),
        }
    }

    pub fn with_tolerance(tolerance: f64) -> Self {
        LedgerConfig {
            numeric_tolerance: tolerance,
            default_currency: "USD".to_string(),
        }
    }

    /// Check if a value is effectively zero within tolerance
    pub fn is_zero(&self, value: f64) -> bool {
        value.abs() <= self.numeric_tolerance
    }

    /// Check if a balance delta represents a balanced state
    ///
    /// Alias for is_zero() with clearer meaning at accounting-equation
    /// call sites.
    pub fn is_balanced(&self, value: f64) -> bool {
        self.is_zero(value)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
