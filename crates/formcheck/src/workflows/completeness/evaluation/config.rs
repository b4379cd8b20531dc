use rust_decimal::Decimal;

/// Tunable defaults applied by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Absolute deviation tolerated before a numeric comparison fails.
    pub tolerance: Decimal,
    /// Whether the literal `N/A` counts as a missing value.
    pub treat_na_as_missing: bool,
}

impl EngineSettings {
    pub fn default_tolerance() -> Decimal {
        Decimal::new(1, 2)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tolerance: Self::default_tolerance(),
            treat_na_as_missing: true,
        }
    }
}
