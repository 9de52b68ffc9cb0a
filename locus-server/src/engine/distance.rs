//! RSSI to distance conversion (log-distance path-loss model)

use locus_common::config::PathLossConfig;

/// Default RSSI at one meter (dBm)
pub const DEFAULT_TX_POWER_AT_1M: f64 = -59.0;

/// Default path-loss exponent (free space)
pub const DEFAULT_PATH_LOSS_EXPONENT: f64 = 2.0;

/// Estimate distance in meters from an RSSI reading
///
/// `10 ^ ((tx_power_at_1m - rssi) / (10 * exponent))`. No input is rejected;
/// degenerate inputs (zero exponent, NaN) propagate to the result.
pub fn rssi_to_distance(rssi: f64, tx_power_at_1m: f64, exponent: f64) -> f64 {
    10f64.powf((tx_power_at_1m - rssi) / (10.0 * exponent))
}

/// Calibrated path-loss model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathLossModel {
    pub tx_power_at_1m: f64,
    pub exponent: f64,
}

impl PathLossModel {
    pub fn new(tx_power_at_1m: f64, exponent: f64) -> Self {
        Self {
            tx_power_at_1m,
            exponent,
        }
    }

    /// Distance in meters for an RSSI reading
    pub fn distance(&self, rssi: f64) -> f64 {
        rssi_to_distance(rssi, self.tx_power_at_1m, self.exponent)
    }
}

impl Default for PathLossModel {
    fn default() -> Self {
        Self::new(DEFAULT_TX_POWER_AT_1M, DEFAULT_PATH_LOSS_EXPONENT)
    }
}

impl From<PathLossConfig> for PathLossModel {
    fn from(config: PathLossConfig) -> Self {
        Self::new(config.tx_power_at_1m, config.exponent)
    }
}
