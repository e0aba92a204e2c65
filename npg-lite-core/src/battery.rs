//! Battery Estimator
//!
//! Converts the averaged battery code of one conversion frame into a charge
//! estimate and decides the low-battery cutoff.
//!
//! # Voltage Calculation
//! ```text
//! Battery mV = code * 3300 mV * 3 / 4096
//! Where:
//! - 3300 mV is the ADC reference
//! - 3 is the divider ratio in front of the battery tap
//! - 4096 is the ADC range (12-bit)
//! ```
//!
//! # Charge Level
//! Piecewise-linear over a 21-point Li-Ion discharge curve, 3.27 V (0 %) to
//! 4.20 V (100 %) in 5 % steps. Everything is integer arithmetic, this runs
//! once per packet on the sampling path.

use crate::config::{ADC_CODE_MASK, AcquisitionConfig, BATTERY_CUTOFF_PERCENT};

/// ADC reference (mV)
const REF_MILLIVOLTS: u32 = 3300;

/// Divider ratio in front of the battery tap
const V_DIVIDER_RATIO: u32 = 3;

/// ADC range (12-bit = 4096 steps)
const ADC_RANGE: u32 = 4096;

/// Discharge curve: (millivolts, percent), ascending in both
const DISCHARGE_CURVE: [(u32, u8); 21] = [
    (3270, 0),
    (3610, 5),
    (3690, 10),
    (3710, 15),
    (3730, 20),
    (3750, 25),
    (3770, 30),
    (3790, 35),
    (3800, 40),
    (3820, 45),
    (3840, 50),
    (3850, 55),
    (3870, 60),
    (3910, 65),
    (3950, 70),
    (3980, 75),
    (4020, 80),
    (4080, 85),
    (4110, 90),
    (4150, 95),
    (4200, 100),
];

/// Battery voltage for a raw code
pub const fn raw_to_millivolts(raw: u16) -> u32 {
    (raw & ADC_CODE_MASK) as u32 * REF_MILLIVOLTS * V_DIVIDER_RATIO / ADC_RANGE
}

/// Charge percentage for a battery voltage
pub fn percent_from_millivolts(millivolts: u32) -> u8 {
    let (lowest_mv, lowest_percent) = DISCHARGE_CURVE[0];
    if millivolts <= lowest_mv {
        return lowest_percent;
    }

    for pair in DISCHARGE_CURVE.windows(2) {
        let (v0, p0) = pair[0];
        let (v1, p1) = pair[1];
        if millivolts <= v1 {
            let span = u32::from(p1 - p0);
            return p0 + ((millivolts - v0) * span / (v1 - v0)) as u8;
        }
    }

    DISCHARGE_CURVE[DISCHARGE_CURVE.len() - 1].1
}

/// Mean battery code of a frame, `None` when the layout has no battery tap
pub fn mean_battery_code(frame: &[u16], config: &AcquisitionConfig) -> Option<u16> {
    let slot = config.battery_slot()?;
    let mut sum: u32 = 0;
    let mut count: u32 = 0;
    for stride in frame.chunks_exact(config.stride()) {
        sum += u32::from(stride[slot] & ADC_CODE_MASK);
        count += 1;
    }
    if count == 0 { None } else { Some((sum / count) as u16) }
}

/// Battery charge derived from one averaged reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryEstimate {
    pub millivolts: u32,
    /// 0-100
    pub percent: u8,
}

impl BatteryEstimate {
    pub fn from_raw(raw: u16) -> Self {
        let millivolts = raw_to_millivolts(raw);
        Self {
            millivolts,
            percent: percent_from_millivolts(millivolts),
        }
    }

    /// Below the cutoff threshold
    pub fn is_critical(&self) -> bool {
        self.percent < BATTERY_CUTOFF_PERCENT
    }
}

/// Result of assessing one reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    pub estimate: BatteryEstimate,
    /// True for the single reading that crosses into the critical range
    pub cutoff: bool,
}

/// Tracks readings over a session and latches the cutoff decision
#[derive(Debug, Default)]
pub struct BatteryMonitor {
    tripped: bool,
}

impl BatteryMonitor {
    pub const fn new() -> Self {
        Self { tripped: false }
    }

    pub fn assess(&mut self, raw: u16) -> Assessment {
        let estimate = BatteryEstimate::from_raw(raw);
        let cutoff = !self.tripped && estimate.is_critical();
        if cutoff {
            self.tripped = true;
        }
        Assessment { estimate, cutoff }
    }

    /// Whether the cutoff has fired this session
    #[cfg(test)]
    pub fn tripped(&self) -> bool {
        self.tripped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BatteryTap, ChannelSet};

    #[test]
    fn below_lowest_anchor_is_empty() {
        assert_eq!(percent_from_millivolts(0), 0);
        assert_eq!(percent_from_millivolts(3269), 0);
        assert_eq!(percent_from_millivolts(3270), 0);
    }

    #[test]
    fn above_highest_anchor_is_full() {
        assert_eq!(percent_from_millivolts(4200), 100);
        assert_eq!(percent_from_millivolts(4201), 100);
        assert_eq!(percent_from_millivolts(9900), 100);
    }

    #[test]
    fn anchors_map_exactly() {
        for (mv, percent) in DISCHARGE_CURVE {
            assert_eq!(percent_from_millivolts(mv), percent, "anchor {mv} mV");
        }
    }

    #[test]
    fn between_anchors_is_interpolated() {
        // halfway between 3800 (40 %) and 3820 (45 %)
        assert_eq!(percent_from_millivolts(3810), 42);
        // 3270 + 272 mV of a 340 mV span towards 5 %
        assert_eq!(percent_from_millivolts(3542), 4);
    }

    #[test]
    fn percent_never_decreases_with_voltage() {
        let mut previous = 0;
        for mv in 3000..4400 {
            let percent = percent_from_millivolts(mv);
            assert!(percent >= previous, "{mv} mV dropped to {percent} %");
            previous = percent;
        }
    }

    #[test]
    fn raw_code_uses_reference_and_divider() {
        assert_eq!(raw_to_millivolts(0), 0);
        assert_eq!(raw_to_millivolts(4095), 4095 * 9900 / 4096);
        assert_eq!(raw_to_millivolts(1515), 3661);
    }

    #[test]
    fn mean_is_taken_over_the_battery_slot_only() {
        let config = AcquisitionConfig {
            channels: ChannelSet::Primary,
            battery: BatteryTap::Multiplexed,
        };
        let mut frame = vec![4095u16; config.frame_len()];
        for (i, stride) in frame.chunks_exact_mut(4).enumerate() {
            stride[3] = if i % 2 == 0 { 1000 } else { 1010 };
        }
        // 13 x 1000 + 12 x 1010 over 25
        assert_eq!(mean_battery_code(&frame, &config), Some(1004));
    }

    #[test]
    fn no_battery_tap_means_no_reading() {
        let config = AcquisitionConfig {
            channels: ChannelSet::Primary,
            battery: BatteryTap::None,
        };
        let frame = vec![0u16; config.frame_len()];
        assert_eq!(mean_battery_code(&frame, &config), None);
    }

    #[test]
    fn cutoff_latches_on_first_critical_reading() {
        let mut monitor = BatteryMonitor::new();
        // 8 %
        let first = monitor.assess(1515);
        assert_eq!(first.estimate.percent, 8);
        assert!(!first.cutoff);
        // 4 %
        let second = monitor.assess(1466);
        assert_eq!(second.estimate.percent, 4);
        assert!(second.cutoff);
        let third = monitor.assess(1400);
        assert!(!third.cutoff);
        assert!(third.estimate.is_critical());
        assert!(monitor.tripped());
    }
}
