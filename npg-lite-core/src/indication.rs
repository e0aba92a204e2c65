//! Status indication
//!
//! Session events shown on the status pixel. The sink is output only, core
//! logic never reads it back.

/// Hue in degrees on the HSV wheel
pub type Hue = u16;

pub const RED: Hue = 0;
pub const YELLOW: Hue = 60;
pub const GREEN: Hue = 120;
pub const BLUE: Hue = 240;

/// Pixel used for session status
pub const STATUS_PIXEL: u8 = 0;

/// Brightness (%) for routine status
const STATUS_BRIGHTNESS: u8 = 10;

/// Brightness (%) for the low-battery warning
const WARNING_BRIGHTNESS: u8 = 40;

/// Something the device wants to show the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Indication {
    /// A host connected
    Connected,
    /// The host went away
    Disconnected,
    /// Streaming enabled by `START`
    Streaming,
    /// Streaming disabled by `STOP`
    Stopped,
    /// Session halted by the battery cutoff
    LowBattery,
}

impl Indication {
    /// (pixel, hue, brightness %) to show for this indication
    pub const fn pixel(self) -> (u8, Hue, u8) {
        match self {
            Indication::Connected => (STATUS_PIXEL, GREEN, STATUS_BRIGHTNESS),
            Indication::Disconnected => (STATUS_PIXEL, RED, STATUS_BRIGHTNESS),
            Indication::Streaming => (STATUS_PIXEL, BLUE, STATUS_BRIGHTNESS),
            Indication::Stopped => (STATUS_PIXEL, GREEN, STATUS_BRIGHTNESS),
            Indication::LowBattery => (STATUS_PIXEL, YELLOW, WARNING_BRIGHTNESS),
        }
    }

    /// Pushes this indication to a sink
    pub fn show<S: IndicatorSink>(self, sink: &mut S) {
        let (index, hue, brightness) = self.pixel();
        sink.set_pixel(index, hue, brightness);
    }
}

/// Multi-pixel status output
pub trait IndicatorSink {
    /// Sets one pixel to fully saturated `hue` at `brightness` percent
    fn set_pixel(&mut self, index: u8, hue: Hue, brightness: u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder(Vec<(u8, Hue, u8)>);

    impl IndicatorSink for Recorder {
        fn set_pixel(&mut self, index: u8, hue: Hue, brightness: u8) {
            self.0.push((index, hue, brightness));
        }
    }

    #[test]
    fn low_battery_stands_out() {
        let (_, hue, brightness) = Indication::LowBattery.pixel();
        assert_eq!(hue, YELLOW);
        assert!(brightness > Indication::Connected.pixel().2);
    }

    #[test]
    fn show_forwards_the_triple() {
        let mut sink = Recorder(Vec::new());
        Indication::Streaming.show(&mut sink);
        Indication::Disconnected.show(&mut sink);
        assert_eq!(sink.0, vec![(0, BLUE, 10), (0, RED, 10)]);
    }
}
