//! Status LED Module
//!
//! Shows the latest [`Indication`] on the six-pixel WS2812 strip. The
//! indication is held until the next one arrives; other pixels stay dark.
use crate::system::indicator;
use crate::system::resources::{Irqs, StatusLedResources};
use defmt::{info, warn};
use embassy_rp::pio::Pio;
use embassy_rp::pio_programs::ws2812::{PioWs2812, PioWs2812Program};
use npg_lite_core::IndicatorSink;
use npg_lite_core::indication::Hue;
use smart_leds::RGB8;
use smart_leds::hsv::{Hsv, hsv2rgb};

/// Number of pixels on the strip
const NUM_PIXELS: usize = 6;

/// Frame buffer for the strip
struct Strip {
    pixels: [RGB8; NUM_PIXELS],
}

impl IndicatorSink for Strip {
    fn set_pixel(&mut self, index: u8, hue: Hue, brightness: u8) {
        let Some(pixel) = self.pixels.get_mut(index as usize) else {
            warn!("LED index {} out of range ({} pixels)", index, NUM_PIXELS);
            return;
        };
        // smart-leds works on a 0-255 wheel and 0-255 value
        *pixel = hsv2rgb(Hsv {
            hue: ((hue as u32 % 360) * 256 / 360) as u8,
            sat: 255,
            val: (brightness.min(100) as u32 * 255 / 100) as u8,
        });
    }
}

/// Drives the strip from indicator updates
#[embassy_executor::task]
pub async fn status_led(r: StatusLedResources) {
    let Pio { mut common, sm0, .. } = Pio::new(r.pio, Irqs);
    let program = PioWs2812Program::new(&mut common);
    let mut ws2812 = PioWs2812::new(&mut common, sm0, r.dma, r.pin, &program);

    let mut strip = Strip {
        pixels: [RGB8::default(); NUM_PIXELS],
    };
    ws2812.write(&strip.pixels).await;

    loop {
        let indication = indicator::wait().await;
        info!("Indication: {:?}", indication);
        indication.show(&mut strip);
        ws2812.write(&strip.pixels).await;
    }
}
