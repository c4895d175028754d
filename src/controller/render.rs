use std::iter;
use std::time::Duration;

use crate::color::{self, rainbow, Color, Snapshot};
use crate::error::LedError;
use crate::lights::Gateway;

/// Turns colors into full-array render commands and hands them to the backend.
pub struct Renderer {
    gateway: Gateway,
    timeout: Duration,
}

impl Renderer {
    pub fn new(gateway: Gateway, timeout: Duration) -> Renderer {
        Renderer { gateway, timeout }
    }

    pub fn pixel_count(&self) -> Option<usize> {
        self.gateway.pixel_count()
    }

    /// The last state reported by the backend, empty if it reported nothing yet.
    pub fn snapshot(&self) -> Snapshot {
        self.gateway.snapshot().unwrap_or_default()
    }

    pub async fn fill(&self, color: Color) -> Result<(), LedError> {
        let count = self.ready_count()?;
        self.send(color::frame(iter::repeat(color).take(count))).await
    }

    /// Renders one rainbow frame.
    ///
    /// With `spread` the rainbow is stretched over the whole array, otherwise every
    /// LED shows the color for `phase`.
    pub async fn rainbow(&self, phase: u8, spread: bool) -> Result<(), LedError> {
        let count = self.ready_count()?;

        let colors = (0..count).map(|index| {
            if spread {
                rainbow(spread_phase(phase, index, count))
            } else {
                rainbow(phase)
            }
        });

        self.send(color::frame(colors)).await
    }

    /// Renders one color per LED. The list must cover the whole array.
    pub async fn frame(&self, colors: Vec<Color>) -> Result<(), LedError> {
        let count = self.ready_count()?;
        if colors.len() != count {
            log::warn!(
                "Frame size ({}) doesn't match LED count ({})",
                colors.len(),
                count
            );
        }

        self.send(color::frame(colors)).await
    }

    fn ready_count(&self) -> Result<usize, LedError> {
        match self.pixel_count() {
            Some(count) => Ok(count),
            None => {
                log::warn!("Skipping frame: {}", LedError::NotReady);
                Err(LedError::NotReady)
            }
        }
    }

    async fn send(&self, command: Snapshot) -> Result<(), LedError> {
        match self.gateway.send(command, self.timeout).await {
            Ok(()) => {
                log::debug!("Successfully called leds");
                Ok(())
            }
            Err(e) => {
                log::warn!("Calling set_leds failed: {}", e);
                Err(e)
            }
        }
    }
}

/// Phase of LED `index` when a rainbow starting at `phase` is spread over `count` LEDs.
///
/// Phases run over `0..255` like the rainbow fill counter does.
pub fn spread_phase(phase: u8, index: usize, count: usize) -> u8 {
    let offset = (255 * index + count / 2) / count.max(1);
    ((phase as usize + offset) % 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::OFF;
    use crate::lights::testing;

    #[test]
    fn spread_covers_the_wheel() {
        assert_eq!(spread_phase(0, 0, 3), 0);
        assert_eq!(spread_phase(0, 1, 3), 85);
        assert_eq!(spread_phase(0, 2, 3), 170);
        assert_eq!(spread_phase(1, 2, 3), 171);
        assert_eq!(spread_phase(100, 2, 3), 15);
        assert_eq!(spread_phase(254, 0, 1), 254);
    }

    #[tokio::test(start_paused = true)]
    async fn fill_covers_every_led() {
        let (gateway, recorder) = testing::recording(Some(4));
        let renderer = Renderer::new(gateway, Duration::from_secs(15));

        renderer.fill(Color::new(1, 2, 3)).await.unwrap();

        let frames = recorder.frames();
        assert_eq!(frames.len(), 1);
        let indices: Vec<usize> = frames[0].command.iter().map(|pixel| pixel.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(frames[0].colors(), vec![Color::new(1, 2, 3); 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn rainbow_fill_is_uniform() {
        let (gateway, recorder) = testing::recording(Some(3));
        let renderer = Renderer::new(gateway, Duration::from_secs(15));

        renderer.rainbow(10, false).await.unwrap();

        assert_eq!(recorder.colors(), vec![vec![rainbow(10); 3]]);
    }

    #[tokio::test(start_paused = true)]
    async fn rainbow_spreads() {
        let (gateway, recorder) = testing::recording(Some(3));
        let renderer = Renderer::new(gateway, Duration::from_secs(15));

        renderer.rainbow(1, true).await.unwrap();

        assert_eq!(
            recorder.colors(),
            vec![vec![rainbow(1), rainbow(86), rainbow(171)]]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_is_sent_before_the_led_count_is_known() {
        let (gateway, recorder) = testing::recording(None);
        let renderer = Renderer::new(gateway, Duration::from_secs(15));

        assert_eq!(renderer.fill(OFF).await, Err(LedError::NotReady));
        assert_eq!(renderer.rainbow(0, true).await, Err(LedError::NotReady));
        assert!(recorder.frames().is_empty());
        assert!(renderer.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_reported() {
        let (gateway, _backend) = testing::unresponsive(2);
        let renderer = Renderer::new(gateway, Duration::from_secs(15));

        assert_eq!(
            renderer.fill(OFF).await,
            Err(LedError::BackendTimeout(Duration::from_secs(15)))
        );
    }
}
