use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::color::{self, Color, Snapshot, OFF};
use crate::config::BackendConfig;
use crate::error::LedError;

/// Number of render commands that may be queued for the backend.
const QUEUE_SIZE: usize = 16;

/// A full-array render command waiting for the backend.
#[derive(Debug)]
pub struct RenderRequest {
    pub command: Snapshot,
    /// Completed once the frame is on the LEDs
    pub ack: oneshot::Sender<Result<(), String>>,
}

/// The controller's side of the backend: render calls and the state feed.
#[derive(Debug, Clone)]
pub struct Gateway {
    tx: mpsc::Sender<RenderRequest>,
    state: watch::Receiver<Option<Snapshot>>,
}

/// The backend's side: incoming render commands and the state it reports back.
#[derive(Debug)]
pub struct Backend {
    pub rx: mpsc::Receiver<RenderRequest>,
    pub state: watch::Sender<Option<Snapshot>>,
}

pub fn channel() -> (Gateway, Backend) {
    let (tx, rx) = mpsc::channel(QUEUE_SIZE);
    let (state_tx, state_rx) = watch::channel(None);

    (
        Gateway {
            tx,
            state: state_rx,
        },
        Backend {
            rx,
            state: state_tx,
        },
    )
}

impl Gateway {
    /// Sends a frame and waits up to `wait` for the backend to show it.
    pub async fn send(&self, command: Snapshot, wait: Duration) -> Result<(), LedError> {
        let (ack, done) = oneshot::channel();

        let call = async {
            self.tx
                .send(RenderRequest { command, ack })
                .await
                .map_err(|_| LedError::BackendClosed)?;

            match done.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(LedError::BackendFailed(e)),
                Err(_) => Err(LedError::BackendClosed),
            }
        };

        match timeout(wait, call).await {
            Ok(result) => result,
            Err(_) => Err(LedError::BackendTimeout(wait)),
        }
    }

    /// The last state reported by the backend, if it reported anything yet.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.state.borrow().clone()
    }

    pub fn pixel_count(&self) -> Option<usize> {
        self.state.borrow().as_ref().map(|leds| leds.len())
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Snapshot>> {
        self.state.clone()
    }

    /// Waits for the backend's first state report and returns the number of LEDs.
    pub async fn wait_ready(&self, wait: Duration) -> Result<usize, LedError> {
        let mut state = self.state.clone();

        let ready = async {
            loop {
                let count = state.borrow().as_ref().map(|leds| leds.len());
                if let Some(count) = count {
                    return Some(count);
                }

                if state.changed().await.is_err() {
                    return None;
                }
            }
        };

        match timeout(wait, ready).await {
            Ok(Some(count)) => Ok(count),
            _ => Err(LedError::BackendUnavailable(wait)),
        }
    }
}

/// Applies a render command to the array and returns the pixels it did not fit.
fn apply(leds: &mut [Color], command: &Snapshot) -> usize {
    let mut dropped = 0;

    for pixel in command {
        match leds.get_mut(pixel.index) {
            Some(led) => *led = pixel.color(),
            None => dropped += 1,
        }
    }

    dropped
}

pub fn start(config: &BackendConfig, backend: Backend) -> JoinHandle<Result<()>> {
    match *config {
        BackendConfig::Simulator { led_count } => start_simulator(led_count, backend),
        #[cfg(feature = "ws281x")]
        BackendConfig::Ws281x {
            pin,
            led_count,
            brightness,
        } => strip::start(pin, led_count, brightness, backend),
        #[cfg(not(feature = "ws281x"))]
        BackendConfig::Ws281x { .. } => tokio::spawn(async {
            Err(anyhow::anyhow!(
                "This build has no WS281x support, rebuild with --features ws281x"
            ))
        }),
    }
}

/// An in-memory array that acknowledges every frame immediately.
pub fn start_simulator(led_count: usize, backend: Backend) -> JoinHandle<Result<()>> {
    let Backend { mut rx, state } = backend;

    tokio::spawn(async move {
        log::info!("Starting simulated lights with {} LEDs", led_count);

        let mut leds = vec![OFF; led_count];
        state.send_replace(Some(color::frame(leds.iter().copied())));

        while let Some(request) = rx.recv().await {
            log::trace!("Received colors {:?}", request.command);

            let dropped = apply(&mut leds, &request.command);
            if dropped > 0 {
                log::warn!("Ignored {} pixels past the end of the array", dropped);
            }

            state.send_replace(Some(color::frame(leds.iter().copied())));
            let _ = request.ack.send(Ok(()));
        }

        log::info!("Lights stopping");

        Ok(())
    })
}

#[cfg(feature = "ws281x")]
mod strip {
    use anyhow::Result;
    use rs_ws281x::{ChannelBuilder, ControllerBuilder, StripType};
    use tokio::task::JoinHandle;

    use super::{apply, Backend};
    use crate::color::{self, OFF};

    pub(super) fn start(
        pin: i32,
        led_count: usize,
        brightness: u8,
        backend: Backend,
    ) -> JoinHandle<Result<()>> {
        let Backend { mut rx, state } = backend;

        tokio::task::spawn_blocking(move || {
            log::info!("Starting Lights on pin {} with {} LEDs", pin, led_count);

            // Controller isn't Send, so it has to be built on the blocking thread
            let mut controller = match ControllerBuilder::new()
                .channel(
                    0,
                    ChannelBuilder::new()
                        .pin(pin)
                        .count(led_count as i32)
                        .strip_type(StripType::Ws2811Gbr)
                        .brightness(brightness)
                        .build(),
                )
                .build()
            {
                Ok(controller) => controller,
                Err(e) => {
                    log::error!("Failed to build controller: {}", e);
                    return Err(e.into());
                }
            };

            let mut leds = vec![OFF; led_count];
            state.send_replace(Some(color::frame(leds.iter().copied())));

            log::trace!("Entering main loop");

            while let Some(request) = rx.blocking_recv() {
                log::trace!("Received colors {:?}", request.command);

                apply(&mut leds, &request.command);

                for (led, color) in controller.leds_mut(0).iter_mut().zip(leds.iter()) {
                    *led = [color.r, color.g, color.b, 0];
                }

                let result = match controller.render() {
                    Ok(()) => {
                        log::trace!("Sucessfully set color");
                        state.send_replace(Some(color::frame(leds.iter().copied())));
                        Ok(())
                    }
                    Err(e) => {
                        log::error!("Failed to set color: {}", e);
                        Err(e.to_string())
                    }
                };

                let _ = request.ack.send(result);
            }

            log::info!("Lights stopping");

            Ok(())
        })
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::{Arc, Mutex};

    use tokio::sync::watch;
    use tokio::time::Instant;

    use super::*;

    #[derive(Debug, Clone)]
    pub struct Recorded {
        pub at: Instant,
        pub command: Snapshot,
    }

    impl Recorded {
        pub fn colors(&self) -> Vec<Color> {
            self.command.iter().map(|pixel| pixel.color()).collect()
        }
    }

    /// Test double for a backend: acknowledges and records every frame.
    pub struct Recorder {
        frames: Arc<Mutex<Vec<Recorded>>>,
        state: Arc<watch::Sender<Option<Snapshot>>>,
    }

    impl Recorder {
        pub fn frames(&self) -> Vec<Recorded> {
            self.frames.lock().unwrap().clone()
        }

        pub fn colors(&self) -> Vec<Vec<Color>> {
            self.frames().iter().map(Recorded::colors).collect()
        }

        pub fn clear(&self) {
            self.frames.lock().unwrap().clear();
        }

        /// Reports an array of `led_count` dark LEDs.
        pub fn publish(&self, led_count: usize) {
            self.state
                .send_replace(Some(color::frame(vec![OFF; led_count])));
        }
    }

    /// A backend that reports `led_count` LEDs, or nothing until [`Recorder::publish`].
    pub fn recording(led_count: Option<usize>) -> (Gateway, Recorder) {
        let (gateway, Backend { mut rx, state }) = channel();

        let recorder = Recorder {
            frames: Arc::new(Mutex::new(Vec::new())),
            state: Arc::new(state),
        };
        if let Some(led_count) = led_count {
            recorder.publish(led_count);
        }

        let frames = recorder.frames.clone();
        let state = recorder.state.clone();
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let mut leds: Vec<Color> = state
                    .borrow()
                    .as_ref()
                    .map(|leds| leds.iter().map(|pixel| pixel.color()).collect())
                    .unwrap_or_default();
                apply(&mut leds, &request.command);
                state.send_replace(Some(color::frame(leds)));

                frames.lock().unwrap().push(Recorded {
                    at: Instant::now(),
                    command: request.command,
                });
                let _ = request.ack.send(Ok(()));
            }
        });

        (gateway, recorder)
    }

    /// A backend that reports `led_count` LEDs and never acknowledges a frame.
    pub fn unresponsive(led_count: usize) -> (Gateway, Backend) {
        let (gateway, backend) = channel();
        backend
            .state
            .send_replace(Some(color::frame(vec![OFF; led_count])));

        (gateway, backend)
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::color::Pixel;

    #[tokio::test(start_paused = true)]
    async fn simulator_acknowledges_and_reports_state() {
        let (gateway, backend) = channel();
        let _lights = start_simulator(3, backend);

        assert_eq!(gateway.wait_ready(Duration::from_secs(1)).await, Ok(3));

        let command = color::frame(vec![Color::new(1, 2, 3); 3]);
        gateway
            .send(command.clone(), Duration::from_secs(15))
            .await
            .unwrap();

        assert_eq!(gateway.snapshot(), Some(command));
        assert_eq!(gateway.pixel_count(), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn simulator_ignores_pixels_past_the_end() {
        let (gateway, backend) = channel();
        let _lights = start_simulator(2, backend);
        gateway.wait_ready(Duration::from_secs(1)).await.unwrap();

        let command = vec![
            Pixel::new(1, Color::new(9, 9, 9)),
            Pixel::new(5, Color::new(7, 7, 7)),
        ];
        gateway.send(command, Duration::from_secs(15)).await.unwrap();

        assert_eq!(
            gateway.snapshot(),
            Some(color::frame(vec![OFF, Color::new(9, 9, 9)]))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn send_times_out() {
        let (gateway, _backend) = testing::unresponsive(3);
        let start = Instant::now();

        let result = gateway
            .send(color::frame(vec![OFF; 3]), Duration::from_secs(15))
            .await;

        assert_eq!(result, Err(LedError::BackendTimeout(Duration::from_secs(15))));
        assert!(start.elapsed() >= Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn send_to_stopped_backend() {
        let (gateway, backend) = channel();
        drop(backend);

        let result = gateway
            .send(color::frame(vec![OFF; 3]), Duration::from_secs(15))
            .await;

        assert_eq!(result, Err(LedError::BackendClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_backend_is_unavailable() {
        let (gateway, _backend) = channel();

        assert_eq!(
            gateway.wait_ready(Duration::from_secs(1)).await,
            Err(LedError::BackendUnavailable(Duration::from_secs(1)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn ready_once_state_arrives() {
        let (gateway, backend) = channel();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            backend.state.send_replace(Some(color::frame(vec![OFF; 4])));
            // Keep the sender alive past the wait
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        assert_eq!(gateway.wait_ready(Duration::from_secs(1)).await, Ok(4));
    }
}
