use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::sleep;

pub mod render;
pub mod scheduler;

use crate::color::{Color, Snapshot, OFF};
use crate::config::Timing;
use crate::effect::{EffectKind, EffectRequest, EffectResponse, Mode};
use crate::error::LedError;
use crate::lights::Gateway;
use render::Renderer;
use scheduler::Scheduler;

/// Frame interval of the fade effect
const FADE_FRAME: Duration = Duration::from_millis(50);

/// An effect request together with where to send its response.
pub type Request = (EffectRequest, oneshot::Sender<EffectResponse>);

/// The effect currently on the LEDs.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectState {
    pub kind: EffectKind,
    pub color: Color,
    /// Scheduler ticks since the effect was set
    pub tick: u32,
    /// What the LEDs showed when the effect was set
    pub snapshot: Snapshot,
}

impl EffectState {
    fn start_color(&self, index: usize) -> Color {
        self.snapshot
            .get(index)
            .map(|pixel| pixel.color())
            .unwrap_or(OFF)
    }
}

/// What one tick of a periodic effect should show.
#[derive(Debug, PartialEq)]
enum Frame {
    Colors { colors: Vec<Color>, finished: bool },
    Rainbow { phase: u8, spread: bool },
}

enum Event {
    Request(Option<Request>),
    State(bool),
    Tick,
}

pub struct EffectController {
    timing: Timing,
    renderer: Renderer,
    scheduler: Scheduler,
    current: Option<EffectState>,
    state: watch::Receiver<Option<Snapshot>>,
    /// A fill was accepted before the LED count was known
    deferred: bool,
}

impl EffectController {
    pub fn new(timing: Timing, gateway: Gateway, render_timeout: Duration) -> EffectController {
        EffectController {
            timing,
            state: gateway.subscribe(),
            renderer: Renderer::new(gateway, render_timeout),
            scheduler: Scheduler::new(),
            current: None,
            deferred: false,
        }
    }

    #[cfg(test)]
    pub fn current(&self) -> Option<&EffectState> {
        self.current.as_ref()
    }

    /// Serves requests until every request sender is gone.
    ///
    /// Requests, state updates and ticks are handled one at a time, so a new effect
    /// replaces the timer before any other tick can run.
    pub async fn run(mut self, mut requests: mpsc::Receiver<Request>) -> Result<()> {
        log::info!("Effect controller running");

        loop {
            let event = tokio::select! {
                request = requests.recv() => Event::Request(request),
                changed = self.state.changed() => Event::State(changed.is_ok()),
                _ = self.scheduler.tick() => Event::Tick,
            };

            match event {
                Event::Request(Some((request, reply))) => {
                    let response = self.submit(request).await;
                    if reply.send(response).is_err() {
                        log::debug!("Requester left before the response was ready");
                    }
                }
                Event::Request(None) => {
                    log::info!("No more effect requests, stopping");
                    return Ok(());
                }
                Event::State(true) => self.state_updated().await,
                Event::State(false) => return Err(anyhow!("Backend state feed closed")),
                Event::Tick => self.advance().await,
            }
        }
    }

    pub async fn submit(&mut self, request: EffectRequest) -> EffectResponse {
        let kind = match request.effect.parse::<EffectKind>() {
            Ok(kind) => kind,
            Err(e) => {
                log::error!("{}", e);
                return EffectResponse::failed(&e);
            }
        };
        let color = request.color();

        // Flash and fill always run again
        if kind.mode() == Mode::Periodic {
            if let Some(current) = &self.current {
                if current.kind == kind && current.color == color {
                    log::debug!("Effect {} already set, skip", kind.name());
                    return EffectResponse::skipped();
                }
            }
        }

        log::info!(
            "Setting effect {} ({}, {}, {})",
            kind.name(),
            color.r,
            color.g,
            color.b
        );

        match kind.mode() {
            Mode::Transient => {
                self.flash(color).await;
                return EffectResponse::ok();
            }
            Mode::Static => {
                self.scheduler.disarm();
                self.deferred = self.renderer.fill(color).await == Err(LedError::NotReady);
            }
            Mode::Periodic => {
                self.deferred = false;
                let period = self.period(kind);
                self.scheduler.arm(period);
            }
        }

        self.current = Some(EffectState {
            kind,
            color,
            tick: 0,
            snapshot: self.renderer.snapshot(),
        });

        EffectResponse::ok()
    }

    /// Runs one scheduler tick of the current effect.
    pub async fn advance(&mut self) {
        let count = match self.renderer.pixel_count() {
            Some(count) => count,
            None => {
                log::debug!("LED count unknown, skipping tick");
                return;
            }
        };

        let frame = match self.current.as_mut() {
            Some(state) if state.kind.mode() == Mode::Periodic => {
                state.tick = state.tick.saturating_add(1);
                frame_at(state, count, &self.timing)
            }
            _ => {
                self.scheduler.disarm();
                return;
            }
        };

        let rendered = match frame {
            Frame::Colors { colors, finished } => {
                if finished {
                    log::debug!("Effect finished, stopping ticks");
                    self.scheduler.disarm();
                }
                self.renderer.frame(colors).await
            }
            Frame::Rainbow { phase, spread } => self.renderer.rainbow(phase, spread).await,
        };
        // The renderer logs failed frames
        rendered.ok();
    }

    /// Blinks `color` once and puts back a steady effect that was showing before.
    ///
    /// Blocks the controller for five flash delays.
    async fn flash(&mut self, color: Color) {
        let steps = [Some(OFF), Some(color), Some(OFF), None, Some(OFF)];

        for step in steps.iter() {
            if let Some(step) = step {
                self.renderer.fill(*step).await.ok();
            }
            sleep(self.timing.flash_delay).await;
        }

        let restore = match &self.current {
            Some(state) => match state.kind {
                EffectKind::Fill | EffectKind::Fade | EffectKind::Wipe => {
                    Some((state.color, state.snapshot.len()))
                }
                _ => None,
            },
            None => None,
        };

        if let Some((restore, count)) = restore {
            log::debug!("Restoring previous fill on {} LEDs after flash", count);
            for _ in 0..count {
                self.renderer.fill(restore).await.ok();
            }
            self.renderer.fill(restore).await.ok();
        }
    }

    /// Called whenever the backend reports new state.
    async fn state_updated(&mut self) {
        if !self.deferred || self.renderer.pixel_count().is_none() {
            return;
        }
        self.deferred = false;

        let color = match &self.current {
            Some(state) if state.kind == EffectKind::Fill => state.color,
            _ => return,
        };

        log::info!("LED count known, rendering deferred fill");
        self.renderer.fill(color).await.ok();
    }

    fn period(&self, kind: EffectKind) -> Duration {
        match kind {
            EffectKind::Blink => self.timing.blink_period,
            EffectKind::BlinkFast => self.timing.blink_fast_period,
            EffectKind::Fade => FADE_FRAME,
            EffectKind::Wipe => {
                let count = self.renderer.pixel_count().unwrap_or(1).max(1);
                self.timing.wipe_period / count as u32
            }
            EffectKind::Rainbow | EffectKind::RainbowFill => self.timing.rainbow_period / 255,
            EffectKind::Fill | EffectKind::Flash => Duration::from_secs(0),
        }
    }
}

/// The frame a periodic effect shows on its `state.tick`th tick.
fn frame_at(state: &EffectState, count: usize, timing: &Timing) -> Frame {
    let tick = state.tick;

    match state.kind {
        EffectKind::Blink | EffectKind::BlinkFast => {
            let color = if tick % 2 == 1 { state.color } else { OFF };
            Frame::Colors {
                colors: vec![color; count],
                finished: false,
            }
        }
        EffectKind::Fade => {
            let elapsed = FADE_FRAME * tick;
            let passed = (elapsed.as_secs_f64() / timing.fade_period.as_secs_f64()).min(1.0);
            Frame::Colors {
                colors: (0..count)
                    .map(|i| state.start_color(i).lerp(state.color, passed))
                    .collect(),
                finished: passed >= 1.0,
            }
        }
        EffectKind::Wipe => {
            let reached = tick as usize;
            Frame::Colors {
                colors: (0..count)
                    .map(|i| {
                        if i < reached {
                            state.color
                        } else {
                            state.start_color(i)
                        }
                    })
                    .collect(),
                finished: reached >= count,
            }
        }
        EffectKind::RainbowFill => Frame::Rainbow {
            phase: (tick % 255) as u8,
            spread: false,
        },
        EffectKind::Rainbow => Frame::Rainbow {
            phase: (tick % 255) as u8,
            spread: true,
        },
        // Never scheduled
        EffectKind::Fill | EffectKind::Flash => Frame::Colors {
            colors: vec![state.color; count],
            finished: true,
        },
    }
}
