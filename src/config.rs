use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::LevelFilter;
use serde::Deserialize;

const DEFAULT_LED_COUNT: usize = 58;

/// Longest period or timeout the controller accepts
const MAX_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Everything read from the configuration file. All durations are in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub blink_rate: f64,
    /// Defaults to twice `blink_rate`
    pub blink_fast_rate: Option<f64>,
    pub fade_period: f64,
    pub wipe_period: f64,
    pub flash_delay: f64,
    pub rainbow_period: f64,
    /// Reserved for the low battery notification
    #[allow(dead_code)]
    pub low_battery_threshold: f64,

    /// How long a render waits for the backend to acknowledge it
    pub render_timeout: f64,
    /// How long startup waits for the backend to report its state
    pub backend_wait: f64,

    pub listen: SocketAddr,
    pub log_level: String,
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Keeps the array in memory and logs every frame
    Simulator {
        #[serde(default = "default_led_count")]
        led_count: usize,
    },
    /// A WS281x strip on a GPIO pin
    Ws281x {
        #[serde(default = "default_pin")]
        pin: i32,
        #[serde(default = "default_led_count")]
        led_count: usize,
        #[serde(default = "default_brightness")]
        brightness: u8,
    },
}

fn default_led_count() -> usize {
    DEFAULT_LED_COUNT
}

fn default_pin() -> i32 {
    18
}

fn default_brightness() -> u8 {
    255
}

impl Default for Config {
    fn default() -> Self {
        Config {
            blink_rate: 2.0,
            blink_fast_rate: None,
            fade_period: 0.5,
            wipe_period: 0.5,
            flash_delay: 0.1,
            rainbow_period: 5.0,
            low_battery_threshold: 3.7,
            render_timeout: 15.0,
            backend_wait: 1.0,
            listen: SocketAddr::from(([127, 0, 0, 1], 7070)),
            log_level: "info".to_string(),
            backend: BackendConfig::Simulator {
                led_count: DEFAULT_LED_COUNT,
            },
        }
    }
}

/// The effect timing, fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    pub blink_period: Duration,
    pub blink_fast_period: Duration,
    pub fade_period: Duration,
    pub wipe_period: Duration,
    pub flash_delay: Duration,
    pub rainbow_period: Duration,
}

impl Config {
    /// Reads the JSON configuration at `path`, or the defaults when there is none.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read(path)
                    .with_context(|| format!("Error reading config file {}", path.display()))?;
                Config::parse(&raw)
                    .with_context(|| format!("Error loading config file {}", path.display()))?
            }
            None => Config::default(),
        };

        // Reject bad values at startup rather than on the first effect that uses them
        config.timing()?;
        config.log_level()?;
        config.render_timeout()?;
        config.backend_wait()?;

        Ok(config)
    }

    fn parse(raw: &[u8]) -> Result<Config> {
        serde_json::from_slice(raw).context("Error while parsing config JSON")
    }

    pub fn timing(&self) -> Result<Timing> {
        let blink_rate = positive("blink_rate", self.blink_rate)?;
        let blink_fast_rate = positive(
            "blink_fast_rate",
            self.blink_fast_rate.unwrap_or(blink_rate * 2.0),
        )?;

        Ok(Timing {
            blink_period: seconds("1 / blink_rate", 1.0 / blink_rate)?,
            blink_fast_period: seconds("1 / blink_fast_rate", 1.0 / blink_fast_rate)?,
            fade_period: seconds("fade_period", self.fade_period)?,
            wipe_period: seconds("wipe_period", self.wipe_period)?,
            flash_delay: seconds("flash_delay", self.flash_delay)?,
            rainbow_period: seconds("rainbow_period", self.rainbow_period)?,
        })
    }

    pub fn render_timeout(&self) -> Result<Duration> {
        seconds("render_timeout", self.render_timeout)
    }

    pub fn backend_wait(&self) -> Result<Duration> {
        seconds("backend_wait", self.backend_wait)
    }

    pub fn log_level(&self) -> Result<LevelFilter> {
        self.log_level
            .parse()
            .map_err(|_| anyhow!("Invalid log_level {:?}", self.log_level))
    }
}

fn positive(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(anyhow!("{} must be a positive number of seconds, got {}", name, value))
    }
}

fn seconds(name: &str, value: f64) -> Result<Duration> {
    let duration = Duration::try_from_secs_f64(positive(name, value)?)
        .with_context(|| format!("{} of {} seconds is out of range", name, value))?;

    if duration.is_zero() {
        return Err(anyhow!("{} of {} seconds rounds to zero", name, value));
    }
    if duration > MAX_PERIOD {
        return Err(anyhow!(
            "{} must be at most {} seconds, got {}",
            name,
            MAX_PERIOD.as_secs(),
            value
        ));
    }

    Ok(duration)
}
