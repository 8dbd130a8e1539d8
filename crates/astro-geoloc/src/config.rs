/// Command line / environment configuration.
use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::transport::{
    astrocast::DEFAULT_API_URL,
    mqtt::{DEFAULT_MQTT_HOST, DEFAULT_MQTT_PORT},
};

/// Fetch AstroTracker messages from Astrocast, decode them and export `<output>.csv` and
/// `<output>.html`.
#[derive(Parser, Debug, Clone)]
#[command(name = "astro-geoloc")]
#[command(version)]
pub struct Config {
    /// Astrocast API token
    #[arg(long, env = "ASTROCAST_API_TOKEN", hide_env_values = true)]
    pub api_token: String,

    /// Astrocast device GUID
    #[arg(long, env = "ASTROCAST_DEVICE_GUID")]
    pub device_guid: String,

    /// Astrocast API base URL
    #[arg(long, default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Only fetch messages received after this date, e.g. 2022-10-01T00:00:00
    #[arg(long)]
    pub start: String,

    /// Output file stem
    #[arg(short, long)]
    pub output: String,

    /// Thingstream MQTT broker host
    #[arg(long, default_value = DEFAULT_MQTT_HOST)]
    pub mqtt_host: String,

    #[arg(long, default_value_t = DEFAULT_MQTT_PORT)]
    pub mqtt_port: u16,

    /// Thingstream device id, also used as MQTT client id (e.g. "device:...")
    #[arg(long, env = "THINGSTREAM_DEVICE_ID")]
    pub mqtt_device_id: String,

    #[arg(long, env = "THINGSTREAM_USERNAME")]
    pub mqtt_username: String,

    #[arg(long, env = "THINGSTREAM_PASSWORD", hide_env_values = true)]
    pub mqtt_password: String,

    /// Seconds to wait for a CloudLocate answer
    #[arg(long, default_value_t = 60)]
    pub response_timeout: u64,

    /// Decode each message on its own instead of carrying fields over from the previous one
    #[arg(long)]
    pub no_carry_forward: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Config {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout)
    }

    pub fn carry_forward(&self) -> bool {
        !self.no_carry_forward
    }
}
