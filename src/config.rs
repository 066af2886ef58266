use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_FPS: u32 = 30;
pub const MIN_FPS: u32 = 1;
pub const MAX_FPS: u32 = 1000;
pub const DEFAULT_CARTDATA_DIR: &str = "cartdata";
pub const DEFAULT_PRESENT_TIMEOUT: Duration = Duration::from_millis(100);

/// Runtime settings fixed for the life of a machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// logic ticks per second
    pub fps: u32,
    /// where cartdata records live, one file per id
    pub cartdata_dir: PathBuf,
    /// longest wait for an asynchronous present to finish
    pub present_timeout: Duration,
    /// run carts without asking the compatibility checker
    pub skip_compat_check: bool,
    /// return right after init when the script has no update/draw callbacks
    pub skip_main_loop_if_idle: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            fps: DEFAULT_FPS,
            cartdata_dir: PathBuf::from(DEFAULT_CARTDATA_DIR),
            present_timeout: DEFAULT_PRESENT_TIMEOUT,
            skip_compat_check: false,
            skip_main_loop_if_idle: false,
        }
    }
}

impl Config {
    /// `fps` held to what the scheduler can pace
    pub fn tick_rate(&self) -> u32 {
        self.fps.clamp(MIN_FPS, MAX_FPS)
    }

    /// target duration of one logic tick, in whole milliseconds
    pub fn target_tick_ms(&self) -> i64 {
        1000 / self.tick_rate() as i64
    }
}
