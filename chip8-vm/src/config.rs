//! Machine configuration

use chip8_jit::JitConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Execution engine settings. Missing fields take their defaults when
/// deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Instruction cycles per second
    pub clock_hz: u32,
    /// Timer decrements per second
    pub timer_hz: u32,
    /// Sleep between cycles to hold `clock_hz`
    pub pace: bool,
    pub jit: JitConfig,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            clock_hz: 480,
            timer_hz: 60,
            pace: true,
            jit: JitConfig::default(),
        }
    }
}

impl VmConfig {
    /// Target wall-clock duration of one cycle.
    pub fn cycle_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.clock_hz.max(1)))
    }

    /// Cycles between two timer ticks, never zero.
    pub fn timer_divider(&self) -> u64 {
        u64::from((self.clock_hz / self.timer_hz.max(1)).max(1))
    }
}
