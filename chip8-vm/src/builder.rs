//! Builder for constructing a machine

use chip8_core::{HeadlessPeripheral, Peripheral};
use chip8_jit::JitConfig;

use crate::config::VmConfig;
use crate::error::Result;
use crate::machine::Machine;

/// Builder for a [`Machine`] with an optional program image.
pub struct MachineBuilder<P: Peripheral> {
    config: VmConfig,
    peripheral: P,
    program: Option<Vec<u8>>,
}

impl MachineBuilder<HeadlessPeripheral> {
    /// Start from the default config and a headless peripheral.
    pub fn new() -> Self {
        Self::with_peripheral(HeadlessPeripheral::new())
    }
}

impl Default for MachineBuilder<HeadlessPeripheral> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Peripheral> MachineBuilder<P> {
    pub fn with_peripheral(peripheral: P) -> Self {
        Self {
            config: VmConfig::default(),
            peripheral,
            program: None,
        }
    }

    /// Replace the whole configuration
    pub fn with_config(mut self, config: VmConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_jit(mut self, jit: JitConfig) -> Self {
        self.config.jit = jit;
        self
    }

    /// Run purely interpreted
    pub fn without_jit(mut self) -> Self {
        self.config.jit.enabled = false;
        self
    }

    /// Disable cycle pacing, running as fast as the host allows
    pub fn unpaced(mut self) -> Self {
        self.config.pace = false;
        self
    }

    pub fn with_program(mut self, image: impl Into<Vec<u8>>) -> Self {
        self.program = Some(image.into());
        self
    }

    /// Build the machine, loading the program if one was given.
    pub fn build(self) -> Result<Machine<P>> {
        let mut machine = Machine::new(self.config, self.peripheral);
        if let Some(image) = self.program {
            machine.load(&image)?;
        }
        Ok(machine)
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
