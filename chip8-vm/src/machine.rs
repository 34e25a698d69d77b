//! The fetch-decode-execute loop

use chip8_core::constants::{INSTRUCTION_WIDTH, MEMORY_SIZE};
use chip8_core::{decode, Cpu, Error, Memory, Peripheral};
use chip8_jit::{JitEngine, JitStats, STATUS_LOOP_BUDGET};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use crate::config::VmConfig;
use crate::error::Result;
use crate::loader::load_program;

/// Bounds for [`Machine::run_with_limits`]. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunLimits {
    pub max_cycles: Option<u64>,
    pub time_limit: Option<Duration>,
}

/// Why a run ended without a fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The peripheral asked to stop
    Exited,
    CycleLimit,
    TimeLimit,
}

/// One chip8 machine: CPU, memory, a peripheral and an optional JIT.
pub struct Machine<P: Peripheral> {
    cpu: Cpu,
    memory: Memory,
    peripheral: P,
    jit: Option<JitEngine>,
    config: VmConfig,
    timer_divider: u64,
    cycles: u64,
}

impl<P: Peripheral> Machine<P> {
    /// Build a machine with an empty program. The JIT is started when the
    /// config enables it; if the host cannot run it the machine falls back
    /// to pure interpretation.
    pub fn new(config: VmConfig, peripheral: P) -> Self {
        let jit = if config.jit.enabled {
            match JitEngine::new(config.jit.clone()) {
                Ok(engine) => Some(engine),
                Err(err) => {
                    warn!("JIT unavailable, running interpreted: {}", err);
                    None
                }
            }
        } else {
            info!("JIT disabled");
            None
        };

        let mut memory = Memory::new();
        memory.load_font();

        Self {
            cpu: Cpu::new(),
            memory,
            peripheral,
            jit,
            timer_divider: config.timer_divider(),
            config,
            cycles: 0,
        }
    }

    /// Load a program image and reset the CPU to its power-on state.
    ///
    /// Blocks compiled from a previous image are discarded.
    pub fn load(&mut self, image: &[u8]) -> Result<()> {
        load_program(&mut self.memory, image)?;
        if let Some(jit) = self.jit.as_mut() {
            jit.reset();
        }
        self.memory.clear_dirty(0, MEMORY_SIZE);
        self.cpu = Cpu::new();
        Ok(())
    }

    /// Execute one instruction cycle.
    ///
    /// For a CALL the JIT is consulted first; if it hands back a compiled
    /// block, the block runs right after the CALL itself and the cycle
    /// covers all of it.
    pub fn step(&mut self) -> Result<()> {
        let pc = self.cpu.pc;
        if pc % INSTRUCTION_WIDTH != 0 {
            return Err(Error::MisalignedPc { pc }.into());
        }

        let instruction = decode(self.memory.fetch_instruction_word(pc)?);
        let compiled = match (instruction.call_target(), self.jit.as_mut()) {
            (Some(target), Some(jit)) => jit.trace_call(target, &mut self.memory)?,
            _ => None,
        };

        self.cpu.pc = pc.wrapping_add(INSTRUCTION_WIDTH);
        instruction.execute(&mut self.cpu, &mut self.memory, &mut self.peripheral)?;

        if let Some(block) = compiled {
            let status = block.invoke(&mut self.cpu, &mut self.memory);
            if status == STATUS_LOOP_BUDGET {
                trace!(pc = self.cpu.pc, "compiled block yielded on loop budget");
            }
        }

        self.peripheral.poll_input_events();
        if self.cpu.sound_timer > 0 {
            self.peripheral.signal_audible_cue();
        }

        self.cycles += 1;
        if self.cycles % self.timer_divider == 0 {
            self.cpu.tick_timers();
        }
        Ok(())
    }

    /// Run until the peripheral requests exit or a fault occurs.
    pub fn run(&mut self) -> Result<()> {
        self.run_with_limits(RunLimits::default()).map(|_| ())
    }

    /// Run until the peripheral requests exit, a limit is hit or a fault
    /// occurs. Limits are checked before each cycle.
    pub fn run_with_limits(&mut self, limits: RunLimits) -> Result<RunOutcome> {
        let started = Instant::now();
        let first_cycle = self.cycles;
        let cycle_duration = self.config.cycle_duration();

        debug!(
            clock_hz = self.config.clock_hz,
            pace = self.config.pace,
            jit = self.jit.is_some(),
            "machine running"
        );

        let outcome = loop {
            if self.peripheral.exit_requested() {
                break RunOutcome::Exited;
            }
            if let Some(max) = limits.max_cycles {
                if self.cycles - first_cycle >= max {
                    break RunOutcome::CycleLimit;
                }
            }
            if let Some(limit) = limits.time_limit {
                if started.elapsed() >= limit {
                    break RunOutcome::TimeLimit;
                }
            }

            let cycle_started = Instant::now();
            self.step()?;

            if self.config.pace {
                if let Some(remaining) = cycle_duration.checked_sub(cycle_started.elapsed()) {
                    if !remaining.is_zero() {
                        thread::sleep(remaining);
                    }
                }
            }
        };

        info!(
            cycles = self.cycles - first_cycle,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "machine stopped: {:?}",
            outcome
        );
        Ok(outcome)
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn peripheral(&self) -> &P {
        &self.peripheral
    }

    pub fn peripheral_mut(&mut self) -> &mut P {
        &mut self.peripheral
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Cycles executed since construction.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// The JIT engine, if one is running.
    pub fn jit(&self) -> Option<&JitEngine> {
        self.jit.as_ref()
    }

    pub fn jit_stats(&self) -> Option<JitStats> {
        self.jit.as_ref().map(JitEngine::stats)
    }

    /// Stop the JIT worker. The machine keeps running interpreted.
    pub fn shutdown_jit(&mut self) {
        if let Some(mut jit) = self.jit.take() {
            jit.shutdown();
        }
    }
}
