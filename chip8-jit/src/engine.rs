//! JIT engine: hotness tracing, code cache and the compile worker
//!
//! The engine lives on the execution thread. It owns the hotness table and
//! shares the code cache and the request queue with one background worker.
//! The worker never reads live memory: each request carries a snapshot of
//! the address space taken when it was enqueued.

use chip8_core::constants::{ADDRESS_MASK, MEMORY_SIZE};
use chip8_core::Memory;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

use crate::block::CompiledBlock;
use crate::compiler::BlockCompiler;
use crate::error::{JitError, Result};
use crate::queue::{CompileQueue, CompileRequest};
use crate::{JitConfig, JitStats};

#[derive(Default)]
struct Counters {
    compile_requests: AtomicU64,
    blocks_compiled: AtomicU64,
    blocks_discarded: AtomicU64,
    invalidations: AtomicU64,
    compile_failures: AtomicU64,
}

/// State shared between the engine and its worker
struct Shared {
    queue: CompileQueue,
    cache: Mutex<FxHashMap<u16, Arc<CompiledBlock>>>,
    /// First compile error the worker hit, reported on the next trace
    fault: Mutex<Option<JitError>>,
    counters: Counters,
}

/// Per-machine JIT: decides what to compile and hands out compiled blocks.
pub struct JitEngine {
    config: JitConfig,
    hotness: Vec<u16>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl JitEngine {
    /// Build the compiler for this host and start the worker.
    pub fn new(config: JitConfig) -> Result<Self> {
        let compiler = BlockCompiler::new(&config)?;

        let shared = Arc::new(Shared {
            queue: CompileQueue::new(),
            cache: Mutex::new(FxHashMap::default()),
            fault: Mutex::new(None),
            counters: Counters::default(),
        });

        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("chip8-jit".to_string())
                .spawn(move || worker_loop(shared, compiler))
                .map_err(JitError::WorkerSpawn)?
        };

        info!(
            hot_threshold = config.hot_threshold,
            loop_budget = config.loop_budget,
            "JIT engine started"
        );

        Ok(Self {
            config,
            hotness: vec![0; MEMORY_SIZE],
            shared,
            worker: Some(worker),
        })
    }

    /// Observe a CALL to `target` and return a compiled block for it, if one
    /// is ready.
    ///
    /// Never waits for compilation. A cached block whose instruction bytes
    /// were written since it was compiled is retired here and a recompile
    /// is requested. Fails if the worker hit a fatal compile error.
    pub fn trace_call(
        &mut self,
        target: u16,
        memory: &mut Memory,
    ) -> Result<Option<Arc<CompiledBlock>>> {
        if let Some(fault) = self.shared.fault.lock().take() {
            return Err(fault);
        }

        let target = target & ADDRESS_MASK;
        let threshold = self.config.hot_threshold.max(1);
        let hotness = &mut self.hotness[target as usize];
        if *hotness < threshold {
            *hotness += 1;
            if *hotness < threshold {
                return Ok(None);
            }
            trace!(target, "call target became hot");
            self.request_compile(target, memory);
        }

        let mut cache = self.shared.cache.lock();
        let Some(block) = cache.get(&target) else {
            return Ok(None);
        };

        if memory.is_dirty(block.start(), block.byte_len()) {
            let (start, len) = (block.start(), block.byte_len());
            // retire under the same lock that found it
            cache.remove(&target);
            drop(cache);

            memory.clear_dirty(start, len);
            self.shared.counters.invalidations.fetch_add(1, Ordering::Relaxed);
            debug!("block at 0x{:03x} modified, recompiling", target);
            self.request_compile(target, memory);
            return Ok(None);
        }

        Ok(Some(Arc::clone(block)))
    }

    fn request_compile(&self, target: u16, memory: &Memory) {
        let request = CompileRequest {
            target,
            image: Arc::from(memory.bytes()),
        };
        if self.shared.queue.push(request) {
            self.shared.counters.compile_requests.fetch_add(1, Ordering::Relaxed);
            trace!(target, pending = self.shared.queue.len(), "compile requested");
        }
    }

    /// Forget everything learned about the current program: pending
    /// requests, published blocks, hotness counts and any stored worker
    /// fault. Needed whenever memory is replaced wholesale, since such
    /// loads do not go through the dirty bitmap. Statistics are cumulative
    /// and survive.
    pub fn reset(&mut self) {
        let dropped = self.shared.queue.clear();
        // a compile already in progress publishes before the worker goes idle
        self.shared.queue.wait_idle();

        let retired = {
            let mut cache = self.shared.cache.lock();
            let retired = cache.len();
            cache.clear();
            retired
        };
        self.shared.fault.lock().take();
        self.hotness.fill(0);

        debug!(dropped, retired, "JIT engine reset");
    }

    /// Block until every queued request has been handled.
    pub fn wait_idle(&self) {
        self.shared.queue.wait_idle();
    }

    /// Whether a block for `target` is currently published.
    pub fn is_cached(&self, target: u16) -> bool {
        self.shared.cache.lock().contains_key(&(target & ADDRESS_MASK))
    }

    pub fn config(&self) -> &JitConfig {
        &self.config
    }

    pub fn stats(&self) -> JitStats {
        let counters = &self.shared.counters;
        JitStats {
            compile_requests: counters.compile_requests.load(Ordering::Relaxed),
            blocks_compiled: counters.blocks_compiled.load(Ordering::Relaxed),
            blocks_discarded: counters.blocks_discarded.load(Ordering::Relaxed),
            invalidations: counters.invalidations.load(Ordering::Relaxed),
            compile_failures: counters.compile_failures.load(Ordering::Relaxed),
            cached_blocks: self.shared.cache.lock().len(),
        }
    }

    /// Stop the worker. Pending requests are dropped; a compile in progress
    /// is allowed to finish.
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.shared.queue.close();
        if worker.join().is_err() {
            error!("JIT worker panicked");
        }
        debug!("JIT engine stopped");
    }
}

impl Drop for JitEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: Arc<Shared>, compiler: BlockCompiler) {
    debug!("JIT worker started");

    while let Some(request) = shared.queue.next() {
        let target = request.target;
        match compiler.compile(&request.image, target) {
            Ok(Some(block)) => {
                shared.cache.lock().insert(target, Arc::new(block));
                shared.counters.blocks_compiled.fetch_add(1, Ordering::Relaxed);
            }
            Ok(None) => {
                shared.counters.blocks_discarded.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                warn!("compiling block at 0x{:03x} failed: {}", target, err);
                shared.counters.compile_failures.fetch_add(1, Ordering::Relaxed);
                let mut fault = shared.fault.lock();
                if fault.is_none() {
                    *fault = Some(err);
                }
            }
        }
    }

    debug!("JIT worker exiting");
}
