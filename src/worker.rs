use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TryRecvError, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use log::{debug, error, info, warn};

use crate::accumulator::FrameAccumulator;
use crate::capture::EventSource;
use crate::config::Config;
use crate::engine::{Command, Engine, EngineOutput, Status};
use crate::error::Result;
use crate::grid::Resolution;

/// Source of the engine's notion of "now", in seconds.
pub trait Clock: Send {
    fn now(&self) -> f64;
}

/// Seconds elapsed since the clock was created.
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

type AccumulatorFactory = Box<dyn FnOnce(Resolution) -> Box<dyn FrameAccumulator> + Send>;

/// Configures and starts a [`Worker`].
pub struct WorkerBuilder {
    config: Config,
    clock: Box<dyn Clock>,
    accumulator: Option<AccumulatorFactory>,
}

impl WorkerBuilder {
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Render previews with the accumulator built once the resolution is known.
    pub fn preview<F>(mut self, make: F) -> Self
    where
        F: FnOnce(Resolution) -> Box<dyn FrameAccumulator> + Send + 'static,
    {
        self.accumulator = Some(Box::new(make));
        self
    }

    /// Start the polling thread. `open` runs on that thread; if it fails the
    /// thread reports [`Status::DeviceNotFound`] and exits.
    pub fn spawn<S, F>(self, open: F) -> Result<(Worker, Receiver<EngineOutput>)>
    where
        S: EventSource + 'static,
        F: FnOnce() -> Result<S> + Send + 'static,
    {
        self.config.validate()?;
        let (command_tx, command_rx) = mpsc::channel();
        let (output_tx, output_rx) = mpsc::sync_channel(self.config.worker.output_capacity);
        let stop = Arc::new(AtomicBool::new(false));

        let thread = thread::Builder::new().name("edvs-filter".to_string()).spawn({
            let stop = stop.clone();
            move || worker_loop(open, self, command_rx, output_tx, stop)
        })?;

        Ok((
            Worker {
                commands: command_tx,
                stop,
                thread: Some(thread),
            },
            output_rx,
        ))
    }
}

/// Handle to the background filtering thread.
///
/// Commands are queued and applied between batches, never mid-batch.
/// Dropping the handle stops the thread.
pub struct Worker {
    commands: Sender<Command>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn builder(config: Config) -> WorkerBuilder {
        WorkerBuilder {
            config,
            clock: Box::new(MonotonicClock::new()),
            accumulator: None,
        }
    }

    pub fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("worker has exited, dropping {:?}", command);
        }
    }

    pub fn toggle_density_filter(&self) {
        self.send(Command::ToggleDensityFilter);
    }

    pub fn start_calibration(&self) {
        self.send(Command::StartCalibration);
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Ask the loop to exit and wait until it has.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("filter thread panicked");
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn emit(outputs: &SyncSender<EngineOutput>, output: EngineOutput) {
    if let EngineOutput::Status(status) = &output {
        info!("{}", status);
    }
    match outputs.try_send(output) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => warn!("output queue full, dropping output"),
        Err(TrySendError::Disconnected(_)) => debug!("output consumer gone"),
    }
}

fn worker_loop<S, F>(
    open: F,
    builder: WorkerBuilder,
    commands: Receiver<Command>,
    outputs: SyncSender<EngineOutput>,
    stop: Arc<AtomicBool>,
) where
    S: EventSource,
    F: FnOnce() -> Result<S>,
{
    let WorkerBuilder {
        config,
        clock,
        accumulator,
    } = builder;

    let mut source = match open() {
        Ok(source) => source,
        Err(e) => {
            error!("could not open event source: {}", e);
            emit(&outputs, EngineOutput::Status(Status::DeviceNotFound));
            return;
        }
    };

    let resolution = source.resolution();
    let mut engine = match Engine::new(resolution, &config.filter) {
        Ok(engine) => engine,
        Err(e) => {
            error!("could not start filter engine: {}", e);
            return;
        }
    };
    if let Some(make) = accumulator {
        engine = engine.with_accumulator(make(resolution));
    }
    info!("filtering {} event stream", resolution);

    let backoff = config.worker.poll_backoff();
    while !stop.load(Ordering::Acquire) {
        loop {
            match commands.try_recv() {
                Ok(command) => {
                    let status = engine.apply(command, clock.now());
                    emit(&outputs, EngineOutput::Status(status));
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        match source.next_batch() {
            Some(batch) if !batch.is_empty() => {
                if let Some(output) = engine.process(&batch, clock.now()) {
                    emit(&outputs, output);
                }
            }
            _ => {
                if let Some(output) = engine.idle(clock.now()) {
                    emit(&outputs, output);
                }
                thread::sleep(backoff);
            }
        }
    }

    let stats = engine.stats();
    info!(
        "filter stopped: {} batches, {} events in, {} events out, {} batches fully rejected",
        stats.batches, stats.events_in, stats.events_out, stats.suppressed_batches
    );
}
