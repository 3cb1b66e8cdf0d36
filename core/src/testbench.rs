use std::io::Write;

use crate::checker::{CheckStatus, ConformanceChecker};
use crate::error::HarnessError;
use crate::image_source::ImageSource;
use crate::ports::CodecCore;
use crate::sink::ByteCaptureSink;
use crate::stimulus::StimulusDriver;
use crate::trace::VcdTrace;

pub const DEFAULT_BUDGET_FACTOR: u64 = 10;
pub const DEFAULT_RESET_CYCLES: u64 = 2;

/// Schedule for the harness's `out_ready` toward the reconstructed port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadyPattern {
    #[default]
    Always,
    /// Ready for the first `on` cycles of every `period`.
    Duty { on: u32, period: u32 },
}

impl ReadyPattern {
    pub fn ready_at(&self, cycle: u64) -> bool {
        match *self {
            ReadyPattern::Always => true,
            ReadyPattern::Duty { on, period } => {
                period == 0 || cycle % u64::from(period) < u64::from(on)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct TestbenchOptions {
    /// Cycle budget as a multiple of the frame's pixel count.
    pub budget_factor: u64,
    /// Cycles held in reset before stimulus begins.
    pub reset_cycles: u64,
    pub out_ready: ReadyPattern,
}

impl Default for TestbenchOptions {
    fn default() -> Self {
        Self {
            budget_factor: DEFAULT_BUDGET_FACTOR,
            reset_cycles: DEFAULT_RESET_CYCLES,
            out_ready: ReadyPattern::Always,
        }
    }
}

impl TestbenchOptions {
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.budget_factor == 0 {
            return Err(HarnessError::Config("budget factor must be at least 1".into()));
        }
        if let ReadyPattern::Duty { on, period } = self.out_ready {
            if on == 0 || on > period {
                return Err(HarnessError::Config(format!(
                    "out_ready duty of {on} in {period} cycles never completes a transfer"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub pixels_sent: u64,
    pub pixels_checked: u64,
    pub bytes_captured: u64,
    pub bursts: u64,
}

/// Replays one frame through a codec, one clock cycle at a time.
pub struct Testbench<C, I, W: Write> {
    core: C,
    image: I,
    options: TestbenchOptions,
    stimulus: StimulusDriver,
    sink: ByteCaptureSink<W>,
    checker: ConformanceChecker,
    trace: Option<VcdTrace<Box<dyn Write>>>,
    tick: u64,
}

impl<C: CodecCore, I: ImageSource, W: Write> Testbench<C, I, W> {
    pub fn new(core: C, image: I, capture: W, options: TestbenchOptions) -> Self {
        let (width, height) = (image.width(), image.height());
        Self {
            core,
            image,
            options,
            stimulus: StimulusDriver::new(width, height),
            sink: ByteCaptureSink::new(capture),
            checker: ConformanceChecker::new(width, height),
            trace: None,
            tick: 0,
        }
    }

    pub fn with_trace(mut self, trace: VcdTrace<Box<dyn Write>>) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn cycle_budget(&self) -> u64 {
        (u64::from(self.image.width()) * u64::from(self.image.height()))
            .saturating_mul(self.options.budget_factor)
    }

    /// Runs until the frame-last reconstructed pixel has been checked, or
    /// until the first failure.
    pub fn run(&mut self) -> Result<RunSummary, HarnessError> {
        self.options.validate()?;
        let result = self.run_to_completion();
        if let Some(trace) = self.trace.as_mut() {
            if let Err(e) = trace.flush() {
                log::warn!("could not flush waveform trace: {e}");
            }
        }
        result
    }

    fn run_to_completion(&mut self) -> Result<RunSummary, HarnessError> {
        let budget = self.cycle_budget();
        self.hold_reset()?;

        while !self.checker.is_complete() {
            self.step()?;

            if self.tick >= budget {
                return Err(HarnessError::Timeout {
                    cycles: self.tick,
                    budget,
                });
            }

            let outputs = *self.core.outputs();
            self.sink.sample(&outputs.bytes)?;
            let out_ready = self.core.inputs().out_ready;
            if self.checker.sample(&self.image, &outputs.out, out_ready)? == CheckStatus::Complete {
                log::info!("frame verified after {} cycles", self.tick);
            }
        }

        Ok(self.summary())
    }

    fn hold_reset(&mut self) -> Result<(), HarnessError> {
        {
            let inputs = self.core.inputs_mut();
            inputs.reset = true;
            inputs.clk = false;
            inputs.pixel = Default::default();
            inputs.out_ready = self.options.out_ready.ready_at(0);
        }
        self.core.eval();

        for n in 0..self.options.reset_cycles {
            self.core.inputs_mut().clk = true;
            self.core.eval();
            if n + 1 == self.options.reset_cycles {
                self.core.inputs_mut().reset = false;
                self.core.eval();
            }
            self.dump(10 * self.tick)?;
            self.core.inputs_mut().clk = false;
            self.core.eval();
            self.dump(10 * self.tick + 5)?;
            self.tick += 1;
        }
        if self.core.inputs().reset {
            self.core.inputs_mut().reset = false;
            self.core.eval();
        }
        log::info!("reset released after {} cycles", self.tick);
        Ok(())
    }

    fn step(&mut self) -> Result<(), HarnessError> {
        let pixel_ready = self.core.outputs().pixel_ready;
        let beat = self.stimulus.next_beat(&self.image, pixel_ready);
        let out_ready = self.options.out_ready.ready_at(self.tick);

        self.core.inputs_mut().clk = true;
        self.core.eval();
        {
            let inputs = self.core.inputs_mut();
            inputs.pixel = beat;
            inputs.out_ready = out_ready;
        }
        self.core.eval();
        self.dump(10 * self.tick)?;

        self.core.inputs_mut().clk = false;
        self.core.eval();
        self.dump(10 * self.tick + 5)?;
        self.tick += 1;
        Ok(())
    }

    fn dump(&mut self, time: u64) -> Result<(), HarnessError> {
        if let Some(trace) = self.trace.as_mut() {
            trace
                .dump(time, self.core.inputs(), self.core.outputs())
                .map_err(HarnessError::Trace)?;
        }
        Ok(())
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            cycles: self.tick,
            pixels_sent: self.stimulus.accepted(),
            pixels_checked: self.checker.checked(),
            bytes_captured: self.sink.bytes_captured(),
            bursts: self.sink.bursts(),
        }
    }

    pub fn cycles(&self) -> u64 {
        self.tick
    }
    pub fn core(&self) -> &C {
        &self.core
    }
    pub fn image(&self) -> &I {
        &self.image
    }
    pub fn stimulus(&self) -> &StimulusDriver {
        &self.stimulus
    }
    pub fn sink(&self) -> &ByteCaptureSink<W> {
        &self.sink
    }
    pub fn checker(&self) -> &ConformanceChecker {
        &self.checker
    }

    /// The capture writer is `None` once the stream's `last` burst closed it.
    pub fn into_parts(self) -> (C, Option<W>) {
        (self.core, self.sink.into_inner())
    }
}
