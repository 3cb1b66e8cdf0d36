use std::collections::VecDeque;

use crate::image_source::Pixel;
use crate::ports::{ByteBurst, CoreInputs, CoreOutputs, PixelBeat, SyncLogic};

/// Returns every accepted pixel on the reconstructed port after a fixed
/// latency, and mirrors its three channel bytes onto the compressed port.
#[derive(Debug, Clone)]
pub struct IdentityCore {
    latency: u64,
    capacity: usize,
    ready_schedule: Vec<bool>,
    corrupt: Option<((u32, u32), u32)>,
    drop_row_last: Option<(u32, u32)>,
    mute: bool,

    pipeline: VecDeque<(PixelBeat, u64)>,
    bytes: ByteBurst,
    cycle: u64,
    in_pos: (u32, u32),
    accepted: u64,
    delivered: u64,
}

impl Default for IdentityCore {
    fn default() -> Self {
        Self::new(1)
    }
}

impl IdentityCore {
    pub fn new(latency: u64) -> Self {
        Self {
            latency,
            capacity: 8,
            ready_schedule: Vec::new(),
            corrupt: None,
            drop_row_last: None,
            mute: false,
            pipeline: VecDeque::new(),
            bytes: ByteBurst::IDLE,
            cycle: 0,
            in_pos: (0, 0),
            accepted: 0,
            delivered: 0,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// `pixel_ready` follows `schedule` cyclically (counted from reset
    /// release), on top of the pipeline's own capacity limit.
    pub fn with_ready_schedule(mut self, schedule: Vec<bool>) -> Self {
        self.ready_schedule = schedule;
        self
    }

    /// XORs `mask` into the pixel accepted at `(x, y)`.
    pub fn corrupt_pixel(mut self, x: u32, y: u32, mask: u32) -> Self {
        self.corrupt = Some(((x, y), mask));
        self
    }

    /// Clears the row-last flag of the pixel accepted at `(x, y)`.
    pub fn drop_row_last(mut self, x: u32, y: u32) -> Self {
        self.drop_row_last = Some((x, y));
        self
    }

    /// Never asserts the reconstructed port's `valid`.
    pub fn mute_output(mut self) -> Self {
        self.mute = true;
        self
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    fn pixel_ready(&self) -> bool {
        let scheduled = self.ready_schedule.is_empty()
            || self.ready_schedule[(self.cycle % self.ready_schedule.len() as u64) as usize];
        scheduled && self.pipeline.len() < self.capacity
    }

    fn head(&self) -> PixelBeat {
        match self.pipeline.front() {
            Some(&(beat, due)) if !self.mute && due <= self.cycle => beat,
            _ => PixelBeat::IDLE,
        }
    }

    fn accept(&mut self, mut beat: PixelBeat) {
        let pos = self.in_pos;
        self.in_pos = if beat.row_last { (0, pos.1 + 1) } else { (pos.0 + 1, pos.1) };

        if let Some((at, mask)) = self.corrupt {
            if at == pos {
                beat.data = Pixel::new(beat.data.rgb() ^ mask);
            }
        }
        if self.drop_row_last == Some(pos) {
            beat.row_last = false;
        }
        let px = beat.data;
        self.bytes = ByteBurst::pack(&[px.r(), px.g(), px.b()], beat.frame_last).unwrap_or(ByteBurst::IDLE);
        self.pipeline.push_back((beat, self.cycle + self.latency));
        self.accepted += 1;
    }
}

impl SyncLogic for IdentityCore {
    fn rising_edge(&mut self, inputs: &CoreInputs) {
        if inputs.reset {
            self.pipeline.clear();
            self.bytes = ByteBurst::IDLE;
            self.cycle = 0;
            self.in_pos = (0, 0);
            self.accepted = 0;
            self.delivered = 0;
            return;
        }

        let ready = self.pixel_ready();
        if self.head().valid && inputs.out_ready {
            self.pipeline.pop_front();
            self.delivered += 1;
        }
        self.bytes = ByteBurst::IDLE;
        if inputs.pixel.valid && ready {
            self.accept(inputs.pixel);
        }
        self.cycle += 1;
    }

    fn settle(&self, _inputs: &CoreInputs) -> CoreOutputs {
        CoreOutputs {
            pixel_ready: self.pixel_ready(),
            bytes: self.bytes,
            out: self.head(),
        }
    }
}
