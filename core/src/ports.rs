//! Port contract of the codec under test.
//!
//! The codec is driven the way a compiled RTL model is: the harness writes the
//! input signals, calls [`CodecCore::eval`] to settle the design, and reads the
//! output signals back. A rising edge on `clk` between two evaluations is what
//! advances the design's registers.

use crate::image_source::Pixel;

/// One beat on a pixel stream (the input port or the reconstructed port).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PixelBeat {
    pub valid: bool,
    pub data: Pixel,
    pub row_last: bool,
    pub frame_last: bool,
}

impl PixelBeat {
    pub const IDLE: PixelBeat = PixelBeat {
        valid: false,
        data: Pixel::new(0),
        row_last: false,
        frame_last: false,
    };

    pub fn new(data: Pixel, row_last: bool, frame_last: bool) -> Self {
        Self {
            valid: true,
            data,
            row_last,
            frame_last,
        }
    }
}

/// Number of bytes carried by each encoding of the 3-bit burst count field.
/// A count of zero stands for a full 8-byte burst.
const BURST_LEN: [usize; 8] = [8, 1, 2, 3, 4, 5, 6, 7];

/// One cycle of the compressed-output port: up to 8 bytes packed most
/// significant byte first into `data`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ByteBurst {
    pub valid: bool,
    pub count: u8,
    pub data: u64,
    pub last: bool,
}

impl ByteBurst {
    pub const IDLE: ByteBurst = ByteBurst {
        valid: false,
        count: 0,
        data: 0,
        last: false,
    };

    /// Packs 1 to 8 bytes into a burst. Returns `None` for an empty or
    /// oversized slice.
    pub fn pack(bytes: &[u8], last: bool) -> Option<Self> {
        let count = BURST_LEN.iter().position(|&n| n == bytes.len())?;
        let data = bytes
            .iter()
            .enumerate()
            .fold(0u64, |word, (k, &b)| word | ((b as u64) << ((7 - k) * 8)));
        Some(Self {
            valid: true,
            count: count as u8,
            data,
            last,
        })
    }

    /// Bytes carried by this burst according to its count field.
    pub fn byte_count(&self) -> usize {
        BURST_LEN[(self.count & 0x7) as usize]
    }

    /// The carried bytes, most significant first.
    pub fn bytes(&self) -> impl Iterator<Item = u8> + use<> {
        let data = self.data;
        (0..self.byte_count()).map(move |k| (data >> ((7 - k) * 8)) as u8)
    }
}

/// Signals driven by the harness into the codec.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CoreInputs {
    pub clk: bool,
    pub reset: bool,
    pub pixel: PixelBeat,
    pub out_ready: bool,
}

/// Signals driven by the codec back to the harness.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CoreOutputs {
    pub pixel_ready: bool,
    pub bytes: ByteBurst,
    pub out: PixelBeat,
}

/// A codec under test. Any implementation honouring the port contract can be
/// substituted: a simulator binding, a behavioural model, or a test double.
pub trait CodecCore {
    fn inputs(&self) -> &CoreInputs;
    fn inputs_mut(&mut self) -> &mut CoreInputs;
    fn outputs(&self) -> &CoreOutputs;
    /// Settles the design against the current inputs.
    fn eval(&mut self);
}

impl<C: CodecCore + ?Sized> CodecCore for Box<C> {
    fn inputs(&self) -> &CoreInputs {
        (**self).inputs()
    }

    fn inputs_mut(&mut self) -> &mut CoreInputs {
        (**self).inputs_mut()
    }

    fn outputs(&self) -> &CoreOutputs {
        (**self).outputs()
    }

    fn eval(&mut self) {
        (**self).eval()
    }
}

/// Synchronous logic described as a register update plus a combinational
/// output function.
pub trait SyncLogic {
    /// Register update on a rising clock edge, seeing the inputs as they were
    /// held across the edge.
    fn rising_edge(&mut self, inputs: &CoreInputs);
    /// Output values for the current register state and inputs.
    fn settle(&self, inputs: &CoreInputs) -> CoreOutputs;
}

/// Adapts a [`SyncLogic`] model to the evaluate-on-demand [`CodecCore`]
/// contract by watching `clk` for rising edges.
#[derive(Debug, Default)]
pub struct Clocked<M> {
    model: M,
    inputs: CoreInputs,
    outputs: CoreOutputs,
    last_clk: bool,
}

impl<M: SyncLogic> Clocked<M> {
    pub fn new(model: M) -> Self {
        let inputs = CoreInputs::default();
        let outputs = model.settle(&inputs);
        Self {
            model,
            inputs,
            outputs,
            last_clk: false,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }
}

impl<M: SyncLogic> CodecCore for Clocked<M> {
    fn inputs(&self) -> &CoreInputs {
        &self.inputs
    }

    fn inputs_mut(&mut self) -> &mut CoreInputs {
        &mut self.inputs
    }

    fn outputs(&self) -> &CoreOutputs {
        &self.outputs
    }

    fn eval(&mut self) {
        if self.inputs.clk && !self.last_clk {
            self.model.rising_edge(&self.inputs);
        }
        self.last_clk = self.inputs.clk;
        self.outputs = self.model.settle(&self.inputs);
    }
}
