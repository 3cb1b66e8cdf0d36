//! Behavioural model of a streaming QOI compressor/decompressor pair.
//!
//! The compressor accepts one RGB pixel per cycle and emits the QOI byte
//! stream (header, ops, end marker) on the compressed port, at most 8 bytes
//! per cycle. Its op bytes are also queued for the decompressor, which
//! executes one op per cycle and hands pixels to the reconstructed port.
//! Queues are bounded so a stalled `out_ready` eventually drops `pixel_ready`.

use std::collections::VecDeque;

use crate::image_source::Pixel;
use crate::ports::{ByteBurst, CoreInputs, CoreOutputs, PixelBeat, SyncLogic};

pub const QOI_MAGIC: [u8; 4] = *b"qoif";
pub const QOI_END_MARKER: [u8; 8] = [0, 0, 0, 0, 0, 0, 0, 1];
pub const QOI_HEADER_LEN: usize = 14;

const OP_INDEX: u8 = 0x00;
const OP_DIFF: u8 = 0x40;
const OP_LUMA: u8 = 0x80;
const OP_RUN: u8 = 0xc0;
const OP_RGB: u8 = 0xfe;
const OP_RGBA: u8 = 0xff;
const TAG_MASK: u8 = 0xc0;
const MAX_RUN: u8 = 62;

/// Largest number of op bytes a single pixel can produce: a flushed run
/// followed by a literal RGB op.
const MAX_BYTES_PER_PIXEL: usize = 5;
const OP_QUEUE_LIMIT: usize = 32;
const OUT_FIFO_DEPTH: usize = 4;
const BURST_BYTES: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Rgba([u8; 4]);

impl Rgba {
    const ZERO: Rgba = Rgba([0, 0, 0, 0]);
    const START: Rgba = Rgba([0, 0, 0, 0xff]);

    fn opaque(px: Pixel) -> Self {
        Rgba([px.r(), px.g(), px.b(), 0xff])
    }

    fn hash(self) -> usize {
        let [r, g, b, a] = self.0;
        (r as usize * 3 + g as usize * 5 + b as usize * 7 + a as usize * 11) % 64
    }

    fn pixel(self) -> Pixel {
        Pixel::from_rgb(self.0[0], self.0[1], self.0[2])
    }
}

pub fn header(width: u32, height: u32) -> [u8; QOI_HEADER_LEN] {
    let mut h = [0u8; QOI_HEADER_LEN];
    h[..4].copy_from_slice(&QOI_MAGIC);
    h[4..8].copy_from_slice(&width.to_be_bytes());
    h[8..12].copy_from_slice(&height.to_be_bytes());
    h[12] = 3; // RGB
    h[13] = 0; // sRGB with linear alpha
    h
}

/// QOI op encoder for an opaque RGB pixel stream.
#[derive(Debug, Clone)]
pub struct QoiEncoder {
    prev: Rgba,
    index: [Rgba; 64],
    run: u8,
}

impl Default for QoiEncoder {
    fn default() -> Self {
        Self {
            prev: Rgba::START,
            index: [Rgba::ZERO; 64],
            run: 0,
        }
    }
}

impl QoiEncoder {
    /// Encodes one pixel into `out`. `last` flushes any pending run.
    pub fn push<E: Extend<u8>>(&mut self, px: Pixel, last: bool, out: &mut E) {
        let px = Rgba::opaque(px);
        if px == self.prev {
            self.run += 1;
            if self.run == MAX_RUN || last {
                self.flush_run(out);
            }
            return;
        }
        self.flush_run(out);

        let slot = px.hash();
        if self.index[slot] == px {
            out.extend([OP_INDEX | slot as u8]);
        } else {
            self.index[slot] = px;
            let dr = px.0[0].wrapping_sub(self.prev.0[0]) as i8;
            let dg = px.0[1].wrapping_sub(self.prev.0[1]) as i8;
            let db = px.0[2].wrapping_sub(self.prev.0[2]) as i8;
            let dr_dg = dr.wrapping_sub(dg);
            let db_dg = db.wrapping_sub(dg);
            if (-2..=1).contains(&dr) && (-2..=1).contains(&dg) && (-2..=1).contains(&db) {
                out.extend([OP_DIFF | ((dr + 2) as u8) << 4 | ((dg + 2) as u8) << 2 | (db + 2) as u8]);
            } else if (-32..=31).contains(&dg) && (-8..=7).contains(&dr_dg) && (-8..=7).contains(&db_dg) {
                out.extend([
                    OP_LUMA | (dg + 32) as u8,
                    ((dr_dg + 8) as u8) << 4 | (db_dg + 8) as u8,
                ]);
            } else {
                out.extend([OP_RGB, px.0[0], px.0[1], px.0[2]]);
            }
        }
        self.prev = px;
    }

    fn flush_run<E: Extend<u8>>(&mut self, out: &mut E) {
        if self.run > 0 {
            out.extend([OP_RUN | (self.run - 1)]);
            self.run = 0;
        }
    }
}

/// QOI op decoder, one op per call.
#[derive(Debug, Clone)]
pub struct QoiDecoder {
    prev: Rgba,
    index: [Rgba; 64],
    run: u8,
}

impl Default for QoiDecoder {
    fn default() -> Self {
        Self {
            prev: Rgba::START,
            index: [Rgba::ZERO; 64],
            run: 0,
        }
    }
}

impl QoiDecoder {
    /// Produces the next pixel, consuming one complete op from the front of
    /// `ops` when no run is pending. Returns `None` while the op at the front
    /// is still incomplete.
    pub fn next_pixel(&mut self, ops: &mut VecDeque<u8>) -> Option<Pixel> {
        if self.run > 0 {
            self.run -= 1;
            return Some(self.prev.pixel());
        }

        let b0 = *ops.front()?;
        let need = match b0 {
            OP_RGB => 4,
            OP_RGBA => 5,
            _ if b0 & TAG_MASK == OP_LUMA => 2,
            _ => 1,
        };
        if ops.len() < need {
            return None;
        }
        let op: Vec<u8> = ops.drain(..need).collect();

        let [pr, pg, pb, pa] = self.prev.0;
        let px = match b0 {
            OP_RGB => Rgba([op[1], op[2], op[3], pa]),
            OP_RGBA => Rgba([op[1], op[2], op[3], op[4]]),
            _ => match b0 & TAG_MASK {
                OP_INDEX => self.index[(b0 & 0x3f) as usize],
                OP_DIFF => Rgba([
                    pr.wrapping_add((b0 >> 4) & 0x3).wrapping_sub(2),
                    pg.wrapping_add((b0 >> 2) & 0x3).wrapping_sub(2),
                    pb.wrapping_add(b0 & 0x3).wrapping_sub(2),
                    pa,
                ]),
                OP_LUMA => {
                    let dg = (b0 & 0x3f).wrapping_sub(32);
                    Rgba([
                        pr.wrapping_add(dg).wrapping_add(op[1] >> 4).wrapping_sub(8),
                        pg.wrapping_add(dg),
                        pb.wrapping_add(dg).wrapping_add(op[1] & 0xf).wrapping_sub(8),
                        pa,
                    ])
                }
                _ => {
                    self.run = b0 & 0x3f;
                    self.prev
                }
            },
        };
        self.index[px.hash()] = px;
        self.prev = px;
        Some(px.pixel())
    }
}

/// Cycle-level model of the streaming QOI core.
#[derive(Debug, Clone)]
pub struct QoiCore {
    width: u32,
    height: u32,

    encoder: QoiEncoder,
    header_sent: bool,
    encoded: u64,
    tx: VecDeque<u8>,
    tx_done: bool,
    bytes: ByteBurst,

    decoder: QoiDecoder,
    ops: VecDeque<u8>,
    decoded: u64,
    out_pos: (u32, u32),
    out: VecDeque<PixelBeat>,
}

impl QoiCore {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            encoder: QoiEncoder::default(),
            header_sent: false,
            encoded: 0,
            tx: VecDeque::new(),
            tx_done: false,
            bytes: ByteBurst::IDLE,
            decoder: QoiDecoder::default(),
            ops: VecDeque::new(),
            decoded: 0,
            out_pos: (0, 0),
            out: VecDeque::new(),
        }
    }

    fn frame_pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    fn pixel_ready(&self) -> bool {
        self.ops.len() + MAX_BYTES_PER_PIXEL <= OP_QUEUE_LIMIT
    }

    fn compress(&mut self, beat: &PixelBeat) {
        if self.encoded >= self.frame_pixels() {
            log::warn!("qoi model: pixel {} beyond end of frame dropped", beat.data);
            return;
        }
        if !self.header_sent {
            self.tx.extend(header(self.width, self.height));
            self.header_sent = true;
        }
        self.encoded += 1;
        let last = beat.frame_last || self.encoded == self.frame_pixels();

        let start = self.ops.len();
        self.encoder.push(beat.data, last, &mut self.ops);
        let produced: Vec<u8> = self.ops.range(start..).copied().collect();
        self.tx.extend(produced);
        if last {
            self.tx.extend(QOI_END_MARKER);
            self.tx_done = true;
        }
    }

    fn decompress(&mut self) {
        if self.decoded >= self.frame_pixels() || self.out.len() >= OUT_FIFO_DEPTH {
            return;
        }
        let Some(px) = self.decoder.next_pixel(&mut self.ops) else {
            return;
        };
        let (x, y) = self.out_pos;
        let row_last = x + 1 == self.width;
        let frame_last = row_last && y + 1 == self.height;
        self.out.push_back(PixelBeat::new(px, row_last, frame_last));
        self.out_pos = if row_last { (0, y + 1) } else { (x + 1, y) };
        self.decoded += 1;
    }

    fn next_burst(&mut self) -> ByteBurst {
        let n = self.tx.len().min(BURST_BYTES);
        if n == 0 {
            return ByteBurst::IDLE;
        }
        let chunk: Vec<u8> = self.tx.drain(..n).collect();
        let last = self.tx_done && self.tx.is_empty();
        ByteBurst::pack(&chunk, last).unwrap_or(ByteBurst::IDLE)
    }
}

impl SyncLogic for QoiCore {
    fn rising_edge(&mut self, inputs: &CoreInputs) {
        if inputs.reset {
            *self = QoiCore::new(self.width, self.height);
            return;
        }

        let ready = self.pixel_ready();
        if !self.out.is_empty() && inputs.out_ready {
            self.out.pop_front();
        }
        self.decompress();
        if inputs.pixel.valid && ready {
            self.compress(&inputs.pixel);
        }
        self.bytes = self.next_burst();
    }

    fn settle(&self, _inputs: &CoreInputs) -> CoreOutputs {
        CoreOutputs {
            pixel_ready: self.pixel_ready(),
            bytes: self.bytes,
            out: self.out.front().copied().unwrap_or(PixelBeat::IDLE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_all(pixels: &[Pixel]) -> Vec<u8> {
        let mut enc = QoiEncoder::default();
        let mut ops = Vec::new();
        for (i, &px) in pixels.iter().enumerate() {
            enc.push(px, i + 1 == pixels.len(), &mut ops);
        }
        ops
    }

    fn decode_all(ops: &[u8], count: usize) -> Vec<Pixel> {
        let mut dec = QoiDecoder::default();
        let mut queue: VecDeque<u8> = ops.iter().copied().collect();
        let mut out = Vec::new();
        while out.len() < count {
            match dec.next_pixel(&mut queue) {
                Some(px) => out.push(px),
                None => break,
            }
        }
        out
    }

    #[test]
    fn header_layout() {
        let h = header(640, 5);
        assert_eq!(&h[..4], b"qoif");
        assert_eq!(&h[4..8], &[0, 0, 2, 0x80]);
        assert_eq!(&h[8..12], &[0, 0, 0, 5]);
        assert_eq!(h[12], 3);
    }

    #[test]
    fn each_op_kind_is_chosen() {
        let black = Pixel::from_rgb(0, 0, 0);
        let near = Pixel::from_rgb(1, 0, 0xff);
        let luma = Pixel::from_rgb(20, 21, 22);
        let far = Pixel::from_rgb(0x80, 0x10, 0xf0);
        let ops = encode_all(&[black, black, near, luma, far, near]);
        assert_eq!(
            ops,
            vec![
                // black equals the start pixel, so it runs
                OP_RUN | 1,
                OP_DIFF | 3 << 4 | 2 << 2 | 1,
                OP_LUMA | (21 + 32),
                6 << 4 | 10,
                OP_RGB,
                0x80,
                0x10,
                0xf0,
                OP_INDEX | Rgba::opaque(near).hash() as u8,
            ]
        );
    }

    #[test]
    fn long_runs_split_at_62() {
        let px = vec![Pixel::from_rgb(0, 0, 0); 70];
        let ops = encode_all(&px);
        assert_eq!(ops, vec![OP_RUN | 61, OP_RUN | 7]);
        assert_eq!(decode_all(&ops, 70), px);
    }

    #[test]
    fn decoder_waits_for_complete_op() {
        let mut dec = QoiDecoder::default();
        let mut queue: VecDeque<u8> = [OP_RGB, 1, 2].into_iter().collect();
        assert_eq!(dec.next_pixel(&mut queue), None);
        assert_eq!(queue.len(), 3);
        queue.push_back(3);
        assert_eq!(dec.next_pixel(&mut queue), Some(Pixel::from_rgb(1, 2, 3)));
        assert!(queue.is_empty());
    }

    #[test]
    fn ops_round_trip() {
        let pixels: Vec<Pixel> = (0u32..200)
            .map(|i| Pixel::new(i.wrapping_mul(0x9e3779b1) >> (i % 7)))
            .chain(std::iter::repeat_n(Pixel::new(0x102030), 5))
            .collect();
        let ops = encode_all(&pixels);
        assert_eq!(decode_all(&ops, pixels.len()), pixels);
    }
}
