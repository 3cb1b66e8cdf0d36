use crate::image_source::ImageSource;
use crate::ports::PixelBeat;
use crate::raster::RasterCursor;

/// Presents one frame, pixel by pixel, under the valid/ready handshake.
///
/// A beat is replaced only when the previous one was accepted (or nothing was
/// valid); a stalled beat is held as-is. Once the frame-last pixel has been
/// accepted the driver idles.
#[derive(Debug)]
pub struct StimulusDriver {
    cursor: RasterCursor,
    beat: PixelBeat,
    frame_latched: bool,
    accepted: u64,
}

impl StimulusDriver {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            cursor: RasterCursor::new(width, height),
            beat: PixelBeat::IDLE,
            frame_latched: false,
            accepted: 0,
        }
    }

    /// Computes the beat to drive for the coming cycle from the beat currently
    /// on the port and the codec's `pixel_ready`.
    pub fn next_beat<I: ImageSource>(&mut self, image: &I, pixel_ready: bool) -> PixelBeat {
        if self.beat.valid && !pixel_ready {
            return self.beat;
        }
        if self.beat.valid {
            self.accepted += 1;
        }

        if self.frame_latched {
            if self.beat.valid {
                log::debug!("stimulus: final pixel accepted after {} transfers", self.accepted);
            }
            self.beat = PixelBeat::IDLE;
            return self.beat;
        }

        let (x, y) = self.cursor.position();
        let beat = PixelBeat::new(image.pixel(x, y), self.cursor.row_last(), self.cursor.frame_last());
        #[cfg(feature = "trace_stimulus")]
        log::trace!("stimulus: latch pixel[{x},{y}] = {}", beat.data);
        self.frame_latched = beat.frame_last;
        self.cursor.advance();
        self.beat = beat;
        beat
    }

    pub fn beat(&self) -> PixelBeat {
        self.beat
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn is_done(&self) -> bool {
        self.frame_latched && !self.beat.valid
    }

    pub fn cursor(&self) -> &RasterCursor {
        &self.cursor
    }
}
