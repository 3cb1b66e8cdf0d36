use crate::error::{BoundaryFlag, ContentMismatch, HarnessError};
use crate::image_source::ImageSource;
use crate::ports::PixelBeat;
use crate::raster::RasterCursor;

/// Oracle pixels reported after a mismatch.
pub const MISMATCH_CONTEXT: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Idle,
    Checked,
    Complete,
}

#[derive(Debug)]
pub struct ConformanceChecker {
    cursor: RasterCursor,
    checked: u64,
    complete: bool,
}

impl ConformanceChecker {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            cursor: RasterCursor::new(width, height),
            checked: 0,
            complete: false,
        }
    }

    /// Samples one cycle of the reconstructed-output port. Only a completed
    /// handshake (`valid && ready`) is checked.
    pub fn sample<I: ImageSource>(
        &mut self,
        oracle: &I,
        beat: &PixelBeat,
        ready: bool,
    ) -> Result<CheckStatus, HarnessError> {
        if !(beat.valid && ready) {
            return Ok(CheckStatus::Idle);
        }
        if self.complete {
            log::warn!("reconstructed pixel {} after end of frame ignored", beat.data);
            return Ok(CheckStatus::Complete);
        }

        let (x, y) = self.cursor.position();
        let expected = oracle.pixel(x, y);
        if beat.data != expected {
            let following = self
                .cursor
                .lookahead(MISMATCH_CONTEXT)
                .into_iter()
                .map(|(nx, ny)| oracle.pixel(nx, ny))
                .collect();
            return Err(ContentMismatch {
                x,
                y,
                expected,
                actual: beat.data,
                following,
            }
            .into());
        }

        let row_last = self.cursor.row_last();
        if beat.row_last != row_last {
            return Err(HarnessError::FramingViolation {
                x,
                y,
                flag: BoundaryFlag::RowLast,
                expected: row_last,
                actual: beat.row_last,
            });
        }
        if beat.row_last && beat.frame_last != self.cursor.frame_last() {
            return Err(HarnessError::FramingViolation {
                x,
                y,
                flag: BoundaryFlag::FrameLast,
                expected: self.cursor.frame_last(),
                actual: beat.frame_last,
            });
        }

        self.checked += 1;
        log::trace!("check: pixel[{x},{y}] = {expected}");
        if beat.row_last && beat.frame_last {
            self.complete = true;
            return Ok(CheckStatus::Complete);
        }
        if beat.row_last {
            self.cursor.next_row();
        } else {
            self.cursor.advance();
        }
        Ok(CheckStatus::Checked)
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn checked(&self) -> u64 {
        self.checked
    }

    pub fn cursor(&self) -> &RasterCursor {
        &self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_source::{Frame, Pixel};

    fn frame() -> Frame {
        Frame::from_fn(5, 5, |x, y| Pixel::from_rgb(x as u8, y as u8, 0x5a)).unwrap()
    }

    fn beat_at(img: &Frame, x: u32, y: u32) -> PixelBeat {
        PixelBeat::new(img.pixel(x, y), x == 4, x == 4 && y == 4)
    }

    #[test]
    fn accepts_exact_frame() {
        let img = frame();
        let mut chk = ConformanceChecker::new(5, 5);
        let mut last = CheckStatus::Idle;
        for y in 0..5 {
            for x in 0..5 {
                assert_eq!(chk.sample(&img, &PixelBeat::IDLE, true).unwrap(), CheckStatus::Idle);
                last = chk.sample(&img, &beat_at(&img, x, y), true).unwrap();
            }
        }
        assert_eq!(last, CheckStatus::Complete);
        assert!(chk.is_complete());
        assert_eq!(chk.checked(), 25);
    }

    #[test]
    fn unaccepted_beat_is_not_checked() {
        let img = frame();
        let mut chk = ConformanceChecker::new(5, 5);
        let wrong = PixelBeat::new(Pixel::new(0xdead), false, false);
        assert_eq!(chk.sample(&img, &wrong, false).unwrap(), CheckStatus::Idle);
        assert_eq!(chk.cursor().position(), (0, 0));
    }

    #[test]
    fn mismatch_names_coordinate() {
        let img = frame();
        let mut chk = ConformanceChecker::new(5, 5);
        for x in 0..5 {
            chk.sample(&img, &beat_at(&img, x, 0), true).unwrap();
        }
        chk.sample(&img, &beat_at(&img, 0, 1), true).unwrap();
        chk.sample(&img, &beat_at(&img, 1, 1), true).unwrap();
        let bad = PixelBeat::new(Pixel::new(0x010203), false, false);
        match chk.sample(&img, &bad, true) {
            Err(HarnessError::ContentMismatch(m)) => {
                assert_eq!((m.x, m.y), (2, 1));
                assert_eq!(m.expected, img.pixel(2, 1));
                assert_eq!(m.actual, Pixel::new(0x010203));
                assert_eq!(m.following.len(), MISMATCH_CONTEXT);
                assert_eq!(m.following[0], img.pixel(3, 1));
                assert_eq!(m.following[2], img.pixel(0, 2));
            }
            other => panic!("expected content mismatch, got {other:?}"),
        }
    }

    #[test]
    fn missing_row_last_is_framing_violation() {
        let img = frame();
        let mut chk = ConformanceChecker::new(5, 5);
        for x in 0..4 {
            chk.sample(&img, &beat_at(&img, x, 0), true).unwrap();
        }
        let mut beat = beat_at(&img, 4, 0);
        beat.row_last = false;
        let err = chk.sample(&img, &beat, true).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::FramingViolation {
                x: 4,
                y: 0,
                flag: BoundaryFlag::RowLast,
                expected: true,
                actual: false,
            }
        ));
    }

    #[test]
    fn early_frame_last_is_framing_violation() {
        let img = frame();
        let mut chk = ConformanceChecker::new(5, 5);
        for x in 0..4 {
            chk.sample(&img, &beat_at(&img, x, 0), true).unwrap();
        }
        let mut beat = beat_at(&img, 4, 0);
        beat.frame_last = true;
        let err = chk.sample(&img, &beat, true).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::FramingViolation { flag: BoundaryFlag::FrameLast, .. }
        ));
    }

    #[test]
    fn frame_last_without_row_last_is_ignored() {
        let img = frame();
        let mut chk = ConformanceChecker::new(5, 5);
        let mut beat = beat_at(&img, 0, 0);
        beat.frame_last = true;
        assert_eq!(chk.sample(&img, &beat, true).unwrap(), CheckStatus::Checked);
        assert_eq!(chk.cursor().position(), (1, 0));
    }
}
