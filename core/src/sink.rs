use std::io::Write;

use crate::error::HarnessError;
use crate::ports::ByteBurst;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Open,
    Finished,
}

/// Appends every valid burst to `W`, most significant byte first, until a
/// burst with `last` set flushes and closes the writer. Bytes are not
/// interpreted.
#[derive(Debug)]
pub struct ByteCaptureSink<W: Write> {
    out: Option<W>,
    state: CaptureState,
    bytes: u64,
    bursts: u64,
}

impl<W: Write> ByteCaptureSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Some(out),
            state: CaptureState::Open,
            bytes: 0,
            bursts: 0,
        }
    }

    /// Samples one cycle of the compressed-output port.
    pub fn sample(&mut self, burst: &ByteBurst) -> Result<CaptureState, HarnessError> {
        if !burst.valid {
            return Ok(self.state);
        }
        let Some(out) = self.out.as_mut() else {
            log::warn!("byte burst of {} bytes after end of stream ignored", burst.byte_count());
            return Ok(self.state);
        };

        let mut chunk = [0u8; 8];
        let n = burst.byte_count();
        for (slot, b) in chunk.iter_mut().zip(burst.bytes()) {
            *slot = b;
        }
        out.write_all(&chunk[..n]).map_err(HarnessError::Capture)?;
        self.bytes += n as u64;
        self.bursts += 1;
        #[cfg(feature = "trace_bytes")]
        log::trace!("capture: {:02x?}", &chunk[..n]);

        if burst.last {
            out.flush().map_err(HarnessError::Capture)?;
            self.out = None;
            self.state = CaptureState::Finished;
            log::debug!("capture: stream complete, {} bytes in {} bursts", self.bytes, self.bursts);
        }
        Ok(self.state)
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn bytes_captured(&self) -> u64 {
        self.bytes
    }

    pub fn bursts(&self) -> u64 {
        self.bursts
    }

    /// The writer, unless `last` already closed it.
    pub fn into_inner(self) -> Option<W> {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassembles_bursts_in_order() {
        let mut captured = Vec::new();
        let mut sink = ByteCaptureSink::new(&mut captured);
        let src: Vec<u8> = (1..=19).collect();
        sink.sample(&ByteBurst::pack(&src[0..8], false).unwrap()).unwrap();
        sink.sample(&ByteBurst::IDLE).unwrap();
        sink.sample(&ByteBurst::pack(&src[8..16], false).unwrap()).unwrap();
        let state = sink.sample(&ByteBurst::pack(&src[16..19], true).unwrap()).unwrap();
        assert_eq!(state, CaptureState::Finished);
        assert_eq!(sink.bytes_captured(), 19);
        assert_eq!(sink.bursts(), 3);
        assert!(sink.into_inner().is_none());
        assert_eq!(captured, src);
    }

    #[test]
    fn invalid_cycles_are_ignored() {
        let mut sink = ByteCaptureSink::new(Vec::new());
        let junk = ByteBurst {
            valid: false,
            count: 5,
            data: u64::MAX,
            last: true,
        };
        assert_eq!(sink.sample(&junk).unwrap(), CaptureState::Open);
        assert_eq!(sink.into_inner(), Some(Vec::new()));
    }

    #[test]
    fn nothing_accepted_after_last() {
        let mut captured = Vec::new();
        let mut sink = ByteCaptureSink::new(&mut captured);
        sink.sample(&ByteBurst::pack(&[0xaa], true).unwrap()).unwrap();
        sink.sample(&ByteBurst::pack(&[0xbb, 0xcc], false).unwrap()).unwrap();
        assert_eq!(sink.state(), CaptureState::Finished);
        drop(sink);
        assert_eq!(captured, vec![0xaa]);
    }

    #[test]
    fn write_failure_is_reported() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk full"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let mut sink = ByteCaptureSink::new(Broken);
        let err = sink.sample(&ByteBurst::pack(&[1, 2, 3], false).unwrap()).unwrap_err();
        assert!(matches!(err, HarnessError::Capture(_)));
    }

    #[test]
    fn writer_is_closed_on_last() {
        use std::cell::Cell;
        use std::rc::Rc;

        struct Tracked(Rc<Cell<bool>>);
        impl Write for Tracked {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.set(true);
            }
        }

        let closed = Rc::new(Cell::new(false));
        let mut sink = ByteCaptureSink::new(Tracked(closed.clone()));
        sink.sample(&ByteBurst::pack(&[1; 8], false).unwrap()).unwrap();
        assert!(!closed.get());
        sink.sample(&ByteBurst::pack(&[2, 3], true).unwrap()).unwrap();
        assert!(closed.get());
        assert_eq!(sink.bytes_captured(), 10);
    }
}
