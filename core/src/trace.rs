use std::io::{self, Write};

use crate::ports::{CoreInputs, CoreOutputs};

struct Signal {
    name: &'static str,
    width: u32,
}

const SIGNALS: [Signal; 16] = [
    Signal { name: "i_clk", width: 1 },
    Signal { name: "i_reset", width: 1 },
    Signal { name: "s_valid", width: 1 },
    Signal { name: "s_ready", width: 1 },
    Signal { name: "s_data", width: 24 },
    Signal { name: "s_hlast", width: 1 },
    Signal { name: "s_vlast", width: 1 },
    Signal { name: "q_valid", width: 1 },
    Signal { name: "q_bytes", width: 3 },
    Signal { name: "q_data", width: 64 },
    Signal { name: "q_last", width: 1 },
    Signal { name: "m_valid", width: 1 },
    Signal { name: "m_ready", width: 1 },
    Signal { name: "m_data", width: 24 },
    Signal { name: "m_hlast", width: 1 },
    Signal { name: "m_vlast", width: 1 },
];

fn sample(inputs: &CoreInputs, outputs: &CoreOutputs) -> [u64; 16] {
    [
        inputs.clk as u64,
        inputs.reset as u64,
        inputs.pixel.valid as u64,
        outputs.pixel_ready as u64,
        inputs.pixel.data.rgb() as u64,
        inputs.pixel.row_last as u64,
        inputs.pixel.frame_last as u64,
        outputs.bytes.valid as u64,
        outputs.bytes.count as u64,
        outputs.bytes.data,
        outputs.bytes.last as u64,
        outputs.out.valid as u64,
        inputs.out_ready as u64,
        outputs.out.data.rgb() as u64,
        outputs.out.row_last as u64,
        outputs.out.frame_last as u64,
    ]
}

/// Writes a VCD with one timestep per nanosecond. Only values that changed
/// since the previous dump are emitted.
pub struct VcdTrace<W: Write> {
    out: W,
    last: Option<[u64; 16]>,
}

impl<W: Write> VcdTrace<W> {
    pub fn new(mut out: W) -> io::Result<Self> {
        writeln!(out, "$version qoibench $end")?;
        writeln!(out, "$timescale 1ns $end")?;
        writeln!(out, "$scope module tb_top $end")?;
        for (i, sig) in SIGNALS.iter().enumerate() {
            writeln!(out, "$var wire {} {} {} $end", sig.width, ident(i), sig.name)?;
        }
        writeln!(out, "$upscope $end")?;
        writeln!(out, "$enddefinitions $end")?;
        Ok(Self { out, last: None })
    }

    pub fn dump(&mut self, time: u64, inputs: &CoreInputs, outputs: &CoreOutputs) -> io::Result<()> {
        let now = sample(inputs, outputs);
        writeln!(self.out, "#{time}")?;
        if self.last.is_none() {
            writeln!(self.out, "$dumpvars")?;
        }
        for (i, sig) in SIGNALS.iter().enumerate() {
            if self.last.is_some_and(|prev| prev[i] == now[i]) {
                continue;
            }
            if sig.width == 1 {
                writeln!(self.out, "{}{}", now[i], ident(i))?;
            } else {
                writeln!(self.out, "b{:b} {}", now[i], ident(i))?;
            }
        }
        if self.last.is_none() {
            writeln!(self.out, "$end")?;
        }
        self.last = Some(now);
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn ident(index: usize) -> char {
    (b'A' + index as u8) as char
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_source::Pixel;
    use crate::ports::PixelBeat;

    #[test]
    fn header_declares_every_signal() {
        let trace = VcdTrace::new(Vec::new()).unwrap();
        let text = String::from_utf8(trace.into_inner()).unwrap();
        assert!(text.contains("$timescale 1ns $end"));
        assert!(text.contains("$var wire 24 E s_data $end"));
        assert!(text.contains("$var wire 64 J q_data $end"));
        assert!(text.ends_with("$enddefinitions $end\n"));
    }

    #[test]
    fn only_changes_are_dumped() {
        let mut trace = VcdTrace::new(Vec::new()).unwrap();
        let mut inputs = CoreInputs::default();
        let outputs = CoreOutputs::default();
        trace.dump(0, &inputs, &outputs).unwrap();
        inputs.clk = true;
        inputs.pixel = PixelBeat::new(Pixel::new(0x5), false, false);
        trace.dump(10, &inputs, &outputs).unwrap();
        let text = String::from_utf8(trace.into_inner()).unwrap();
        let tail = text.split("#10\n").nth(1).unwrap();
        assert_eq!(tail, "1A\n1C\nb101 E\n");
    }
}
