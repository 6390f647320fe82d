//! Plain text signal files
//!
//! One sample per line: either a single real value, or a real and an imaginary value
//! separated by whitespace. Reading stops at the end of the file or at the first line that
//! does not parse. Values are written with six decimal digits.
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use num_complex::Complex64;
use tracing::{debug, warn};

use crate::error::{FftError, Result};

/// What is written for every output sample
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `re im` per line
    #[default]
    Complex,
    /// `re` per line
    RealOnly,
}

/// Input and output sequences of one transform run
#[derive(Debug, Clone, Default)]
pub struct SignalBuffer {
    input: Vec<Complex64>,
    output: Option<Vec<Complex64>>,
}

impl SignalBuffer {
    /// Wraps `samples`, zero padding them to the next power of 2
    pub fn from_samples(mut samples: Vec<Complex64>) -> Self {
        pad_to_power_of_two(&mut samples);
        Self {
            input: samples,
            output: None,
        }
    }

    /// Loads the signal stored at `path`, zero padded to the next power of 2
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| FftError::io(path, err))?;
        let samples = parse_signal(BufReader::new(file)).map_err(|err| FftError::io(path, err))?;
        debug!(path = %path.display(), samples = samples.len(), "loaded signal");
        Ok(Self::from_samples(samples))
    }

    /// Writes the output sequence to `path`
    pub fn write(&self, path: impl AsRef<Path>, format: OutputFormat) -> Result<()> {
        let output = self.output.as_deref().ok_or(FftError::EmptyOutput)?;
        write_signal(path, output, format)
    }

    pub fn input(&self) -> &[Complex64] {
        &self.input
    }

    pub fn output(&self) -> Option<&[Complex64]> {
        self.output.as_deref()
    }

    pub fn set_output(&mut self, output: Vec<Complex64>) {
        self.output = Some(output);
    }

    /// Moves the output into the input slot, e.g. to run the inverse on a computed spectrum
    pub fn feed_back(&mut self) -> Result<()> {
        self.input = self.output.take().ok_or(FftError::EmptyOutput)?;
        Ok(())
    }
}

/// Zero pads `samples` to the next power of 2, logging a warning when it had to
pub fn pad_to_power_of_two(samples: &mut Vec<Complex64>) {
    let n = samples.len();
    if n == 0 || n.is_power_of_two() {
        return;
    }
    let padded = n.next_power_of_two();
    samples.resize(padded, Complex64::default());
    warn!(
        original = n,
        padded, "input size is not a power of 2, zero padded"
    );
}

fn parse_line(line: &str) -> Option<Complex64> {
    let mut fields = line.split_whitespace();
    let re = fields.next()?.parse::<f64>().ok()?;
    let im = match fields.next() {
        Some(field) => field.parse::<f64>().ok()?,
        None => 0.0,
    };
    Some(Complex64::new(re, im))
}

/// Reads samples until EOF or the first malformed line. Blank lines are skipped.
///
/// A line that is not valid UTF-8 counts as malformed; only read failures are errors.
pub fn parse_signal<R: BufRead>(mut reader: R) -> std::io::Result<Vec<Complex64>> {
    let mut samples = Vec::new();
    let mut raw = Vec::new();
    let mut line_no = 0;
    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw)? == 0 {
            break;
        }
        line_no += 1;

        let sample = match std::str::from_utf8(&raw) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => parse_line(line),
            Err(_) => None,
        };
        match sample {
            Some(sample) => samples.push(sample),
            None => {
                debug!(line = line_no, "stopped reading at malformed sample");
                break;
            }
        }
    }
    Ok(samples)
}

/// Writes one sample per line with six decimal digits
pub fn format_signal<W: Write>(
    mut writer: W,
    samples: &[Complex64],
    format: OutputFormat,
) -> std::io::Result<()> {
    for z in samples {
        match format {
            OutputFormat::Complex => writeln!(writer, "{:.6} {:.6}", z.re, z.im)?,
            OutputFormat::RealOnly => writeln!(writer, "{:.6}", z.re)?,
        }
    }
    writer.flush()
}

/// Creates or truncates `path` and writes `samples` to it
pub fn write_signal(path: impl AsRef<Path>, samples: &[Complex64], format: OutputFormat) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|err| FftError::io(path, err))?;
    format_signal(BufWriter::new(file), samples, format).map_err(|err| FftError::io(path, err))?;
    debug!(path = %path.display(), samples = samples.len(), "stored signal");
    Ok(())
}
