//! Progress reporting from ffmpeg's diagnostic output.
//!
//! ffmpeg writes its periodic stats line to stderr, e.g.
//!
//! ```text
//! frame=  240 fps= 60 q=28.0 size=    512kB time=00:00:09.97 bitrate= 420.5kbits/s speed=2.5x
//! ```
//!
//! [`ProgressMonitor`] picks the `time=` marker out of such lines and turns it
//! into time and percentage callbacks. [`OutputMonitor`] forwards stdout.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

type LineCallback = Box<dyn FnMut(&str) + Send>;
type TimeCallback = Box<dyn FnMut(Duration) + Send>;
type PercentCallback = Box<dyn FnMut(f64) + Send>;

const TIME_MARKER: &str = "time=";

/// Find the first `time=HH:MM:SS.ff` marker in `line` and parse it.
///
/// Hours may have two or more digits; the fraction is optional and may have
/// any precision. Markers that do not follow that shape (`time=N/A`, negative
/// timestamps) are skipped.
pub fn parse_time_marker(line: &str) -> Option<Duration> {
    line.match_indices(TIME_MARKER)
        .find_map(|(idx, _)| parse_timestamp(&line[idx + TIME_MARKER.len()..]))
}

fn parse_timestamp(s: &str) -> Option<Duration> {
    let bytes = s.as_bytes();
    let mut pos = 0;

    let hours = take_digits(bytes, &mut pos, 2, usize::MAX)?;
    expect(bytes, &mut pos, b':')?;
    let minutes = take_digits(bytes, &mut pos, 2, 2)?;
    expect(bytes, &mut pos, b':')?;
    let seconds = take_digits(bytes, &mut pos, 2, 2)?;

    let mut nanos: u64 = 0;
    if bytes.get(pos) == Some(&b'.') {
        pos += 1;
        let start = pos;
        let fraction = &s[start..start + count_digits(&bytes[start..])];
        if fraction.is_empty() {
            return None;
        }
        // Only the first nine digits fit in nanoseconds.
        let significant = &fraction[..fraction.len().min(9)];
        let value: u64 = significant.parse().ok()?;
        nanos = value * 10u64.pow(9 - significant.len() as u32);
    }

    if minutes >= 60 || seconds >= 60 {
        return None;
    }

    let total_secs = hours.checked_mul(3600)?.checked_add(minutes * 60 + seconds)?;
    Some(Duration::new(total_secs, nanos as u32))
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

fn take_digits(bytes: &[u8], pos: &mut usize, min: usize, max: usize) -> Option<u64> {
    let len = count_digits(&bytes[*pos..]);
    if len < min || len > max {
        return None;
    }
    let digits = std::str::from_utf8(&bytes[*pos..*pos + len]).ok()?;
    *pos += len;
    digits.parse().ok()
}

fn expect(bytes: &[u8], pos: &mut usize, byte: u8) -> Option<()> {
    if bytes.get(*pos) == Some(&byte) {
        *pos += 1;
        Some(())
    } else {
        None
    }
}

/// `processed / total * 100`, rounded to two decimal places.
pub fn percentage(processed: Duration, total: Duration) -> f64 {
    let total = total.as_secs_f64();
    if total <= 0.0 {
        return 0.0;
    }
    (processed.as_secs_f64() / total * 100.0 * 100.0).round() / 100.0
}

/// Turns ffmpeg stderr lines into progress callbacks.
#[derive(Default)]
pub struct ProgressMonitor {
    total: Option<Duration>,
    on_percentage: Option<PercentCallback>,
    on_time: Option<TimeCallback>,
    on_line: Option<LineCallback>,
    last_percentage: f64,
}

impl ProgressMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report percentages relative to `total`.
    pub fn on_percentage(&mut self, total: Duration, callback: impl FnMut(f64) + Send + 'static) {
        self.total = Some(total);
        self.on_percentage = Some(Box::new(callback));
    }

    /// Report every parsed timestamp.
    pub fn on_time(&mut self, callback: impl FnMut(Duration) + Send + 'static) {
        self.on_time = Some(Box::new(callback));
    }

    /// Receive every stderr line verbatim.
    pub fn on_line(&mut self, callback: impl FnMut(&str) + Send + 'static) {
        self.on_line = Some(Box::new(callback));
    }

    /// Forget the previous run's percentage.
    pub fn reset(&mut self) {
        self.last_percentage = 0.0;
    }

    /// Handle one stderr line.
    pub fn observe(&mut self, line: &str) {
        if let Some(on_line) = self.on_line.as_mut() {
            on_line(line);
        }

        let Some(processed) = parse_time_marker(line) else {
            return;
        };

        if let Some(on_time) = self.on_time.as_mut() {
            on_time(processed);
        }

        if let (Some(total), Some(on_percentage)) = (self.total, self.on_percentage.as_mut()) {
            let pct = percentage(processed, total)
                .clamp(0.0, 100.0)
                .max(self.last_percentage);
            self.last_percentage = pct;
            on_percentage(pct);
        }
    }

    /// Emit the terminal observation of a successful run: 100% and, when
    /// known, the total duration.
    pub fn complete(&mut self) {
        if let Some(on_percentage) = self.on_percentage.as_mut() {
            self.last_percentage = 100.0;
            on_percentage(100.0);
        }
        if let (Some(total), Some(on_time)) = (self.total, self.on_time.as_mut()) {
            on_time(total);
        }
    }
}

impl std::fmt::Debug for ProgressMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressMonitor")
            .field("total", &self.total)
            .field("last_percentage", &self.last_percentage)
            .finish_non_exhaustive()
    }
}

/// Forwards ffmpeg stdout lines.
#[derive(Default)]
pub struct OutputMonitor {
    on_line: Option<LineCallback>,
}

impl OutputMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_line(&mut self, callback: impl FnMut(&str) + Send + 'static) {
        self.on_line = Some(Box::new(callback));
    }

    pub fn observe(&mut self, line: &str) {
        tracing::trace!("ffmpeg stdout: {line}");
        if let Some(on_line) = self.on_line.as_mut() {
            on_line(line);
        }
    }
}

impl std::fmt::Debug for OutputMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputMonitor").finish_non_exhaustive()
    }
}

/// Read `reader` to the end, splitting on `\n` or `\r`, and hand each
/// non-empty line (lossy UTF-8) to `on_line`.
///
/// ffmpeg terminates its stats line with a bare `\r`, so splitting on `\n`
/// alone would hold back progress until the very end.
pub async fn read_lines<R>(reader: R, mut on_line: impl FnMut(&str)) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            break;
        }
        let consumed = buf.len();
        for &byte in buf {
            if byte == b'\n' || byte == b'\r' {
                flush_line(&mut pending, &mut on_line);
            } else {
                pending.push(byte);
            }
        }
        reader.consume(consumed);
    }
    flush_line(&mut pending, &mut on_line);

    Ok(())
}

fn flush_line(pending: &mut Vec<u8>, on_line: &mut impl FnMut(&str)) {
    if pending.is_empty() {
        return;
    }
    let line = String::from_utf8_lossy(pending).into_owned();
    on_line(&line);
    pending.clear();
}
