//! Terminal host: prints drawn text and remembers the requested tick rate.

use std::io::Write;

use opusbench_core::TickRate;
use opusbench_decode::Host;
use tracing::{debug, warn};

/// Host that writes each drawn line to an output stream.
///
/// Coordinates are ignored; a clear starts a new block separated by a blank line.
pub struct TerminalHost<W: Write> {
    out: W,
    tick_rate: TickRate,
    /// Lines drawn since the last clear.
    drawn: usize,
    /// Suppress display output, e.g. when printing JSON.
    quiet: bool,
    /// Set after the first failed write; later output is dropped.
    write_failed: bool,
}

impl<W: Write> TerminalHost<W> {
    pub const fn new(out: W, idle_fps: u32) -> Self {
        Self {
            out,
            tick_rate: TickRate::Fixed(idle_fps),
            drawn: 0,
            quiet: false,
            write_failed: false,
        }
    }

    #[must_use]
    pub const fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub const fn tick_rate(&self) -> TickRate {
        self.tick_rate
    }

    pub const fn write_failed(&self) -> bool {
        self.write_failed
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, text: &str) {
        if self.quiet || self.write_failed {
            return;
        }
        if let Err(e) = writeln!(self.out, "{text}").and_then(|()| self.out.flush()) {
            warn!("Failed to write to display, dropping further output: {e}");
            self.write_failed = true;
        }
    }
}

impl<W: Write> Host for TerminalHost<W> {
    fn clear(&mut self) {
        if self.drawn > 0 {
            self.write_line("");
        }
        self.drawn = 0;
    }

    fn draw_text(&mut self, text: &str, _x: i32, _y: i32) {
        self.drawn += 1;
        self.write_line(text);
    }

    fn set_tick_rate(&mut self, rate: TickRate) {
        if rate != self.tick_rate {
            debug!("Tick rate: {:?}", rate);
            self.tick_rate = rate;
        }
    }
}
