//! Terminal subscriber for `--watch`: one line per task per update.

use fdp_core::broadcast::{SinkClosed, SubscriberSink};
use fdp_core::task::{human_size, Task};
use std::io::{self, Write};

use super::{percent, state_label};

pub struct TerminalSink<W: Write + Send + 'static> {
    out: W,
}

impl TerminalSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

pub fn render_line(t: &Task) -> String {
    let progress = match percent(t) {
        Some(p) => format!(
            "{} / {} ({:.1}%)",
            human_size(t.info.size),
            human_size(t.info.content_length),
            p
        ),
        None => human_size(t.info.size),
    };
    format!(
        "[{}] {}  {}  {}/s",
        state_label(t),
        t.info.name,
        progress,
        human_size(t.info.speed)
    )
}

impl<W: Write + Send + 'static> SubscriberSink for TerminalSink<W> {
    fn deliver(&mut self, tasks: &[Task]) -> Result<(), SinkClosed> {
        let closed = |e: io::Error| SinkClosed(e.to_string());
        writeln!(self.out, "-- {} task(s)", tasks.len()).map_err(closed)?;
        for t in tasks {
            writeln!(self.out, "  {}", render_line(t)).map_err(closed)?;
        }
        self.out.flush().map_err(closed)
    }
}
