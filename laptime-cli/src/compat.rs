//! Export for older timekeeping tools
//!
//! Writes the log as `<whole seconds>\t<event>` lines, with `start all`
//! shortened to `all`.

use anyhow::{Context, Result};
use laptime_core::{Event, EventLog};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One log event in bibtime format, without the line ending
pub fn bibtime_line(event: &Event) -> String {
    let text = event.text.replace("start all", "all");
    format!("{}\t{}", event.timestamp.trunc() as i64, text)
}

pub fn write_bibtime(log: &EventLog, output: &Path) -> Result<()> {
    let file = File::create(output)
        .with_context(|| format!("Failed to create bibtime file: {:?}", output))?;
    let mut writer = BufWriter::new(file);
    for event in log {
        writeln!(writer, "{}", bibtime_line(event))?;
    }
    writer.flush()?;

    log::info!("Wrote {} events to {:?}", log.len(), output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_bibtime_line() {
        assert_eq!(bibtime_line(&Event::new(1354301000.75, "start all")), "1354301000\tall");
        assert_eq!(bibtime_line(&Event::new(1354301060.2, "17")), "1354301060\t17");
        assert_eq!(bibtime_line(&Event::new(5.0, "start 1 2")), "5\tstart 1 2");
    }

    #[test]
    fn test_write_bibtime() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("bibtime.txt");
        let mut log = EventLog::new();
        log.append(10.5, "start all");
        log.append(20.0, "3");

        write_bibtime(&log, &output).unwrap();
        assert_eq!(fs::read_to_string(&output).unwrap(), "10\tall\n20\t3\n");
    }
}
