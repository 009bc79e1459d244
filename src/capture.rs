use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, info};

use crate::error::{Error, Result};
use crate::event::{Event, EventBatch};
use crate::grid::Resolution;
use crate::slicer::{EventSlicer, SliceMode};

/// Producer of raw event batches, e.g. an opened eDVS device.
pub trait EventSource: Send {
    /// Sensor resolution, fixed once the source is open.
    fn resolution(&self) -> Resolution;

    /// Next batch if one is ready, `None` otherwise. Never blocks indefinitely.
    fn next_batch(&mut self) -> Option<EventBatch>;
}

/// Parse one `x\ty\ttimestamp\tpolarity` line.
///
/// Returns `None` for blank lines, `#` comments and malformed rows.
pub fn parse_event_line(line: &str) -> Option<Event> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let mut parts = line.split('\t').map(str::trim);
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    let ts = parts.next()?.parse().ok()?;
    let pol = parts.next()?.parse().ok()?;
    Some(Event::new(x, y, ts, pol))
}

/// Replays a recorded event stream batch by batch.
pub struct ReplaySource {
    resolution: Resolution,
    batches: VecDeque<EventBatch>,
}

impl ReplaySource {
    pub fn from_batches(resolution: Resolution, batches: Vec<EventBatch>) -> Self {
        Self {
            resolution,
            batches: batches.into(),
        }
    }

    pub fn from_events<I>(resolution: Resolution, events: I, mode: SliceMode) -> Self
    where
        I: IntoIterator<Item = Event>,
    {
        let mut slicer = EventSlicer::new(mode);
        let mut batches: Vec<EventBatch> = events
            .into_iter()
            .filter_map(|event| slicer.push(event))
            .collect();
        batches.extend(slicer.flush());
        Self::from_batches(resolution, batches)
    }

    /// Read a tab-separated recording. Unparseable lines are skipped.
    pub fn from_reader<R: BufRead>(resolution: Resolution, reader: R, mode: SliceMode) -> Result<Self> {
        let mut events = Vec::new();
        let mut skipped = 0usize;
        for line in reader.lines() {
            let line = line?;
            match parse_event_line(&line) {
                Some(event) => events.push(event),
                None if line.trim().is_empty() || line.trim_start().starts_with('#') => {}
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            debug!("skipped {} malformed event lines", skipped);
        }
        let source = Self::from_events(resolution, events, mode);
        info!(
            "loaded {} batches for a {} sensor",
            source.remaining(),
            resolution
        );
        Ok(source)
    }

    /// Open a recording file as if it were a capture device.
    pub fn open(path: &Path, resolution: Resolution, mode: SliceMode) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::DeviceUnavailable(path.display().to_string())
            } else {
                Error::Io(e)
            }
        })?;
        Self::from_reader(resolution, BufReader::new(file), mode)
    }

    /// Number of batches not yet handed out.
    pub fn remaining(&self) -> usize {
        self.batches.len()
    }
}

impl EventSource for ReplaySource {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn next_batch(&mut self) -> Option<EventBatch> {
        self.batches.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn res() -> Resolution {
        Resolution::new(128, 128).unwrap()
    }

    #[test]
    fn test_parse_event_line() {
        assert_eq!(parse_event_line("10\t20\t300\t-1"), Some(Event::new(10, 20, 300, -1)));
        assert_eq!(parse_event_line("  # comment"), None);
        assert_eq!(parse_event_line(""), None);
        assert_eq!(parse_event_line("10\t20\t300"), None);
        assert_eq!(parse_event_line("a\t20\t300\t1"), None);
    }

    #[test]
    fn test_from_reader_batches_by_count() {
        let text = "# x y t p\n1\t1\t10\t1\n2\t2\t20\t-1\nbogus\n3\t3\t30\t1\n";
        let mut source =
            ReplaySource::from_reader(res(), Cursor::new(text), SliceMode::ByCount(2)).unwrap();
        assert_eq!(source.remaining(), 2);
        assert_eq!(source.next_batch().unwrap().len(), 2);
        assert_eq!(source.next_batch().unwrap(), vec![Event::new(3, 3, 30, 1)]);
        assert!(source.next_batch().is_none());
    }

    #[test]
    fn test_open_missing_file_is_device_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.tsv");
        let err = ReplaySource::open(&missing, res(), SliceMode::ByCount(10)).err().unwrap();
        assert!(matches!(err, Error::DeviceUnavailable(_)));
    }

    #[test]
    fn test_open_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "5\t6\t100\t1").unwrap();
        writeln!(file, "7\t8\t20100\t-1").unwrap();
        let mut source = ReplaySource::open(file.path(), res(), SliceMode::ByTime(10_000)).unwrap();
        assert_eq!(source.resolution(), res());
        assert_eq!(source.next_batch().unwrap(), vec![Event::new(5, 6, 100, 1)]);
        assert_eq!(source.next_batch().unwrap(), vec![Event::new(7, 8, 20100, -1)]);
    }
}
