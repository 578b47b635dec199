//! Clear command.

use std::io::Write;

use anyhow::Result;
use wt_core::{StateStore, Tracker};

pub fn run<W: Write, S: StateStore>(writer: &mut W, tracker: &mut Tracker<S>) -> Result<()> {
    let cleared = tracker.clear_logs()?;
    writeln!(writer, "Cleared {cleared} records.")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use wt_core::{MemoryStore, TaskRef, parse_instant};

    #[test]
    fn clear_keeps_running_timer() {
        let mut tracker = Tracker::new(MemoryStore::default());
        let t0 = parse_instant("2024-03-01T08:00:00Z").unwrap();
        tracker.start_or_stop_at(TaskRef::new("1", "A"), t0).unwrap();
        tracker
            .start_or_stop_at(TaskRef::new("2", "B"), t0 + chrono::Duration::hours(1))
            .unwrap();

        let mut output = Vec::new();
        run(&mut output, &mut tracker).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "Cleared 1 records.\n");

        let state = tracker.status().unwrap();
        assert!(state.logs.is_empty());
        assert_eq!(state.running().unwrap().task.id, "2");
    }
}
