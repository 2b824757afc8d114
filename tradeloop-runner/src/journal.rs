//! JSONL journal: one JSON object per line, append-only.
//!
//! Every line is tagged with its kind (`intent` or `order`) and carries the
//! strategy, symbol and account login of the record it wraps.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;
use tradeloop_core::engine::{IntentRecord, Journal, JournalError, OrderRecord};

/// One journal line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JournalEntry {
    Intent(IntentRecord),
    Order(OrderRecord),
}

/// Append-only JSONL file sink.
pub struct JsonlJournal {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonlJournal {
    /// Open (or create) the journal, creating parent directories as needed.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&mut self, entry: &JournalEntry) -> Result<(), JournalError> {
        let json = serde_json::to_string(entry)?;
        writeln!(self.writer, "{json}")?;
        self.writer.flush()?;
        Ok(())
    }
}

impl Journal for JsonlJournal {
    fn record_intent(&mut self, record: &IntentRecord) -> Result<(), JournalError> {
        self.append(&JournalEntry::Intent(record.clone()))
    }

    fn record_order(&mut self, record: &OrderRecord) -> Result<(), JournalError> {
        self.append(&JournalEntry::Order(record.clone()))
    }
}

/// Read every well-formed entry back.
///
/// A line that does not parse (a torn write after a crash, say) is skipped
/// with a warning naming its line number.
pub fn read_journal(path: &Path) -> io::Result<Vec<JournalEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = io::BufReader::new(File::open(path)?);
    let mut entries = Vec::new();
    let mut skipped = 0usize;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<JournalEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(err) => {
                skipped += 1;
                warn!(path = %path.display(), line = index + 1, %err, "skipping malformed journal line");
            }
        }
    }
    if skipped > 0 {
        warn!(path = %path.display(), skipped, read = entries.len(), "journal had malformed lines");
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tradeloop_core::domain::{Direction, OrderPlan, PositionId, StrategyId};
    use tradeloop_core::engine::OrderResult;
    use tradeloop_core::signal::{FilterEvaluation, FilterVerdict};

    fn intent() -> IntentRecord {
        IntentRecord {
            at: Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap(),
            strategy: "donchian_breakout".into(),
            strategy_id: StrategyId::derive("donchian_breakout", "EURUSD"),
            symbol: "EURUSD".into(),
            account: 5001,
            outcome: "no_signal".into(),
            direction: Some(Direction::Long),
            trail: Vec::new(),
            blocked_by: None,
        }
    }

    fn order() -> OrderRecord {
        OrderRecord {
            at: Utc.with_ymd_and_hms(2024, 3, 4, 10, 5, 0).unwrap(),
            strategy: "donchian_breakout".into(),
            strategy_id: StrategyId::derive("donchian_breakout", "EURUSD"),
            symbol: "EURUSD".into(),
            account: 5001,
            plan: OrderPlan {
                symbol: "EURUSD".into(),
                direction: Direction::Long,
                entry_price: 1.1031,
                stop_loss: 1.1011,
                take_profit: 1.1071,
                volume: 0.5,
                stop_distance: 0.002,
            },
            result: OrderResult::Filled {
                position_id: PositionId(9),
                fill_price: 1.1031,
                volume: 0.5,
            },
        }
    }

    #[test]
    fn appends_one_tagged_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal").join("eurusd.jsonl");
        let mut journal = JsonlJournal::open(&path).unwrap();
        journal.record_intent(&intent()).unwrap();
        journal.record_order(&order()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"kind\":\"intent\""));
        assert!(lines[0].contains("\"account\":5001"));
        assert!(lines[1].contains("\"kind\":\"order\""));
        assert!(lines[1].contains("\"status\":\"filled\""));
    }

    #[test]
    fn reopening_appends_instead_of_truncating() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("j.jsonl");
        JsonlJournal::open(&path).unwrap().record_intent(&intent()).unwrap();
        JsonlJournal::open(&path).unwrap().record_order(&order()).unwrap();

        let entries = read_journal(&path).unwrap();
        assert_eq!(entries, vec![JournalEntry::Intent(intent()), JournalEntry::Order(order())]);
    }

    #[test]
    fn crossover_trail_with_undefined_inputs_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("j.jsonl");
        let mut record = intent();
        record.trail = vec![
            FilterEvaluation::new("volatility", FilterVerdict::Passed).with("atr_pips", 4.2),
            FilterEvaluation::new("ema_crossover", FilterVerdict::NoSetup)
                .with("fast", 1.10125)
                .with("cross_age", f64::NAN)
                .with("accelerating", f64::NAN),
            FilterEvaluation::new("ut_bot", FilterVerdict::NoSetup)
                .with("stop", 1.1)
                .with("flip_age", f64::NAN),
        ];
        let mut journal = JsonlJournal::open(&path).unwrap();
        journal.record_intent(&record).unwrap();
        journal.record_intent(&record).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.contains("cross_age"));
        assert!(!text.contains("flip_age"));
        assert!(!text.contains("accelerating"));
        let entries = read_journal(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], JournalEntry::Intent(record));
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("j.jsonl");
        JsonlJournal::open(&path).unwrap().record_intent(&intent()).unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();

        assert_eq!(read_journal(&path).unwrap().len(), 1);
        assert!(read_journal(&dir.path().join("missing.jsonl")).unwrap().is_empty());
    }
}
