//! Bounded top-K rankings, one per score kind

use crate::backtest::{ScoreKey, ScoreKind, ScoreRecord};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::Arc;

/// Highest-scoring distinct results for one score kind
#[derive(Debug, Clone)]
pub struct Leaderboard {
    kind: ScoreKind,
    capacity: usize,
    entries: BTreeMap<ScoreKey, Arc<ScoreRecord>>,
    by_result: HashMap<String, ScoreKey>,
}

impl Leaderboard {
    pub fn new(kind: ScoreKind, capacity: usize) -> Self {
        Self {
            kind,
            capacity: capacity.max(1),
            entries: BTreeMap::new(),
            by_result: HashMap::new(),
        }
    }

    pub fn kind(&self) -> ScoreKind {
        self.kind
    }

    /// Insert `record` ranked by its score for this board's kind.
    ///
    /// A result already on the board keeps its best key. Returns whether the
    /// record is on the board afterwards.
    pub fn insert(&mut self, record: Arc<ScoreRecord>, salt: u64) -> bool {
        let key = ScoreKey {
            value: record.scores.get(self.kind),
            salt,
        };

        let encoding = record.encoding.clone();

        if let Some(existing) = self.by_result.get(&encoding).copied() {
            if existing.value >= key.value {
                return true;
            }
            self.entries.remove(&existing);
        }

        self.by_result.insert(encoding.clone(), key);
        self.entries.insert(key, record);

        while self.entries.len() > self.capacity {
            if let Some((_, evicted)) = self.entries.pop_first() {
                self.by_result.remove(&evicted.encoding);
            }
        }
        self.by_result.contains_key(&encoding)
    }

    /// Whether a result with this encoding is ranked
    pub fn contains(&self, encoding: &str) -> bool {
        self.by_result.contains_key(encoding)
    }

    /// Up to `n` entries, best first
    pub fn top(&self, n: usize) -> Vec<(ScoreKey, &ScoreRecord)> {
        self.entries
            .iter()
            .rev()
            .take(n)
            .map(|(key, record)| (*key, record.as_ref()))
            .collect()
    }

    pub fn best(&self) -> Option<&ScoreRecord> {
        self.entries.values().next_back().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One leaderboard per score kind
#[derive(Debug, Clone)]
pub struct Leaderboards {
    boards: Vec<Leaderboard>,
}

impl Leaderboards {
    pub fn new(capacity: usize) -> Self {
        Self {
            boards: ScoreKind::ALL
                .into_iter()
                .map(|kind| Leaderboard::new(kind, capacity))
                .collect(),
        }
    }

    /// Rank a record on every board under the same tie-breaker
    pub fn insert(&mut self, record: ScoreRecord, salt: u64) {
        let record = Arc::new(record);
        for board in &mut self.boards {
            board.insert(Arc::clone(&record), salt);
        }
    }

    pub fn board(&self, kind: ScoreKind) -> &Leaderboard {
        // boards are built from ScoreKind::ALL, in order
        &self.boards[kind as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Leaderboard> {
        self.boards.iter()
    }

    /// Top `n` of every board as a printable table
    pub fn format_table(&self, n: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "══════════════════════════════════════════════════════");
        let _ = writeln!(out, "               LEADERBOARDS");
        let _ = writeln!(out, "══════════════════════════════════════════════════════");
        for board in &self.boards {
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", board.kind().label().to_uppercase());
            let _ = writeln!(out, "───────────────────────────────────────────────────────");
            if board.is_empty() {
                let _ = writeln!(out, "  (no results)");
            }
            for (rank, (_, record)) in board.top(n).into_iter().enumerate() {
                let _ = writeln!(out, "{:>3}. {}", rank + 1, record.summary());
            }
        }
        let _ = writeln!(out, "══════════════════════════════════════════════════════");
        out
    }
}
