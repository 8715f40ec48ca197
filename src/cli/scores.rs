//! Scores command implementation

use crate::backtest::{ScoreRecord, TieBreaker};
use crate::config::Config;
use crate::data::ResultStore;
use crate::scheduler::Leaderboards;
use clap::{Args, ValueEnum};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScoresFormat {
    Table,
    Json,
}

#[derive(Args, Debug)]
pub struct ScoresArgs {
    /// Entries per score kind
    #[arg(long, default_value = "10")]
    pub top: usize,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: ScoresFormat,
}

impl ScoresArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let store = ResultStore::new(&config.engine.results_path);
        let records = store.load()?;
        tracing::debug!(count = records.len(), path = ?store.path(), "Loaded result store");

        let boards = rank(records, self.top);
        match self.format {
            ScoresFormat::Table => print!("{}", boards.format_table(self.top)),
            ScoresFormat::Json => println!("{}", serde_json::to_string_pretty(&to_json(&boards, self.top))?),
        }
        Ok(())
    }
}

fn rank(records: Vec<ScoreRecord>, top: usize) -> Leaderboards {
    let tie_breaker = TieBreaker::new();
    let mut boards = Leaderboards::new(top.max(1));
    for record in records {
        boards.insert(record, tie_breaker.salt());
    }
    boards
}

fn to_json(boards: &Leaderboards, top: usize) -> serde_json::Value {
    let mut out = serde_json::Map::new();
    for board in boards.iter() {
        let entries: Vec<_> = board
            .top(top)
            .into_iter()
            .map(|(key, record)| {
                json!({
                    "score": key.value,
                    "fingerprint": record.fingerprint,
                    "scores": record.scores,
                    "encoding": record.encoding,
                })
            })
            .collect();
        out.insert(board.kind().label().to_string(), entries.into());
    }
    out.into()
}
