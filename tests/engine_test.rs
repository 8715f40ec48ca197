//! End-to-end tests for the scheduler over candle files on disk

use candle_sweep::allocation::PolicyRegistry;
use candle_sweep::backtest::{MarketSet, ScoreKind, Simulator};
use candle_sweep::config::Config;
use candle_sweep::data::{PriceStore, ResultStore, Variant};
use candle_sweep::scheduler::{grid_tasks, Scheduler, SchedulerOptions, SubmitOutcome};
use std::path::Path;
use std::time::{Duration, Instant};

fn write_candles(dir: &Path, file: &str, base: f64) {
    let prices: Vec<String> = (0..120)
        .map(|i| format!("{:.4}", base * (1.0 + 0.3 * ((i % 9) as f64 / 8.0))))
        .collect();
    std::fs::write(dir.join(file), format!("p 1500000000 {}\n", prices.join(" "))).unwrap();
}

fn config(dir: &Path) -> Config {
    let text = format!(
        r#"
        [engine]
        workers = 3
        leaderboard_size = 3
        results_path = "{results}"

        [simulation]
        lookahead_length = 4
        min_order_size = "0.0001"
        trade_fraction = "0.2"

        [simulation.initial_holdings]
        BTC = "1"
        ETH = "10"

        [data]
        candles_dir = "{candles}"

        [[data.markets]]
        quote = "ETH"
        file = "BTC_ETH"

        [[data.markets]]
        quote = "LTC"
        file = "BTC_LTC"

        [[data.variants]]
        name = "all"

        [[data.variants]]
        name = "eth-only"
        exclude = ["LTC"]

        [grid]
        kinds = ["sma", "sma-ratio"]
        fast_lengths = [2, 3]
        slow_lengths = [6]
        weights = ["1"]
        policies = ["rating", "equal-weight"]
        "#,
        results = dir.join("results/scores.txt").display(),
        candles = dir.display(),
    );
    Config::parse(&text).unwrap()
}

fn scheduler(config: &Config) -> Scheduler {
    let simulator = Simulator::new(
        config.simulation.clone(),
        PriceStore::load(&config.data),
        config.data.variants.iter().map(Variant::from).collect(),
        PolicyRegistry::standard(),
    );
    Scheduler::new(
        simulator,
        SchedulerOptions::from(&config.engine),
        Some(ResultStore::new(&config.engine.results_path)),
    )
}

fn wait_until_finished(scheduler: &Scheduler) {
    let deadline = Instant::now() + Duration::from_secs(60);
    while !scheduler.is_finished() {
        assert!(Instant::now() < deadline, "workers did not finish");
        std::thread::sleep(Duration::from_millis(10));
    }
}

fn setup() -> (tempfile::TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    write_candles(dir.path(), "BTC_ETH", 0.1);
    write_candles(dir.path(), "BTC_LTC", 0.02);
    let config = config(dir.path());
    (dir, config)
}

#[test]
fn test_grid_run_persists_and_ranks() {
    let (_dir, config) = setup();
    let mut scheduler = scheduler(&config);
    let markets = MarketSet::new("BTC", config.quotes());
    let tasks = grid_tasks(&config.grid, &markets, scheduler.simulator().policies()).unwrap();
    assert_eq!(tasks.len(), 8);

    for task in tasks {
        assert!(matches!(scheduler.submit(task), SubmitOutcome::Queued(_)));
    }
    scheduler.close();
    scheduler.start(config.engine.workers).unwrap();
    wait_until_finished(&scheduler);
    scheduler.join();

    let report = scheduler.harvest();
    assert_eq!(report.processed, 8);
    assert_eq!(report.accepted, 8);
    assert_eq!(report.persisted, 8);
    assert_eq!(report.pending, 0);

    let status = scheduler.status();
    assert_eq!(status.done, 8);
    assert_eq!(status.total, Some(8));
    assert_eq!(status.active_workers, 0);

    for board in scheduler.leaderboards().iter() {
        assert_eq!(board.len(), 3);
    }

    let stored = ResultStore::new(&config.engine.results_path).load().unwrap();
    assert_eq!(stored.len(), 8);
}

#[test]
fn test_resume_marks_stored_tasks_as_duplicates() {
    let (_dir, config) = setup();
    let markets = MarketSet::new("BTC", config.quotes());

    let best = {
        let mut first = scheduler(&config);
        let tasks = grid_tasks(&config.grid, &markets, first.simulator().policies()).unwrap();
        for task in tasks {
            first.submit(task);
        }
        first.close();
        first.start(2).unwrap();
        wait_until_finished(&first);
        first.join();
        first.harvest();
        first
            .leaderboards()
            .board(ScoreKind::TimeWeighted)
            .best()
            .map(|record| record.scores.time_weighted)
            .unwrap()
    };

    let mut resumed = scheduler(&config);
    assert_eq!(resumed.resume().unwrap(), 8);
    assert_eq!(
        resumed
            .leaderboards()
            .board(ScoreKind::TimeWeighted)
            .best()
            .map(|record| record.scores.time_weighted),
        Some(best)
    );

    let tasks = grid_tasks(&config.grid, &markets, resumed.simulator().policies()).unwrap();
    for task in tasks {
        assert!(matches!(resumed.submit(task), SubmitOutcome::Duplicate(_)));
    }
    assert_eq!(resumed.queue_len(), 0);
    assert_eq!(resumed.status().duplicates, 8);
}

#[test]
fn test_corrupt_store_aborts_resume() {
    let (dir, config) = setup();
    std::fs::create_dir_all(dir.path().join("results")).unwrap();
    std::fs::write(&config.engine.results_path, "not a result line\n").unwrap();

    let mut scheduler = scheduler(&config);
    assert!(scheduler.resume().is_err());
}
