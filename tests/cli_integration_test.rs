//! CLI integration tests for command orchestration.
//!
//! Tests cover:
//! - Config parsing (build_simulation_config, build_risk_config, build_strategy)
//! - Optimizer grid parsing
//! - Validate command with real INI files on disk
//! - Backtest and optimize pipelines with MockDataPort
//! - Full commands against a temp data directory

mod common;

use common::*;
use std::io::Write;
use std::path::PathBuf;
use stoptrail::adapters::csv_report_adapter::CsvReportAdapter;
use stoptrail::adapters::file_config_adapter::FileConfigAdapter;
use stoptrail::cli::{self, Cli, Command};
use stoptrail::domain::error::SimError;
use stoptrail::domain::simulation::SimulationConfig;
use stoptrail::domain::strategy::{AtrRisk, EmaCrossover, Strategy};

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const VALID_INI: &str = r#"
[simulation]
symbol = BTCUSDT
initial_capital = 5000
commission_rate = 0.002
base_position_fraction = 0.5
confidence_threshold = 55
min_bars = 60
allow_shorting = true

[risk]
default_stop_loss_pct = 2.5
trailing_activation_pct = 1.5
partial_exits = false
max_holding_bars = 48

[strategy]
type = ema_crossover
fast_period = 5
slow_period = 20
atr_period = 10
reward_ratio = 3

[data]
directory = /tmp

[optimizer]
fast_periods = 3, 5
slow_periods = 13,21
trailing_activation_pcts = 0.5,1.0
top = 3
"#;

fn small_ema() -> EmaCrossover {
    EmaCrossover {
        fast: 3,
        slow: 8,
        risk: AtrRisk {
            atr_period: 5,
            ..AtrRisk::default()
        },
    }
}

fn wave_config(symbol: &str) -> SimulationConfig {
    SimulationConfig {
        symbol: symbol.into(),
        min_bars: 50,
        confidence_threshold: 0.0,
        ..SimulationConfig::default()
    }
}

mod config_loading {
    use super::*;

    #[test]
    fn build_simulation_config_valid_full() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let config = cli::build_simulation_config(&adapter);

        assert_eq!(config.symbol, "BTCUSDT");
        assert!((config.initial_capital - 5000.0).abs() < f64::EPSILON);
        assert!((config.commission_rate - 0.002).abs() < f64::EPSILON);
        assert!((config.base_position_fraction - 0.5).abs() < f64::EPSILON);
        assert!((config.confidence_threshold - 55.0).abs() < f64::EPSILON);
        assert_eq!(config.min_bars, 60);
        assert!(config.allow_shorting);
        assert!((config.risk.default_stop_loss_pct - 2.5).abs() < f64::EPSILON);
        assert!((config.risk.trailing_activation_pct - 1.5).abs() < f64::EPSILON);
        assert!(!config.risk.partial_exits_enabled);
        assert_eq!(config.risk.max_holding_bars, Some(48));
    }

    #[test]
    fn build_simulation_config_uses_defaults() {
        let adapter = FileConfigAdapter::from_string("[simulation]\nsymbol = ETHUSDT\n").unwrap();
        let config = cli::build_simulation_config(&adapter);
        let defaults = SimulationConfig::default();

        assert_eq!(config.symbol, "ETHUSDT");
        assert_eq!(config.initial_capital, defaults.initial_capital);
        assert_eq!(config.min_bars, defaults.min_bars);
        assert_eq!(config.risk, defaults.risk);
    }

    #[test]
    fn zero_max_holding_disables_time_exit() {
        let adapter =
            FileConfigAdapter::from_string("[risk]\nmax_holding_bars = 0\n").unwrap();
        assert_eq!(cli::build_risk_config(&adapter).max_holding_bars, None);
    }

    #[test]
    fn missing_symbol_fails_validation() {
        let file = write_temp_ini("[data]\ndirectory = /tmp\n");
        assert!(cli::load_config(file.path()).is_err());
    }
}

mod strategy_parsing {
    use super::*;

    #[test]
    fn build_strategy_ema_from_config() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let strategy = cli::build_strategy(&adapter).unwrap();
        assert_eq!(strategy.name(), "EMA(5/20)");

        let ema = cli::build_ema_crossover(&adapter);
        assert_eq!(ema.fast, 5);
        assert_eq!(ema.slow, 20);
        assert_eq!(ema.risk.atr_period, 10);
        assert!((ema.risk.reward_ratio - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn build_strategy_defaults_to_ema() {
        let adapter = FileConfigAdapter::from_string("[strategy]\n").unwrap();
        let strategy = cli::build_strategy(&adapter).unwrap();
        assert_eq!(strategy.name(), "EMA(9/21)");
    }

    #[test]
    fn build_strategy_rsi() {
        let adapter = FileConfigAdapter::from_string(
            "[strategy]\ntype = rsi_reversion\nrsi_period = 7\noversold = 25\noverbought = 75\n",
        )
        .unwrap();
        let strategy = cli::build_strategy(&adapter).unwrap();
        assert_eq!(strategy.name(), "RSI(7, 25/75)");
    }

    #[test]
    fn build_strategy_unknown_type() {
        let adapter =
            FileConfigAdapter::from_string("[strategy]\ntype = martingale\n").unwrap();
        let err = cli::build_strategy(&adapter).unwrap_err();
        assert!(matches!(err, SimError::ConfigInvalid { .. }));
        assert!(err.to_string().contains("martingale"));
    }

    #[test]
    fn build_strategy_rejects_inverted_periods() {
        let adapter = FileConfigAdapter::from_string(
            "[strategy]\nfast_period = 30\nslow_period = 10\n",
        )
        .unwrap();
        assert!(cli::build_strategy(&adapter).is_err());
    }
}

mod grid_parsing {
    use super::*;
    use stoptrail::domain::optimizer::ParamGrid;

    #[test]
    fn grid_from_config_with_defaults_for_missing_lists() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let grid = cli::build_param_grid(&adapter).unwrap();
        assert_eq!(grid.fast_periods, vec![3, 5]);
        assert_eq!(grid.slow_periods, vec![13, 21]);
        assert_eq!(grid.trailing_activation_pcts, vec![0.5, 1.0]);
        assert_eq!(
            grid.protection_peak_pcts,
            ParamGrid::default().protection_peak_pcts
        );
    }

    #[test]
    fn grid_rejects_garbage() {
        let adapter =
            FileConfigAdapter::from_string("[optimizer]\nfast_periods = 3, x\n").unwrap();
        let err = cli::build_param_grid(&adapter).unwrap_err();
        assert!(matches!(err, SimError::ConfigInvalid { .. }));
    }
}

mod validate_command {
    use super::*;

    #[test]
    fn validate_valid_config_succeeds() {
        let file = write_temp_ini(VALID_INI);
        let path = PathBuf::from(file.path());
        assert!(is_success(cli::run_validate(&path)));
    }

    #[test]
    fn validate_missing_file_fails_with_config_code() {
        let path = PathBuf::from("/nonexistent/path/config.ini");
        assert!(same_code(cli::run_validate(&path), 2));
    }

    #[test]
    fn validate_bad_value_fails() {
        let ini = VALID_INI.replace("commission_rate = 0.002", "commission_rate = 1.5");
        let file = write_temp_ini(&ini);
        assert!(same_code(cli::run_validate(file.path()), 2));
    }
}

mod pipeline_mock {
    use super::*;

    #[test]
    fn backtest_pipeline_writes_reports() {
        let mock = MockDataPort::new().with_bars("WAVE", wave_bars(200));
        let temp_dir = tempfile::TempDir::new().unwrap();
        let trades = temp_dir.path().join("trades.csv");
        let equity = temp_dir.path().join("equity.csv");

        let exit_code = cli::run_backtest_pipeline(
            &mock,
            &CsvReportAdapter::new(),
            wave_config("WAVE"),
            &small_ema(),
            Some(&trades),
            Some(&equity),
        );

        assert!(is_success(exit_code));
        let trades_csv = std::fs::read_to_string(&trades).unwrap();
        assert!(trades_csv.starts_with("symbol,side,entry_time"));
        assert!(trades_csv.lines().count() > 1);
        let equity_csv = std::fs::read_to_string(&equity).unwrap();
        assert_eq!(equity_csv.lines().count(), 201);
    }

    #[test]
    fn backtest_pipeline_data_error() {
        let mock = MockDataPort::new().with_error("WAVE", "disk on fire");
        let exit_code = cli::run_backtest_pipeline(
            &mock,
            &CsvReportAdapter::new(),
            wave_config("WAVE"),
            &small_ema(),
            None,
            None,
        );
        assert!(same_code(exit_code, 3));
    }

    #[test]
    fn backtest_pipeline_insufficient_data() {
        let mock = MockDataPort::new().with_bars("WAVE", wave_bars(20));
        let exit_code = cli::run_backtest_pipeline(
            &mock,
            &CsvReportAdapter::new(),
            wave_config("WAVE"),
            &small_ema(),
            None,
            None,
        );
        assert!(same_code(exit_code, 5));
    }

    #[test]
    fn optimize_pipeline_succeeds() {
        let mock = MockDataPort::new().with_bars("WAVE", wave_bars(200));
        let grid = stoptrail::domain::optimizer::ParamGrid {
            fast_periods: vec![3, 5],
            slow_periods: vec![8],
            trailing_activation_pcts: vec![1.0],
            protection_peak_pcts: vec![5.0],
        };
        let exit_code =
            cli::run_optimize_pipeline(&mock, wave_config("WAVE"), small_ema(), &grid, 5, false);
        assert!(is_success(exit_code));
    }

    #[test]
    fn optimize_pipeline_all_skipped() {
        let mock = MockDataPort::new().with_bars("WAVE", wave_bars(20));
        let exit_code = cli::run_optimize_pipeline(
            &mock,
            wave_config("WAVE"),
            small_ema(),
            &Default::default(),
            5,
            true,
        );
        assert!(same_code(exit_code, 5));
    }
}

mod end_to_end {
    use super::*;

    fn e2e_ini(data_dir: &std::path::Path) -> String {
        format!(
            "[simulation]\nsymbol = WAVE\nmin_bars = 50\nconfidence_threshold = 0\n\n\
             [strategy]\nfast_period = 3\nslow_period = 8\natr_period = 5\n\n\
             [data]\ndirectory = {}\n\n\
             [optimizer]\nfast_periods = 3\nslow_periods = 8,13\n",
            data_dir.display()
        )
    }

    #[test]
    fn backtest_command_with_real_files() {
        let dir = tempfile::TempDir::new().unwrap();
        write_symbol_csv(dir.path(), "WAVE", &wave_bars(200));
        let ini = write_temp_ini(&e2e_ini(dir.path()));
        let trades = dir.path().join("out_trades.csv");

        let exit_code = cli::run(Cli {
            command: Command::Backtest {
                config: ini.path().to_path_buf(),
                trades_out: Some(trades.clone()),
                equity_out: None,
            },
        });
        assert!(is_success(exit_code));
        assert!(trades.exists());
    }

    #[test]
    fn optimize_command_with_real_files() {
        let dir = tempfile::TempDir::new().unwrap();
        write_symbol_csv(dir.path(), "WAVE", &wave_bars(200));
        let ini = write_temp_ini(&e2e_ini(dir.path()));

        let exit_code = cli::run(Cli {
            command: Command::Optimize {
                config: ini.path().to_path_buf(),
                top: Some(2),
                sequential: true,
            },
        });
        assert!(is_success(exit_code));
    }

    #[test]
    fn backtest_command_missing_symbol_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let ini = write_temp_ini(&e2e_ini(dir.path()));

        let exit_code = cli::run(Cli {
            command: Command::Backtest {
                config: ini.path().to_path_buf(),
                trades_out: None,
                equity_out: None,
            },
        });
        assert!(same_code(exit_code, 3));
    }
}
