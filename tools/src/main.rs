//! ace-runner: headless front door to the ACE fraud engine.
//!
//! Usage:
//!   ace-runner --transaction tx.json --mode online_ace
//!   ace-runner --transaction tx.json --modes vanilla,offline_ace,online_ace
//!   ace-runner --dataset labeled.json --modes vanilla,offline_ace,online_ace
//!   ace-runner --generate 500 --seed 42 --modes vanilla,online_ace
//!   ace-runner --playbook --db ace.db
//!   ace-runner --ipc-mode --db ace.db

use acefraud_core::{
    analysis::{FraudAnalysisResult, Mode},
    config::AceConfig,
    dataset::{load_dataset, parse_dataset, SyntheticDataset},
    engine::{FraudEngine, PlaybookView},
    experiment::{ExperimentConfig, ExperimentResult},
    store::AnalysisStore,
    transaction::Transaction,
};
use anyhow::Result;
use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Analyze {
        transaction: serde_json::Value,
        #[serde(default = "default_mode")]
        mode: Mode,
        #[serde(default)]
        modes: Option<Vec<Mode>>,
    },
    Experiment {
        modes: Vec<Mode>,
        #[serde(default)]
        dataset: Option<serde_json::Value>,
        #[serde(default)]
        generate: Option<usize>,
        #[serde(default)]
        seed: Option<u64>,
    },
    GetPlaybook,
    GetAgentAnalysis {
        id: String,
    },
    Feedback {
        analysis_id: String,
        is_fraud: bool,
    },
    Quit,
}

fn default_mode() -> Mode {
    Mode::OnlineAce
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let generate = parse_arg(&args, "--generate", 0usize);
    let fraud_rate = parse_arg(&args, "--fraud-rate", 0.3f64);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let show_playbook = args.iter().any(|a| a == "--playbook");
    let as_json = args.iter().any(|a| a == "--json");
    let db = string_arg(&args, "--db").unwrap_or(":memory:");
    let data_dir = string_arg(&args, "--data-dir").unwrap_or("./data");

    let config = if Path::new(data_dir).is_dir() {
        AceConfig::load(data_dir)?
    } else {
        log::warn!("data dir {data_dir} not found; using built-in defaults");
        AceConfig::default_test()
    };

    let store = if db == ":memory:" {
        AnalysisStore::in_memory()?
    } else {
        AnalysisStore::open(db)?
    };
    store.migrate()?;

    let engine = FraudEngine::new(config, store)?;

    if ipc_mode {
        return run_ipc_loop(&engine);
    }

    let modes_arg = string_arg(&args, "--modes").map(parse_modes).transpose()?;

    if let Some(path) = string_arg(&args, "--transaction") {
        let modes = match &modes_arg {
            Some(modes) => modes.clone(),
            None => vec![string_arg(&args, "--mode")
                .map(parse_mode)
                .transpose()?
                .unwrap_or(Mode::OnlineAce)],
        };
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let tx = Transaction::from_json(&content)?;
        let results = engine.compare(&tx, &modes)?;
        if as_json {
            match results.as_slice() {
                [single] => println!("{}", serde_json::to_string_pretty(single)?),
                _ => println!("{}", serde_json::to_string_pretty(&results)?),
            }
        } else {
            for result in &results {
                print_analysis(result);
            }
        }
    }

    let dataset_path = string_arg(&args, "--dataset");
    if dataset_path.is_some() || generate > 0 {
        let modes = modes_arg.unwrap_or_else(|| Mode::ALL.to_vec());
        let dataset = match dataset_path {
            Some(path) => load_dataset(path)?,
            None => SyntheticDataset::generate(seed, generate, fraud_rate),
        };
        let results = engine.run_experiment(&ExperimentConfig { modes, dataset })?;
        if as_json {
            println!("{}", serde_json::to_string_pretty(&results)?);
        } else {
            print_experiments(&results);
        }
    }

    if show_playbook {
        let view = engine.playbook()?;
        if as_json {
            println!("{}", serde_json::to_string_pretty(&view)?);
        } else {
            print_playbook(&view);
        }
    }

    Ok(())
}

fn run_ipc_loop(engine: &FraudEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        if matches!(cmd, IpcCommand::Quit) {
            break;
        }

        let reply = match handle_command(engine, cmd) {
            Ok(value) => value,
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        };
        writeln!(stdout, "{}", reply)?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(engine: &FraudEngine, cmd: IpcCommand) -> Result<serde_json::Value> {
    let value = match cmd {
        IpcCommand::Analyze { transaction, mode, modes } => {
            let tx = Transaction::from_json(&transaction.to_string())?;
            match modes {
                Some(modes) => serde_json::to_value(engine.compare(&tx, &modes)?)?,
                None => serde_json::to_value(engine.analyze(&tx, mode)?)?,
            }
        }
        IpcCommand::Experiment { modes, dataset, generate, seed } => {
            let dataset = match (dataset, generate) {
                (Some(items), _) => parse_dataset(&items.to_string())?,
                (None, Some(n)) => SyntheticDataset::generate(seed.unwrap_or(42), n, 0.3),
                (None, None) => Vec::new(),
            };
            serde_json::to_value(engine.run_experiment(&ExperimentConfig { modes, dataset })?)?
        }
        IpcCommand::GetPlaybook => serde_json::to_value(engine.playbook()?)?,
        IpcCommand::GetAgentAnalysis { id } => serde_json::to_value(engine.agent_analysis(&id)?)?,
        IpcCommand::Feedback { analysis_id, is_fraud } => {
            let outcome = engine.submit_feedback(&analysis_id, is_fraud)?;
            serde_json::json!({
                "playbook_version": outcome.version,
                "events": outcome.events,
            })
        }
        IpcCommand::Quit => serde_json::Value::Null,
    };
    Ok(value)
}

fn print_analysis(result: &FraudAnalysisResult) {
    println!("=== ANALYSIS ===");
    println!("  analysis_id: {}", result.analysis_id);
    println!("  mode:        {}", result.mode.as_str());
    println!("  playbook:    v{}", result.playbook_version);
    println!("  decision:    {}", result.decision.as_str());
    println!("  risk score:  {:.1}", result.risk_score);
    println!("  confidence:  {:.3}", result.confidence);
    println!("  reasoning:   {}", result.reasoning);
    println!();
    for (kind, analysis) in &result.analyzer_results {
        let breakdown = &result.risk_breakdown[kind];
        println!(
            "  {:<22} {:>5.1} x {:.2}  {}{}",
            kind.as_str(),
            analysis.risk_score,
            breakdown.contribution,
            analysis.recommendation.as_str(),
            if analysis.degraded { " (degraded)" } else { "" }
        );
        for finding in &analysis.findings {
            println!("      - {finding}");
        }
    }
}

fn print_experiments(results: &[ExperimentResult]) {
    println!("=== EXPERIMENT SUMMARY ===");
    for r in results {
        println!(
            "  {:<12} | items: {:>5} | accuracy: {:>5.1}% | playbook: {:>3} | {:.3}s",
            r.mode.as_str(),
            r.problems_processed,
            r.final_accuracy * 100.0,
            r.playbook_size,
            r.execution_time
        );
    }
}

fn print_playbook(view: &PlaybookView) {
    println!(
        "=== PLAYBOOK v{} ({} active / {} total) ===",
        view.version, view.active_bullets, view.total_bullets
    );
    for (kind, bullets) in &view.nodes {
        println!("  {}", kind.as_str());
        for b in bullets {
            println!(
                "    [{}] {} | +{} -{} | rate {:.2}{}",
                b.id,
                b.content,
                b.helpful_count,
                b.harmful_count,
                b.success_rate,
                if b.retired { " (retired)" } else { "" }
            );
        }
    }
}

fn parse_mode(s: &str) -> Result<Mode> {
    Mode::parse(s).ok_or_else(|| anyhow::anyhow!("unknown mode '{s}' (vanilla|offline_ace|online_ace)"))
}

fn parse_modes(list: &str) -> Result<Vec<Mode>> {
    list.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(parse_mode)
        .collect()
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
