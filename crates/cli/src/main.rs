//! Neuralese CLI - evolutionary search for a compact referential protocol.

mod settings;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use neuralese_core::{BestBundle, FewShots, Grammar, Message, Patch, RunId, Scene};
use neuralese_evaluation::{score, Evaluator};
use neuralese_evolution::EvolutionEngine;
use neuralese_oracle::{GuardedOracle, Listener, OpenAiOracle, Oracle, OracleError, Speaker};
use neuralese_storage::{ArtifactStore, JsonArtifactStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use settings::{Overrides, Settings};

#[derive(Parser)]
#[command(name = "neuralese")]
#[command(about = "Evolve a compact grammar-constrained protocol", long_about = None)]
struct Cli {
    /// Configuration file (default: ./neuralese.toml if present)
    #[arg(long, global = true, env = "NEURALESE_CONFIG")]
    config: Option<PathBuf>,

    /// Scenes per evaluation batch
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    /// Round budget
    #[arg(long, global = true)]
    rounds: Option<usize>,

    /// Random seed
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Artifacts directory
    #[arg(long, global = true, env = "NEURALESE_ARTIFACTS")]
    artifacts_dir: Option<PathBuf>,

    /// Debug logging and per-scene examples
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a grammar on a fresh batch
    Evaluate {
        /// Grammar file (default: built-in base grammar)
        #[arg(long)]
        grammar: Option<PathBuf>,
    },
    /// Run the evolutionary search
    Evolve {
        /// Starting grammar file (default: built-in base grammar)
        #[arg(long)]
        grammar: Option<PathBuf>,
    },
    /// Apply a patch file to a grammar offline
    Mutate {
        /// Grammar file (default: built-in base grammar)
        #[arg(long)]
        grammar: Option<PathBuf>,
        /// Patch JSON file
        #[arg(long)]
        patch: PathBuf,
    },
    /// Validate a grammar and report its complexity
    Inspect {
        /// Grammar file
        #[arg(long)]
        grammar: PathBuf,
    },
    /// Play the best bundle on fresh scenes
    Demo {
        /// Scenes to play
        #[arg(short, long, default_value = "5")]
        n: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Settings::load(cli.config.as_deref())?.with_overrides(Overrides {
        batch_size: cli.batch_size,
        rounds: cli.rounds,
        seed: cli.seed,
        artifacts_dir: cli.artifacts_dir.clone(),
    });

    match cli.command {
        Commands::Evaluate { grammar } => {
            let grammar = load_grammar(grammar.as_deref())?;
            let oracle = build_oracle(&settings)?;
            let mut rng = settings.env.rng();
            let scenes = settings
                .env
                .sampler()
                .batch(settings.env.batch_size, &mut rng)
                .context("Failed to sample scenes")?;

            let eval = Evaluator::new(oracle)
                .evaluate(&grammar, &scenes, &FewShots::default())
                .await?;
            let m = &eval.metrics;

            println!("Metrics");
            println!("  Accuracy:        {:.3} ({}/{})", m.accuracy, m.n_correct, m.n_scenes);
            println!("  Avg length:      {:.1} chars", m.avg_msg_chars);
            println!("  Collision rate:  {:.3}", m.collision_rate);
            println!("  Parse failures:  {:.3}", m.parse_fail_rate);
            println!(
                "  Complexity:      {} rules, {:.2} symbols/rhs",
                m.complexity.rule_count, m.complexity.mean_rhs_symbols
            );
            println!("  Score:           {:.3}", score(m, &settings.scoring, None));

            let baseline_ok = m.accuracy > 0.97 && m.parse_fail_rate < 0.05;
            println!(
                "Baseline (accuracy > 0.97, parse-fail < 0.05): {}",
                if baseline_ok { "PASS" } else { "FAIL" }
            );

            if cli.verbose {
                for (i, e) in eval.sample(3).iter().enumerate() {
                    println!("Example {}:", i);
                    println!("  Target:  {}", e.scene.target().describe());
                    println!("  Message: {}", e.message);
                    println!("  Guess:   {} ({})", e.prediction, if e.correct { "correct" } else { "wrong" });
                    if let Some(err) = &e.error {
                        println!("  Error:   {}", err);
                    }
                }
            }
        }
        Commands::Evolve { grammar } => {
            let grammar = load_grammar(grammar.as_deref())?;
            let oracle = build_oracle(&settings)?;
            let store = JsonArtifactStore::new(&settings.artifacts_dir, RunId::new())
                .await
                .context("Failed to create artifacts directory")?;
            info!("Artifacts in {}", store.run_dir().display());

            let mut engine = EvolutionEngine::new(oracle, store, &settings.env)
                .with_config(settings.evolution.clone())
                .with_weights(settings.scoring.clone())
                .with_grammar(grammar);
            let report = engine.run().await?;

            print!("{}", report.table());
            println!("Stopped: {}", report.stop);
            println!(
                "Accepted {} / rejected {} / skipped {}",
                report.statistics.accepted, report.statistics.rejected, report.statistics.skipped
            );
            println!("\nFinal grammar:\n{}", report.final_grammar);
            if let Some(best) = &report.best {
                println!("Best grammar (round {}, score {:.3}):\n{}", best.round, best.score, best.grammar);
            }
        }
        Commands::Mutate { grammar, patch } => {
            let grammar = load_grammar(grammar.as_deref())?;
            let text = std::fs::read_to_string(&patch)
                .with_context(|| format!("Failed to read patch {}", patch.display()))?;
            match Patch::from_json(&text).and_then(|p| p.apply(&grammar)) {
                Ok(next) if next == grammar => println!("Patch made no change\n{}", next),
                Ok(next) => println!("{}", next),
                Err(e) => println!("Patch rejected: {}", e),
            }
        }
        Commands::Inspect { grammar } => {
            let grammar = load_grammar(Some(&grammar))?;
            let issues = grammar.issues();
            if issues.is_empty() {
                println!("Grammar is well-formed");
            } else {
                println!("Issues ({})", issues.len());
                for issue in &issues {
                    println!("  {}", issue);
                }
            }
            let c = grammar.complexity();
            println!("Rules: {}", c.rule_count);
            println!("Mean RHS symbols: {:.2}", c.mean_rhs_symbols);
        }
        Commands::Demo { n } => {
            let store = JsonArtifactStore::open(&settings.artifacts_dir);
            let Some(best) = store.load_best().await? else {
                println!("No best bundle in {}; run `neuralese evolve` first", settings.artifacts_dir.display());
                return Ok(());
            };
            println!("Best grammar (round {}, score {:.3}):\n{}", best.round, best.score, best.grammar);

            let oracle = build_oracle(&settings)?;
            let scenes = demo_scenes(&settings, n)?;
            let mut correct = 0;
            for (i, scene) in scenes.iter().enumerate() {
                println!("\nScene {}:\n{}", i, scene.describe());
                let Some((message, guess)) = play_scene(oracle.as_ref(), &best, scene).await? else {
                    println!("  Oracle call failed, counted as a miss");
                    continue;
                };
                let hit = guess == scene.target_idx();
                if hit {
                    correct += 1;
                }
                println!("  Message: {}", message);
                println!("  Guess: {} (target {}) {}", guess, scene.target_idx(), if hit { "✓" } else { "✗" });
            }
            println!("\n{}/{} correct", correct, scenes.len());
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_grammar(path: Option<&Path>) -> Result<Grammar> {
    let Some(path) = path else {
        return Ok(Grammar::base());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read grammar {}", path.display()))?;
    Grammar::parse(&text).with_context(|| format!("Invalid grammar {}", path.display()))
}

/// Scenes for `demo`; always at least one.
fn demo_scenes(settings: &Settings, n: usize) -> Result<Vec<Scene>> {
    let mut rng = settings.env.rng();
    Ok(settings.env.sampler().batch(n.max(1), &mut rng)?)
}

/// One speaker/listener exchange. Soft and exhausted transient failures
/// yield `None`; hard failures propagate.
async fn play_scene(
    oracle: &dyn Oracle,
    best: &BestBundle,
    scene: &Scene,
) -> std::result::Result<Option<(Message, usize)>, OracleError> {
    let exchange = async {
        let message = oracle.speak(&best.grammar, scene, &best.fewshots.speaker).await?;
        let guess = oracle
            .listen(&best.grammar, scene, &message, &best.fewshots.listener)
            .await?;
        Ok::<_, OracleError>((message, guess))
    };
    match exchange.await {
        Ok(turn) => Ok(Some(turn)),
        Err(e) if e.is_hard() => Err(e),
        Err(e) => {
            warn!("Demo scene failed: {}", e);
            Ok(None)
        }
    }
}

fn build_oracle(settings: &Settings) -> Result<Arc<dyn Oracle>> {
    let client = OpenAiOracle::from_env(settings.oracle.client.clone())?;
    Ok(Arc::new(GuardedOracle::new(client, settings.oracle.retry.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use neuralese_oracle::fakes::FakeOracle;

    fn bundle() -> BestBundle {
        BestBundle {
            grammar: Grammar::base(),
            fewshots: FewShots::default(),
            score: 0.0,
            round: 0,
            metrics: Default::default(),
        }
    }

    #[test]
    fn test_demo_plays_at_least_one_scene() {
        let settings = Settings::default();
        assert_eq!(demo_scenes(&settings, 0).unwrap().len(), 1);
        assert_eq!(demo_scenes(&settings, 3).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_demo_scene_soft_failure_is_a_miss() {
        let scene = demo_scenes(&Settings::default(), 1).unwrap().remove(0);
        let oracle = FakeOracle::new().with_speaker(|_, _| Err(OracleError::Malformed("garbled".into())));
        assert!(play_scene(&oracle, &bundle(), &scene).await.unwrap().is_none());

        let (_, guess) = play_scene(&FakeOracle::new(), &bundle(), &scene).await.unwrap().unwrap();
        assert_eq!(guess, scene.target_idx());
    }

    #[tokio::test]
    async fn test_demo_scene_hard_failure_propagates() {
        let scene = demo_scenes(&Settings::default(), 1).unwrap().remove(0);
        let oracle = FakeOracle::new().with_speaker(|_, _| Err(OracleError::Unavailable("no key".into())));
        assert!(play_scene(&oracle, &bundle(), &scene).await.is_err());
    }
}
