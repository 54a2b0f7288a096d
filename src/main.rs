//! @ai:module:intent CLI for the sheltercheck evaluation harness
//! @ai:module:layer presentation

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use sheltercheck_bench::{
    batch::{
        build_follow_ups, original_prompts, test_name, AnyTransport, BatchClient, BatchItem,
        Postfix, ProviderFamily,
    },
    call_log::{CallLog, CallLogEntry, FileCallLog},
    config::HarnessConfig,
    corpus::{DatasetStats, Strategy, StrategyLoader, StrategyLoaderTrait},
    metrics::MetricsAggregator,
    report::{FinalReport, MarkdownReporter, ReportGenerator},
    runner::{AnyChatClient, RetryPolicy, YesNoClarifier, FOLLOW_UP_PROMPT},
    tasks::{
        analysis_verification_items, draft_transcript, generation_item, goal_verification_items,
        grading_items, load_graded, step_cloze_items, step_from, ClozeExample, GoalVariant, NShot,
        Standard, EXCLUDED_STRATEGIES,
    },
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "sheltercheck")]
#[command(about = "Evaluation harness for LLM reasoning about tax strategies")]
#[command(version)]
struct Cli {
    /// Path to configuration file (defaults to sheltercheck.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Verify every analysis step, interactively or as a batch
    AnalysisVerification {
        #[arg(long)]
        model: String,

        /// viable or correct
        #[arg(long)]
        standard: Standard,

        /// Only this strategy number
        #[arg(long)]
        num: Option<u32>,

        /// Call the model now instead of submitting a batch
        #[arg(long)]
        call_now: bool,
    },

    /// Verify that the strategies meet their goals
    GoalVerification {
        #[arg(long)]
        model: String,

        #[arg(long)]
        standard: Standard,

        /// goal_verification_without_analysis, goal_verification_with_analysis or goal_verification_adversarial_step
        #[arg(long)]
        test: GoalVariant,

        #[arg(long)]
        num: Option<u32>,

        #[arg(long)]
        call_now: bool,
    },

    /// Retrieve a yes/no batch and submit the follow-up round
    Clarify(BatchRef),

    /// Retrieve the follow-up round and tally yes/no answers
    FinalizeBinary(BatchRef),

    /// Step-cloze stages
    StepCloze {
        #[command(subcommand)]
        stage: StepClozeStage,
    },

    /// Free-form generation and grading stages
    Freeform {
        #[command(subcommand)]
        stage: FreeformStage,
    },

    /// Print dataset statistics
    Stats,

    /// Initialize default configuration
    Init {
        /// Output path for config file
        #[arg(short, long, default_value = "sheltercheck.toml")]
        output: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum StepClozeStage {
    /// Blank out each step and submit the batch
    Start {
        #[arg(long)]
        model: String,

        #[arg(long)]
        num: Option<u32>,

        /// Worked examples shown first (0, 1 or 2)
        #[arg(long, default_value_t = 0)]
        n_shot: u8,
    },

    /// Retrieve answers and submit them to the critic model
    Grade(BatchRef),

    /// Retrieve critic grades and build the histogram
    Finalize {
        #[arg(long)]
        testname: String,

        #[arg(long)]
        handle: String,
    },
}

#[derive(Subcommand, Debug)]
enum FreeformStage {
    /// Ask a model to devise a strategy
    Generate {
        #[arg(long)]
        num: u32,

        #[arg(long)]
        model: String,
    },

    /// Download generated strategies as transcripts ready for human grading
    Retrieve(BatchRef),

    /// Have a model grade the human-graded answers
    Grade {
        #[arg(long)]
        model: String,

        /// Only this file of the graded directory
        #[arg(long)]
        file: Option<String>,
    },

    /// Compare model grades with human grades
    Finalize(BatchRef),
}

#[derive(Args, Debug)]
struct BatchRef {
    /// Test name printed when the batch was submitted
    #[arg(long)]
    testname: String,

    /// Model the batch was submitted against
    #[arg(long)]
    model: String,

    /// Provider batch handle
    #[arg(long)]
    handle: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(err) = dotenvy::from_filename("sheltercheck.env") {
        if !err.not_found() {
            return Err(err).context("Failed to read sheltercheck.env");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sheltercheck_bench=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let harness = match &cli.command {
        Commands::Init { output } => return init_config(output),
        _ => Harness::new(load_or_default_config(cli.config.as_deref())?),
    };

    match cli.command {
        Commands::AnalysisVerification {
            model,
            standard,
            num,
            call_now,
        } => {
            harness.note(&format!(
                "analysis_verification, with model={} standard={} num={:?} call_now={}",
                model,
                standard.as_str(),
                num,
                call_now
            ))?;
            let items = analysis_verification_items(&harness.load_strategies(num)?, standard)?;
            let test = suffixed("analysis_verification", num);

            if call_now {
                run_interactive(&harness, &items, &model, &test).await
            } else {
                submit_first_round(&harness, &test, &model, &items).await
            }
        }
        Commands::GoalVerification {
            model,
            standard,
            test,
            num,
            call_now,
        } => {
            harness.note(&format!(
                "goal_verification, with model={} standard={} test={} num={:?} call_now={}",
                model,
                standard.as_str(),
                test.test_name(),
                num,
                call_now
            ))?;
            let items = goal_verification_items(&harness.load_strategies(num)?, test, standard)?;
            let test = suffixed(test.test_name(), num);

            if call_now {
                run_interactive(&harness, &items, &model, &test).await
            } else {
                submit_first_round(&harness, &test, &model, &items).await
            }
        }
        Commands::Clarify(batch) => clarify(&harness, batch).await,
        Commands::FinalizeBinary(batch) => finalize_binary(&harness, batch).await,
        Commands::StepCloze { stage } => run_step_cloze(&harness, stage).await,
        Commands::Freeform { stage } => run_freeform(&harness, stage).await,
        Commands::Stats => print_stats(&harness),
        Commands::Init { .. } => Ok(()),
    }
}

/// Shared state of one CLI invocation
struct Harness {
    config: HarnessConfig,
    log: Arc<dyn CallLog>,
    loader: StrategyLoader,
}

impl Harness {
    fn new(config: HarnessConfig) -> Self {
        let log: Arc<dyn CallLog> = Arc::new(FileCallLog::new(config.paths.call_log.clone()));
        Self {
            config,
            log,
            loader: StrategyLoader::new(),
        }
    }

    fn batch_client(&self, model: &str) -> Result<BatchClient<AnyTransport>> {
        BatchClient::from_config(model, &self.config, self.log.clone())
            .with_context(|| format!("Failed to set up a batch client for {}", model))
    }

    fn load_strategies(&self, num: Option<u32>) -> Result<Vec<Strategy>> {
        let dir = &self.config.paths.strategies_dir;
        let strategies = self
            .loader
            .load_selected(dir, num)
            .with_context(|| format!("Failed to load strategies from {}", dir.display()))?;

        if strategies.is_empty() {
            bail!("No strategies found in {} (num={:?})", dir.display(), num);
        }
        tracing::info!("Loaded {} strategies", strategies.len());
        Ok(strategies)
    }

    fn load_strategy(&self, num: u32) -> Result<Strategy> {
        self.loader
            .load_by_number(&self.config.paths.strategies_dir, num)?
            .with_context(|| format!("No strategy numbered {}", num))
    }

    fn note(&self, text: &str) -> Result<()> {
        self.log.record(&CallLogEntry::Note(text.to_string()))?;
        Ok(())
    }

    fn read_prompt_file(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read prompt file {}", path.display()))
    }
}

fn suffixed(test: &str, num: Option<u32>) -> String {
    match num {
        Some(n) => format!("{}_{}", test, n),
        None => test.to_string(),
    }
}

/// @ai:intent Ask every yes/no item now through the clarifier and count the Yes answers
/// @ai:effects network, fs:write, io
async fn run_interactive(
    harness: &Harness,
    items: &[BatchItem],
    model: &str,
    context: &str,
) -> Result<()> {
    let client = Arc::new(AnyChatClient::for_model(model, &harness.config.api)?);
    let clarifier = YesNoClarifier::new(
        client,
        harness.log.clone(),
        RetryPolicy::from(&harness.config.retry),
        harness.config.retry.max_clarifications,
    );

    let mut num_correct = 0;
    for item in items {
        let prompt = item
            .primary_prompt()
            .with_context(|| format!("{} has no prompt", item.identifier))?;

        println!("********: id= {}", item.identifier);
        println!("{}", prompt);

        let verdict = clarifier.ask(prompt, context).await?;
        println!("TIMESTAMP = {}", verdict.timestamp.as_deref().unwrap_or("none"));
        println!("ANSWER = {:?}", verdict.answer);
        println!("{}", verdict.explanation);

        if verdict.answer.is_affirmative() {
            num_correct += 1;
        }
    }

    println!("num_correct = {}; total_called = {}", num_correct, items.len());
    Ok(())
}

/// @ai:intent Write and submit a first-round batch under a fresh test name
/// @ai:effects network, fs:write, io
async fn submit_first_round(
    harness: &Harness,
    test: &str,
    model: &str,
    items: &[BatchItem],
) -> Result<()> {
    let testname = test_name(test, model, chrono::Local::now().naive_local())?;
    let client = harness.batch_client(model)?;

    let job = client.write_and_submit(&testname, Postfix::Upload1, items).await?;

    println!("testname= {}", testname);
    println!("NUM ITEMS= {}", items.len());
    println!("batch handle= {}", job.handle);
    Ok(())
}

/// @ai:intent Second stage of a binary test: follow up every first-round answer
/// @ai:effects network, fs:read, fs:write, io
async fn clarify(harness: &Harness, batch: BatchRef) -> Result<()> {
    let client = harness.batch_client(&batch.model)?;

    let uploaded = match client.family() {
        ProviderFamily::Gemini => vec![],
        _ => client
            .read_upload(&batch.testname, Postfix::Upload1)
            .context("The first-round upload file is needed to rebuild the prompts")?,
    };

    let first_round = client
        .retrieve(&batch.handle, &batch.testname, Postfix::Upload1)
        .await?;
    print_usage(&first_round.usage);

    let follow_ups = build_follow_ups(&first_round, &uploaded, FOLLOW_UP_PROMPT)?;
    let job = client
        .write_and_submit(&batch.testname, Postfix::Upload2, &follow_ups)
        .await?;

    println!("testname= {}", batch.testname);
    println!("batch handle= {}", job.handle);
    Ok(())
}

/// @ai:intent Final stage of a binary test
/// @ai:effects network, fs:read, fs:write, io
async fn finalize_binary(harness: &Harness, batch: BatchRef) -> Result<()> {
    let client = harness.batch_client(&batch.model)?;
    let retrieved = client
        .retrieve(&batch.handle, &batch.testname, Postfix::Upload2)
        .await?;

    for item in &retrieved.items {
        println!("{}\t{}", item.identifier, item.text);
    }

    let tally = MetricsAggregator::new()?.binary_tally(&batch.testname, &retrieved)?;
    write_report(harness, FinalReport::Binary(tally))
}

/// @ai:effects network, fs:read, fs:write, io
async fn run_step_cloze(harness: &Harness, stage: StepClozeStage) -> Result<()> {
    harness.note(&format!("step_cloze, with args={:?}", stage))?;

    match stage {
        StepClozeStage::Start { model, num, n_shot } => {
            if let Some(n) = num.filter(|n| EXCLUDED_STRATEGIES.contains(n)) {
                bail!("Strategy {} supplies the N-shot examples and cannot be asked", n);
            }

            let shots = NShot::new(n_shot)?;
            let sources = shots
                .sources()
                .iter()
                .map(|(number, _)| harness.load_strategy(*number))
                .collect::<Result<Vec<_>>>()?;
            let examples: Vec<ClozeExample<'_>> = sources
                .iter()
                .zip(shots.sources())
                .map(|(strategy, (_, step))| ClozeExample {
                    strategy,
                    step: *step,
                })
                .collect();

            let items = step_cloze_items(&harness.load_strategies(num)?, &examples)?;
            let test = match num {
                Some(n) => format!("step_cloze_s{}_N{}", n, n_shot),
                None => format!("step_cloze_N{}", n_shot),
            };
            submit_first_round(harness, &test, &model, &items).await
        }
        StepClozeStage::Grade(batch) => {
            let answers = harness
                .batch_client(&batch.model)?
                .retrieve(&batch.handle, &batch.testname, Postfix::Upload1)
                .await?;
            print_usage(&answers.usage);

            let few_shot = harness.read_prompt_file(&harness.config.paths.step_grading_prompt)?;
            let strategies = harness.load_strategies(None)?;
            let items = grading_items(&answers.items, &few_shot, |id| step_from(&strategies, id))?;

            let critic = harness.batch_client(&harness.config.api.critic_model)?;
            let job = critic
                .write_and_submit(&batch.testname, Postfix::Upload2, &items)
                .await?;

            println!("TOTAL ITEMS IN= {} TOTAL ITEMS OUT= {}", answers.items.len(), items.len());
            println!("testname= {}", batch.testname);
            println!("batch handle= {}", job.handle);
            Ok(())
        }
        StepClozeStage::Finalize { testname, handle } => {
            let grades = harness
                .batch_client(&harness.config.api.critic_model)?
                .retrieve(&handle, &testname, Postfix::Upload2)
                .await?;

            let histogram = MetricsAggregator::new()?.grade_histogram(&testname, &grades);
            write_report(harness, FinalReport::StepCloze(histogram))
        }
    }
}

/// @ai:effects network, fs:read, fs:write, io
async fn run_freeform(harness: &Harness, stage: FreeformStage) -> Result<()> {
    harness.note(&format!("freeform, with args={:?}", stage))?;

    match stage {
        FreeformStage::Generate { num, model } => {
            let items = vec![generation_item(&harness.load_strategy(num)?)?];
            submit_first_round(harness, &format!("generate_freeform_{}", num), &model, &items).await
        }
        FreeformStage::Retrieve(batch) => {
            let client = harness.batch_client(&batch.model)?;
            let retrieved = client
                .retrieve(&batch.handle, &batch.testname, Postfix::Upload1)
                .await?;
            print_usage(&retrieved.usage);

            let sources = if retrieved.echoed_requests.is_empty() {
                client.read_upload(&batch.testname, Postfix::Upload1)?
            } else {
                retrieved.echoed_requests.clone()
            };
            let prompts = original_prompts(&sources)?;

            let dir = &harness.config.paths.downloads_dir;
            let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string();
            for item in &retrieved.items {
                let prompt = prompts
                    .get(&item.identifier)
                    .with_context(|| format!("No prompt was uploaded for {}", item.identifier))?;
                let path = dir.join(format!("{}_{}.txt", batch.testname, item.identifier));
                std::fs::write(
                    &path,
                    draft_transcript(&timestamp, &batch.testname, prompt, &item.text),
                )
                .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Output at: {}", path.display());
            }
            Ok(())
        }
        FreeformStage::Grade { model, file } => {
            let graded = load_graded(&harness.config.paths.freeform_dir, file.as_deref())?;
            if graded.is_empty() {
                bail!(
                    "No graded answers in {}",
                    harness.config.paths.freeform_dir.display()
                );
            }

            let rubric = harness.read_prompt_file(&harness.config.paths.freeform_rubric)?;
            let items: Vec<BatchItem> = graded.iter().map(|g| g.grading_item(&rubric)).collect();

            let test = match file.as_deref() {
                Some(name) => {
                    format!("freeform_grade_{}", name.strip_suffix(".txt").unwrap_or(name))
                }
                None => "freeform_grade".to_string(),
            };
            submit_first_round(harness, &test, &model, &items).await
        }
        FreeformStage::Finalize(batch) => {
            let retrieved = harness
                .batch_client(&batch.model)?
                .retrieve(&batch.handle, &batch.testname, Postfix::Upload1)
                .await?;

            let graded = load_graded(&harness.config.paths.freeform_dir, None)?;
            let agreement =
                MetricsAggregator::new()?.grade_agreement(&batch.testname, &retrieved, &graded)?;

            for (identifier, pair) in &agreement.pairs {
                println!("{}\thuman={}\tmodel={}", identifier, pair.human, pair.model);
            }
            write_report(harness, FinalReport::Freeform(agreement))
        }
    }
}

/// @ai:intent Persist a finalize report and echo it to the console
/// @ai:effects fs:write, io
fn write_report(harness: &Harness, report: FinalReport) -> Result<()> {
    let written = ReportGenerator::new().generate_all(&report, &harness.config.paths.results_dir)?;

    println!("{}", MarkdownReporter::render(&report)?);
    for path in written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn print_usage(usage: &sheltercheck_bench::batch::TokenUsage) {
    println!("total_input_tokens = {}", usage.input_tokens);
    println!("total_reasoning_tokens = {}", usage.reasoning_tokens);
    println!("total_output_tokens = {}", usage.output_tokens);
}

/// @ai:intent Print dataset composition
/// @ai:effects fs:read, io
fn print_stats(harness: &Harness) -> Result<()> {
    let strategies = harness.load_strategies(None)?;
    let stats = DatasetStats::collect(&strategies)?;

    for (file, steps) in &stats.files {
        println!("{}\t{}", file, steps);
    }
    println!();
    println!("Strategies: {}", strategies.len());
    println!("Total steps: {}", stats.total_steps);

    println!("\nPrimary tax-law areas:");
    for (area, count) in &stats.by_primary_area {
        println!("  {}: {}", area, count);
    }
    println!("\nStrategy types:");
    for (kind, count) in &stats.by_strategy_type {
        println!("  {}: {}", kind, count);
    }

    println!();
    for (label, counts) in [
        ("strategy steps", &stats.strategy_steps),
        ("background items", &stats.background_items),
        ("goals", &stats.goal_items),
        ("analysis items", &stats.analysis_items),
    ] {
        println!(
            "{}: min={} max={} mean={:.2}",
            label, counts.min, counts.max, counts.mean
        );
    }
    Ok(())
}

/// @ai:intent Initialize default configuration file
/// @ai:effects fs:write
fn init_config(output: &Path) -> Result<()> {
    HarnessConfig::default().save(output)?;
    println!("Configuration saved to {}", output.display());
    Ok(())
}

/// @ai:intent Load configuration or use defaults
/// @ai:effects fs:read
fn load_or_default_config(path: Option<&Path>) -> Result<HarnessConfig> {
    match path {
        Some(p) => HarnessConfig::load(p)
            .with_context(|| format!("Failed to load config {}", p.display())),
        None => {
            let default_path = Path::new("sheltercheck.toml");
            if default_path.exists() {
                HarnessConfig::load(default_path)
            } else {
                Ok(HarnessConfig::default())
            }
        }
    }
}
