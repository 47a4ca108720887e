use anyhow::Context;
use clap::{Parser, Subcommand};
use image::ImageReader;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use plategate::config::{self, Config};
use plategate::detection::{self, DetectorKind};
use plategate::plates::{self, PlateGenerator};
use plategate::stream::{self, ConsoleExit};
use plategate::{
    AccessEngine, Frame, ImageSequence, NewVehicle, RecognitionPipeline, RegistryDb, RegistryError,
    StreamDriver, VehicleRegistry, VehicleType,
};

#[derive(Parser)]
#[command(name = "plategate")]
#[command(about = "Recognize license plates and decide whether a vehicle may enter")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Registry database URL (e.g. sqlite://plategate.db)
    #[arg(long, global = true, value_name = "URL")]
    database_url: Option<String>,

    /// Plate detector strategy
    #[arg(long, global = true, value_enum)]
    detector: Option<DetectorKind>,

    /// Model file for the learned detector (.rten)
    #[arg(long, global = true, value_name = "FILE")]
    detector_model: Option<PathBuf>,

    /// Directory holding the ocrs text models
    #[arg(long, global = true, value_name = "DIR")]
    ocr_models: Option<PathBuf>,

    /// JSON array of plates to allow-list at startup
    #[arg(long, global = true, value_name = "FILE")]
    allow_list: Option<PathBuf>,

    /// Allow-list a plate for this run (repeatable)
    #[arg(long = "allow", global = true, value_name = "PLATE")]
    allow: Vec<String>,

    /// Save each selected plate crop to this directory
    #[arg(long, global = true, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read the plate in one image
    Recognize {
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        /// Also decide access for the recognized plate
        #[arg(long)]
        check: bool,
    },
    /// Decide access for a plate
    Check {
        #[arg(value_name = "PLATE")]
        plate: String,
    },
    /// Add a vehicle to the registry
    Register {
        /// Plate number, e.g. А123ВС
        number: String,
        /// Region code, e.g. 77
        region: String,
        /// car, truck or motorcycle
        vehicle_type: String,
    },
    /// Fill the registry with synthetic plates
    Seed {
        #[arg(long, default_value_t = 1000)]
        count: usize,

        /// Seed even if the registry already has vehicles
        #[arg(long)]
        force: bool,
    },
    /// Run recognition over a frame directory and accept console commands
    Watch {
        #[arg(long, value_name = "DIR")]
        frames: Option<PathBuf>,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(url) = &cli.database_url {
        config.database_url = url.clone();
    }
    if let Some(detector) = cli.detector {
        config.detector = detector;
    }
    if let Some(model) = &cli.detector_model {
        config.detector_model = Some(model.clone());
    }
    if let Some(dir) = &cli.ocr_models {
        config.ocr_models_dir = Some(dir.clone());
    }
    if let Some(path) = &cli.allow_list {
        config.allow_list_path = Some(path.clone());
    }
    if let Some(dir) = &cli.debug_out {
        config.debug_out = Some(dir.clone());
    }
    config.validate()?;
    Ok(config)
}

fn build_engine(config: &Config, extra_plates: &[String]) -> anyhow::Result<AccessEngine> {
    let engine = match &config.allow_list_path {
        Some(path) => AccessEngine::from_allow_list_file(path)?,
        None => AccessEngine::new(),
    };
    for plate in extra_plates {
        engine.add_allowed_plate(&plates::normalize_plate(plate));
    }
    Ok(engine)
}

fn build_pipeline(config: &Config) -> anyhow::Result<RecognitionPipeline> {
    let detector = detection::build_detector(config)?;
    let extractor = detection::build_extractor(config)?;
    let mut pipeline = RecognitionPipeline::new(detector, extractor);
    if let Some(dir) = &config.debug_out {
        pipeline = pipeline.with_debug(dir.clone())?;
    }
    Ok(pipeline)
}

async fn print_verdict(engine: &AccessEngine, registry: &RegistryDb, plate: &str) -> anyhow::Result<()> {
    let verdict = engine
        .verdict(plate, registry)
        .await
        .context("access check failed")?;
    println!("{}", serde_json::to_string(&verdict)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    config::init_logging(cli.verbose);
    let config = load_config(&cli)?;

    match &cli.command {
        Command::Recognize { image_path, check } => {
            let pipeline = build_pipeline(&config)?;
            let img = ImageReader::open(image_path)?
                .decode()
                .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))?;
            tracing::info!("Image loaded: {}x{}", img.width(), img.height());

            let frame = Frame::new(img);
            let plate = tokio::task::spawn_blocking(move || pipeline.process(&frame))
                .await
                .context("recognition worker failed")?;

            match plate {
                None => println!("No plate found."),
                Some(text) if text.is_empty() => println!("Plate found but not legible."),
                Some(text) => {
                    println!("{}", text);
                    if *check {
                        let registry = RegistryDb::connect(&config.database_url).await?;
                        let engine = build_engine(&config, &cli.allow)?;
                        print_verdict(&engine, &registry, &plates::normalize_plate(&text)).await?;
                    }
                }
            }
        }
        Command::Check { plate } => {
            let registry = RegistryDb::connect(&config.database_url).await?;
            let engine = build_engine(&config, &cli.allow)?;
            print_verdict(&engine, &registry, &plates::normalize_plate(plate)).await?;
        }
        Command::Register {
            number,
            region,
            vehicle_type,
        } => {
            let vehicle_type: VehicleType = vehicle_type.parse()?;
            let registry = RegistryDb::connect(&config.database_url).await?;
            let record = registry
                .add_vehicle(&NewVehicle {
                    license_plate: plates::format_plate(number, region),
                    vehicle_type,
                })
                .await?;
            tracing::info!(plate = %record.license_plate, vehicle_type = %record.vehicle_type, "vehicle registered");
            println!("{}", serde_json::to_string(&record)?);
        }
        Command::Seed { count, force } => {
            let registry = RegistryDb::connect(&config.database_url).await?;
            seed(&registry, *count, *force).await?;
        }
        Command::Watch { frames } => {
            let frames_dir = frames
                .clone()
                .or_else(|| config.frames_dir.clone())
                .context("watch needs a frame directory (--frames or frames_dir in the config)")?;
            let registry = RegistryDb::connect(&config.database_url).await?;
            let engine = Arc::new(build_engine(&config, &cli.allow)?);
            let pipeline = Arc::new(build_pipeline(&config)?);
            watch(pipeline, engine, registry, frames_dir).await?;
        }
    }

    Ok(())
}

async fn seed(registry: &RegistryDb, count: usize, force: bool) -> anyhow::Result<()> {
    let existing = registry.count_vehicles().await?;
    if existing > 0 && !force {
        tracing::info!("Registry already holds {} vehicles; use --force to add more", existing);
        println!("Registry already holds {} vehicles.", existing);
        return Ok(());
    }

    let dataset = PlateGenerator::new().generate_dataset(count);
    let mut inserted = 0usize;
    let mut duplicates = 0usize;
    for plate in &dataset {
        match registry.add_vehicle(&plate.to_new_vehicle()).await {
            Ok(_) => inserted += 1,
            Err(RegistryError::DuplicatePlate(_)) => duplicates += 1,
            Err(e) => return Err(e.into()),
        }
    }
    tracing::info!(inserted, duplicates, "registry seeded");
    println!("Seeded {} vehicles ({} duplicates skipped).", inserted, duplicates);
    Ok(())
}

async fn watch(
    pipeline: Arc<RecognitionPipeline>,
    engine: Arc<AccessEngine>,
    registry: RegistryDb,
    frames_dir: PathBuf,
) -> anyhow::Result<()> {
    let source = ImageSequence::from_dir(&frames_dir)?;
    tracing::info!("Watching {} frames from {:?}", source.remaining(), frames_dir);

    let cancel = CancellationToken::new();
    let (plate_tx, mut plate_rx) = mpsc::unbounded_channel::<String>();

    let driver_cancel = cancel.clone();
    let driver = tokio::task::spawn_blocking(move || {
        let mut driver = StreamDriver::new(source, pipeline);
        let mut sink = move |_frame_no: u64, plate: Option<&str>| {
            if let Some(plate) = plate.filter(|p| !p.is_empty()) {
                // The receiver only goes away on shutdown.
                let _ = plate_tx.send(plates::normalize_plate(plate));
            }
        };
        driver.run(&mut sink, &driver_cancel)
    });

    let gate = {
        let engine = engine.clone();
        let registry = registry.clone();
        tokio::spawn(async move {
            while let Some(plate) = plate_rx.recv().await {
                match engine.check_access(&plate, &registry).await {
                    Ok(true) => tracing::info!(plate = %plate, "access granted"),
                    Ok(false) => tracing::info!(plate = %plate, "access denied"),
                    Err(e) => tracing::error!(plate = %plate, "access check failed: {}", e),
                }
            }
        })
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let stats = stream::supervise(driver, run_console(engine, registry), shutdown, &cancel).await?;
    gate.await.context("access worker failed")?;
    println!(
        "Processed {} frames: {} plates read, {} illegible.",
        stats.frames, stats.plates, stats.illegible
    );
    Ok(())
}

const CONSOLE_HELP: &str = "commands: allow <PLATE> | check <PLATE> | list | quit";

/// Forward stdin lines from a detached thread; the channel closes at EOF.
fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("failed to read console input: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

async fn run_console(engine: Arc<AccessEngine>, registry: RegistryDb) -> ConsoleExit {
    println!("{}", CONSOLE_HELP);
    let mut lines = stdin_lines();
    while let Some(line) = lines.recv().await {
        let line = line.trim();
        let (command, argument) = match line.split_once(char::is_whitespace) {
            Some((command, argument)) => (command, plates::normalize_plate(argument)),
            None => (line, String::new()),
        };
        match command {
            "" => {}
            "quit" | "exit" => return ConsoleExit::Quit,
            "list" => {
                for plate in engine.allowed_plates() {
                    println!("{}", plate);
                }
            }
            "allow" if !argument.is_empty() => {
                if engine.add_allowed_plate(&argument) {
                    println!("{} allowed", argument);
                } else {
                    println!("{} was already allowed", argument);
                }
            }
            "check" if !argument.is_empty() => {
                if let Err(e) = print_verdict(&engine, &registry, &argument).await {
                    println!("{:#}", e);
                }
            }
            _ => println!("{}", CONSOLE_HELP),
        }
    }
    ConsoleExit::Closed
}
