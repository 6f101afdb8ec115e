mod args;
mod host;
mod pattern;

use std::{fs, path::Path, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use gbloop_runtime::{
    AudioDevice, Cartridge, Config, CpalDevice, MemorySurface, NullAudioDevice, PixelFormat,
    Platform, Rotation, Runtime, RuntimeError, SystemClock, save,
};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::{
    args::Args,
    host::{ConsoleDialogs, KeyScript, QueuedKeys},
    pattern::PatternEngine,
};

const DEFAULT_FILTER: &str = "gbloop_runtime=info,gbloop_headless=info";
/// Size of the generated ROM when none is given.
const BLANK_ROM_SIZE: usize = 0x10000;

fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let Some(path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let name = path.file_name().context("log file path has no file name")?;
    let _ = fs::remove_file(path);
    let appender = tracing_appender::rolling::never(dir, name);
    let (writer, guard) = tracing_appender::non_blocking::NonBlockingBuilder::default()
        .lossy(false)
        .finish(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .init();
    Ok(Some(guard))
}

fn load_cartridge(args: &Args) -> Result<(Cartridge, std::path::PathBuf)> {
    let (rom, save_path) = match &args.rom {
        Some(path) => {
            let rom = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            (rom, save::save_path_for(path))
        }
        None => (
            (0..BLANK_ROM_SIZE).map(|i| (i >> 8) as u8).collect(),
            std::path::PathBuf::from("gbloop.sav"),
        ),
    };
    let ram = save::load_save_ram(&save_path, args.ram_size)?;
    Ok((Cartridge::new(rom, ram), save_path))
}

fn run(args: &Args) -> Result<ExitCode> {
    let config = Config::load_or_default(&args.config)?;
    let (cart, save_path) = load_cartridge(args)?;

    let audio: Arc<dyn AudioDevice> = if args.audio {
        Arc::new(CpalDevice)
    } else {
        Arc::new(NullAudioDevice)
    };
    let keys = Arc::new(QueuedKeys::new());
    let engine = PatternEngine::new(args.fault_at)
        .with_script(KeyScript::new(keys.clone(), args.presses.clone()));
    let platform = Platform {
        clock: Arc::new(SystemClock::new()),
        keys,
        audio,
        dialogs: Box::new(ConsoleDialogs),
    };
    let (width, height) = args.display;
    let surface = MemorySurface::new(width, height, PixelFormat::Xrgb8888, Rotation::Up);

    let mut runtime = Runtime::new(
        &config,
        platform,
        engine,
        cart,
        surface,
        &save_path,
    )?
    .with_frame_limit(args.frames);

    match runtime.run() {
        Ok(summary) => {
            info!(frames = summary.frames, save = %save_path.display(), "done");
            Ok(ExitCode::SUCCESS)
        }
        Err(RuntimeError::EmulationFault(report)) => {
            error!(kind = %report.kind, address = report.address, "session aborted");
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err.into()),
    }
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let _guard = init_tracing(args.log_file.as_deref())?;
    run(&args)
}
