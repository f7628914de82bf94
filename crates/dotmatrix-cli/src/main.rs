use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use dotmatrix_cli::config::{self, Config, ModeSetting};
use dotmatrix_cli::runtime::{Event, Runtime};
use dotmatrix_cli::saves::SaveFiles;
use dotmatrix_cli::RuntimeError;
use dotmatrix_core::hardware::{CPU_CLOCK_HZ, CYCLES_PER_FRAME};
use log::{error, info, warn};

const DEFAULT_FRAMES: u64 = 60;

#[derive(Parser, Debug)]
#[command(name = "dotmatrix", version, about = "Headless Game Boy / Game Boy Color emulator")]
struct Args {
    /// Path to ROM file
    rom: PathBuf,

    /// Force DMG mode
    #[arg(long, conflicts_with = "cgb")]
    dmg: bool,

    /// Force CGB mode
    #[arg(long, conflicts_with = "dmg")]
    cgb: bool,

    /// Number of frames to run
    #[arg(long, conflicts_with = "cycles")]
    frames: Option<u64>,

    /// Number of CPU cycles to run
    #[arg(long)]
    cycles: Option<u64>,

    /// Print a listing of the ROM and exit
    #[arg(long)]
    disassemble: bool,

    /// Write raw interleaved stereo f32 (little-endian) audio to this file
    #[arg(long)]
    audio_dump: Option<PathBuf>,

    /// Config file (defaults to the per-user config location)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for .sav/.rtc files
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Never write save files
    #[arg(long)]
    no_save: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn effective_config(args: &Args) -> Config {
    let path = args.config.clone().unwrap_or_else(config::default_config_path);
    let mut cfg = config::load_from_file(&path);
    if args.dmg {
        cfg.mode = ModeSetting::ForceDmg;
    } else if args.cgb {
        cfg.mode = ModeSetting::ForceCgb;
    }
    if let Some(dir) = &args.save_dir {
        cfg.save_dir = Some(dir.clone());
    }
    if args.no_save {
        cfg.autosave = false;
    }
    cfg
}

fn run(args: Args) -> Result<(), RuntimeError> {
    let cfg = effective_config(&args);
    let rom = std::fs::read(&args.rom).map_err(|e| RuntimeError::Io {
        path: args.rom.clone(),
        source: e,
    })?;

    let runtime = Runtime::spawn(cfg.emulator_config())?;
    runtime.load_rom(rom)?;
    let header = runtime.rom_info()?.ok_or(RuntimeError::NoRom)?;

    if args.disassemble {
        let stdout = std::io::stdout();
        let mut out = BufWriter::new(stdout.lock());
        for (offset, text) in runtime.disassemble()? {
            if writeln!(out, "{offset:06X}  {text}").is_err() {
                break;
            }
        }
        let _ = out.flush();
        runtime.shutdown();
        return Ok(());
    }

    let saves = header
        .battery
        .then(|| SaveFiles::for_rom(&args.rom, cfg.save_dir.as_deref()));
    if let Some(saves) = &saves {
        match saves.load(header.ram_size) {
            Ok(Some(payload)) => runtime.load_save(payload)?,
            Ok(None) => {}
            Err(e) => warn!("{e}; starting without save data"),
        }
    }

    let mut audio = match &args.audio_dump {
        Some(path) => Some(AudioDump::create(path, cfg.sample_rate)?),
        None => None,
    };

    let result = run_for(&args, &cfg, &runtime, saves.as_ref(), audio.as_mut());

    if let Some(audio) = audio {
        audio.finish()?;
    }

    let serial = runtime.take_serial()?;
    if !serial.is_empty() {
        println!("{}", String::from_utf8_lossy(&serial));
    }
    info!("{}", runtime.cpu_state()?);

    if let Some(saves) = &saves
        && !args.no_save
        && let Some(payload) = runtime.save()?
    {
        saves.store(&payload)?;
    }

    runtime.shutdown();
    result
}

/// Runs the requested frame or cycle budget, handling autosave and audio
/// between frames.
fn run_for(
    args: &Args,
    cfg: &Config,
    runtime: &Runtime,
    saves: Option<&SaveFiles>,
    mut audio: Option<&mut AudioDump>,
) -> Result<(), RuntimeError> {
    let (mut remaining, by_cycles) = match (args.cycles, args.frames) {
        (Some(cycles), _) => (cycles, true),
        (None, frames) => (frames.unwrap_or(DEFAULT_FRAMES), false),
    };

    while remaining > 0 {
        let ran = if by_cycles {
            let ran = runtime.run_cycles(remaining.min(CYCLES_PER_FRAME as u64))?;
            remaining = remaining.saturating_sub(ran);
            ran
        } else {
            remaining -= 1;
            runtime.step_frame()?
        };

        if let Some(audio) = audio.as_deref_mut() {
            audio.pump(runtime, ran)?;
        }

        for event in runtime.events().try_iter() {
            match event {
                Event::SaveDirty if cfg.autosave => {
                    if let (Some(saves), Some(payload)) = (saves, runtime.save()?) {
                        saves.store(&payload)?;
                    }
                }
                Event::Stopped { reason } => warn!("Emulation stopped: {reason}"),
                _ => {}
            }
        }
    }
    Ok(())
}

struct AudioDump {
    path: PathBuf,
    out: BufWriter<File>,
    sample_rate: u32,
    /// Output frames owed but not yet flushed, in fractions of a frame.
    owed: f64,
}

impl AudioDump {
    fn create(path: &Path, sample_rate: u32) -> Result<Self, RuntimeError> {
        let file = File::create(path).map_err(|e| RuntimeError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        info!("Dumping {sample_rate} Hz stereo f32 audio to {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
            sample_rate,
            owed: 0.0,
        })
    }

    fn pump(&mut self, runtime: &Runtime, cycles: u64) -> Result<(), RuntimeError> {
        self.owed += cycles as f64 * self.sample_rate as f64 / CPU_CLOCK_HZ as f64;
        let frames = self.owed.floor();
        self.owed -= frames;
        if frames < 1.0 {
            return Ok(());
        }
        for sample in runtime.flush_samples(self.sample_rate, frames as usize)? {
            self.out
                .write_all(&sample.to_le_bytes())
                .map_err(|e| RuntimeError::Io {
                    path: self.path.clone(),
                    source: e,
                })?;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<(), RuntimeError> {
        self.out.flush().map_err(|e| RuntimeError::Io {
            path: self.path.clone(),
            source: e,
        })
    }
}
