use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use acoustic_engine::{
    default_cache_root, CpuSolver, FrameCacheReader, GpuSolver, Reconstructor, SolverBackend,
    SolverCheckpoint, SolverConfig, SolverEvent,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dna::data::volume::Axis;
use dna::physics::core::{PYRITE_DENSITY, QUARTZ_DENSITY};
use dna::{GridDims, VoxelVolume};
use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "Acoustic P/S-wave velocity simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AxisArg {
    X,
    Y,
    Z,
}

impl From<AxisArg> for Axis {
    fn from(a: AxisArg) -> Self {
        match a {
            AxisArg::X => Axis::X,
            AxisArg::Y => Axis::Y,
            AxisArg::Z => Axis::Z,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendArg {
    Cpu,
    Gpu,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum VolumeKind {
    /// Homogeneous block of one material
    Uniform,
    /// Outer shell with a denser masked-out inclusion in the centre
    Shell,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a synthetic segmented volume
    Generate {
        #[arg(short, long, default_value = "./volume")]
        output: PathBuf,
        /// Edge length in voxels
        #[arg(short, long, default_value_t = 64)]
        size: usize,
        /// Voxel pitch in metres
        #[arg(short, long, default_value_t = 1e-4)]
        pitch: f64,
        #[arg(short, long, value_enum, default_value_t = VolumeKind::Uniform)]
        kind: VolumeKind,
        /// Base density (kg/m³)
        #[arg(long, default_value_t = QUARTZ_DENSITY)]
        density: f64,
        /// Relative density jitter (0 = none)
        #[arg(long, default_value_t = 0.0)]
        jitter: f64,
    },
    /// Run a simulation over a generated volume
    Run {
        /// Path to volume.json (or its directory)
        #[arg(short, long)]
        volume: PathBuf,
        /// Full solver configuration as JSON; flags below override nothing
        /// when this is given
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = AxisArg::Z)]
        axis: AxisArg,
        #[arg(long, default_value_t = 50.0)]
        young_mpa: f64,
        #[arg(long, default_value_t = 0.25)]
        poisson: f64,
        /// Source energy (J)
        #[arg(long, default_value_t = 1.0)]
        energy: f64,
        /// Source centre frequency (kHz)
        #[arg(long, default_value_t = 100.0)]
        frequency_khz: f64,
        #[arg(long, default_value_t = 100)]
        amplitude: i32,
        #[arg(long, default_value_t = 500)]
        max_steps: u32,
        #[arg(long)]
        no_auto_stop: bool,
        /// Override transmitter voxel, e.g. 32,32,0
        #[arg(long)]
        tx: Option<String>,
        /// Override receiver voxel, e.g. 32,32,63
        #[arg(long)]
        rx: Option<String>,
        #[arg(long, value_enum, default_value_t = BackendArg::Cpu)]
        backend: BackendArg,
        /// Capture frames into this cache directory
        /// (default root: local app data / AcousticSimulator/SimulationCache)
        #[arg(long)]
        cache: Option<PathBuf>,
        /// Name for the cache subdirectory when --cache is not given
        #[arg(long)]
        cache_name: Option<String>,
        /// Save the final checkpoint here
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Reconstruct a velocity tomogram from a checkpoint and its volume
    Tomogram {
        /// Path to volume.json (or its directory)
        #[arg(short, long)]
        volume: PathBuf,
        /// Checkpoint written by `run --save`
        #[arg(short, long)]
        checkpoint: PathBuf,
    },
    /// Summarise a frame cache
    Replay {
        #[arg(short, long)]
        cache: PathBuf,
        /// Print at most this many frame rows
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Inspect a saved checkpoint
    Info {
        #[arg(short, long)]
        file: PathBuf,
    },
}

/// Sidecar descriptor stored next to the raw voxel payloads.
#[derive(Serialize, Deserialize)]
struct VolumeDescriptor {
    width: usize,
    height: usize,
    depth: usize,
    pitch_m: f64,
    material_id: u8,
    labels_file: String,
    density_file: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Generate {
            output,
            size,
            pitch,
            kind,
            density,
            jitter,
        } => generate(output, size, pitch, kind, density, jitter),
        Commands::Run {
            volume,
            config,
            axis,
            young_mpa,
            poisson,
            energy,
            frequency_khz,
            amplitude,
            max_steps,
            no_auto_stop,
            tx,
            rx,
            backend,
            cache,
            cache_name,
            save,
        } => {
            let solver_config = match config {
                Some(path) => serde_json::from_str(
                    &fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?,
                )
                .with_context(|| format!("parsing solver config {}", path.display()))?,
                None => SolverConfig {
                    axis: axis.into(),
                    young_mpa,
                    poisson,
                    energy_j: energy,
                    frequency_khz,
                    amplitude,
                    max_steps,
                    use_auto_stop: !no_auto_stop,
                    ..SolverConfig::default()
                },
            };
            let mut vol = load_volume(&volume, solver_config.axis)?;
            if let Some(t) = tx {
                vol.tx = parse_voxel(&t)?;
            }
            if let Some(r) = rx {
                vol.rx = parse_voxel(&r)?;
            }
            run(vol, solver_config, backend, cache, cache_name, save)
        }
        Commands::Tomogram { volume, checkpoint } => tomogram_cmd(volume, checkpoint),
        Commands::Replay { cache, limit } => replay(cache, limit),
        Commands::Info { file } => info_cmd(file),
    }
}

fn parse_voxel(s: &str) -> Result<[usize; 3]> {
    let parts: Vec<usize> = s
        .split(',')
        .map(|p| p.trim().parse())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("parsing voxel triple '{}'", s))?;
    if parts.len() != 3 {
        bail!("expected x,y,z but got '{}'", s);
    }
    Ok([parts[0], parts[1], parts[2]])
}

fn generate(
    output: PathBuf,
    size: usize,
    pitch: f64,
    kind: VolumeKind,
    density: f64,
    jitter: f64,
) -> Result<()> {
    fs::create_dir_all(&output)?;
    let dims = GridDims::new(size, size, size);
    let n = dims.len();
    let mut labels = vec![1u8; n];
    let mut dens = vec![density as f32; n];

    if let VolumeKind::Shell = kind {
        // Centre block: a quarter of the edge on each side, different
        // material id so it is masked out of propagation
        let lo = size / 4;
        let hi = size - size / 4;
        for z in lo..hi {
            for y in lo..hi {
                for x in lo..hi {
                    let i = dims.idx(x, y, z);
                    labels[i] = 2;
                    dens[i] = PYRITE_DENSITY as f32;
                }
            }
        }
    }

    if jitter > 0.0 {
        let mut rng = rand::thread_rng();
        for d in dens.iter_mut() {
            let f = 1.0 + rng.gen_range(-jitter..jitter);
            *d *= f as f32;
        }
    }

    fs::write(output.join("labels.raw"), &labels)?;

    let mut density_bytes = Vec::with_capacity(n * 4);
    for d in &dens {
        density_bytes.extend_from_slice(&d.to_le_bytes());
    }
    fs::write(output.join("density.raw"), &density_bytes)?;

    let descriptor = VolumeDescriptor {
        width: size,
        height: size,
        depth: size,
        pitch_m: pitch,
        material_id: 1,
        labels_file: "labels.raw".into(),
        density_file: "density.raw".into(),
    };
    fs::write(
        output.join("volume.json"),
        serde_json::to_string_pretty(&descriptor)?,
    )?;

    println!(
        "Generated {:?} volume: {}³ voxels, pitch {} m -> {}",
        kind,
        size,
        pitch,
        output.display()
    );
    Ok(())
}

fn load_volume(path: &PathBuf, axis: Axis) -> Result<VoxelVolume> {
    let descriptor_path = if path.is_dir() {
        path.join("volume.json")
    } else {
        path.clone()
    };
    let dir = descriptor_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let descriptor: VolumeDescriptor = serde_json::from_str(
        &fs::read_to_string(&descriptor_path)
            .with_context(|| format!("reading {}", descriptor_path.display()))?,
    )?;
    let dims = GridDims::new(descriptor.width, descriptor.height, descriptor.depth);

    let labels = fs::read(dir.join(&descriptor.labels_file))?;
    if labels.len() != dims.len() {
        bail!(
            "labels.raw holds {} voxels, descriptor says {}",
            labels.len(),
            dims.len()
        );
    }

    let density_bytes = fs::read(dir.join(&descriptor.density_file))?;
    if density_bytes.len() != dims.len() * 4 {
        bail!(
            "density.raw holds {} bytes, expected {}",
            density_bytes.len(),
            dims.len() * 4
        );
    }
    let density: Vec<f32> = density_bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    Ok(VoxelVolume::with_axis(
        dims,
        descriptor.pitch_m,
        labels,
        density,
        descriptor.material_id,
        axis,
    ))
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );
    pb
}

/// Drive the progress bar until the solver completes (or its thread ends
/// without a Completed event, e.g. on an error).
fn pump_events(
    events: &crossbeam_channel::Receiver<SolverEvent>,
    pb: &ProgressBar,
    solver_done: impl Fn() -> bool,
) {
    use crossbeam_channel::RecvTimeoutError;
    loop {
        match events.recv_timeout(Duration::from_millis(200)) {
            Ok(SolverEvent::Progress(p)) => {
                pb.set_position(p.percent as u64);
                pb.set_message(p.message.clone());
            }
            Ok(SolverEvent::Completed(_)) => break,
            Err(RecvTimeoutError::Timeout) => {
                if solver_done() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn run(
    volume: VoxelVolume,
    config: SolverConfig,
    backend: BackendArg,
    cache: Option<PathBuf>,
    cache_name: Option<String>,
    save: Option<PathBuf>,
) -> Result<()> {
    match backend {
        BackendArg::Cpu => {
            let mut solver = CpuSolver::new(volume, config)?;
            if cache.is_some() || cache_name.is_some() {
                let dir = cache.unwrap_or_else(|| {
                    default_cache_root()
                        .join(cache_name.unwrap_or_else(|| "latest".into()))
                });
                info!(dir = %dir.display(), "frame capture enabled");
                solver.attach_frame_cache(dir)?;
            }

            let events = solver.subscribe(1024);
            let token = solver.cancel_token();
            ctrlc::set_handler(move || token.cancel())
                .context("installing Ctrl-C handler")?;

            let pb = progress_bar();
            let results = std::thread::scope(|s| {
                let handle = s.spawn(move || {
                    let r = solver.run();
                    (solver, r)
                });
                pump_events(&events, &pb, || handle.is_finished());
                let (solver, result) = handle.join().expect("solver thread panicked");
                result.map(|r| (solver, r))
            })?;
            let (solver, results) = results;
            pb.finish_with_message("done");

            print_results(&results);

            if let Some(path) = save {
                let checkpoint = SolverCheckpoint::from_run(
                    solver.volume().dims,
                    solver.volume().tx,
                    solver.volume().rx,
                    &results,
                    solver.field(),
                );
                checkpoint.save(&path)?;
                println!("Checkpoint saved to {}", path.display());
            }
        }
        BackendArg::Gpu => {
            if save.is_some() || cache.is_some() || cache_name.is_some() {
                bail!("--save and --cache need the CPU backend");
            }
            let mut solver = GpuSolver::new(volume, config)?;
            let events = solver.subscribe(1024);
            let token = solver.cancel_token();
            ctrlc::set_handler(move || token.cancel())
                .context("installing Ctrl-C handler")?;

            let pb = progress_bar();
            let results = std::thread::scope(|s| {
                let handle = s.spawn(move || solver.run());
                pump_events(&events, &pb, || handle.is_finished());
                handle.join().expect("solver thread panicked")
            })?;
            pb.finish_with_message("done");
            print_results(&results);
        }
    }
    Ok(())
}

fn print_results(results: &acoustic_engine::SimulationResults) {
    println!();
    println!("  Vp            {:>12.2} m/s", results.vp);
    println!("  Vs            {:>12.2} m/s", results.vs);
    println!("  Vp/Vs         {:>12.4}", results.vp_vs);
    if results.step_p > 0 {
        println!("  P arrival     {:>12} steps", results.step_p);
    } else {
        println!("  P arrival     {:>12}", "not reached");
    }
    println!("  S estimate    {:>12} steps", results.step_s);
    println!("  Total steps   {:>12}", results.total_steps);
    if results.dropped_frames > 0 {
        println!("  Dropped frames{:>12}", results.dropped_frames);
    }
    if results.cancelled {
        println!("  (cancelled before completion)");
    }
}

fn tomogram_cmd(volume: PathBuf, checkpoint: PathBuf) -> Result<()> {
    // The axis only sets default transducers; the checkpoint overrides them
    let mut vol = load_volume(&volume, Axis::Z)?;
    let cp = SolverCheckpoint::load(&checkpoint, Some(vol.dims))?;
    vol.tx = cp.tx.map(|c| c.max(0) as usize);
    vol.rx = cp.rx.map(|c| c.max(0) as usize);

    let n = vol.dims.len();
    let vx = cp.vx.to_dense(n);
    let vy = cp.vy.to_dense(n);
    let rec = Reconstructor::new(&vol, &vx, &vy, cp.vp, None);
    let tomo = rec.reconstruct();

    println!(
        "Tomogram around Vp = {:.2} m/s ({})",
        cp.vp,
        if rec.is_degenerate() {
            "density fallback"
        } else {
            "amplitude modulation"
        }
    );
    println!(
        "  observed   [{:.2}, {:.2}] m/s",
        tomo.observed_min, tomo.observed_max
    );
    println!(
        "  display    [{:.2}, {:.2}] m/s",
        tomo.display_window.0, tomo.display_window.1
    );

    // Compact view: fold the 100 bins into 20 rows
    let (lo, hi) = tomo.histogram_range;
    let rows: Vec<u32> = tomo.histogram.chunks(5).map(|c| c.iter().sum()).collect();
    let max_count = rows.iter().copied().max().unwrap_or(0).max(1) as usize;
    for (k, count) in rows.iter().enumerate() {
        let from = lo + (hi - lo) * (k as f64 * 5.0) / 100.0;
        let bar = "#".repeat((*count as usize * 40 / max_count).min(40));
        println!("  {:>9.1} | {:<40} {}", from, bar, count);
    }
    Ok(())
}

fn replay(cache: PathBuf, limit: usize) -> Result<()> {
    let mut reader = FrameCacheReader::open(&cache)?;
    let dims = reader.metadata().dims;
    println!(
        "Cache {} - {} frames over a {}x{}x{} grid",
        cache.display(),
        reader.len(),
        dims.width,
        dims.height,
        dims.depth
    );
    println!("{:>6} {:>8} {:>14} {:>14} {:>7} {:>7}", "frame", "step", "p_value", "s_value", "p%", "s%");

    let total = reader.len();
    for k in 0..total.min(limit) {
        let rec = reader.record(k).unwrap().clone();
        println!(
            "{:>6} {:>8} {:>14.6e} {:>14.6e} {:>6.1} {:>6.1}",
            k,
            rec.step,
            rec.p_value,
            rec.s_value,
            rec.p_progress * 100.0,
            rec.s_progress * 100.0
        );
    }
    if total > limit {
        println!("... {} more", total - limit);
    }

    // Decode the last frame as a health check
    if total > 0 {
        match reader.frame(total - 1)? {
            Some(frame) => {
                let peak = frame
                    .vx
                    .iter()
                    .chain(frame.vy.iter())
                    .fold(0.0f32, |m, v| m.max(v.abs()));
                println!("Last frame decodes OK, peak |v| = {:.3e}", peak);
            }
            None => println!("Last frame file is missing or damaged (skipped)"),
        }
    }
    Ok(())
}

fn info_cmd(file: PathBuf) -> Result<()> {
    let checkpoint = SolverCheckpoint::load(&file, None)?;
    println!("Checkpoint {}", file.display());
    println!(
        "  Grid        {}x{}x{}",
        checkpoint.dims.width, checkpoint.dims.height, checkpoint.dims.depth
    );
    println!("  Vp          {:.2} m/s", checkpoint.vp);
    println!("  Vs          {:.2} m/s", checkpoint.vs);
    println!("  Vp/Vs       {:.4}", checkpoint.vp_vs);
    println!("  step_p      {}", checkpoint.step_p);
    println!("  step_s      {}", checkpoint.step_s);
    println!("  TX          {:?}", checkpoint.tx);
    println!("  RX          {:?}", checkpoint.rx);
    println!(
        "  Support     vx {} / vy {} / vz {} voxels",
        checkpoint.vx.entries.len(),
        checkpoint.vy.entries.len(),
        checkpoint.vz.entries.len()
    );
    Ok(())
}
