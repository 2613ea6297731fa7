//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: solver.rs | SIMULATION/CORE/ACOUSTIC_ENGINE/src/solver.rs
//! PURPOSE: CPU elastic solver - step loop, source injection, receiver probe
//! MODIFIED: 2026-07-18
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! Per-step pipeline:
//!   1. update_stresses()    - six stress components (rayon over z-planes)
//!   2. update_velocities()  - three velocity components (rayon over z-planes)
//!   3. inject source        - add w[step] to sxx at the injection site
//!   4. probe receiver       - record trace, detect first touch (> 1e-6)
//!   5. progress event       - every 10 steps, f32 snapshots of vx/vy
//!   6. frame capture        - every snapshot_interval steps (optional)
//!   7. auto-stop            - receiver-energy peak/decay controller
//!
//! The pass boundaries are barriers; the cancel flag is observed between
//! steps, so a cancelled run still finishes its current step, emits a
//! terminal event, and flushes the cache.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use dna::data::volume::Axis;
use dna::{
    update_stresses, update_velocities, ElasticField3D, ElasticModuli, RickerWavelet,
    StencilParams, VoxelVolume,
};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::autostop::{receiver_energy, AutoStopController};
use crate::cache::{FrameCacheWriter, WaveFrame};
use crate::error::{SimError, SimResult};
use crate::progress::{percent_complete, ProgressBus, ProgressEvent, SolverEvent};
use crate::stability::StabilityPlan;
use crate::tomography::{Reconstructor, Tomogram};

/// Velocity magnitude at the receiver that counts as an arrival.
pub const TOUCH_THRESHOLD: f64 = 1e-6;

/// Steps between progress events.
const PROGRESS_INTERVAL: u32 = 10;

/// Wave type tag carried through to results and exports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaveMode {
    P,
    S,
    Both,
}

/// Full solver parameter set.
///
/// `confining_pressure_mpa`, `tensile_strength_mpa`, `failure_angle_deg` and
/// `cohesion_mpa` are reserved for inelastic extensions: they are accepted
/// and carried, but the elastic kernel reads only Young's modulus, Poisson's
/// ratio and the density grid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolverConfig {
    pub axis: Axis,
    pub wave_mode: WaveMode,
    /// Young's modulus (MPa)
    pub young_mpa: f64,
    pub poisson: f64,
    pub confining_pressure_mpa: f64,
    pub tensile_strength_mpa: f64,
    pub failure_angle_deg: f64,
    pub cohesion_mpa: f64,
    /// Source energy (J)
    pub energy_j: f64,
    /// Source centre frequency (kHz)
    pub frequency_khz: f64,
    /// Integer drive amplitude
    pub amplitude: i32,
    pub max_steps: u32,
    /// Steps allowed after first touch; defaults to `max_steps`
    pub max_post_steps: Option<u32>,
    pub use_auto_stop: bool,
    /// Frame-capture cadence in steps
    pub snapshot_interval: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            axis: Axis::Z,
            wave_mode: WaveMode::P,
            young_mpa: 50.0,
            poisson: 0.25,
            confining_pressure_mpa: 0.0,
            tensile_strength_mpa: 0.0,
            failure_angle_deg: 30.0,
            cohesion_mpa: 0.0,
            energy_j: 1.0,
            frequency_khz: 100.0,
            amplitude: 100,
            max_steps: 500,
            max_post_steps: None,
            use_auto_stop: true,
            snapshot_interval: 10,
        }
    }
}

/// Final outcome of a run.
///
/// `step_s` is derived as `round(step_p · Vp/Vs)` rather than measured from
/// a shear arrival, so it is an estimate. `step_p == 0` means the receiver
/// was never touched and `vp` is the analytic fallback.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationResults {
    pub vp: f64,
    pub vs: f64,
    pub vp_vs: f64,
    /// First-touch step (0 = never touched)
    pub step_p: u32,
    /// Estimated shear-arrival step
    pub step_s: u32,
    pub total_steps: u32,
    /// Frames the cache had to drop under backpressure
    pub dropped_frames: u32,
    pub cancelled: bool,
}

/// Per-step receiver samples; grows by one entry per executed step.
#[derive(Clone, Debug, Default)]
pub struct ReceiverTrace {
    samples: Vec<[f64; 3]>,
}

impl ReceiverTrace {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub(crate) fn push(&mut self, vx: f64, vy: f64, vz: f64) {
        self.samples.push([vx, vy, vz]);
    }

    pub fn samples(&self) -> &[[f64; 3]] {
        &self.samples
    }

    /// vx at the receiver per step (the P pick channel)
    pub fn p_series(&self) -> Vec<f32> {
        self.samples.iter().map(|s| s[0] as f32).collect()
    }

    /// √(vy² + vz²) at the receiver per step (the S pick channel)
    pub fn s_series(&self) -> Vec<f32> {
        self.samples
            .iter()
            .map(|s| (s[1] * s[1] + s[2] * s[2]).sqrt() as f32)
            .collect()
    }
}

/// Cooperative cancellation handle. Cloneable; any clone cancels the run.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Capability set every solver backend exposes.
pub trait SolverBackend {
    /// Register an event subscriber before calling `run`.
    fn subscribe(&mut self, capacity: usize) -> Receiver<SolverEvent>;

    /// Handle for cooperative cancellation.
    fn cancel_token(&self) -> CancelToken;

    /// Latest published (vx, vy) f32 snapshots.
    fn snapshot(&self) -> (Arc<Vec<f32>>, Arc<Vec<f32>>);

    /// Execute the simulation to completion (or cancellation) and return
    /// the results. Blocking; spawn on a worker thread to stay responsive.
    fn run(&mut self) -> SimResult<SimulationResults>;
}

/// Reference CPU implementation of the elastic solver.
pub struct CpuSolver {
    volume: VoxelVolume,
    config: SolverConfig,
    plan: StabilityPlan,
    field: ElasticField3D,
    wavelet: RickerWavelet,
    bus: ProgressBus,
    cancel: CancelToken,
    cache: Option<FrameCacheWriter>,
    trace: ReceiverTrace,
    last_snapshot: (Arc<Vec<f32>>, Arc<Vec<f32>>),
    /// Nominal P-velocity from mean density, for per-frame tomography
    vp_nominal: f64,
    results: Option<SimulationResults>,
}

impl CpuSolver {
    pub fn new(volume: VoxelVolume, config: SolverConfig) -> SimResult<Self> {
        validate(&volume, &config)?;

        let plan = StabilityPlan::new(
            config.young_mpa,
            config.poisson,
            volume.pitch,
            volume.min_active_density(),
            config.frequency_khz * 1e3,
            volume.tx_rx_distance_m(),
        )?;

        // CPU path scales the Ricker peak by amplitude·√energy
        let peak = config.amplitude as f64 * config.energy_j.sqrt();
        let wavelet = RickerWavelet::new(peak, config.frequency_khz * 1e3, plan.dt);

        let n = volume.dims.len();
        let vp_nominal = plan.moduli.vp(volume.mean_active_density());

        Ok(Self {
            field: ElasticField3D::new(volume.dims),
            wavelet,
            bus: ProgressBus::new(),
            cancel: CancelToken::default(),
            cache: None,
            trace: ReceiverTrace::default(),
            last_snapshot: (Arc::new(vec![0.0; n]), Arc::new(vec![0.0; n])),
            vp_nominal,
            results: None,
            volume,
            config,
            plan,
        })
    }

    /// Attach a frame cache rooted at `dir` (created if missing). Must be
    /// called before `run`.
    pub fn attach_frame_cache(&mut self, dir: impl Into<PathBuf>) -> SimResult<()> {
        self.cache = Some(FrameCacheWriter::create(dir, self.volume.dims)?);
        Ok(())
    }

    pub fn volume(&self) -> &VoxelVolume {
        &self.volume
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn plan(&self) -> &StabilityPlan {
        &self.plan
    }

    pub fn wavelet(&self) -> &RickerWavelet {
        &self.wavelet
    }

    pub fn receiver_trace(&self) -> &ReceiverTrace {
        &self.trace
    }

    /// Final wave field after `run`.
    pub fn field(&self) -> &ElasticField3D {
        &self.field
    }

    pub fn results(&self) -> Option<&SimulationResults> {
        self.results.as_ref()
    }

    /// Reconstruct the per-voxel velocity field from the final wave field,
    /// using the measured (or fallback) Vp. Available after `run`.
    pub fn tomogram(&self, ray_path: Option<Vec<DVec3>>) -> Option<Tomogram> {
        let results = self.results.as_ref()?;
        let rec = Reconstructor::new(
            &self.volume,
            &self.field.vx,
            &self.field.vy,
            results.vp,
            ray_path,
        );
        Some(rec.reconstruct())
    }

    fn emit_progress(&mut self, step: u32, touch: Option<u32>, max_post: u32, peaked: bool) {
        let percent = percent_complete(
            step,
            self.config.max_steps,
            self.plan.expected_pre_touch_steps,
            touch.map(|t| step - t),
            max_post,
            peaked,
        );
        let message = if peaked {
            "Receiver energy decaying"
        } else if touch.is_some() {
            "Receiver reached, tracking decay"
        } else {
            "Propagating wavefront"
        };
        let vx = Arc::new(ElasticField3D::snapshot_f32(&self.field.vx));
        let vy = Arc::new(ElasticField3D::snapshot_f32(&self.field.vy));
        self.last_snapshot = (vx.clone(), vy.clone());
        self.bus.publish(&SolverEvent::Progress(ProgressEvent {
            percent,
            step,
            message: message.into(),
            vx,
            vy,
        }));
    }

    /// Display plane through the TX-RX ray: fixes x for axis Y, y otherwise.
    fn plane_voxels(&self) -> (u32, u32, Vec<usize>) {
        let dims = self.volume.dims;
        let tx = self.volume.tx;
        match self.config.axis {
            Axis::Y => {
                let x = tx[0].min(dims.width - 1);
                let mut idx = Vec::with_capacity(dims.height * dims.depth);
                for z in 0..dims.depth {
                    for y in 0..dims.height {
                        idx.push(dims.idx(x, y, z));
                    }
                }
                (dims.height as u32, dims.depth as u32, idx)
            }
            Axis::X | Axis::Z => {
                let y = tx[1].min(dims.height - 1);
                let mut idx = Vec::with_capacity(dims.width * dims.depth);
                for z in 0..dims.depth {
                    for x in 0..dims.width {
                        idx.push(dims.idx(x, y, z));
                    }
                }
                (dims.width as u32, dims.depth as u32, idx)
            }
        }
    }

    fn build_frame(&self, step: u32) -> WaveFrame {
        let field = &self.field;
        let dims = self.volume.dims;
        let (pw, ph, plane_idx) = self.plane_voxels();

        let rec = Reconstructor::new(&self.volume, &field.vx, &field.vy, self.vp_nominal, None);
        let tomo_slice: Vec<f32> = plane_idx
            .iter()
            .map(|&i| {
                let (x, y, z) = dims.coords(i);
                rec.value_at(x, y, z)
            })
            .collect();
        let cross_section: Vec<f32> = plane_idx
            .iter()
            .map(|&i| {
                let v2 = field.vx[i] * field.vx[i]
                    + field.vy[i] * field.vy[i]
                    + field.vz[i] * field.vz[i];
                v2.sqrt() as f32
            })
            .collect();

        let probe = self.volume.probe_site();
        let (pvx, pvy, pvz) = field.velocity_at(probe);

        let dist_m = self.volume.tx_rx_distance_m().max(1e-12);
        let t = step as f64 * self.plan.dt;
        let ratio = ElasticModuli::vp_vs_ratio(self.config.poisson);
        let p_progress = ((t * self.plan.vp_max) / dist_m).min(1.0) as f32;
        let s_progress = ((t * self.plan.vp_max / ratio) / dist_m).min(1.0) as f32;

        WaveFrame {
            step,
            dims,
            plane_dims: (pw, ph),
            vx: ElasticField3D::snapshot_f32(&field.vx),
            vy: ElasticField3D::snapshot_f32(&field.vy),
            vz: ElasticField3D::snapshot_f32(&field.vz),
            tomo_slice,
            cross_section,
            p_value: pvx as f32,
            s_value: (pvy * pvy + pvz * pvz).sqrt() as f32,
            p_progress,
            s_progress,
            p_series: self.trace.p_series(),
            s_series: self.trace.s_series(),
        }
    }
}

pub(crate) fn validate(volume: &VoxelVolume, config: &SolverConfig) -> SimResult<()> {
    let dims = volume.dims;
    if dims.width < 3 || dims.height < 3 || dims.depth < 3 {
        return Err(SimError::InvalidParameters(format!(
            "grid {}x{}x{} has no interior",
            dims.width, dims.height, dims.depth
        )));
    }
    if volume.labels.len() != dims.len() || volume.density.len() != dims.len() {
        return Err(SimError::InvalidParameters(format!(
            "label/density arrays ({}, {}) do not match grid of {} voxels",
            volume.labels.len(),
            volume.density.len(),
            dims.len()
        )));
    }
    for (name, p) in [("TX", volume.tx), ("RX", volume.rx)] {
        if !dims.contains(p[0], p[1], p[2]) {
            return Err(SimError::InvalidParameters(format!(
                "{} at {:?} is outside the {}x{}x{} grid",
                name, p, dims.width, dims.height, dims.depth
            )));
        }
    }
    if volume.active_count() == 0 {
        return Err(SimError::InvalidParameters(format!(
            "no voxel carries the selected material id {}",
            volume.material_id
        )));
    }
    for i in 0..dims.len() {
        if volume.is_active_idx(i) && volume.density[i] <= 0.0 {
            let (x, y, z) = dims.coords(i);
            return Err(SimError::InvalidParameters(format!(
                "active voxel ({},{},{}) has non-positive density {}",
                x, y, z, volume.density[i]
            )));
        }
    }
    if config.max_steps == 0 {
        return Err(SimError::InvalidParameters("max_steps must be positive".into()));
    }
    if config.energy_j < 0.0 {
        return Err(SimError::InvalidParameters(format!(
            "source energy must be non-negative, got {} J",
            config.energy_j
        )));
    }
    if config.snapshot_interval == 0 {
        return Err(SimError::InvalidParameters(
            "snapshot_interval must be positive".into(),
        ));
    }
    Ok(())
}

impl SolverBackend for CpuSolver {
    fn subscribe(&mut self, capacity: usize) -> Receiver<SolverEvent> {
        self.bus.subscribe(capacity)
    }

    fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn snapshot(&self) -> (Arc<Vec<f32>>, Arc<Vec<f32>>) {
        self.last_snapshot.clone()
    }

    fn run(&mut self) -> SimResult<SimulationResults> {
        let dims = self.volume.dims;
        self.field.clear();
        self.trace.clear();

        let inj = self.volume.injection_site();
        let inj_idx = dims.idx(inj[0], inj[1], inj[2]);
        // A masked-out transmitter injects nothing: inactive voxels must
        // hold exactly zero in all nine components for the whole run.
        let inj_active = self.volume.is_active_idx(inj_idx);
        if !inj_active {
            warn!(site = ?inj, "transmitter site is not in the selected material, source disabled");
        }
        let probe = self.volume.probe_site();
        let probe_idx = dims.idx(probe[0], probe[1], probe[2]);
        let probe_rho = self.volume.density[probe_idx].max(1.0) as f64;

        let params = StencilParams::new(self.plan.moduli, self.plan.dt, self.volume.pitch);
        let mu = self.plan.moduli.mu;
        let max_post = self.config.max_post_steps.unwrap_or(self.config.max_steps);
        let mut autostop = AutoStopController::new(self.config.max_steps);

        info!(
            dims = ?(dims.width, dims.height, dims.depth),
            dt = self.plan.dt,
            expected_pre_touch = self.plan.expected_pre_touch_steps,
            wavelet_len = self.wavelet.len(),
            "starting elastic run"
        );

        let mut touch: Option<u32> = None;
        let mut cancelled = false;
        let mut step: u32 = 0;

        loop {
            // Cancellation is observed between steps only
            if self.cancel.is_cancelled() {
                cancelled = true;
                warn!(step, "run cancelled");
                break;
            }

            // 1-2. Field passes (barrier-separated inside)
            update_stresses(&mut self.field, &self.volume.labels, self.volume.material_id, &params);
            update_velocities(
                &mut self.field,
                &self.volume.labels,
                &self.volume.density,
                self.volume.material_id,
                &params,
            );

            // 3. Source injection while the wavelet lasts
            if inj_active && (step as usize) < self.wavelet.len() {
                self.field.sxx[inj_idx] += self.wavelet.value_at(step as usize);
            }

            // 4. Receiver probe
            let (pvx, pvy, pvz) = self.field.velocity_at(probe);
            self.trace.push(pvx, pvy, pvz);
            if touch.is_none()
                && (pvx.abs() > TOUCH_THRESHOLD
                    || pvy.abs() > TOUCH_THRESHOLD
                    || pvz.abs() > TOUCH_THRESHOLD)
            {
                touch = Some(step);
                info!(step, "receiver touched");
            }

            // 5. Progress events
            if step % PROGRESS_INTERVAL == 0 {
                self.emit_progress(step, touch, max_post, autostop.peaked());
            }

            // 6. Frame capture; a full queue drops the frame, never the run
            if self.cache.is_some() && step % self.config.snapshot_interval == 0 {
                let frame = self.build_frame(step);
                if let Some(cache) = &self.cache {
                    if let Err(e) = cache.offer(frame) {
                        debug!(step, error = %e, "frame not persisted");
                    }
                }
            }

            // 7. Auto-stop on receiver energy
            if self.config.use_auto_stop {
                let energy = receiver_energy(&self.field, probe, probe_rho, mu);
                if autostop.observe(step, energy) {
                    info!(step, "auto-stop: receiver energy decayed");
                    step += 1;
                    break;
                }
            }

            #[cfg(debug_assertions)]
            if step % 100 == 0 {
                debug_assert!(
                    self.field.is_finite_sampled(101),
                    "field blew up by step {}",
                    step
                );
            }

            step += 1;
            match touch {
                None if step >= self.config.max_steps => break,
                Some(t) if step - 1 - t >= max_post => break,
                _ => {}
            }
        }

        let total_steps = step;
        let dist_m = self.volume.tx_rx_distance_m();
        let ratio = ElasticModuli::vp_vs_ratio(self.config.poisson);

        // Fallback closure: an untouched receiver reports the analytic Vp
        // of the mean active medium and an analytic travel-time estimate.
        let (vp, step_p, step_s) = match touch {
            Some(t) if t > 0 => {
                let vp = dist_m / (t as f64 * self.plan.dt);
                (vp, t, (t as f64 * ratio).round() as u32)
            }
            _ => {
                let vp = self.vp_nominal;
                let analytic_touch = dist_m / (vp * self.plan.dt);
                debug!(analytic_touch, "receiver never touched, using fallback Vp");
                (vp, 0, (analytic_touch * ratio).round() as u32)
            }
        };

        let dropped_frames = self.cache.as_ref().map_or(0, |c| c.dropped_frames());
        let results = SimulationResults {
            vp,
            vs: vp / ratio,
            vp_vs: ratio,
            step_p,
            step_s,
            total_steps,
            dropped_frames,
            cancelled,
        };

        // Terminal event, then seal the cache, then completion
        self.emit_final(total_steps, &results);
        if let Some(cache) = self.cache.take() {
            let (dir, written) = cache.close()?;
            info!(written, dir = %dir.display(), "frame cache flushed");
        }
        self.bus.publish(&SolverEvent::Completed(results.clone()));

        info!(
            vp = results.vp,
            vs = results.vs,
            step_p = results.step_p,
            total_steps = results.total_steps,
            cancelled,
            "run finished"
        );
        self.results = Some(results.clone());
        Ok(results)
    }
}

impl CpuSolver {
    fn emit_final(&mut self, total_steps: u32, results: &SimulationResults) {
        let vx = Arc::new(ElasticField3D::snapshot_f32(&self.field.vx));
        let vy = Arc::new(ElasticField3D::snapshot_f32(&self.field.vy));
        self.last_snapshot = (vx.clone(), vy.clone());
        let message = if results.cancelled {
            "Cancelled"
        } else {
            "Finalising results"
        };
        self.bus.publish(&SolverEvent::Progress(ProgressEvent {
            percent: 99,
            step: total_steps,
            message: message.into(),
            vx,
            vy,
        }));
    }
}
