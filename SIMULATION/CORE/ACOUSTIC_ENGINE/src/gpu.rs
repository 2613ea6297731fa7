//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: gpu.rs | SIMULATION/CORE/ACOUSTIC_ENGINE/src/gpu.rs
//! PURPOSE: wgpu compute backend for the elastic stencil
//! MODIFIED: 2026-07-18
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! Mirrors the CPU per-step order (stress pass, velocity pass, injection)
//! with f32 fields in one packed storage buffer. The receiver is probed by
//! a 36-byte readback each step; full vx/vy snapshots are read back only on
//! progress events.
//!
//! Deviations carried from the source system, by design:
//! - fields are f32 (no widely available f64 compute)
//! - the Ricker peak is scaled by `amplitude` alone, not `amplitude·√energy`

use std::sync::Arc;

use crossbeam_channel::Receiver;
use dna::{ElasticModuli, RickerWavelet, VoxelVolume};
use tracing::{info, warn};
use wgpu::util::DeviceExt;

use crate::autostop::AutoStopController;
use crate::error::{SimError, SimResult};
use crate::progress::{percent_complete, ProgressBus, ProgressEvent, SolverEvent};
use crate::shaders::{ELASTIC_WGSL, WORKGROUP};
use crate::solver::{
    validate, CancelToken, ReceiverTrace, SimulationResults, SolverBackend, SolverConfig,
    TOUCH_THRESHOLD,
};
use crate::stability::StabilityPlan;

const PROGRESS_INTERVAL: u32 = 10;

/// Try to create a wgpu device and queue.
/// Returns None if no GPU adapter is available.
pub fn try_create_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))?;
    let (device, queue) = pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("acoustic-gpu"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
        },
        None,
    ))
    .ok()?;
    Some((device, queue))
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuParams {
    width: u32,
    height: u32,
    depth: u32,
    material: u32,
    lambda: f32,
    mu: f32,
    dt: f32,
    inv_h: f32,
    inv_2h: f32,
    source_value: f32,
    source_index: u32,
    voxels: u32,
}

/// GPU implementation of the solver capability set.
pub struct GpuSolver {
    volume: VoxelVolume,
    config: SolverConfig,
    plan: StabilityPlan,
    wavelet: RickerWavelet,
    bus: ProgressBus,
    cancel: CancelToken,
    trace: ReceiverTrace,
    last_snapshot: (Arc<Vec<f32>>, Arc<Vec<f32>>),
    results: Option<SimulationResults>,

    device: wgpu::Device,
    queue: wgpu::Queue,
    stress_pipeline: wgpu::ComputePipeline,
    velocity_pipeline: wgpu::ComputePipeline,
    inject_pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    params_buf: wgpu::Buffer,
    fields_buf: wgpu::Buffer,
    probe_staging: wgpu::Buffer,
    snap_staging: wgpu::Buffer,
    base_params: GpuParams,
    probe_idx: u32,
}

impl GpuSolver {
    /// True when a compute adapter can be acquired on this machine.
    pub fn available() -> bool {
        try_create_device().is_some()
    }

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

        // GPU path: peak scaled by amplitude alone
        let wavelet = RickerWavelet::new(config.amplitude as f64, config.frequency_khz * 1e3, plan.dt);

        let (device, queue) = try_create_device()
            .ok_or_else(|| SimError::IoFailure("no compatible GPU adapter".into()))?;

        let dims = volume.dims;
        let n = dims.len();
        let inj = volume.injection_site();
        let probe = volume.probe_site();

        let base_params = GpuParams {
            width: dims.width as u32,
            height: dims.height as u32,
            depth: dims.depth as u32,
            material: volume.material_id as u32,
            lambda: plan.moduli.lambda as f32,
            mu: plan.moduli.mu as f32,
            dt: plan.dt as f32,
            inv_h: (1.0 / volume.pitch) as f32,
            inv_2h: (1.0 / (2.0 * volume.pitch)) as f32,
            source_value: 0.0,
            source_index: dims.idx(inj[0], inj[1], inj[2]) as u32,
            voxels: n as u32,
        };

        let params_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("elastic-params"),
            contents: bytemuck::bytes_of(&base_params),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let fields_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("elastic-fields"),
            size: (9 * n * 4) as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let labels_u32: Vec<u32> = volume.labels.iter().map(|&l| l as u32).collect();
        let labels_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("elastic-labels"),
            contents: bytemuck::cast_slice(&labels_u32),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let density_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("elastic-density"),
            contents: bytemuck::cast_slice(&volume.density),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let probe_staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("probe-staging"),
            size: 36,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let snap_staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("snapshot-staging"),
            size: (2 * n * 4) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let storage = |read_only| wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        };
        let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("elastic-bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: storage(false),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: storage(true),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: storage(true),
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("elastic-bind"),
            layout: &bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: fields_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: labels_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: density_buf.as_entire_binding(),
                },
            ],
        });

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("elastic-wgsl"),
            source: wgpu::ShaderSource::Wgsl(ELASTIC_WGSL.into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("elastic-layout"),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });
        let pipeline = |entry: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry),
                layout: Some(&layout),
                module: &module,
                entry_point: entry,
                compilation_options: Default::default(),
                cache: None,
            })
        };
        let stress_pipeline = pipeline("stress");
        let velocity_pipeline = pipeline("velocity");
        let inject_pipeline = pipeline("inject");

        let vp_nominal = plan.moduli.vp(volume.mean_active_density());
        info!(vp_nominal, "GPU solver initialised");

        Ok(Self {
            stress_pipeline,
            velocity_pipeline,
            inject_pipeline,
            bind_group,
            params_buf,
            fields_buf,
            probe_staging,
            snap_staging,
            base_params,
            probe_idx: volume.dims.idx(probe[0], probe[1], probe[2]) as u32,
            wavelet,
            bus: ProgressBus::new(),
            cancel: CancelToken::default(),
            trace: ReceiverTrace::default(),
            last_snapshot: (Arc::new(vec![0.0; n]), Arc::new(vec![0.0; n])),
            results: None,
            device,
            queue,
            volume,
            config,
            plan,
        })
    }

    pub fn results(&self) -> Option<&SimulationResults> {
        self.results.as_ref()
    }

    pub fn plan(&self) -> &StabilityPlan {
        &self.plan
    }

    pub fn receiver_trace(&self) -> &ReceiverTrace {
        &self.trace
    }

    fn dispatch_counts(&self) -> (u32, u32, u32) {
        let dims = self.volume.dims;
        (
            (dims.width as u32).div_ceil(WORKGROUP.0),
            (dims.height as u32).div_ceil(WORKGROUP.1),
            (dims.depth as u32).div_ceil(WORKGROUP.2),
        )
    }

    /// One solver step: stress, velocity, injection, probe readback.
    /// Returns the nine field components at the receiver site.
    fn step_gpu(&mut self, step: u32) -> SimResult<[f32; 9]> {
        // As on the CPU path, a masked-out transmitter injects nothing
        let inj = self.volume.injection_site();
        let inj_active = self.volume.is_active(inj[0], inj[1], inj[2]);
        let source_value = if inj_active && (step as usize) < self.wavelet.len() {
            self.wavelet.value_at(step as usize) as f32
        } else {
            0.0
        };
        let params = GpuParams {
            source_value,
            ..self.base_params
        };
        self.queue
            .write_buffer(&self.params_buf, 0, bytemuck::bytes_of(&params));

        let (gx, gy, gz) = self.dispatch_counts();
        let mut enc = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("elastic-step"),
            });
        {
            let mut pass = enc.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("elastic-pass"),
                timestamp_writes: None,
            });
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.set_pipeline(&self.stress_pipeline);
            pass.dispatch_workgroups(gx, gy, gz);
            pass.set_pipeline(&self.velocity_pipeline);
            pass.dispatch_workgroups(gx, gy, gz);
            if source_value != 0.0 {
                pass.set_pipeline(&self.inject_pipeline);
                pass.dispatch_workgroups(1, 1, 1);
            }
        }
        let n = self.base_params.voxels as u64;
        for c in 0..9u64 {
            enc.copy_buffer_to_buffer(
                &self.fields_buf,
                (c * n + self.probe_idx as u64) * 4,
                &self.probe_staging,
                c * 4,
                4,
            );
        }
        self.queue.submit(Some(enc.finish()));

        let bytes = read_mapped(&self.device, &self.probe_staging)?;
        let vals = le_f32s(&bytes);
        let mut out = [0.0f32; 9];
        out.copy_from_slice(&vals[..9]);
        Ok(out)
    }

    /// Read back full vx/vy snapshots.
    fn snapshot_gpu(&mut self) -> SimResult<(Vec<f32>, Vec<f32>)> {
        let n = self.base_params.voxels as u64;
        let mut enc = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("elastic-snapshot"),
            });
        enc.copy_buffer_to_buffer(&self.fields_buf, 0, &self.snap_staging, 0, 2 * n * 4);
        self.queue.submit(Some(enc.finish()));

        let bytes = read_mapped(&self.device, &self.snap_staging)?;
        let vals = le_f32s(&bytes);
        let n = n as usize;
        Ok((vals[..n].to_vec(), vals[n..2 * n].to_vec()))
    }

    fn emit_progress(
        &mut self,
        step: u32,
        touch: Option<u32>,
        max_post: u32,
        peaked: bool,
    ) -> SimResult<()> {
        let (vx, vy) = self.snapshot_gpu()?;
        let vx = Arc::new(vx);
        let vy = Arc::new(vy);
        self.last_snapshot = (vx.clone(), vy.clone());
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
        self.bus.publish(&SolverEvent::Progress(ProgressEvent {
            percent,
            step,
            message: message.into(),
            vx,
            vy,
        }));
        Ok(())
    }
}

impl SolverBackend for GpuSolver {
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
        // Zero the packed field buffer for a fresh run
        let mut enc = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("elastic-clear"),
            });
        enc.clear_buffer(&self.fields_buf, 0, None);
        self.queue.submit(Some(enc.finish()));
        self.trace.clear();

        let probe = self.volume.probe_site();
        let probe_rho = self.volume.density[self.volume.dims.idx(probe[0], probe[1], probe[2])]
            .max(1.0) as f64;
        let mu = self.plan.moduli.mu;
        let max_post = self.config.max_post_steps.unwrap_or(self.config.max_steps);
        let mut autostop = AutoStopController::new(self.config.max_steps);

        info!(
            expected_pre_touch = self.plan.expected_pre_touch_steps,
            wavelet_len = self.wavelet.len(),
            "starting GPU elastic run"
        );

        let mut touch: Option<u32> = None;
        let mut cancelled = false;
        let mut step: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                cancelled = true;
                warn!(step, "GPU run cancelled");
                break;
            }

            let probe_vals = self.step_gpu(step)?;
            let [pvx, pvy, pvz] = [probe_vals[0] as f64, probe_vals[1] as f64, probe_vals[2] as f64];
            self.trace.push(pvx, pvy, pvz);
            if touch.is_none()
                && (pvx.abs() > TOUCH_THRESHOLD
                    || pvy.abs() > TOUCH_THRESHOLD
                    || pvz.abs() > TOUCH_THRESHOLD)
            {
                touch = Some(step);
                info!(step, "receiver touched");
            }

            if step % PROGRESS_INTERVAL == 0 {
                self.emit_progress(step, touch, max_post, autostop.peaked())?;
            }

            if self.config.use_auto_stop {
                let e_kin = 0.5 * probe_rho * (pvx * pvx + pvy * pvy + pvz * pvz);
                let [sxx, syy, szz, sxy, sxz, syz] = [
                    probe_vals[3] as f64,
                    probe_vals[4] as f64,
                    probe_vals[5] as f64,
                    probe_vals[6] as f64,
                    probe_vals[7] as f64,
                    probe_vals[8] as f64,
                ];
                let e_str = (sxx * sxx + syy * syy + szz * szz
                    + 2.0 * (sxy * sxy + sxz * sxz + syz * syz))
                    / (4.0 * mu);
                if autostop.observe(step, e_kin + e_str) {
                    info!(step, "auto-stop: receiver energy decayed");
                    step += 1;
                    break;
                }
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
        let (vp, step_p, step_s) = match touch {
            Some(t) if t > 0 => {
                let vp = dist_m / (t as f64 * self.plan.dt);
                (vp, t, (t as f64 * ratio).round() as u32)
            }
            _ => {
                let vp = self.plan.moduli.vp(self.volume.mean_active_density());
                let analytic_touch = dist_m / (vp * self.plan.dt);
                (vp, 0, (analytic_touch * ratio).round() as u32)
            }
        };

        let results = SimulationResults {
            vp,
            vs: vp / ratio,
            vp_vs: ratio,
            step_p,
            step_s,
            total_steps,
            dropped_frames: 0,
            cancelled,
        };

        // Terminal snapshot + event
        if let Ok((vx, vy)) = self.snapshot_gpu() {
            self.last_snapshot = (Arc::new(vx), Arc::new(vy));
        }
        self.bus.publish(&SolverEvent::Progress(ProgressEvent {
            percent: 99,
            step: total_steps,
            message: if cancelled { "Cancelled" } else { "Finalising results" }.into(),
            vx: self.last_snapshot.0.clone(),
            vy: self.last_snapshot.1.clone(),
        }));
        self.bus.publish(&SolverEvent::Completed(results.clone()));

        self.results = Some(results.clone());
        Ok(results)
    }
}

/// Decode a little-endian byte stream into f32s without alignment demands.
fn le_f32s(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Map a staging buffer, copy its contents out, and unmap.
fn read_mapped(device: &wgpu::Device, buffer: &wgpu::Buffer) -> SimResult<Vec<u8>> {
    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .map_err(|_| SimError::IoFailure("GPU readback channel closed".into()))?
        .map_err(|e| SimError::IoFailure(format!("GPU buffer map failed: {:?}", e)))?;
    let bytes = slice.get_mapped_range().to_vec();
    buffer.unmap();
    Ok(bytes)
}
