//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: volume.rs | DNA/src/data/volume.rs
//! PURPOSE: Segmented voxel volume - labels, densities, transducer placement
//! MODIFIED: 2026-07-18
//! LAYER: DNA (foundation)
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! The volume is the immutable input of a simulation run: a label grid from
//! the segmentation pipeline, a density grid, the voxel pitch in metres, the
//! material id selected for propagation, and the transmitter/receiver
//! coordinates. A voxel participates in the stencil updates iff its label
//! equals the selected material id; every other voxel stays at zero for all
//! nine field components (reflective boundary by omission).

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::world::grid::GridDims;

/// Propagation axis for default transducer placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Default transducer placement: TX at the low-face centre, RX at the
    /// high-face centre along the axis.
    pub fn face_centres(&self, dims: &GridDims) -> ([usize; 3], [usize; 3]) {
        let cx = dims.width / 2;
        let cy = dims.height / 2;
        let cz = dims.depth / 2;
        match self {
            Axis::X => ([0, cy, cz], [dims.width - 1, cy, cz]),
            Axis::Y => ([cx, 0, cz], [cx, dims.height - 1, cz]),
            Axis::Z => ([cx, cy, 0], [cx, cy, dims.depth - 1]),
        }
    }
}

/// Immutable simulation input volume.
#[derive(Clone, Debug)]
pub struct VoxelVolume {
    pub dims: GridDims,
    /// Voxel pitch in metres
    pub pitch: f64,
    /// Material label per voxel
    pub labels: Vec<u8>,
    /// Density per voxel (kg/m³)
    pub density: Vec<f32>,
    /// Only voxels whose label equals this id propagate waves
    pub material_id: u8,
    /// Transmitter voxel (nominal; may sit on a face)
    pub tx: [usize; 3],
    /// Receiver voxel (nominal; may sit on a face)
    pub rx: [usize; 3],
}

impl VoxelVolume {
    /// Build a volume with transducers at the default face centres for `axis`.
    pub fn with_axis(
        dims: GridDims,
        pitch: f64,
        labels: Vec<u8>,
        density: Vec<f32>,
        material_id: u8,
        axis: Axis,
    ) -> Self {
        let (tx, rx) = axis.face_centres(&dims);
        Self {
            dims,
            pitch,
            labels,
            density,
            material_id,
            tx,
            rx,
        }
    }

    #[inline]
    pub fn is_active(&self, x: usize, y: usize, z: usize) -> bool {
        self.labels[self.dims.idx(x, y, z)] == self.material_id
    }

    #[inline]
    pub fn is_active_idx(&self, i: usize) -> bool {
        self.labels[i] == self.material_id
    }

    pub fn active_count(&self) -> usize {
        let id = self.material_id;
        self.labels.iter().filter(|&&l| l == id).count()
    }

    /// Mean density over active voxels. Zero when no voxel is active.
    pub fn mean_active_density(&self) -> f64 {
        let id = self.material_id;
        let mut sum = 0.0f64;
        let mut n = 0usize;
        for (l, d) in self.labels.iter().zip(self.density.iter()) {
            if *l == id {
                sum += *d as f64;
                n += 1;
            }
        }
        if n == 0 {
            0.0
        } else {
            sum / n as f64
        }
    }

    /// Minimum density over active voxels. Drives the CFL bound, so it must
    /// be strictly positive on any usable volume.
    pub fn min_active_density(&self) -> f64 {
        let id = self.material_id;
        self.labels
            .iter()
            .zip(self.density.iter())
            .filter(|(l, _)| **l == id)
            .map(|(_, d)| *d as f64)
            .fold(f64::INFINITY, f64::min)
    }

    pub fn tx_pos(&self) -> DVec3 {
        DVec3::new(self.tx[0] as f64, self.tx[1] as f64, self.tx[2] as f64)
    }

    pub fn rx_pos(&self) -> DVec3 {
        DVec3::new(self.rx[0] as f64, self.rx[1] as f64, self.rx[2] as f64)
    }

    /// TX-RX separation in voxel units
    pub fn tx_rx_distance_voxels(&self) -> f64 {
        self.tx_pos().distance(self.rx_pos())
    }

    /// TX-RX separation in metres
    pub fn tx_rx_distance_m(&self) -> f64 {
        self.tx_rx_distance_voxels() * self.pitch
    }

    /// Injection site: TX clamped one voxel off the Dirichlet walls.
    pub fn injection_site(&self) -> [usize; 3] {
        self.dims.clamp_interior(self.tx)
    }

    /// Probe site: RX clamped one voxel off the Dirichlet walls. Face
    /// voxels are never written by the stencil, so a face-mounted receiver
    /// is read one voxel inward.
    pub fn probe_site(&self) -> [usize; 3] {
        self.dims.clamp_interior(self.rx)
    }
}
