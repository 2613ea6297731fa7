//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: persist.rs | SIMULATION/CORE/ACOUSTIC_ENGINE/src/persist.rs
//! PURPOSE: Compact binary checkpoint of final results and sparse wave fields
//! MODIFIED: 2026-07-18
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! Layout (little-endian):
//!   u32 len + "ACOUSTICSIM" | u32 version=1 | u32 W,H,D
//!   | f64 vp | f64 vs | f64 vp_vs | u32 step_p | u32 step_s
//!   | i32 tx,ty,tz,rx,ry,rz
//!   | sparse vx | sparse vy | sparse vz
//!
//! sparse: u32 count + count × (u32 flat_index, f64 value), keeping only
//! entries with |v| > 1e-10. The round-trip is lossless for the retained
//! support; everything else reloads as exact zero.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use dna::{ElasticField3D, GridDims};

use crate::cache::format::{
    read_f64, read_i32, read_u32, write_f64, write_i32, write_u32,
};
use crate::error::{SimError, SimResult};
use crate::solver::SimulationResults;

pub const RESULT_MAGIC: &str = "ACOUSTICSIM";
pub const RESULT_VERSION: u32 = 1;

/// Values below this magnitude are not persisted.
pub const SPARSE_THRESHOLD: f64 = 1e-10;

/// Sparse encoding of one field component.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SparseField {
    pub entries: Vec<(u32, f64)>,
}

impl SparseField {
    pub fn from_dense(dense: &[f64]) -> Self {
        let entries = dense
            .iter()
            .enumerate()
            .filter(|(_, v)| v.abs() > SPARSE_THRESHOLD)
            .map(|(i, &v)| (i as u32, v))
            .collect();
        Self { entries }
    }

    pub fn to_dense(&self, len: usize) -> Vec<f64> {
        let mut out = vec![0.0; len];
        for &(i, v) in &self.entries {
            if let Some(slot) = out.get_mut(i as usize) {
                *slot = v;
            }
        }
        out
    }

    fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        write_u32(w, self.entries.len() as u32)?;
        for &(i, v) in &self.entries {
            write_u32(w, i)?;
            write_f64(w, v)?;
        }
        Ok(())
    }

    fn read_from<R: Read>(r: &mut R, max_index: usize) -> SimResult<Self> {
        let count = read_u32(r)? as usize;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let i = read_u32(r)?;
            if i as usize >= max_index {
                return Err(SimError::Corrupted(format!(
                    "sparse index {} outside grid of {} voxels",
                    i, max_index
                )));
            }
            entries.push((i, read_f64(r)?));
        }
        Ok(Self { entries })
    }
}

/// Everything a finished (or cancelled) run persists.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverCheckpoint {
    pub dims: GridDims,
    pub vp: f64,
    pub vs: f64,
    pub vp_vs: f64,
    pub step_p: u32,
    pub step_s: u32,
    pub tx: [i32; 3],
    pub rx: [i32; 3],
    pub vx: SparseField,
    pub vy: SparseField,
    pub vz: SparseField,
}

impl SolverCheckpoint {
    /// Snapshot a run's outcome together with its final wave field.
    pub fn from_run(
        dims: GridDims,
        tx: [usize; 3],
        rx: [usize; 3],
        results: &SimulationResults,
        field: &ElasticField3D,
    ) -> Self {
        Self {
            dims,
            vp: results.vp,
            vs: results.vs,
            vp_vs: results.vp_vs,
            step_p: results.step_p,
            step_s: results.step_s,
            tx: tx.map(|c| c as i32),
            rx: rx.map(|c| c as i32),
            vx: SparseField::from_dense(&field.vx),
            vy: SparseField::from_dense(&field.vy),
            vz: SparseField::from_dense(&field.vz),
        }
    }

    pub fn save(&self, path: &Path) -> SimResult<()> {
        let mut w = BufWriter::new(File::create(path)?);
        write_u32(&mut w, RESULT_MAGIC.len() as u32)?;
        w.write_all(RESULT_MAGIC.as_bytes())?;
        write_u32(&mut w, RESULT_VERSION)?;
        write_u32(&mut w, self.dims.width as u32)?;
        write_u32(&mut w, self.dims.height as u32)?;
        write_u32(&mut w, self.dims.depth as u32)?;
        write_f64(&mut w, self.vp)?;
        write_f64(&mut w, self.vs)?;
        write_f64(&mut w, self.vp_vs)?;
        write_u32(&mut w, self.step_p)?;
        write_u32(&mut w, self.step_s)?;
        for c in self.tx.iter().chain(self.rx.iter()) {
            write_i32(&mut w, *c)?;
        }
        self.vx.write_to(&mut w)?;
        self.vy.write_to(&mut w)?;
        self.vz.write_to(&mut w)?;
        w.flush()?;
        Ok(())
    }

    /// Load a checkpoint. When `expected` dimensions are given, a mismatch
    /// is rejected with `DimensionMismatch`.
    pub fn load(path: &Path, expected: Option<GridDims>) -> SimResult<Self> {
        let mut r = BufReader::new(File::open(path)?);

        let magic_len = read_u32(&mut r)? as usize;
        if magic_len != RESULT_MAGIC.len() {
            return Err(SimError::Corrupted(format!(
                "magic length {} in checkpoint",
                magic_len
            )));
        }
        let mut magic = vec![0u8; magic_len];
        r.read_exact(&mut magic)?;
        if magic != RESULT_MAGIC.as_bytes() {
            return Err(SimError::Corrupted("bad checkpoint magic".into()));
        }
        let version = read_u32(&mut r)?;
        if version != RESULT_VERSION {
            return Err(SimError::Corrupted(format!(
                "unsupported checkpoint version {}",
                version
            )));
        }

        let w_ = read_u32(&mut r)? as usize;
        let h_ = read_u32(&mut r)? as usize;
        let d_ = read_u32(&mut r)? as usize;
        let dims = GridDims::new(w_, h_, d_);
        if let Some(exp) = expected {
            if exp != dims {
                return Err(SimError::DimensionMismatch(format!(
                    "checkpoint is {}x{}x{}, expected {}x{}x{}",
                    w_, h_, d_, exp.width, exp.height, exp.depth
                )));
            }
        }

        let vp = read_f64(&mut r)?;
        let vs = read_f64(&mut r)?;
        let vp_vs = read_f64(&mut r)?;
        let step_p = read_u32(&mut r)?;
        let step_s = read_u32(&mut r)?;
        let mut tx = [0i32; 3];
        let mut rx = [0i32; 3];
        for c in tx.iter_mut().chain(rx.iter_mut()) {
            *c = read_i32(&mut r)?;
        }

        let n = dims.len();
        Ok(Self {
            dims,
            vp,
            vs,
            vp_vs,
            step_p,
            step_s,
            tx,
            rx,
            vx: SparseField::read_from(&mut r, n)?,
            vy: SparseField::read_from(&mut r, n)?,
            vz: SparseField::read_from(&mut r, n)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sparse_drops_sub_threshold_values() {
        let dense = vec![0.0, 1e-11, -5e-3, 0.0, 2e-10, -1e-12];
        let sparse = SparseField::from_dense(&dense);
        assert_eq!(sparse.entries.len(), 2);
        let back = sparse.to_dense(dense.len());
        assert_eq!(back[2], -5e-3);
        assert_eq!(back[4], 2e-10);
        assert_eq!(back[1], 0.0);
    }

    proptest! {
        /// Round-trip keeps every retained value bit-exact and zeroes the rest.
        #[test]
        fn prop_sparse_round_trip(dense in proptest::collection::vec(-1.0f64..1.0, 1..300)) {
            let sparse = SparseField::from_dense(&dense);
            let back = sparse.to_dense(dense.len());
            for (a, b) in dense.iter().zip(back.iter()) {
                if a.abs() > SPARSE_THRESHOLD {
                    prop_assert_eq!(a.to_bits(), b.to_bits());
                } else {
                    prop_assert_eq!(*b, 0.0);
                }
            }
        }
    }
}
