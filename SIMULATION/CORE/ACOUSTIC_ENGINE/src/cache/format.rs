//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: format.rs | SIMULATION/CORE/ACOUSTIC_ENGINE/src/cache/format.rs
//! PURPOSE: Binary codec for frame-cache metadata and per-step frame files
//! MODIFIED: 2026-07-18
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! All integers and floats are little-endian. Both file kinds open with a
//! 5-byte magic tag and a u32 version.
//!
//! metadata.dat:
//!   "ACSIM" | u32 version | u32 W | u32 H | u32 D | u32 frame_count | records
//!   record: u32 step | u32 name_len + name | f32 p_value | f32 s_value
//!           | f32 p_progress | f32 s_progress
//!   The frame count lives at fixed offset 21 and is patched after every
//!   append; records are only ever appended at EOF.
//!
//! frame_XXXXXXXX.dat:
//!   "FRAME" | u32 version | u32 step | u32 W | u32 H | u32 D
//!   | u32 plane_w | u32 plane_h
//!   | vx, vy, vz          three W·H·D f32 blocks
//!   | tomo, cross         two plane_w·plane_h f32 blocks
//!   | f32 p_value | f32 s_value | f32 p_progress | f32 s_progress
//!   | p_series, s_series  two (u32 len + f32·len) series

use std::io::{self, Read, Write};

use dna::GridDims;

use crate::error::{SimError, SimResult};

pub const METADATA_MAGIC: &[u8; 5] = b"ACSIM";
pub const FRAME_MAGIC: &[u8; 5] = b"FRAME";
pub const CACHE_VERSION: u32 = 1;

/// Byte offset of the frame-count field in metadata.dat
pub const METADATA_COUNT_OFFSET: u64 = 21;

// ─────────────────────────────────────────────────────────────────────────────────
// Little-endian primitives (shared with persist.rs)
// ─────────────────────────────────────────────────────────────────────────────────

pub(crate) fn write_u32<W: Write>(w: &mut W, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub(crate) fn write_i32<W: Write>(w: &mut W, v: i32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub(crate) fn write_f32<W: Write>(w: &mut W, v: f32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub(crate) fn write_f64<W: Write>(w: &mut W, v: f64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub(crate) fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(u32::from_le_bytes(b))
}

pub(crate) fn read_i32<R: Read>(r: &mut R) -> io::Result<i32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(i32::from_le_bytes(b))
}

pub(crate) fn read_f32<R: Read>(r: &mut R) -> io::Result<f32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(f32::from_le_bytes(b))
}

pub(crate) fn read_f64<R: Read>(r: &mut R) -> io::Result<f64> {
    let mut b = [0u8; 8];
    r.read_exact(&mut b)?;
    Ok(f64::from_le_bytes(b))
}

pub(crate) fn write_f32_block<W: Write>(w: &mut W, block: &[f32]) -> io::Result<()> {
    for &v in block {
        write_f32(w, v)?;
    }
    Ok(())
}

pub(crate) fn read_f32_block<R: Read>(r: &mut R, len: usize) -> io::Result<Vec<f32>> {
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        out.push(read_f32(r)?);
    }
    Ok(out)
}

pub(crate) fn write_f32_series<W: Write>(w: &mut W, series: &[f32]) -> io::Result<()> {
    write_u32(w, series.len() as u32)?;
    write_f32_block(w, series)
}

pub(crate) fn read_f32_series<R: Read>(r: &mut R) -> io::Result<Vec<f32>> {
    let len = read_u32(r)? as usize;
    read_f32_block(r, len)
}

// ─────────────────────────────────────────────────────────────────────────────────
// Frame payload
// ─────────────────────────────────────────────────────────────────────────────────

/// One persisted step: full velocity fields, two display planes, receiver
/// scalars, and the receiver traces accumulated so far.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveFrame {
    pub step: u32,
    pub dims: GridDims,
    pub plane_dims: (u32, u32),
    pub vx: Vec<f32>,
    pub vy: Vec<f32>,
    pub vz: Vec<f32>,
    /// Reconstructed velocity on the plane through the TX-RX ray
    pub tomo_slice: Vec<f32>,
    /// |v| on the same plane
    pub cross_section: Vec<f32>,
    /// vx at the receiver
    pub p_value: f32,
    /// √(vy² + vz²) at the receiver
    pub s_value: f32,
    /// P-front progress along the TX→RX ray, [0, 1]
    pub p_progress: f32,
    /// S-front progress along the TX→RX ray, [0, 1]
    pub s_progress: f32,
    pub p_series: Vec<f32>,
    pub s_series: Vec<f32>,
}

impl WaveFrame {
    pub fn file_name(step: u32) -> String {
        format!("frame_{:08}.dat", step)
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(FRAME_MAGIC)?;
        write_u32(w, CACHE_VERSION)?;
        write_u32(w, self.step)?;
        write_u32(w, self.dims.width as u32)?;
        write_u32(w, self.dims.height as u32)?;
        write_u32(w, self.dims.depth as u32)?;
        write_u32(w, self.plane_dims.0)?;
        write_u32(w, self.plane_dims.1)?;
        write_f32_block(w, &self.vx)?;
        write_f32_block(w, &self.vy)?;
        write_f32_block(w, &self.vz)?;
        write_f32_block(w, &self.tomo_slice)?;
        write_f32_block(w, &self.cross_section)?;
        write_f32(w, self.p_value)?;
        write_f32(w, self.s_value)?;
        write_f32(w, self.p_progress)?;
        write_f32(w, self.s_progress)?;
        write_f32_series(w, &self.p_series)?;
        write_f32_series(w, &self.s_series)
    }

    pub fn read_from<R: Read>(r: &mut R) -> SimResult<Self> {
        let mut magic = [0u8; 5];
        r.read_exact(&mut magic)
            .map_err(|e| SimError::Corrupted(format!("frame header: {}", e)))?;
        if &magic != FRAME_MAGIC {
            return Err(SimError::Corrupted("bad frame magic".into()));
        }
        let version = read_u32(r)?;
        if version != CACHE_VERSION {
            return Err(SimError::Corrupted(format!(
                "unsupported frame version {}",
                version
            )));
        }
        let step = read_u32(r)?;
        let w_ = read_u32(r)? as usize;
        let h_ = read_u32(r)? as usize;
        let d_ = read_u32(r)? as usize;
        let dims = GridDims::new(w_, h_, d_);
        let pw = read_u32(r)?;
        let ph = read_u32(r)?;
        let n = dims.len();
        let plane = (pw as usize) * (ph as usize);

        Ok(Self {
            step,
            dims,
            plane_dims: (pw, ph),
            vx: read_f32_block(r, n)?,
            vy: read_f32_block(r, n)?,
            vz: read_f32_block(r, n)?,
            tomo_slice: read_f32_block(r, plane)?,
            cross_section: read_f32_block(r, plane)?,
            p_value: read_f32(r)?,
            s_value: read_f32(r)?,
            p_progress: read_f32(r)?,
            s_progress: read_f32(r)?,
            p_series: read_f32_series(r)?,
            s_series: read_f32_series(r)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────────
// Metadata
// ─────────────────────────────────────────────────────────────────────────────────

/// Index entry for one persisted frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameRecord {
    pub step: u32,
    /// File name relative to the cache directory
    pub file_name: String,
    pub p_value: f32,
    pub s_value: f32,
    pub p_progress: f32,
    pub s_progress: f32,
}

impl FrameRecord {
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_u32(w, self.step)?;
        write_u32(w, self.file_name.len() as u32)?;
        w.write_all(self.file_name.as_bytes())?;
        write_f32(w, self.p_value)?;
        write_f32(w, self.s_value)?;
        write_f32(w, self.p_progress)?;
        write_f32(w, self.s_progress)
    }

    pub fn read_from<R: Read>(r: &mut R) -> SimResult<Self> {
        let step = read_u32(r)?;
        let name_len = read_u32(r)? as usize;
        if name_len > 4096 {
            return Err(SimError::Corrupted(format!(
                "frame record name length {}",
                name_len
            )));
        }
        let mut name = vec![0u8; name_len];
        r.read_exact(&mut name)?;
        let file_name = String::from_utf8(name)
            .map_err(|_| SimError::Corrupted("frame record name not UTF-8".into()))?;
        Ok(Self {
            step,
            file_name,
            p_value: read_f32(r)?,
            s_value: read_f32(r)?,
            p_progress: read_f32(r)?,
            s_progress: read_f32(r)?,
        })
    }
}

/// Parsed metadata.dat.
#[derive(Clone, Debug)]
pub struct CacheMetadata {
    pub dims: GridDims,
    pub frames: Vec<FrameRecord>,
}

/// Write a fresh header with a zero frame count.
pub fn write_metadata_header<W: Write>(w: &mut W, dims: GridDims) -> io::Result<()> {
    w.write_all(METADATA_MAGIC)?;
    write_u32(w, CACHE_VERSION)?;
    write_u32(w, dims.width as u32)?;
    write_u32(w, dims.height as u32)?;
    write_u32(w, dims.depth as u32)?;
    write_u32(w, 0)
}

/// Parse a complete metadata stream. Metadata corruption is fatal.
pub fn read_metadata<R: Read>(r: &mut R) -> SimResult<CacheMetadata> {
    let mut magic = [0u8; 5];
    r.read_exact(&mut magic)
        .map_err(|e| SimError::Corrupted(format!("metadata header: {}", e)))?;
    if &magic != METADATA_MAGIC {
        return Err(SimError::Corrupted("bad metadata magic".into()));
    }
    let version = read_u32(r)?;
    if version != CACHE_VERSION {
        return Err(SimError::Corrupted(format!(
            "unsupported metadata version {}",
            version
        )));
    }
    let w_ = read_u32(r)? as usize;
    let h_ = read_u32(r)? as usize;
    let d_ = read_u32(r)? as usize;
    let count = read_u32(r)? as usize;

    let mut frames = Vec::with_capacity(count);
    for _ in 0..count {
        frames.push(FrameRecord::read_from(r)?);
    }
    Ok(CacheMetadata {
        dims: GridDims::new(w_, h_, d_),
        frames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> WaveFrame {
        let dims = GridDims::new(3, 2, 2);
        let n = dims.len();
        WaveFrame {
            step: 40,
            dims,
            plane_dims: (3, 2),
            vx: (0..n).map(|i| i as f32).collect(),
            vy: (0..n).map(|i| -(i as f32)).collect(),
            vz: vec![0.5; n],
            tomo_slice: vec![1500.0; 6],
            cross_section: vec![0.25; 6],
            p_value: 1e-5,
            s_value: 2e-5,
            p_progress: 0.5,
            s_progress: 0.29,
            p_series: vec![0.0, 1e-5],
            s_series: vec![0.0, 2e-5],
        }
    }

    #[test]
    fn test_frame_round_trip_is_exact() {
        let frame = sample_frame();
        let mut buf = Vec::new();
        frame.write_to(&mut buf).unwrap();
        let back = WaveFrame::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(frame, back);
    }

    #[test]
    fn test_frame_rejects_bad_magic() {
        let frame = sample_frame();
        let mut buf = Vec::new();
        frame.write_to(&mut buf).unwrap();
        buf[0] = b'X';
        match WaveFrame::read_from(&mut buf.as_slice()) {
            Err(SimError::Corrupted(_)) => {}
            other => panic!("expected Corrupted, got {:?}", other.map(|f| f.step)),
        }
    }

    #[test]
    fn test_metadata_count_offset_matches_layout() {
        let mut buf = Vec::new();
        write_metadata_header(&mut buf, GridDims::new(4, 5, 6)).unwrap();
        // magic(5) + version(4) + dims(12) = 21
        assert_eq!(buf.len() as u64, METADATA_COUNT_OFFSET + 4);
        assert_eq!(&buf[21..25], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_metadata_round_trip() {
        let mut buf = Vec::new();
        write_metadata_header(&mut buf, GridDims::new(4, 5, 6)).unwrap();
        let rec = FrameRecord {
            step: 10,
            file_name: WaveFrame::file_name(10),
            p_value: 0.1,
            s_value: 0.2,
            p_progress: 0.3,
            s_progress: 0.4,
        };
        rec.write_to(&mut buf).unwrap();
        // Patch the count in place, as the writer thread does
        buf[21..25].copy_from_slice(&1u32.to_le_bytes());

        let meta = read_metadata(&mut buf.as_slice()).unwrap();
        assert_eq!(meta.dims, GridDims::new(4, 5, 6));
        assert_eq!(meta.frames.len(), 1);
        assert_eq!(meta.frames[0], rec);
        assert_eq!(meta.frames[0].file_name, "frame_00000010.dat");
    }
}
