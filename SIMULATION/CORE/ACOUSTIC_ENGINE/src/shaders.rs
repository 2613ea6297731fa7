//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: shaders.rs | SIMULATION/CORE/ACOUSTIC_ENGINE/src/shaders.rs
//! PURPOSE: WGSL compute kernels for the GPU elastic stencil
//! MODIFIED: 2026-07-18
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! The nine f32 field components live back-to-back in one storage buffer
//! (component c at `c·voxels + idx`), keeping the pipeline inside the
//! default 8-storage-buffers-per-stage limit. Entry points mirror the CPU
//! per-step order: `stress`, then `velocity`, then a single-thread `inject`.

// Packed component order: vx vy vz sxx syy szz sxy sxz syz
pub const WORKGROUP: (u32, u32, u32) = (4, 4, 4);

pub const ELASTIC_WGSL: &str = r#"
struct Params {
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

@group(0) @binding(0) var<uniform> P: Params;
@group(0) @binding(1) var<storage, read_write> F: array<f32>;
@group(0) @binding(2) var<storage, read> labels: array<u32>;
@group(0) @binding(3) var<storage, read> density: array<f32>;

// Component offsets match shaders.rs COMP_* constants
fn at(c: u32, i: u32) -> u32 {
    return c * P.voxels + i;
}

fn interior(gid: vec3<u32>) -> bool {
    return gid.x >= 1u && gid.y >= 1u && gid.z >= 1u
        && gid.x < P.width - 1u && gid.y < P.height - 1u && gid.z < P.depth - 1u;
}

@compute @workgroup_size(4, 4, 4)
fn stress(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (!interior(gid)) {
        return;
    }
    let i = (gid.z * P.height + gid.y) * P.width + gid.x;
    if (labels[i] != P.material) {
        return;
    }
    let w = P.width;
    let pl = P.width * P.height;

    // Centred velocity gradients
    let dvx_dx = (F[at(0u, i + 1u)] - F[at(0u, i - 1u)]) * P.inv_2h;
    let dvy_dy = (F[at(1u, i + w)] - F[at(1u, i - w)]) * P.inv_2h;
    let dvz_dz = (F[at(2u, i + pl)] - F[at(2u, i - pl)]) * P.inv_2h;

    let dvx_dy = (F[at(0u, i + w)] - F[at(0u, i - w)]) * P.inv_2h;
    let dvx_dz = (F[at(0u, i + pl)] - F[at(0u, i - pl)]) * P.inv_2h;
    let dvy_dx = (F[at(1u, i + 1u)] - F[at(1u, i - 1u)]) * P.inv_2h;
    let dvy_dz = (F[at(1u, i + pl)] - F[at(1u, i - pl)]) * P.inv_2h;
    let dvz_dx = (F[at(2u, i + 1u)] - F[at(2u, i - 1u)]) * P.inv_2h;
    let dvz_dy = (F[at(2u, i + w)] - F[at(2u, i - w)]) * P.inv_2h;

    let theta = dvx_dx + dvy_dy + dvz_dz;

    F[at(3u, i)] += P.dt * (P.lambda * theta + 2.0 * P.mu * dvx_dx);
    F[at(4u, i)] += P.dt * (P.lambda * theta + 2.0 * P.mu * dvy_dy);
    F[at(5u, i)] += P.dt * (P.lambda * theta + 2.0 * P.mu * dvz_dz);

    F[at(6u, i)] += P.dt * P.mu * (dvx_dy + dvy_dx);
    F[at(7u, i)] += P.dt * P.mu * (dvx_dz + dvz_dx);
    F[at(8u, i)] += P.dt * P.mu * (dvy_dz + dvz_dy);
}

@compute @workgroup_size(4, 4, 4)
fn velocity(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (!interior(gid)) {
        return;
    }
    let i = (gid.z * P.height + gid.y) * P.width + gid.x;
    if (labels[i] != P.material) {
        return;
    }
    let w = P.width;
    let pl = P.width * P.height;
    let scale = P.dt / density[i] * P.inv_h;

    // Normal-stress term backward along its own axis, shear terms forward
    F[at(0u, i)] += scale
        * ((F[at(3u, i)] - F[at(3u, i - 1u)])
            + (F[at(6u, i + w)] - F[at(6u, i)])
            + (F[at(7u, i + pl)] - F[at(7u, i)]));

    F[at(1u, i)] += scale
        * ((F[at(6u, i + 1u)] - F[at(6u, i)])
            + (F[at(4u, i)] - F[at(4u, i - w)])
            + (F[at(8u, i + pl)] - F[at(8u, i)]));

    F[at(2u, i)] += scale
        * ((F[at(7u, i + 1u)] - F[at(7u, i)])
            + (F[at(8u, i + w)] - F[at(8u, i)])
            + (F[at(5u, i)] - F[at(5u, i - pl)]));
}

@compute @workgroup_size(1)
fn inject() {
    F[at(3u, P.source_index)] += P.source_value;
}
"#;
