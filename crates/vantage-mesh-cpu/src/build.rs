use std::cell::RefCell;
use std::collections::HashMap;

use vantage_blocks::{AIR, BlockRegistry, TextureId};
use vantage_chunk::ChunkStore;
use vantage_geom::Vec3;
use vantage_world::{CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z, ChunkKey};

use crate::chunk::ChunkGeometry;
use crate::face::Face;
use crate::mesh_build::MeshBuild;
use crate::neighborhood::{ChunkNeighborhood, NeighborhoodError};

thread_local! {
    // Per-texture quad counts from this thread's previous build, used as a capacity hint.
    static LAST_MESH_RESERVE: RefCell<Vec<usize>> = RefCell::new(Vec::new());
}

fn prepare_builds(tex_count: usize) -> Vec<MeshBuild> {
    let mut builds = vec![MeshBuild::default(); tex_count];
    LAST_MESH_RESERVE.with(|cell| {
        let caps = cell.borrow();
        for (i, mb) in builds.iter_mut().enumerate() {
            if let Some(&quads) = caps.get(i) {
                mb.reserve_quads(quads);
            }
        }
    });
    builds
}

fn update_last_mesh_reserve(builds: &[MeshBuild]) {
    LAST_MESH_RESERVE.with(|cell| {
        let mut caps = cell.borrow_mut();
        caps.resize(builds.len(), 0);
        for (i, mb) in builds.iter().enumerate() {
            let quads = mb.quad_count();
            caps[i] = quads + quads / 4;
        }
    });
}

/// Emits one quad per block face whose neighbor (possibly across a chunk border) is not opaque.
pub fn build_chunk_geometry(neigh: &ChunkNeighborhood, reg: &BlockRegistry) -> ChunkGeometry {
    let key = &neigh.center;
    let (ox, oy, oz) = key.coord.origin();
    let origin = Vec3::new(ox as f32, oy as f32, oz as f32);
    let center = neigh.center_chunk();
    let mut builds = prepare_builds(reg.textures.len());

    for y in 0..CHUNK_SIZE_Y {
        for z in 0..CHUNK_SIZE_Z {
            for x in 0..CHUNK_SIZE_X {
                let id = center.get_local(x, y, z);
                if id == AIR {
                    continue;
                }
                let (xi, yi, zi) = (x as i32, y as i32, z as i32);
                let block_min = origin + Vec3::new(x as f32, y as f32, z as f32);
                for face in Face::ALL {
                    let (dx, dy, dz) = face.delta();
                    if reg.is_opaque(neigh.block_at(xi + dx, yi + dy, zi + dz)) {
                        continue;
                    }
                    let tex = reg.texture_for(id, face.role());
                    let slot = if (tex.0 as usize) < builds.len() {
                        tex.0 as usize
                    } else {
                        TextureId::UNKNOWN.0 as usize
                    };
                    builds[slot].add_face_rect(face, block_min + face.corner_offset(), 1.0, 1.0);
                }
            }
        }
    }

    update_last_mesh_reserve(&builds);
    let mut parts = HashMap::new();
    for (i, mb) in builds.into_iter().enumerate() {
        if !mb.is_empty() {
            parts.insert(TextureId(i as u16), mb);
        }
    }
    ChunkGeometry {
        key: key.clone(),
        bbox: key.coord.bounds(),
        parts,
    }
}

/// Gathers the neighborhood from `store` and builds. Fails if any of the 27 chunks is missing.
pub fn build_chunk_geometry_from_store(
    store: &dyn ChunkStore,
    key: &ChunkKey,
    reg: &BlockRegistry,
) -> Result<ChunkGeometry, NeighborhoodError> {
    let neigh = ChunkNeighborhood::gather(store, key)?;
    Ok(build_chunk_geometry(&neigh, reg))
}
