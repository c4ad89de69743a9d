use vantage_geom::Vec3;

use crate::face::Face;

/// Vertex and index arrays for one texture of one chunk.
/// A 16³ chunk emits at most 49152 vertices per part, so `u16` indices suffice.
#[derive(Default, Clone, Debug)]
pub struct MeshBuild {
    pub pos: Vec<f32>,
    pub norm: Vec<f32>,
    pub uv: Vec<f32>,
    pub idx: Vec<u16>,
}

impl MeshBuild {
    /// Clears all arrays but retains capacity for reuse.
    #[inline]
    pub fn clear_keep_capacity(&mut self) {
        self.pos.clear();
        self.norm.clear();
        self.uv.clear();
        self.idx.clear();
    }

    /// Pre-reserve capacity for approximately `n_quads` quads worth of data.
    #[inline]
    pub fn reserve_quads(&mut self, n_quads: usize) {
        // 4 vertices per quad
        self.pos.reserve(n_quads * 4 * 3);
        self.norm.reserve(n_quads * 4 * 3);
        self.uv.reserve(n_quads * 4 * 2);
        self.idx.reserve(n_quads * 6);
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.pos.len() / 3
    }

    #[inline]
    pub fn quad_count(&self) -> usize {
        self.idx.len() / 6
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.idx.is_empty()
    }

    /// Appends a quad with explicit per-vertex UVs. Winding is flipped if needed so the
    /// front face points along `n`.
    pub fn add_quad_uv(
        &mut self,
        a: Vec3,
        b: Vec3,
        c: Vec3,
        d: Vec3,
        n: Vec3,
        mut uvs: [(f32, f32); 4],
    ) {
        let base = self.vertex_count() as u16;
        let mut vs = [a, d, c, b];
        let cross = (vs[1] - vs[0]).cross(vs[2] - vs[0]);
        if cross.dot(n) < 0.0 {
            vs.swap(1, 3);
            uvs.swap(1, 3);
        }
        // top-left texture origin
        for uv in &mut uvs {
            uv.1 = -uv.1;
        }
        for i in 0..4 {
            self.pos.extend_from_slice(&[vs[i].x, vs[i].y, vs[i].z]);
            self.norm.extend_from_slice(&[n.x, n.y, n.z]);
            self.uv.extend_from_slice(&[uvs[i].0, uvs[i].1]);
        }
        self.idx
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    /// Emits a face-aligned rectangle for the given face at `origin` with size `(u1,v1)`.
    pub fn add_face_rect(&mut self, face: Face, origin: Vec3, u1: f32, v1: f32) {
        let n = face.normal();
        let o = origin;
        let (a, b, c, d) = match face {
            Face::PosY => (
                o,
                Vec3::new(o.x + u1, o.y, o.z),
                Vec3::new(o.x + u1, o.y, o.z + v1),
                Vec3::new(o.x, o.y, o.z + v1),
            ),
            Face::NegY => (
                Vec3::new(o.x, o.y, o.z + v1),
                Vec3::new(o.x + u1, o.y, o.z + v1),
                Vec3::new(o.x + u1, o.y, o.z),
                o,
            ),
            Face::PosX => (
                Vec3::new(o.x, o.y + v1, o.z + u1),
                Vec3::new(o.x, o.y + v1, o.z),
                o,
                Vec3::new(o.x, o.y, o.z + u1),
            ),
            Face::NegX => (
                Vec3::new(o.x, o.y + v1, o.z),
                Vec3::new(o.x, o.y + v1, o.z + u1),
                Vec3::new(o.x, o.y, o.z + u1),
                o,
            ),
            Face::PosZ => (
                Vec3::new(o.x + u1, o.y + v1, o.z),
                Vec3::new(o.x, o.y + v1, o.z),
                o,
                Vec3::new(o.x + u1, o.y, o.z),
            ),
            Face::NegZ => (
                Vec3::new(o.x, o.y + v1, o.z),
                Vec3::new(o.x + u1, o.y + v1, o.z),
                Vec3::new(o.x + u1, o.y, o.z),
                o,
            ),
        };
        // Absolute UVs from world-space coordinates per face orientation
        let uv_from = |p: Vec3| match face {
            Face::PosY | Face::NegY => (p.x, p.z),
            Face::PosX | Face::NegX => (p.z, p.y),
            Face::PosZ | Face::NegZ => (p.x, p.y),
        };
        let uvs = [uv_from(a), uv_from(d), uv_from(c), uv_from(b)];
        self.add_quad_uv(a, b, c, d, n, uvs);
    }

    pub fn positions(&self) -> &[f32] {
        &self.pos
    }

    pub fn normals(&self) -> &[f32] {
        &self.norm
    }
}
