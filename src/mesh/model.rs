//! Shared coordinate pool and the per-entity meshes indexing into it.
//!
//! Workers meshing different faces register coordinates concurrently; the pool
//! is guarded by a mutex and mesh ids come from an atomic counter.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::geom::{Point3, UvPoint, Vec3};
use crate::topo::{EdgeId, FaceId, MeshId, VertexId};

#[derive(Debug, Default, Clone, Serialize)]
pub struct CoordinatePool {
    pub points: Vec<Point3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<UvPoint>,
}

impl CoordinatePool {
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VertexMesh {
    pub vertex: VertexId,
    pub index: usize,
}

/// Discretisation of an active edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeMesh {
    pub edge: EdgeId,
    /// Increasing curve parameters, both interval ends included.
    pub cuts: Vec<f64>,
    pub uvs: Vec<UvPoint>,
    /// Pool index of each cut; the ends are the vertex meshes.
    pub vertex_ids: Vec<usize>,
}

impl EdgeMesh {
    /// Polyline as consecutive pool index pairs.
    #[must_use]
    pub fn segments(&self) -> Vec<[usize; 2]> {
        self.vertex_ids.windows(2).map(|w| [w[0], w[1]]).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FaceMesh {
    pub face: FaceId,
    /// Counter-clockwise in parametric space.
    pub triangles: Vec<[usize; 3]>,
    pub vertex_ids: Vec<usize>,
    /// One closed cycle per loop: first index repeated at the end.
    pub boundary_cycles: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EntityMesh {
    Vertex(VertexMesh),
    Edge(EdgeMesh),
    Face(FaceMesh),
}

#[derive(Debug, Default)]
pub struct MeshModel {
    pool: Mutex<CoordinatePool>,
    meshes: Mutex<BTreeMap<MeshId, EntityMesh>>,
    next_id: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MeshModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn next_mesh_id(&self) -> MeshId {
        MeshId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Appends coordinates and returns the pool index of the first one.
    /// `normals` and `uvs` must have the same length as `points`.
    pub fn register(&self, points: &[Point3], normals: &[Vec3], uvs: &[UvPoint]) -> usize {
        debug_assert_eq!(points.len(), normals.len());
        debug_assert_eq!(points.len(), uvs.len());
        let mut pool = lock(&self.pool);
        let first = pool.points.len();
        pool.points.extend_from_slice(points);
        pool.normals.extend_from_slice(normals);
        pool.uvs.extend_from_slice(uvs);
        first
    }

    pub fn insert(&self, mesh: EntityMesh) -> MeshId {
        let id = self.next_mesh_id();
        lock(&self.meshes).insert(id, mesh);
        id
    }

    #[must_use]
    pub fn vertex_mesh(&self, id: MeshId) -> Option<VertexMesh> {
        match lock(&self.meshes).get(&id) {
            Some(EntityMesh::Vertex(m)) => Some(m.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn edge_mesh(&self, id: MeshId) -> Option<EdgeMesh> {
        match lock(&self.meshes).get(&id) {
            Some(EntityMesh::Edge(m)) => Some(m.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn face_mesh(&self, id: MeshId) -> Option<FaceMesh> {
        match lock(&self.meshes).get(&id) {
            Some(EntityMesh::Face(m)) => Some(m.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn point(&self, index: usize) -> Option<Point3> {
        lock(&self.pool).points.get(index).copied()
    }

    /// Copy of the whole coordinate pool.
    #[must_use]
    pub fn coordinates(&self) -> CoordinatePool {
        lock(&self.pool).clone()
    }

    #[must_use]
    pub fn coordinate_count(&self) -> usize {
        lock(&self.pool).len()
    }

    /// Every face mesh, in registration order.
    #[must_use]
    pub fn face_meshes(&self) -> Vec<FaceMesh> {
        lock(&self.meshes)
            .values()
            .filter_map(|m| match m {
                EntityMesh::Face(f) => Some(f.clone()),
                _ => None,
            })
            .collect()
    }
}
