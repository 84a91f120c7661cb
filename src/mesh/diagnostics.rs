//! Counters describing the outcome of meshing a face or a batch of faces.
//!
//! ```ignore
//! let report = Mesher::new(config).mesh_body(&mut arena, body);
//! if !report.diagnostics.is_clean() {
//!     for warning in &report.diagnostics.warnings {
//!         eprintln!("warning: {warning}");
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct MeshDiagnostics {
    /// Distinct coordinates referenced by the triangles.
    pub vertex_count: usize,

    pub triangle_count: usize,

    /// Triangle edges used by exactly one triangle. On a single face these are
    /// the sampled boundary loops.
    pub boundary_edge_count: usize,

    /// Triangle edges shared by more than two triangles.
    pub non_manifold_edge_count: usize,

    /// Faces abandoned because a projected loop crosses itself.
    pub self_intersection_failures: usize,

    /// Candidate bridging segments refused by an intersection check.
    pub rejected_segments: usize,

    /// Segment cycles that could not be tessellated and were skipped.
    pub abandoned_cycles: usize,

    /// Flat triangles the ear clipper could not avoid.
    pub degenerate_triangles: usize,

    /// Faces that failed for any reason, self-intersections included.
    pub failed_faces: usize,

    pub warnings: Vec<String>,
}

impl MeshDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts vertices and classifies edges of a triangle list by multiplicity.
    #[must_use]
    pub fn from_triangles(triangles: &[[usize; 3]]) -> Self {
        let mut edges: HashMap<(usize, usize), usize> = HashMap::new();
        let mut vertices: Vec<usize> = Vec::with_capacity(triangles.len() * 3);
        for t in triangles {
            vertices.extend_from_slice(t);
            for k in 0..3 {
                let (a, b) = (t[k], t[(k + 1) % 3]);
                *edges.entry((a.min(b), a.max(b))).or_insert(0) += 1;
            }
        }
        vertices.sort_unstable();
        vertices.dedup();
        Self {
            vertex_count: vertices.len(),
            triangle_count: triangles.len(),
            boundary_edge_count: edges.values().filter(|c| **c == 1).count(),
            non_manifold_edge_count: edges.values().filter(|c| **c > 2).count(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_watertight(&self) -> bool {
        self.boundary_edge_count == 0
    }

    #[must_use]
    pub fn is_manifold(&self) -> bool {
        self.non_manifold_edge_count == 0
    }

    /// No failure, no abandoned cycle, no flat triangle, no non-manifold
    /// edge and no warning.
    /// Boundary edges and rejected candidates are normal on open faces.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.non_manifold_edge_count == 0
            && self.self_intersection_failures == 0
            && self.abandoned_cycles == 0
            && self.degenerate_triangles == 0
            && self.failed_faces == 0
            && self.warnings.is_empty()
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Sums counts and appends warnings.
    pub fn merge(&mut self, other: &MeshDiagnostics) {
        self.vertex_count += other.vertex_count;
        self.triangle_count += other.triangle_count;
        self.boundary_edge_count += other.boundary_edge_count;
        self.non_manifold_edge_count += other.non_manifold_edge_count;
        self.self_intersection_failures += other.self_intersection_failures;
        self.rejected_segments += other.rejected_segments;
        self.abandoned_cycles += other.abandoned_cycles;
        self.degenerate_triangles += other.degenerate_triangles;
        self.failed_faces += other.failed_faces;
        self.warnings.extend(other.warnings.iter().cloned());
    }

    /// Format: `"V:{vertices} T:{triangles} [issues...]"`
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("V:{} T:{}", self.vertex_count, self.triangle_count)];
        if self.boundary_edge_count > 0 {
            parts.push(format!("boundary:{}", self.boundary_edge_count));
        }
        if self.non_manifold_edge_count > 0 {
            parts.push(format!("non-manifold:{}", self.non_manifold_edge_count));
        }
        if self.self_intersection_failures > 0 {
            parts.push(format!("self-intersect:{}", self.self_intersection_failures));
        }
        if self.abandoned_cycles > 0 {
            parts.push(format!("abandoned:{}", self.abandoned_cycles));
        }
        if self.degenerate_triangles > 0 {
            parts.push(format!("flat:{}", self.degenerate_triangles));
        }
        if self.failed_faces > 0 {
            parts.push(format!("failed:{}", self.failed_faces));
        }
        parts.join(" ")
    }
}

impl fmt::Display for MeshDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mesh Diagnostics:")?;
        writeln!(f, "  Vertices: {}", self.vertex_count)?;
        writeln!(f, "  Triangles: {}", self.triangle_count)?;
        writeln!(f, "  Boundary edges: {}", self.boundary_edge_count)?;

        if self.non_manifold_edge_count > 0 || self.self_intersection_failures > 0 || self.failed_faces > 0 {
            writeln!(f, "  Issues:")?;
            if self.non_manifold_edge_count > 0 {
                writeln!(f, "    - Non-manifold edges: {}", self.non_manifold_edge_count)?;
            }
            if self.self_intersection_failures > 0 {
                writeln!(f, "    - Self-intersecting faces: {}", self.self_intersection_failures)?;
            }
            if self.failed_faces > 0 {
                writeln!(f, "    - Failed faces: {}", self.failed_faces)?;
            }
        }
        if self.rejected_segments > 0 || self.abandoned_cycles > 0 || self.degenerate_triangles > 0 {
            writeln!(f, "  Triangulation:")?;
            writeln!(f, "    - Rejected segments: {}", self.rejected_segments)?;
            writeln!(f, "    - Abandoned cycles: {}", self.abandoned_cycles)?;
            writeln!(f, "    - Flat triangles: {}", self.degenerate_triangles)?;
        }
        if !self.warnings.is_empty() {
            writeln!(f, "  Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "    - {warning}")?;
            }
        }
        let status = if self.is_clean() { "CLEAN" } else { "ISSUES DETECTED" };
        writeln!(f, "  Status: {status}")
    }
}
