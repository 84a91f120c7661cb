//! Opt-in timing of the meshing phases.
//!
//! Collection is compiled in only with the `mesh_metrics` feature. Without it
//! every call is a pass-through and [`MeshMetrics::end`] returns `None`.

use serde::Serialize;

/// Pipeline phase a duration is charged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimingBucket {
    /// Vertex and edge welding.
    Join,
    /// Discretisation of the active edges.
    EdgeMesh,
    /// Cutting coordinates, point cloud, classification and scaling.
    Grid,
    ThinZone,
    IsoTriangulate,
}

/// Cumulative nanoseconds per bucket.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MeshTimingReport {
    pub join_ns: u64,
    pub edge_mesh_ns: u64,
    pub grid_ns: u64,
    pub thin_zone_ns: u64,
    pub iso_triangulate_ns: u64,
}

impl MeshTimingReport {
    #[must_use]
    pub fn total_ns(&self) -> u64 {
        self.join_ns
            .saturating_add(self.edge_mesh_ns)
            .saturating_add(self.grid_ns)
            .saturating_add(self.thin_zone_ns)
            .saturating_add(self.iso_triangulate_ns)
    }

    #[must_use]
    pub fn total_ms(&self) -> f64 {
        self.total_ns() as f64 / 1_000_000.0
    }

    /// Adds another report, typically the one of a face meshed on another worker.
    pub fn merge(&mut self, other: &Self) {
        self.join_ns = self.join_ns.saturating_add(other.join_ns);
        self.edge_mesh_ns = self.edge_mesh_ns.saturating_add(other.edge_mesh_ns);
        self.grid_ns = self.grid_ns.saturating_add(other.grid_ns);
        self.thin_zone_ns = self.thin_zone_ns.saturating_add(other.thin_zone_ns);
        self.iso_triangulate_ns = self.iso_triangulate_ns.saturating_add(other.iso_triangulate_ns);
    }

    #[cfg_attr(not(feature = "mesh_metrics"), allow(dead_code))]
    fn slot(&mut self, bucket: TimingBucket) -> &mut u64 {
        match bucket {
            TimingBucket::Join => &mut self.join_ns,
            TimingBucket::EdgeMesh => &mut self.edge_mesh_ns,
            TimingBucket::Grid => &mut self.grid_ns,
            TimingBucket::ThinZone => &mut self.thin_zone_ns,
            TimingBucket::IsoTriangulate => &mut self.iso_triangulate_ns,
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "mesh_metrics")] {
        #[derive(Debug, Default, Clone)]
        pub struct MeshMetrics {
            enabled: bool,
            report: MeshTimingReport,
        }

        impl MeshMetrics {
            #[must_use]
            pub fn new(enabled: bool) -> Self {
                Self { enabled, report: MeshTimingReport::default() }
            }

            pub fn begin(&mut self) {
                self.report = MeshTimingReport::default();
            }

            #[must_use]
            pub fn end(&self) -> Option<MeshTimingReport> {
                self.enabled.then(|| self.report.clone())
            }

            pub fn time<R>(&mut self, bucket: TimingBucket, f: impl FnOnce() -> R) -> R {
                if !self.enabled {
                    return f();
                }
                let start = std::time::Instant::now();
                let result = f();
                let nanos = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
                let slot = self.report.slot(bucket);
                *slot = slot.saturating_add(nanos);
                result
            }

            pub fn absorb(&mut self, other: &Self) {
                self.report.merge(&other.report);
            }
        }
    } else {
        #[derive(Debug, Default, Clone)]
        pub struct MeshMetrics;

        impl MeshMetrics {
            #[must_use]
            pub fn new(_enabled: bool) -> Self {
                Self
            }

            pub fn begin(&mut self) {}

            #[must_use]
            pub fn end(&self) -> Option<MeshTimingReport> {
                None
            }

            pub fn time<R>(&mut self, bucket: TimingBucket, f: impl FnOnce() -> R) -> R {
                let _ = bucket;
                f()
            }

            pub fn absorb(&mut self, _other: &Self) {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_total_and_merge() {
        let mut a = MeshTimingReport { grid_ns: 1000, ..MeshTimingReport::default() };
        let b = MeshTimingReport { join_ns: 2000, iso_triangulate_ns: 3000, ..MeshTimingReport::default() };
        a.merge(&b);
        assert_eq!(a.total_ns(), 6000);
        assert!((a.total_ms() - 0.006).abs() < 1e-9);
        *a.slot(TimingBucket::ThinZone) += 5;
        assert_eq!(a.thin_zone_ns, 5);
    }

    #[test]
    fn time_returns_closure_result() {
        let mut metrics = MeshMetrics::new(true);
        metrics.begin();
        assert_eq!(metrics.time(TimingBucket::Grid, || 42), 42);
        #[cfg(not(feature = "mesh_metrics"))]
        assert!(metrics.end().is_none());
        #[cfg(feature = "mesh_metrics")]
        assert!(metrics.end().is_some());
    }

    #[test]
    fn disabled_metrics_report_nothing() {
        let mut metrics = MeshMetrics::new(false);
        metrics.time(TimingBucket::Join, || ());
        assert!(metrics.end().is_none());
    }
}
