use serde::{Deserialize, Serialize};

use crate::geom::Tolerance;

/// Which candidate wins when two sub-loops of a cell can be bridged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgePolicy {
    /// The shortest valid segment.
    #[default]
    Shortest,
    /// The valid segment closest to an iso direction.
    MostIso,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("tolerance must be positive and finite, got {0}")]
    Tolerance(f64),
    #[error("max_edge_length must be positive, got {0}")]
    MaxEdgeLength(f64),
    #[error("max_edge_length {max_edge_length} is below the tolerance {tolerance}")]
    EdgeBelowTolerance { max_edge_length: f64, tolerance: f64 },
    #[error("chord_error must be positive, got {0}")]
    ChordError(f64),
    #[error("thin_zone_tolerance must be positive and finite, got {0}")]
    ThinZoneTolerance(f64),
}

fn unbounded() -> f64 {
    f64::INFINITY
}

fn is_unbounded(value: &f64) -> bool {
    value.is_infinite()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MesherConfig {
    /// Geometric tolerance; vertices are welded below twice this value.
    pub tolerance: f64,
    /// Target upper bound on a mesh edge; infinite means unconstrained.
    #[serde(default = "unbounded", skip_serializing_if = "is_unbounded")]
    pub max_edge_length: f64,
    /// Maximal distance between a curve and its chord.
    pub chord_error: f64,
    /// Distance under which two boundary portions form a thin zone. Defaults to
    /// a third of the smallest grid element.
    pub thin_zone_tolerance: Option<f64>,
    pub bridge_policy: BridgePolicy,
    /// Weld only vertices lying on border edges.
    pub join_border_only: bool,
    /// Record phase timings (needs the `mesh_metrics` feature).
    pub collect_timing: bool,
}

impl Default for MesherConfig {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::DEFAULT.eps,
            max_edge_length: f64::INFINITY,
            chord_error: 1e-2,
            thin_zone_tolerance: None,
            bridge_policy: BridgePolicy::Shortest,
            join_border_only: false,
            collect_timing: false,
        }
    }
}

impl MesherConfig {
    #[must_use]
    pub fn with_max_edge_length(mut self, max_edge_length: f64) -> Self {
        self.max_edge_length = max_edge_length;
        self
    }

    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    #[must_use]
    pub fn tolerance(&self) -> Tolerance {
        Tolerance::new(self.tolerance)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ConfigError::Tolerance(self.tolerance));
        }
        if self.max_edge_length.is_nan() || self.max_edge_length <= 0.0 {
            return Err(ConfigError::MaxEdgeLength(self.max_edge_length));
        }
        if self.max_edge_length < self.tolerance {
            return Err(ConfigError::EdgeBelowTolerance {
                max_edge_length: self.max_edge_length,
                tolerance: self.tolerance,
            });
        }
        if self.chord_error.is_nan() || self.chord_error <= 0.0 {
            return Err(ConfigError::ChordError(self.chord_error));
        }
        if let Some(t) = self.thin_zone_tolerance {
            if !(t.is_finite() && t > 0.0) {
                return Err(ConfigError::ThinZoneTolerance(t));
            }
        }
        Ok(())
    }
}
