//! Low-pass surface smoothing applied between document decoding and display.
//!
//! Each iteration is a Taubin λ|μ pair: a shrinking Laplacian step with
//! factor `λ` followed by an inflating step with `μ`, where
//! `1/λ + 1/μ = pass_band`. Boundary vertices only move along the boundary
//! and non-manifold vertices stay fixed.

use super::MeshDocument;
use crate::layout::Point3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const LAMBDA: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub enabled: bool,
    pub iterations: u32,
    pub pass_band: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            iterations: 20,
            pass_band: 0.001,
        }
    }
}

impl SmoothingConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Rejects settings that make the μ pass degenerate: the pass band
    /// must lie strictly between zero and 1/λ.
    pub fn validate(&self) -> Result<(), String> {
        let limit = 1.0 / LAMBDA;
        if !(self.pass_band.is_finite() && self.pass_band > 0.0 && self.pass_band < limit) {
            return Err(format!(
                "smoothing.pass_band must be in (0, {limit}), got {}",
                self.pass_band
            ));
        }
        Ok(())
    }

    fn factors(&self) -> (f64, f64) {
        let mu = 1.0 / (self.pass_band - 1.0 / LAMBDA);
        (LAMBDA, mu)
    }
}

enum VertexRole {
    Fixed,
    Free(Vec<u32>),
}

fn classify_vertices(mesh: &MeshDocument) -> Vec<VertexRole> {
    let mut edge_uses: HashMap<(u32, u32), u32> = HashMap::new();
    for polygon in mesh.polygons() {
        if polygon.len() < 2 {
            continue;
        }
        for (i, &a) in polygon.iter().enumerate() {
            let b = polygon[(i + 1) % polygon.len()];
            if a != b {
                *edge_uses.entry((a.min(b), a.max(b))).or_insert(0) += 1;
            }
        }
    }

    let mut interior: Vec<Vec<u32>> = vec![Vec::new(); mesh.number_of_points()];
    let mut boundary: Vec<Vec<u32>> = vec![Vec::new(); mesh.number_of_points()];
    let mut non_manifold = vec![false; mesh.number_of_points()];
    for (&(a, b), &uses) in &edge_uses {
        match uses {
            1 => {
                boundary[a as usize].push(b);
                boundary[b as usize].push(a);
            }
            2 => {
                interior[a as usize].push(b);
                interior[b as usize].push(a);
            }
            _ => {
                non_manifold[a as usize] = true;
                non_manifold[b as usize] = true;
            }
        }
    }

    interior
        .into_iter()
        .zip(boundary)
        .zip(non_manifold)
        .map(|((mut interior, mut boundary), non_manifold)| {
            if non_manifold {
                VertexRole::Fixed
            } else if !boundary.is_empty() {
                boundary.sort_unstable();
                VertexRole::Free(boundary)
            } else if interior.is_empty() {
                VertexRole::Fixed
            } else {
                interior.sort_unstable();
                VertexRole::Free(interior)
            }
        })
        .collect()
}

fn relax(points: &[Point3], roles: &[VertexRole], factor: f64) -> Vec<Point3> {
    points
        .par_iter()
        .zip(roles.par_iter())
        .map(|(point, role)| match role {
            VertexRole::Fixed => *point,
            VertexRole::Free(neighbors) => {
                let count = neighbors.len() as f64;
                let mut centroid = [0.0; 3];
                for &neighbor in neighbors {
                    let other = points[neighbor as usize];
                    for i in 0..3 {
                        centroid[i] += other[i];
                    }
                }
                [0, 1, 2].map(|i| point[i] + factor * (centroid[i] / count - point[i]))
            }
        })
        .collect()
}

/// Smooths point positions in place; connectivity and point arrays are
/// untouched. Results do not depend on the rayon thread count.
pub fn smooth(mesh: &mut MeshDocument, config: &SmoothingConfig) {
    if !config.enabled || config.iterations == 0 || mesh.polygons().is_empty() {
        return;
    }

    let roles = classify_vertices(mesh);
    let (lambda, mu) = config.factors();
    let mut points = mesh.points().to_vec();
    for _ in 0..config.iterations {
        points = relax(&points, &roles, lambda);
        points = relax(&points, &roles, mu);
    }
    mesh.points_mut().copy_from_slice(&points);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pyramid_fan() -> MeshDocument {
        // flat square ring around a raised centre vertex
        let points = vec![
            [0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [2.0, 2.0, 0.0],
            [0.0, 2.0, 0.0],
            [1.0, 1.0, 1.0],
        ];
        let polygons = vec![vec![0, 1, 4], vec![1, 2, 4], vec![2, 3, 4], vec![3, 0, 4]];
        MeshDocument::new(points, polygons).expect("valid fan")
    }

    #[test]
    fn taubin_factors_match_pass_band() {
        let (lambda, mu) = SmoothingConfig::default().factors();
        assert!((1.0 / lambda + 1.0 / mu - 0.001).abs() < 1e-12);
        assert!(mu < -lambda);
    }

    #[test]
    fn pass_band_must_stay_below_inverse_lambda() {
        assert!(SmoothingConfig::default().validate().is_ok());
        for pass_band in [2.0, 1.0 / LAMBDA, 0.0, f64::NAN] {
            let config = SmoothingConfig {
                pass_band,
                ..SmoothingConfig::default()
            };
            assert!(config.validate().is_err(), "{pass_band} accepted");
        }
    }

    #[test]
    fn interior_spike_is_flattened() {
        let mut mesh = pyramid_fan();
        smooth(&mut mesh, &SmoothingConfig::default());
        let apex = mesh.points()[4];
        assert!(apex[2] < 1.0);
        assert!((apex[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn disabled_config_leaves_points() {
        let mut mesh = pyramid_fan();
        let before = mesh.clone();
        smooth(&mut mesh, &SmoothingConfig::disabled());
        assert_eq!(mesh, before);
    }

    #[test]
    fn non_manifold_vertices_stay_fixed() {
        let points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.5],
            [0.0, -1.0, 0.5],
            [0.0, 0.0, 1.0],
        ];
        // edge 0-1 shared by three triangles
        let polygons = vec![vec![0, 1, 2], vec![0, 1, 3], vec![0, 1, 4]];
        let mut mesh = MeshDocument::new(points, polygons).expect("valid mesh");
        smooth(&mut mesh, &SmoothingConfig::default());
        assert_eq!(mesh.points()[0], [0.0, 0.0, 0.0]);
        assert_eq!(mesh.points()[1], [1.0, 0.0, 0.0]);
    }
}
