//! Synthetic halo catalogs with a known merger tree.
//!
//! A catalog holds one host halo, subhalos falling into it, optional
//! sub-subhalos falling into those subhalos, and unrelated field halos.
//! Every halo has a contiguous lifetime; outside it the catalog carries the
//! usual sentinels (`-1` IDs and host pointers, `-1` position rows).
//!
//! All randomness comes from one seeded `ChaCha8Rng`, so a config always
//! yields the same catalog.

use crate::error::{SimError, SimResult};
use nalgebra::Vector3;
use ndarray::{Array2, Array3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::ops::Range;
use tracing::{debug, info};
use tracks_core::marker_funcs::{INFALL_POS_KEY, INFALL_TIME_KEY, PERICENTER_KEY};
use tracks_core::{
    AxisRole, Bush, Dataset, Records, Simulation, Storage, Tree, NOT_ALIVE, SNAP_TIME_KEY,
};

/// Halo IDs are `(snapshot + 1) * ID_STRIDE + halo index`.
pub const ID_STRIDE: i64 = 100_000;

/// Host pointer of halos without a host, and ID of halos not alive.
pub const NO_ID: i64 = -1;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Parameters of a synthetic catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Master seed
    pub seed: u64,

    /// Number of snapshots (at least 4)
    pub snapshot_count: usize,

    /// Side length of the periodic box
    pub box_size: f64,

    /// Host position at snapshot 0
    pub host_center: [f64; 3],

    /// Host displacement per snapshot
    pub host_drift: [f64; 3],

    /// Host radius at the final snapshot
    pub host_radius: f64,

    /// Subhalos falling into the host
    pub subhalo_count: usize,

    /// Sub-subhalos falling into each subhalo
    pub subsubhalo_count: usize,

    /// Halos never bound to the host
    pub field_halo_count: usize,

    /// Probability that a subhalo is disrupted before the final snapshot
    pub disruption_fraction: f64,

    /// Standard deviation of the Gaussian position jitter
    pub position_noise: f64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            snapshot_count: 20,
            box_size: 100.0,
            host_center: [50.0, 50.0, 50.0],
            host_drift: [0.0, 0.0, 0.0],
            host_radius: 1.0,
            subhalo_count: 3,
            subsubhalo_count: 0,
            field_halo_count: 2,
            disruption_fraction: 0.5,
            position_noise: 0.02,
        }
    }
}

impl CatalogConfig {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Total number of halos in the catalog.
    pub fn halo_count(&self) -> usize {
        1 + self.subhalo_count * (1 + self.subsubhalo_count) + self.field_halo_count
    }

    fn validate(&self) -> SimResult<()> {
        if self.snapshot_count < 4 {
            return Err(SimError::config(format!(
                "need at least 4 snapshots, got {}",
                self.snapshot_count
            )));
        }
        if !(self.box_size > 0.0) {
            return Err(SimError::config("box size must be positive"));
        }
        if !(0.0..=1.0).contains(&self.disruption_fraction) {
            return Err(SimError::config("disruption fraction must lie in [0, 1]"));
        }
        if !(self.position_noise >= 0.0) {
            return Err(SimError::config(format!(
                "position noise must be non-negative, got {}",
                self.position_noise
            )));
        }
        if self.halo_count() as i64 >= ID_STRIDE {
            return Err(SimError::config(format!(
                "{} halos exceed the ID stride",
                self.halo_count()
            )));
        }
        Ok(())
    }
}

// ============================================================================
// HALO HISTORIES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaloRole {
    Host,
    Subhalo,
    SubSubhalo,
    Field,
}

/// Ground truth for one halo.
#[derive(Debug, Clone, PartialEq)]
pub struct HaloHistory {
    pub role: HaloRole,

    /// Index of the halo it falls into
    pub host: Option<usize>,

    /// Snapshots during which the halo is alive
    pub lifetime: Range<usize>,

    /// First snapshot at which it points at its host
    pub infall: Option<usize>,
}

impl HaloHistory {
    pub fn is_alive(&self, snap: usize) -> bool {
        self.lifetime.contains(&snap)
    }

    /// Whether the host pointer is set at `snap`.
    pub fn is_bound(&self, snap: usize) -> bool {
        self.is_alive(snap) && self.infall.map_or(false, |i| snap >= i)
    }
}

/// ID of halo `halo` at snapshot `snap`, ignoring liveness.
pub fn halo_id(snap: usize, halo: usize) -> i64 {
    (snap as i64 + 1) * ID_STRIDE + halo as i64
}

// ============================================================================
// CATALOG
// ============================================================================

/// A generated catalog and the merger tree it was built from.
#[derive(Debug, Clone)]
pub struct SyntheticCatalog {
    config: CatalogConfig,
    sim: Simulation,
    halos: Vec<HaloHistory>,

    /// [snapshot, halo, 3] with NOT_ALIVE rows outside lifetimes
    positions: Array3<f64>,

    /// [snapshot, halo] with NOT_ALIVE outside lifetimes
    radius: Array2<f64>,

    records: Records,
}

impl SyntheticCatalog {
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    pub fn halos(&self) -> &[HaloHistory] {
        &self.halos
    }

    pub fn halo_count(&self) -> usize {
        self.halos.len()
    }

    /// Index of the main host.
    pub fn host_index(&self) -> usize {
        0
    }

    pub fn positions(&self) -> &Array3<f64> {
        &self.positions
    }

    pub fn radius(&self) -> &Array2<f64> {
        &self.radius
    }

    pub fn records(&self) -> &Records {
        &self.records
    }

    pub fn dataset(&self) -> Dataset {
        Dataset::Records(self.records.clone())
    }

    pub fn storage(&self) -> SimResult<Storage> {
        Ok(Storage::new(self.dataset(), self.sim.clone())?)
    }

    pub fn tree(&self) -> SimResult<Tree> {
        Ok(Tree::from_storage(self.storage()?))
    }

    pub fn bush(&self) -> SimResult<Bush> {
        Ok(Bush::from_storage(self.storage()?))
    }

    /// Direct progenitors of `halo`, ascending.
    pub fn expected_progenitors(&self, halo: usize) -> Vec<usize> {
        self.halos
            .iter()
            .enumerate()
            .filter(|(_, h)| h.host == Some(halo))
            .map(|(i, _)| i)
            .collect()
    }

    /// Pre-order walk of the progenitor tree below `root`, `depth` levels deep.
    pub fn expected_traversal(&self, root: usize, depth: usize) -> Vec<(usize, usize)> {
        let mut order = Vec::new();
        let mut stack = vec![(root, 0)];
        while let Some((halo, level)) = stack.pop() {
            order.push((halo, level));
            if level < depth {
                let progs = self.expected_progenitors(halo);
                stack.extend(progs.into_iter().rev().map(|p| (p, level + 1)));
            }
        }
        order
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Generates a [`SyntheticCatalog`] from a [`CatalogConfig`].
pub struct CatalogBuilder {
    config: CatalogConfig,
    rng: ChaCha8Rng,
    noise: Normal<f64>,
}

impl CatalogBuilder {
    pub fn new(config: CatalogConfig) -> SimResult<Self> {
        config.validate()?;
        let noise = Normal::new(0.0, config.position_noise)
            .map_err(|e| SimError::config(format!("position noise: {}", e)))?;
        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            noise,
        })
    }

    pub fn build(mut self) -> SimResult<SyntheticCatalog> {
        let n = self.config.snapshot_count;
        let time: Vec<f64> = (0..n).map(|s| (s + 1) as f64 / n as f64).collect();
        let sim = Simulation::new(self.config.box_size, time.clone());

        let halos = self.histories();
        let nhalos = halos.len();
        let (raw_pos, raw_radius) = self.paths(&halos);

        let mut positions = Array3::from_elem((n, nhalos, 3), NOT_ALIVE);
        let mut radius = Array2::from_elem((n, nhalos), NOT_ALIVE);
        let mut ids = Array2::from_elem((n, nhalos), NO_ID);
        let mut parents = Array2::from_elem((n, nhalos), NO_ID);
        let mut alive = Array2::from_elem((n, nhalos), false);
        let mut t_infall = Array2::from_elem((n, nhalos), f64::INFINITY);
        let mut infall_pos = Array3::from_elem((n, nhalos, 3), NOT_ALIVE);
        let mut pericenter = Array2::from_elem((n, nhalos), false);
        let snap_t = Array2::from_shape_fn((n, nhalos), |(s, _)| time[s]);

        for (h, halo) in halos.iter().enumerate() {
            for s in halo.lifetime.clone() {
                alive[[s, h]] = true;
                ids[[s, h]] = halo_id(s, h);
                radius[[s, h]] = raw_radius[[s, h]];
                for a in 0..3 {
                    positions[[s, h, a]] = raw_pos[[s, h, a]];
                }
                if let Some(host) = halo.host.filter(|_| halo.is_bound(s)) {
                    parents[[s, h]] = halo_id(s, host);
                }
            }
            if let Some(infall) = halo.infall {
                for s in 0..n {
                    t_infall[[s, h]] = time[infall];
                    pericenter[[s, h]] = s > infall;
                    for a in 0..3 {
                        infall_pos[[s, h, a]] = raw_pos[[infall, h, a]];
                    }
                }
            }
        }

        let records = Records::new(vec![n, nhalos], vec![AxisRole::Time, AxisRole::Object])?
            .with("id", ids)?
            .with("parent_id_cat", parents)?
            .with("mask_alive", alive)?
            .with("x", positions.clone())?
            .with("R200m", radius.clone())?
            .with(SNAP_TIME_KEY, snap_t)?
            .with(INFALL_TIME_KEY, t_infall)?
            .with(INFALL_POS_KEY, infall_pos)?
            .with(PERICENTER_KEY, pericenter)?;

        info!(
            "Built catalog with {} halos over {} snapshots (seed {})",
            nhalos, n, self.config.seed
        );
        Ok(SyntheticCatalog {
            config: self.config,
            sim,
            halos,
            positions,
            radius,
            records,
        })
    }

    /// Lifetimes and host links. Order: host, subhalos, sub-subhalos, field halos.
    fn histories(&mut self) -> Vec<HaloHistory> {
        let n = self.config.snapshot_count;
        let mut halos = vec![HaloHistory {
            role: HaloRole::Host,
            host: None,
            lifetime: 0..n,
            infall: None,
        }];

        for _ in 0..self.config.subhalo_count {
            let birth = self.rng.gen_range(0..(n / 4).max(1));
            let infall = self.rng.gen_range(birth + 1..n - 1);
            let end = if self.rng.gen_bool(self.config.disruption_fraction) {
                self.rng.gen_range(infall + 1..n)
            } else {
                n
            };
            halos.push(HaloHistory {
                role: HaloRole::Subhalo,
                host: Some(0),
                lifetime: birth..end,
                infall: Some(infall),
            });
        }

        let subhalos: Vec<(usize, Range<usize>)> = halos
            .iter()
            .enumerate()
            .filter(|(_, h)| h.role == HaloRole::Subhalo)
            .map(|(i, h)| (i, h.lifetime.clone()))
            .collect();
        for (sub, life) in subhalos {
            for _ in 0..self.config.subsubhalo_count {
                let infall = self.rng.gen_range(life.start + 1..life.end);
                let birth = self.rng.gen_range(0..infall);
                halos.push(HaloHistory {
                    role: HaloRole::SubSubhalo,
                    host: Some(sub),
                    // Disrupted together with their host
                    lifetime: birth..life.end,
                    infall: Some(infall),
                });
            }
        }

        for _ in 0..self.config.field_halo_count {
            let birth = self.rng.gen_range(0..n / 2);
            halos.push(HaloHistory {
                role: HaloRole::Field,
                host: None,
                lifetime: birth..n,
                infall: None,
            });
        }
        debug!("Generated {} halo histories", halos.len());
        halos
    }

    /// Positions and radii of every halo at every snapshot, ignoring lifetimes.
    fn paths(&mut self, halos: &[HaloHistory]) -> (Array3<f64>, Array2<f64>) {
        let n = self.config.snapshot_count;
        let box_size = self.config.box_size;
        let r_host = self.config.host_radius;
        let mut centers: Vec<Vec<Vector3<f64>>> = Vec::with_capacity(halos.len());
        let mut radius = Array2::zeros((n, halos.len()));

        let start = Vector3::from(self.config.host_center);
        let drift = Vector3::from(self.config.host_drift);

        for (h, halo) in halos.iter().enumerate() {
            let path: Vec<Vector3<f64>> = match (halo.role, halo.host) {
                (HaloRole::Host, _) => {
                    for s in 0..n {
                        radius[[s, h]] = r_host * (0.5 + 0.5 * (s + 1) as f64 / n as f64);
                    }
                    (0..n).map(|s| start + drift * s as f64).collect()
                }
                (HaloRole::Field, _) => {
                    let origin = Vector3::from_fn(|_, _| self.rng.gen_range(0.0..box_size));
                    let velocity = Vector3::from_fn(|_, _| self.rng.gen_range(-0.5..0.5));
                    let r = r_host * self.rng.gen_range(0.3..0.8);
                    for s in 0..n {
                        radius[[s, h]] = r;
                    }
                    (0..n).map(|s| origin + velocity * s as f64).collect()
                }
                (_, Some(host)) => {
                    let infall = halo.infall.unwrap_or(halo.lifetime.start);
                    let scale = radius[[n - 1, host]];
                    let r0 = scale * self.rng.gen_range(0.25..0.6);
                    for s in 0..n {
                        let shrink = if s > infall { 0.9f64.powi((s - infall) as i32) } else { 1.0 };
                        radius[[s, h]] = r0 * shrink;
                    }
                    let orbit = self.orbit(halo, scale);
                    (0..n).map(|s| centers[host][s] + orbit[s]).collect()
                }
                (_, None) => vec![start; n],
            };
            centers.push(path);
        }

        let mut positions = Array3::zeros((n, halos.len(), 3));
        for (h, path) in centers.iter().enumerate() {
            for (s, center) in path.iter().enumerate() {
                for a in 0..3 {
                    let jitter = self.noise.sample(&mut self.rng);
                    positions[[s, h, a]] = (center[a] + jitter).rem_euclid(box_size);
                }
            }
        }
        (positions, radius)
    }

    /// Offsets from the host: an inward spiral reaching `scale` at infall,
    /// then decaying inside the host.
    fn orbit(&mut self, halo: &HaloHistory, scale: f64) -> Vec<Vector3<f64>> {
        let n = self.config.snapshot_count;
        let phase = self.rng.gen_range(0.0..TAU);
        let tilt = self.rng.gen_range(-0.3..0.3);
        let d0 = scale * self.rng.gen_range(4.0..6.0);
        let birth = halo.lifetime.start;
        let infall = halo.infall.unwrap_or(birth).max(birth + 1);

        (0..n)
            .map(|s| {
                let r = if s <= birth {
                    d0
                } else if s < infall {
                    d0 + (scale - d0) * (s - birth) as f64 / (infall - birth) as f64
                } else {
                    scale * 0.8f64.powi((s - infall) as i32)
                };
                let angle = phase + 0.5 * s as f64;
                Vector3::new(angle.cos(), angle.sin(), tilt * angle.sin()) * r
            })
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
