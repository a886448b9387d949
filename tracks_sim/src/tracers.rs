//! Tracer particles for synthetic catalogs.
//!
//! Every halo of a [`SyntheticCatalog`] owns a contiguous block of tracers
//! that follow it while it is alive, scattered within half its radius.

use crate::catalog::{halo_id, SyntheticCatalog};
use crate::error::{SimError, SimResult};
use nalgebra::Vector3;
use ndarray::{Array1, Array2, Array3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::f64::consts::TAU;
use tracing::info;
use tracks_core::marker_funcs::{INFALL_POS_KEY, INFALL_TIME_KEY, PERICENTER_KEY};
use tracks_core::{AxisRole, Columns, Field, Simulation, Vines, NOT_ALIVE};

/// Distance of each tracer from its halo centre.
pub const TRACER_RADIUS_KEY: &str = "tjy_r";

/// Tracer dataset and halo table ready for [`Vines`].
#[derive(Debug, Clone)]
pub struct TracerCatalog {
    sim: Simulation,
    tracers: Columns,
    halos: Columns,
    tracers_per_halo: usize,
    tracer_count: usize,
}

impl TracerCatalog {
    pub fn from_catalog(catalog: &SyntheticCatalog, tracers_per_halo: usize) -> SimResult<Self> {
        if tracers_per_halo == 0 {
            return Err(SimError::config("need at least one tracer per halo"));
        }
        // Separate stream so tracer count never shifts halo trajectories
        let seed = catalog.config().seed.wrapping_mul(0x9e3779b97f4a7c15);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let sim = catalog.simulation().clone();
        let n = sim.snapshot_count();
        let time = sim.time().to_vec();
        let box_size = sim.box_size();
        let nhalos = catalog.halo_count();
        let nptls = nhalos * tracers_per_halo;
        let halo_pos = catalog.positions();
        let halo_radius = catalog.radius();

        let mut pos = Array3::from_elem((nptls, n, 3), NOT_ALIVE);
        let mut dist = Array2::from_elem((nptls, n), NOT_ALIVE);
        let mut t_infall = Array2::from_elem((nptls, n), f64::INFINITY);
        let mut infall_pos = Array3::from_elem((nptls, n, 3), NOT_ALIVE);
        let mut pericenter = Array2::from_elem((nptls, n), false);

        for (h, halo) in catalog.halos().iter().enumerate() {
            for k in 0..tracers_per_halo {
                let p = h * tracers_per_halo + k;
                let axis = random_unit(&mut rng);
                let depth = rng.gen_range(0.05..0.5);
                let spin = rng.gen_range(0.1..0.6);

                let offset_at = |s: usize| -> Vector3<f64> {
                    let r = halo_radius[[s, h]].max(0.0) * depth;
                    let angle = spin * s as f64;
                    let ortho = axis.cross(&Vector3::z()).try_normalize(1e-9).unwrap_or(Vector3::x());
                    (ortho * angle.cos() + axis.cross(&ortho) * angle.sin()) * r
                };
                let place = |s: usize| -> Vector3<f64> {
                    let center = Vector3::new(halo_pos[[s, h, 0]], halo_pos[[s, h, 1]], halo_pos[[s, h, 2]]);
                    (center + offset_at(s)).map(|v| v.rem_euclid(box_size))
                };

                for s in halo.lifetime.clone() {
                    let x = place(s);
                    for a in 0..3 {
                        pos[[p, s, a]] = x[a];
                    }
                    dist[[p, s]] = offset_at(s).norm();
                }
                if let Some(infall) = halo.infall.filter(|&i| halo.is_alive(i)) {
                    let x = place(infall);
                    for s in 0..n {
                        t_infall[[p, s]] = time[infall];
                        pericenter[[p, s]] = s > infall;
                        for a in 0..3 {
                            infall_pos[[p, s, a]] = x[a];
                        }
                    }
                }
            }
        }

        let tracer_axes = || vec![AxisRole::Object, AxisRole::Time];
        let tracer_vec_axes = || vec![AxisRole::Object, AxisRole::Time, AxisRole::Free];
        let tracers = Columns::new()
            .with("tjy_x", Field::new(pos, tracer_vec_axes())?)
            .with(TRACER_RADIUS_KEY, Field::new(dist, tracer_axes())?)
            .with(INFALL_TIME_KEY, Field::new(t_infall, tracer_axes())?)
            .with(INFALL_POS_KEY, Field::new(infall_pos, tracer_vec_axes())?)
            .with(PERICENTER_KEY, Field::new(pericenter, tracer_axes())?);

        let last_ids: Vec<i64> = catalog
            .halos()
            .iter()
            .enumerate()
            .map(|(h, halo)| halo_id(halo.lifetime.end.saturating_sub(1), h))
            .collect();
        let first: Vec<i64> = (0..nhalos).map(|h| (h * tracers_per_halo) as i64).collect();
        let per_halo = |values: Vec<i64>| Field::new(Array1::from(values), vec![AxisRole::Object]);
        let halos = Columns::new()
            .with("id", per_halo(last_ids)?)
            .with("sho_tjy_first", per_halo(first)?)
            .with("sho_tjy_n", per_halo(vec![tracers_per_halo as i64; nhalos])?)
            .with(
                "R200m",
                Field::new(
                    halo_radius.t().to_owned(),
                    vec![AxisRole::Object, AxisRole::Time],
                )?,
            );

        info!("Seeded {} tracers in {} halos", nptls, nhalos);
        Ok(Self {
            sim,
            tracers,
            halos,
            tracers_per_halo,
            tracer_count: nptls,
        })
    }

    pub fn tracers(&self) -> &Columns {
        &self.tracers
    }

    pub fn halos(&self) -> &Columns {
        &self.halos
    }

    pub fn tracers_per_halo(&self) -> usize {
        self.tracers_per_halo
    }

    pub fn tracer_count(&self) -> usize {
        self.tracer_count
    }

    pub fn vines(&self) -> SimResult<Vines> {
        Ok(Vines::new(
            self.tracers.clone().into(),
            self.halos.clone().into(),
            self.sim.clone(),
        )?)
    }
}

fn random_unit(rng: &mut ChaCha8Rng) -> Vector3<f64> {
    let phi = rng.gen_range(0.0..TAU);
    let cos_theta: f64 = rng.gen_range(-1.0..1.0);
    let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
    Vector3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogBuilder, CatalogConfig};
    use approx::assert_relative_eq;
    use tracks_core::SNAP_TIME_KEY;

    fn tracer_catalog() -> (SyntheticCatalog, TracerCatalog) {
        let config = CatalogConfig {
            subhalo_count: 2,
            field_halo_count: 0,
            ..Default::default()
        };
        let catalog = CatalogBuilder::new(config).unwrap().build().unwrap();
        let tracers = TracerCatalog::from_catalog(&catalog, 4).unwrap();
        (catalog, tracers)
    }

    #[test]
    fn test_tracer_blocks_per_halo() {
        let (catalog, tracers) = tracer_catalog();
        assert_eq!(tracers.tracer_count(), catalog.halo_count() * 4);
        let vines = tracers.vines().unwrap();
        assert_eq!(vines.get_halo_ptls(1).unwrap(), vec![4, 5, 6, 7]);
        let last = catalog.halos()[0].lifetime.end - 1;
        assert_eq!(vines.get_idx(halo_id(last, 0)).unwrap(), vec![0]);
    }

    #[test]
    fn test_tracers_alive_with_their_halo() {
        let (catalog, tracers) = tracer_catalog();
        let vines = tracers.vines().unwrap();
        for (h, halo) in catalog.halos().iter().enumerate() {
            let alive = vines.get_alive(h * 4).unwrap();
            let expected: Vec<bool> = (0..alive.len()).map(|s| halo.is_alive(s)).collect();
            assert_eq!(alive, expected);
        }
    }

    #[test]
    fn test_halo_tracks_and_sphere() {
        let (catalog, tracers) = tracer_catalog();
        let vines = tracers.vines().unwrap();
        let tracks = vines.create_halo_tracks(0, None).unwrap();
        assert_eq!(tracks.len(), 4);
        assert!(tracks.iter().all(|t| t.has_prop(SNAP_TIME_KEY)));

        let sphere = vines.create_host_sphere(0).unwrap();
        let last = catalog.simulation().snapshot_count() - 1;
        assert_relative_eq!(
            sphere.prop("R200m").unwrap().scalar_at(last).unwrap(),
            catalog.radius()[[last, 0]]
        );
    }

    #[test]
    fn test_zero_tracers_rejected() {
        let (catalog, _) = tracer_catalog();
        assert!(matches!(
            TracerCatalog::from_catalog(&catalog, 0),
            Err(SimError::Config(_))
        ));
    }
}
