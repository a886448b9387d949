//! Common mark functions for [`crate::Marker`].
//!
//! Each function takes a tracker and the snapshot being drawn and returns
//! the event position (or a NaN placeholder while the event lies in the
//! future) together with the tracker's custom data row at that snapshot.

use crate::dataset::FieldData;
use crate::error::{Result, TrackError};
use crate::marker::MarkPoint;
use crate::simulation::SNAP_TIME_KEY;
use crate::tracker::Tracker;
use nalgebra::DVector;

/// Time the tracer fell into its host.
pub const INFALL_TIME_KEY: &str = "ifl_t_infall";

/// Position of the tracer at infall.
pub const INFALL_POS_KEY: &str = "ifl_x";

/// Whether the first pericenter has been passed, per snapshot.
pub const PERICENTER_KEY: &str = "oct_had_pericenter";

fn require<'a>(trk: &'a Tracker, key: &str, func: &'static str) -> Result<&'a FieldData> {
    trk.prop(key).map_err(|_| TrackError::MissingMarkerProp {
        func,
        key: key.to_string(),
    })
}

/// Point at `event` if it is known and not after `snap`, else a placeholder.
fn mark(trk: &Tracker, snap: usize, event: Option<usize>) -> Result<MarkPoint> {
    let custom = trk.custom_row(snap)?;
    match event.filter(|&e| snap >= e) {
        Some(e) => Ok(MarkPoint::new(trk.position_at(e)?, custom)),
        None => Ok(MarkPoint::placeholder(trk, custom)),
    }
}

fn check_snap(trk: &Tracker, snap: usize) -> Result<()> {
    if snap >= trk.snapshot_count() {
        return Err(TrackError::IndexOutOfRange {
            index: snap,
            len: trk.snapshot_count(),
        });
    }
    Ok(())
}

/// Position at the first alive snapshot, shown from that snapshot on.
pub fn birth(trk: &Tracker, snap: usize) -> Result<MarkPoint> {
    check_snap(trk, snap)?;
    let first = trk.get_alive().iter().position(|&alive| alive);
    mark(trk, snap, first)
}

/// Position at the last alive snapshot, shown from that snapshot on.
///
/// Never shown for objects alive at the tracker's final snapshot: they did
/// not disappear.
pub fn death(trk: &Tracker, snap: usize) -> Result<MarkPoint> {
    check_snap(trk, snap)?;
    let final_snap = trk.snapshot_count() - 1;
    let last = trk
        .get_alive()
        .iter()
        .rposition(|&alive| alive)
        .filter(|&last| last != final_snap);
    mark(trk, snap, last)
}

/// Recorded infall position, shown once the snapshot time reaches the infall time.
pub fn infall(trk: &Tracker, snap: usize) -> Result<MarkPoint> {
    const FUNC: &str = "infall";
    check_snap(trk, snap)?;
    let scalar = |key: &str| -> Result<f64> {
        require(trk, key, FUNC)?
            .scalar_at(snap)
            .ok_or_else(|| TrackError::shape(format!("'{}' is not a scalar per snapshot", key)))
    };
    let t_infall = scalar(INFALL_TIME_KEY)?;
    let t_snap = scalar(SNAP_TIME_KEY)?;
    let position = require(trk, INFALL_POS_KEY, FUNC)?
        .row_f64(snap)
        .ok_or(TrackError::IndexOutOfRange {
            index: snap,
            len: trk.snapshot_count(),
        })?;

    let custom = trk.custom_row(snap)?;
    if t_infall <= t_snap {
        Ok(MarkPoint::new(DVector::from_vec(position), custom))
    } else {
        Ok(MarkPoint::placeholder(trk, custom))
    }
}

/// Position at the first pericenter passage, held fixed from then on.
pub fn pericenter(trk: &Tracker, snap: usize) -> Result<MarkPoint> {
    check_snap(trk, snap)?;
    let first = require(trk, PERICENTER_KEY, "pericenter")?
        .truthy()
        .iter()
        .position(|&had| had);
    mark(trk, snap, first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use ndarray::{arr1, arr2, Array2};

    fn alive_for(alive: usize, total: usize) -> Tracker {
        let pos = Array2::from_shape_fn((total, 3), |(s, a)| {
            if s < alive {
                (s * 3 + a) as f64
            } else {
                f64::NAN
            }
        });
        Tracker::trajectory(pos, IndexMap::new()).unwrap()
    }

    #[test]
    fn test_death_suppressed_for_survivors() {
        let survivor = alive_for(5, 5);
        assert!(death(&survivor, 4).unwrap().is_placeholder());
    }

    #[test]
    fn test_death_shown_from_last_alive_snapshot() {
        let trk = alive_for(4, 5);
        assert!(death(&trk, 2).unwrap().is_placeholder());
        let point = death(&trk, 3).unwrap();
        assert_eq!(point.position, DVector::from_vec(vec![9.0, 10.0, 11.0]));
        assert_eq!(death(&trk, 4).unwrap().position, point.position);
    }

    #[test]
    fn test_birth_before_and_after() {
        let nan = f64::NAN;
        let pos = arr2(&[[nan, nan], [nan, nan], [1.0, 2.0]]);
        let trk = Tracker::points(pos, IndexMap::new()).unwrap();
        let early = birth(&trk, 1).unwrap();
        assert!(early.is_placeholder());
        assert_eq!(early.position.len(), 2);
        assert_eq!(birth(&trk, 2).unwrap().position, DVector::from_vec(vec![1.0, 2.0]));
    }

    #[test]
    fn test_never_alive_gives_placeholders() {
        let trk = alive_for(0, 3);
        assert!(birth(&trk, 2).unwrap().is_placeholder());
        assert!(death(&trk, 2).unwrap().is_placeholder());
    }

    #[test]
    fn test_infall_requires_properties() {
        let trk = alive_for(3, 3);
        let err = infall(&trk, 0).unwrap_err();
        assert_eq!(
            err,
            TrackError::MissingMarkerProp {
                func: "infall",
                key: INFALL_TIME_KEY.to_string()
            }
        );
        assert_eq!(
            err.to_string(),
            "infall marker requires 'ifl_t_infall' to be stored in tracker data"
        );
    }

    #[test]
    fn test_infall_visible_once_time_reached() {
        let mut props = IndexMap::new();
        props.insert(INFALL_TIME_KEY.to_string(), arr1(&[0.5, 0.5, 0.5]).into());
        props.insert(SNAP_TIME_KEY.to_string(), arr1(&[0.25, 0.5, 0.75]).into());
        props.insert(
            INFALL_POS_KEY.to_string(),
            arr2(&[[0.0, 0.0, 0.0], [7.0, 8.0, 9.0], [7.0, 8.0, 9.0]]).into(),
        );
        let trk = Tracker::trajectory(Array2::zeros((3, 3)), props).unwrap();

        assert!(infall(&trk, 0).unwrap().is_placeholder());
        assert_eq!(
            infall(&trk, 1).unwrap().position,
            DVector::from_vec(vec![7.0, 8.0, 9.0])
        );
    }

    #[test]
    fn test_pericenter_holds_first_position() {
        let mut props = IndexMap::new();
        props.insert(
            PERICENTER_KEY.to_string(),
            arr1(&[false, true, true, true]).into(),
        );
        let pos = Array2::from_shape_fn((4, 3), |(s, _)| s as f64);
        let trk = Tracker::trajectory(pos, props).unwrap();

        assert!(pericenter(&trk, 0).unwrap().is_placeholder());
        assert_eq!(
            pericenter(&trk, 3).unwrap().position,
            DVector::from_vec(vec![1.0, 1.0, 1.0])
        );
        assert!(matches!(
            pericenter(&alive_for(2, 2), 0),
            Err(TrackError::MissingMarkerProp { func: "pericenter", .. })
        ));
    }

    #[test]
    fn test_snapshot_out_of_range() {
        let trk = alive_for(2, 2);
        assert_eq!(
            birth(&trk, 2).unwrap_err(),
            TrackError::IndexOutOfRange { index: 2, len: 2 }
        );
    }
}
