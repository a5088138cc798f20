//! Capture histories, release cohorts, and their parameter index matrices.
//!
//! Purpose
//! -------
//! Hold the validated, immutable inputs of the forward likelihood
//! ([`CaptureData`]) and of the simulator ([`CohortData`]): occasion
//! layout, per-row release information, per-state PIMs, and the
//! trap-dependence configuration.
//!
//! Key behaviors
//! -------------
//! - Constructors check shapes, detection codes and release occasions;
//!   `check_shapes` re-runs those checks since the fields are public.
//! - `validate` repeats the shape checks, then checks every PIM entry and
//!   psi group against the lengths of the probability vectors the link
//!   stage will produce; the recursions then index without bounds handling.
//!
//! Invariants & assumptions
//! ------------------------
//! - Columns are occasions `0..n_occ`; the ocean occasion is `n_ds_occ`.
//! - Column `n_ds_occ` of a detection vector is the first post-ocean
//!   observation (it is read one step behind survival).
//! - Unknown-life-history rows stop after the downstream phase; their
//!   post-ocean columns are ignored.
//!
//! Conventions
//! -----------
//! - `StatePims::phi[k]` / `StatePims::p[k]` serve live state `k + 1`.
//!   Downstream and ocean occasions only read state 1.
use ndarray::{Array1, Array2};

use crate::model::errors::{ModelError, ModelResult};

/// Number of downstream occasions and total occasions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccasionLayout {
    pub n_occ: usize,
    pub n_ds_occ: usize,
}

impl OccasionLayout {
    /// # Errors
    /// [`ModelError::InvalidOccasionLayout`] unless `n_occ > n_ds_occ`.
    pub fn new(n_occ: usize, n_ds_occ: usize) -> ModelResult<Self> {
        if n_occ <= n_ds_occ {
            return Err(ModelError::InvalidOccasionLayout {
                n_occ,
                n_ds_occ,
                reason: "at least one post-ocean occasion is required",
            });
        }
        Ok(Self { n_occ, n_ds_occ })
    }

    pub fn ocean_occasion(&self) -> usize {
        self.n_ds_occ
    }

    /// Columns of the state-2 / state-3 tables: ocean occasion onward.
    pub fn n_post_ocean(&self) -> usize {
        self.n_occ - self.n_ds_occ
    }
}

/// Whether a release group's juvenile life history is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifeHistory {
    Known,
    Unknown,
}

/// One unique detection pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureHistory {
    /// One code per occasion (see module docs).
    pub detections: Array1<u8>,
    /// Number of individuals sharing the pattern.
    pub frequency: u32,
    pub release_occasion: usize,
    /// Row of the psi table used at the ocean occasion.
    pub psi_group: usize,
    pub life_history: LifeHistory,
}

/// Survival and detection PIMs, one matrix per live state.
#[derive(Debug, Clone, PartialEq)]
pub struct StatePims {
    pub phi: [Array2<usize>; 3],
    pub p: [Array2<usize>; 3],
}

impl StatePims {
    /// Same index matrix for every state.
    pub fn uniform(phi: Array2<usize>, p: Array2<usize>) -> Self {
        Self {
            phi: [phi.clone(), phi.clone(), phi],
            p: [p.clone(), p.clone(), p],
        }
    }

    fn check_shape(&self, rows: usize, n_occ: usize) -> ModelResult<()> {
        for (family, mats) in [("phi", &self.phi), ("p", &self.p)] {
            for (state, m) in mats.iter().enumerate() {
                if m.dim() != (rows, n_occ) {
                    return Err(ModelError::PimShapeMismatch {
                        family,
                        state,
                        expected: (rows, n_occ),
                        found: m.dim(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_indices(&self, n_phi: usize, n_p: usize) -> ModelResult<()> {
        for (family, mats, len) in [("phi", &self.phi, n_phi), ("p", &self.p, n_p)] {
            for (state, m) in mats.iter().enumerate() {
                if let Some(((row, occasion), &index)) =
                    m.indexed_iter().find(|(_, idx)| **idx >= len)
                {
                    return Err(ModelError::PimIndexOutOfBounds {
                        family,
                        state,
                        row,
                        occasion,
                        index,
                        len,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Capture histories plus their PIMs.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureData {
    pub layout: OccasionLayout,
    pub histories: Vec<CaptureHistory>,
    pub pims: StatePims,
}

impl CaptureData {
    /// Validated constructor.
    ///
    /// Errors
    /// ------
    /// - [`ModelError::EmptyData`] for no histories.
    /// - [`ModelError::HistoryLengthMismatch`] /
    ///   [`ModelError::InvalidDetectionCode`] /
    ///   [`ModelError::InvalidReleaseOccasion`] for malformed histories.
    /// - [`ModelError::PimShapeMismatch`] for PIMs not shaped
    ///   `(n_histories, n_occ)`.
    pub fn new(
        layout: OccasionLayout, histories: Vec<CaptureHistory>, pims: StatePims,
    ) -> ModelResult<Self> {
        let data = Self { layout, histories, pims };
        data.check_shapes()?;
        Ok(data)
    }

    pub fn n_histories(&self) -> usize {
        self.histories.len()
    }

    /// Number of individuals: the summed history frequencies.
    pub fn total_frequency(&self) -> u64 {
        self.histories.iter().map(|h| u64::from(h.frequency)).sum()
    }

    /// Re-run the constructor's layout, history and PIM shape checks.
    ///
    /// # Errors
    /// As [`new`](Self::new).
    pub fn check_shapes(&self) -> ModelResult<()> {
        check_layout(self.layout)?;
        if self.histories.is_empty() {
            return Err(ModelError::EmptyData { what: "capture histories" });
        }
        for (h, history) in self.histories.iter().enumerate() {
            check_history(h, history, self.layout)?;
        }
        self.pims.check_shape(self.histories.len(), self.layout.n_occ)
    }

    /// Shape checks, then PIM entries and psi groups against
    /// probability-vector lengths.
    ///
    /// # Errors
    /// Any [`check_shapes`](Self::check_shapes) error, then
    /// [`ModelError::PimIndexOutOfBounds`] / [`ModelError::PsiGroupOutOfBounds`].
    pub fn validate(&self, n_phi: usize, n_p: usize, n_groups: usize) -> ModelResult<()> {
        self.check_shapes()?;
        self.pims.check_indices(n_phi, n_p)?;
        check_groups(self.histories.iter().map(|h| h.psi_group), n_groups)
    }
}

/// A release group for simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct Cohort {
    pub release_count: u64,
    pub release_occasion: usize,
    pub psi_group: usize,
    pub life_history: LifeHistory,
}

/// Downstream occasion at which detection depends on detection at the
/// occasion before it.
#[derive(Debug, Clone, PartialEq)]
pub struct TrapOccasion {
    pub occasion: usize,
    /// Per cohort: index into `p` for fish detected at `occasion − 1`.
    pub detected_p_index: Array1<usize>,
}

/// At most two trap-dependent occasions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrapDependence {
    occasions: Vec<TrapOccasion>,
}

impl TrapDependence {
    pub const MAX_OCCASIONS: usize = 2;

    /// # Errors
    /// [`ModelError::InvalidTrapDependence`] for more than two occasions or
    /// a repeated occasion.
    pub fn new(occasions: Vec<TrapOccasion>) -> ModelResult<Self> {
        if let Some(extra) = occasions.get(Self::MAX_OCCASIONS) {
            return Err(ModelError::InvalidTrapDependence {
                occasion: extra.occasion,
                reason: "at most two trap-dependent occasions are supported",
            });
        }
        if let [a, b] = occasions.as_slice() {
            if a.occasion == b.occasion {
                return Err(ModelError::InvalidTrapDependence {
                    occasion: a.occasion,
                    reason: "trap-dependent occasions must be distinct",
                });
            }
        }
        Ok(Self { occasions })
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn occasions(&self) -> &[TrapOccasion] {
        &self.occasions
    }

    /// Trap configuration at `occasion`, if any.
    pub fn at(&self, occasion: usize) -> Option<&TrapOccasion> {
        self.occasions.iter().find(|td| td.occasion == occasion)
    }
}

/// Release cohorts plus their PIMs and trap dependence.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortData {
    pub layout: OccasionLayout,
    pub cohorts: Vec<Cohort>,
    pub pims: StatePims,
    pub trap_dependence: TrapDependence,
}

impl CohortData {
    /// Validated constructor.
    ///
    /// Errors
    /// ------
    /// - [`ModelError::EmptyData`] for no cohorts.
    /// - [`ModelError::InvalidReleaseOccasion`] for releases after the ocean
    ///   occasion.
    /// - [`ModelError::PimShapeMismatch`] for PIMs not shaped
    ///   `(n_cohorts, n_occ)`.
    /// - [`ModelError::InvalidTrapDependence`] for a trap occasion outside
    ///   the downstream phase, at occasion 0, or with a per-cohort index
    ///   vector of the wrong length.
    pub fn new(
        layout: OccasionLayout, cohorts: Vec<Cohort>, pims: StatePims,
        trap_dependence: TrapDependence,
    ) -> ModelResult<Self> {
        let data = Self { layout, cohorts, pims, trap_dependence };
        data.check_shapes()?;
        Ok(data)
    }

    pub fn n_cohorts(&self) -> usize {
        self.cohorts.len()
    }

    /// Re-run the constructor's layout, cohort, PIM and trap checks.
    ///
    /// # Errors
    /// As [`new`](Self::new).
    pub fn check_shapes(&self) -> ModelResult<()> {
        let layout = self.layout;
        check_layout(layout)?;
        if self.cohorts.is_empty() {
            return Err(ModelError::EmptyData { what: "release cohorts" });
        }
        for (index, cohort) in self.cohorts.iter().enumerate() {
            if cohort.release_occasion > layout.n_ds_occ {
                return Err(ModelError::InvalidReleaseOccasion {
                    index,
                    release_occasion: cohort.release_occasion,
                    n_ds_occ: layout.n_ds_occ,
                });
            }
        }
        self.pims.check_shape(self.cohorts.len(), layout.n_occ)?;
        for td in self.trap_dependence.occasions() {
            if td.occasion == 0 || td.occasion >= layout.n_ds_occ {
                return Err(ModelError::InvalidTrapDependence {
                    occasion: td.occasion,
                    reason: "must be a downstream occasion with a preceding occasion",
                });
            }
            if td.detected_p_index.len() != self.cohorts.len() {
                return Err(ModelError::InvalidTrapDependence {
                    occasion: td.occasion,
                    reason: "needs one detected-at-previous p index per cohort",
                });
            }
        }
        Ok(())
    }

    /// Shape checks, then PIM entries, trap indices and psi groups against
    /// probability-vector lengths.
    pub fn validate(&self, n_phi: usize, n_p: usize, n_groups: usize) -> ModelResult<()> {
        self.check_shapes()?;
        self.pims.check_indices(n_phi, n_p)?;
        for td in self.trap_dependence.occasions() {
            if let Some((row, &index)) =
                td.detected_p_index.iter().enumerate().find(|(_, idx)| **idx >= n_p)
            {
                return Err(ModelError::PimIndexOutOfBounds {
                    family: "trap-dependent p",
                    state: 0,
                    row,
                    occasion: td.occasion,
                    index,
                    len: n_p,
                });
            }
        }
        check_groups(self.cohorts.iter().map(|c| c.psi_group), n_groups)
    }
}

// ---- Helper methods ----

fn check_layout(layout: OccasionLayout) -> ModelResult<()> {
    OccasionLayout::new(layout.n_occ, layout.n_ds_occ).map(|_| ())
}

fn check_history(h: usize, history: &CaptureHistory, layout: OccasionLayout) -> ModelResult<()> {
    if history.detections.len() != layout.n_occ {
        return Err(ModelError::HistoryLengthMismatch {
            history: h,
            expected: layout.n_occ,
            found: history.detections.len(),
        });
    }
    if history.release_occasion > layout.n_ds_occ {
        return Err(ModelError::InvalidReleaseOccasion {
            index: h,
            release_occasion: history.release_occasion,
            n_ds_occ: layout.n_ds_occ,
        });
    }
    for (occasion, &code) in history.detections.iter().enumerate() {
        let max_code = if occasion < layout.n_ds_occ { 1 } else { 3 };
        if code > max_code {
            return Err(ModelError::InvalidDetectionCode { history: h, occasion, code });
        }
    }
    Ok(())
}

fn check_groups(groups: impl Iterator<Item = usize>, n_groups: usize) -> ModelResult<()> {
    for (index, group) in groups.enumerate() {
        if group >= n_groups {
            return Err(ModelError::PsiGroupOutOfBounds { index, group, n_groups });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Occasion layout arithmetic and rejection.
    // - Capture-history validation (length, codes, release occasion).
    // - PIM shape and index checks.
    // - Trap-dependence configuration limits.
    // -------------------------------------------------------------------------

    fn history(detections: Array1<u8>) -> CaptureHistory {
        CaptureHistory {
            detections,
            frequency: 1,
            release_occasion: 0,
            psi_group: 0,
            life_history: LifeHistory::Known,
        }
    }

    #[test]
    // Purpose
    // -------
    // Layout helpers count ocean and post-ocean columns; a layout without a
    // post-ocean column is rejected.
    fn occasion_layout_arithmetic() {
        let layout = OccasionLayout::new(6, 2).unwrap();
        assert_eq!(layout.ocean_occasion(), 2);
        assert_eq!(layout.n_post_ocean(), 4);
        assert!(matches!(
            OccasionLayout::new(2, 2),
            Err(ModelError::InvalidOccasionLayout { n_occ: 2, n_ds_occ: 2, .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // Downstream columns accept only 0/1; post-ocean columns accept 0..=3.
    fn detection_codes_depend_on_phase() {
        let layout = OccasionLayout::new(4, 2).unwrap();
        let pims = StatePims::uniform(Array2::zeros((1, 4)), Array2::zeros((1, 4)));

        let ok = CaptureData::new(layout, vec![history(array![1, 0, 3, 2])], pims.clone());
        assert!(ok.is_ok());

        let bad = CaptureData::new(layout, vec![history(array![2, 0, 0, 0])], pims.clone());
        assert_eq!(
            bad,
            Err(ModelError::InvalidDetectionCode { history: 0, occasion: 0, code: 2 })
        );

        let short = CaptureData::new(layout, vec![history(array![1, 0, 0])], pims);
        assert_eq!(
            short,
            Err(ModelError::HistoryLengthMismatch { history: 0, expected: 4, found: 3 })
        );
    }

    #[test]
    // Purpose
    // -------
    // PIM shapes follow the row count; indices are checked against the
    // probability-vector lengths.
    fn pim_shape_and_indices() {
        let layout = OccasionLayout::new(3, 1).unwrap();
        let wrong = StatePims::uniform(Array2::zeros((2, 3)), Array2::zeros((1, 3)));
        assert!(matches!(
            CaptureData::new(layout, vec![history(array![0, 0, 0])], wrong),
            Err(ModelError::PimShapeMismatch { family: "phi", state: 0, .. })
        ));

        let mut p = Array2::zeros((1, 3));
        p[[0, 2]] = 5;
        let data = CaptureData::new(
            layout,
            vec![history(array![0, 0, 0])],
            StatePims::uniform(Array2::zeros((1, 3)), p),
        )
        .unwrap();
        assert_eq!(
            data.validate(1, 5, 1),
            Err(ModelError::PimIndexOutOfBounds {
                family: "p",
                state: 0,
                row: 0,
                occasion: 2,
                index: 5,
                len: 5,
            })
        );
        assert!(data.validate(1, 6, 1).is_ok());
        assert_eq!(
            data.validate(1, 6, 0),
            Err(ModelError::PsiGroupOutOfBounds { index: 0, group: 0, n_groups: 0 })
        );
    }

    #[test]
    // Purpose
    // -------
    // Trap dependence allows at most two distinct downstream occasions with
    // one detected-at-previous index per cohort.
    fn trap_dependence_limits() {
        let td = |occasion| TrapOccasion { occasion, detected_p_index: array![0] };
        assert!(TrapDependence::new(vec![td(1), td(2), td(3)]).is_err());
        assert!(TrapDependence::new(vec![td(1), td(1)]).is_err());

        let layout = OccasionLayout::new(5, 3).unwrap();
        let cohort = Cohort {
            release_count: 10,
            release_occasion: 0,
            psi_group: 0,
            life_history: LifeHistory::Known,
        };
        let pims = StatePims::uniform(Array2::zeros((1, 5)), Array2::zeros((1, 5)));

        let late = TrapDependence::new(vec![td(3)]).unwrap();
        assert!(matches!(
            CohortData::new(layout, vec![cohort.clone()], pims.clone(), late),
            Err(ModelError::InvalidTrapDependence { occasion: 3, .. })
        ));

        let ok = TrapDependence::new(vec![td(1), td(2)]).unwrap();
        let data = CohortData::new(layout, vec![cohort], pims, ok).unwrap();
        assert_eq!(data.trap_dependence.at(2).map(|t| t.occasion), Some(2));
        assert!(data.trap_dependence.at(0).is_none());
    }

    #[test]
    // Purpose
    // -------
    // Fields edited after construction are caught by `validate` instead of
    // reaching the recursions.
    //
    // Expect
    // ------
    // - A truncated detection vector, a resized PIM, and a trap index
    //   vector of the wrong length each return the constructor's error.
    fn validate_rechecks_edited_fields() {
        let layout = OccasionLayout::new(3, 1).unwrap();
        let pims = StatePims::uniform(Array2::zeros((1, 3)), Array2::zeros((1, 3)));
        let data = CaptureData::new(layout, vec![history(array![0, 0, 0])], pims.clone()).unwrap();

        let mut short = data.clone();
        short.histories[0].detections = array![0, 0];
        assert_eq!(
            short.validate(1, 2, 1),
            Err(ModelError::HistoryLengthMismatch { history: 0, expected: 3, found: 2 })
        );

        let mut resized = data.clone();
        resized.pims.p[2] = Array2::zeros((2, 3));
        assert!(matches!(
            resized.validate(1, 2, 1),
            Err(ModelError::PimShapeMismatch { family: "p", state: 2, .. })
        ));

        let mut collapsed = data;
        collapsed.layout.n_ds_occ = 3;
        assert!(matches!(
            collapsed.check_shapes(),
            Err(ModelError::InvalidOccasionLayout { n_occ: 3, n_ds_occ: 3, .. })
        ));

        let cohort = Cohort {
            release_count: 10,
            release_occasion: 0,
            psi_group: 0,
            life_history: LifeHistory::Known,
        };
        let mut cohorts = CohortData::new(
            OccasionLayout::new(5, 3).unwrap(),
            vec![cohort],
            StatePims::uniform(Array2::zeros((1, 5)), Array2::zeros((1, 5))),
            TrapDependence::new(vec![TrapOccasion { occasion: 2, detected_p_index: array![0] }])
                .unwrap(),
        )
        .unwrap();
        cohorts.cohorts.push(cohorts.cohorts[0].clone());
        assert!(matches!(
            cohorts.validate(1, 2, 1),
            Err(ModelError::PimShapeMismatch { .. })
        ));
    }
}
