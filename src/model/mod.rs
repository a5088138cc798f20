//! model — multistate CJS data, links, likelihood, simulation and driver.
//!
//! Purpose
//! -------
//! Everything between raw capture data and the optimizer: validated data
//! containers, the packed parameter vector, the link stage, the scaled
//! forward recursion over capture histories, the cohort simulator, and the
//! [`MscjsModel`](driver::MscjsModel) that composes them with the
//! random-effects engine.
//!
//! Key behaviors
//! -------------
//! - [`data`]: occasion layout, capture histories, cohorts, PIMs and trap
//!   dependence.
//! - [`params`]: named parameter blocks and their packing.
//! - [`link`]: logistic and multinomial links plus life-history blending.
//! - [`forward`]: per-history log-likelihood by the scaled forward
//!   algorithm.
//! - [`simulate`]: expected and binomially simulated cohort tables.
//! - [`driver`]: evaluate / simulate / fit / standard errors.
//! - [`options`]: fitting and simulation knobs.
//!
//! Invariants & assumptions
//! ------------------------
//! - Shape problems are [`ModelError`](errors::ModelError)s raised before
//!   any recursion runs; numeric degeneracies propagate as non-finite
//!   values.
//! - Occasions are zero-based; the ocean occasion equals the number of
//!   downstream occasions.

pub mod data;
pub mod driver;
pub mod errors;
pub mod forward;
pub mod link;
pub mod options;
pub mod params;
pub mod simulate;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::data::{
    CaptureData, CaptureHistory, Cohort, CohortData, LifeHistory, OccasionLayout, StatePims,
    TrapDependence, TrapOccasion,
};
pub use self::driver::{ComponentDesign, ComponentReports, Evaluation, MscjsModel, SimulationOutput};
pub use self::errors::{ModelError, ModelResult};
pub use self::link::{BlendMap, Probabilities, UnknownLifeHistoryMap};
pub use self::options::{ModelOptions, SimulationOptions};
pub use self::params::{ModelParams, ParamLayout};
pub use self::simulate::{ExpectedTables, SimulatedTables};

pub mod prelude {
    pub use super::data::{
        CaptureData, CaptureHistory, Cohort, CohortData, LifeHistory, OccasionLayout, StatePims,
        TrapDependence, TrapOccasion,
    };
    pub use super::driver::{ComponentDesign, MscjsModel};
    pub use super::errors::{ModelError, ModelResult};
    pub use super::link::{BlendMap, UnknownLifeHistoryMap};
    pub use super::options::{ModelOptions, SimulationOptions};
    pub use super::params::{ModelParams, ParamLayout};
}
