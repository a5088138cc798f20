//! Model parameters and their packing into the optimizer vector.
//!
//! [`ModelParams`] holds every estimated quantity in named blocks;
//! [`ParamLayout`] records the block lengths and converts between the named
//! form and the flat `θ` the optimizer sees. The packing order is fixed:
//!
//! `beta_phi, beta_p, beta_psi, b_phi, b_p, b_psi, theta_phi, theta_p,
//! theta_psi, logit_p_subs, hyper_mean, hyper_log_sd`.
use ndarray::{Array1, s};

use crate::{
    model::errors::{ModelError, ModelResult},
    optimization::loglik_optimizer::Theta,
};

/// Named parameter blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParams {
    pub beta_phi: Array1<f64>,
    pub beta_p: Array1<f64>,
    pub beta_psi: Array1<f64>,
    pub b_phi: Array1<f64>,
    pub b_p: Array1<f64>,
    pub b_psi: Array1<f64>,
    pub theta_phi: Array1<f64>,
    pub theta_p: Array1<f64>,
    pub theta_psi: Array1<f64>,
    pub logit_p_subs: Array1<f64>,
    pub hyper_mean: f64,
    pub hyper_log_sd: f64,
}

impl ModelParams {
    fn blocks(&self) -> [(&'static str, &Array1<f64>); 10] {
        [
            ("beta_phi", &self.beta_phi),
            ("beta_p", &self.beta_p),
            ("beta_psi", &self.beta_psi),
            ("b_phi", &self.b_phi),
            ("b_p", &self.b_p),
            ("b_psi", &self.b_psi),
            ("theta_phi", &self.theta_phi),
            ("theta_p", &self.theta_p),
            ("theta_psi", &self.theta_psi),
            ("logit_p_subs", &self.logit_p_subs),
        ]
    }
}

/// Block lengths of the packed parameter vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParamLayout {
    pub n_beta_phi: usize,
    pub n_beta_p: usize,
    pub n_beta_psi: usize,
    pub n_b_phi: usize,
    pub n_b_p: usize,
    pub n_b_psi: usize,
    pub n_theta_phi: usize,
    pub n_theta_p: usize,
    pub n_theta_psi: usize,
    pub n_years: usize,
}

impl ParamLayout {
    fn block_lens(&self) -> [usize; 10] {
        [
            self.n_beta_phi,
            self.n_beta_p,
            self.n_beta_psi,
            self.n_b_phi,
            self.n_b_p,
            self.n_b_psi,
            self.n_theta_phi,
            self.n_theta_p,
            self.n_theta_psi,
            self.n_years,
        ]
    }

    /// Length of the packed vector (blocks plus the two hyper-parameters).
    pub fn len(&self) -> usize {
        self.block_lens().iter().sum::<usize>() + 2
    }

    /// All-zero parameters with this layout.
    pub fn zeros(&self) -> ModelParams {
        let [n0, n1, n2, n3, n4, n5, n6, n7, n8, n9] = self.block_lens();
        ModelParams {
            beta_phi: Array1::zeros(n0),
            beta_p: Array1::zeros(n1),
            beta_psi: Array1::zeros(n2),
            b_phi: Array1::zeros(n3),
            b_p: Array1::zeros(n4),
            b_psi: Array1::zeros(n5),
            theta_phi: Array1::zeros(n6),
            theta_p: Array1::zeros(n7),
            theta_psi: Array1::zeros(n8),
            logit_p_subs: Array1::zeros(n9),
            hyper_mean: 0.0,
            hyper_log_sd: 0.0,
        }
    }

    /// Unpack `theta` into named blocks.
    ///
    /// # Errors
    /// - [`ModelError::ParamLengthMismatch`] for the wrong length.
    /// - [`ModelError::NonFiniteParam`] for a NaN/±inf entry.
    pub fn from_theta(&self, theta: &Theta) -> ModelResult<ModelParams> {
        self.check_theta(theta)?;
        let mut offset = 0;
        let mut take = |n: usize| {
            let block = theta.slice(s![offset..offset + n]).to_owned();
            offset += n;
            block
        };
        let [n0, n1, n2, n3, n4, n5, n6, n7, n8, n9] = self.block_lens();
        let beta_phi = take(n0);
        let beta_p = take(n1);
        let beta_psi = take(n2);
        let b_phi = take(n3);
        let b_p = take(n4);
        let b_psi = take(n5);
        let theta_phi = take(n6);
        let theta_p = take(n7);
        let theta_psi = take(n8);
        let logit_p_subs = take(n9);
        let tail = theta.len() - 2;
        Ok(ModelParams {
            beta_phi,
            beta_p,
            beta_psi,
            b_phi,
            b_p,
            b_psi,
            theta_phi,
            theta_p,
            theta_psi,
            logit_p_subs,
            hyper_mean: theta[tail],
            hyper_log_sd: theta[tail + 1],
        })
    }

    /// Pack named blocks into `θ`.
    ///
    /// # Errors
    /// [`ModelError::DesignShapeMismatch`] when a block's length differs from
    /// the layout.
    pub fn to_theta(&self, params: &ModelParams) -> ModelResult<Theta> {
        self.check_params(params)?;
        let mut theta = Vec::with_capacity(self.len());
        for (_, block) in params.blocks() {
            theta.extend(block.iter().copied());
        }
        theta.push(params.hyper_mean);
        theta.push(params.hyper_log_sd);
        Ok(Array1::from(theta))
    }

    /// Block lengths of `params` against this layout.
    ///
    /// # Errors
    /// [`ModelError::DesignShapeMismatch`] naming the first mismatched block.
    pub fn check_params(&self, params: &ModelParams) -> ModelResult<()> {
        for ((what, block), expected) in params.blocks().into_iter().zip(self.block_lens()) {
            if block.len() != expected {
                return Err(ModelError::DesignShapeMismatch {
                    component: "parameter",
                    what,
                    expected,
                    found: block.len(),
                });
            }
        }
        Ok(())
    }

    /// Length and finiteness checks on a packed vector.
    ///
    /// # Errors
    /// As [`from_theta`](Self::from_theta).
    pub fn check_theta(&self, theta: &Theta) -> ModelResult<()> {
        if theta.len() != self.len() {
            return Err(ModelError::ParamLengthMismatch { expected: self.len(), actual: theta.len() });
        }
        match theta.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            Some((index, &value)) => Err(ModelError::NonFiniteParam { index, value }),
            None => Ok(()),
        }
    }

    /// Labels such as `beta_phi[0]`, in packing order.
    pub fn names(&self) -> Vec<String> {
        let labels = [
            "beta_phi",
            "beta_p",
            "beta_psi",
            "b_phi",
            "b_p",
            "b_psi",
            "theta_phi",
            "theta_p",
            "theta_psi",
            "logit_p_subs",
        ];
        let mut names: Vec<String> = labels
            .iter()
            .zip(self.block_lens())
            .flat_map(|(label, n)| (0..n).map(move |i| format!("{label}[{i}]")))
            .collect();
        names.push("hyper_mean".to_string());
        names.push("hyper_log_sd".to_string());
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Packing order and unpacking.
    // - Length / finiteness / block-shape errors.
    // - Parameter labels.
    // -------------------------------------------------------------------------

    fn layout() -> ParamLayout {
        ParamLayout {
            n_beta_phi: 2,
            n_beta_p: 1,
            n_beta_psi: 2,
            n_b_phi: 1,
            n_theta_phi: 1,
            n_years: 1,
            ..ParamLayout::default()
        }
    }

    #[test]
    // Purpose
    // -------
    // Blocks are packed in the documented order and unpack unchanged.
    fn packing_order() {
        // Arrange
        let layout = layout();
        let mut params = layout.zeros();
        params.beta_phi = array![1.0, 2.0];
        params.beta_p = array![3.0];
        params.beta_psi = array![4.0, 5.0];
        params.b_phi = array![6.0];
        params.theta_phi = array![7.0];
        params.logit_p_subs = array![8.0];
        params.hyper_mean = 9.0;
        params.hyper_log_sd = 10.0;

        // Act
        let theta = layout.to_theta(&params).unwrap();
        let back = layout.from_theta(&theta).unwrap();

        // Assert
        assert_eq!(layout.len(), 10);
        assert_eq!(theta, array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
        assert_eq!(back, params);
    }

    #[test]
    // Purpose
    // -------
    // Wrong lengths and non-finite entries are rejected.
    fn invalid_vectors() {
        let layout = layout();
        assert_eq!(
            layout.from_theta(&Array1::zeros(9)),
            Err(ModelError::ParamLengthMismatch { expected: 10, actual: 9 })
        );
        let mut theta = Array1::zeros(10);
        theta[4] = f64::NAN;
        assert!(matches!(
            layout.from_theta(&theta),
            Err(ModelError::NonFiniteParam { index: 4, .. })
        ));
        let mut params = layout.zeros();
        params.b_p = array![1.0];
        assert!(matches!(
            layout.to_theta(&params),
            Err(ModelError::DesignShapeMismatch { what: "b_p", expected: 0, found: 1, .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // Labels follow the packing order.
    fn parameter_names() {
        let names = layout().names();
        assert_eq!(names.len(), 10);
        assert_eq!(names[0], "beta_phi[0]");
        assert_eq!(names[5], "b_phi[0]");
        assert_eq!(names[9], "hyper_log_sd");
    }
}
