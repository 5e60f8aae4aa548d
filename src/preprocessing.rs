use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Per-column standardization to zero mean and unit (population) variance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub scale: Array1<f64>,
}

impl StandardScaler {
    /// Learns column statistics. Constant columns get a scale of 1.
    pub fn fit(x: ArrayView2<f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(PipelineError::Validation(
                "cannot fit a scaler on zero rows".to_string(),
            ));
        }
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| PipelineError::Validation("empty feature axis".to_string()))?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|std| if std > 0.0 && std.is_finite() { std } else { 1.0 });
        Ok(Self { mean, scale })
    }

    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.mean.len() {
            return Err(PipelineError::Validation(format!(
                "scaler fitted on {} columns, got {}",
                self.mean.len(),
                x.ncols()
            )));
        }
        Ok((&x - &self.mean) / &self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_transform_centres_and_scales() {
        let x = array![[1.0, 10.0], [3.0, 10.0], [5.0, 10.0]];
        let scaler = StandardScaler::fit(x.view()).unwrap();
        assert_eq!(scaler.mean, array![3.0, 10.0]);

        let scaled = scaler.transform(x.view()).unwrap();
        let col0 = scaled.column(0);
        assert!((col0.sum()).abs() < 1e-12);
        assert!((col0.mapv(|v| v * v).mean().unwrap() - 1.0).abs() < 1e-12);
        // Constant column maps to zero rather than NaN.
        assert!(scaled.column(1).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_transform_uses_training_statistics() {
        let train = array![[0.0], [2.0]];
        let scaler = StandardScaler::fit(train.view()).unwrap();
        let scaled = scaler.transform(array![[4.0]].view()).unwrap();
        assert_eq!(scaled[[0, 0]], 3.0);
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let scaler = StandardScaler::fit(array![[1.0, 2.0]].view()).unwrap();
        assert!(scaler.transform(array![[1.0]].view()).is_err());
    }
}
