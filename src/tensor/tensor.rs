use rand::distributions::{Distribution, Uniform};
use rand::Rng;

use crate::error::StatsError;

use super::tensor_desc::TensorDesc;

// Dense row-major f32 tensor living on the CPU
#[derive(Clone, Debug)]
pub struct Tensor {
    pub desc: TensorDesc,
    data: Vec<f32>,
}

impl Tensor {
    pub fn from_vec(desc: TensorDesc, data: Vec<f32>) -> Result<Self, StatsError> {
        if data.len() != desc.num_elements() {
            return Err(StatsError::ShapeMismatch(format!(
                "tensor {} needs {} elements, got {}",
                desc,
                desc.num_elements(),
                data.len()
            )));
        }
        Ok(Self { desc, data })
    }

    pub fn zeros(desc: TensorDesc) -> Self {
        Self::full(desc, 0.0)
    }

    pub fn full(desc: TensorDesc, value: f32) -> Self {
        let data = vec![value; desc.num_elements()];
        Self { desc, data }
    }

    // Uniform samples in [0, 1)
    pub fn random(desc: TensorDesc) -> Self {
        Self::random_with(desc, &mut rand::thread_rng())
    }

    pub fn random_with<R: Rng + ?Sized>(desc: TensorDesc, rng: &mut R) -> Self {
        let dist = Uniform::new(0.0f32, 1.0);
        let data = (0..desc.num_elements())
            .map(|_| dist.sample(rng))
            .collect();
        Self { desc, data }
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn reshape(self, desc: TensorDesc) -> Result<Self, StatsError> {
        Self::from_vec(desc, self.data)
    }

    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().sum::<f32>() / self.data.len() as f32
    }

    pub fn std(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self.data.iter()
            .map(|&x| (x - mean).powi(2))
            .sum::<f32>() / self.data.len() as f32;
        variance.sqrt()
    }
}
