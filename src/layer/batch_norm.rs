use crate::{
    compute::cpu_compute,
    error::StatsError,
    tensor::{tensor::Tensor, tensor_desc::TensorDesc},
};

use super::layer::{Layer, LayerKind};

#[derive(Clone, Debug)]
pub struct BatchNorm2DLayer {
    pub num_features: usize,
    pub eps: f32,
    pub weight: Tensor,
    pub bias: Tensor,
    pub running_mean: Tensor,
    pub running_var: Tensor,
}

impl BatchNorm2DLayer {
    pub fn new(num_features: usize) -> Self {
        Self::new_with(num_features, 1e-5)
    }

    pub fn new_with(num_features: usize, eps: f32) -> Self {
        let desc = TensorDesc::new_vector(num_features);
        Self {
            num_features,
            eps,
            weight: Tensor::full(desc.clone(), 1.0),
            bias: Tensor::zeros(desc.clone()),
            running_mean: Tensor::zeros(desc.clone()),
            running_var: Tensor::full(desc, 1.0),
        }
    }
}

impl Layer for BatchNorm2DLayer {
    fn output_shape(&self, input_shape: &TensorDesc) -> Result<TensorDesc, StatsError> {
        let (_, channels, _, _) = input_shape.as_nchw()?;
        if channels != self.num_features {
            return Err(StatsError::ShapeMismatch(format!(
                "BatchNorm2D expected {} channels, got {}", self.num_features, channels
            )));
        }
        Ok(input_shape.clone())
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor, StatsError> {
        self.output_shape(&input.desc)?;
        cpu_compute::batch_norm2d(
            input,
            &self.weight,
            &self.bias,
            &self.running_mean,
            &self.running_var,
            self.eps,
        )
    }

    fn kind(&self) -> LayerKind<'_> {
        LayerKind::Norm
    }

    fn name(&self) -> String {
        "BatchNorm2D".to_string()
    }

    fn config_string(&self) -> Option<String> {
        Some(format!("num_features={}, eps={}", self.num_features, self.eps))
    }

    // Running statistics are buffers, not parameters
    fn parameters(&self) -> Vec<(&'static str, &Tensor)> {
        vec![("weight", &self.weight), ("bias", &self.bias)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::value::Value;

    #[test]
    fn fresh_layer_is_identity_up_to_eps() {
        let bn = BatchNorm2DLayer::new(2);
        let input = Tensor::random(TensorDesc::from([1, 2, 3, 3]));
        let out = bn.forward(&input).unwrap();
        for (a, b) in out.data().iter().zip(input.data()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn rejects_wrong_channel_count() {
        let bn = BatchNorm2DLayer::new(4);
        assert!(bn.output_shape(&TensorDesc::from([1, 3, 2, 2])).is_err());
    }

    #[test]
    fn zero_extent_input_is_rejected_in_both_modes() {
        let bn = BatchNorm2DLayer::new(2);
        let desc = TensorDesc::from([1, 2, 0, 3]);

        let symbolic = bn.apply(Value::Symbolic(desc.clone()));
        let concrete = bn.apply(Value::Concrete(Tensor::zeros(desc)));
        assert!(matches!(symbolic, Err(StatsError::ShapeMismatch(_))));
        assert!(matches!(concrete, Err(StatsError::ShapeMismatch(_))));
    }
}
