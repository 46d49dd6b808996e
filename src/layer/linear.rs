use crate::{
    compute::cpu_compute,
    error::StatsError,
    model::weight_init::WeightInit,
    tensor::{tensor::Tensor, tensor_desc::TensorDesc},
};

use super::layer::{Layer, LayerKind};

#[derive(Clone, Debug)]
pub struct LinearLayer {
    pub in_features: usize,
    pub out_features: usize,
    pub bias: bool,

    pub weights: Tensor,
    pub biases: Option<Tensor>,
}

impl LinearLayer {
    pub fn new(in_features: usize, out_features: usize) -> Result<Self, StatsError> {
        Self::new_with(in_features, out_features, true)
    }

    pub fn new_with(in_features: usize, out_features: usize, bias: bool) -> Result<Self, StatsError> {
        if in_features == 0 || out_features == 0 {
            return Err(StatsError::InvalidConfig(format!(
                "Linear features must be non-zero, got {} -> {}", in_features, out_features
            )));
        }

        let weight_desc = TensorDesc::new_matrix(out_features, in_features);
        let weight_data = WeightInit::HeUniform { a: 5.0f32.sqrt() }.init(weight_desc.dims());
        let biases = if bias {
            let desc = TensorDesc::new_vector(out_features);
            let data = WeightInit::bias_for(weight_desc.dims()).init(desc.dims());
            Some(Tensor::from_vec(desc, data)?)
        } else {
            None
        };

        Ok(Self {
            in_features,
            out_features,
            bias,
            weights: Tensor::from_vec(weight_desc, weight_data)?,
            biases,
        })
    }
}

impl Layer for LinearLayer {
    fn output_shape(&self, input_shape: &TensorDesc) -> Result<TensorDesc, StatsError> {
        let (rows, cols) = input_shape.as_matrix()?;
        if cols != self.in_features {
            return Err(StatsError::ShapeMismatch(format!(
                "Linear layer expected {} input features, got {}", self.in_features, cols
            )));
        }

        // Output shape is [batch_size, out_features]
        Ok(TensorDesc::new_matrix(rows, self.out_features))
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor, StatsError> {
        self.output_shape(&input.desc)?;
        cpu_compute::linear(input, &self.weights, self.biases.as_ref())
    }

    fn kind(&self) -> LayerKind<'_> {
        LayerKind::Linear(self)
    }

    fn name(&self) -> String {
        "Linear".to_string()
    }

    fn config_string(&self) -> Option<String> {
        Some(format!(
            "in_features={}, out_features={}, bias={}",
            self.in_features, self.out_features, self.bias
        ))
    }

    fn parameters(&self) -> Vec<(&'static str, &Tensor)> {
        let mut params = vec![("weight", &self.weights)];
        if let Some(biases) = &self.biases {
            params.push(("bias", biases));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_shape() {
        let fc = LinearLayer::new(512, 1000).unwrap();
        let out = fc.output_shape(&TensorDesc::new_matrix(1, 512)).unwrap();
        assert_eq!(out, TensorDesc::new_matrix(1, 1000));
        assert_eq!(fc.parameter_count(), 512 * 1000 + 1000);
    }

    #[test]
    fn rejects_non_matrix_input() {
        let fc = LinearLayer::new_with(4, 2, false).unwrap();
        assert!(fc.output_shape(&TensorDesc::from([1, 4, 1, 1])).is_err());
    }
}
