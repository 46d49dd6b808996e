use crate::{error::StatsError, tensor::{tensor::Tensor, tensor_desc::TensorDesc, value::Value}};

use super::layer::{Layer, LayerKind};

#[derive(Clone, Debug, Default)]
pub struct IdentityLayer;

impl Layer for IdentityLayer {
    fn output_shape(&self, input_shape: &TensorDesc) -> Result<TensorDesc, StatsError> {
        Ok(input_shape.clone())
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor, StatsError> {
        Ok(input.clone())
    }

    // Pass the value through without copying tensor data
    fn apply(&self, input: Value) -> Result<Value, StatsError> {
        Ok(input)
    }

    fn kind(&self) -> LayerKind<'_> {
        LayerKind::Untracked
    }

    fn name(&self) -> String {
        "Identity".to_string()
    }
}
