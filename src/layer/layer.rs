use crate::{error::StatsError, tensor::{tensor::Tensor, tensor_desc::TensorDesc, value::Value}};

use super::{conv2d::Conv2DLayer, linear::LinearLayer, pool2d::Pool2DLayer};

// Which cost calculator applies to a layer
pub enum LayerKind<'a> {
    Conv(&'a Conv2DLayer),
    Norm,
    Pool(&'a Pool2DLayer),
    Linear(&'a LinearLayer),
    // Not counted by the stats utility
    Untracked,
}

pub trait Layer: Send + Sync {
    // Shape inference for the single output of this layer
    fn output_shape(&self, input_shape: &TensorDesc) -> Result<TensorDesc, StatsError>;

    fn forward(&self, input: &Tensor) -> Result<Tensor, StatsError>;

    fn kind(&self) -> LayerKind<'_>;

    // Return a string representation of the layers name
    fn name(&self) -> String;

    // Return optional configuration details for the layer
    fn config_string(&self) -> Option<String> {
        None
    }

    // Named parameter tensors, e.g. ("weight", ..), ("bias", ..)
    fn parameters(&self) -> Vec<(&'static str, &Tensor)> {
        Vec::new()
    }

    fn parameter_count(&self) -> usize {
        self.parameters()
            .iter()
            .map(|(_, t)| t.desc.num_elements())
            .sum()
    }

    fn apply(&self, input: Value) -> Result<Value, StatsError> {
        match input {
            Value::Symbolic(desc) => Ok(Value::Symbolic(self.output_shape(&desc)?)),
            Value::Concrete(tensor) => Ok(Value::Concrete(self.forward(&tensor)?)),
        }
    }

    fn describe(&self) -> String {
        match self.config_string() {
            Some(config) => format!("{}({})", self.name(), config),
            None => self.name(),
        }
    }
}
