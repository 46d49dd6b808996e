use super::{tensor::Tensor, tensor_desc::TensorDesc};

// What flows through a forward pass: shapes only, or real data
#[derive(Clone, Debug)]
pub enum Value {
    Symbolic(TensorDesc),
    Concrete(Tensor),
}

impl Value {
    pub fn desc(&self) -> &TensorDesc {
        match self {
            Value::Symbolic(desc) => desc,
            Value::Concrete(tensor) => &tensor.desc,
        }
    }

    pub fn into_tensor(self) -> Option<Tensor> {
        match self {
            Value::Concrete(tensor) => Some(tensor),
            Value::Symbolic(_) => None,
        }
    }
}

impl From<TensorDesc> for Value {
    fn from(desc: TensorDesc) -> Self {
        Value::Symbolic(desc)
    }
}

impl From<Tensor> for Value {
    fn from(tensor: Tensor) -> Self {
        Value::Concrete(tensor)
    }
}
