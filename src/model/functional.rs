// Stateless ops used inside forward passes. They are not layers, so hooks never see them.

use crate::{
    compute::cpu_compute::{self, PoolMode},
    error::StatsError,
    layer::pool2d::pool_output_shape,
    tensor::{tensor_desc::TensorDesc, value::Value},
};

pub fn relu(x: Value) -> Value {
    match x {
        Value::Symbolic(desc) => Value::Symbolic(desc),
        Value::Concrete(t) => Value::Concrete(cpu_compute::relu(t)),
    }
}

pub fn add(lhs: Value, rhs: Value) -> Result<Value, StatsError> {
    match (lhs, rhs) {
        (Value::Concrete(a), Value::Concrete(b)) => Ok(Value::Concrete(cpu_compute::add(a, &b)?)),
        (a, b) => {
            if a.desc() != b.desc() {
                return Err(StatsError::ShapeMismatch(format!(
                    "cannot add {} and {}", a.desc(), b.desc()
                )));
            }
            Ok(Value::Symbolic(a.desc().clone()))
        }
    }
}

// Square average pooling with stride equal to the kernel and no padding
pub fn avg_pool2d(x: Value, kernel_size: usize) -> Result<Value, StatsError> {
    let out_desc = pool_output_shape(x.desc(), kernel_size, kernel_size, 0)?;
    match x {
        Value::Symbolic(_) => Ok(Value::Symbolic(out_desc)),
        Value::Concrete(t) => Ok(Value::Concrete(cpu_compute::pool2d(
            &t,
            PoolMode::Average,
            kernel_size,
            kernel_size,
            0,
            out_desc,
        )?)),
    }
}

// Collapse every dim from `start_dim` onwards into one
pub fn flatten(x: Value, start_dim: usize) -> Result<Value, StatsError> {
    let dims = x.desc().dims();
    if start_dim >= dims.len() {
        return Err(StatsError::ShapeMismatch(format!(
            "cannot flatten {} from dim {}", x.desc(), start_dim
        )));
    }
    let mut shape = dims[..start_dim].to_vec();
    shape.push(dims[start_dim..].iter().product());
    let desc = TensorDesc::new(shape);

    match x {
        Value::Symbolic(_) => Ok(Value::Symbolic(desc)),
        Value::Concrete(t) => Ok(Value::Concrete(t.reshape(desc)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::tensor::Tensor;

    #[test]
    fn global_pool_then_flatten() {
        let x = Value::Symbolic(TensorDesc::from([1, 512, 7, 7]));
        let x = avg_pool2d(x, 7).unwrap();
        assert_eq!(x.desc(), &TensorDesc::from([1, 512, 1, 1]));
        let x = flatten(x, 1).unwrap();
        assert_eq!(x.desc(), &TensorDesc::new_matrix(1, 512));
    }

    #[test]
    fn relu_clamps_negatives() {
        let t = Tensor::from_vec(TensorDesc::new_vector(3), vec![-1.0, 0.5, -0.0]).unwrap();
        let out = relu(Value::Concrete(t)).into_tensor().unwrap();
        assert_eq!(out.data(), &[0.0, 0.5, 0.0]);
    }

    #[test]
    fn symbolic_add_checks_shapes() {
        let a = Value::Symbolic(TensorDesc::new_vector(3));
        let b = Value::Symbolic(TensorDesc::new_vector(4));
        assert!(add(a, b).is_err());
    }
}
