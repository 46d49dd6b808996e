use crate::{
    compute::cpu_compute::{self, PoolMode},
    error::StatsError,
    tensor::{tensor::Tensor, tensor_desc::TensorDesc},
};

use super::layer::{Layer, LayerKind};

// Square-kernel 2D pooling
#[derive(Clone, Debug)]
pub struct Pool2DLayer {
    pub mode: PoolMode,
    pub kernel_size: usize,
    pub stride: usize,
    pub padding: usize,
}

impl Pool2DLayer {
    // Non-overlapping windows: stride equals kernel, no padding
    pub fn new(mode: PoolMode, kernel_size: usize) -> Result<Self, StatsError> {
        Self::new_with(mode, kernel_size, kernel_size, 0)
    }

    pub fn max(kernel_size: usize, stride: usize, padding: usize) -> Result<Self, StatsError> {
        Self::new_with(PoolMode::Max, kernel_size, stride, padding)
    }

    pub fn avg(kernel_size: usize, stride: usize, padding: usize) -> Result<Self, StatsError> {
        Self::new_with(PoolMode::Average, kernel_size, stride, padding)
    }

    pub fn new_with(mode: PoolMode, kernel_size: usize, stride: usize, padding: usize) -> Result<Self, StatsError> {
        if kernel_size == 0 || stride == 0 {
            return Err(StatsError::InvalidConfig(format!(
                "Pool2D kernel and stride must be non-zero, got kernel={}, stride={}",
                kernel_size, stride
            )));
        }
        if padding * 2 > kernel_size {
            return Err(StatsError::InvalidConfig(format!(
                "Pool2D padding {} must be at most half of kernel {}", padding, kernel_size
            )));
        }
        Ok(Self { mode, kernel_size, stride, padding })
    }
}

// Output spatial size shared by the layer and functional pooling
pub fn pool_output_shape(
    input_shape: &TensorDesc,
    kernel_size: usize,
    stride: usize,
    padding: usize,
) -> Result<TensorDesc, StatsError> {
    let (batch, channels, h_in, w_in) = input_shape.as_nchw()?;
    if h_in + 2 * padding < kernel_size || w_in + 2 * padding < kernel_size {
        return Err(StatsError::ShapeMismatch(format!(
            "pooling kernel {} does not fit padded input {}", kernel_size, input_shape
        )));
    }
    let h_out = (h_in + 2 * padding - kernel_size) / stride + 1;
    let w_out = (w_in + 2 * padding - kernel_size) / stride + 1;
    Ok(TensorDesc::new_tensor4d(batch, channels, h_out, w_out))
}

impl Layer for Pool2DLayer {
    fn output_shape(&self, input_shape: &TensorDesc) -> Result<TensorDesc, StatsError> {
        pool_output_shape(input_shape, self.kernel_size, self.stride, self.padding)
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor, StatsError> {
        let out_desc = self.output_shape(&input.desc)?;
        cpu_compute::pool2d(input, self.mode, self.kernel_size, self.stride, self.padding, out_desc)
    }

    fn kind(&self) -> LayerKind<'_> {
        LayerKind::Pool(self)
    }

    fn name(&self) -> String {
        match self.mode {
            PoolMode::Max => "MaxPool2D".to_string(),
            PoolMode::Average => "AvgPool2D".to_string(),
        }
    }

    fn config_string(&self) -> Option<String> {
        Some(format!(
            "kernel={}, stride={}, padding={}",
            self.kernel_size, self.stride, self.padding
        ))
    }
}
