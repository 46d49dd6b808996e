use crate::{
    compute::cpu_compute::{self, Conv2DGeometry},
    error::StatsError,
    model::weight_init::{FanMode, WeightInit},
    tensor::{tensor::Tensor, tensor_desc::TensorDesc},
};

use super::layer::{Layer, LayerKind};

#[derive(Clone, Debug)]
pub struct Conv2DLayer {
    pub in_features: usize,  // Input channels
    pub out_features: usize, // Output channels
    pub kernel_h: usize,
    pub kernel_w: usize,
    pub stride_h: usize,
    pub stride_w: usize,
    pub padding_h: usize,
    pub padding_w: usize,
    pub dilation_h: usize,
    pub dilation_w: usize,
    pub groups: usize,
    pub bias: bool,

    pub weights: Tensor,
    pub biases: Option<Tensor>,
}

impl Conv2DLayer {
    // 3×3, stride 1, no padding, no bias
    pub fn new(in_features: usize, out_features: usize) -> Result<Self, StatsError> {
        Self::new_with(in_features, out_features, 3, 3, 1, 1, 0, 0, false)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new_with(
        in_features: usize,
        out_features: usize,
        kernel_h: usize,
        kernel_w: usize,
        stride_h: usize,
        stride_w: usize,
        padding_h: usize,
        padding_w: usize,
        bias: bool,
    ) -> Result<Self, StatsError> {
        Conv2DBuilder::new(in_features, out_features, (kernel_h, kernel_w))
            .stride((stride_h, stride_w))
            .padding((padding_h, padding_w))
            .bias(bias)
            .build()
    }

    pub fn builder(in_features: usize, out_features: usize, kernel: (usize, usize)) -> Conv2DBuilder {
        Conv2DBuilder::new(in_features, out_features, kernel)
    }

    fn geometry(&self) -> Conv2DGeometry {
        Conv2DGeometry {
            stride: (self.stride_h, self.stride_w),
            padding: (self.padding_h, self.padding_w),
            dilation: (self.dilation_h, self.dilation_w),
            groups: self.groups,
        }
    }
}

pub struct Conv2DBuilder {
    in_features: usize,
    out_features: usize,
    kernel: (usize, usize),
    stride: (usize, usize),
    padding: (usize, usize),
    dilation: (usize, usize),
    groups: usize,
    bias: bool,
    weight_init: WeightInit,
}

impl Conv2DBuilder {
    pub fn new(in_features: usize, out_features: usize, kernel: (usize, usize)) -> Self {
        Self {
            in_features,
            out_features,
            kernel,
            stride: (1, 1),
            padding: (0, 0),
            dilation: (1, 1),
            groups: 1,
            bias: true,
            weight_init: WeightInit::HeNormal { mode: FanMode::FanOut },
        }
    }

    pub fn stride(mut self, stride: (usize, usize)) -> Self {
        self.stride = stride;
        self
    }

    pub fn padding(mut self, padding: (usize, usize)) -> Self {
        self.padding = padding;
        self
    }

    pub fn dilation(mut self, dilation: (usize, usize)) -> Self {
        self.dilation = dilation;
        self
    }

    pub fn groups(mut self, groups: usize) -> Self {
        self.groups = groups;
        self
    }

    pub fn bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }

    pub fn weight_init(mut self, weight_init: WeightInit) -> Self {
        self.weight_init = weight_init;
        self
    }

    pub fn build(self) -> Result<Conv2DLayer, StatsError> {
        let (kernel_h, kernel_w) = self.kernel;
        if kernel_h == 0 || kernel_w == 0 {
            return Err(StatsError::InvalidConfig(format!(
                "Conv2D kernel must be non-zero, got {}×{}", kernel_h, kernel_w
            )));
        }
        if self.stride.0 == 0 || self.stride.1 == 0 || self.dilation.0 == 0 || self.dilation.1 == 0 {
            return Err(StatsError::InvalidConfig(format!(
                "Conv2D stride and dilation must be non-zero, got stride={:?}, dilation={:?}",
                self.stride, self.dilation
            )));
        }
        if self.groups == 0
            || self.in_features % self.groups != 0
            || self.out_features % self.groups != 0
        {
            return Err(StatsError::InvalidConfig(format!(
                "Conv2D groups={} must divide in_channels={} and out_channels={}",
                self.groups, self.in_features, self.out_features
            )));
        }

        let weight_desc = TensorDesc::new_tensor4d(
            self.out_features,
            self.in_features / self.groups,
            kernel_h,
            kernel_w,
        );
        let weight_data = self.weight_init.init(weight_desc.dims());
        let biases = if self.bias {
            let desc = TensorDesc::new_vector(self.out_features);
            let data = WeightInit::bias_for(weight_desc.dims()).init(desc.dims());
            Some(Tensor::from_vec(desc, data)?)
        } else {
            None
        };

        Ok(Conv2DLayer {
            in_features: self.in_features,
            out_features: self.out_features,
            kernel_h,
            kernel_w,
            stride_h: self.stride.0,
            stride_w: self.stride.1,
            padding_h: self.padding.0,
            padding_w: self.padding.1,
            dilation_h: self.dilation.0,
            dilation_w: self.dilation.1,
            groups: self.groups,
            bias: self.bias,
            weights: Tensor::from_vec(weight_desc, weight_data)?,
            biases,
        })
    }
}

impl Layer for Conv2DLayer {
    fn output_shape(&self, input_shape: &TensorDesc) -> Result<TensorDesc, StatsError> {
        let (batch, channels, h_in, w_in) = input_shape.as_nchw()?;
        if channels != self.in_features {
            return Err(StatsError::ShapeMismatch(format!(
                "Conv2D expected {} input channels, got {}", self.in_features, channels
            )));
        }

        let span_h = self.dilation_h * (self.kernel_h - 1) + 1;
        let span_w = self.dilation_w * (self.kernel_w - 1) + 1;
        if h_in + 2 * self.padding_h < span_h || w_in + 2 * self.padding_w < span_w {
            return Err(StatsError::ShapeMismatch(format!(
                "Conv2D kernel {}×{} does not fit padded input {}", span_h, span_w, input_shape
            )));
        }

        let h_out = ((h_in + 2 * self.padding_h - span_h) / self.stride_h) + 1;
        let w_out = ((w_in + 2 * self.padding_w - span_w) / self.stride_w) + 1;

        Ok(TensorDesc::new_tensor4d(batch, self.out_features, h_out, w_out))
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor, StatsError> {
        let out_desc = self.output_shape(&input.desc)?;
        cpu_compute::conv2d(input, &self.weights, self.biases.as_ref(), self.geometry(), out_desc)
    }

    fn kind(&self) -> LayerKind<'_> {
        LayerKind::Conv(self)
    }

    fn name(&self) -> String {
        "Conv2D".to_string()
    }

    fn config_string(&self) -> Option<String> {
        Some(format!(
            "in_channels={}, out_channels={}, kernel={}×{}, stride={}×{}, padding={}×{}, groups={}, bias={}",
            self.in_features, self.out_features,
            self.kernel_h, self.kernel_w,
            self.stride_h, self.stride_w,
            self.padding_h, self.padding_w,
            self.groups,
            self.bias
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
