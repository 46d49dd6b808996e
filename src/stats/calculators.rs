use std::iter::Sum;
use std::ops::{Add, AddAssign};

use crate::{
    layer::{conv2d::Conv2DLayer, linear::LinearLayer, pool2d::Pool2DLayer},
    tensor::tensor_desc::TensorDesc,
};

// Per-element cost of normalization: mean, variance, scale and shift arithmetic
pub const NORM_FLOPS_PER_ELEMENT: u64 = 7;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LayerCost {
    pub flops: u64,
    pub activations: u64,
}

impl LayerCost {
    pub fn new(flops: u64, activations: u64) -> Self {
        Self { flops, activations }
    }
}

impl Add for LayerCost {
    type Output = LayerCost;

    fn add(self, rhs: LayerCost) -> LayerCost {
        LayerCost {
            flops: self.flops + rhs.flops,
            activations: self.activations + rhs.activations,
        }
    }
}

impl AddAssign for LayerCost {
    fn add_assign(&mut self, rhs: LayerCost) {
        self.flops += rhs.flops;
        self.activations += rhs.activations;
    }
}

impl Sum for LayerCost {
    fn sum<I: Iterator<Item = LayerCost>>(iter: I) -> LayerCost {
        iter.fold(LayerCost::default(), |acc, cost| acc + cost)
    }
}

fn element_count(desc: &TensorDesc) -> u64 {
    desc.num_elements() as u64
}

// flops = |out| * (in_channels / groups * kh * kw + bias)
pub fn conv_stats(conv: &Conv2DLayer, _input: &TensorDesc, output: &TensorDesc) -> LayerCost {
    let bias = if conv.bias { 1 } else { 0 };
    let per_output = (conv.in_features / conv.groups) as u64
        * (conv.kernel_h * conv.kernel_w) as u64
        + bias;
    let acts = element_count(output);
    LayerCost::new(acts * per_output, acts)
}

// FLOPs from the input shape, activations from the output
pub fn norm_stats(input: &TensorDesc, output: &TensorDesc) -> LayerCost {
    LayerCost::new(
        element_count(input) * NORM_FLOPS_PER_ELEMENT,
        element_count(output),
    )
}

// flops = |out| * in_features + (out_features if bias)
pub fn linear_stats(linear: &LinearLayer, _input: &TensorDesc, output: &TensorDesc) -> LayerCost {
    let bias = if linear.bias { linear.out_features as u64 } else { 0 };
    let acts = element_count(output);
    LayerCost::new(acts * linear.in_features as u64 + bias, acts)
}

// flops = |out| * kernel_size^2
pub fn pool_stats(pool: &Pool2DLayer, _input: &TensorDesc, output: &TensorDesc) -> LayerCost {
    let acts = element_count(output);
    let window = (pool.kernel_size * pool.kernel_size) as u64;
    LayerCost::new(acts * window, acts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::layer::Layer;
    use proptest::prelude::*;

    fn shape4() -> impl Strategy<Value = TensorDesc> {
        (1usize..4, 1usize..16, 1usize..32, 1usize..32)
            .prop_map(|(n, c, h, w)| TensorDesc::new_tensor4d(n, c, h, w))
    }

    #[test]
    fn stem_conv_cost() {
        let conv = Conv2DLayer::new_with(3, 64, 7, 7, 2, 2, 3, 3, false).unwrap();
        let input = TensorDesc::from([1, 3, 224, 224]);
        let output = conv.output_shape(&input).unwrap();
        let cost = conv_stats(&conv, &input, &output);
        assert_eq!(cost.activations, 64 * 112 * 112);
        assert_eq!(cost.flops, 64 * 112 * 112 * 3 * 49);
    }

    #[test]
    fn classifier_cost_includes_bias_once() {
        let fc = LinearLayer::new(512, 1000).unwrap();
        let cost = linear_stats(&fc, &TensorDesc::new_matrix(1, 512), &TensorDesc::new_matrix(1, 1000));
        assert_eq!(cost, LayerCost::new(1000 * 512 + 1000, 1000));
    }

    #[test]
    fn costs_sum_componentwise() {
        let total: LayerCost = [LayerCost::new(1, 2), LayerCost::new(10, 20)].into_iter().sum();
        assert_eq!(total, LayerCost::new(11, 22));
    }

    proptest! {
        #[test]
        fn prop_conv_activations_equal_output_elements(
            input in shape4(),
            out_c in 1usize..8,
            k in 1usize..4,
            bias in any::<bool>(),
        ) {
            let (_, in_c, _, _) = input.as_nchw().unwrap();
            let conv = Conv2DLayer::builder(in_c, out_c, (k, k)).padding((k / 2, k / 2)).bias(bias).build().unwrap();
            let output = conv.output_shape(&input).unwrap();
            let cost = conv_stats(&conv, &input, &output);
            prop_assert_eq!(cost.activations, output.num_elements() as u64);
        }

        #[test]
        fn prop_conv_without_bias_drops_only_bias_term(
            input in shape4(),
            out_c in 1usize..8,
        ) {
            let (_, in_c, _, _) = input.as_nchw().unwrap();
            let with_bias = Conv2DLayer::builder(in_c, out_c, (1, 1)).bias(true).build().unwrap();
            let without_bias = Conv2DLayer::builder(in_c, out_c, (1, 1)).bias(false).build().unwrap();
            let output = with_bias.output_shape(&input).unwrap();
            let a = conv_stats(&with_bias, &input, &output);
            let b = conv_stats(&without_bias, &input, &output);
            prop_assert_eq!(a.flops - b.flops, output.num_elements() as u64);
            prop_assert_eq!(b.flops, output.num_elements() as u64 * in_c as u64);
        }

        #[test]
        fn prop_norm_flops_scale_with_input_only(
            input in shape4(),
            output in shape4(),
        ) {
            let cost = norm_stats(&input, &output);
            prop_assert_eq!(cost.flops, 7 * input.num_elements() as u64);
            prop_assert_eq!(cost.activations, output.num_elements() as u64);
        }

        #[test]
        fn prop_pool_activations_equal_output_elements(
            input in shape4(),
            k in 1usize..4,
        ) {
            let pool = Pool2DLayer::max(k, 1, 0).unwrap();
            prop_assume!(pool.output_shape(&input).is_ok());
            let output = pool.output_shape(&input).unwrap();
            let cost = pool_stats(&pool, &input, &output);
            prop_assert_eq!(cost.activations, output.num_elements() as u64);
            prop_assert_eq!(cost.flops, cost.activations * (k * k) as u64);
        }

        #[test]
        fn prop_linear_activations_equal_output_elements(
            batch in 1usize..8,
            in_features in 1usize..64,
            out_features in 1usize..64,
            bias in any::<bool>(),
        ) {
            let fc = LinearLayer::new_with(in_features, out_features, bias).unwrap();
            let input = TensorDesc::new_matrix(batch, in_features);
            let output = fc.output_shape(&input).unwrap();
            let cost = linear_stats(&fc, &input, &output);
            prop_assert_eq!(cost.activations, (batch * out_features) as u64);
            let bias_term = if bias { out_features as u64 } else { 0 };
            prop_assert_eq!(cost.flops, cost.activations * in_features as u64 + bias_term);
        }
    }
}
