use std::collections::HashMap;

use crate::{
    error::StatsError,
    layer::{
        batch_norm::BatchNorm2DLayer,
        conv2d::Conv2DLayer,
        identity::IdentityLayer,
        layer::Layer,
        linear::LinearLayer,
        pool2d::Pool2DLayer,
    },
    stats::calculators::{conv_stats, linear_stats, norm_stats, pool_stats, LayerCost},
    tensor::{tensor::Tensor, value::Value},
};

use super::{
    functional,
    module::{ForwardContext, Module},
};

// Kernel of the functional average pool before the classifier (7×7 maps at 224 input)
pub const GLOBAL_POOL_KERNEL: usize = 7;

// Apply `conv`, then add its cost
fn conv_step(conv: &Conv2DLayer, x: Value, cost: &mut LayerCost) -> Result<Value, StatsError> {
    let input = x.desc().clone();
    let out = conv.apply(x)?;
    *cost += conv_stats(conv, &input, out.desc());
    Ok(out)
}

fn norm_step(norm: &BatchNorm2DLayer, x: Value, cost: &mut LayerCost) -> Result<Value, StatsError> {
    let input = x.desc().clone();
    let out = norm.apply(x)?;
    *cost += norm_stats(&input, out.desc());
    Ok(out)
}

pub enum Shortcut {
    Identity(IdentityLayer),
    Projection {
        conv: Conv2DLayer,
        norm: BatchNorm2DLayer,
    },
}

pub struct BasicBlock {
    pub in_channels: usize,
    pub channels: usize,
    pub stride: usize,

    pub conv1: Conv2DLayer,
    pub bn1: BatchNorm2DLayer,
    pub conv2: Conv2DLayer,
    pub bn2: BatchNorm2DLayer,
    pub shortcut: Shortcut,
}

impl BasicBlock {
    pub const EXPANSION: usize = 1;

    pub fn new(in_channels: usize, channels: usize, stride: usize) -> Result<Self, StatsError> {
        Self::new_with(in_channels, channels, stride, 1, 64, 1)
    }

    pub fn new_with(
        in_channels: usize,
        channels: usize,
        stride: usize,
        groups: usize,
        base_width: usize,
        dilation: usize,
    ) -> Result<Self, StatsError> {
        if groups != 1 || base_width != 64 {
            return Err(StatsError::InvalidConfig(format!(
                "BasicBlock only supports groups=1 and base_width=64, got groups={}, base_width={}",
                groups, base_width
            )));
        }
        if dilation > 1 {
            return Err(StatsError::Unsupported(format!(
                "Dilation > 1 not supported in BasicBlock, got {}", dilation
            )));
        }

        let conv1 = Conv2DLayer::builder(in_channels, channels, (3, 3))
            .stride((stride, stride))
            .padding((dilation, dilation))
            .bias(false)
            .build()?;
        let conv2 = Conv2DLayer::builder(channels, channels, (3, 3))
            .padding((1, 1))
            .bias(false)
            .build()?;

        let shortcut = if in_channels == channels && stride == 1 {
            Shortcut::Identity(IdentityLayer)
        } else {
            Shortcut::Projection {
                conv: Conv2DLayer::builder(in_channels, channels, (1, 1))
                    .stride((stride, stride))
                    .bias(false)
                    .build()?,
                norm: BatchNorm2DLayer::new(channels),
            }
        };

        Ok(Self {
            in_channels,
            channels,
            stride,
            conv1,
            bn1: BatchNorm2DLayer::new(channels),
            conv2,
            bn2: BatchNorm2DLayer::new(channels),
            shortcut,
        })
    }

    pub fn has_identity_shortcut(&self) -> bool {
        matches!(self.shortcut, Shortcut::Identity(_))
    }

    // Shortcut input is needed after the main path consumes `x`
    fn split(x: Value) -> (Value, Value) {
        (x.clone(), x)
    }

    pub fn get_stats(&self, x: Value) -> Result<(Value, LayerCost), StatsError> {
        let mut cost = LayerCost::default();
        let (x, identity) = Self::split(x);

        let x = conv_step(&self.conv1, x, &mut cost)?;
        let x = norm_step(&self.bn1, x, &mut cost)?;
        let x = functional::relu(x);
        let x = conv_step(&self.conv2, x, &mut cost)?;
        let x = norm_step(&self.bn2, x, &mut cost)?;

        let identity = match &self.shortcut {
            Shortcut::Identity(id) => id.apply(identity)?,
            Shortcut::Projection { conv, norm } => {
                let identity = conv_step(conv, identity, &mut cost)?;
                norm_step(norm, identity, &mut cost)?
            }
        };

        let x = functional::add(x, identity)?;
        Ok((functional::relu(x), cost))
    }
}

impl Module for BasicBlock {
    fn forward(&self, x: Value, ctx: &mut ForwardContext<'_>) -> Result<Value, StatsError> {
        let (x, identity) = Self::split(x);

        let x = ctx.call("conv1", &self.conv1, x)?;
        let x = ctx.call("bn1", &self.bn1, x)?;
        let x = functional::relu(x);
        let x = ctx.call("conv2", &self.conv2, x)?;
        let x = ctx.call("bn2", &self.bn2, x)?;

        let identity = match &self.shortcut {
            Shortcut::Identity(id) => ctx.call("downsample_id", id, identity)?,
            Shortcut::Projection { conv, norm } => {
                let identity = ctx.call("downsample_conv", conv, identity)?;
                ctx.call("downsample_norm", norm, identity)?
            }
        };

        let x = functional::add(x, identity)?;
        Ok(functional::relu(x))
    }
}

#[derive(Clone, Debug)]
pub struct ResNetConfig {
    pub layers: [usize; 4],
    pub num_classes: usize,
    pub groups: usize,
    pub width_per_group: usize,
    // One flag per stage after the first; replaces that stage's stride with dilation
    pub replace_stride_with_dilation: Option<Vec<bool>>,
    pub zero_init_residual: bool,
}

impl Default for ResNetConfig {
    fn default() -> Self {
        Self {
            layers: [2, 2, 2, 2],
            num_classes: 1000,
            groups: 1,
            width_per_group: 64,
            replace_stride_with_dilation: None,
            zero_init_residual: false,
        }
    }
}

pub struct ResNet {
    pub conv1: Conv2DLayer,
    pub bn1: BatchNorm2DLayer,
    pub maxpool: Pool2DLayer,
    pub stages: Vec<Vec<BasicBlock>>,
    pub fc: LinearLayer,
}

const STAGE_NAMES: [&str; 4] = ["layer1", "layer2", "layer3", "layer4"];
const FEATURE_NAMES: [&str; 4] = ["res2", "res3", "res4", "res5"];

impl ResNet {
    pub fn resnet18() -> Result<Self, StatsError> {
        Self::new(ResNetConfig::default())
    }

    pub fn new(config: ResNetConfig) -> Result<Self, StatsError> {
        let dilate = match &config.replace_stride_with_dilation {
            None => vec![false; 3],
            Some(flags) if flags.len() == 3 => flags.clone(),
            Some(flags) => {
                return Err(StatsError::InvalidConfig(format!(
                    "replace_stride_with_dilation should be None or a 3-element list, got {:?}",
                    flags
                )));
            }
        };

        let mut in_channels = 64;
        let mut dilation = 1;

        let conv1 = Conv2DLayer::builder(3, in_channels, (7, 7))
            .stride((2, 2))
            .padding((3, 3))
            .bias(false)
            .build()?;
        let bn1 = BatchNorm2DLayer::new(in_channels);
        let maxpool = Pool2DLayer::max(3, 2, 1)?;

        let stage_specs = [
            (64, config.layers[0], 1, false),
            (128, config.layers[1], 2, dilate[0]),
            (256, config.layers[2], 2, dilate[1]),
            (512, config.layers[3], 2, dilate[2]),
        ];

        let mut stages = Vec::with_capacity(stage_specs.len());
        for (channels, blocks, stride, dilate) in stage_specs {
            let previous_dilation = dilation;
            let mut stride = stride;
            if dilate {
                dilation *= stride;
                stride = 1;
            }

            let mut stage = Vec::with_capacity(blocks);
            stage.push(BasicBlock::new_with(
                in_channels,
                channels,
                stride,
                config.groups,
                config.width_per_group,
                previous_dilation,
            )?);
            in_channels = channels * BasicBlock::EXPANSION;
            for _ in 1..blocks {
                stage.push(BasicBlock::new_with(
                    in_channels,
                    channels,
                    1,
                    config.groups,
                    config.width_per_group,
                    dilation,
                )?);
            }
            stages.push(stage);
        }

        let fc = LinearLayer::new(512 * BasicBlock::EXPANSION, config.num_classes)?;

        let mut net = Self { conv1, bn1, maxpool, stages, fc };
        if config.zero_init_residual {
            for block in net.stages.iter_mut().flatten() {
                block.bn2.weight = Tensor::zeros(block.bn2.weight.desc.clone());
            }
        }

        Ok(net)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.stages.iter().flatten()
    }

    pub fn parameter_count(&self) -> usize {
        let block_params: usize = self.blocks()
            .map(|b| {
                let shortcut = match &b.shortcut {
                    Shortcut::Identity(_) => 0,
                    Shortcut::Projection { conv, norm } => conv.parameter_count() + norm.parameter_count(),
                };
                b.conv1.parameter_count()
                    + b.bn1.parameter_count()
                    + b.conv2.parameter_count()
                    + b.bn2.parameter_count()
                    + shortcut
            })
            .sum();

        self.conv1.parameter_count()
            + self.bn1.parameter_count()
            + block_params
            + self.fc.parameter_count()
    }

    fn stem(&self, x: Value, ctx: &mut ForwardContext<'_>) -> Result<Value, StatsError> {
        let x = ctx.call("conv1", &self.conv1, x)?;
        let x = ctx.call("bn1", &self.bn1, x)?;
        let x = functional::relu(x);
        ctx.call("maxpool", &self.maxpool, x)
    }

    fn stage(&self, idx: usize, x: Value, ctx: &mut ForwardContext<'_>) -> Result<Value, StatsError> {
        ctx.scope(STAGE_NAMES[idx], |ctx| {
            let mut x = x;
            for (i, block) in self.stages[idx].iter().enumerate() {
                x = ctx.scope(&i.to_string(), |ctx| block.forward(x, ctx))?;
            }
            Ok(x)
        })
    }

    // Intermediate feature maps keyed "stem", "res2" .. "res5"
    pub fn extract_features(
        &self,
        x: Value,
        ctx: &mut ForwardContext<'_>,
    ) -> Result<HashMap<&'static str, Value>, StatsError> {
        let mut outputs = HashMap::new();
        let mut x = self.stem(x, ctx)?;
        outputs.insert("stem", x.clone());
        for (idx, feature) in FEATURE_NAMES.iter().enumerate() {
            x = self.stage(idx, x, ctx)?;
            outputs.insert(*feature, x.clone());
        }
        Ok(outputs)
    }

    // Ground truth for the stats utility: explicit calculator calls at every counted layer
    pub fn get_stats(&self, x: Value) -> Result<LayerCost, StatsError> {
        let mut cost = LayerCost::default();

        let x = conv_step(&self.conv1, x, &mut cost)?;
        let x = norm_step(&self.bn1, x, &mut cost)?;
        let x = functional::relu(x);

        let input = x.desc().clone();
        let mut x = self.maxpool.apply(x)?;
        cost += pool_stats(&self.maxpool, &input, x.desc());

        for block in self.blocks() {
            let (out, block_cost) = block.get_stats(x)?;
            cost += block_cost;
            x = out;
        }

        let x = functional::avg_pool2d(x, GLOBAL_POOL_KERNEL)?;
        let x = functional::flatten(x, 1)?;

        let input = x.desc().clone();
        let x = self.fc.apply(x)?;
        cost += linear_stats(&self.fc, &input, x.desc());

        Ok(cost)
    }
}

impl Module for ResNet {
    fn forward(&self, x: Value, ctx: &mut ForwardContext<'_>) -> Result<Value, StatsError> {
        let mut x = self.stem(x, ctx)?;
        for idx in 0..self.stages.len() {
            x = self.stage(idx, x, ctx)?;
        }

        let x = functional::avg_pool2d(x, GLOBAL_POOL_KERNEL)?;
        let x = functional::flatten(x, 1)?;
        ctx.call("fc", &self.fc, x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::tensor_desc::TensorDesc;

    #[test]
    fn rejects_grouped_blocks() {
        let err = BasicBlock::new_with(64, 64, 1, 2, 64, 1);
        assert!(matches!(err, Err(StatsError::InvalidConfig(_))));
        let err = BasicBlock::new_with(64, 64, 1, 1, 32, 1);
        assert!(matches!(err, Err(StatsError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_dilated_blocks() {
        let err = BasicBlock::new_with(64, 64, 1, 1, 64, 2);
        assert!(matches!(err, Err(StatsError::Unsupported(_))));
    }

    #[test]
    fn shortcut_kind_follows_channels_and_stride() {
        assert!(BasicBlock::new(64, 64, 1).unwrap().has_identity_shortcut());
        assert!(!BasicBlock::new(64, 128, 1).unwrap().has_identity_shortcut());
        assert!(!BasicBlock::new(64, 64, 2).unwrap().has_identity_shortcut());
    }

    #[test]
    fn resnet18_layout() {
        let net = ResNet::resnet18().unwrap();
        assert_eq!(net.blocks().count(), 8);
        let projections = net.blocks().filter(|b| !b.has_identity_shortcut()).count();
        assert_eq!(projections, 3);
        // Torchvision's resnet18 parameter count
        assert_eq!(net.parameter_count(), 11_689_512);
    }

    #[test]
    fn forward_shape_is_logits() {
        let net = ResNet::resnet18().unwrap();
        let out = net.run(Value::Symbolic(TensorDesc::from([1, 3, 224, 224]))).unwrap();
        assert_eq!(out.desc(), &TensorDesc::new_matrix(1, 1000));
    }

    #[test]
    fn feature_maps_shrink_by_stage() {
        let net = ResNet::resnet18().unwrap();
        let features = net
            .extract_features(Value::Symbolic(TensorDesc::from([1, 3, 224, 224])), &mut ForwardContext::new())
            .unwrap();
        assert_eq!(features["stem"].desc(), &TensorDesc::from([1, 64, 56, 56]));
        assert_eq!(features["res2"].desc(), &TensorDesc::from([1, 64, 56, 56]));
        assert_eq!(features["res3"].desc(), &TensorDesc::from([1, 128, 28, 28]));
        assert_eq!(features["res4"].desc(), &TensorDesc::from([1, 256, 14, 14]));
        assert_eq!(features["res5"].desc(), &TensorDesc::from([1, 512, 7, 7]));
    }

    #[test]
    fn rejects_wrong_dilation_flag_count() {
        let config = ResNetConfig {
            replace_stride_with_dilation: Some(vec![false, true]),
            ..Default::default()
        };
        assert!(matches!(ResNet::new(config), Err(StatsError::InvalidConfig(_))));
    }

    #[test]
    fn dilated_stage_is_unsupported_by_basic_blocks() {
        let config = ResNetConfig {
            replace_stride_with_dilation: Some(vec![false, false, true]),
            ..Default::default()
        };
        assert!(matches!(ResNet::new(config), Err(StatsError::Unsupported(_))));
    }

    #[test]
    fn rejects_groups_in_network_config() {
        let config = ResNetConfig { groups: 2, ..Default::default() };
        assert!(ResNet::new(config).is_err());
    }

    #[test]
    fn zero_init_residual_clears_last_norm() {
        let config = ResNetConfig { zero_init_residual: true, ..Default::default() };
        let net = ResNet::new(config).unwrap();
        assert!(net.blocks().all(|b| b.bn2.weight.data().iter().all(|&w| w == 0.0)));
    }
}
