use std::collections::HashSet;

use tracing::{debug, info};

use crate::{
    compute::cpu_compute::CPUCompute,
    error::StatsError,
    layer::layer::{Layer, LayerKind},
    model::module::{ForwardContext, LayerHook, Module},
    tensor::{tensor::Tensor, tensor_desc::TensorDesc, value::Value},
};

use super::{
    calculators::{conv_stats, linear_stats, norm_stats, pool_stats, LayerCost},
    config::StatsConfig,
    print_stats,
};

const BYTES_PER_ELEMENT: u64 = std::mem::size_of::<f32>() as u64;

// How the forward pass is driven
pub enum StatsInput {
    Shape(TensorDesc),
    Tensor(Tensor),
}

impl From<TensorDesc> for StatsInput {
    fn from(desc: TensorDesc) -> Self {
        StatsInput::Shape(desc)
    }
}

impl From<Tensor> for StatsInput {
    fn from(tensor: Tensor) -> Self {
        StatsInput::Tensor(tensor)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TotalStats {
    pub param_dims: u64,
    pub param_size: u64,
    pub flops: u64,
    pub act_dims: u64,
    pub act_size: u64,
}

#[derive(Clone, Debug)]
pub struct ParamStats {
    pub name: String,
    pub class_name: String,
    pub shape: TensorDesc,
    pub param_dim: u64,
    pub size: u64,
    pub size_cum: u64,
    pub mean: f32,
    pub std: f32,
    pub percentage: f64,
}

#[derive(Clone, Debug)]
pub struct FlopsStats {
    pub name: String,
    pub class_name: String,
    pub input_shape: TensorDesc,
    pub output_shape: TensorDesc,
    pub flops: u64,
    pub flops_cum: u64,
    pub percentage: f64,
}

#[derive(Clone, Debug)]
pub struct ActivationStats {
    pub name: String,
    pub class_name: String,
    pub output_shape: TensorDesc,
    pub act_dim: u64,
    pub act_size: u64,
    pub act_size_cum: u64,
    pub percentage: f64,
}

#[derive(Clone, Debug, Default)]
pub struct StatsDetails {
    pub params: Vec<ParamStats>,
    pub flops: Vec<FlopsStats>,
    pub activations: Vec<ActivationStats>,
}

// Cost of a single layer invocation, None for layers the utility does not count
pub fn layer_cost(layer: &dyn Layer, input: &TensorDesc, output: &TensorDesc) -> Option<LayerCost> {
    match layer.kind() {
        LayerKind::Conv(conv) => Some(conv_stats(conv, input, output)),
        LayerKind::Norm => Some(norm_stats(input, output)),
        LayerKind::Pool(pool) => Some(pool_stats(pool, input, output)),
        LayerKind::Linear(linear) => Some(linear_stats(linear, input, output)),
        LayerKind::Untracked => None,
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

struct StatsRecorder<'c> {
    config: &'c StatsConfig,
    details: StatsDetails,
    seen_params: HashSet<String>,
}

impl<'c> StatsRecorder<'c> {
    fn new(config: &'c StatsConfig) -> Self {
        Self {
            config,
            details: StatsDetails::default(),
            seen_params: HashSet::new(),
        }
    }

    fn record_params(&mut self, name: &str, layer: &dyn Layer) {
        // Parameters belong to the layer, so a layer called twice is counted once
        if !self.seen_params.insert(name.to_string()) {
            return;
        }
        for (param_name, tensor) in layer.parameters() {
            let param_dim = tensor.desc.num_elements() as u64;
            self.details.params.push(ParamStats {
                name: format!("{}.{}", name, param_name),
                class_name: layer.name(),
                shape: tensor.desc.clone(),
                param_dim,
                size: param_dim * BYTES_PER_ELEMENT,
                size_cum: 0,
                mean: tensor.mean(),
                std: tensor.std(),
                percentage: 0.0,
            });
        }
    }

    fn finish(mut self) -> (TotalStats, StatsDetails) {
        let mut total = TotalStats::default();

        for param in &mut self.details.params {
            total.param_dims += param.param_dim;
            total.param_size += param.size;
            param.size_cum = total.param_size;
        }
        for param in &mut self.details.params {
            param.percentage = percentage(param.size, total.param_size);
        }

        for flops in &mut self.details.flops {
            total.flops += flops.flops;
            flops.flops_cum = total.flops;
        }
        for flops in &mut self.details.flops {
            flops.percentage = percentage(flops.flops, total.flops);
        }

        for act in &mut self.details.activations {
            total.act_dims += act.act_dim;
            total.act_size += act.act_size;
            act.act_size_cum = total.act_size;
        }
        for act in &mut self.details.activations {
            act.percentage = percentage(act.act_size, total.act_size);
        }

        (total, self.details)
    }
}

impl LayerHook for StatsRecorder<'_> {
    fn on_layer(
        &mut self,
        name: &str,
        layer: &dyn Layer,
        input: &TensorDesc,
        output: &Value,
    ) -> Result<(), StatsError> {
        let output_shape = output.desc();
        let cost = match layer_cost(layer, input, output_shape) {
            Some(cost) => cost,
            None => return Ok(()),
        };
        debug!(layer = name, class = %layer.name(), flops = cost.flops, acts = cost.activations, "recorded layer");

        if self.config.cal_params {
            self.record_params(name, layer);
        }

        if self.config.cal_flops {
            self.details.flops.push(FlopsStats {
                name: name.to_string(),
                class_name: layer.name(),
                input_shape: input.clone(),
                output_shape: output_shape.clone(),
                flops: cost.flops,
                flops_cum: 0,
                percentage: 0.0,
            });
        }

        if self.config.cal_activations {
            self.details.activations.push(ActivationStats {
                name: name.to_string(),
                class_name: layer.name(),
                output_shape: output_shape.clone(),
                act_dim: cost.activations,
                act_size: cost.activations * BYTES_PER_ELEMENT,
                act_size_cum: 0,
                percentage: 0.0,
            });
        }

        Ok(())
    }
}

// One forward pass of `model`, counting every conv, norm, pool and linear layer it invokes
pub fn module_stats<M>(
    model: &M,
    input: impl Into<StatsInput>,
    config: &StatsConfig,
) -> Result<(TotalStats, StatsDetails), StatsError>
where
    M: Module + Sync + ?Sized,
{
    let mut recorder = StatsRecorder::new(config);

    match input.into() {
        StatsInput::Shape(desc) => {
            info!(input = %desc, "computing module stats from input shape");
            let mut ctx = ForwardContext::new().with_hook(&mut recorder);
            model.forward(Value::Symbolic(desc), &mut ctx)?;
        },
        StatsInput::Tensor(tensor) => {
            info!(input = %tensor.desc, "computing module stats from input tensor");
            let cpu = CPUCompute::new(config.threads)?;
            let recorder = &mut recorder;
            cpu.install(move || {
                let mut ctx = ForwardContext::new().with_hook(recorder);
                model.forward(Value::Concrete(tensor), &mut ctx).map(|_| ())
            })?;
        },
    }

    let (total, details) = recorder.finish();
    info!(
        flops = total.flops,
        act_dims = total.act_dims,
        param_dims = total.param_dims,
        "module stats complete"
    );

    if config.logging_to_stdout {
        print_stats::print_details(&details, config);
        print_stats::print_summary(&total);
    }

    Ok((total, details))
}
