pub mod compute;
pub mod error;
pub mod layer;
pub mod model;
pub mod stats;
pub mod tensor;

pub use error::StatsError;
pub use model::module::{ForwardContext, LayerHook, Module};
pub use model::resnet::{BasicBlock, ResNet, ResNetConfig};
pub use stats::calculators::{conv_stats, linear_stats, norm_stats, pool_stats, LayerCost};
pub use stats::config::StatsConfig;
pub use stats::module_stats::{module_stats, StatsDetails, StatsInput, TotalStats};
pub use tensor::{tensor::Tensor, tensor_desc::TensorDesc, value::Value};
