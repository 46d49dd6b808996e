use layer_stats::{module_stats, ResNet, StatsConfig, StatsError, TensorDesc};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), StatsError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let net = ResNet::resnet18()?;
    let config = StatsConfig::default().build()?;

    let (total, _) = module_stats(&net, TensorDesc::from([1, 3, 224, 224]), &config)?;
    tracing::info!(flops = total.flops, act_dims = total.act_dims, "resnet18 stats");

    Ok(())
}
