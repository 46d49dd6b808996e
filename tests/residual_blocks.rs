use layer_stats::{
    conv_stats, layer::layer::Layer, model::resnet::Shortcut, norm_stats, BasicBlock, LayerCost,
    Tensor, TensorDesc, Value,
};

// Cost of conv1, bn1, conv2, bn2 only
fn main_path_cost(block: &BasicBlock, input: &TensorDesc) -> LayerCost {
    let c1 = block.conv1.output_shape(input).unwrap();
    let b1 = block.bn1.output_shape(&c1).unwrap();
    let c2 = block.conv2.output_shape(&b1).unwrap();
    let b2 = block.bn2.output_shape(&c2).unwrap();
    conv_stats(&block.conv1, input, &c1)
        + norm_stats(&c1, &b1)
        + conv_stats(&block.conv2, &b1, &c2)
        + norm_stats(&c2, &b2)
}

#[test]
fn identity_shortcut_costs_nothing() {
    let block = BasicBlock::new(64, 64, 1).unwrap();
    let input = TensorDesc::from([1, 64, 56, 56]);
    let (out, cost) = block.get_stats(Value::Symbolic(input.clone())).unwrap();

    assert!(block.has_identity_shortcut());
    assert_eq!(out.desc(), &input);
    assert_eq!(cost, main_path_cost(&block, &input));
}

#[test]
fn strided_block_includes_projection() {
    let block = BasicBlock::new(64, 128, 2).unwrap();
    let input = TensorDesc::from([1, 64, 56, 56]);
    let (out, cost) = block.get_stats(Value::Symbolic(input.clone())).unwrap();
    assert_eq!(out.desc(), &TensorDesc::from([1, 128, 28, 28]));

    let (conv, norm) = match &block.shortcut {
        Shortcut::Projection { conv, norm } => (conv, norm),
        Shortcut::Identity(_) => panic!("expected a projection shortcut"),
    };
    let proj = conv.output_shape(&input).unwrap();
    let normed = norm.output_shape(&proj).unwrap();
    let shortcut = conv_stats(conv, &input, &proj) + norm_stats(&proj, &normed);

    assert_eq!(shortcut, LayerCost::new(128 * 28 * 28 * 64 + 128 * 28 * 28 * 7, 2 * 128 * 28 * 28));
    assert_eq!(cost, main_path_cost(&block, &input) + shortcut);
}

#[test]
fn channel_change_without_stride_includes_projection() {
    let block = BasicBlock::new(32, 64, 1).unwrap();
    let input = TensorDesc::from([1, 32, 14, 14]);
    let (_, cost) = block.get_stats(Value::Symbolic(input.clone())).unwrap();
    assert!(!block.has_identity_shortcut());
    assert!(cost.flops > main_path_cost(&block, &input).flops);
}

#[test]
fn concrete_and_symbolic_block_costs_agree() {
    let block = BasicBlock::new(8, 16, 2).unwrap();
    let input = Tensor::random(TensorDesc::from([2, 8, 12, 12]));
    let (sym_out, sym_cost) = block.get_stats(Value::Symbolic(input.desc.clone())).unwrap();
    let (out, cost) = block.get_stats(Value::Concrete(input)).unwrap();

    assert_eq!(cost, sym_cost);
    assert_eq!(out.desc(), sym_out.desc());
    // Output passes through a final ReLU
    let out = out.into_tensor().unwrap();
    assert!(out.data().iter().all(|&v| v >= 0.0));
}
