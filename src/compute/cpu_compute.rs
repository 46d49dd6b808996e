use rayon::prelude::*;

use crate::{error::StatsError, tensor::{tensor::Tensor, tensor_desc::TensorDesc}};

pub struct CPUCompute {
    pool: rayon::ThreadPool,
    threads: usize,
}

impl CPUCompute {
    pub fn new(threads: Option<usize>) -> Result<Self, StatsError> {
        // Defaults to one worker per logical core
        let threads = threads.unwrap_or_else(num_cpus::get).max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|idx| format!("layer-stats-cpu-{}", idx))
            .build()
            .map_err(|e| StatsError::ThreadPool(e.to_string()))?;

        Ok(Self { pool, threads })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn install<R, F>(&self, f: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        self.pool.install(f)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Conv2DGeometry {
    pub stride: (usize, usize),
    pub padding: (usize, usize),
    pub dilation: (usize, usize),
    pub groups: usize,
}

// NCHW convolution. Weights are [out_channels, in_channels / groups, kh, kw]
pub fn conv2d(
    input: &Tensor,
    weights: &Tensor,
    bias: Option<&Tensor>,
    geometry: Conv2DGeometry,
    out_desc: TensorDesc,
) -> Result<Tensor, StatsError> {
    let (_, in_c, in_h, in_w) = input.desc.as_nchw()?;
    let (out_c, group_in_c, k_h, k_w) = weights.desc.as_nchw()?;
    let (_, _, out_h, out_w) = out_desc.as_nchw()?;

    let group_out_c = out_c / geometry.groups;
    let plane = out_h * out_w;
    let src = input.data();
    let w = weights.data();
    let b = bias.map(|t| t.data());

    let mut out = Tensor::zeros(out_desc);
    out.data_mut()
        .par_chunks_mut(plane)
        .enumerate()
        .for_each(|(idx, dst)| {
            let n = idx / out_c;
            let oc = idx % out_c;
            let group = oc / group_out_c;
            let init = b.map(|b| b[oc]).unwrap_or(0.0);

            for oy in 0..out_h {
                for ox in 0..out_w {
                    let mut acc = init;
                    for gic in 0..group_in_c {
                        let ic = group * group_in_c + gic;
                        let src_plane = &src[(n * in_c + ic) * in_h * in_w..][..in_h * in_w];
                        let w_plane = &w[(oc * group_in_c + gic) * k_h * k_w..][..k_h * k_w];
                        for ky in 0..k_h {
                            let iy = (oy * geometry.stride.0 + ky * geometry.dilation.0) as isize
                                - geometry.padding.0 as isize;
                            if iy < 0 || iy >= in_h as isize {
                                continue;
                            }
                            let row = &src_plane[iy as usize * in_w..][..in_w];
                            for kx in 0..k_w {
                                let ix = (ox * geometry.stride.1 + kx * geometry.dilation.1) as isize
                                    - geometry.padding.1 as isize;
                                if ix < 0 || ix >= in_w as isize {
                                    continue;
                                }
                                acc += row[ix as usize] * w_plane[ky * k_w + kx];
                            }
                        }
                    }
                    dst[oy * out_w + ox] = acc;
                }
            }
        });

    Ok(out)
}

// Inference-style batch normalization over the channel axis
pub fn batch_norm2d(
    input: &Tensor,
    weight: &Tensor,
    bias: &Tensor,
    running_mean: &Tensor,
    running_var: &Tensor,
    eps: f32,
) -> Result<Tensor, StatsError> {
    let (_, channels, h, w) = input.desc.as_nchw()?;
    let plane = h * w;
    let (gamma, beta) = (weight.data(), bias.data());
    let (mean, var) = (running_mean.data(), running_var.data());

    let mut out = input.clone();
    out.data_mut()
        .par_chunks_mut(plane)
        .enumerate()
        .for_each(|(idx, dst)| {
            let c = idx % channels;
            let scale = gamma[c] / (var[c] + eps).sqrt();
            let shift = beta[c] - mean[c] * scale;
            for v in dst.iter_mut() {
                *v = *v * scale + shift;
            }
        });

    Ok(out)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolMode {
    Max,
    // Padding is excluded from the divisor
    Average,
}

pub fn pool2d(
    input: &Tensor,
    mode: PoolMode,
    kernel: usize,
    stride: usize,
    padding: usize,
    out_desc: TensorDesc,
) -> Result<Tensor, StatsError> {
    let (_, _, in_h, in_w) = input.desc.as_nchw()?;
    let (_, _, out_h, out_w) = out_desc.as_nchw()?;
    let src = input.data();

    let mut out = Tensor::zeros(out_desc);
    out.data_mut()
        .par_chunks_mut(out_h * out_w)
        .enumerate()
        .for_each(|(plane_idx, dst)| {
            let src_plane = &src[plane_idx * in_h * in_w..][..in_h * in_w];
            for oy in 0..out_h {
                for ox in 0..out_w {
                    let y0 = (oy * stride) as isize - padding as isize;
                    let x0 = (ox * stride) as isize - padding as isize;
                    let mut max = f32::NEG_INFINITY;
                    let mut sum = 0.0f32;
                    let mut count = 0usize;
                    for ky in 0..kernel as isize {
                        let iy = y0 + ky;
                        if iy < 0 || iy >= in_h as isize {
                            continue;
                        }
                        for kx in 0..kernel as isize {
                            let ix = x0 + kx;
                            if ix < 0 || ix >= in_w as isize {
                                continue;
                            }
                            let v = src_plane[iy as usize * in_w + ix as usize];
                            max = max.max(v);
                            sum += v;
                            count += 1;
                        }
                    }
                    dst[oy * out_w + ox] = match mode {
                        PoolMode::Max => max,
                        PoolMode::Average if count > 0 => sum / count as f32,
                        PoolMode::Average => 0.0,
                    };
                }
            }
        });

    Ok(out)
}

// [batch, in] x [out, in]^T (+ bias) -> [batch, out]
pub fn linear(input: &Tensor, weights: &Tensor, bias: Option<&Tensor>) -> Result<Tensor, StatsError> {
    let (batch, in_features) = input.desc.as_matrix()?;
    let (out_features, w_in) = weights.desc.as_matrix()?;
    if w_in != in_features {
        return Err(StatsError::ShapeMismatch(format!(
            "linear weights expect {} input features, got {}",
            w_in, in_features
        )));
    }

    let src = input.data();
    let w = weights.data();
    let b = bias.map(|t| t.data());

    let mut out = Tensor::zeros(TensorDesc::new_matrix(batch, out_features));
    out.data_mut()
        .par_chunks_mut(out_features)
        .enumerate()
        .for_each(|(row, dst)| {
            let x = &src[row * in_features..][..in_features];
            for (o, slot) in dst.iter_mut().enumerate() {
                let w_row = &w[o * in_features..][..in_features];
                let dot: f32 = x.iter().zip(w_row).map(|(a, b)| a * b).sum();
                *slot = dot + b.map(|b| b[o]).unwrap_or(0.0);
            }
        });

    Ok(out)
}

pub fn relu(mut input: Tensor) -> Tensor {
    input.data_mut().par_iter_mut().for_each(|v| *v = v.max(0.0));
    input
}

pub fn add(mut lhs: Tensor, rhs: &Tensor) -> Result<Tensor, StatsError> {
    if lhs.desc != rhs.desc {
        return Err(StatsError::ShapeMismatch(format!(
            "cannot add {} and {}",
            lhs.desc, rhs.desc
        )));
    }
    lhs.data_mut()
        .par_iter_mut()
        .zip(rhs.data().par_iter())
        .for_each(|(a, b)| *a += b);
    Ok(lhs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tensor(shape: &[usize], data: Vec<f32>) -> Tensor {
        Tensor::from_vec(TensorDesc::new(shape.to_vec()), data).unwrap()
    }

    #[test]
    fn conv2d_identity_kernel_copies_input() {
        let input = tensor(&[1, 1, 2, 2], vec![1.0, 2.0, 3.0, 4.0]);
        let weights = tensor(&[1, 1, 1, 1], vec![1.0]);
        let geometry = Conv2DGeometry { stride: (1, 1), padding: (0, 0), dilation: (1, 1), groups: 1 };
        let out = conv2d(&input, &weights, None, geometry, TensorDesc::from([1, 1, 2, 2])).unwrap();
        assert_eq!(out.data(), input.data());
    }

    #[test]
    fn conv2d_sums_window_with_padding() {
        let input = tensor(&[1, 1, 2, 2], vec![1.0, 2.0, 3.0, 4.0]);
        let weights = tensor(&[1, 1, 3, 3], vec![1.0; 9]);
        let bias = tensor(&[1], vec![0.5]);
        let geometry = Conv2DGeometry { stride: (1, 1), padding: (1, 1), dilation: (1, 1), groups: 1 };
        let out = conv2d(&input, &weights, Some(&bias), geometry, TensorDesc::from([1, 1, 2, 2])).unwrap();
        assert_eq!(out.data(), &[10.5, 10.5, 10.5, 10.5]);
    }

    #[test]
    fn pooling_max_and_average() {
        let input = tensor(&[1, 1, 2, 2], vec![1.0, 2.0, 3.0, 4.0]);
        let max = pool2d(&input, PoolMode::Max, 2, 2, 0, TensorDesc::from([1, 1, 1, 1])).unwrap();
        let avg = pool2d(&input, PoolMode::Average, 2, 2, 0, TensorDesc::from([1, 1, 1, 1])).unwrap();
        assert_eq!(max.data(), &[4.0]);
        assert_eq!(avg.data(), &[2.5]);
    }

    #[test]
    fn linear_applies_weights_and_bias() {
        let input = tensor(&[1, 2], vec![1.0, 2.0]);
        let weights = tensor(&[2, 2], vec![1.0, 0.0, 0.0, 1.0]);
        let bias = tensor(&[2], vec![1.0, -1.0]);
        let out = linear(&input, &weights, Some(&bias)).unwrap();
        assert_eq!(out.data(), &[2.0, 1.0]);
    }

    #[test]
    fn add_rejects_mismatched_shapes() {
        let a = Tensor::zeros(TensorDesc::new_vector(3));
        let b = Tensor::zeros(TensorDesc::new_vector(4));
        assert!(add(a, &b).is_err());
    }

    #[test]
    fn pool_runs_on_requested_thread_count() {
        let cpu = CPUCompute::new(Some(2)).unwrap();
        assert_eq!(cpu.threads(), 2);
        assert_eq!(cpu.install(rayon::current_num_threads), 2);
    }
}
