use rand::distributions::{Distribution, Uniform};
use rand::{thread_rng, Rng};
use std::f32::consts::PI;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FanMode {
    FanIn,
    FanOut,
}

#[derive(Clone, Debug)]
pub enum WeightInit {
    // MSRA normal, gain sqrt(2) for ReLU
    HeNormal { mode: FanMode },
    // MSRA uniform with leaky-ReLU slope `a`, always fan-in
    HeUniform { a: f32 },
    UniformRandom {
        min: f32,
        max: f32,
    },
    Constant(f32),
}

// Returns (fan_in, fan_out) for linear [out, in] or conv [out, in, kh, kw] weights
pub fn fan_in_and_fan_out(shape: &[usize]) -> (usize, usize) {
    if shape.len() == 2 {
        (shape[1], shape[0])
    } else if shape.len() == 4 {
        let kernel_size = shape[2] * shape[3];
        (shape[1] * kernel_size, shape[0] * kernel_size)
    } else {
        (1, shape.first().copied().unwrap_or(1))
    }
}

impl WeightInit {
    // Bias init used for conv and linear layers: U(-1/sqrt(fan_in), 1/sqrt(fan_in))
    pub fn bias_for(weight_shape: &[usize]) -> Self {
        let (fan_in, _) = fan_in_and_fan_out(weight_shape);
        let bound = 1.0 / (fan_in.max(1) as f32).sqrt();
        WeightInit::UniformRandom { min: -bound, max: bound }
    }

    // Box-Muller transform to generate normal distribution
    fn normal_sample<R: Rng + ?Sized>(rng: &mut R, mean: f32, std_dev: f32) -> f32 {
        let uniform = Uniform::new(f32::EPSILON, 1.0);

        let u1 = uniform.sample(rng);
        let u2 = uniform.sample(rng);

        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
        mean + std_dev * z
    }

    pub fn init(&self, shape: &[usize]) -> Vec<f32> {
        self.init_with(shape, &mut thread_rng())
    }

    pub fn init_with<R: Rng + ?Sized>(&self, shape: &[usize], rng: &mut R) -> Vec<f32> {
        let total_elements = shape.iter().product();
        let (fan_in, fan_out) = fan_in_and_fan_out(shape);

        match self {
            WeightInit::HeNormal { mode } => {
                let fan = match mode {
                    FanMode::FanIn => fan_in,
                    FanMode::FanOut => fan_out,
                };
                let std_dev = (2.0 / fan.max(1) as f32).sqrt();
                (0..total_elements)
                    .map(|_| Self::normal_sample(rng, 0.0, std_dev))
                    .collect()
            },

            WeightInit::HeUniform { a } => {
                let gain = (2.0 / (1.0 + a * a)).sqrt();
                let bound = 3.0f32.sqrt() * gain / (fan_in.max(1) as f32).sqrt();
                let dist = Uniform::new_inclusive(-bound, bound);
                (0..total_elements)
                    .map(|_| dist.sample(rng))
                    .collect()
            },

            WeightInit::UniformRandom { min, max } => {
                let dist = Uniform::new_inclusive(*min, *max);
                (0..total_elements)
                    .map(|_| dist.sample(rng))
                    .collect()
            },

            WeightInit::Constant(value) => {
                vec![*value; total_elements]
            },
        }
    }
}
