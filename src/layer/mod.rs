pub mod batch_norm;
pub mod conv2d;
pub mod identity;
pub mod layer;
pub mod linear;
pub mod pool2d;
