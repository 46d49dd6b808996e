pub mod functional;
pub mod module;
pub mod resnet;
pub mod weight_init;
