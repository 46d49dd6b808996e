pub mod tensor;
pub mod tensor_desc;
pub mod value;
