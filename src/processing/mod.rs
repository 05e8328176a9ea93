pub mod layer_spec;
pub mod decode;
