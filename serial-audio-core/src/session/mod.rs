pub(crate) mod acquisition;
pub mod sampler;
