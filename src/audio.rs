// Audio processing: decoded buffers, DSP primitives, the effect catalog, and
// the decode/transform/encode pipeline.

pub mod buffer;
pub mod codec;
pub mod dsp;
pub mod effects;
pub mod pipeline;
pub mod resample;
