pub mod zhipuai;

pub use zhipuai::ChatZhipuAI;
