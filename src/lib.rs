pub mod config;
pub mod export;
pub mod math;
pub mod pipeline;
pub mod scene_graph;
