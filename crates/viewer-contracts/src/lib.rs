pub mod chart;
pub mod chat;
pub mod frames;
pub mod sse;
