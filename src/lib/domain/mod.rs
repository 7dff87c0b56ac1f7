pub mod event;
pub mod leaf;
pub mod merkle;
