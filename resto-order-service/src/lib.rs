pub mod events;
pub mod intake;
pub mod sequence;
