pub mod capabilities;
pub mod consumer;
pub mod cook_time;
pub mod events;
pub mod processor;
pub mod registry;
