pub mod entities;
pub mod events;
