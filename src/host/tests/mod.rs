mod events;
mod resolution;
