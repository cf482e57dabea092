pub mod connection;
pub mod events;
pub mod listener;
pub mod main;
pub mod upstream;
