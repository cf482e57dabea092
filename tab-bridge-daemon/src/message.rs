pub mod main;
pub mod upstream;
