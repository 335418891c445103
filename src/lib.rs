pub mod cli;
pub mod core;
pub mod google;
pub mod inbox;
