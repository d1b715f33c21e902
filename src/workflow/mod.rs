pub mod runs;
pub mod tickets;
