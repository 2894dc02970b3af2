pub mod features;
pub mod gap_fill;
