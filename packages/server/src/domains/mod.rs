// Business domains
pub mod distribution;
