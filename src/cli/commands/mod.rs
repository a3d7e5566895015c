pub mod channels;
pub mod config;
pub mod cycle;
pub mod followups;
pub mod import;
pub mod init;
pub mod plan;
pub mod workflow;
