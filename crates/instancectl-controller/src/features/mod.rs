pub mod instance_lifecycle;
pub mod observability;
