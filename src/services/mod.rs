pub mod artifacts;
pub mod ingress;
pub mod invoker;
pub mod queue;
pub mod store;
pub mod sweeper;
pub mod worker;
