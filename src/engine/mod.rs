pub mod photos;
pub mod qr;
pub mod summary;
pub mod transitions;
pub mod workflow;
