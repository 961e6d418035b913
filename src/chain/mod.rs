pub mod abi;
pub mod batch;
pub mod deployments;
pub mod error;
pub mod provider;
pub mod tokens;
pub mod wallet;
