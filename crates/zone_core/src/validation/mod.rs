pub mod validator;

pub use validator::{fingerprint, RunValidator};
