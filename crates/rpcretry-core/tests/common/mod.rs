pub mod flaky;
pub mod recorder;
