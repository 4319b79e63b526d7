mod producer;

pub use producer::{run_once, ProducerOutcome, RetentionPolicy};
