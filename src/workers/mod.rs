pub mod encode_daemon;
pub mod progress;
pub mod queue;
pub mod upload_daemon;

#[cfg(test)]
pub mod testing;
