pub mod ai_provider;
pub mod event_stream;
pub mod job_store;
pub mod render_queue;
pub mod storage;
