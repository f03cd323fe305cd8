pub mod ar;
pub mod design;
pub mod event;
pub mod job;
pub mod room;
