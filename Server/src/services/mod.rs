pub mod content_manager;
pub mod mpd_manager;
pub mod segment_writer;
pub mod session;
