//! Archive export endpoints

pub mod jobs;
