pub mod egress;
pub mod media;
pub mod storage;
