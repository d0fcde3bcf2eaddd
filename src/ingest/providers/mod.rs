pub mod headline;
pub mod hotlist;
