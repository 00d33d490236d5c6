// Core modules implementing track-set interning, allocation, and error modeling.
pub mod anomaly;
pub mod error;
pub mod ids;
pub mod state;
pub mod storage;
pub mod strings;
pub mod tracker;
