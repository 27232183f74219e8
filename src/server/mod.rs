pub mod docs;
pub mod errors;
pub mod extractors;
pub mod run;
pub mod shutdown;
pub mod state;
