pub mod query;
pub mod warehouse_api;

pub use query::{QueryString, ToQuery};
pub use warehouse_api::{SubmissionAck, WarehouseApi, MAX_REPORT_IMAGES};
