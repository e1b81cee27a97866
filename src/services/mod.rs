//! Service layer for the collector.
//!
//! - Retry policy (`BackoffPolicy`)
//! - Search endpoint access (`EndpointClient`, `SearchTransport`)
//! - Cursor persistence (`CursorStore`)
//! - Raw output (`ResultWriter`)

pub mod backoff;
pub mod cursor_store;
pub mod endpoint;
pub mod output;

pub use backoff::{BackoffPolicy, StatusClass};
pub use cursor_store::{CURSOR_FILE, CursorStore};
pub use endpoint::{EndpointClient, HttpTransport, RawResponse, RequestParams, SearchTransport};
pub use output::{ResultWriter, output_file_name, parse_output_file_name};
