//! Protocol Registry
//!
//! The allow-list of deletion protocols. Either the built-in set or a JSON
//! file named by `PROTOCOLS_FILE`:
//! ```text
//! {
//!   "roi_physical_activity": {
//!     "dataset": "ForTestingOnly",
//!     "table": "physical_activity",
//!     "operation": "delete_row",
//!     "id_column": "Connect_ID"
//!   }
//! }
//! ```

mod protocol;

pub use protocol::{
    is_valid_identifier, Operation, Protocol, ProtocolRegistry, RegistryError, TableTarget,
    DEFAULT_ID_COLUMN,
};
