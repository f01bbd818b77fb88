//! Reference title lists: one `<id>.txt` file per list, parsed lazily and
//! cached for the lifetime of the process.

pub mod cache;
pub mod parse;
pub mod refresh;

pub use cache::ReferenceListCache;
pub use parse::{format_entry, parse_line, parse_list};
pub use refresh::{ReferenceListRefresher, RefreshOutcome, RemoteListSource};
