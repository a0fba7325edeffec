//! IMAP command handlers for the fake CMS server.
//!
//! Read-only handlers take a `&Store` snapshot; handlers that change
//! state take the shared `&Mutex<Store>` and lock briefly.

mod delete;
mod list;

pub use append::handle_append;
pub use capability::handle_capability;
pub use create::handle_create;
pub use delete::handle_delete;
pub use expunge::handle_expunge;
pub use fetch::handle_uid_fetch;
pub use list::handle_list;
pub use login::handle_login;
pub use logout::handle_logout;
pub use select::handle_select;
pub use status::handle_status;
pub use store::handle_uid_store;
