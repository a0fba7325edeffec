//! DELETE command handler.
//!
//! A store configured with `drop_connection_on_delete` makes the
//! handler return `false` without replying for that folder; the
//! server then closes the connection, which is how tests simulate a
//! transport failure mid-batch.

use crate::fake_cms::io::write_line;
use crate::fake_cms::store::Store;
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Returns `false` if the connection must be dropped.
pub async fn handle_delete<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    name: &str,
    store: &Mutex<Store>,
    stream: &mut BufReader<S>,
) -> bool {
    let deleted = {
        let mut store = store.lock().unwrap();
        if store.drop_on_delete.as_deref() == Some(name) {
            return false;
        }
        store.delete(name)
    };
    let resp = if deleted {
        format!("{tag} OK DELETE completed\r\n")
    } else {
        format!("{tag} NO [NONEXISTENT] No such mailbox\r\n")
    };
    let _ = write_line(stream, &resp).await;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_cms::io::capture;
    use crate::fake_cms::store::StoreBuilder;

    #[tokio::test]
    async fn deletes_existing_folder() {
        let store = &Mutex::new(StoreBuilder::new().folder("A").folder("B").build());
        let output = capture(|mut s| async move {
            assert!(handle_delete("A1", "A", store, &mut s).await);
            assert!(handle_delete("A2", "A", store, &mut s).await);
        })
        .await;
        assert!(output.contains("A1 OK DELETE completed"));
        assert!(output.contains("A2 NO [NONEXISTENT]"));
        assert_eq!(store.lock().unwrap().folder_names(), vec!["B"]);
    }

    #[tokio::test]
    async fn configured_folder_drops_connection() {
        let store = &Mutex::new(
            StoreBuilder::new()
                .folder("A")
                .drop_connection_on_delete("A")
                .build(),
        );
        let output = capture(|mut s| async move {
            assert!(!handle_delete("A1", "A", store, &mut s).await);
        })
        .await;
        assert!(output.is_empty());
        assert_eq!(store.lock().unwrap().folder_names(), vec!["A"]);
    }
}
