//! LIST command handler.
//!
//! Every folder is listed regardless of the pattern:
//!
//! ```text
//! * LIST (\HasNoChildren) "/" "Default/+33642639381"
//! A0004 OK LIST completed
//! ```

use crate::fake_cms::io::write_line;
use crate::fake_cms::store::Store;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_list<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    store: &Store,
    stream: &mut BufReader<S>,
) {
    for folder in &store.folders {
        let line = format!(
            "* LIST ({}) \"/\" \"{}\"\r\n",
            folder.attributes.join(" "),
            folder.name
        );
        if write_line(stream, &line).await.is_err() {
            return;
        }
    }
    let _ = write_line(stream, &format!("{tag} OK LIST completed\r\n")).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_cms::io::capture;
    use crate::fake_cms::store::StoreBuilder;

    #[tokio::test]
    async fn lists_folders_with_attributes() {
        let store = StoreBuilder::new()
            .folder("INBOX")
            .noselect_folder("Default")
            .folder("Default/+331")
            .build();
        let output = capture(|mut s| async move { handle_list("A1", &store, &mut s).await }).await;
        assert!(output.contains("* LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\n"));
        assert!(output.contains("* LIST (\\Noselect \\HasChildren) \"/\" \"Default\"\r\n"));
        assert!(output.ends_with("A1 OK LIST completed\r\n"));
    }

    #[tokio::test]
    async fn empty_store_returns_only_ok() {
        let store = StoreBuilder::new().build();
        let output = capture(|mut s| async move { handle_list("T2", &store, &mut s).await }).await;
        assert_eq!(output, "T2 OK LIST completed\r\n");
    }
}
