//! Test data model for the fake CMS server
//!
//! ```ignore
//! let store = StoreBuilder::new()
//!     .folder("INBOX")
//!     .folder("Default/+33642639381")
//!         .message(1, true, b"From: <tel:+1>\r\n\r\n...")
//!         .deleted_message(2, b"...")
//!     .without_condstore()
//!     .build();
//! ```

pub const USERNAME: &str = "testuser";
pub const PASSWORD: &str = "testpass";

/// Everything the server knows. Shared behind a mutex; handlers that
/// only read work on a clone.
#[derive(Debug, Clone)]
pub struct Store {
    pub folders: Vec<StoredFolder>,
    pub condstore: bool,
    pub uidplus: bool,
    /// Close the connection without replying when this folder is
    /// deleted.
    pub drop_on_delete: Option<String>,
    /// Same, for an APPEND into this folder.
    pub drop_on_append: Option<String>,
    /// Answer NO to CREATE of this folder.
    pub reject_create: Option<String>,
    pub reject_select: Option<String>,
    pub username: String,
    pub password: String,
    next_uid_validity: u32,
}

impl Store {
    pub fn folder(&self, name: &str) -> Option<&StoredFolder> {
        self.folders.iter().find(|f| f.name == name)
    }

    pub fn folder_mut(&mut self, name: &str) -> Option<&mut StoredFolder> {
        self.folders.iter_mut().find(|f| f.name == name)
    }

    pub fn folder_names(&self) -> Vec<&str> {
        self.folders.iter().map(|f| f.name.as_str()).collect()
    }

    /// Add an empty folder; `false` if it already exists or creation
    /// is configured to fail.
    pub fn create(&mut self, name: &str) -> bool {
        if self.folder(name).is_some() || self.reject_create.as_deref() == Some(name) {
            return false;
        }
        let uid_validity = self.next_uid_validity;
        self.next_uid_validity += 1;
        self.folders.push(StoredFolder::new(name, uid_validity));
        true
    }

    /// Remove a folder; `false` if it did not exist.
    pub fn delete(&mut self, name: &str) -> bool {
        let before = self.folders.len();
        self.folders.retain(|f| f.name != name);
        self.folders.len() != before
    }

    pub fn capabilities(&self) -> String {
        let mut caps = String::from("IMAP4rev1");
        if self.condstore {
            caps.push_str(" CONDSTORE");
        }
        if self.uidplus {
            caps.push_str(" UIDPLUS");
        }
        caps
    }
}

#[derive(Debug, Clone)]
pub struct StoredFolder {
    pub name: String,
    pub attributes: Vec<String>,
    pub uid_validity: u32,
    pub uid_next: u32,
    pub highest_modseq: u64,
    pub messages: Vec<StoredMessage>,
}

impl StoredFolder {
    fn new(name: &str, uid_validity: u32) -> Self {
        Self {
            name: name.to_string(),
            attributes: vec!["\\HasNoChildren".to_string()],
            uid_validity,
            uid_next: 1,
            highest_modseq: 1,
            messages: Vec::new(),
        }
    }

    pub fn is_selectable(&self) -> bool {
        !self
            .attributes
            .iter()
            .any(|a| a.eq_ignore_ascii_case("\\Noselect"))
    }

    /// Store a message under the next UID and return it.
    pub fn append(&mut self, flags: Vec<String>, body: Vec<u8>) -> u32 {
        let uid = self.uid_next;
        self.push(uid, flags, body);
        uid
    }

    fn push(&mut self, uid: u32, flags: Vec<String>, body: Vec<u8>) {
        self.highest_modseq += 1;
        self.uid_next = self.uid_next.max(uid + 1);
        self.messages.push(StoredMessage { uid, flags, body });
    }

    pub fn message(&self, uid: u32) -> Option<&StoredMessage> {
        self.messages.iter().find(|m| m.uid == uid)
    }
}

#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub uid: u32,
    pub flags: Vec<String>,
    pub body: Vec<u8>,
}

impl StoredMessage {
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f.eq_ignore_ascii_case(flag))
    }

    pub fn is_seen(&self) -> bool {
        self.has_flag("\\Seen")
    }

    pub fn is_deleted(&self) -> bool {
        self.has_flag("\\Deleted")
    }
}

/// Builder for a [`Store`]. `.folder(name)` starts a folder; message
/// calls add to the most recent one.
pub struct StoreBuilder {
    store: Store,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self {
            store: Store {
                folders: Vec::new(),
                condstore: true,
                uidplus: true,
                drop_on_delete: None,
                drop_on_append: None,
                reject_create: None,
                reject_select: None,
                username: USERNAME.to_string(),
                password: PASSWORD.to_string(),
                next_uid_validity: 1000,
            },
        }
    }

    pub fn folder(mut self, name: &str) -> Self {
        self.store.create(name);
        self
    }

    /// A `\Noselect` hierarchy placeholder.
    pub fn noselect_folder(mut self, name: &str) -> Self {
        self.store.create(name);
        self.last().attributes = vec!["\\Noselect".to_string(), "\\HasChildren".to_string()];
        self
    }

    pub fn message(mut self, uid: u32, seen: bool, body: &[u8]) -> Self {
        let flags = if seen {
            vec!["\\Seen".to_string()]
        } else {
            Vec::new()
        };
        self.last().push(uid, flags, body.to_vec());
        self
    }

    pub fn deleted_message(mut self, uid: u32, body: &[u8]) -> Self {
        self.last()
            .push(uid, vec!["\\Deleted".to_string()], body.to_vec());
        self
    }

    pub fn without_condstore(mut self) -> Self {
        self.store.condstore = false;
        self
    }

    pub fn without_uidplus(mut self) -> Self {
        self.store.uidplus = false;
        self
    }

    pub fn drop_connection_on_delete(mut self, folder: &str) -> Self {
        self.store.drop_on_delete = Some(folder.to_string());
        self
    }

    pub fn drop_connection_on_append(mut self, folder: &str) -> Self {
        self.store.drop_on_append = Some(folder.to_string());
        self
    }

    pub fn reject_create(mut self, folder: &str) -> Self {
        self.store.reject_create = Some(folder.to_string());
        self
    }

    pub fn reject_select(mut self, folder: &str) -> Self {
        self.store.reject_select = Some(folder.to_string());
        self
    }

    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.store.username = username.to_string();
        self.store.password = password.to_string();
        self
    }

    pub fn build(self) -> Store {
        self.store
    }

    fn last(&mut self) -> &mut StoredFolder {
        self.store
            .folders
            .last_mut()
            .expect("call .folder() before adding messages")
    }
}
