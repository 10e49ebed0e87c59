/// Runtime configuration for an access control store.
#[derive(Debug, Clone)]
pub struct AccessConfig {
    /// User half of the superuser identity. Compared by exact string
    /// equality, never folded.
    pub super_user: String,
    /// Host half of the superuser identity.
    pub super_host: String,
    /// Serialize under a read lock so matchers keep running during a
    /// snapshot. Off by default: the write lock prevents tearing against an
    /// in-flight editor.
    pub read_locked_serialize: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            super_user: "root".into(),
            super_host: "%".into(),
            read_locked_serialize: false,
        }
    }
}

impl AccessConfig {
    pub fn new(super_user: impl Into<String>, super_host: impl Into<String>) -> Self {
        Self {
            super_user: super_user.into(),
            super_host: super_host.into(),
            ..Self::default()
        }
    }
}
