// ABOUTME: Client-level options applied to every primitive session.
// ABOUTME: Deserializable so applications can embed them in their own config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::primitive::PrimitiveOption;

/// Options shared by every primitive opened through one `AtomixClient`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Identifies this process to the server. Defaults to a random id.
    pub client_id: String,
    /// Session keep-alive timeout; `None` uses the server default.
    pub session_timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            client_id: format!("atomix-client-{}", uuid::Uuid::new_v4()),
            session_timeout: None,
        }
    }
}

impl ClientOptions {
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    /// Session-open options implied by these client options.
    pub fn primitive_options(&self) -> Vec<PrimitiveOption> {
        let mut options = vec![PrimitiveOption::ClientId(self.client_id.clone())];
        if let Some(timeout) = self.session_timeout {
            options.push(PrimitiveOption::SessionTimeout(timeout));
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_client_id_is_unique() {
        let a = ClientOptions::default();
        let b = ClientOptions::default();
        assert!(a.client_id.starts_with("atomix-client-"));
        assert_ne!(a.client_id, b.client_id);
    }

    #[test]
    fn test_primitive_options() {
        let options = ClientOptions::default()
            .with_client_id("node-1")
            .with_session_timeout(Duration::from_secs(30));
        assert_eq!(
            options.primitive_options(),
            vec![
                PrimitiveOption::ClientId("node-1".to_string()),
                PrimitiveOption::SessionTimeout(Duration::from_secs(30)),
            ]
        );
    }

    #[test]
    fn test_deserialize_from_toml() {
        let options: ClientOptions = toml::from_str(
            r#"
            client_id = "node-2"

            [session_timeout]
            secs = 15
            nanos = 0
            "#,
        )
        .unwrap();
        assert_eq!(options.client_id, "node-2");
        assert_eq!(options.session_timeout, Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let options: ClientOptions = toml::from_str("").unwrap();
        assert!(options.client_id.starts_with("atomix-client-"));
        assert!(options.session_timeout.is_none());
    }
}
