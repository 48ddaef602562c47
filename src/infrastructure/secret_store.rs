use crate::infrastructure::error::AppError;
use std::sync::Mutex;

/// Storage for the assistant API key, kept out of config files and the
/// database. The OS keychain backs the real implementation.
pub trait SecretStore: Send + Sync {
    fn save_api_key(&self, api_key: &str) -> Result<(), AppError>;
    fn load_api_key(&self) -> Result<Option<String>, AppError>;
    fn delete_api_key(&self) -> Result<(), AppError>;
}

#[derive(Debug, Clone)]
pub struct KeyringSecretStore {
    service_name: String,
    account_name: String,
}

impl KeyringSecretStore {
    pub fn new(service_name: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            account_name: account_name.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, AppError> {
        keyring::Entry::new(&self.service_name, &self.account_name)
            .map_err(|error| AppError::Credential(error.to_string()))
    }
}

impl Default for KeyringSecretStore {
    fn default() -> Self {
        Self::new("studytrack.assistant.openrouter", "default")
    }
}

impl SecretStore for KeyringSecretStore {
    fn save_api_key(&self, api_key: &str) -> Result<(), AppError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(AppError::Credential("api key must not be empty".to_string()));
        }
        self.entry()?
            .set_password(api_key)
            .map_err(|error| AppError::Credential(error.to_string()))
    }

    fn load_api_key(&self) -> Result<Option<String>, AppError> {
        match self.entry()?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AppError::Credential(error.to_string())),
        }
    }

    fn delete_api_key(&self) -> Result<(), AppError> {
        match self.entry()?.delete_credential() {
            Ok(_) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(AppError::Credential(error.to_string())),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    api_key: Mutex<Option<String>>,
}

impl SecretStore for InMemorySecretStore {
    fn save_api_key(&self, api_key: &str) -> Result<(), AppError> {
        let mut guard = self
            .api_key
            .lock()
            .map_err(|error| AppError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = Some(api_key.to_string());
        Ok(())
    }

    fn load_api_key(&self) -> Result<Option<String>, AppError> {
        let guard = self
            .api_key
            .lock()
            .map_err(|error| AppError::Credential(format!("in-memory lock poisoned: {error}")))?;
        Ok(guard.clone())
    }

    fn delete_api_key(&self) -> Result<(), AppError> {
        let mut guard = self
            .api_key
            .lock()
            .map_err(|error| AppError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_store_roundtrips_and_clears() {
        let store = InMemorySecretStore::default();
        assert_eq!(store.load_api_key().expect("load"), None);

        store.save_api_key("sk-or-test").expect("save");
        assert_eq!(store.load_api_key().expect("load"), Some("sk-or-test".to_string()));

        store.delete_api_key().expect("delete");
        assert_eq!(store.load_api_key().expect("load"), None);
    }
}
