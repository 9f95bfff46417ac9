//! Platform registry (C1): name -> profile resolution with an alias table and
//! a `default` fallback. Re-architects the source's module-init global
//! registry (`device_factory.rs`'s `match device_type` dispatch, `vendors/*`'s
//! per-module side effects) into an explicit registry built once at startup
//! and handed to the engine, per the design notes' "explicit builder" note.

use crate::error::CoreError;
use crate::profile::PlatformProfile;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, instrument};

/// Read-mostly, write-rare name -> profile table plus an alias table.
/// Re-registration under the same name replaces the prior entry
/// (last-writer-wins), matching §4.1.
pub struct PlatformRegistry {
    profiles: RwLock<HashMap<String, PlatformProfile>>,
    aliases: RwLock<HashMap<String, String>>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self {
            profiles: RwLock::new(HashMap::new()),
            aliases: RwLock::new(HashMap::new()),
        }
    }

    /// Builds the registry with the builtin profiles and aliases (§4.1's
    /// `h3c`->`h3c_s`, `huawei`->`huawei_s`, `cisco`->`cisco_ios`).
    pub fn with_builtins() -> Result<Self, CoreError> {
        let registry = Self::new();
        registry.register(crate::profile::default_profile()?);
        registry.register(crate::profile::cisco_ios_profile()?);
        registry.register(crate::profile::huawei_s_profile()?);
        registry.register(crate::profile::h3c_s_profile()?);

        registry.register_alias("cisco", "cisco_ios");
        registry.register_alias("huawei", "huawei_s");
        registry.register_alias("h3c", "h3c_s");

        Ok(registry)
    }

    /// Registers (or replaces) a profile under its own name.
    #[instrument(skip(self, profile), fields(name = %profile.name))]
    pub fn register(&self, profile: PlatformProfile) {
        debug!(target: "PlatformRegistry::register", "registering profile {}", profile.name);
        let mut profiles = self.profiles.write().expect("profile registry lock poisoned");
        profiles.insert(profile.name.clone(), profile);
    }

    pub fn register_alias(&self, alias: &str, target: &str) {
        let mut aliases = self.aliases.write().expect("alias table lock poisoned");
        aliases.insert(alias.to_string(), target.to_string());
    }

    /// Normalizes (trim, lowercase), then resolves by: (1) exact name;
    /// (2) alias table; (3) `default` fallback. Empty input also resolves to
    /// `default`. Always returns a profile — never fails.
    #[instrument(skip(self))]
    pub fn resolve(&self, name: &str) -> PlatformProfile {
        let normalized = name.trim().to_lowercase();

        let profiles = self.profiles.read().expect("profile registry lock poisoned");
        if let Some(profile) = profiles.get(&normalized) {
            return profile.clone();
        }

        if !normalized.is_empty() {
            let aliases = self.aliases.read().expect("alias table lock poisoned");
            if let Some(target) = aliases.get(&normalized) {
                if let Some(profile) = profiles.get(target) {
                    return profile.clone();
                }
            }
        }

        profiles
            .get("default")
            .cloned()
            .expect("default profile must always be registered")
    }
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::with_builtins().expect("builtin profiles must build cleanly")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_exact_name() {
        let registry = PlatformRegistry::with_builtins().unwrap();
        assert_eq!(registry.resolve("cisco_ios").name, "cisco_ios");
    }

    #[test]
    fn resolves_alias() {
        let registry = PlatformRegistry::with_builtins().unwrap();
        assert_eq!(registry.resolve("h3c").name, "h3c_s");
        assert_eq!(registry.resolve("HUAWEI").name, "huawei_s");
    }

    #[test]
    fn falls_back_to_default_for_unknown_and_empty() {
        let registry = PlatformRegistry::with_builtins().unwrap();
        assert_eq!(registry.resolve("").name, "default");
        assert_eq!(registry.resolve("  ").name, "default");
        assert_eq!(registry.resolve("totally-unknown-platform").name, "default");
    }

    #[test]
    fn reregistration_is_last_writer_wins() {
        let registry = PlatformRegistry::with_builtins().unwrap();
        let replaced = crate::profile::PlatformProfile::builder("cisco_ios")
            .enable_required(false)
            .build()
            .unwrap();
        registry.register(replaced);
        assert!(!registry.resolve("cisco_ios").enable_required);
    }
}
