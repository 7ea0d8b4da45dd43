//! Environment variable guards for config tests.
//!
//! Every guard restores the previous value (or absence) on drop. Tests that
//! touch the environment should also be `#[serial]`.

/// Restores (or unsets) one variable when dropped.
pub struct EnvGuard {
    key: String,
    prev: Option<String>,
}

impl EnvGuard {
    fn capture(key: &str) -> Self {
        Self {
            key: key.to_string(),
            prev: std::env::var(key).ok(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        unsafe {
            match &self.prev {
                Some(v) => std::env::set_var(&self.key, v),
                None => std::env::remove_var(&self.key),
            }
        }
    }
}

pub fn set_env_guarded(key: &str, val: &str) -> EnvGuard {
    let guard = EnvGuard::capture(key);
    unsafe { std::env::set_var(key, val) }
    guard
}

pub fn unset_env_guarded(key: &str) -> EnvGuard {
    let guard = EnvGuard::capture(key);
    unsafe { std::env::remove_var(key) }
    guard
}

/// Builder over several guards. Dropping restores every key in reverse order.
#[derive(Default)]
pub struct Env {
    guards: Vec<EnvGuard>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, val: &str) -> Self {
        self.guards.push(set_env_guarded(key, val));
        self
    }

    pub fn unset(mut self, key: &str) -> Self {
        self.guards.push(unset_env_guarded(key));
        self
    }

    /// Clears each key so config loading sees only its defaults.
    pub fn clear_all<'a, I>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        for key in keys {
            self.guards.push(unset_env_guarded(key));
        }
        self
    }
}

impl Drop for Env {
    fn drop(&mut self) {
        while let Some(guard) = self.guards.pop() {
            drop(guard);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_restore_previous_state() {
        let key = "HCP_TEST_UTILS_ENV_CHECK";
        {
            let _env = Env::new().set(key, "a").set(key, "b");
            assert_eq!(std::env::var(key).as_deref(), Ok("b"));
        }
        assert!(std::env::var(key).is_err());
    }
}
