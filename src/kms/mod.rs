pub mod cloud;
pub mod local;

use std::{collections::HashMap, sync::Arc};

use crate::{context::Context, model::ProviderId};

/// A key-encryption capability: wraps and unwraps data keys.
///
/// Implementations may block on network I/O; they should give up
/// early once `ctx` reports cancellation.
pub trait Provider: Send + Sync + 'static {
    fn encrypt(&self, ctx: &Context, plaintext: &[u8]) -> anyhow::Result<Vec<u8>>;

    fn decrypt(&self, ctx: &Context, ciphertext: &[u8]) -> anyhow::Result<Vec<u8>>;
}

/// Providers by id, plus the one new and rotated keys are wrapped with.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderId, Arc<dyn Provider>>,
    current: ProviderId,
}

impl ProviderRegistry {
    pub fn new(current: impl Into<ProviderId>) -> Self {
        Self {
            providers: HashMap::new(),
            current: current.into().normalize(),
        }
    }

    pub fn with_provider(
        mut self,
        id: impl Into<ProviderId>,
        provider: Arc<dyn Provider>,
    ) -> Self {
        self.register(id, provider);
        self
    }

    pub fn register(&mut self, id: impl Into<ProviderId>, provider: Arc<dyn Provider>) {
        self.providers.insert(id.into().normalize(), provider);
    }

    /// Same providers, different current id.
    pub fn with_current(mut self, current: impl Into<ProviderId>) -> Self {
        self.current = current.into().normalize();
        self
    }

    pub fn current_id(&self) -> &ProviderId {
        &self.current
    }

    pub fn current(&self) -> Option<&Arc<dyn Provider>> {
        self.providers.get(&self.current)
    }

    /// Look up a provider, resolving legacy aliases first.
    pub fn provider(&self, id: &ProviderId) -> Option<&Arc<dyn Provider>> {
        self.providers.get(&id.normalize())
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("current", &self.current)
            .finish()
    }
}
