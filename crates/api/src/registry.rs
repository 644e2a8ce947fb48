//! The process-wide registry of backend instances and their sessions.

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use micro_api_transport::session::{Session, SessionDelegate};
use micro_api_transport::utils::lock;
use once_cell::sync::Lazy;
use tracing::info;

use crate::api::{Api, ApiRoot};

static REGISTRY: Lazy<ApiRegistry> = Lazy::new(ApiRegistry::new);

/// The registry every [`Api`] resolves its pair from.
pub fn registry() -> &'static ApiRegistry {
    &REGISTRY
}

/// Identity of a backend: its concrete type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendId {
    type_id: TypeId,
    name: &'static str,
}

impl BackendId {
    pub fn of<A: 'static>() -> Self {
        Self { type_id: TypeId::of::<A>(), name: type_name::<A>() }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A backend's shared instance together with the session it is the delegate of.
#[derive(Debug, Clone)]
pub struct ApiPair {
    pub instance: Arc<ApiRoot>,
    pub session: Arc<Session>,
}

impl ApiPair {
    fn create<A: Api>(backend: BackendId) -> Self {
        let config = A::default();
        let session_config = config.session_config();
        let handle = config.delegate_queue();

        let instance = Arc::new(ApiRoot::new(backend, Arc::new(config)));
        let delegate: Arc<dyn SessionDelegate> = Arc::clone(&instance) as Arc<dyn SessionDelegate>;
        let session = Arc::new(Session::new(session_config, delegate, handle));

        info!(%backend, "created api instance and session");
        Self { instance, session }
    }
}

/// Maps each backend to its (instance, session) pair.
///
/// Pairs are created on first access and live for the rest of the process.
pub struct ApiRegistry {
    pairs: Mutex<HashMap<BackendId, ApiPair>>,
}

impl ApiRegistry {
    fn new() -> Self {
        Self { pairs: Mutex::new(HashMap::new()) }
    }

    /// Returns the pair of `A`, creating it under the registry lock if this is the first call.
    pub fn get_or_create<A: Api>(&self) -> ApiPair {
        let backend = BackendId::of::<A>();
        let mut pairs = lock(&self.pairs);
        pairs.entry(backend).or_insert_with(|| ApiPair::create::<A>(backend)).clone()
    }

    pub fn get(&self, backend: &BackendId) -> Option<ApiPair> {
        lock(&self.pairs).get(backend).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.pairs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ApiRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRegistry").field("backends", &self.len()).finish()
    }
}
