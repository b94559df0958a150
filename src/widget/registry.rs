//! Object id → live widget table.
//!
//! At most one widget exists per object id for the life of the session.
//! Construction is serialized by a reentrant lock, so a factory may resolve
//! other widgets (its parent, say) without deadlocking, while two threads
//! resolving the same id never both build it. A factory resolving its own id
//! gets a protocol error instead of a second instance.
//!
//! # Resolution
//!
//! | Entry point | Finds the node by |
//! |-------------|-------------------|
//! | [`WidgetRegistry::resolve`] | scanning the document for the id |
//! | [`WidgetRegistry::resolve_from_any_descendant`] | walking up from any inner node |
//! | [`WidgetRegistry::sweep`] | visiting every node naming a widget type |

// ============================================================================
// Imports
// ============================================================================

use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::dom::{self, Document, NodeId};
use crate::error::{Error, Result};
use crate::identifiers::ObjectId;
use crate::rpc::{Handler, HandlerResult, RemoteReference};
use crate::transport::Connection;

use super::{DefaultWidget, Widget, WidgetBase};

// ============================================================================
// Types
// ============================================================================

/// Builds a widget of one registered type.
pub type WidgetFactory = Arc<dyn Fn(WidgetBase) -> Arc<dyn Widget> + Send + Sync>;

// ============================================================================
// WidgetRegistry
// ============================================================================

/// Live widgets of one session.
pub struct WidgetRegistry {
    /// Connection widget remotes call through.
    connection: Connection,
    /// Page the widgets are bound to.
    document: Arc<dyn Document>,
    /// Type name → factory.
    factories: RwLock<FxHashMap<String, WidgetFactory>>,
    /// Constructed widgets.
    live: Mutex<FxHashMap<ObjectId, Arc<dyn Widget>>>,
    /// Widgets whose `loaded` hook has run.
    loaded: Mutex<FxHashSet<ObjectId>>,
    /// Serializes construction; holds the ids being built on this thread.
    construction: ReentrantMutex<RefCell<FxHashSet<ObjectId>>>,
}

impl fmt::Debug for WidgetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<String> = self.factories.read().keys().cloned().collect();
        types.sort();
        f.debug_struct("WidgetRegistry")
            .field("types", &types)
            .field("live", &self.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// WidgetRegistry - Public API
// ============================================================================

impl WidgetRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(connection: Connection, document: Arc<dyn Document>) -> Self {
        Self {
            connection,
            document,
            factories: RwLock::new(FxHashMap::default()),
            live: Mutex::new(FxHashMap::default()),
            loaded: Mutex::new(FxHashSet::default()),
            construction: ReentrantMutex::new(RefCell::new(FxHashSet::default())),
        }
    }

    /// Registers the factory for nodes naming `type_name`.
    pub fn register_type<F>(&self, type_name: impl Into<String>, factory: F)
    where
        F: Fn(WidgetBase) -> Arc<dyn Widget> + Send + Sync + 'static,
    {
        self.register_factory(type_name, Arc::new(factory));
    }

    /// Registers an already shared factory.
    pub fn register_factory(&self, type_name: impl Into<String>, factory: WidgetFactory) {
        let type_name = type_name.into();
        debug!(type_name = %type_name, "Widget type registered");
        self.factories.write().insert(type_name, factory);
    }

    /// Returns the widget for `object_id` if it has been constructed.
    #[must_use]
    pub fn get(&self, object_id: ObjectId) -> Option<Arc<dyn Widget>> {
        self.live.lock().get(&object_id).cloned()
    }

    /// Returns the widget for `object_id`, constructing it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the document holds zero or several
    /// nodes with that id, or the node names an unregistered type.
    pub fn resolve(&self, object_id: ObjectId) -> Result<Arc<dyn Widget>> {
        if let Some(widget) = self.get(object_id) {
            return Ok(widget);
        }

        let node = dom::find_object_node(self.document.as_ref(), object_id)?;
        self.resolve_node(node, object_id)
    }

    /// Returns the widget owning `node`, constructing it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if neither `node` nor any ancestor carries
    /// an object id, or the owner names an unregistered type.
    pub fn resolve_from_any_descendant(&self, node: NodeId) -> Result<Arc<dyn Widget>> {
        let (owner, object_id) = dom::owning_node(self.document.as_ref(), node)?;
        self.resolve_node(owner, object_id)
    }

    /// Constructs every widget the document names and runs its `loaded`
    /// hook once.
    ///
    /// Nodes that cannot be resolved are logged and skipped. Returns the
    /// number of hooks run.
    pub fn sweep(&self) -> usize {
        let doc = self.document.as_ref();
        let root = doc.root();
        let mut count = 0;

        for node in std::iter::once(root).chain(dom::descendants(doc, root)) {
            if dom::type_name_of(doc, node).is_none() {
                continue;
            }

            let widget = match self.resolve_from_any_descendant(node) {
                Ok(widget) => widget,
                Err(e) => {
                    warn!(node = %node, error = %e, "Widget sweep skipped node");
                    continue;
                }
            };

            if self.loaded.lock().insert(widget.base().object_id()) {
                widget.loaded();
                count += 1;
            }
        }

        debug!(count, "Widget sweep finished");
        count
    }

    /// Routes a peer call to a widget method.
    pub fn invoke(&self, object_id: ObjectId, method: &str, args: Vec<Value>) -> HandlerResult {
        match self.resolve(object_id) {
            Ok(widget) => {
                trace!(object_id = %object_id, method, "Invoking widget method");
                widget.invoke(method, args)
            }
            Err(e) => HandlerResult::error(e),
        }
    }

    /// Returns the number of constructed widgets.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.lock().len()
    }

    /// Returns `true` if no widget has been constructed.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.lock().is_empty()
    }
}

// ============================================================================
// WidgetRegistry - Construction
// ============================================================================

impl WidgetRegistry {
    fn resolve_node(&self, node: NodeId, object_id: ObjectId) -> Result<Arc<dyn Widget>> {
        let building = self.construction.lock();

        if let Some(widget) = self.get(object_id) {
            return Ok(widget);
        }
        if !building.borrow_mut().insert(object_id) {
            return Err(Error::protocol(format!(
                "widget {object_id} resolved while it is being constructed"
            )));
        }
        let _in_progress = InProgress {
            building: &*building,
            object_id,
        };

        let type_name = dom::type_name_of(self.document.as_ref(), node);
        let factory = match type_name.as_deref() {
            Some(name) => Some(self.factories.read().get(name).cloned().ok_or_else(|| {
                Error::protocol(format!("no widget type registered as {name:?}"))
            })?),
            None => None,
        };

        let base = WidgetBase::new(
            node,
            type_name,
            RemoteReference::new(object_id, self.connection.clone()),
            Arc::clone(&self.document),
        );

        let widget: Arc<dyn Widget> = match factory {
            Some(factory) => factory(base),
            None => Arc::new(DefaultWidget::new(base)),
        };

        debug!(object_id = %object_id, node = %node, "Widget constructed");

        self.live.lock().insert(object_id, Arc::clone(&widget));
        Ok(widget)
    }
}

/// Clears an id from the in-construction set, also when a factory panics.
struct InProgress<'a> {
    building: &'a RefCell<FxHashSet<ObjectId>>,
    object_id: ObjectId,
}

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.building.borrow_mut().remove(&self.object_id);
    }
}

// ============================================================================
// Widget Call Export
// ============================================================================

/// Builds the export that routes `(objectId, methodName, args)` peer calls
/// to widgets.
///
/// Holds the registry weakly; once the session is gone, calls fail.
#[must_use]
pub fn widget_call_handler(registry: &Arc<WidgetRegistry>) -> Handler {
    let registry: Weak<WidgetRegistry> = Arc::downgrade(registry);
    Arc::new(move |args| {
        let Some(registry) = registry.upgrade() else {
            return HandlerResult::error(Error::connection_lost("session dropped"));
        };
        match parse_widget_call(args) {
            Ok((object_id, method, args)) => registry.invoke(object_id, &method, args),
            Err(e) => HandlerResult::error(e),
        }
    })
}

fn parse_widget_call(args: Vec<Value>) -> Result<(ObjectId, String, Vec<Value>)> {
    let mut args = args.into_iter();
    let (Some(id), Some(method)) = (args.next(), args.next()) else {
        return Err(Error::protocol("widget call needs an object id and a method name"));
    };

    let object_id = match &id {
        Value::Number(n) => n.as_u64().map(ObjectId::new),
        Value::String(s) => ObjectId::parse(s),
        _ => None,
    }
    .ok_or_else(|| Error::protocol(format!("invalid object id {id}")))?;

    let Value::String(method) = method else {
        return Err(Error::protocol(format!("invalid method name {method}")));
    };

    let call_args = match args.next() {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(values)) => values,
        Some(other) => vec![other],
    };

    Ok((object_id, method, call_args))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use crate::dom::{ATTR_OBJECT_ID, ATTR_TYPE_NAME, MemoryDocument};
    use crate::rpc::ExportRegistry;
    use crate::session::SessionConfig;
    use crate::protocol::{ExchangeRequest, ExchangeResponse};
    use crate::transport::HttpHost;

    struct OfflineHost;

    #[async_trait::async_trait]
    impl HttpHost for OfflineHost {
        async fn exchange(&self, _request: ExchangeRequest) -> Result<ExchangeResponse> {
            Err(Error::transport_failure("offline"))
        }
    }

    struct Counter {
        base: WidgetBase,
        loads: Arc<AtomicUsize>,
    }

    impl Widget for Counter {
        fn base(&self) -> &WidgetBase {
            &self.base
        }

        fn loaded(&self) {
            self.loads.fetch_add(1, Ordering::SeqCst);
        }

        fn invoke(&self, method: &str, args: Vec<Value>) -> HandlerResult {
            match method {
                "echo" => HandlerResult::value(Value::Array(args)),
                _ => HandlerResult::error(Error::protocol(format!("no method {method}"))),
            }
        }
    }

    struct Fixture {
        registry: Arc<WidgetRegistry>,
        doc: Arc<MemoryDocument>,
        builds: Arc<AtomicUsize>,
        loads: Arc<AtomicUsize>,
        counter_node: NodeId,
    }

    fn fixture() -> Fixture {
        let config = SessionConfig::for_location("http://localhost/page").expect("config");
        let connection = Connection::new(
            Arc::new(config),
            Arc::new(OfflineHost),
            Arc::new(ExportRegistry::new()),
        );

        let doc = Arc::new(MemoryDocument::new());
        let counter_node = doc.append(
            doc.root(),
            "div",
            &[(ATTR_OBJECT_ID, "7"), (ATTR_TYPE_NAME, "Counter")],
        );
        doc.append(counter_node, "span", &[("class", "value")]);
        doc.append(doc.root(), "div", &[(ATTR_OBJECT_ID, "8")]);

        let registry = Arc::new(WidgetRegistry::new(connection, doc.clone()));
        let builds = Arc::new(AtomicUsize::new(0));
        let loads = Arc::new(AtomicUsize::new(0));
        {
            let builds = Arc::clone(&builds);
            let loads = Arc::clone(&loads);
            registry.register_type("Counter", move |base| {
                builds.fetch_add(1, Ordering::SeqCst);
                Arc::new(Counter {
                    base,
                    loads: Arc::clone(&loads),
                })
            });
        }

        Fixture {
            registry,
            doc,
            builds,
            loads,
            counter_node,
        }
    }

    #[test]
    fn test_resolve_is_singleton() {
        let f = fixture();
        let a = f.registry.resolve(ObjectId::new(7)).expect("resolve");
        let b = f.registry.resolve(ObjectId::new(7)).expect("resolve");

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(f.builds.load(Ordering::SeqCst), 1);
        assert_eq!(a.base().type_name(), Some("Counter"));
        assert_eq!(a.base().node(), f.counter_node);
    }

    #[test]
    fn test_resolve_from_descendant() {
        let f = fixture();
        let span = f.doc.children(f.counter_node)[0];
        let from_child = f.registry.resolve_from_any_descendant(span).expect("resolve");
        let direct = f.registry.resolve(ObjectId::new(7)).expect("resolve");

        assert!(Arc::ptr_eq(&from_child, &direct));
        assert!(f.registry.resolve_from_any_descendant(f.doc.root()).is_err());
    }

    #[test]
    fn test_untyped_node_gets_default_widget() {
        let f = fixture();
        let widget = f.registry.resolve(ObjectId::new(8)).expect("resolve");
        assert_eq!(widget.base().type_name(), None);
        assert_eq!(widget.base().remote().object_id(), ObjectId::new(8));
    }

    #[test]
    fn test_unknown_type_and_id() {
        let f = fixture();
        f.doc.append(
            f.doc.root(),
            "div",
            &[(ATTR_OBJECT_ID, "9"), (ATTR_TYPE_NAME, "Missing")],
        );

        assert!(f.registry.resolve(ObjectId::new(9)).is_err());
        assert!(f.registry.resolve(ObjectId::new(99)).is_err());
        assert!(f.registry.get(ObjectId::new(9)).is_none());
    }

    #[test]
    fn test_sweep_loads_once() {
        let f = fixture();
        let early = f.registry.resolve(ObjectId::new(7)).expect("resolve");

        assert_eq!(f.registry.sweep(), 1);
        assert_eq!(f.registry.sweep(), 0);

        assert_eq!(f.builds.load(Ordering::SeqCst), 1);
        assert_eq!(f.loads.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(
            &early,
            &f.registry.get(ObjectId::new(7)).expect("live")
        ));
        // Untyped nodes are not swept.
        assert!(f.registry.get(ObjectId::new(8)).is_none());
    }

    #[tokio::test]
    async fn test_widget_call_handler_routes() {
        let f = fixture();
        let handler = widget_call_handler(&f.registry);

        let value = handler(vec![json!(7), json!("echo"), json!([1, "two"])])
            .settle()
            .await
            .expect("ok");
        assert_eq!(value, json!([1, "two"]));

        let value = handler(vec![json!("7"), json!("echo"), json!([])])
            .settle()
            .await
            .expect("ok");
        assert_eq!(value, json!([]));
    }

    #[tokio::test]
    async fn test_widget_call_handler_errors() {
        let f = fixture();
        let handler = widget_call_handler(&f.registry);

        assert!(handler(vec![]).settle().await.is_err());
        assert!(handler(vec![json!(true), json!("echo")]).settle().await.is_err());
        assert!(handler(vec![json!(7), json!("nope")]).settle().await.is_err());
        assert!(handler(vec![json!(8), json!("echo")]).settle().await.is_err());
    }

    #[test]
    fn test_widget_call_handler_after_drop() {
        let f = fixture();
        let handler = widget_call_handler(&f.registry);
        drop(f);

        match handler(vec![json!(7), json!("echo")]) {
            HandlerResult::Ready(Err(e)) => assert!(e.is_connection_lost()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_factory_resolving_itself_is_refused() {
        let f = fixture();
        let attempts = Arc::new(AtomicUsize::new(0));
        let inner: Arc<Mutex<Option<Error>>> = Arc::new(Mutex::new(None));
        {
            let registry = Arc::downgrade(&f.registry);
            let attempts = Arc::clone(&attempts);
            let inner = Arc::clone(&inner);
            f.registry.register_type("Cyclic", move |base| {
                attempts.fetch_add(1, Ordering::SeqCst);
                if let Some(registry) = registry.upgrade() {
                    if let Err(e) = registry.resolve(ObjectId::new(9)) {
                        *inner.lock() = Some(e);
                    }
                }
                Arc::new(DefaultWidget::new(base))
            });
        }
        f.doc.append(
            f.doc.root(),
            "div",
            &[(ATTR_OBJECT_ID, "9"), (ATTR_TYPE_NAME, "Cyclic")],
        );

        let widget = f.registry.resolve(ObjectId::new(9)).expect("resolve");
        let again = f.registry.resolve(ObjectId::new(9)).expect("resolve");

        assert!(Arc::ptr_eq(&widget, &again));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(inner.lock().take().is_some_and(|e| e.is_protocol_error()));
    }

    #[test]
    fn test_factory_may_resolve_other_widgets() {
        let f = fixture();
        {
            let registry = Arc::downgrade(&f.registry);
            f.registry.register_type("Child", move |base| {
                if let Some(registry) = registry.upgrade() {
                    let parent = registry.resolve(ObjectId::new(7));
                    assert!(parent.is_ok());
                }
                Arc::new(DefaultWidget::new(base))
            });
        }
        f.doc.append(
            f.counter_node,
            "div",
            &[(ATTR_OBJECT_ID, "10"), (ATTR_TYPE_NAME, "Child")],
        );

        f.registry.resolve(ObjectId::new(10)).expect("resolve");
        assert_eq!(f.registry.len(), 2);
        assert_eq!(f.builds.load(Ordering::SeqCst), 1);
    }
}
