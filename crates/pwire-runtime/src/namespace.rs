#![forbid(unsafe_code)]

//! Resolution of `objchange` paths against the registry namespace.
//!
//! The first segment names either the registry namespace itself (`p`) or a
//! global observable root. Each further segment reads a registry field, a
//! node property (wrapping lazily), or a key of raw JSON.
//!
//! | Outcome                                   | Result                    |
//! |-------------------------------------------|---------------------------|
//! | unknown first segment                     | `RootNotFound`            |
//! | missing intermediate segment              | `SegmentNotFound`         |
//! | final value is a node                     | `Subscription::Direct`    |
//! | final value missing/scalar, parent a node | `Subscription::Filtered`  |
//! | anything else                             | `ObjectNotObservable`     |
//!
//! A missing final segment is not an error: the subscription waits for the
//! property to be written. Such subscriptions report
//! [`Subscription::is_pending`] and are logged at `debug`, so a misspelt
//! leaf shows up in the logs rather than as an alert.

use crate::directive::grammar::ObjectPath;
use crate::error::DirectiveError;
use crate::reactive::{ObservableNode, Value};
use crate::registry::Registry;
use tracing::debug;

/// Where to subscribe for a resolved path.
#[derive(Debug, Clone)]
pub enum Subscription {
    /// The path names an observable node: every change below it counts.
    Direct(ObservableNode),
    /// The path names a plain property of an observable node: only writes
    /// of that property count.
    Filtered {
        parent: ObservableNode,
        property: String,
    },
}

impl Subscription {
    /// Node the subscription is installed on.
    #[must_use]
    pub fn node(&self) -> &ObservableNode {
        match self {
            Self::Direct(node) | Self::Filtered { parent: node, .. } => node,
        }
    }

    /// Whether a change of `property` on [`node`](Self::node) should fire.
    #[must_use]
    pub fn matches(&self, property: &str) -> bool {
        match self {
            Self::Direct(_) => true,
            Self::Filtered { property: p, .. } => p == property,
        }
    }

    /// Filtered on a property its node does not hold yet.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        match self {
            Self::Direct(_) => false,
            Self::Filtered { parent, property } => !parent.contains_key(property),
        }
    }
}

#[derive(Debug, Clone)]
enum Resolved {
    Namespace,
    Node(ObservableNode),
    Raw(serde_json::Value),
    Scalar,
}

impl Resolved {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Node(node) => Some(Self::Node(node)),
            Value::Raw(json) => Some(Self::Raw(json)),
            _ => Some(Self::Scalar),
        }
    }

    fn from_json(json: Option<&serde_json::Value>) -> Option<Self> {
        match json? {
            serde_json::Value::Null => None,
            composite @ (serde_json::Value::Object(_) | serde_json::Value::Array(_)) => {
                Some(Self::Raw(composite.clone()))
            }
            _ => Some(Self::Scalar),
        }
    }

    fn child(&self, registry: &Registry, segment: &str) -> Option<Self> {
        match self {
            Self::Namespace => registry.field(segment).and_then(Self::from_value),
            Self::Node(node) => Self::from_value(node.get(segment)),
            Self::Raw(json) => match json {
                serde_json::Value::Array(items) => {
                    Self::from_json(segment.parse::<usize>().ok().and_then(|i| items.get(i)))
                }
                other => Self::from_json(other.get(segment)),
            },
            Self::Scalar => None,
        }
    }
}

/// Resolve `path` to a subscription target.
pub fn resolve(registry: &Registry, path: &ObjectPath) -> Result<Subscription, DirectiveError> {
    let root = path.root();
    let mut current = if root == registry.config().namespace {
        Resolved::Namespace
    } else if let Some(node) = registry.global(root) {
        Resolved::Node(node)
    } else {
        return Err(DirectiveError::RootNotFound {
            path: path.to_string(),
            root: root.to_owned(),
        });
    };

    let rest = path.rest();
    let mut parent: Option<Resolved> = None;
    for (i, segment) in rest.iter().enumerate() {
        let is_leaf = i + 1 == rest.len();
        match current.child(registry, segment) {
            Some(next) => {
                parent = Some(std::mem::replace(&mut current, next));
            }
            None if is_leaf => {
                // A missing leaf under an observable parent is allowed.
                if let Resolved::Node(node) = current {
                    debug!(path = %path, property = %segment, "objchange leaf not present yet");
                    return Ok(Subscription::Filtered {
                        parent: node,
                        property: segment.clone(),
                    });
                }
                return Err(DirectiveError::SegmentNotFound {
                    path: path.to_string(),
                    segment: segment.clone(),
                });
            }
            None => {
                return Err(DirectiveError::SegmentNotFound {
                    path: path.to_string(),
                    segment: segment.clone(),
                });
            }
        }
    }

    match (current, parent) {
        (Resolved::Node(node), _) => Ok(Subscription::Direct(node)),
        (_, Some(Resolved::Node(parent))) => Ok(Subscription::Filtered {
            parent,
            property: rest.last().cloned().unwrap_or_default(),
        }),
        _ => Err(DirectiveError::ObjectNotObservable {
            path: path.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pwire_core::{Document, Window};
    use serde_json::json;

    fn registry() -> Registry {
        let reg = Registry::with_defaults(Window::new(Document::new()));
        reg.define_field(
            "config",
            json!({"_observable": true, "value": 1, "grid": {"num_x": 2}}),
        );
        reg.define_field("plain", json!({"inner": {"x": 1}}));
        reg
    }

    fn path(raw: &str) -> ObjectPath {
        ObjectPath::parse(raw).unwrap()
    }

    #[test]
    fn node_path_is_direct() {
        let reg = registry();
        let sub = resolve(&reg, &path("p.config.grid")).unwrap();
        assert!(matches!(sub, Subscription::Direct(_)));
        assert!(sub.matches("anything"));
    }

    #[test]
    fn scalar_leaf_is_filtered_on_parent() {
        let reg = registry();
        let sub = resolve(&reg, &path("p.config.value")).unwrap();
        let config = reg.observable_field("config").unwrap();
        assert!(sub.node().ptr_eq(&config));
        assert!(sub.matches("value"));
        assert!(!sub.matches("grid"));
    }

    #[test]
    fn missing_leaf_under_node_is_filtered() {
        let reg = registry();
        let sub = resolve(&reg, &path("p.config.later")).unwrap();
        assert!(sub.matches("later"));
        assert!(sub.is_pending());

        reg.observable_field("config").unwrap().set("later", 1);
        assert!(!sub.is_pending());
        assert!(!resolve(&reg, &path("p.config.value")).unwrap().is_pending());
    }

    #[test]
    fn unknown_root() {
        let reg = registry();
        assert_eq!(
            resolve(&reg, &path("q.config")).unwrap_err(),
            DirectiveError::RootNotFound {
                path: "q.config".into(),
                root: "q".into()
            }
        );
    }

    #[test]
    fn missing_intermediate() {
        let reg = registry();
        assert_eq!(
            resolve(&reg, &path("p.nope.value")).unwrap_err(),
            DirectiveError::SegmentNotFound {
                path: "p.nope.value".into(),
                segment: "nope".into()
            }
        );
    }

    #[test]
    fn plain_data_is_not_observable() {
        let reg = registry();
        assert_eq!(
            resolve(&reg, &path("p.plain.inner.x")).unwrap_err(),
            DirectiveError::ObjectNotObservable {
                path: "p.plain.inner.x".into()
            }
        );
        assert!(resolve(&reg, &path("p")).is_err());
    }

    #[test]
    fn global_roots() {
        let reg = registry();
        let store = ObservableNode::from_json(json!({"items": []}), None).unwrap();
        reg.register_global("store", store.clone());
        let sub = resolve(&reg, &path("store")).unwrap();
        assert!(sub.node().ptr_eq(&store));
        assert!(matches!(
            resolve(&reg, &path("store.items")).unwrap(),
            Subscription::Direct(_)
        ));
    }
}
