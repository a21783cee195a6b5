//! Node tag propagation.
//!
//! Tags are out-of-band annotations (provenance, labels, trace markers)
//! attached to graph nodes by fingerprint. They live in a thread-local stack
//! of scopes: [`attach_tag`] and [`tags_for`] always address the innermost
//! scope, and [`isolated_tag_scope`] pushes a fresh empty one so a caller can
//! tag nodes without seeing or disturbing the tags of the surrounding scope.
//!
//! Keying by [`Fingerprint`] rather than node pointer means a structurally
//! identical node rebuilt elsewhere (for example after a serialization round
//! trip) still resolves to the same tags.

use std::cell::RefCell;
use std::marker::PhantomData;

use lace_graph::Fingerprint;
use lace_types::Value;
use rustc_hash::FxHashMap;

type TagLayer = FxHashMap<Fingerprint, Vec<(String, Value)>>;

thread_local! {
    static TAG_SCOPES: RefCell<Vec<TagLayer>> = const { RefCell::new(Vec::new()) };
}

fn with_layers<R>(f: impl FnOnce(&mut Vec<TagLayer>) -> R) -> R {
    TAG_SCOPES.with(|scopes| {
        let mut layers = scopes.borrow_mut();
        // The bottom layer is the implicit ambient scope; it is created on
        // first use and never popped.
        if layers.is_empty() {
            layers.push(TagLayer::default());
        }
        f(&mut layers)
    })
}

/// Attach a named tag to the node with the given fingerprint.
///
/// Tags accumulate: attaching the same name twice keeps both entries, and
/// [`tag_value`] resolves to the most recent one.
pub fn attach_tag(fingerprint: Fingerprint, name: impl Into<String>, value: impl Into<Value>) {
    let name = name.into();
    let value = value.into();
    tracing::trace!(%fingerprint, name, "attached tag");
    with_layers(|layers| {
        layers
            .last_mut()
            .expect("ambient tag scope always present")
            .entry(fingerprint)
            .or_default()
            .push((name, value));
    });
}

/// All tags attached to the node in the innermost scope, in attach order.
pub fn tags_for(fingerprint: Fingerprint) -> Vec<(String, Value)> {
    with_layers(|layers| {
        layers
            .last()
            .and_then(|layer| layer.get(&fingerprint))
            .cloned()
            .unwrap_or_default()
    })
}

/// The most recently attached value for `name`, if any.
pub fn tag_value(fingerprint: Fingerprint, name: &str) -> Option<Value> {
    with_layers(|layers| {
        layers
            .last()
            .and_then(|layer| layer.get(&fingerprint))
            .and_then(|tags| {
                tags.iter()
                    .rev()
                    .find(|(tag_name, _)| tag_name == name)
                    .map(|(_, value)| value.clone())
            })
    })
}

/// Enter a fresh tag scope; everything attached inside it is discarded when
/// the guard drops, and the surrounding scope's tags become visible again.
#[must_use = "the scope ends as soon as the guard is dropped"]
pub fn isolated_tag_scope() -> TagScopeGuard {
    with_layers(|layers| layers.push(TagLayer::default()));
    tracing::trace!("entered isolated tag scope");
    TagScopeGuard {
        _not_send: PhantomData,
    }
}

/// RAII handle for one isolated layer on the thread-local tag stack.
///
/// Not `Send`: the guard must drop on the thread whose stack it pushed onto.
pub struct TagScopeGuard {
    _not_send: PhantomData<*const ()>,
}

impl Drop for TagScopeGuard {
    fn drop(&mut self) {
        TAG_SCOPES.with(|scopes| {
            scopes.borrow_mut().pop();
        });
        tracing::trace!("left isolated tag scope");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lace_graph::{Node, fingerprint};

    fn fp(value: i64) -> Fingerprint {
        fingerprint(&Node::constant(value))
    }

    #[test]
    fn test_attach_and_read_back() {
        let node = fp(1);
        attach_tag(node, "origin", "unit-test");
        attach_tag(node, "attempt", 2i64);

        let tags = tags_for(node);
        assert_eq!(tags.len(), 2);
        assert_eq!(tag_value(node, "origin"), Some(Value::from("unit-test")));
        assert_eq!(tag_value(node, "attempt"), Some(Value::Int(2)));
        assert_eq!(tag_value(node, "missing"), None);
    }

    #[test]
    fn test_isolated_scope_hides_and_restores() {
        let node = fp(10);
        attach_tag(node, "outer", true);
        {
            let _scope = isolated_tag_scope();
            assert!(tags_for(node).is_empty());

            attach_tag(node, "inner", false);
            assert_eq!(tag_value(node, "inner"), Some(Value::Bool(false)));
        }
        assert_eq!(tag_value(node, "inner"), None);
        assert_eq!(tag_value(node, "outer"), Some(Value::Bool(true)));
    }

    #[test]
    fn test_latest_attachment_wins() {
        let node = fp(20);
        let _scope = isolated_tag_scope();
        attach_tag(node, "state", "draft");
        attach_tag(node, "state", "final");

        assert_eq!(tag_value(node, "state"), Some(Value::from("final")));
        assert_eq!(tags_for(node).len(), 2);
    }

    #[test]
    fn test_rebuilt_node_resolves_same_tags() {
        let _scope = isolated_tag_scope();
        attach_tag(fingerprint(&Node::constant("key")), "seen", true);

        let rebuilt = Node::constant("key");
        assert_eq!(tag_value(fingerprint(&rebuilt), "seen"), Some(Value::Bool(true)));
    }

    #[test]
    fn test_scopes_are_per_thread() {
        let node = fp(30);
        let _scope = isolated_tag_scope();
        attach_tag(node, "here", 1i64);

        let other = std::thread::spawn(move || tags_for(node)).join().unwrap();
        assert!(other.is_empty());
        assert_eq!(tags_for(node).len(), 1);
    }
}
