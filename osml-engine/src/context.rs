// Data Context
// Layered Top/Cur/My/Context scopes for identity resolution during template processing

use crate::value::{Array, Value};

use indexmap::IndexMap;
use std::borrow::Cow;
use std::sync::Arc;

/// Reserved scope names, resolved before any data key
pub const TOP: &str = "Top";
pub const CUR: &str = "Cur";
pub const MY: &str = "My";
pub const CONTEXT: &str = "Context";

/// Loop position exposed as `Context.Index` / `Context.Count`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopState {
    pub index: usize,
    pub count: usize,
}

/// Scopes visible to an expression.
///
/// Contexts are immutable: entering a loop or a template invocation
/// produces a new context layered over the parent, so leaving the scope
/// is simply dropping the child.
#[derive(Debug, Clone)]
pub struct DataContext {
    top: Arc<Value>,
    cur: Value,
    my: Arc<IndexMap<String, Value>>,
    vars: IndexMap<String, Value>,
    unique_id: String,
    loop_state: Option<LoopState>,
}

impl DataContext {
    pub fn new(top: Value) -> Self {
        Self {
            top: Arc::new(top),
            cur: Value::Null,
            my: Arc::new(IndexMap::new()),
            vars: IndexMap::new(),
            unique_id: String::new(),
            loop_state: None,
        }
    }

    /// Set `Context.UniqueId`
    pub fn with_unique_id(mut self, id: impl Into<String>) -> Self {
        self.unique_id = id.into();
        self
    }

    /// Child context with a new `Cur`
    pub fn with_cur(&self, cur: Value) -> Self {
        let mut child = self.clone();
        child.cur = cur;
        child
    }

    /// Child context for one loop iteration. `var` additionally binds the
    /// item under a name of its own.
    pub fn with_loop(&self, item: Value, var: Option<&str>, index: usize, count: usize) -> Self {
        let mut child = self.clone();
        if let Some(name) = var {
            child.vars.insert(name.to_string(), item.clone());
        }
        child.cur = item;
        child.loop_state = Some(LoopState { index, count });
        child
    }

    /// Child context for a template invocation with its own `My` scope
    pub fn with_my(&self, my: IndexMap<String, Value>) -> Self {
        let mut child = self.clone();
        child.my = Arc::new(my);
        child
    }

    pub fn top(&self) -> &Value {
        &self.top
    }

    pub fn cur(&self) -> &Value {
        &self.cur
    }

    pub fn my(&self) -> &IndexMap<String, Value> {
        &self.my
    }

    pub fn loop_state(&self) -> Option<LoopState> {
        self.loop_state
    }

    /// The `Context` scope as a map
    pub fn context_value(&self) -> Value {
        let mut map = IndexMap::new();
        map.insert("UniqueId".to_string(), Value::from(self.unique_id.as_str()));
        if let Some(state) = self.loop_state {
            map.insert("Index".to_string(), Value::Int(state.index as i64));
            map.insert("Count".to_string(), Value::Int(state.count as i64));
        }
        Value::Array(Array::Map(map))
    }

    /// Resolve a bare identity.
    ///
    /// Order: reserved scope names, named loop variables, then the keys of
    /// `Cur`, `My` and `Top`. First match wins.
    pub fn resolve(&self, name: &str) -> Option<Value> {
        self.resolve_members(&[name])
    }

    /// Resolve a dotted path such as `Top.viewer.name`. Missing
    /// intermediate members resolve to `None`.
    pub fn resolve_path(&self, path: &str) -> Option<Value> {
        let members: Vec<&str> = path.split('.').collect();
        self.resolve_members(&members)
    }

    /// Resolve an identity followed by member names. Scopes are walked by
    /// reference and only the value at the end of the path is cloned.
    pub fn resolve_members(&self, path: &[&str]) -> Option<Value> {
        let (&first, rest) = path.split_first()?;
        match first {
            TOP => return walk(&self.top, rest),
            CUR => return walk(&self.cur, rest),
            MY => {
                return match rest.split_first() {
                    Some((&key, rest)) => walk(self.my.get(key)?, rest),
                    None => Some(Value::Array(Array::Map((*self.my).clone()))),
                }
            }
            CONTEXT => return walk(&self.context_value(), rest),
            _ => {}
        }

        if let Some(value) = self.vars.get(first) {
            return walk(value, rest);
        }
        if let Some(value) = member(&self.cur, first) {
            return walk(&value, rest);
        }
        if let Some(value) = self.my.get(first) {
            return walk(value, rest);
        }
        walk(&*member(&self.top, first)?, rest)
    }
}

/// Named member of a map, list or object. Objects hand out owned values.
fn member<'v>(value: &'v Value, key: &str) -> Option<Cow<'v, Value>> {
    match value {
        Value::Array(a) => a.get(key).map(Cow::Borrowed),
        Value::Object(o) => o.property(key).map(Cow::Owned),
        _ => None,
    }
}

fn walk(value: &Value, members: &[&str]) -> Option<Value> {
    match members.split_first() {
        Some((&key, rest)) => walk(&*member(value, key)?, rest),
        None => Some(value.clone()),
    }
}

impl Default for DataContext {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> DataContext {
        DataContext::new(Value::map([
            ("Foo", Value::Int(2)),
            ("viewer", Value::map([("name", "Ada")])),
        ]))
    }

    #[test]
    fn test_cur_shadows_top() {
        let ctx = context().with_cur(Value::map([("Foo", 1i64)]));
        assert_eq!(ctx.resolve("Foo"), Some(Value::Int(1)));
        assert_eq!(ctx.resolve_path("Top.Foo"), Some(Value::Int(2)));
    }

    #[test]
    fn test_my_between_cur_and_top() {
        let mut my = IndexMap::new();
        my.insert("Foo".to_string(), Value::Int(3));
        let ctx = context().with_my(my);
        assert_eq!(ctx.resolve("Foo"), Some(Value::Int(3)));

        let ctx = ctx.with_cur(Value::map([("Foo", 1i64)]));
        assert_eq!(ctx.resolve("Foo"), Some(Value::Int(1)));
    }

    #[test]
    fn test_reserved_names_resolve_first() {
        let ctx = DataContext::new(Value::map([("Cur", "shadow")])).with_cur(Value::Int(7));
        assert_eq!(ctx.resolve("Cur"), Some(Value::Int(7)));
    }

    #[test]
    fn test_loop_layering_leaves_parent_untouched() {
        let outer = context().with_loop(Value::from("a"), Some("item"), 1, 3);
        let inner = outer.with_loop(Value::from("x"), None, 0, 2);

        assert_eq!(inner.resolve_path("Context.Index"), Some(Value::Int(0)));
        assert_eq!(inner.resolve_path("Context.Count"), Some(Value::Int(2)));
        assert_eq!(inner.resolve("item"), Some(Value::from("a")));
        assert_eq!(outer.resolve_path("Context.Index"), Some(Value::Int(1)));
        assert_eq!(outer.resolve("Cur"), Some(Value::from("a")));
    }

    #[test]
    fn test_context_without_loop_has_no_index() {
        let ctx = context().with_unique_id("abc");
        assert_eq!(ctx.resolve_path("Context.UniqueId"), Some(Value::from("abc")));
        assert_eq!(ctx.resolve_path("Context.Index"), None);
    }

    #[test]
    fn test_resolve_members_through_scopes() {
        let mut my = IndexMap::new();
        my.insert("person".to_string(), Value::map([("name", "Bo")]));
        let ctx = context().with_my(my).with_cur(Value::map([("viewer", "shadow")]));

        assert_eq!(ctx.resolve_members(&["Top", "viewer", "name"]), Some(Value::from("Ada")));
        assert_eq!(ctx.resolve_members(&["My", "person", "name"]), Some(Value::from("Bo")));
        assert_eq!(ctx.resolve_members(&["person", "name"]), Some(Value::from("Bo")));
        // first segment found in Cur, so the path does not fall through to Top
        assert_eq!(ctx.resolve_members(&["viewer", "name"]), None);
        assert_eq!(ctx.resolve_members(&[]), None);
    }

    #[test]
    fn test_resolve_path_missing() {
        let ctx = context();
        assert_eq!(ctx.resolve_path("viewer.name"), Some(Value::from("Ada")));
        assert_eq!(ctx.resolve_path("viewer.age"), None);
        assert_eq!(ctx.resolve("nobody"), None);
    }
}
