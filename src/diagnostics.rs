//! Point-in-time views of an injector for debugging and tooling.

#[cfg(feature = "graph-export")]
use serde::Serialize;

#[cfg(feature = "graph-export")]
use crate::error::IocResult;
use crate::injector::{Injector, InjectorScope};
use crate::record::RecordKind;

/// Snapshot of one injector's records.
///
/// Taking a snapshot never constructs anything; `cached` only reports
/// whether a value is already materialized.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Injector, Platform, RecordKind, Token};
///
/// let root = Injector::root(Platform::builder().build());
/// root.set_value(Token::name("port"), 8080u16).unwrap();
///
/// let snapshot = root.snapshot();
/// let port = snapshot.record("port").unwrap();
/// assert_eq!(port.kind, RecordKind::Value);
/// assert!(port.cached);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "graph-export", derive(Serialize))]
pub struct InjectorSnapshot {
    pub id: u64,
    pub scope: InjectorScope,
    pub destroyed: bool,
    /// Id of the parent injector
    pub parent: Option<u64>,
    /// Live children wired into the destroy cascade
    pub children: usize,
    /// Records sorted by token name
    pub records: Vec<RecordSnapshot>,
}

/// One record of an [`InjectorSnapshot`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "graph-export", derive(Serialize))]
pub struct RecordSnapshot {
    pub token: String,
    pub kind: RecordKind,
    pub is_static: bool,
    /// A value is currently materialized
    pub cached: bool,
    pub expires_after_ms: Option<u64>,
    /// Tokens this record depends on
    pub deps: Vec<String>,
    /// Originating class, if known
    pub provider_type: Option<String>,
    /// Contribution count of a multi record
    pub items: usize,
}

impl InjectorSnapshot {
    /// Record for the token rendered as `token`.
    pub fn record(&self, token: &str) -> Option<&RecordSnapshot> {
        self.records.iter().find(|r| r.token == token)
    }

    #[cfg(feature = "graph-export")]
    pub fn to_json(&self) -> IocResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| crate::error::IocError::construction("InjectorSnapshot", e))
    }
}

impl Injector {
    /// Captures this injector's current state.
    pub fn snapshot(&self) -> InjectorSnapshot {
        let mut records: Vec<RecordSnapshot> = self
            .records()
            .iter()
            .map(|record| RecordSnapshot {
                token: record.token.to_string(),
                kind: record.kind(),
                is_static: record.is_static,
                cached: record.has_value(),
                expires_after_ms: record.expires_after.map(|ttl| ttl.as_millis() as u64),
                deps: record.dep_tokens().iter().map(ToString::to_string).collect(),
                provider_type: record.ty.as_ref().map(ToString::to_string),
                items: record.items().len(),
            })
            .collect();
        records.sort_by(|a, b| a.token.cmp(&b.token));

        InjectorSnapshot {
            id: self.id(),
            scope: self.scope().clone(),
            destroyed: self.is_destroyed(),
            parent: self.parent().map(Injector::id),
            children: self.child_count(),
            records,
        }
    }

    /// Text dump of this injector and its ancestors.
    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        let mut s = String::new();
        let mut current = Some(self.clone());
        let mut depth = 0;
        while let Some(injector) = current {
            let snapshot = injector.snapshot();
            let indent = "  ".repeat(depth);
            s.push_str(&format!(
                "{}=== Injector #{} ({:?}, {} children{}) ===\n",
                indent,
                snapshot.id,
                snapshot.scope,
                snapshot.children,
                if snapshot.destroyed { ", destroyed" } else { "" }
            ));
            for record in &snapshot.records {
                s.push_str(&format!("{}  {}: {:?}", indent, record.token, record.kind));
                if record.is_static {
                    s.push_str(" static");
                }
                if let Some(ms) = record.expires_after_ms {
                    s.push_str(&format!(" ttl={}ms", ms));
                }
                if record.cached {
                    s.push_str(" cached");
                }
                if !record.deps.is_empty() {
                    s.push_str(&format!(" <- [{}]", record.deps.join(", ")));
                }
                s.push('\n');
            }
            current = injector.parent().cloned();
            depth += 1;
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Dep, ProviderBinding};
    use crate::platform::Platform;
    use crate::token::Token;
    use crate::traits::Resolver;

    #[test]
    fn snapshot_reports_kinds_deps_and_cache_state() {
        let root = Injector::root(Platform::builder().build());
        root.inject([
            ProviderBinding::value(Token::name("host"), "localhost"),
            ProviderBinding::factory(Token::name("url"), vec![Dep::token(Token::name("host"))], |args| {
                Ok(format!("http://{}", args.get::<&str>(0)?))
            })
            .as_static(),
            ProviderBinding::value(Token::name("hooks"), 1u8).multi(),
            ProviderBinding::value(Token::name("hooks"), 2u8).multi(),
        ])
        .unwrap();

        let before = root.snapshot();
        let url = before.record("url").unwrap();
        assert_eq!(url.kind, RecordKind::Factory);
        assert_eq!(url.deps, vec!["host".to_string()]);
        assert!(!url.cached);
        assert_eq!(before.record("hooks").unwrap().items, 2);

        root.get_token::<String>(&Token::name("url")).unwrap();
        assert!(root.snapshot().record("url").unwrap().cached);
    }

    #[test]
    fn snapshot_tracks_children_and_destroy() {
        let root = Injector::root(Platform::builder().build());
        let child = root.create_child().unwrap();
        assert_eq!(root.snapshot().children, 1);
        assert_eq!(child.snapshot().parent, Some(root.id()));
        child.destroy();
        assert!(child.snapshot().destroyed);
        assert_eq!(root.snapshot().children, 0);
    }

    #[cfg(feature = "diagnostics")]
    #[test]
    fn debug_string_walks_ancestors() {
        let root = Injector::root(Platform::builder().build());
        let child = root.create_child().unwrap();
        child.set_value(Token::name("request"), 1u32).unwrap();
        let dump = child.to_debug_string();
        assert!(dump.contains("request: Value"));
        assert!(dump.contains("Root"));
    }

    #[cfg(feature = "graph-export")]
    #[test]
    fn snapshot_serializes_to_json() {
        let root = Injector::root(Platform::builder().build());
        root.set_value(Token::name("port"), 1u16).unwrap();
        let json = root.snapshot().to_json().unwrap();
        assert!(json.contains("\"token\": \"port\""));
    }
}
