//! Ordered rule context.
//!
//! # Responsibilities
//! - Hold the ordered rule set of one configuration file in memory
//! - Populate it from a [`ConfigStore`] and write it back atomically
//! - Index-addressed editing: insert, remove, replace, reorder
//!
//! # Data Flow
//! ```text
//! ConfigStore::read ──▶ parse lines ──▶ CfgContext.rules (dirty = false)
//!                                            │ edits (dirty = true)
//!                                            ▼
//! ConfigStore::write(expected = fetched version) ◀── serialize rules
//! ```
//!
//! # Design Decisions
//! - Fetch and commit are all-or-nothing; a failed call leaves the context as it was
//! - Commits are version-checked: a file changed since the fetch is rejected
//! - Blank lines and `#` comments are skipped on fetch and not written back
//! - One owner per context (`&mut self`); share the store, not the context

pub mod store;

use std::sync::Arc;

use crate::error::{MgmtError, MgmtResult, ParseError};
use crate::observability::metrics;
use crate::rules::{FileKind, Rule};

pub use store::{ConfigStore, FileStore, MemoryStore, StoredFile};

/// Parse the text of a configuration file into its rules.
///
/// Fails on the first bad line; the error carries its 1-based line number.
pub fn parse_rules(text: &str, kind: FileKind) -> MgmtResult<Vec<Rule>> {
    text.lines()
        .enumerate()
        .map(|(n, line)| (n + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(n, line)| Rule::parse(line, kind).map_err(|e| MgmtError::Parse(e.at_line(n))))
        .collect()
}

/// Render rules as file text, one line per rule.
///
/// Fails with a `ParseError` on the first rule whose line would not read
/// back as the same rule, so nothing unreadable reaches the store.
pub fn render_rules<'a>(rules: impl IntoIterator<Item = &'a Rule>) -> MgmtResult<String> {
    let mut text = String::new();
    for (n, rule) in rules.into_iter().enumerate() {
        let line = rule.serialize();
        let reread = match line.trim() {
            l if l.is_empty() || l.starts_with('#') || l.contains(['\n', '\r']) => None,
            l => Rule::parse(l, rule.kind()).ok(),
        };
        if reread.as_ref() != Some(rule) {
            let err = ParseError::new(format!("rule does not read back as written: `{}`", line));
            return Err(MgmtError::Parse(err.at_line(n + 1)));
        }
        text.push_str(&line);
        text.push('\n');
    }
    Ok(text)
}

/// In-memory, ordered, editable rule set of one configuration file.
pub struct CfgContext {
    kind: FileKind,
    store: Arc<dyn ConfigStore>,
    rules: Vec<Rule>,
    /// `None` until a fetch or commit has seen the stored file.
    version: Option<u64>,
    dirty: bool,
}

impl std::fmt::Debug for CfgContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CfgContext")
            .field("kind", &self.kind)
            .field("rules", &self.rules.len())
            .field("version", &self.version)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl CfgContext {
    /// Bind an empty context to `kind`. No I/O happens until [`fetch`](Self::fetch).
    pub fn new(kind: FileKind, store: Arc<dyn ConfigStore>) -> Self {
        Self {
            kind,
            store,
            rules: Vec::new(),
            version: None,
            dirty: false,
        }
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Store version observed by the last fetch or commit.
    pub fn version(&self) -> Option<u64> {
        self.version
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Replace the in-memory rules with the persisted ones.
    pub fn fetch(&mut self) -> MgmtResult<()> {
        let file = self.kind.file_name();
        let result = self
            .store
            .read(self.kind)
            .and_then(|stored| Ok((parse_rules(&stored.text, self.kind)?, stored.version)));

        match result {
            Ok((rules, version)) => {
                tracing::debug!(file, rules = rules.len(), version, "Fetched rules");
                metrics::record_context_fetch(file, "ok");
                self.rules = rules;
                self.version = Some(version);
                self.dirty = false;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(file, error = %e, "Fetch rejected");
                metrics::record_context_fetch(file, e.error_type());
                Err(e)
            }
        }
    }

    pub fn count(&self) -> usize {
        self.rules.len()
    }

    fn check_index(&self, index: usize) -> MgmtResult<()> {
        if index < self.rules.len() {
            Ok(())
        } else {
            Err(MgmtError::Index {
                index,
                count: self.rules.len(),
            })
        }
    }

    fn check_kind(&self, rule: &Rule) -> MgmtResult<()> {
        if rule.kind() == self.kind {
            Ok(())
        } else {
            Err(MgmtError::WrongKind {
                expected: self.kind,
                actual: rule.kind(),
            })
        }
    }

    pub fn get_at(&self, index: usize) -> MgmtResult<&Rule> {
        self.rules.get(index).ok_or(MgmtError::Index {
            index,
            count: self.rules.len(),
        })
    }

    /// Mutable access to one rule. Marks the context dirty.
    ///
    /// The returned rule may be edited in place but not swapped for a rule of
    /// another kind; use [`replace_at`](Self::replace_at) for that.
    pub fn get_at_mut(&mut self, index: usize) -> MgmtResult<&mut Rule> {
        self.check_index(index)?;
        self.dirty = true;
        Ok(&mut self.rules[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Remove the rule at `index`, shifting later rules down by one.
    pub fn remove_at(&mut self, index: usize) -> MgmtResult<Rule> {
        self.check_index(index)?;
        self.dirty = true;
        Ok(self.rules.remove(index))
    }

    pub fn append_rule(&mut self, rule: impl Into<Rule>) -> MgmtResult<()> {
        let rule = rule.into();
        self.check_kind(&rule)?;
        self.rules.push(rule);
        self.dirty = true;
        Ok(())
    }

    /// Insert before `index`; `index == count()` appends.
    pub fn insert_at(&mut self, index: usize, rule: impl Into<Rule>) -> MgmtResult<()> {
        let rule = rule.into();
        self.check_kind(&rule)?;
        if index > self.rules.len() {
            return Err(MgmtError::Index {
                index,
                count: self.rules.len(),
            });
        }
        self.rules.insert(index, rule);
        self.dirty = true;
        Ok(())
    }

    /// Replace the rule at `index`, returning the old one.
    pub fn replace_at(&mut self, index: usize, rule: impl Into<Rule>) -> MgmtResult<Rule> {
        let rule = rule.into();
        self.check_kind(&rule)?;
        self.check_index(index)?;
        self.dirty = true;
        Ok(std::mem::replace(&mut self.rules[index], rule))
    }

    pub fn remove_all(&mut self) {
        if !self.rules.is_empty() {
            self.rules.clear();
            self.dirty = true;
        }
    }

    /// Swap the rules at `index` and `index - 1`.
    pub fn move_up(&mut self, index: usize) -> MgmtResult<()> {
        self.check_index(index)?;
        if index == 0 {
            return Err(MgmtError::Index {
                index,
                count: self.rules.len(),
            });
        }
        self.rules.swap(index, index - 1);
        self.dirty = true;
        Ok(())
    }

    /// Swap the rules at `index` and `index + 1`.
    pub fn move_down(&mut self, index: usize) -> MgmtResult<()> {
        self.check_index(index)?;
        if index + 1 == self.rules.len() {
            return Err(MgmtError::Index {
                index,
                count: self.rules.len(),
            });
        }
        self.rules.swap(index, index + 1);
        self.dirty = true;
        Ok(())
    }

    /// Write every rule back as one atomic replacement of the file.
    ///
    /// Rejected with `ConcurrentModification` if the file changed since the
    /// last fetch or commit of this context. A context that never saw the
    /// file may only create it.
    pub fn commit(&mut self) -> MgmtResult<()> {
        let file = self.kind.file_name();
        let result = render_rules(&self.rules).and_then(|text| match self.version {
            Some(version) => self.store.write(self.kind, &text, Some(version)),
            None => self.store.create(self.kind, &text),
        });

        match result {
            Ok(version) => {
                tracing::info!(file, rules = self.rules.len(), version, "Committed rules");
                metrics::record_context_commit(file, "ok");
                self.version = Some(version);
                self.dirty = false;
                Ok(())
            }
            Err(e) => {
                if let MgmtError::ConcurrentModification { expected, actual, .. } = &e {
                    tracing::warn!(file, expected, actual, "Commit rejected: stale version");
                    metrics::record_commit_conflict(file);
                } else {
                    tracing::error!(file, error = %e, "Commit failed");
                }
                metrics::record_context_commit(file, e.error_type());
                Err(e)
            }
        }
    }

    /// Drop the in-memory rules without writing back.
    pub fn destroy(self) {
        if self.dirty {
            tracing::debug!(file = self.kind.file_name(), "Discarding uncommitted edits");
        }
    }
}

impl<'a> IntoIterator for &'a CfgContext {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{PluginRule, StorageRule};

    fn plugin_store(names: &[&str]) -> Arc<dyn ConfigStore> {
        let text = names.iter().map(|n| format!("{}\n", n)).collect::<String>();
        Arc::new(MemoryStore::new().with_file(FileKind::Plugin, text))
    }

    fn names(ctx: &CfgContext) -> Vec<String> {
        ctx.iter()
            .map(|r| match r {
                Rule::Plugin(p) => p.name.clone(),
                other => panic!("unexpected rule {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_plugin_edit_and_commit() {
        let store = plugin_store(&["stats.so /_stats", "# disabled.so", "", "header_rewrite.so a.conf"]);

        let mut ctx = CfgContext::new(FileKind::Plugin, store.clone());
        ctx.fetch().unwrap();
        assert_eq!(ctx.count(), 2);

        ctx.remove_at(1).unwrap();
        assert_eq!(ctx.count(), 1);
        ctx.append_rule(PluginRule::new("new-plugin.so", ["arg1", "arg2"])).unwrap();
        assert_eq!(ctx.count(), 2);
        assert!(ctx.is_dirty());
        ctx.commit().unwrap();
        assert!(!ctx.is_dirty());

        let mut other = CfgContext::new(FileKind::Plugin, store);
        other.fetch().unwrap();
        assert_eq!(other.count(), 2);
        assert_eq!(other.get_at(0).unwrap(), ctx.get_at(0).unwrap());
        assert_eq!(
            other.get_at(1).unwrap(),
            &Rule::Plugin(PluginRule::new("new-plugin.so", ["arg1", "arg2"]))
        );
    }

    #[test]
    fn test_reorder_swaps_first_and_last() {
        let original = ["a.so", "b.so", "c.so", "d.so", "e.so"];
        let mut ctx = CfgContext::new(FileKind::Plugin, plugin_store(&original));
        ctx.fetch().unwrap();
        let n = ctx.count();

        for i in 1..n {
            ctx.move_up(i).unwrap();
        }
        for i in (0..=n - 3).rev() {
            ctx.move_down(i).unwrap();
        }

        assert_eq!(names(&ctx), vec!["e.so", "b.so", "c.so", "d.so", "a.so"]);
    }

    #[test]
    fn test_index_bounds() {
        let mut ctx = CfgContext::new(FileKind::Plugin, plugin_store(&["a.so", "b.so"]));
        ctx.fetch().unwrap();

        assert!(matches!(ctx.get_at(2), Err(MgmtError::Index { index: 2, count: 2 })));
        assert!(ctx.remove_at(2).is_err());
        assert!(ctx.move_up(0).is_err());
        assert!(ctx.move_down(1).is_err());
        assert!(ctx.move_up(2).is_err());
        assert!(ctx.move_down(2).is_err());
        assert!(ctx.replace_at(2, PluginRule::new("x.so", Vec::<String>::new())).is_err());
        assert!(ctx.insert_at(3, PluginRule::new("x.so", Vec::<String>::new())).is_err());
        assert!(!ctx.is_dirty());

        ctx.insert_at(2, PluginRule::new("z.so", Vec::<String>::new())).unwrap();
        ctx.insert_at(0, PluginRule::new("first.so", Vec::<String>::new())).unwrap();
        assert_eq!(names(&ctx), vec!["first.so", "a.so", "b.so", "z.so"]);

        let old = ctx.replace_at(1, PluginRule::new("r.so", Vec::<String>::new())).unwrap();
        assert_eq!(old, Rule::Plugin(PluginRule::new("a.so", Vec::<String>::new())));

        ctx.remove_all();
        assert_eq!(ctx.count(), 0);
        assert!(ctx.move_up(0).is_err());
        assert!(ctx.move_down(0).is_err());
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let mut ctx = CfgContext::new(FileKind::Plugin, plugin_store(&[]));
        let err = ctx
            .append_rule(StorageRule {
                pathname: "/dev/sdb".into(),
                size: None,
            })
            .unwrap_err();
        assert!(matches!(
            err,
            MgmtError::WrongKind {
                expected: FileKind::Plugin,
                actual: FileKind::Storage
            }
        ));
        assert_eq!(ctx.count(), 0);
    }

    #[test]
    fn test_failed_fetch_leaves_context_untouched() {
        let store: Arc<dyn ConfigStore> = Arc::new(MemoryStore::new().with_file(
            FileKind::Storage,
            "/dev/sdb\n/var/cache 12Q\n",
        ));
        let mut ctx = CfgContext::new(FileKind::Storage, store.clone());
        ctx.append_rule(StorageRule {
            pathname: "/mnt".into(),
            size: None,
        })
        .unwrap();

        let err = ctx.fetch().unwrap_err();
        match err {
            MgmtError::Parse(e) => assert_eq!(e.line, Some(2)),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(ctx.count(), 1);
        assert!(ctx.is_dirty());

        let mut missing = CfgContext::new(FileKind::Remap, store);
        assert!(matches!(missing.fetch(), Err(MgmtError::NotFound(_))));
    }

    #[test]
    fn test_stale_commit_conflicts() {
        let store = plugin_store(&["a.so"]);
        let mut first = CfgContext::new(FileKind::Plugin, store.clone());
        let mut second = CfgContext::new(FileKind::Plugin, store.clone());
        first.fetch().unwrap();
        second.fetch().unwrap();

        first.append_rule(PluginRule::new("b.so", Vec::<String>::new())).unwrap();
        first.commit().unwrap();
        assert_eq!(first.version(), Some(1));

        second.remove_all();
        let err = second.commit().unwrap_err();
        assert!(matches!(err, MgmtError::ConcurrentModification { expected: 0, actual: 1, .. }));
        assert!(second.is_dirty());
        assert_eq!(store.read(FileKind::Plugin).unwrap().text, "a.so\nb.so\n");

        second.fetch().unwrap();
        assert_eq!(second.count(), 2);
        second.destroy();
    }

    #[test]
    fn test_unfetched_commit_only_creates() {
        let store = plugin_store(&["a.so", "b.so", "c.so"]);
        let mut blind = CfgContext::new(FileKind::Plugin, store.clone());
        assert_eq!(blind.version(), None);
        blind.append_rule(PluginRule::new("new.so", Vec::<String>::new())).unwrap();

        let err = blind.commit().unwrap_err();
        assert!(matches!(err, MgmtError::ConcurrentModification { .. }));
        assert_eq!(store.read(FileKind::Plugin).unwrap().text, "a.so\nb.so\nc.so\n");
        assert!(blind.is_dirty());

        let mut fresh = CfgContext::new(FileKind::Socks, store.clone());
        assert!(matches!(fresh.fetch(), Err(MgmtError::NotFound(_))));
        fresh.append_rule("no_socks=10.0.0.1".parse::<crate::rules::SocksRule>().unwrap()).unwrap();
        fresh.commit().unwrap();
        assert_eq!(fresh.version(), Some(1));
        assert_eq!(store.read(FileKind::Socks).unwrap().text, "no_socks=10.0.0.1\n");
    }

    #[test]
    fn test_unreadable_rule_is_not_committed() {
        let store = plugin_store(&["a.so"]);
        let mut ctx = CfgContext::new(FileKind::Plugin, store.clone());
        ctx.fetch().unwrap();
        ctx.append_rule(PluginRule::new("multi.so", ["line\nbreak"])).unwrap();

        match ctx.commit().unwrap_err() {
            MgmtError::Parse(e) => assert_eq!(e.line, Some(2)),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(store.read(FileKind::Plugin).unwrap().text, "a.so\n");
        assert_eq!(ctx.version(), Some(0));
    }

    #[test]
    fn test_awkward_values_survive_commit() {
        let store = plugin_store(&[]);
        let mut ctx = CfgContext::new(FileKind::Plugin, store.clone());
        ctx.fetch().unwrap();
        let awkward = [
            PluginRule::new("#x.so", ["a\"b"]),
            PluginRule::new("regex_remap.so", ["say \"hi\"", "back\\slash", "", "k=v;w"]),
        ];
        for rule in awkward.clone() {
            ctx.append_rule(rule).unwrap();
        }
        ctx.commit().unwrap();

        let mut other = CfgContext::new(FileKind::Plugin, store);
        other.fetch().unwrap();
        let fetched: Vec<Rule> = other.iter().cloned().collect();
        let expected: Vec<Rule> = awkward.into_iter().map(Rule::from).collect();
        assert_eq!(fetched, expected);
    }

    #[test]
    fn test_render_refuses_rules_that_do_not_read_back() {
        use crate::rules::{CacheAction, CacheRule, PdSsFormat, Predicate, RemapEndpoint, RemapRule, RemapType, UrlScheme};

        let empty_domain: Rule = CacheRule {
            pdss: PdSsFormat::new(Predicate::Domain(String::new())),
            action: CacheAction::NeverCache,
        }
        .into();
        let mut from = RemapEndpoint::new(UrlScheme::Http, "a.com");
        from.path_prefix = Some(String::new());
        let empty_prefix: Rule = RemapRule {
            remap_type: RemapType::Map,
            from,
            to: RemapEndpoint::new(UrlScheme::Http, "b.com"),
        }
        .into();
        let fine: Rule = PluginRule::new("a.so", Vec::<String>::new()).into();

        for bad in [empty_domain, empty_prefix] {
            let err = render_rules([&fine, &bad]).unwrap_err();
            assert!(matches!(err, MgmtError::Parse(ParseError { line: Some(2), .. })), "{:?}", err);
        }
        assert_eq!(render_rules([&fine]).unwrap(), "a.so\n");
    }
}
