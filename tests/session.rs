//! Session behaviour over real files.

mod common;

use proxy_mgmt::records::{ActionNeeded, Record, RecordValue};
use proxy_mgmt::rules::{PluginRule, RemapRule};
use proxy_mgmt::{FileKind, MgmtError, Rule, Session};

use common::{seed_file, storage_in};

#[test]
fn test_plugin_edit_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    seed_file(dir.path(), "plugin.config", &["stats.so /_stats", "# disabled.so", "header_rewrite.so a.conf"]);

    let session = Session::open(&storage_in(dir.path())).unwrap();
    let mut ctx = session.context(FileKind::Plugin);
    ctx.fetch().unwrap();
    assert_eq!(ctx.count(), 2);

    ctx.remove_at(1).unwrap();
    ctx.append_rule(PluginRule::new("new-plugin.so", ["arg1", "arg2"])).unwrap();
    ctx.commit().unwrap();
    ctx.destroy();
    session.close();

    let session = Session::open(&storage_in(dir.path())).unwrap();
    assert_eq!(session.file_version(FileKind::Plugin).unwrap(), 1);

    let mut ctx = session.context(FileKind::Plugin);
    ctx.fetch().unwrap();
    let rules: Vec<String> = ctx.iter().map(Rule::serialize).collect();
    assert_eq!(rules, vec!["stats.so /_stats", "new-plugin.so arg1 arg2"]);
}

#[test]
fn test_concurrent_contexts_conflict() {
    let dir = tempfile::tempdir().unwrap();
    seed_file(dir.path(), "plugin.config", &["a.so", "b.so"]);
    let session = Session::open(&storage_in(dir.path())).unwrap();

    let mut first = session.context(FileKind::Plugin);
    let mut second = session.context(FileKind::Plugin);
    first.fetch().unwrap();
    second.fetch().unwrap();

    first.move_down(0).unwrap();
    first.commit().unwrap();

    second.remove_all();
    let err = second.commit().unwrap_err();
    assert!(matches!(err, MgmtError::ConcurrentModification { .. }));

    second.fetch().unwrap();
    assert_eq!(second.count(), 2);
    assert_eq!(second.get_at(0).unwrap().serialize(), "b.so");
}

#[test]
fn test_wrong_kind_rejected() {
    let dir = tempfile::tempdir().unwrap();
    seed_file(dir.path(), "plugin.config", &["a.so"]);
    let session = Session::open(&storage_in(dir.path())).unwrap();

    let mut ctx = session.context(FileKind::Plugin);
    ctx.fetch().unwrap();
    let remap: RemapRule = "map http://a.example/ http://b.example/".parse().unwrap();
    assert!(matches!(ctx.append_rule(remap), Err(MgmtError::WrongKind { .. })));
    assert_eq!(ctx.count(), 1);
}

#[test]
fn test_record_overrides_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let session = Session::open(&storage_in(dir.path())).unwrap();
    let action = session
        .set_record("proxy.config.proxy_name", RecordValue::String("edge-01".into()))
        .unwrap();
    assert_eq!(action, ActionNeeded::RereadConfig);

    let report = session
        .set_many([
            Record::new("proxy.config.http.cache.http", RecordValue::Int(0)),
            Record::new("proxy.config.cluster.cluster_port", RecordValue::Int(70000)),
        ])
        .unwrap();
    assert_eq!(report.action, ActionNeeded::Undefined);
    assert_eq!(report.failures().count(), 1);
    session.close();

    let session = Session::open(&storage_in(dir.path())).unwrap();
    assert_eq!(
        session.records().get_string("proxy.config.proxy_name").unwrap(),
        "edge-01"
    );
    assert_eq!(session.records().get_int("proxy.config.http.cache.http").unwrap(), 0);
    assert_eq!(session.records().get_int("proxy.config.cluster.cluster_port").unwrap(), 8086);
}
