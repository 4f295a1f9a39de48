mod common;

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use quickdao::{
    Datasource, OrmError, OrmResult, RequestStyle, TcStatus, TransContext, auto_trans, get_by_id,
    insert, wrap_trans,
};

use common::{ACCOUNTS, Account, MockConnection, MockPool, datasource};

#[tokio::test]
async fn style_none_completes_once() {
    let (pool, ds) = datasource();
    let mut tc = TransContext::new(&ds, RequestStyle::None, "t-none").await.unwrap();
    assert_eq!(tc.status(), TcStatus::Init);
    tc.check().unwrap();

    tc.complete(None).await.unwrap();
    assert_eq!(tc.status(), TcStatus::Invalid);
    tc.complete(None).await.unwrap();

    assert_eq!(pool.events(), vec!["acquire", "close"]);
    assert!(tc.check().unwrap_err().is_invalid_state());
    let err = get_by_id(&tc, &ACCOUNTS, 1, None).await.unwrap_err();
    assert!(err.is_invalid_state());
    assert!(pool.statements().is_empty());
}

#[tokio::test]
async fn write_commits_on_success() {
    let (pool, ds) = datasource();
    let mut acc = Account {
        name: "alice".into(),
        balance: 10,
        ..Default::default()
    };
    let affected = auto_trans(&ds, RequestStyle::Write, "t-ok", async |tc| {
        insert(tc, &ACCOUNTS, &mut acc).await
    })
    .await
    .unwrap();

    assert_eq!(affected, 1);
    assert_eq!(acc.id, 100);
    let events = pool.events();
    assert_eq!(events[..2], ["acquire", "begin"]);
    assert_eq!(events[events.len() - 2..], ["commit", "close"]);
}

#[tokio::test]
async fn read_only_begins_read_only_transaction() {
    let (pool, ds) = datasource();
    auto_trans(&ds, RequestStyle::ReadOnly, "t-ro", async |_tc| Ok(()))
        .await
        .unwrap();
    assert_eq!(pool.events(), vec!["acquire", "begin read only", "commit", "close"]);
}

#[tokio::test]
async fn business_error_rolls_back() {
    let (pool, ds) = datasource();
    let err = auto_trans(&ds, RequestStyle::Write, "t-err", async |tc| -> OrmResult<()> {
        insert(tc, &ACCOUNTS, &mut Account::default()).await?;
        Err(OrmError::Other("insufficient balance".into()))
    })
    .await
    .unwrap_err();

    assert!(matches!(err, OrmError::Other(_)));
    let events = pool.events();
    assert_eq!(pool.journal().count("rollback"), 1);
    assert_eq!(pool.journal().count("commit"), 0);
    assert_eq!(events.last().map(String::as_str), Some("close"));
}

#[tokio::test]
async fn panic_rolls_back_and_resumes() {
    let (pool, ds) = datasource();
    let outcome = AssertUnwindSafe(auto_trans(
        &ds,
        RequestStyle::Write,
        "t-panic",
        async |_tc: &mut TransContext<MockConnection>| -> OrmResult<()> { panic!("boom") },
    ))
    .catch_unwind()
    .await;

    let payload = outcome.unwrap_err();
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"boom"));
    assert_eq!(pool.events(), vec!["acquire", "begin", "rollback", "close"]);
}

#[tokio::test]
async fn dropped_context_discards_connection() {
    let (pool, ds) = datasource();
    let tc = TransContext::new(&ds, RequestStyle::Write, "t-drop").await.unwrap();
    drop(tc);
    assert_eq!(pool.events(), vec!["acquire", "begin", "discard"]);
}

#[tokio::test]
async fn failed_begin_releases_connection() {
    let (pool, ds) = datasource();
    pool.journal().fail_begin = true;
    let err = TransContext::new(&ds, RequestStyle::Write, "t-begin").await.unwrap_err();
    assert!(matches!(err, OrmError::Connection(_)));
    assert_eq!(pool.events(), vec!["acquire", "begin", "close"]);
}

#[tokio::test]
async fn failed_commit_falls_back_to_rollback() {
    let (pool, ds) = datasource();
    pool.journal().fail_commit = true;
    let mut tc = TransContext::new(&ds, RequestStyle::Write, "t-commit").await.unwrap();
    let err = tc.complete(None).await.unwrap_err();
    assert!(matches!(err, OrmError::Connection(ref m) if m == "mock commit failure"));
    assert_eq!(tc.status(), TcStatus::Invalid);
    assert_eq!(
        pool.events(),
        vec!["acquire", "begin", "commit", "rollback", "close"]
    );
}

#[tokio::test]
async fn failed_commit_fails_the_unit_of_work() {
    let (pool, ds) = datasource();
    pool.journal().fail_commit = true;
    let mut acc = Account {
        name: "dana".into(),
        ..Default::default()
    };
    let err = auto_trans(&ds, RequestStyle::Write, "t-lost", async |tc| {
        insert(tc, &ACCOUNTS, &mut acc).await
    })
    .await
    .unwrap_err();

    assert!(matches!(err, OrmError::Connection(ref m) if m == "mock commit failure"));
    assert_eq!(
        pool.events(),
        vec![
            "acquire",
            "begin",
            "insert: insert into accounts(name,balance,operator_id) values(?,?,?)",
            "commit",
            "rollback",
            "close",
        ]
    );
}

#[tokio::test]
async fn complete_with_panic_rolls_back_and_resumes() {
    let (pool, ds) = datasource();
    let mut tc = TransContext::new(&ds, RequestStyle::Write, "t-resume").await.unwrap();
    let outcome = AssertUnwindSafe(tc.complete_with_panic(None, Some(Box::new("boom"))))
        .catch_unwind()
        .await;

    let payload = outcome.unwrap_err();
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"boom"));
    assert_eq!(tc.status(), TcStatus::Invalid);
    assert_eq!(pool.events(), vec!["acquire", "begin", "rollback", "close"]);
}

#[tokio::test]
async fn acquire_is_bounded() {
    let pool = MockPool::new();
    pool.journal().acquire_delay = Some(Duration::from_millis(500));
    let ds = Datasource::new(pool.clone()).acquire_timeout(Duration::from_millis(20));

    let err = TransContext::new(&ds, RequestStyle::None, "t-slow").await.unwrap_err();
    assert!(err.is_timeout());
    assert!(pool.events().is_empty());
}

#[tokio::test]
async fn wrap_trans_hands_back_the_result() {
    let (pool, ds) = datasource();
    pool.push_rows(vec![common::account_row(3, "carol", 30)]);
    let tc = TransContext::new(&ds, RequestStyle::None, "t-wrap").await.unwrap();
    let found = wrap_trans(tc, async |tc| get_by_id(tc, &ACCOUNTS, 3, None).await)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.name, "carol");
    assert_eq!(found.balance, 30);
    assert_eq!(pool.journal().count("close"), 1);
}

#[tokio::test]
async fn shutdown_closes_pools() {
    let (pool, ds) = datasource();
    ds.shutdown();
    assert!(pool.journal().pool_closed);
}
