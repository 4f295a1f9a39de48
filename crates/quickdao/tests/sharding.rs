mod common;

use quickdao::{
    Datasource, Interceptor, Matcher, Modifier, ModInt64ShardingPolicy, OrmError, OrmResult,
    RequestScope, RequestStyle, ScopeValueStamp, TransContext, Value, auto_trans_with_scope,
    delete_by_id, insert, update_by_modifier,
};

use common::{Account, MockPool, SHARDED_ACCOUNTS};

fn sharded() -> (Vec<MockPool>, Datasource<MockPool>) {
    let pools: Vec<MockPool> = (0..3).map(|_| MockPool::new()).collect();
    let ds = Datasource::sharding(pools.clone(), ModInt64ShardingPolicy).unwrap();
    (pools, ds)
}

#[tokio::test]
async fn context_routes_to_datasource_shard() {
    let (pools, ds) = sharded();
    assert!(ds.is_sharding());
    assert_eq!(ds.pool_count(), 3);

    let mut tc = TransContext::new_with_sharding(&ds, RequestStyle::Write, "s-1", 13, 7)
        .await
        .unwrap();
    delete_by_id(&tc, &SHARDED_ACCOUNTS, 5).await.unwrap();
    tc.complete(None).await.unwrap();

    assert!(pools[0].events().is_empty());
    assert!(pools[2].events().is_empty());
    assert_eq!(
        pools[1].statements(),
        vec!["delete from accounts_1 where id = ?"]
    );
}

#[tokio::test]
async fn missing_or_foreign_shard_key_is_rejected() {
    let (pools, ds) = sharded();

    let err = TransContext::new(&ds, RequestStyle::None, "s-2").await.unwrap_err();
    assert!(matches!(err, OrmError::InvalidShardKey));

    let err = TransContext::new_with_sharding(&ds, RequestStyle::None, "s-3", Value::Null, "7")
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::InvalidShardKey));
    assert!(pools.iter().all(|p| p.events().is_empty()));
}

#[test]
fn sharding_needs_at_least_one_pool() {
    let err = Datasource::<MockPool>::sharding(Vec::new(), ModInt64ShardingPolicy).unwrap_err();
    assert!(matches!(err, OrmError::NoDatasource));
}

#[tokio::test]
async fn unset_table_key_uses_base_table() {
    let (pool, ds) = common::datasource();
    let mut tc = TransContext::new(&ds, RequestStyle::None, "s-4").await.unwrap();
    delete_by_id(&tc, &SHARDED_ACCOUNTS, 1).await.unwrap();
    tc.complete(None).await.unwrap();
    assert_eq!(pool.statements(), vec!["delete from accounts where id = ?"]);
}

#[tokio::test]
async fn scope_values_reach_interceptors() {
    let pool = MockPool::new();
    let ds = Datasource::new(pool.clone()).interceptor(ScopeValueStamp::new("operator_id"));
    let scope = RequestScope::new("s-5")
        .with_table_sharding_key(2)
        .with_value("operator_id", 31);

    let mut acc = Account {
        name: "fay".into(),
        ..Default::default()
    };
    auto_trans_with_scope(&ds, RequestStyle::Write, scope, async |tc| -> OrmResult<()> {
        insert(tc, &SHARDED_ACCOUNTS, &mut acc).await?;
        let m = Matcher::new().eq("id", acc.id);
        update_by_modifier(tc, &SHARDED_ACCOUNTS, &Modifier::new().add("name", "fae"), &m).await?;
        Ok(())
    })
    .await
    .unwrap();

    assert_eq!(acc.operator_id, 31);
    assert_eq!(
        pool.statements(),
        vec![
            "insert into accounts_2(name,balance,operator_id) values(?,?,?)",
            "update accounts_2 set name=?,operator_id=? where id = ?",
        ]
    );
    assert_eq!(
        pool.args()[1],
        vec![Value::from("fae"), Value::Int(31), Value::Int(100)]
    );
}

struct RejectAll;

impl Interceptor for RejectAll {
    fn after_trans_begin(&self, scope: &RequestScope) -> OrmResult<()> {
        Err(OrmError::Interceptor(format!("rejected {}", scope.trace_id())))
    }
}

#[tokio::test]
async fn failing_begin_hook_rolls_back() {
    let pool = MockPool::new();
    let ds = Datasource::new(pool.clone()).interceptor(RejectAll);
    let err = TransContext::new(&ds, RequestStyle::Write, "s-6").await.unwrap_err();

    assert!(matches!(err, OrmError::Interceptor(ref m) if m == "rejected s-6"));
    assert_eq!(pool.events(), vec!["acquire", "begin", "rollback", "close"]);
}
