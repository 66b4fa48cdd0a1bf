// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Built-in rule sets.
//!
//! Families are installed in a fixed order: JDBC statements, JDBC prepared
//! statements, HTTP clients, cache client, exception construction, thread
//! pools. Configured rules are added afterwards and win on name collisions.

use super::hook::{HookAction, MethodHookSpec};
use super::target::{InstrumentationTarget, TargetOrigin, UnitKind};

/// Substring marking thread-pool units; such names are never excluded.
pub const THREAD_POOL_MARKER: &str = "ThreadPool";

/// The single-queue worker pool.
pub const THREAD_POOL_UNIT: &str = "java/util/concurrent/ThreadPoolExecutor";

/// The fork/join pool.
pub const FORK_JOIN_POOL_UNIT: &str = "java/util/concurrent/ForkJoinPool";

/// Task submission method hooked on pool units.
pub const SUBMIT_METHOD_NAME: &str = "execute";

/// Signature of the task submission method.
pub const SUBMIT_METHOD_SIGNATURE: &str = "(Ljava/lang/Runnable;)V";

const STATEMENT_UNITS: &[&str] = &[
    "com/mysql/jdbc/StatementImpl",
    "com/mysql/cj/jdbc/StatementImpl",
    "org/postgresql/jdbc/PgStatement",
    "org/sqlite/jdbc3/JDBC3Statement",
    "org/hsqldb/jdbc/JDBCStatement",
    "com/microsoft/sqlserver/jdbc/SQLServerStatement",
    "oracle/jdbc/driver/OracleStatement",
];

const PREPARED_STATEMENT_UNITS: &[&str] = &[
    "com/mysql/jdbc/PreparedStatement",
    "com/mysql/cj/jdbc/ClientPreparedStatement",
    "org/postgresql/jdbc/PgPreparedStatement",
    "org/sqlite/jdbc3/JDBC3PreparedStatement",
    "org/hsqldb/jdbc/JDBCPreparedStatement",
    "com/microsoft/sqlserver/jdbc/SQLServerPreparedStatement",
    "oracle/jdbc/driver/OraclePreparedStatement",
];

const STATEMENT_METHODS: &[&str] = &["execute", "executeQuery", "executeUpdate", "executeLargeUpdate"];

const HTTP_UNITS: &[(&str, &str)] = &[
    ("org/apache/http/impl/client/InternalHttpClient", "doExecute"),
    ("org/apache/http/impl/client/MinimalHttpClient", "doExecute"),
    ("org/apache/http/impl/client/DefaultRequestDirector", "execute"),
    ("okhttp3/RealCall", "execute"),
];

const CACHE_CLIENT_UNIT: &str = "redis/clients/jedis/Jedis";

const CACHE_CLIENT_METHODS: &[&str] = &[
    "get", "set", "setex", "del", "exists", "expire", "incr", "decr", "hget", "hset", "hgetAll",
    "hdel", "lpush", "rpush", "lpop", "rpop", "lrange", "sadd", "smembers", "srem", "zadd",
    "zrange", "mget", "mset", "keys", "eval",
];

const EXCEPTION_UNIT: &str = "java/lang/RuntimeException";

/// Which built-in families to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltInSelection {
    pub enabled: bool,
    pub jdbc: bool,
    pub http: bool,
    pub cache: bool,
}

impl BuiltInSelection {
    /// Every family.
    pub fn all() -> Self {
        Self {
            enabled: true,
            jdbc: true,
            http: true,
            cache: true,
        }
    }

    /// No built-in rules at all.
    pub fn none() -> Self {
        Self {
            enabled: false,
            jdbc: false,
            http: false,
            cache: false,
        }
    }
}

impl Default for BuiltInSelection {
    fn default() -> Self {
        Self::all()
    }
}

impl From<bool> for BuiltInSelection {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::all()
        } else {
            Self::none()
        }
    }
}

/// All selected built-in targets, in installation order.
pub fn built_in_targets(selection: &BuiltInSelection) -> Vec<InstrumentationTarget> {
    if !selection.enabled {
        return Vec::new();
    }

    let mut targets = Vec::new();
    if selection.jdbc {
        targets.extend(statement_targets());
        targets.extend(prepared_statement_targets());
    }
    if selection.http {
        targets.extend(http_targets());
    }
    if selection.cache {
        targets.extend(cache_client_targets());
    }
    targets.extend(exception_targets());
    targets.extend(thread_pool_targets());
    targets
}

fn built_in(name: &str, kind: UnitKind) -> InstrumentationTarget {
    InstrumentationTarget::exact(name, kind).with_origin(TargetOrigin::BuiltIn)
}

/// Plain JDBC statement implementations of the common drivers.
pub fn statement_targets() -> Vec<InstrumentationTarget> {
    STATEMENT_UNITS
        .iter()
        .map(|unit| {
            let mut target = built_in(unit, UnitKind::JdbcStatement);
            for method in STATEMENT_METHODS {
                target.add_hook(MethodHookSpec::new(*method, "", HookAction::SqlStatement));
            }
            target.add_hook(MethodHookSpec::new("executeBatch", "", HookAction::SqlStatement));
            target
        })
        .collect()
}

/// Prepared statement implementations; batch execution gets its own event.
pub fn prepared_statement_targets() -> Vec<InstrumentationTarget> {
    PREPARED_STATEMENT_UNITS
        .iter()
        .map(|unit| {
            let mut target = built_in(unit, UnitKind::JdbcPreparedStatement);
            for method in STATEMENT_METHODS {
                target.add_hook(MethodHookSpec::new(*method, "()Z", HookAction::PreparedStatement));
                target.add_hook(MethodHookSpec::new(
                    *method,
                    "()Ljava/sql/ResultSet;",
                    HookAction::PreparedStatement,
                ));
                target.add_hook(MethodHookSpec::new(*method, "()I", HookAction::PreparedStatement));
            }
            target.add_hook(MethodHookSpec::new("executeBatch", "", HookAction::PreparedStatementBatch));
            target
        })
        .collect()
}

/// Outbound HTTP client entry points.
pub fn http_targets() -> Vec<InstrumentationTarget> {
    HTTP_UNITS
        .iter()
        .map(|(unit, method)| {
            built_in(unit, UnitKind::Http).with_hook(MethodHookSpec::new(*method, "", HookAction::HttpRequest))
        })
        .collect()
}

/// The cache client's command methods.
pub fn cache_client_targets() -> Vec<InstrumentationTarget> {
    let mut target = built_in(CACHE_CLIENT_UNIT, UnitKind::CacheClient);
    for method in CACHE_CLIENT_METHODS {
        target.add_hook(MethodHookSpec::new(*method, "", HookAction::CacheCall).with_report_on_entry(false));
    }
    vec![target]
}

/// Exception construction, feeding the uncaught-exception path.
pub fn exception_targets() -> Vec<InstrumentationTarget> {
    vec![built_in(EXCEPTION_UNIT, UnitKind::Other)
        .with_report_execution_time(false)
        .with_hook(
            MethodHookSpec::new("<init>", "", HookAction::ExceptionThrown).with_report_on_entry(false),
        )]
}

/// The two well-known pools. Both are hooked identically: the submitted task
/// is swapped for a context-propagating wrapper.
pub fn thread_pool_targets() -> Vec<InstrumentationTarget> {
    [THREAD_POOL_UNIT, FORK_JOIN_POOL_UNIT]
        .iter()
        .map(|unit| thread_pool_target(unit).with_origin(TargetOrigin::BuiltIn))
        .collect()
}

/// A thread-pool target for any executor unit.
pub fn thread_pool_target(unit_name: &str) -> InstrumentationTarget {
    InstrumentationTarget::exact(unit_name, UnitKind::ThreadPool)
        .with_report_caught_exceptions(false)
        .with_report_execution_time(true)
        .with_hook(submit_hook())
}

fn submit_hook() -> MethodHookSpec {
    MethodHookSpec::new(
        SUBMIT_METHOD_NAME,
        SUBMIT_METHOD_SIGNATURE,
        HookAction::WrapSubmittedTask { argument_index: 0 },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(targets: &[InstrumentationTarget]) -> Vec<UnitKind> {
        let mut kinds: Vec<UnitKind> = Vec::new();
        for t in targets {
            if kinds.last() != Some(&t.kind()) {
                kinds.push(t.kind());
            }
        }
        kinds
    }

    #[test]
    fn test_fixed_installation_order() {
        let targets = built_in_targets(&BuiltInSelection::all());
        assert_eq!(
            kinds(&targets),
            vec![
                UnitKind::JdbcStatement,
                UnitKind::JdbcPreparedStatement,
                UnitKind::Http,
                UnitKind::CacheClient,
                UnitKind::Other,
                UnitKind::ThreadPool,
            ]
        );
        assert!(targets.iter().all(|t| t.origin() == TargetOrigin::BuiltIn));
    }

    #[test]
    fn test_disabled_installs_nothing() {
        assert!(built_in_targets(&BuiltInSelection::none()).is_empty());
        assert!(built_in_targets(&false.into()).is_empty());
    }

    #[test]
    fn test_family_flags() {
        let selection = BuiltInSelection {
            enabled: true,
            jdbc: false,
            http: false,
            cache: false,
        };
        let targets = built_in_targets(&selection);
        assert_eq!(kinds(&targets), vec![UnitKind::Other, UnitKind::ThreadPool]);
    }

    #[test]
    fn test_thread_pool_targets_hook_submission() {
        let targets = thread_pool_targets();
        let names: Vec<_> = targets.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec![THREAD_POOL_UNIT, FORK_JOIN_POOL_UNIT]);

        for target in &targets {
            assert_eq!(target.kind(), UnitKind::ThreadPool);
            assert!(!target.report_caught_exceptions());
            assert!(target.report_execution_time());
            let hook = &target.hooks()[0];
            assert!(hook.matches(SUBMIT_METHOD_NAME, SUBMIT_METHOD_SIGNATURE));
        }
    }

    #[test]
    fn test_prepared_statement_batch_hook() {
        let target = &prepared_statement_targets()[0];
        let batch = target.hooks().iter().find(|h| h.method_name() == "executeBatch").unwrap();
        assert!(batch.matches("executeBatch", "()[I"));
    }
}
