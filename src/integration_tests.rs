//! # Integration Tests Module
//!
//! End-to-end tests across the connection and statement layers, run against
//! real database files.

#[cfg(test)]
mod tests {
    use crate::core::db::{Connection, StatementState, StepResult, Value};
    use crate::core::BindingError;
    use crate::test_utils::{collect_rows, error_testing, DatabaseFixture};

    /// The scenario the binding was written for
    #[test]
    fn test_end_to_end_scenario() {
        let fixture = DatabaseFixture::new("testdb").unwrap();
        let mut db = fixture.open().unwrap();

        assert!(db.execute("create table t (a,b,c);").unwrap());

        let mut st = db.prepare("insert into t (a,b,c) values (1,2,3);").unwrap();
        assert_eq!(st.bind_parameter_count().unwrap(), 0);
        assert_eq!(st.step().unwrap(), StepResult::Done);
        st.finalize();
        drop(st);
        assert!(db.last_insert_rowid().unwrap() > 0);

        let mut st = db.prepare("select * from t;").unwrap();
        assert_eq!(st.step().unwrap(), StepResult::Row);
        assert_eq!(st.column_count().unwrap(), 3);
        assert_eq!(st.column_value(0).unwrap(), Value::Integer(1));
        st.finalize();
        drop(st);

        db.close().unwrap();
    }

    /// Values come back with the type they were bound with
    #[test]
    fn test_bind_round_trip_preserves_type() {
        let fixture = DatabaseFixture::new("round_trip").unwrap();
        let db = fixture.open().unwrap();
        assert!(db.execute("create table v (x);").unwrap());

        let values = vec![
            Value::Null,
            Value::Integer(-7),
            Value::Real(3.5),
            Value::Text("héllo".to_string()),
            Value::Blob(vec![0, 1, 254, 255]),
            Value::Blob(Vec::new()),
        ];

        let mut insert = db.prepare("insert into v (x) values (?1);").unwrap();
        for value in &values {
            insert.bind(1, value.clone()).unwrap();
            assert_eq!(insert.step().unwrap(), StepResult::Done);
            insert.reset().unwrap();
        }
        insert.finalize();

        let mut select = db.prepare("select x from v order by rowid;").unwrap();
        let rows = collect_rows(&mut select).unwrap();
        let read: Vec<Value> = rows.into_iter().map(|mut row| row.remove(0)).collect();
        assert_eq!(read, values);
    }

    /// last_insert_rowid is connection-scoped, not statement-scoped
    #[test]
    fn test_last_insert_rowid_spans_statements() {
        let fixture = DatabaseFixture::with_sample_table("rowid").unwrap();
        let db = fixture.open().unwrap();

        let mut st = db.prepare("insert into t (a) values (?1);").unwrap();
        st.bind(1, "via statement").unwrap();
        assert_eq!(st.step().unwrap(), StepResult::Done);
        assert_eq!(db.last_insert_rowid().unwrap(), 3);

        assert!(db.execute("insert into t (a) values ('via execute');").unwrap());
        assert_eq!(db.last_insert_rowid().unwrap(), 4);
    }

    /// Another connection holding an exclusive lock makes step report busy
    #[test]
    fn test_busy_is_reported_and_retryable() {
        let fixture = DatabaseFixture::with_sample_table("busy").unwrap();
        let writer = fixture.open().unwrap();
        let reader = fixture.open().unwrap();

        let mut st = reader.prepare("select a from t order by rowid;").unwrap();
        assert!(writer.execute("begin exclusive;").unwrap());

        assert_eq!(st.step().unwrap(), StepResult::Busy);
        assert_eq!(st.state(), StatementState::Ready);

        assert!(writer.execute("commit;").unwrap());
        assert_eq!(st.step().unwrap(), StepResult::Row);
        assert_eq!(st.column_value(0).unwrap(), Value::Integer(1));
    }

    /// A value bound between a busy step and its retry is the one written
    #[test]
    fn test_bind_after_busy_applies_to_retry() {
        let fixture = DatabaseFixture::with_sample_table("busy_bind").unwrap();
        let writer = fixture.open().unwrap();
        let reader = fixture.open().unwrap();

        let mut st = reader.prepare("insert into t (a) values (?1);").unwrap();
        st.bind(1, 1).unwrap();
        assert!(writer.execute("begin exclusive;").unwrap());

        assert_eq!(st.step().unwrap(), StepResult::Busy);
        assert_eq!(st.state(), StatementState::Ready);
        st.bind(1, 99).unwrap();

        assert!(writer.execute("commit;").unwrap());
        assert_eq!(st.step().unwrap(), StepResult::Done);
        st.finalize();

        let mut select = reader
            .prepare("select a from t order by rowid desc limit 1;")
            .unwrap();
        assert_eq!(
            collect_rows(&mut select).unwrap(),
            vec![vec![Value::Integer(99)]]
        );
    }

    /// Late bind on a running insert takes effect after reset
    #[test]
    fn test_late_bind_before_reset() {
        let fixture = DatabaseFixture::new("late_bind").unwrap();
        let db = fixture.open().unwrap();
        assert!(db.execute("create table t (a);").unwrap());

        let mut st = db.prepare("insert into t (a) values (?1);").unwrap();
        st.bind(1, 10).unwrap();
        assert_eq!(st.step().unwrap(), StepResult::Done);
        st.bind(1, 20).unwrap();
        st.reset().unwrap();
        assert_eq!(st.step().unwrap(), StepResult::Done);
        st.finalize();

        let mut select = db.prepare("select a from t order by rowid;").unwrap();
        let rows = collect_rows(&mut select).unwrap();
        assert_eq!(
            rows,
            vec![vec![Value::Integer(10)], vec![Value::Integer(20)]]
        );
    }

    /// Finalizing twice leaves the connection usable
    #[test]
    fn test_double_finalize_keeps_connection_healthy() {
        let fixture = DatabaseFixture::with_sample_table("finalize").unwrap();
        let mut db = fixture.open().unwrap();
        {
            let mut st = db.prepare("select * from t;").unwrap();
            assert_eq!(st.step().unwrap(), StepResult::Row);
            st.finalize();
            st.finalize();
        }
        let mut count = db.prepare("select count(*) from t;").unwrap();
        assert_eq!(collect_rows(&mut count).unwrap(), vec![vec![Value::Integer(2)]]);
        count.finalize();
        drop(count);
        db.close().unwrap();
    }

    /// Failures leave a useful message behind
    #[test]
    fn test_error_message_quality() {
        let fixture = DatabaseFixture::new("errors").unwrap();
        let db = fixture.open().unwrap();

        assert!(!db.execute("insert into nowhere values (1);").unwrap());
        error_testing::verify_error_message_quality(
            &db.last_error_message().unwrap(),
            "execute against missing table",
        );

        let result = db.prepare("select from where");
        error_testing::assert_error_type(
            &result,
            |e| matches!(e, BindingError::Prepare(_)),
            "malformed SQL should fail to prepare",
        );
    }

    /// The database written by one connection is readable by the next
    #[test]
    fn test_reopen_sees_committed_rows() {
        let fixture = DatabaseFixture::with_sample_table("reopen").unwrap();
        let db = fixture.open().unwrap();
        let mut st = db.prepare("select a, b, c from t order by rowid;").unwrap();
        let rows = collect_rows(&mut st).unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)],
                vec![
                    Value::Text("x".into()),
                    Value::Real(2.5),
                    Value::Blob(vec![1, 2])
                ],
            ]
        );
    }

    /// Read-only connections report write failures through execute
    #[test]
    fn test_read_only_connection_rejects_writes() {
        let fixture = DatabaseFixture::with_sample_table("read_only").unwrap();
        let options = crate::core::db::OpenOptions {
            read_only: true,
            ..Default::default()
        };
        let db = fixture.open_with(&options).unwrap();
        assert!(!db.execute("insert into t values (7, 8, 9);").unwrap());
        assert!(db.last_error_message().unwrap().contains("readonly"));
    }

    #[test]
    fn test_open_on_fixture_path_creates_file() {
        let fixture = DatabaseFixture::new("created").unwrap();
        assert!(!fixture.path.exists());
        let _db: Connection = fixture.open().unwrap();
        assert!(fixture.path.exists());
    }
}
