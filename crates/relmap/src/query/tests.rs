use super::*;
use crate::condition::{
    Condition, and, between, contains, eq, gt, has_prefix, in_list, in_subquery, is_null, le, or,
};
use crate::dialect::{Dialect, MySql, Postgres, Sqlite};
use crate::error::OrmError;
use crate::expr::{Arg, Expr};
use crate::value::Value;

fn dialects() -> [&'static dyn Dialect; 3] {
    [&MySql, &Postgres, &Sqlite]
}

fn expected<'a>(dialect: &dyn Dialect, mysql: &'a str, postgres: &'a str, sqlite: &'a str) -> &'a str {
    match dialect.name() {
        "mysql" => mysql,
        "postgres" => postgres,
        _ => sqlite,
    }
}

#[test]
fn insert_multiple_rows() {
    for d in dialects() {
        let built = insert("t1")
            .columns(["c1", "c2", "c3"])
            .values(args![false, 0, "v1"])
            .values(args![true, 1, "v2"])
            .expand(d)
            .unwrap();
        assert_eq!(
            built.sql,
            expected(
                d,
                "INSERT INTO `t1` (`c1`,`c2`,`c3`) VALUES (?,?,?),(?,?,?)",
                r#"INSERT INTO "t1" ("c1","c2","c3") VALUES ($1,$2,$3),($4,$5,$6)"#,
                r#"INSERT INTO "t1" ("c1","c2","c3") VALUES (?,?,?),(?,?,?)"#,
            ),
            "{}",
            d.name()
        );
        assert_eq!(
            built.args,
            vec![
                Value::Bool(false),
                Value::Int(0),
                Value::from("v1"),
                Value::Bool(true),
                Value::Int(1),
                Value::from("v2"),
            ]
        );
    }
}

#[test]
fn insert_requires_columns_and_matching_rows() {
    assert!(matches!(
        insert("t").values([1]).expand(&MySql),
        Err(OrmError::Statement { statement: "insert", .. })
    ));
    assert!(insert("t").columns(["a"]).expand(&MySql).is_err());
    assert!(
        insert("t")
            .columns(["a", "b"])
            .values([1])
            .expand(&MySql)
            .is_err()
    );
}

#[test]
fn select_with_every_clause() {
    for d in dialects() {
        let built = select([
            Term::from("t1.c1"),
            Term::from("t2..c2"),
            Term::from(Expr::text("COUNT(DISTINCT `t3.c3`) AS `count`")),
        ])
        .from("t1")
        .from("t2")
        .left_join("t3")
        .using(["c4", "c5"])
        .right_join("t4")
        .on(or([
            Condition::from(Expr::text("`t3.c6`=`t4.c7`")),
            Condition::from(Expr::text("`t3.c8`>`t4.c9`")),
        ]))
        .full_join(Select::new().from("t5").aliased("t6"))
        .filter(eq("t1.c1", 1))
        .filter(in_list("t2..c2", ["v1", "v2", "v3"]))
        .filter(is_null("t3.c6"))
        .group_by("t4.c7")
        .group_by(expr!("`t6.c6` % ?", 2))
        .having(le("count", 3).not())
        .order_by(desc("t3.c8"))
        .order_by(Expr::text("EXTRACT(YEAR FROM `t4.c9`)"))
        .limit(4)
        .offset(5)
        .expand(d)
        .unwrap();

        assert_eq!(
            built.sql,
            expected(
                d,
                "SELECT `t1`.`c1`,`t2.c2`,COUNT(DISTINCT `t3`.`c3`) AS `count` FROM `t1`,`t2` \
                 LEFT JOIN `t3` USING (`c4`,`c5`) \
                 RIGHT JOIN `t4` ON (`t3`.`c6`=`t4`.`c7`) OR (`t3`.`c8`>`t4`.`c9`) \
                 FULL JOIN (SELECT * FROM `t5`) AS `t6` \
                 WHERE (`t1`.`c1`=?) AND (`t2.c2` IN (?,?,?)) AND (`t3`.`c6` IS NULL) \
                 GROUP BY `t4`.`c7`,`t6`.`c6` % ? \
                 HAVING (NOT (`count`<=?)) \
                 ORDER BY `t3`.`c8` DESC,EXTRACT(YEAR FROM `t4`.`c9`) LIMIT 4 OFFSET 5",
                "SELECT \"t1\".\"c1\",\"t2.c2\",COUNT(DISTINCT \"t3\".\"c3\") AS \"count\" FROM \"t1\",\"t2\" \
                 LEFT JOIN \"t3\" USING (\"c4\",\"c5\") \
                 RIGHT JOIN \"t4\" ON (\"t3\".\"c6\"=\"t4\".\"c7\") OR (\"t3\".\"c8\">\"t4\".\"c9\") \
                 FULL JOIN (SELECT * FROM \"t5\") AS \"t6\" \
                 WHERE (\"t1\".\"c1\"=$1) AND (\"t2.c2\" IN ($2,$3,$4)) AND (\"t3\".\"c6\" IS NULL) \
                 GROUP BY \"t4\".\"c7\",\"t6\".\"c6\" % $5 \
                 HAVING (NOT (\"count\"<=$6)) \
                 ORDER BY \"t3\".\"c8\" DESC,EXTRACT(YEAR FROM \"t4\".\"c9\") LIMIT 4 OFFSET 5",
                "SELECT \"t1\".\"c1\",\"t2.c2\",COUNT(DISTINCT \"t3\".\"c3\") AS \"count\" FROM \"t1\",\"t2\" \
                 LEFT JOIN \"t3\" USING (\"c4\",\"c5\") \
                 RIGHT JOIN \"t4\" ON (\"t3\".\"c6\"=\"t4\".\"c7\") OR (\"t3\".\"c8\">\"t4\".\"c9\") \
                 FULL JOIN (SELECT * FROM \"t5\") AS \"t6\" \
                 WHERE (\"t1\".\"c1\"=?) AND (\"t2.c2\" IN (?,?,?)) AND (\"t3\".\"c6\" IS NULL) \
                 GROUP BY \"t4\".\"c7\",\"t6\".\"c6\" % ? \
                 HAVING (NOT (\"count\"<=?)) \
                 ORDER BY \"t3\".\"c8\" DESC,EXTRACT(YEAR FROM \"t4\".\"c9\") LIMIT 4 OFFSET 5",
            ),
            "{}",
            d.name()
        );
        assert_eq!(
            built.args,
            vec![
                Value::Int(1),
                Value::from("v1"),
                Value::from("v2"),
                Value::from("v3"),
                Value::Int(2),
                Value::Int(3),
            ]
        );
    }
}

#[test]
fn select_without_columns_selects_star() {
    let built = select(Vec::<&str>::new()).from("t").expand(&MySql).unwrap();
    assert_eq!(built.sql, "SELECT * FROM `t`");
}

#[test]
fn single_predicate_is_parenthesized() {
    let built = select(["name"])
        .from("users")
        .filter(eq("id", 7))
        .expand(&Postgres)
        .unwrap();
    assert_eq!(built.sql, r#"SELECT "name" FROM "users" WHERE ("id"=$1)"#);
    assert_eq!(built.args, vec![Value::Int(7)]);
}

#[test]
fn empty_conditions_are_skipped() {
    let built = select(["a"])
        .from("t")
        .filter(and(Vec::new()))
        .filter(eq("a", 1))
        .having(or(Vec::new()))
        .expand(&MySql)
        .unwrap();
    assert_eq!(built.sql, "SELECT `a` FROM `t` WHERE (`a`=?)");
}

#[test]
fn select_structural_errors() {
    assert!(matches!(
        select(["a"]).expand(&MySql),
        Err(OrmError::Statement { statement: "select", .. })
    ));

    let both = Select::new()
        .from("t1")
        .inner_join("t2")
        .using(["id"])
        .on(Expr::text("`t1.id`=`t2.id`").into())
        .expand(&MySql);
    match both {
        Err(OrmError::Statement { message, .. }) => {
            assert_eq!(message, "join using columns or on condition, but not both")
        }
        other => panic!("unexpected {other:?}"),
    }

    assert!(Select::new().from("t").using(["id"]).expand(&MySql).is_err());
    assert!(
        Select::new()
            .from(Select::new().from("inner"))
            .expand(&MySql)
            .is_err()
    );
}

#[test]
fn empty_join_conditions_are_skipped() {
    let built = select(["a"])
        .from("t1")
        .inner_join("t2")
        .on(and(Vec::new()))
        .expand(&MySql)
        .unwrap();
    assert_eq!(built.sql, "SELECT `a` FROM `t1` INNER JOIN `t2`");

    let built = select(["a"])
        .from("t1")
        .left_join("t2")
        .on(or(Vec::new()))
        .on(eq("t2.id", 1))
        .expand(&MySql)
        .unwrap();
    assert_eq!(built.sql, "SELECT `a` FROM `t1` LEFT JOIN `t2` ON `t2`.`id`=?");

    let built = select(["a"])
        .from("t1")
        .inner_join("t2")
        .using(["id"])
        .on(and(Vec::new()))
        .expand(&MySql)
        .unwrap();
    assert_eq!(built.sql, "SELECT `a` FROM `t1` INNER JOIN `t2` USING (`id`)");
}

#[test]
fn empty_table_is_rejected() {
    let errors = [
        delete("").expand(&MySql),
        update("").set("a", 1).expand(&MySql),
        insert("").columns(["a"]).values([1]).expand(&MySql),
    ];
    for (result, statement) in errors.into_iter().zip(["delete", "update", "insert"]) {
        match result {
            Err(OrmError::Statement {
                statement: s,
                message,
            }) => {
                assert_eq!(s, statement);
                assert_eq!(message, "empty table");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

#[test]
fn subquery_arguments_are_numbered_in_order() {
    let inner = Select::new()
        .column("id")
        .from("orders")
        .filter(gt("total", 100));
    let built = select(["name"])
        .from("users")
        .filter(eq("active", true))
        .filter(in_subquery("id", Expr::new("(?)", [Arg::from(inner)])))
        .expand(&Postgres)
        .unwrap();
    assert_eq!(
        built.sql,
        r#"SELECT "name" FROM "users" WHERE ("active"=$1) AND ("id" IN (SELECT "id" FROM "orders" WHERE ("total">$2)))"#
    );
    assert_eq!(built.args, vec![Value::Bool(true), Value::Int(100)]);
}

#[test]
fn update_with_filters_order_and_limit() {
    for d in dialects() {
        let built = update("t1")
            .set("c1", true)
            .set("c2", 1)
            .set("c3", "v1")
            .filter(contains("c4", r"\%_"))
            .filter(between("c5", 2, 3))
            .order_by(asc("c6"))
            .limit(4)
            .expand(d)
            .unwrap();
        assert_eq!(
            built.sql,
            expected(
                d,
                "UPDATE `t1` SET `c1`=?,`c2`=?,`c3`=? WHERE (`c4` LIKE ?) AND (`c5` BETWEEN ? AND ?) ORDER BY `c6` ASC LIMIT 4",
                r#"UPDATE "t1" SET "c1"=$1,"c2"=$2,"c3"=$3 WHERE ("c4" LIKE $4) AND ("c5" BETWEEN $5 AND $6) ORDER BY "c6" ASC LIMIT 4"#,
                r#"UPDATE "t1" SET "c1"=?,"c2"=?,"c3"=? WHERE ("c4" LIKE ?) AND ("c5" BETWEEN ? AND ?) ORDER BY "c6" ASC LIMIT 4"#,
            ),
            "{}",
            d.name()
        );
        assert_eq!(
            built.args,
            vec![
                Value::Bool(true),
                Value::Int(1),
                Value::from("v1"),
                Value::from(r"%\\\%\_%"),
                Value::Int(2),
                Value::Int(3),
            ]
        );
    }
}

#[test]
fn update_set_accepts_expressions() {
    let built = update("counters")
        .set("hits", expr!("`hits` + ?", 1))
        .filter(eq("id", 9))
        .expand(&Postgres)
        .unwrap();
    assert_eq!(
        built.sql,
        r#"UPDATE "counters" SET "hits"="hits" + $1 WHERE ("id"=$2)"#
    );
}

#[test]
fn update_without_assignments_fails() {
    assert!(matches!(
        update("t").expand(&MySql),
        Err(OrmError::Statement { statement: "update", .. })
    ));
}

#[test]
fn auto_now_binds_whole_seconds() {
    let built = update("t").auto_now("updated").expand(&MySql).unwrap();
    match &built.args[..] {
        [Value::Timestamp(ts)] => assert_eq!(ts.timestamp_subsec_nanos(), 0),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn delete_with_negated_group() {
    for d in dialects() {
        let built = delete("t1")
            .filter(and([has_prefix("c1", "v1"), gt("c2", 1)]).not())
            .filter(is_null("c3"))
            .order_by(desc("c4"))
            .limit(2)
            .expand(d)
            .unwrap();
        assert_eq!(
            built.sql,
            expected(
                d,
                "DELETE FROM `t1` WHERE ((NOT (`c1` LIKE ?)) OR (NOT (`c2`>?))) AND (`c3` IS NULL) ORDER BY `c4` DESC LIMIT 2",
                r#"DELETE FROM "t1" WHERE ((NOT ("c1" LIKE $1)) OR (NOT ("c2">$2))) AND ("c3" IS NULL) ORDER BY "c4" DESC LIMIT 2"#,
                r#"DELETE FROM "t1" WHERE ((NOT ("c1" LIKE ?)) OR (NOT ("c2">?))) AND ("c3" IS NULL) ORDER BY "c4" DESC LIMIT 2"#,
            ),
            "{}",
            d.name()
        );
        assert_eq!(built.args, vec![Value::from("v1%"), Value::Int(1)]);
    }
}

#[test]
fn delete_without_filters() {
    let built = delete("t").expand(&Sqlite).unwrap();
    assert_eq!(built.sql, r#"DELETE FROM "t""#);
    assert!(built.args.is_empty());
}

#[test]
fn nested_error_surfaces_from_statement() {
    let result = select(["a"])
        .from("t")
        .filter(Expr::text("`broken").into())
        .expand(&MySql);
    assert!(matches!(result, Err(OrmError::Template { .. })));
}
