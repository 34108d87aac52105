use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::*;
use crate::error::{OrmError, SchemaErrorKind};
use crate::value::{Value, ValueKind};

fn camel_to_underline(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn kind_of(err: OrmError) -> SchemaErrorKind {
    match err {
        OrmError::Schema { kind, .. } => kind,
        other => panic!("expected a schema error, got {other:?}"),
    }
}

// ==================== Fixtures ====================

#[derive(Debug, Default)]
struct T1 {
    id: i64,
    c1: String,
    c2: i64,
    c3: String,
}

impl Entity for T1 {
    fn describe(def: &mut EntityDef<Self>) {
        def.field("Id", |t| &t.id, |t| &mut t.id);
        def.field("C1", |t| &t.c1, |t| &mut t.c1);
        def.field("C2", |t| &t.c2, |t| &mut t.c2);
        def.field("C3", |t| &t.c3, |t| &mut t.c3).adapter(
            |t| Ok(t.c3.clone().into_bytes()),
            |t, raw: Vec<u8>| {
                t.c3 = format!("{} world", String::from_utf8_lossy(&raw));
                Ok(())
            },
        );
    }
}

#[derive(Debug, Default)]
struct T2 {
    t1: Option<Box<T1>>,
}

impl Entity for T2 {
    fn describe(def: &mut EntityDef<Self>) {
        def.table("t2");
        def.one_to_one::<T1, _>("T1", |t| &t.t1, |t| &mut t.t1)
            .primary_key();
    }
}

#[derive(Debug, Default)]
struct T3 {
    t2: Option<Box<T2>>,
    cc: i64,
}

impl Entity for T3 {
    fn describe(def: &mut EntityDef<Self>) {
        def.to_one::<T2, _>("T2", |t| &t.t2, |t| &mut t.t2)
            .tag(",foreign_key");
        def.field("CC", |t| &t.cc, |t| &mut t.cc);
    }

    fn column_name(ctx: &ColumnContext<'_>) -> Option<String> {
        Some(match &ctx.relation {
            Some(rel) => format!(
                "{}_{}",
                camel_to_underline(rel.table),
                camel_to_underline(rel.primary_key_column)
            ),
            None => camel_to_underline(ctx.field),
        })
    }
}

#[derive(Debug, Default)]
struct T4 {
    id: String,
    c1: i64,
}

impl Entity for T4 {
    fn describe(def: &mut EntityDef<Self>) {
        def.field("Id", |t| &t.id, |t| &mut t.id).primary_key();
        def.many_to_many::<T1>("T1");
        def.field("C1", |t| &t.c1, |t| &mut t.c1).tag("-");
    }
}

#[derive(Debug, Default)]
struct T5 {
    id: i64,
    ct: DateTime<Utc>,
}

impl Entity for T5 {
    fn describe(def: &mut EntityDef<Self>) {
        def.field("Id", |t| &t.id, |t| &mut t.id);
        def.many_to_many::<T2>("T2").through::<T6>("L", "R");
        def.field("Ct", |t| &t.ct, |t| &mut t.ct).created_at();
    }
}

#[derive(Debug, Default)]
struct T6 {
    id: i64,
    l: Option<Box<T5>>,
    r: Option<Box<T2>>,
}

impl Entity for T6 {
    fn describe(def: &mut EntityDef<Self>) {
        def.field("Id", |t| &t.id, |t| &mut t.id);
        def.many_to_one::<T5, _>("L", |t| &t.l, |t| &mut t.l);
        def.many_to_one::<T2, _>("R", |t| &t.r, |t| &mut t.r);
    }
}

#[derive(Debug, Default)]
struct Node {
    id: i64,
    parent: Option<Box<Node>>,
}

impl Entity for Node {
    fn describe(def: &mut EntityDef<Self>) {
        def.field("Id", |n| &n.id, |n| &mut n.id);
        def.to_one::<Node, _>("Parent", |n| &n.parent, |n| &mut n.parent)
            .marker("foreign_key");
        def.one_to_many::<Node>("Children");
        def.to_many::<Node>("Siblings")
            .tag("TableName|LeftId|RightId,many_to_many");
    }
}

// ==================== Resolution ====================

#[test]
fn scalar_fields_and_adapters() {
    let resolver = Resolver::new();
    let t1 = resolver.resolve::<T1>().unwrap();

    assert_eq!(t1.name(), "T1");
    assert_eq!(t1.table(), "T1");
    assert_eq!(t1.primary_key().unwrap().name(), "Id");
    assert_eq!(t1.auto_increment().unwrap().name(), "Id");
    assert_eq!(t1.columns().count(), 4);

    let mut record = T1::default();
    let c2 = t1.field("C2").unwrap();
    c2.set_value(&mut record, Value::Int(1)).unwrap();
    assert_eq!(c2.get_value(&record).unwrap(), Value::Int(1));

    let c3 = t1.field("C3").unwrap();
    assert!(c3.has_getter() && c3.has_setter());
    c3.set_value(&mut record, Value::from("hello")).unwrap();
    assert_eq!(record.c3, "hello world");
    assert_eq!(
        c3.get_value(&record).unwrap(),
        Value::Bytes(b"hello world".to_vec())
    );
}

#[test]
fn to_one_primary_key_allocates_related_record() {
    let resolver = Resolver::new();
    let t2 = resolver.resolve::<T2>().unwrap();

    assert_eq!(t2.table(), "t2");
    let pk = t2.primary_key().unwrap();
    assert_eq!(pk.column(), "T1Id");
    assert_eq!(pk.kind(), ValueKind::Int);
    assert_eq!(pk.relation(), Some(RelationKind::OneToOne));

    let mut record = T2::default();
    assert_eq!(pk.get_value(&record).unwrap(), Value::Null);
    pk.set_value(&mut record, Value::Int(1)).unwrap();
    assert_eq!(record.t1.as_ref().map(|t| t.id), Some(1));
    assert_eq!(pk.get_value(&record).unwrap(), Value::Int(1));

    pk.set_value(&mut record, Value::Null).unwrap();
    assert!(record.t1.is_none());
}

#[test]
fn column_hook_names_relation_columns() {
    let resolver = Resolver::new();
    let t3 = resolver.resolve::<T3>().unwrap();

    assert_eq!(t3.field("T2").unwrap().column(), "t2_t1_id");
    assert_eq!(t3.field("T2").unwrap().relation(), Some(RelationKind::ManyToOne));
    assert_eq!(t3.field("CC").unwrap().column(), "c_c");
    assert!(t3.primary_key().is_none());
    assert_eq!(t3.columns().count(), 2);
}

#[test]
fn many_to_many_default_names() {
    let resolver = Resolver::new();
    let t4 = resolver.resolve::<T4>().unwrap();

    assert_eq!(t4.fields().len(), 2);
    assert_eq!(t4.columns().count(), 1);
    assert!(t4.field("C1").is_none());

    let rel = t4.field("T1").unwrap();
    assert_eq!(rel.column(), "T1T4");
    assert_eq!(rel.kind(), ValueKind::Any);
    let junction = rel.junction().unwrap();
    assert_eq!(junction.table(), "T1T4");
    assert_eq!(junction.left(), "T4Id");
    assert_eq!(junction.right(), "T1Id");
    assert!(!junction.has_through());
    assert!(t4.column("T1T4").is_none());
}

#[test]
fn many_to_many_through_entity() {
    let resolver = Resolver::new();
    let t5 = resolver.resolve::<T5>().unwrap();

    let rel = t5.field("T2").unwrap();
    let junction = rel.junction().unwrap();
    assert_eq!(junction.table(), "T2T5");
    assert_eq!(junction.left(), "T5Id");
    assert_eq!(junction.right(), "T2T1");
    assert_eq!(junction.through_fields(), Some(("L", "R")));
    assert_eq!(junction.storage_table(), "T6");
    assert_eq!(junction.storage_left(), "T5Id");
    assert_eq!(junction.storage_right(), "T2T1");

    let through = junction.through().unwrap();
    assert!(through.is::<T6>());
    assert!(Arc::ptr_eq(&through, &resolver.cached::<T6>().unwrap()));
    assert!(t5.created_at().unwrap().is_created_at());
}

#[test]
fn self_referencing_entity() {
    let resolver = Resolver::new();
    let node = resolver.resolve::<Node>().unwrap();

    assert_eq!(node.fields().len(), 4);
    assert_eq!(node.columns().count(), 2);
    assert_eq!(node.field("Parent").unwrap().column(), "NodeId");
    assert_eq!(node.field("Children").unwrap().column(), "NodeId");

    let siblings = node.field("Siblings").unwrap().junction().unwrap();
    assert_eq!(siblings.table(), "TableName");
    assert_eq!(siblings.left(), "LeftId");
    assert_eq!(siblings.right(), "RightId");

    let parent = node.field("Parent").unwrap().related().unwrap();
    assert!(Arc::ptr_eq(&parent, &node));
}

#[test]
fn self_referencing_many_to_many_needs_distinct_columns() {
    #[derive(Debug, Default)]
    struct Peer {
        id: i64,
    }

    impl Entity for Peer {
        fn describe(def: &mut EntityDef<Self>) {
            def.field("Id", |n| &n.id, |n| &mut n.id);
            def.many_to_many::<Peer>("Peers");
        }
    }

    let resolver = Resolver::new();
    let err = resolver.resolve::<Peer>().unwrap_err();
    assert_eq!(
        kind_of(err),
        SchemaErrorKind::DuplicateJunctionColumn("PeerId".into())
    );
    assert!(resolver.is_empty());
}

#[test]
fn to_one_chain_reads_through_related_keys() {
    let resolver = Resolver::new();
    let t3 = resolver.resolve::<T3>().unwrap();
    let rel = t3.field("T2").unwrap();
    assert_eq!(rel.kind(), ValueKind::Int);

    let mut record = T3::default();
    rel.set_value(&mut record, Value::Int(9)).unwrap();
    let id = record.t2.as_ref().and_then(|t| t.t1.as_ref()).map(|t| t.id);
    assert_eq!(id, Some(9));
    assert_eq!(rel.get_value(&record).unwrap(), Value::Int(9));
}

#[test]
fn scan_coerces_and_checks_record_type() {
    let resolver = Resolver::new();
    let t1 = resolver.resolve::<T1>().unwrap();
    let mut record = T1::default();

    t1.field("C2").unwrap().scan(&mut record, Value::UInt(5)).unwrap();
    assert_eq!(record.c2, 5);
    t1.field("C1")
        .unwrap()
        .scan(&mut record, Value::Bytes(b"abc".to_vec()))
        .unwrap();
    assert_eq!(record.c1, "abc");

    let err = t1
        .field("C2")
        .unwrap()
        .set_value(&mut record, Value::from("x"))
        .unwrap_err();
    assert!(err.is_conversion());

    let err = t1.field("C2").unwrap().get_value(&T2::default()).unwrap_err();
    assert!(err.to_string().contains("T1.C2"));
}

// ==================== Cache ====================

#[test]
fn cache_returns_shared_descriptors() {
    let resolver = Resolver::new();
    let first = resolver.resolve::<T5>().unwrap();
    let second = resolver.resolve::<T5>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    // T5 reaches T2, T1 and T6
    assert_eq!(resolver.len(), 4);
    let t2 = resolver.resolve::<T2>().unwrap();
    assert!(Arc::ptr_eq(&t2, &resolver.cached::<T2>().unwrap()));

    resolver.clear();
    assert!(resolver.is_empty());
    assert!(resolver.cached::<T5>().is_none());
}

#[test]
fn naming_strategy_is_per_resolver() {
    let resolver = Resolver::with_naming(SnakeCaseNaming::new().with_table_prefix("app_"));
    let node = resolver.resolve::<Node>().unwrap();
    assert_eq!(node.table(), "app_node");
    assert_eq!(node.field("Parent").unwrap().column(), "node_id");
    assert_eq!(node.field("Siblings").unwrap().column(), "TableName");

    let t5 = resolver.resolve::<T5>().unwrap();
    assert_eq!(t5.field("Ct").unwrap().column(), "ct");
    assert_eq!(t5.field("T2").unwrap().column(), "app_t2_t5");
}

// ==================== Validation ====================

macro_rules! entity {
    ($name:ident { $($field:ident: $ty:ty),* $(,)? } |$def:ident| $body:block) => {
        #[derive(Debug, Default)]
        struct $name {
            $($field: $ty),*
        }

        impl Entity for $name {
            fn describe($def: &mut EntityDef<Self>) $body
        }
    };
}

fn resolve_err<T: Entity>() -> SchemaErrorKind {
    kind_of(Resolver::new().resolve::<T>().unwrap_err())
}

#[test]
fn rejects_role_conflicts() {
    entity!(TwoKeys { a: i64, b: i64 } |def| {
        def.field("A", |t| &t.a, |t| &mut t.a).primary_key();
        def.field("B", |t| &t.b, |t| &mut t.b).primary_key();
    });
    assert_eq!(resolve_err::<TwoKeys>(), SchemaErrorKind::MultiplePrimaryKeys);

    entity!(TextCounter { a: String } |def| {
        def.field("A", |t| &t.a, |t| &mut t.a).auto_increment();
    });
    assert_eq!(
        resolve_err::<TextCounter>(),
        SchemaErrorKind::AutoIncrementNotInteger(ValueKind::Text)
    );

    entity!(IntStamp { id: i64, at: i64 } |def| {
        def.field("Id", |t| &t.id, |t| &mut t.id);
        def.field("At", |t| &t.at, |t| &mut t.at).tag(",auto_now");
    });
    assert_eq!(
        resolve_err::<IntStamp>(),
        SchemaErrorKind::TimestampNotTime(ValueKind::Int)
    );

    entity!(BothStamps { id: i64, at: DateTime<Utc> } |def| {
        def.field("Id", |t| &t.id, |t| &mut t.id);
        def.field("At", |t| &t.at, |t| &mut t.at).created_at().updated_at();
    });
    assert_eq!(resolve_err::<BothStamps>(), SchemaErrorKind::TimestampConflict);

    entity!(TwoCreated { id: i64, a: DateTime<Utc>, b: DateTime<Utc> } |def| {
        def.field("Id", |t| &t.id, |t| &mut t.id);
        def.field("A", |t| &t.a, |t| &mut t.a).created_at();
        def.field("B", |t| &t.b, |t| &mut t.b).tag(",created_at");
    });
    assert_eq!(
        resolve_err::<TwoCreated>(),
        SchemaErrorKind::MultipleRoles("auto_now_add")
    );
}

#[test]
fn rejects_bad_adapters() {
    entity!(Mismatch { id: i64, a: String } |def| {
        def.field("Id", |t| &t.id, |t| &mut t.id);
        def.field("A", |t| &t.a, |t| &mut t.a)
            .getter(|t| Ok(t.a.len() as i64))
            .setter(|t, v: String| {
                t.a = v;
                Ok(())
            });
    });
    assert_eq!(
        resolve_err::<Mismatch>(),
        SchemaErrorKind::AdapterKindMismatch {
            getter: ValueKind::Int,
            setter: ValueKind::Text,
        }
    );

    entity!(AdaptedStamp { id: i64, at: DateTime<Utc> } |def| {
        def.field("Id", |t| &t.id, |t| &mut t.id);
        def.field("At", |t| &t.at, |t| &mut t.at)
            .created_at()
            .getter(|t| Ok(t.at));
    });
    assert_eq!(resolve_err::<AdaptedStamp>(), SchemaErrorKind::RoleAdapter);

    entity!(AdaptedLink { id: i64, t1: Option<Box<T1>> } |def| {
        def.field("Id", |t| &t.id, |t| &mut t.id);
        def.many_to_one::<T1, _>("T1", |t| &t.t1, |t| &mut t.t1)
            .getter(|_| Ok(1_i64));
    });
    assert_eq!(resolve_err::<AdaptedLink>(), SchemaErrorKind::RelationAdapter);
}

#[test]
fn rejects_malformed_fields() {
    entity!(Twice { id: i64 } |def| {
        def.field("Id", |t| &t.id, |t| &mut t.id);
        def.field("Id", |t| &t.id, |t| &mut t.id);
    });
    assert_eq!(resolve_err::<Twice>(), SchemaErrorKind::DuplicateField);

    entity!(SameColumn { id: i64, a: i64 } |def| {
        def.field("Id", |t| &t.id, |t| &mut t.id).column("x");
        def.field("A", |t| &t.a, |t| &mut t.a).tag("x");
    });
    assert_eq!(
        resolve_err::<SameColumn>(),
        SchemaErrorKind::DuplicateColumn("x".into())
    );

    entity!(Unknown { id: i64 } |def| {
        def.field("Id", |t| &t.id, |t| &mut t.id).tag(",indexed");
    });
    assert_eq!(
        resolve_err::<Unknown>(),
        SchemaErrorKind::UnknownMarker("indexed".into())
    );

    entity!(Hidden { id: i64 } |def| {
        def.field("Id", |t| &t.id, |t| &mut t.id).skip();
    });
    assert_eq!(resolve_err::<Hidden>(), SchemaErrorKind::NoColumns);

    entity!(PlainRelation { id: i64, a: i64 } |def| {
        def.field("Id", |t| &t.id, |t| &mut t.id);
        def.field("A", |t| &t.a, |t| &mut t.a).marker("many_to_one");
    });
    assert!(matches!(
        resolve_err::<PlainRelation>(),
        SchemaErrorKind::RelationShape(_)
    ));

    entity!(TwoKinds { id: i64, t1: Option<T1> } |def| {
        def.field("Id", |t| &t.id, |t| &mut t.id);
        def.one_to_one::<T1, _>("T1", |t| &t.t1, |t| &mut t.t1)
            .marker("many_to_one");
    });
    assert_eq!(resolve_err::<TwoKinds>(), SchemaErrorKind::MultipleRelations);

    entity!(ManyKey { id: i64 } |def| {
        def.field("Id", |t| &t.id, |t| &mut t.id);
        def.one_to_many::<T3>("T3s").primary_key();
    });
    assert_eq!(resolve_err::<ManyKey>(), SchemaErrorKind::ManyRelationPrimaryKey);

    entity!(LongName { id: i64 } |def| {
        def.field("Id", |t| &t.id, |t| &mut t.id);
        def.many_to_many::<T1>("T1s").column("a|b|c|d");
    });
    assert_eq!(
        resolve_err::<LongName>(),
        SchemaErrorKind::MalformedName("a|b|c|d".into())
    );
}

#[test]
fn rejects_relations_without_keys() {
    entity!(Keyless { t3: Option<Box<T3>> } |def| {
        def.many_to_one::<T3, _>("T3", |t| &t.t3, |t| &mut t.t3);
    });
    assert_eq!(
        resolve_err::<Keyless>(),
        SchemaErrorKind::MissingPrimaryKey("T3".into())
    );

    entity!(Loop { me: Option<Box<Loop>> } |def| {
        def.one_to_one::<Loop, _>("Me", |t| &t.me, |t| &mut t.me)
            .primary_key();
    });
    assert_eq!(resolve_err::<Loop>(), SchemaErrorKind::CyclicPrimaryKey);
}

#[test]
fn rejects_bad_through_entities() {
    entity!(Swapped { id: i64 } |def| {
        def.field("Id", |t| &t.id, |t| &mut t.id);
        def.many_to_many::<T2>("T2").through::<T6>("R", "L");
    });
    assert_eq!(resolve_err::<Swapped>(), SchemaErrorKind::ThroughMismatch);

    entity!(Missing { id: i64 } |def| {
        def.field("Id", |t| &t.id, |t| &mut t.id);
        def.many_to_many::<T2>("T2").through::<T6>("Left", "R");
    });
    assert_eq!(
        resolve_err::<Missing>(),
        SchemaErrorKind::ThroughFieldNotFound("T6.Left".into())
    );

    entity!(NotMany { id: i64, t1: Option<T1> } |def| {
        def.field("Id", |t| &t.id, |t| &mut t.id);
        def.many_to_one::<T1, _>("T1", |t| &t.t1, |t| &mut t.t1)
            .through::<T6>("L", "R");
    });
    assert!(matches!(
        resolve_err::<NotMany>(),
        SchemaErrorKind::RelationShape(_)
    ));
}

#[test]
fn failed_resolution_caches_nothing() {
    entity!(Broken { id: i64, t1: Option<Box<T1>> } |def| {
        def.field("Id", |t| &t.id, |t| &mut t.id);
        def.many_to_one::<T1, _>("T1", |t| &t.t1, |t| &mut t.t1)
            .tag(",bogus");
    });
    let resolver = Resolver::new();
    assert!(resolver.resolve::<Broken>().is_err());
    assert!(resolver.is_empty());
    assert!(resolver.resolve::<T1>().is_ok());
    assert_eq!(resolver.len(), 1);
}
