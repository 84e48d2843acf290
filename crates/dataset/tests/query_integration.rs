//! End-to-end query scenarios over the shapes/colors/sides collections.

use quill_core::{Error, Record, Value};
use quill_dataset::{
    alter, assign, delete, desc, select, select_all, update, Collection, Expr, Operand,
};

fn shapes() -> Collection {
    Collection::with_name(
        vec![
            Record::from_iter([("name", Value::from("triangle"))]),
            Record::from_iter([("name", Value::from("square"))]),
            Record::from_iter([("name", Value::from("octogon"))]),
        ],
        "Shapes",
    )
}

fn colors() -> Collection {
    Collection::with_name(
        vec![
            Record::from_iter([("name", Value::from("red"))]),
            Record::from_iter([("name", Value::from("blue"))]),
        ],
        "Colors",
    )
}

fn sides() -> Collection {
    Collection::with_name(
        vec![
            Record::from_iter([("shape", Value::from("triangle")), ("sides", Value::from(3i64))]),
            Record::from_iter([("shape", Value::from("square")), ("sides", Value::from(4i64))]),
            Record::from_iter([("shape", Value::from("octogon")), ("sides", Value::from(8i64))]),
        ],
        "Sides",
    )
}

fn full_dataset() -> Collection {
    Collection::with_name(
        vec![
            Record::from_iter([
                ("shape", Value::from("triangle")),
                ("color", Value::from("red")),
                ("sides", Value::from(3i64)),
            ]),
            Record::from_iter([
                ("shape", Value::from("triangle")),
                ("color", Value::from("blue")),
                ("sides", Value::from(3i64)),
            ]),
            Record::from_iter([
                ("shape", Value::from("square")),
                ("color", Value::from("red")),
                ("sides", Value::from(4i64)),
            ]),
            Record::from_iter([
                ("shape", Value::from("square")),
                ("color", Value::from("blue")),
                ("sides", Value::from(4i64)),
            ]),
        ],
        "FullDataset",
    )
}

#[test]
fn simple_join_yields_every_pair_in_order() {
    let shapes = shapes();
    let colors = colors();

    let result = select([
        shapes.field("name").as_("shape"),
        colors.field("name").as_("color"),
    ])
    .from_(&shapes)
    .join(&colors)
    .execute()
    .unwrap();

    let expected: Vec<Record> = [
        ("triangle", "red"),
        ("triangle", "blue"),
        ("square", "red"),
        ("square", "blue"),
        ("octogon", "red"),
        ("octogon", "blue"),
    ]
    .into_iter()
    .map(|(shape, color)| {
        Record::from_iter([("shape", Value::from(shape)), ("color", Value::from(color))])
    })
    .collect();
    assert_eq!(result.records(), expected);
}

#[test]
fn join_with_on_and_where() {
    let shapes = shapes();
    let colors = colors();
    let sides = sides();

    let fields = vec![
        Expr::from(shapes.field("name").as_("shape")),
        Expr::from(colors.field("name").as_("color")),
        Expr::from(sides.field("sides")),
    ];
    let query = select(fields)
        .from_(&shapes)
        .join(&colors)
        .join(&sides)
        .on(shapes.field("name").eq(sides.field("shape")))
        .where_(sides.field("sides").ge(3).and(sides.field("sides").le(6)));

    let result = query.execute().unwrap();
    assert_eq!(result.records(), full_dataset().records());
}

#[test]
fn order_by_desc_then_asc_with_limit() {
    let full = full_dataset();

    let result = select_all()
        .from_(&full)
        .order_by([desc(full.field("sides")), full.field("color").into()])
        .limit(2)
        .execute()
        .unwrap();

    let records = full.records();
    assert_eq!(result.records(), vec![records[3].clone(), records[2].clone()]);
}

#[test]
fn identity_projection_round_trip() {
    let full = full_dataset();
    let result = select_all().from_(&full).execute().unwrap();
    assert_eq!(result.records(), full.records());
}

#[test]
fn update_computes_derived_fields() {
    let full = full_dataset();

    fn capitalize(args: &[Value]) -> Option<Value> {
        let text = args[0].as_str()?;
        let mut chars = text.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        };
        Some(Value::String(capitalized))
    }

    update(&full)
        .set_([
            assign(
                full.field("description"),
                full.field("color")
                    .func("capitalize", capitalize, Vec::new())
                    .add(" ")
                    .add(full.field("shape")),
            ),
            assign(full.field("even"), full.field("sides").rem(2).eq(0)),
        ])
        .execute()
        .unwrap();

    let expected = vec![
        ("Red triangle", false),
        ("Blue triangle", false),
        ("Red square", true),
        ("Blue square", true),
    ];
    for (record, (description, even)) in full.records().iter().zip(expected) {
        assert_eq!(record.value("description"), Value::from(description));
        assert_eq!(record.value("even"), Value::from(even));
    }
}

#[test]
fn update_reads_pre_update_snapshot() {
    let polygons = Collection::new(vec![Record::from_iter([("sides", Value::from(4i64))])]);

    update(&polygons)
        .set_([
            assign(polygons.field("even"), polygons.field("sides").rem(2).eq(0)),
            assign(polygons.field("sides"), polygons.field("sides").add(1)),
        ])
        .execute()
        .unwrap();

    // `even` was computed from the pre-update sides (4), not the new value.
    let record = &polygons.records()[0];
    assert_eq!(record.value("sides"), Value::Int64(5));
    assert_eq!(record.value("even"), Value::Boolean(true));
}

#[test]
fn sequential_updates_observe_each_other() {
    let polygons = Collection::new(vec![Record::from_iter([("sides", Value::from(4i64))])]);

    update(&polygons)
        .set_([assign(polygons.field("sides"), polygons.field("sides").add(1))])
        .execute()
        .unwrap();
    update(&polygons)
        .set_([assign(polygons.field("even"), polygons.field("sides").rem(2).eq(0))])
        .execute()
        .unwrap();

    let record = &polygons.records()[0];
    assert_eq!(record.value("sides"), Value::Int64(5));
    assert_eq!(record.value("even"), Value::Boolean(false));
}

#[test]
fn delete_matching_records() {
    let full = full_dataset();
    update(&full)
        .set_([assign(full.field("even"), full.field("sides").rem(2).eq(0))])
        .execute()
        .unwrap();

    let result = delete()
        .from_(&full)
        .where_(full.field("even").is_(false))
        .execute()
        .unwrap();

    assert_eq!(result.len(), 2);
    assert!(result
        .records()
        .iter()
        .all(|record| record.value("shape") == Value::from("square")));
}

#[test]
fn delete_is_idempotent() {
    let full = full_dataset();
    let query = delete()
        .from_(&full)
        .where_(full.field("sides").eq(3));

    query.execute().unwrap();
    assert_eq!(full.len(), 2);

    // The matching records are gone; a second run deletes nothing.
    query.execute().unwrap();
    assert_eq!(full.len(), 2);
}

#[test]
fn alter_drops_field_everywhere() {
    let full = full_dataset();
    alter(&full).drop([full.field("sides")]).execute().unwrap();
    assert!(full.records().iter().all(|record| !record.contains("sides")));
    // Dropping an already-absent field is a no-op, not an error.
    alter(&full).drop([full.field("sides")]).execute().unwrap();
}

#[test]
fn alter_with_where_only_touches_matches() {
    let full = full_dataset();
    alter(&full)
        .drop([full.field("color")])
        .where_(full.field("sides").eq(3))
        .execute()
        .unwrap();

    let records = full.records();
    assert!(!records[0].contains("color"));
    assert!(!records[1].contains("color"));
    assert_eq!(records[2].value("color"), Value::from("red"));
    assert_eq!(records[3].value("color"), Value::from("blue"));
}

#[test]
fn where_over_heterogeneous_records_tolerates_missing_fields() {
    let mixed = Collection::new(vec![
        Record::from_iter([("amount", Value::from(10i64))]),
        Record::from_iter([("label", Value::from("no amount here"))]),
        Record::from_iter([("amount", Value::from(1i64))]),
    ]);

    // The middle record has no `amount`; the comparison faults to absent and
    // the record is simply filtered out instead of aborting the query.
    let result = select_all()
        .from_(&mixed)
        .where_(mixed.field("amount").ge(5))
        .execute()
        .unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result.records()[0].value("amount"), Value::Int64(10));
}

#[test]
fn select_star_union_shadows_earlier_fields() {
    let left = Collection::with_name(
        vec![Record::from_iter([
            ("name", Value::from("left")),
            ("only_left", Value::from(1i64)),
        ])],
        "Left",
    );
    let right = Collection::with_name(
        vec![Record::from_iter([
            ("name", Value::from("right")),
            ("only_right", Value::from(2i64)),
        ])],
        "Right",
    );

    let result = select_all().from_(&left).join(&right).execute().unwrap();
    let record = &result.records()[0];
    assert_eq!(record.len(), 3);
    // The joined collection's `name` shadows the FROM collection's.
    assert_eq!(record.value("name"), Value::from("right"));
    assert_eq!(record.value("only_left"), Value::Int64(1));
    assert_eq!(record.value("only_right"), Value::Int64(2));
}

#[test]
fn empty_join_collection_yields_no_rows() {
    let shapes = shapes();
    let empty = Collection::new(Vec::new());
    let result = select_all().from_(&shapes).join(&empty).execute().unwrap();
    assert!(result.is_empty());
}

#[test]
fn builder_misuse_surfaces_at_execute() {
    let shapes = shapes();
    let colors = colors();

    let query = select_all()
        .from_(&shapes)
        .on(shapes.field("name").eq("x"));
    assert_eq!(query.execute().unwrap_err(), Error::OnWithoutJoin);

    let query = select_all()
        .from_(&shapes)
        .join_on(&colors, shapes.field("name").eq(colors.field("name")))
        .on(shapes.field("name").eq("x"));
    assert_eq!(query.execute().unwrap_err(), Error::OnAlreadyDefined);

    let query = select_all().limit(1).from_(&shapes);
    assert!(matches!(
        query.execute().unwrap_err(),
        Error::SyntaxMismatch { .. }
    ));
    // No data was touched.
    assert_eq!(shapes.len(), 3);
}

#[test]
fn explain_renders_the_whole_statement() {
    let shapes = shapes();
    let colors = colors();
    let sides = sides();

    let query = select([
        shapes.field("name").as_("shape"),
        colors.field("name").as_("color"),
    ])
    .from_(&shapes)
    .join(&colors)
    .join(&sides)
    .on(shapes.field("name").eq(sides.field("shape")))
    .where_(sides.field("sides").ge(3))
    .limit(4);

    assert_eq!(
        query.explain(false),
        "SELECT `Shapes`.`name` AS `shape`, `Colors`.`name` AS `color` \
         FROM `Shapes` \
         JOIN `Colors` JOIN `Sides` ON (`Shapes`.`name` == `Sides`.`shape`) \
         WHERE (`Sides`.`sides` >= 3) \
         LIMIT 4"
    );

    let pretty = query.explain(true);
    assert!(pretty.contains("SELECT\n    `Shapes`.`name` AS `shape`,\n"));
    assert!(pretty.contains("FROM\n    `Shapes`"));
    assert!(pretty.contains("    JOIN `Sides` ON"));
}

#[test]
fn self_join_binds_last_occurrence() {
    // Joining a collection with itself: one shared binding per collection,
    // so the last-bound tuple position wins — both sides read the same
    // record, and the product degenerates to the diagonal slices.
    let numbers = Collection::with_name(
        vec![
            Record::from_iter([("n", Value::from(1i64))]),
            Record::from_iter([("n", Value::from(2i64))]),
        ],
        "Numbers",
    );
    let result = select([numbers.field("n")])
        .from_(&numbers)
        .join(&numbers)
        .execute()
        .unwrap();
    assert_eq!(result.len(), 4);
    let values: Vec<Value> = result
        .records()
        .iter()
        .map(|record| record.value("n"))
        .collect();
    assert_eq!(
        values,
        vec![
            Value::Int64(1),
            Value::Int64(2),
            Value::Int64(1),
            Value::Int64(2),
        ]
    );
}
