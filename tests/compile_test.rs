use cqt::prelude::*;
use pretty_assertions::assert_eq;

fn orders() -> EntitySet {
    EntitySet::new(
        "Orders",
        EntityType {
            name: "Order".into(),
            members: vec![
                Member::new("Id", TypeUsage::int32()).identity(),
                Member::new("Customer", TypeUsage::ansi_string(20)),
                Member::new("Qty", TypeUsage::int32()),
            ],
            keys: vec!["Id".into()],
        },
    )
}

#[test]
fn test_compile_from_json() {
    let json = r#"
    {
        "Query": {
            "query": {
                "kind": {
                    "Scan": {
                        "name": "Orders",
                        "container": "Shop",
                        "schema": "sales",
                        "table": "OrderHeader",
                        "element": {
                            "name": "Order",
                            "members": [{ "name": "Id", "ty": { "edm": { "Primitive": "Int32" } } }],
                            "keys": ["Id"]
                        }
                    }
                },
                "ty": {
                    "edm": {
                        "Collection": {
                            "edm": {
                                "Entity": {
                                    "name": "Order",
                                    "members": [{ "name": "Id", "ty": { "edm": { "Primitive": "Int32" } } }],
                                    "keys": ["Id"]
                                }
                            }
                        }
                    }
                }
            }
        }
    }"#;

    let tree: CommandTree = serde_json::from_str(json).expect("tree should deserialize");
    let compiled = compile(&tree, &CompileOptions::default()).unwrap();
    assert_eq!(compiled.sql, "SELECT c.[Id] AS [Id] FROM [sales].[OrderHeader] AS c");
    assert_eq!(compiled.command_type, CommandType::Text);
    assert!(compiled.parameters.is_empty());
}

#[test]
fn test_json_round_trip_compiles_identically() {
    let o = Expr::scan(orders()).bind("o");
    let query = o
        .clone()
        .filter(o.var_ref().prop("Customer").eq(Expr::param("customer", TypeUsage::string())));
    let tree = CommandTree::Query {
        query,
        parameters: vec![QueryParameter {
            name: "customer".into(),
            ty: TypeUsage::string(),
        }],
    };

    let json = serde_json::to_string(&tree).unwrap();
    let restored: CommandTree = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, tree);

    let options = CompileOptions::new(Dialect::Sql2008);
    assert_eq!(
        compile(&tree, &options).unwrap(),
        compile(&restored, &options).unwrap()
    );
}

#[test]
fn test_compiled_command_serializes() {
    let target = Expr::scan(orders()).bind("o");
    let tree = CommandTree::Delete {
        predicate: target.var_ref().prop("Id").eq(Expr::constant(5)),
        target,
    };
    let compiled = compile(&tree, &CompileOptions::default().with_rows_affected("n")).unwrap();
    let value = serde_json::to_value(&compiled).unwrap();

    assert_eq!(value["sql"], "delete [dbo].[Orders]\nwhere ([Id] = @0)\nset @n = @@ROWCOUNT");
    assert_eq!(value["command_type"], "Text");
    assert_eq!(value["rows_affected_parameter"], "@n");
    assert_eq!(value["parameters"][0]["value"], serde_json::json!({ "Int32": 5 }));
    assert_eq!(value["parameters"][1]["direction"], "Output");
}

#[test]
fn test_every_dialect_compiles_a_paged_query() {
    let o = Expr::scan(orders()).bind("o");
    let key = o.var_ref().prop("Id");
    let query = o
        .skip(vec![SortClause::desc(key)], Expr::constant(20))
        .limit(Expr::constant(10));

    for dialect in [Dialect::Sql2000, Dialect::Sql2005, Dialect::Sql2008, Dialect::Sql2012] {
        let sql = query
            .to_sql_with_dialect(dialect)
            .unwrap_or_else(|e| panic!("{} failed: {}", dialect, e));
        assert!(sql.starts_with("SELECT "), "{}: {}", dialect, sql);
        assert!(sql.contains("[dbo].[Orders]"), "{}: {}", dialect, sql);
    }
}

#[test]
fn test_config_drives_options() {
    let config = CompilerConfig::from_toml_str(
        r#"
dialect = "sql2000"
rows_affected_parameter = "@Rows"
generated_keys_variable = "@ids"
"#,
    )
    .unwrap();
    let options = config.to_options();
    assert_eq!(options.dialect, Dialect::Sql2000);

    let target = Expr::scan(orders()).bind("o");
    let tree = CommandTree::Update {
        set_clauses: vec![SetClause::new(target.var_ref().prop("Qty"), Expr::constant(3))],
        predicate: target.var_ref().prop("Id").eq(Expr::constant(1)),
        target,
        returning: None,
    };
    let compiled = compile(&tree, &options).unwrap();
    assert!(compiled.sql.ends_with("\nset @Rows = @@ROWCOUNT"));
}

#[test]
fn test_errors_are_reported_not_panicked() {
    let o = Expr::scan(orders()).bind("o");
    let bare_variable = o.clone().project(o.var_ref());
    let err = bare_variable.to_sql().unwrap_err();
    assert!(!err.is_internal(), "{}", err);
}
