//! Modification command tests (INSERT, UPDATE, DELETE, batches, functions).

use super::{int, orders, products};
use crate::ast::{
    CommandTree, EntitySet, EntityType, Expr, ExprBinding, Function, Member, SetClause, TypeUsage,
    Value,
};
use crate::error::CqtError;
use crate::transpiler::{
    CommandType, CompileOptions, Dialect, ParameterDirection, compile, compile_batch,
};

fn order_target() -> ExprBinding {
    Expr::scan(orders()).bind("o")
}

fn set(target: &ExprBinding, member: &str, value: Expr) -> SetClause {
    SetClause::new(target.var_ref().prop(member), value)
}

fn tags() -> EntitySet {
    EntitySet::new(
        "Tags",
        EntityType {
            name: "Tag".into(),
            members: vec![
                Member::new("Id", TypeUsage::guid()).identity(),
                Member::new("Label", TypeUsage::string()),
            ],
            keys: vec!["Id".into()],
        },
    )
}

fn tag_insert(label: &str) -> CommandTree {
    let target = Expr::scan(tags()).bind("t");
    let returning = Expr::row(vec![("Id", target.var_ref().prop("Id"))]);
    CommandTree::Insert {
        set_clauses: vec![set(&target, "Label", Expr::constant(label))],
        target,
        returning: Some(returning),
    }
}

#[test]
fn test_insert_with_identity_returning() {
    let target = order_target();
    let returning = Expr::row(vec![("Id", target.var_ref().prop("Id"))]);
    let tree = CommandTree::Insert {
        set_clauses: vec![
            set(&target, "ProductId", int(7)),
            set(&target, "CustomerId", int(3)),
            set(&target, "Qty", int(2)),
        ],
        target,
        returning: Some(returning),
    };

    let compiled = compile(&tree, &CompileOptions::default()).unwrap();
    assert_eq!(
        compiled.sql,
        "insert [dbo].[Orders]([ProductId], [CustomerId], [Qty])\n\
         values (@0, @1, @2)\n\
         select [Id]\n\
         from [dbo].[Orders]\n\
         where @@ROWCOUNT > 0 and [Id] = scope_identity()"
    );
    assert_eq!(compiled.command_type, CommandType::Text);
    let names: Vec<_> = compiled.parameters.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["@0", "@1", "@2"]);
    assert_eq!(compiled.parameters[0].value, Some(Value::Int32(7)));
    assert_eq!(compiled.parameters[2].store_type.as_deref(), Some("int"));
}

#[test]
fn test_batch_numbers_parameters_and_guards_later_statements() {
    let insert = {
        let target = order_target();
        CommandTree::Insert {
            set_clauses: vec![set(&target, "Qty", int(1))],
            target,
            returning: None,
        }
    };
    let update = {
        let target = order_target();
        CommandTree::Update {
            set_clauses: vec![set(&target, "Qty", int(5))],
            predicate: target.var_ref().prop("Id").eq(int(9)),
            target,
            returning: None,
        }
    };
    let delete = {
        let target = order_target();
        CommandTree::Delete {
            predicate: target.var_ref().prop("Id").eq(int(9)),
            target,
        }
    };

    let options = CompileOptions::default().with_rows_affected("RowsAffected");
    let compiled = compile_batch(&[insert, update, delete], &options).unwrap();
    assert_eq!(
        compiled.sql,
        "insert [dbo].[Orders]([Qty])\n\
         values (@0)\n\
         update [dbo].[Orders]\n\
         set [Qty] = @1\n\
         where ([Id] = @2) and @@ROWCOUNT > 0\n\
         delete [dbo].[Orders]\n\
         where ([Id] = @3) and @@ROWCOUNT > 0\n\
         set @RowsAffected = @@ROWCOUNT"
    );
    assert_eq!(compiled.rows_affected_parameter.as_deref(), Some("@RowsAffected"));
    assert_eq!(compiled.parameters.len(), 5);
    let last = &compiled.parameters[4];
    assert_eq!(last.direction, ParameterDirection::Output);
    assert_eq!(last.store_type.as_deref(), Some("int"));
}

#[test]
fn test_each_insert_gets_its_own_keys_variable() {
    let trees = vec![tag_insert("red"), tag_insert("green"), tag_insert("blue")];
    let compiled = compile_batch(&trees, &CompileOptions::default()).unwrap();

    assert!(compiled.sql.starts_with("declare @generated_keys table([Id] uniqueidentifier)\n"));
    for variable in ["@generated_keys1", "@generated_keys2"] {
        assert!(
            compiled
                .sql
                .contains(&format!("\ndeclare {} table([Id] uniqueidentifier)\n", variable)),
            "{}",
            compiled.sql
        );
        assert!(
            compiled
                .sql
                .contains(&format!("output inserted.[Id] into {}\n", variable)),
            "{}",
            compiled.sql
        );
    }
    assert!(compiled.sql.ends_with(
        "from @generated_keys2 as g join [dbo].[Tags] as t on g.[Id] = t.[Id]\nwhere @@ROWCOUNT > 0"
    ));
    assert_eq!(compiled.parameters.len(), 3);
}

fn order_insert(qty: i32) -> CommandTree {
    let target = order_target();
    let returning = Expr::row(vec![("Id", target.var_ref().prop("Id"))]);
    CommandTree::Insert {
        set_clauses: vec![set(&target, "Qty", int(qty))],
        target,
        returning: Some(returning),
    }
}

#[test]
fn test_identity_batch_recovers_each_insert() {
    let trees = vec![order_insert(1), order_insert(2), order_insert(3)];
    let expected = "insert [dbo].[Orders]([Qty])\n\
                    values (@0)\n\
                    select [Id]\n\
                    from [dbo].[Orders]\n\
                    where @@ROWCOUNT > 0 and [Id] = scope_identity()\n\
                    insert [dbo].[Orders]([Qty])\n\
                    values (@1)\n\
                    select [Id]\n\
                    from [dbo].[Orders]\n\
                    where @@ROWCOUNT > 0 and [Id] = scope_identity()\n\
                    insert [dbo].[Orders]([Qty])\n\
                    values (@2)\n\
                    select [Id]\n\
                    from [dbo].[Orders]\n\
                    where @@ROWCOUNT > 0 and [Id] = scope_identity()";

    for dialect in [Dialect::Sql2000, Dialect::Sql2012] {
        let compiled = compile_batch(&trees, &CompileOptions::new(dialect)).unwrap();
        assert_eq!(compiled.sql, expected, "{}", dialect);
        assert_eq!(compiled.sql.matches("scope_identity()").count(), 3);
        assert!(!compiled.sql.contains("declare"));
        let values: Vec<_> = compiled.parameters.iter().map(|p| p.value.clone()).collect();
        assert_eq!(
            values,
            vec![Some(Value::Int32(1)), Some(Value::Int32(2)), Some(Value::Int32(3))]
        );
    }
}

#[test]
fn test_custom_keys_variable() {
    let options = CompileOptions {
        generated_keys_variable: "@keys".to_string(),
        ..CompileOptions::default()
    };
    let compiled = compile(&tag_insert("red"), &options).unwrap();
    assert!(compiled.sql.starts_with("declare @keys table("), "{}", compiled.sql);
}

#[test]
fn test_batch_rejects_mixed_targets() {
    let first = {
        let target = order_target();
        CommandTree::Delete {
            predicate: target.var_ref().prop("Id").eq(int(1)),
            target,
        }
    };
    let second = {
        let target = Expr::scan(products()).bind("p");
        CommandTree::Delete {
            predicate: target.var_ref().prop("Id").eq(int(1)),
            target,
        }
    };

    let err = compile_batch(&[first, second], &CompileOptions::default()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "DML batch targets must be the same table: expected dbo.Orders, found dbo.Products"
    );
}

#[test]
fn test_batch_rejects_queries_and_empty_input() {
    let query = CommandTree::query(Expr::scan(orders()));
    assert!(matches!(
        compile_batch(&[query], &CompileOptions::default()),
        Err(CqtError::Unsupported(_))
    ));
    assert!(matches!(
        compile_batch(&[], &CompileOptions::default()),
        Err(CqtError::Unsupported(_))
    ));
}

#[test]
fn test_defining_query_target() {
    let mut set = orders();
    set.defining_query = Some("SELECT * FROM legacy_orders".to_string());
    let target = Expr::scan(set).bind("o");
    let tree = CommandTree::Delete {
        predicate: target.var_ref().prop("Id").eq(int(1)),
        target,
    };
    assert!(matches!(
        compile(&tree, &CompileOptions::default()),
        Err(CqtError::DefiningQueryTarget { operation: "delete", .. })
    ));
}

#[test]
fn test_computed_values_are_unsupported() {
    let target = order_target();
    let tree = CommandTree::Update {
        set_clauses: vec![set(&target, "Qty", target.var_ref().prop("Qty").plus(int(1)))],
        predicate: target.var_ref().prop("Id").eq(int(1)),
        target,
        returning: None,
    };
    assert!(matches!(
        compile(&tree, &CompileOptions::default()),
        Err(CqtError::Unsupported(_))
    ));
}

#[test]
fn test_function_command() {
    let procedure = CommandTree::Function {
        function: Function::user("Shop", "TopCustomers"),
        parameters: vec![],
    };
    let compiled = compile(&procedure, &CompileOptions::default()).unwrap();
    assert_eq!(compiled.sql, "[Shop].[TopCustomers]");
    assert_eq!(compiled.command_type, CommandType::StoredProcedure);

    let mut function = Function::user("Shop", "TopCustomers");
    function.schema = Some("sales".into());
    function.store_name = Some("top_customers".into());
    let compiled = compile(
        &CommandTree::Function {
            function,
            parameters: vec![],
        },
        &CompileOptions::default(),
    )
    .unwrap();
    assert_eq!(compiled.sql, "[sales].[top_customers]");

    let mut function = Function::user("Shop", "Recent");
    function.command_text = Some("SELECT TOP (10) * FROM dbo.Orders ORDER BY Id DESC".into());
    let compiled = compile(
        &CommandTree::Function {
            function,
            parameters: vec![],
        },
        &CompileOptions::default(),
    )
    .unwrap();
    assert_eq!(compiled.command_type, CommandType::Text);
    assert!(compiled.sql.starts_with("SELECT TOP (10)"));
}
