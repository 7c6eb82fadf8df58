//! Reading back server-generated values after a modification.

use crate::ast::{EntitySet, Expr};
use crate::error::{CqtError, CqtResult};
use crate::metadata::is_identity_type;

use super::DmlTranslator;

/// How the modified row is found again.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Recovery<'a> {
    /// Join the `OUTPUT ... INTO` table variable back to the target.
    KeysVariable(&'a str),
    /// Match keys against the parameters bound for them, falling back to
    /// `scope_identity()` for at most one key.
    KeyValues,
}

/// `select <row> from <target> where @@ROWCOUNT > 0 ...`
pub(crate) fn returning_sql(
    t: &mut DmlTranslator,
    set: &EntitySet,
    row: &Expr,
    recovery: Recovery<'_>,
) -> CqtResult<String> {
    let mut sql = String::from("select ");
    match recovery {
        Recovery::KeysVariable(variable) => {
            sql.push_str(&t.with_alias("t", |t| t.translate(row))?);
            let table = t.target_sql(set)?;
            let joins: Vec<String> = set
                .element
                .key_members()
                .map(|key| {
                    let column = t.member_sql(&key.name);
                    format!("g.{} = t.{}", column, column)
                })
                .collect();
            sql.push_str(&format!(
                "\nfrom {} as g join {} as t on {}\nwhere @@ROWCOUNT > 0",
                variable,
                table,
                joins.join(" and ")
            ));
        }
        Recovery::KeyValues => {
            sql.push_str(&t.translate(row)?);
            sql.push_str(&format!("\nfrom {}\nwhere @@ROWCOUNT > 0", t.target_sql(set)?));
            let mut identity = false;
            for key in set.element.key_members() {
                sql.push_str(" and ");
                sql.push_str(&t.member_sql(&key.name));
                sql.push_str(" = ");
                if let Some(value) = t.member_value(&key.name) {
                    sql.push_str(value);
                    continue;
                }
                if identity {
                    return Err(CqtError::ServerGeneratedKey {
                        table: set.name.clone(),
                    });
                }
                let store = t.store_type(&key.ty)?;
                if !is_identity_type(&store) {
                    return Err(CqtError::IdentityType {
                        column: key.name.clone(),
                        store_type: store.name,
                    });
                }
                sql.push_str("scope_identity()");
                identity = true;
            }
        }
    }
    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{EntityType, Member, TypeUsage};
    use crate::transpiler::dialect::Dialect;

    #[test]
    fn test_two_unknown_keys_cannot_be_recovered() {
        let set = EntitySet::new(
            "Links",
            EntityType {
                name: "Link".into(),
                members: vec![
                    Member::new("A", TypeUsage::int32()).identity(),
                    Member::new("B", TypeUsage::int32()).identity(),
                ],
                keys: vec!["A".into(), "B".into()],
            },
        );
        let row = Expr::var("l", set.element_type()).prop("A");
        let mut t = DmlTranslator::new(Dialect::Sql2000);
        t.begin_statement("insert", true);
        let err = returning_sql(&mut t, &set, &row, Recovery::KeyValues).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Table 'Links' has more than one server-generated key column; only one can be recovered"
        );
    }
}
