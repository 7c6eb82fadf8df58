use super::super::dialect::Dialect;
use super::super::traits::SqlGenerator;

pub struct SqlServerGenerator {
    dialect: Dialect,
}

impl SqlServerGenerator {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }
}

impl SqlGenerator for SqlServerGenerator {
    fn placeholder(&self, name: &str) -> String {
        if name.starts_with('@') {
            name.to_string()
        } else {
            format!("@{}", name)
        }
    }

    fn string_literal(&self, value: &str, unicode: bool) -> String {
        let escaped = value.replace('\'', "''");
        if unicode {
            format!("N'{}'", escaped)
        } else {
            format!("'{}'", escaped)
        }
    }

    fn binary_literal(&self, bytes: &[u8]) -> String {
        let mut sql = String::with_capacity(2 + bytes.len() * 2);
        sql.push_str("0x");
        for b in bytes {
            sql.push_str(&format!("{:02X}", b));
        }
        sql
    }

    fn top_clause(&self, count: &str, with_ties: bool) -> String {
        let mut sql = if self.dialect.is_legacy() {
            format!("TOP {}", count)
        } else {
            format!("TOP ({})", count)
        };
        if with_ties {
            sql.push_str(" WITH TIES");
        }
        sql
    }

    fn offset_fetch(&self, skip: &str, fetch: Option<&str>) -> String {
        let mut sql = format!(" OFFSET {} ROWS", skip);
        if let Some(fetch) = fetch {
            sql.push_str(&format!(" FETCH NEXT {} ROWS ONLY", fetch));
        }
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_clause() {
        let modern = SqlServerGenerator::new(Dialect::Sql2012);
        assert_eq!(modern.top_clause("10", false), "TOP (10)");
        assert_eq!(modern.top_clause("@n", true), "TOP (@n) WITH TIES");

        let legacy = SqlServerGenerator::new(Dialect::Sql2000);
        assert_eq!(legacy.top_clause("10", false), "TOP 10");
    }

    #[test]
    fn test_literals() {
        let generator = SqlServerGenerator::new(Dialect::default());
        assert_eq!(generator.string_literal("O'Hara", true), "N'O''Hara'");
        assert_eq!(generator.string_literal("x", false), "'x'");
        assert_eq!(generator.binary_literal(&[0xde, 0x01]), "0xDE01");
        assert_eq!(generator.placeholder("cust"), "@cust");
        assert_eq!(
            generator.offset_fetch("5", Some("10")),
            " OFFSET 5 ROWS FETCH NEXT 10 ROWS ONLY"
        );
    }
}
