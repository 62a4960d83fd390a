//! Fluent constructors for DML statements.

use crate::ast::{
    Assignment, Delete, Exec, ExecArg, Expr, Insert, InsertSource, Join, JoinKind, OrderBy,
    Select, SelectItem, Statement, TableRef, Update,
};

/// Start a SELECT over `items`.
pub fn select(items: impl IntoIterator<Item = Expr>) -> Select {
    Select {
        items: items
            .into_iter()
            .map(|expr| SelectItem {
                expr,
                alias: None,
                assign_to: None,
            })
            .collect(),
        ..Default::default()
    }
}

pub fn update(table: &str) -> Update {
    Update {
        table: TableRef::new(table),
        assignments: Vec::new(),
        where_clause: None,
    }
}

pub fn insert(table: &str) -> Insert {
    Insert {
        table: TableRef::new(table),
        columns: Vec::new(),
        source: InsertSource::Values(Vec::new()),
    }
}

pub fn delete(table: &str) -> Delete {
    Delete {
        table: TableRef::new(table),
        where_clause: None,
    }
}

pub fn exec(procedure: &str) -> Exec {
    Exec {
        procedure: procedure.to_string(),
        args: Vec::new(),
        return_status: None,
    }
}

fn at(name: &str) -> String {
    if name.starts_with('@') {
        name.to_string()
    } else {
        format!("@{}", name)
    }
}

fn and_into(slot: &mut Option<Expr>, cond: Expr) {
    *slot = match slot.take() {
        Some(existing) => Expr::and_all(vec![existing, cond]),
        None => Some(cond),
    };
}

impl Select {
    /// `SELECT @var = expr`
    pub fn assign(mut self, variable: &str, expr: Expr) -> Self {
        self.items.push(SelectItem {
            expr,
            alias: None,
            assign_to: Some(at(variable)),
        });
        self
    }

    pub fn column(mut self, expr: Expr) -> Self {
        self.items.push(SelectItem {
            expr,
            alias: None,
            assign_to: None,
        });
        self
    }

    pub fn from(mut self, table: &str) -> Self {
        self.from = Some(TableRef::new(table));
        self
    }

    pub fn from_as(mut self, table: &str, alias: &str) -> Self {
        self.from = Some(TableRef::new(table).alias(alias));
        self
    }

    pub fn join(mut self, kind: JoinKind, table: TableRef, on: Expr) -> Self {
        self.joins.push(Join { kind, table, on });
        self
    }

    /// AND another predicate into WHERE.
    pub fn filter(mut self, cond: Expr) -> Self {
        and_into(&mut self.where_clause, cond);
        self
    }

    pub fn top(mut self, n: i64) -> Self {
        self.top = Some(Expr::from(n));
        self
    }

    pub fn order_by(mut self, expr: Expr, descending: bool) -> Self {
        self.order_by.push(OrderBy { expr, descending });
        self
    }

    pub fn group_by(mut self, expr: Expr) -> Self {
        self.group_by.push(expr);
        self
    }

    pub fn into_statement(self) -> Statement {
        Statement::Select(self)
    }
}

impl Update {
    pub fn set(mut self, column: &str, value: Expr) -> Self {
        self.assignments.push(Assignment {
            column: column.to_string(),
            value,
        });
        self
    }

    pub fn filter(mut self, cond: Expr) -> Self {
        and_into(&mut self.where_clause, cond);
        self
    }

    pub fn into_statement(self) -> Statement {
        Statement::Update(self)
    }
}

impl Insert {
    pub fn columns<'a>(mut self, columns: impl IntoIterator<Item = &'a str>) -> Self {
        self.columns = columns.into_iter().map(str::to_string).collect();
        self
    }

    /// Append one VALUES row.
    pub fn values(mut self, row: impl IntoIterator<Item = Expr>) -> Self {
        let row: Vec<Expr> = row.into_iter().collect();
        match &mut self.source {
            InsertSource::Values(rows) => rows.push(row),
            InsertSource::Select(_) => self.source = InsertSource::Values(vec![row]),
        }
        self
    }

    pub fn from_select(mut self, query: Select) -> Self {
        self.source = InsertSource::Select(Box::new(query));
        self
    }

    pub fn into_statement(self) -> Statement {
        Statement::Insert(self)
    }
}

impl Delete {
    pub fn filter(mut self, cond: Expr) -> Self {
        and_into(&mut self.where_clause, cond);
        self
    }

    pub fn into_statement(self) -> Statement {
        Statement::Delete(self)
    }
}

impl Exec {
    pub fn arg(mut self, value: Expr) -> Self {
        self.args.push(ExecArg {
            name: None,
            value,
            output: false,
        });
        self
    }

    pub fn named_arg(mut self, name: &str, value: Expr) -> Self {
        self.args.push(ExecArg {
            name: Some(name.to_string()),
            value,
            output: false,
        });
        self
    }

    /// `@var OUTPUT`
    pub fn output_arg(mut self, variable: &str) -> Self {
        self.args.push(ExecArg {
            name: None,
            value: Expr::Variable(at(variable)),
            output: true,
        });
        self
    }

    pub fn status_into(mut self, variable: &str) -> Self {
        self.return_status = Some(at(variable));
        self
    }

    pub fn into_statement(self) -> Statement {
        Statement::Exec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::{eq, int, var};

    #[test]
    fn test_filter_ands_conditions() {
        let q = select([Expr::Star])
            .from("Orders")
            .filter(eq(var("@a"), int(1)))
            .filter(eq(var("@b"), int(2)));
        assert_eq!(q.where_clause.unwrap().conjuncts().len(), 2);
    }

    #[test]
    fn test_insert_values_rows() {
        let ins = insert("Orders")
            .columns(["Id", "Status"])
            .values([var("@id"), int(1)])
            .values([var("@id2"), int(2)]);
        match ins.source {
            InsertSource::Values(rows) => assert_eq!(rows.len(), 2),
            _ => panic!("expected VALUES"),
        }
    }
}
