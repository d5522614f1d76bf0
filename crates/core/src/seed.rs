//! Fixed playground schema and the rows it is reseeded with.
//!
//! Everything here is plain data plus SQL text builders; executing it is the job
//! of a [`crate::traits::SandboxStore`].

/// A literal bound into a seed insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedValue {
    /// `TEXT`
    Text(&'static str),
    /// `INTEGER`
    Int(i32),
}

/// Rows for one table, in insert order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedTable {
    /// Unqualified table name
    pub name: &'static str,
    /// `CREATE TABLE` body (column list inside the parentheses)
    pub definition: &'static str,
    /// Columns supplied by the inserts
    pub columns: &'static [&'static str],
    /// Row literals, positionally aligned with `columns`
    pub rows: &'static [&'static [SeedValue]],
}

use SeedValue::{Int, Text};

const DEPARTMENTS: SeedTable = SeedTable {
    name: "departments",
    definition: "id SERIAL PRIMARY KEY, dept_name TEXT NOT NULL UNIQUE",
    columns: &["dept_name"],
    rows: &[
        &[Text("Computer Science")],
        &[Text("Information Technology")],
        &[Text("Electronics")],
        &[Text("Artificial Intelligence")],
        &[Text("Cyber Security")],
        &[Text("Data Science")],
    ],
};

const STUDENTS: SeedTable = SeedTable {
    name: "students",
    definition: "id SERIAL PRIMARY KEY, name TEXT NOT NULL, age INTEGER NOT NULL, \
                 city TEXT NOT NULL, grade TEXT",
    columns: &["name", "age", "city", "grade"],
    rows: &[
        &[Text("Aarav Patel"), Int(19), Text("Ahmedabad"), Text("A")],
        &[Text("Riya Sharma"), Int(20), Text("Mumbai"), Text("A-")],
        &[Text("Arjun Mehta"), Int(18), Text("Surat"), Text("B+")],
        &[Text("Priya Nair"), Int(21), Text("Delhi"), Text("A")],
        &[Text("Krish Jain"), Int(19), Text("Vadodara"), Text("B")],
        &[Text("Sneha Reddy"), Int(22), Text("Hyderabad"), Text("A")],
        &[Text("Manav Shah"), Int(20), Text("Pune"), Text("A-")],
        &[Text("Ishita Desai"), Int(21), Text("Rajkot"), Text("B+")],
        &[Text("Karan Yadav"), Int(18), Text("Jaipur"), Text("A")],
        &[Text("Ananya Gupta"), Int(20), Text("Kolkata"), Text("B")],
        &[Text("Vivaan Singh"), Int(19), Text("Indore"), Text("A-")],
        &[Text("Diya Kapoor"), Int(22), Text("Bangalore"), Text("A")],
    ],
};

const COURSES: SeedTable = SeedTable {
    name: "courses",
    definition: "id SERIAL PRIMARY KEY, course_name TEXT NOT NULL, credits INTEGER NOT NULL",
    columns: &["course_name", "credits"],
    rows: &[
        &[Text("Database Systems"), Int(4)],
        &[Text("Operating Systems"), Int(3)],
        &[Text("Computer Networks"), Int(4)],
        &[Text("Data Structures"), Int(3)],
        &[Text("Machine Learning"), Int(4)],
        &[Text("Web Development"), Int(3)],
        &[Text("Cyber Security"), Int(3)],
        &[Text("Cloud Computing"), Int(4)],
        &[Text("Mobile Development"), Int(3)],
        &[Text("Software Engineering"), Int(3)],
    ],
};

const INSTRUCTORS: SeedTable = SeedTable {
    name: "instructors",
    definition: "id SERIAL PRIMARY KEY, name TEXT NOT NULL, \
                 department_id INTEGER NOT NULL REFERENCES departments(id) ON DELETE RESTRICT",
    columns: &["name", "department_id"],
    rows: &[
        &[Text("Dr. Neha Shah"), Int(1)],
        &[Text("Prof. Raj Kumar"), Int(2)],
        &[Text("Dr. Anil Mehta"), Int(3)],
        &[Text("Prof. Kavita Rao"), Int(4)],
        &[Text("Dr. Arvind Singh"), Int(5)],
        &[Text("Prof. Meera Patel"), Int(6)],
        &[Text("Dr. Rakesh Jain"), Int(1)],
        &[Text("Prof. Sunita Iyer"), Int(2)],
        &[Text("Dr. Suresh Gupta"), Int(3)],
        &[Text("Prof. Pooja Joshi"), Int(4)],
        &[Text("Dr. Hemant Desai"), Int(5)],
        &[Text("Prof. Ritu Verma"), Int(6)],
    ],
};

const ENROLLMENTS: SeedTable = SeedTable {
    name: "enrollments",
    definition: "id SERIAL PRIMARY KEY, \
                 student_id INTEGER NOT NULL REFERENCES students(id) ON DELETE CASCADE, \
                 course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE, \
                 grade TEXT NOT NULL",
    columns: &["student_id", "course_id", "grade"],
    rows: &[
        &[Int(1), Int(1), Text("A")],
        &[Int(1), Int(2), Text("B")],
        &[Int(2), Int(1), Text("A")],
        &[Int(2), Int(4), Text("A")],
        &[Int(3), Int(3), Text("B")],
        &[Int(4), Int(2), Text("A")],
        &[Int(5), Int(1), Text("C")],
        &[Int(6), Int(5), Text("B")],
        &[Int(7), Int(6), Text("A")],
        &[Int(8), Int(4), Text("B")],
        &[Int(9), Int(2), Text("A")],
        &[Int(10), Int(3), Text("C")],
        &[Int(11), Int(1), Text("A")],
        &[Int(12), Int(7), Text("B")],
        &[Int(4), Int(5), Text("A")],
    ],
};

/// Tables in dependency order: parents before the tables that reference them.
pub const SEED_TABLES: [SeedTable; 5] = [DEPARTMENTS, STUDENTS, COURSES, INSTRUCTORS, ENROLLMENTS];

/// Double-quotes an identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Seed plan for one playground schema and one low-privilege role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedPlan {
    schema: String,
    role: String,
}

impl SeedPlan {
    /// Plan for `schema`, granting to `role`.
    pub fn new(schema: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            role: role.into(),
        }
    }

    /// Target schema.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Grantee role.
    pub fn role(&self) -> &str {
        &self.role
    }

    /// The fixed tables in insert order.
    pub fn tables(&self) -> &'static [SeedTable] {
        &SEED_TABLES
    }

    /// `CREATE SCHEMA IF NOT EXISTS …`
    pub fn create_schema_sql(&self) -> String {
        format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(&self.schema))
    }

    /// Pins the search path for the enclosing transaction only.
    pub fn search_path_sql(&self) -> String {
        format!("SET LOCAL search_path TO {}", quote_ident(&self.schema))
    }

    /// One `CREATE TABLE IF NOT EXISTS` per table, parents first.
    pub fn create_table_sql(&self) -> Vec<String> {
        SEED_TABLES
            .iter()
            .map(|table| {
                format!(
                    "CREATE TABLE IF NOT EXISTS {}.{} ({})",
                    quote_ident(&self.schema),
                    quote_ident(table.name),
                    table.definition
                )
            })
            .collect()
    }

    /// Empties every seed table and restarts identity sequences at 1.
    pub fn truncate_sql(&self) -> String {
        let names: Vec<String> = SEED_TABLES
            .iter()
            .rev()
            .map(|table| format!("{}.{}", quote_ident(&self.schema), quote_ident(table.name)))
            .collect();
        format!("TRUNCATE TABLE {} RESTART IDENTITY CASCADE", names.join(", "))
    }

    /// Multi-row insert with `$n` placeholders for `table`.
    pub fn insert_sql(&self, table: &SeedTable) -> String {
        let width = table.columns.len();
        let tuples: Vec<String> = (0..table.rows.len())
            .map(|row| {
                let placeholders: Vec<String> = (1..=width)
                    .map(|col| format!("${}", row * width + col))
                    .collect();
                format!("({})", placeholders.join(", "))
            })
            .collect();
        let columns: Vec<String> = table.columns.iter().map(|c| quote_ident(c)).collect();
        format!(
            "INSERT INTO {}.{} ({}) VALUES {}",
            quote_ident(&self.schema),
            quote_ident(table.name),
            columns.join(", "),
            tuples.join(", ")
        )
    }

    /// Read/write grants on current and future objects of the schema.
    pub fn grant_sql(&self) -> Vec<String> {
        let schema = quote_ident(&self.schema);
        let role = quote_ident(&self.role);
        vec![
            format!("GRANT USAGE ON SCHEMA {schema} TO {role}"),
            format!("GRANT CREATE ON SCHEMA {schema} TO {role}"),
            format!(
                "GRANT SELECT, INSERT, UPDATE, DELETE ON ALL TABLES IN SCHEMA {schema} TO {role}"
            ),
            format!("GRANT USAGE, SELECT, UPDATE ON ALL SEQUENCES IN SCHEMA {schema} TO {role}"),
            format!(
                "ALTER DEFAULT PRIVILEGES IN SCHEMA {schema} \
                 GRANT SELECT, INSERT, UPDATE, DELETE ON TABLES TO {role}"
            ),
            format!(
                "ALTER DEFAULT PRIVILEGES IN SCHEMA {schema} \
                 GRANT USAGE, SELECT, UPDATE ON SEQUENCES TO {role}"
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_has_documented_row_counts() {
        let counts: Vec<_> = SEED_TABLES.iter().map(|t| (t.name, t.rows.len())).collect();
        assert_eq!(
            counts,
            vec![
                ("departments", 6),
                ("students", 12),
                ("courses", 10),
                ("instructors", 12),
                ("enrollments", 15),
            ]
        );
    }

    #[test]
    fn every_row_matches_its_column_list() {
        for table in SEED_TABLES.iter() {
            for row in table.rows {
                assert_eq!(row.len(), table.columns.len(), "{}", table.name);
            }
        }
    }

    #[test]
    fn foreign_keys_point_at_seeded_ids() {
        let students = STUDENTS.rows.len() as i32;
        let courses = COURSES.rows.len() as i32;
        let departments = DEPARTMENTS.rows.len() as i32;
        for row in ENROLLMENTS.rows {
            match (row[0], row[1]) {
                (Int(s), Int(c)) => {
                    assert!((1..=students).contains(&s));
                    assert!((1..=courses).contains(&c));
                }
                other => panic!("unexpected enrollment row {other:?}"),
            }
        }
        for row in INSTRUCTORS.rows {
            match row[1] {
                Int(d) => assert!((1..=departments).contains(&d)),
                other => panic!("unexpected department id {other:?}"),
            }
        }
    }

    #[test]
    fn referenced_tables_are_created_first() {
        let order: Vec<_> = SEED_TABLES.iter().map(|t| t.name).collect();
        let pos = |name: &str| order.iter().position(|n| *n == name).expect("table");
        assert!(pos("departments") < pos("instructors"));
        assert!(pos("students") < pos("enrollments"));
        assert!(pos("courses") < pos("enrollments"));
    }

    #[test]
    fn insert_placeholders_are_numbered_row_major() {
        let plan = SeedPlan::new("playground", "learner");
        let sql = plan.insert_sql(&COURSES);
        assert!(sql.starts_with(
            "INSERT INTO \"playground\".\"courses\" (\"course_name\", \"credits\") VALUES ($1, $2), ($3, $4)"
        ));
        assert!(sql.ends_with("($19, $20)"));
    }

    #[test]
    fn truncate_restarts_identities() {
        let sql = SeedPlan::new("playground", "learner").truncate_sql();
        assert!(sql.starts_with("TRUNCATE TABLE \"playground\".\"enrollments\""));
        assert!(sql.ends_with("RESTART IDENTITY CASCADE"));
    }

    #[test]
    fn identifiers_are_quoted_in_grants() {
        let plan = SeedPlan::new("play\"ground", "learner");
        let grants = plan.grant_sql();
        assert_eq!(grants[0], "GRANT USAGE ON SCHEMA \"play\"\"ground\" TO \"learner\"");
        assert_eq!(grants.len(), 6);
        assert!(grants
            .iter()
            .filter(|g| g.starts_with("ALTER DEFAULT PRIVILEGES"))
            .all(|g| g.contains("IN SCHEMA")));
    }
}
