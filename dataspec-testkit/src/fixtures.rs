//! Standard fixtures: a customer table, its row builder, and sample data.

use dataspec::RowsBuilder;

/// DDL for the customer table used throughout the end-to-end tests.
pub const CUSTOMER_DDL: &str = "\
create table customer (
    id bigint primary key,
    name text not null,
    date_acquired date,
    time_created timestamp not null,
    comment text
);";

pub const DEFAULT_CUSTOMER_NAME: &str = "Default customer name";

pub const DEFAULT_TIME_CREATED: &str = "2016-12-31T23:59:58.123Z";

/// Builder for customer rows: fills the not-null columns when the table
/// leaves them empty and reads the temporal columns as typed values.
pub fn customer_rows() -> RowsBuilder {
    RowsBuilder::new()
        .with("name", DEFAULT_CUSTOMER_NAME)
        .with("time_created", DEFAULT_TIME_CREATED)
        .as_date(&["date_acquired"])
        .as_timestamp(&["time_created"])
}

/// Two customers to insert. Alice leaves her name to the default.
pub const CUSTOMERS: &str = "\
| id | name | date_acquired | time_created              | comment |
| 1  |      | 2017-01-02    |                           |         |
| 2  | Bob  | 2017-03-04    | 2017-03-04T10:11:12+02:00 | vip     |
";

/// What the customer table holds after inserting [`CUSTOMERS`], listed in
/// a different order.
pub const CUSTOMERS_STORED: &str = "\
| id | name                  | date_acquired | time_created            | comment |
| 2  | Bob                   | 2017-03-04    | 2017-03-04 08:11:12.000 | vip     |
| 1  | Default customer name | 2017-01-02    | 2016-12-31 23:59:58.123 |         |
";

/// Expects Bob under another name.
pub const CUSTOMERS_WRONG_NAME: &str = "\
| id | name                  |
| 1  | Default customer name |
| 2  | Robert                |
";

/// Only one of the two stored customers.
pub const CUSTOMERS_ONLY_BOB: &str = "\
| id | name |
| 2  | Bob  |
";

/// A row whose date cannot be parsed.
pub const CUSTOMER_MALFORMED_DATE: &str = "\
| id | date_acquired |
| 9  | 2017-13-45    |
";

/// An order confirmation document template with a placeholder id and a
/// volatile timestamp.
pub const ORDER_TEMPLATE: &str = r#"{
  "id": "${id}",
  "status": "CONFIRMED",
  "total": 12.50,
  "placedAt": "<volatile>",
  "lines": [
    { "sku": "A-1", "quantity": 2 },
    { "sku": "B-7", "quantity": 1 }
  ]
}"#;

/// A response that matches [`ORDER_TEMPLATE`] once `id` is set to 42 and
/// `placedAt` is redacted.
pub const ORDER_RESPONSE: &str = r#"{"lines":[{"quantity":2,"sku":"A-1"},{"quantity":1,"sku":"B-7"}],"placedAt":"2024-05-01T09:30:00Z","total":12.5,"status":"CONFIRMED","id":42}"#;
